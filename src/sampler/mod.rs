//! Sample generation for the three test phases.
//!
//! Two strategies exist behind the [`SampleGenerator`] trait and are never
//! merged: [`simulated::SimulatedSampler`] synthesizes timing through
//! artificial per-chunk delays (the interactive default), while
//! [`real::HttpSampler`] times one actual transfer per phase. Their delay
//! and size constants are deliberately independent.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::errors::DiagError;
use crate::progress::ChunkUpdate;

pub mod real;
pub mod simulated;

pub const MIB: u64 = 1024 * 1024;

/// Chunk sizes per simulated mode.
pub const DOWNLOAD_CHUNK_BYTES: u64 = 64 * 1024;
pub const UPLOAD_CHUNK_BYTES: u64 = 32 * 1024;
pub const STREAMING_CHUNK_BYTES: u64 = 256 * 1024;
pub const THROUGHPUT_INTERVAL_BYTES: u64 = MIB;

/// Per-chunk delay ranges (milliseconds) per simulated mode.
pub const DOWNLOAD_DELAY_MS: (u64, u64) = (5, 15);
pub const UPLOAD_DELAY_MS: (u64, u64) = (10, 30);
pub const STREAMING_DELAY_MS: (u64, u64) = (20, 70);
pub const THROUGHPUT_DELAY_MS: (u64, u64) = (100, 200);

/// Number of ping probes per run.
pub const PING_PROBES: usize = 5;

/// Simulated per-probe ping delay range (milliseconds).
pub const PING_DELAY_MS: (u64, u64) = (18, 30);

/// Timeout for a single real transfer request.
pub const REAL_TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);

/// A discrete measurement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Ping,
    Download,
    Upload,
}

impl Phase {
    /// The fixed execution order: ping, then download, then upload.
    pub const ORDER: [Phase; 3] = [Phase::Ping, Phase::Download, Phase::Upload];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Ping => write!(f, "ping"),
            Phase::Download => write!(f, "download"),
            Phase::Upload => write!(f, "upload"),
        }
    }
}

/// Byte-size tier for download/upload tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SizeClass {
    /// 1 MiB, for a quick pass.
    Small,
    /// 10 MiB, the standard test.
    #[default]
    Medium,
    /// 50 MiB, for steadier numbers.
    Large,
}

impl SizeClass {
    pub fn bytes(self) -> u64 {
        match self {
            SizeClass::Small => MIB,
            SizeClass::Medium => 10 * MIB,
            SizeClass::Large => 50 * MIB,
        }
    }
}

/// Streaming quality tier for the streaming benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StreamQuality {
    #[serde(rename = "480p")]
    Q480p,
    #[serde(rename = "720p")]
    Q720p,
    #[serde(rename = "1080p")]
    Q1080p,
    #[serde(rename = "4K")]
    Q4k,
}

impl StreamQuality {
    /// Bitrate the tier needs to play without starving, in Mbps.
    pub fn required_bitrate_mbps(self) -> f64 {
        match self {
            StreamQuality::Q480p => 1.0,
            StreamQuality::Q720p => 3.0,
            StreamQuality::Q1080p => 8.0,
            StreamQuality::Q4k => 25.0,
        }
    }

    /// Benchmark file size for the tier.
    pub fn file_size_bytes(self) -> u64 {
        match self {
            StreamQuality::Q480p => 5 * MIB,
            StreamQuality::Q720p => 15 * MIB,
            StreamQuality::Q1080p => 40 * MIB,
            StreamQuality::Q4k => 125 * MIB,
        }
    }

    pub const ALL: [StreamQuality; 4] = [
        StreamQuality::Q480p,
        StreamQuality::Q720p,
        StreamQuality::Q1080p,
        StreamQuality::Q4k,
    ];
}

impl fmt::Display for StreamQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamQuality::Q480p => write!(f, "480p"),
            StreamQuality::Q720p => write!(f, "720p"),
            StreamQuality::Q1080p => write!(f, "1080p"),
            StreamQuality::Q4k => write!(f, "4K"),
        }
    }
}

impl std::str::FromStr for StreamQuality {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "480p" => Ok(StreamQuality::Q480p),
            "720p" => Ok(StreamQuality::Q720p),
            "1080p" => Ok(StreamQuality::Q1080p),
            "4K" | "4k" => Ok(StreamQuality::Q4k),
            other => Err(DiagError::invalid_input(
                "quality",
                format!("unrecognized quality tier '{}'", other),
            )),
        }
    }
}

/// One raw timing sample: how many bytes were accounted for, and how long
/// that took.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl Sample {
    pub const fn new(bytes: u64, elapsed: Duration) -> Self {
        Sample { bytes, elapsed }
    }

    /// Instantaneous speed of this sample in Mbps, 0.0 on zero duration.
    pub fn speed_mbps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        (self.bytes as f64 / MIB as f64 * 8.0) / secs
    }
}

/// Cooperative cancellation flag, checked at every chunk boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Bail out of the current phase if cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), DiagError> {
        if self.is_cancelled() {
            Err(DiagError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Produces timing samples for one phase.
///
/// Implementations report per-chunk completion through the optional
/// `chunks` sender; whether those updates drive the visible progress bar is
/// the orchestrator's decision, not the sampler's.
#[allow(async_fn_in_trait)]
pub trait SampleGenerator {
    /// Strategy name for logs and the final report.
    fn name(&self) -> &'static str;

    /// Run the 5-probe ping pass, returning elapsed milliseconds per probe.
    async fn ping_probes(
        &self,
        cancel: &CancelToken,
    ) -> Result<Vec<f64>, DiagError>;

    /// Produce transfer samples totalling `bytes` for download or upload.
    async fn transfer(
        &self,
        phase: Phase,
        bytes: u64,
        chunks: Option<UnboundedSender<ChunkUpdate>>,
        cancel: &CancelToken,
    ) -> Result<Vec<Sample>, DiagError>;
}
