//! Real-transfer sample generation over HTTP.
//!
//! One actual request per phase: a sized download from the measurement
//! endpoint and an upload of the same size back to it. Yields a single
//! end-to-end sample per phase rather than the simulated per-chunk series,
//! so progress reporting falls back to the timer source upstream.

use std::time::Instant;

use log::{debug, warn};
use reqwest::header::{HeaderValue, CACHE_CONTROL, USER_AGENT};
use reqwest::Client;
use tokio::sync::mpsc::UnboundedSender;

use crate::errors::DiagError;
use crate::progress::ChunkUpdate;

use super::{
    CancelToken, Phase, Sample, SampleGenerator, PING_PROBES,
    REAL_TRANSFER_TIMEOUT,
};

static BASE_URL: &str = "https://speed.cloudflare.com";

static UA: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION")
);

/// Small static assets on distinct hosts, rotated through for ping probes.
static PING_TARGETS: [&str; 3] = [
    "https://www.google.com/favicon.ico",
    "https://www.cloudflare.com/favicon.ico",
    "https://www.github.com/favicon.ico",
];

/// Sampler that times actual HTTP transfers.
#[derive(Debug, Clone)]
pub struct HttpSampler {
    client: Client,
}

impl HttpSampler {
    pub fn new() -> Result<Self, DiagError> {
        let client = Client::builder()
            .timeout(REAL_TRANSFER_TIMEOUT)
            .build()
            .map_err(|e| {
                DiagError::network_with_source("building http client", e)
            })?;

        Ok(HttpSampler { client })
    }
}

impl SampleGenerator for HttpSampler {
    fn name(&self) -> &'static str {
        "real"
    }

    async fn ping_probes(
        &self,
        cancel: &CancelToken,
    ) -> Result<Vec<f64>, DiagError> {
        let mut probes = Vec::with_capacity(PING_PROBES);

        for probe in 0..PING_PROBES {
            cancel.checkpoint()?;
            let target = PING_TARGETS[probe % PING_TARGETS.len()];

            let started = Instant::now();
            let outcome = self
                .client
                .get(target)
                .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
                .header(USER_AGENT, UA)
                .send()
                .await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            // An unreachable probe target still took measurable time; the
            // timing is kept either way.
            if let Err(e) = outcome {
                warn!("ping probe to {} failed: {}", target, e);
            }
            debug!("ping probe {} -> {:.1} ms", target, elapsed_ms);
            probes.push(elapsed_ms);
        }

        Ok(probes)
    }

    async fn transfer(
        &self,
        phase: Phase,
        bytes: u64,
        chunks: Option<UnboundedSender<ChunkUpdate>>,
        cancel: &CancelToken,
    ) -> Result<Vec<Sample>, DiagError> {
        cancel.checkpoint()?;
        let sample = match phase {
            Phase::Download => self.download(bytes, &chunks, cancel).await?,
            Phase::Upload => self.upload(bytes).await?,
            Phase::Ping => {
                return Err(DiagError::unexpected(
                    "ping phase does not transfer bytes",
                ))
            }
        };

        if let Some(tx) = &chunks {
            let _ = tx.send(ChunkUpdate {
                bytes_done: sample.bytes,
                total_bytes: bytes,
            });
        }

        Ok(vec![sample])
    }
}

impl HttpSampler {
    async fn download(
        &self,
        bytes: u64,
        chunks: &Option<UnboundedSender<ChunkUpdate>>,
        cancel: &CancelToken,
    ) -> Result<Sample, DiagError> {
        let url = format!("{}/__down?bytes={}", BASE_URL, bytes);
        debug!("real download of {} bytes", bytes);

        let started = Instant::now();
        let mut response = self
            .client
            .get(&url)
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .header(USER_AGENT, UA)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                DiagError::measurement(Phase::Download, e.to_string())
            })?;

        let mut received: u64 = 0;
        while let Some(body_chunk) = response.chunk().await.map_err(|e| {
            DiagError::measurement(Phase::Download, e.to_string())
        })? {
            cancel.checkpoint()?;
            received += body_chunk.len() as u64;
            if let Some(tx) = chunks {
                let _ = tx.send(ChunkUpdate {
                    bytes_done: received.min(bytes),
                    total_bytes: bytes,
                });
            }
        }

        Ok(Sample::new(received, started.elapsed()))
    }

    async fn upload(&self, bytes: u64) -> Result<Sample, DiagError> {
        let url = format!("{}/__up", BASE_URL);
        debug!("real upload of {} bytes", bytes);
        // Random payload so transparent compression cannot flatter the
        // measurement.
        let mut payload = vec![0u8; bytes as usize];
        rand::Rng::fill(&mut rand::thread_rng(), &mut payload[..]);

        let started = Instant::now();
        self.client
            .post(&url)
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .header(USER_AGENT, UA)
            .body(payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                DiagError::measurement(Phase::Upload, e.to_string())
            })?;

        Ok(Sample::new(bytes, started.elapsed()))
    }
}
