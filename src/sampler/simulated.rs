//! Artificial-delay sample generation.
//!
//! No network traffic is involved. Each chunk "transfers" by sleeping a
//! uniformly random delay from the phase's range, and the measured elapsed
//! time of that sleep becomes the sample. The statistical machinery
//! downstream treats these samples identically to real ones.

use log::debug;
use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Duration, Instant};

use crate::errors::DiagError;
use crate::progress::ChunkUpdate;

use super::{
    CancelToken, Phase, Sample, SampleGenerator, StreamQuality,
    DOWNLOAD_CHUNK_BYTES, DOWNLOAD_DELAY_MS, PING_PROBES, PING_DELAY_MS,
    STREAMING_CHUNK_BYTES, STREAMING_DELAY_MS, THROUGHPUT_DELAY_MS,
    THROUGHPUT_INTERVAL_BYTES, UPLOAD_CHUNK_BYTES, UPLOAD_DELAY_MS,
};

/// Sampler that synthesizes transfer timing through artificial delays.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedSampler;

impl SimulatedSampler {
    pub fn new() -> Self {
        SimulatedSampler
    }

    /// Play back a streaming-sized file in 256 KiB chunks.
    pub async fn stream_chunks(
        &self,
        quality: StreamQuality,
        chunks: Option<UnboundedSender<ChunkUpdate>>,
        cancel: &CancelToken,
    ) -> Result<Vec<Sample>, DiagError> {
        debug!("simulated streaming benchmark at {}", quality);
        chunk_loop(
            quality.file_size_bytes(),
            STREAMING_CHUNK_BYTES,
            STREAMING_DELAY_MS,
            chunks,
            cancel,
        )
        .await
    }

    /// Transfer 1 MiB intervals until `duration` has elapsed.
    pub async fn throughput_intervals(
        &self,
        duration: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<Sample>, DiagError> {
        debug!("simulated throughput benchmark over {:?}", duration);
        let started = Instant::now();
        let mut samples = Vec::new();

        while started.elapsed() < duration {
            cancel.checkpoint()?;
            let chunk_started = Instant::now();
            sleep(random_delay(THROUGHPUT_DELAY_MS)).await;
            samples
                .push(Sample::new(THROUGHPUT_INTERVAL_BYTES, chunk_started.elapsed()));
        }

        Ok(samples)
    }
}

impl SampleGenerator for SimulatedSampler {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn ping_probes(
        &self,
        cancel: &CancelToken,
    ) -> Result<Vec<f64>, DiagError> {
        let mut probes = Vec::with_capacity(PING_PROBES);
        for _ in 0..PING_PROBES {
            cancel.checkpoint()?;
            let started = Instant::now();
            sleep(random_delay(PING_DELAY_MS)).await;
            probes.push(started.elapsed().as_secs_f64() * 1000.0);
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
        let (chunk_bytes, delay_ms) = match phase {
            Phase::Download => (DOWNLOAD_CHUNK_BYTES, DOWNLOAD_DELAY_MS),
            Phase::Upload => (UPLOAD_CHUNK_BYTES, UPLOAD_DELAY_MS),
            Phase::Ping => {
                return Err(DiagError::unexpected(
                    "ping phase does not transfer bytes",
                ))
            }
        };

        debug!(
            "simulated {} transfer of {} bytes in {} byte chunks",
            phase, bytes, chunk_bytes
        );
        chunk_loop(bytes, chunk_bytes, delay_ms, chunks, cancel).await
    }
}

/// Uniform delay from an inclusive millisecond range.
///
/// Pulled into a helper so the thread-local RNG is dropped before any await
/// point, keeping the futures Send.
fn random_delay((lo, hi): (u64, u64)) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

async fn chunk_loop(
    total_bytes: u64,
    chunk_bytes: u64,
    delay_ms: (u64, u64),
    chunks: Option<UnboundedSender<ChunkUpdate>>,
    cancel: &CancelToken,
) -> Result<Vec<Sample>, DiagError> {
    let mut samples = Vec::new();
    let mut done: u64 = 0;

    while done < total_bytes {
        cancel.checkpoint()?;
        let this_chunk = chunk_bytes.min(total_bytes - done);

        let started = Instant::now();
        sleep(random_delay(delay_ms)).await;
        samples.push(Sample::new(this_chunk, started.elapsed()));

        done += this_chunk;
        if let Some(tx) = &chunks {
            let _ = tx.send(ChunkUpdate { bytes_done: done, total_bytes });
        }
    }

    Ok(samples)
}
