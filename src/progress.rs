//! Progress events and the source that drives them.
//!
//! The percentage shown for a phase can come from two places which must not
//! be conflated: a cosmetic fixed-step ticker decoupled from actual chunk
//! completion (the interactive default), or the sampler's true bytes-so-far
//! reports. [`ProgressSource`] names the choice explicitly.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::aggregate::PhaseResult;
use crate::sampler::Phase;

/// Fixed ticker step per phase: +10% per tick for ping, +2% per tick for
/// download/upload.
pub fn timer_step(phase: Phase) -> u8 {
    match phase {
        Phase::Ping => 10,
        Phase::Download | Phase::Upload => 2,
    }
}

/// Interval between cosmetic ticker steps.
pub const TIMER_TICK: Duration = Duration::from_millis(100);

/// Where a phase's displayed progress percentage comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressSource {
    /// Periodic timer emitting fixed steps, independent of chunk timing.
    /// An approximation for display only.
    #[default]
    Timer,
    /// True progress derived from chunk completion reports.
    Chunks,
}

/// Raw per-chunk completion report from a sampler.
#[derive(Debug, Clone, Copy)]
pub struct ChunkUpdate {
    pub bytes_done: u64,
    pub total_bytes: u64,
}

impl ChunkUpdate {
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        ((self.bytes_done.saturating_mul(100)) / self.total_bytes).min(100)
            as u8
    }
}

/// Events emitted during test execution for the display task.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A new phase became active.
    PhaseChange(Phase),
    /// Progress update for the active phase, 0..=100.
    PhaseProgress { phase: Phase, percent: u8 },
    /// The phase finished and produced a result (zero-valued on failure).
    PhaseFinished { phase: Phase, result: PhaseResult },
    /// All phases done; the run reached Completed.
    RunCompleted,
    /// The run aborted with a surfaced message.
    RunFailed(String),
}

/// Sink for progress events. Absent in silent mode.
pub type EventSink = Option<UnboundedSender<ProgressEvent>>;

pub fn emit(sink: &EventSink, event: ProgressEvent) {
    if let Some(tx) = sink {
        // The display side hanging up is not an error worth surfacing.
        let _ = tx.send(event);
    }
}

/// Spawn the cosmetic ticker for `phase`.
///
/// Steps the percentage by the phase's fixed increment on every tick,
/// capping at 99 until the orchestrator reports completion. The caller
/// aborts the handle when the phase ends.
pub fn spawn_timer_ticker(
    phase: Phase,
    sink: UnboundedSender<ProgressEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let step = timer_step(phase);
        let mut percent: u8 = 0;
        let mut interval = tokio::time::interval(TIMER_TICK);
        loop {
            interval.tick().await;
            percent = percent.saturating_add(step).min(99);
            if sink
                .send(ProgressEvent::PhaseProgress { phase, percent })
                .is_err()
            {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_steps() {
        assert_eq!(timer_step(Phase::Ping), 10);
        assert_eq!(timer_step(Phase::Download), 2);
        assert_eq!(timer_step(Phase::Upload), 2);
    }

    #[test]
    fn test_chunk_update_percent() {
        let update = ChunkUpdate { bytes_done: 512, total_bytes: 1024 };
        assert_eq!(update.percent(), 50);

        let done = ChunkUpdate { bytes_done: 1024, total_bytes: 1024 };
        assert_eq!(done.percent(), 100);

        let empty = ChunkUpdate { bytes_done: 0, total_bytes: 0 };
        assert_eq!(empty.percent(), 100);
    }

    #[test]
    fn test_chunk_update_percent_never_exceeds_100() {
        let over = ChunkUpdate { bytes_done: 2048, total_bytes: 1024 };
        assert_eq!(over.percent(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_emits_monotonic_capped_progress() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = spawn_timer_ticker(Phase::Ping, tx);

        let mut last = 0u8;
        for _ in 0..15 {
            match rx.recv().await {
                Some(ProgressEvent::PhaseProgress { phase, percent }) => {
                    assert_eq!(phase, Phase::Ping);
                    assert!(percent >= last);
                    assert!(percent <= 99);
                    last = percent;
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        handle.abort();
        // 15 ticks at +10 each must have hit the 99 cap.
        assert_eq!(last, 99);
    }
}
