//! Sequential test orchestration.
//!
//! Drives the three phases in fixed order (ping, download, upload) over a
//! single mutable [`TestRun`] that the orchestrator owns exclusively while
//! `Testing`. Readers only ever see a snapshot after the run settles into
//! `Completed` or `Errored`.

use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::aggregate::{aggregate_ping, aggregate_transfer, PhaseResult};
use crate::errors::DiagError;
use crate::progress::{
    emit, spawn_timer_ticker, EventSink, ProgressEvent, ProgressSource,
};
use crate::sampler::{CancelToken, Phase, SampleGenerator, SizeClass};

/// Lifecycle of one test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TestState {
    NotStarted,
    Testing,
    Completed,
    Errored,
}

/// Label of the measurement endpoint. Informational only.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub location: String,
}

impl ServerInfo {
    fn for_strategy(strategy: &str) -> Self {
        match strategy {
            "real" => ServerInfo {
                name: "speed.cloudflare.com".into(),
                location: "Cloudflare edge (anycast)".into(),
            },
            _ => ServerInfo {
                name: "simulated".into(),
                location: "local".into(),
            },
        }
    }
}

/// A phase that failed and was continued past.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseFailure {
    pub phase: Phase,
    pub message: String,
}

/// The full session record.
///
/// All three phase slots are always present, zero-valued until their phase
/// runs. A new run replaces the record wholesale; nothing carries over.
#[derive(Debug, Clone, Serialize)]
pub struct TestRun {
    pub state: TestState,
    pub active_phase: Option<Phase>,
    pub ping: PhaseResult,
    pub download: PhaseResult,
    pub upload: PhaseResult,
    pub server: ServerInfo,
    pub failures: Vec<PhaseFailure>,
    pub error: Option<String>,
}

impl TestRun {
    fn new(server: ServerInfo) -> Self {
        TestRun {
            state: TestState::NotStarted,
            active_phase: None,
            ping: PhaseResult::zeroed(Phase::Ping),
            download: PhaseResult::zeroed(Phase::Download),
            upload: PhaseResult::zeroed(Phase::Upload),
            server,
            failures: Vec::new(),
            error: None,
        }
    }

    pub fn result(&self, phase: Phase) -> &PhaseResult {
        match phase {
            Phase::Ping => &self.ping,
            Phase::Download => &self.download,
            Phase::Upload => &self.upload,
        }
    }

    fn result_mut(&mut self, phase: Phase) -> &mut PhaseResult {
        match phase {
            Phase::Ping => &mut self.ping,
            Phase::Download => &mut self.download,
            Phase::Upload => &mut self.upload,
        }
    }

    pub fn phase_failed(&self, phase: Phase) -> bool {
        self.failures.iter().any(|f| f.phase == phase)
    }
}

/// Drives a [`SampleGenerator`] through the fixed phase sequence.
pub struct Orchestrator<S> {
    sampler: S,
    size: SizeClass,
    progress_source: ProgressSource,
    run: TestRun,
}

impl<S: SampleGenerator> Orchestrator<S> {
    pub fn new(sampler: S, size: SizeClass) -> Self {
        let server = ServerInfo::for_strategy(sampler.name());
        Orchestrator {
            sampler,
            size,
            progress_source: ProgressSource::default(),
            run: TestRun::new(server),
        }
    }

    pub fn with_progress_source(mut self, source: ProgressSource) -> Self {
        self.progress_source = source;
        self
    }

    /// The current run record. Stable once the state is `Completed` or
    /// `Errored`.
    pub fn run(&self) -> &TestRun {
        &self.run
    }

    /// Execute a full run.
    ///
    /// Starting over from `Completed` or `NotStarted` resets everything;
    /// starting while `Testing` is rejected. A `MeasurementFailed` in one
    /// phase is recorded and the next phase still runs; only cancellation
    /// or an unexpected failure stops the sequence.
    pub async fn start(
        &mut self,
        events: EventSink,
        cancel: &CancelToken,
    ) -> Result<&TestRun, DiagError> {
        if self.run.state == TestState::Testing {
            return Err(DiagError::invalid_input(
                "state",
                "a test run is already in progress",
            ));
        }

        let server = ServerInfo::for_strategy(self.sampler.name());
        self.run = TestRun::new(server);
        self.run.state = TestState::Testing;
        info!(
            "starting {} test run at {:?} size",
            self.sampler.name(),
            self.size
        );

        for phase in Phase::ORDER {
            self.run.active_phase = Some(phase);
            emit(&events, ProgressEvent::PhaseChange(phase));

            let outcome = self.execute_phase(phase, &events, cancel).await;
            match outcome {
                Ok(result) => {
                    info!("{} phase finished: {}", phase, result.value);
                    *self.run.result_mut(phase) = result;
                    emit(
                        &events,
                        ProgressEvent::PhaseProgress { phase, percent: 100 },
                    );
                    emit(
                        &events,
                        ProgressEvent::PhaseFinished { phase, result },
                    );
                }
                Err(DiagError::MeasurementFailed { message, .. }) => {
                    warn!("{} phase failed, continuing: {}", phase, message);
                    self.run.failures.push(PhaseFailure { phase, message });
                    let zeroed = PhaseResult::zeroed(phase);
                    *self.run.result_mut(phase) = zeroed;
                    emit(
                        &events,
                        ProgressEvent::PhaseFinished { phase, result: zeroed },
                    );
                }
                Err(DiagError::Cancelled) => {
                    info!("run cancelled during {} phase", phase);
                    self.run.active_phase = None;
                    self.run.state = TestState::Errored;
                    self.run.error = Some("test run cancelled".into());
                    emit(
                        &events,
                        ProgressEvent::RunFailed("test run cancelled".into()),
                    );
                    return Err(DiagError::Cancelled);
                }
                Err(other) => {
                    // Outside the per-phase boundary: full-run abort back
                    // to NotStarted with a surfaced message.
                    error!("unexpected failure in {} phase: {}", phase, other);
                    let message = other.to_string();
                    self.run = TestRun::new(ServerInfo::for_strategy(
                        self.sampler.name(),
                    ));
                    self.run.error = Some(message.clone());
                    emit(&events, ProgressEvent::RunFailed(message));
                    return Err(other);
                }
            }
        }

        self.run.active_phase = None;
        if self.run.failures.len() == Phase::ORDER.len() {
            self.run.state = TestState::Errored;
            let message = "all test phases failed".to_string();
            self.run.error = Some(message.clone());
            emit(&events, ProgressEvent::RunFailed(message));
        } else {
            self.run.state = TestState::Completed;
            emit(&events, ProgressEvent::RunCompleted);
        }

        Ok(&self.run)
    }

    async fn execute_phase(
        &self,
        phase: Phase,
        events: &EventSink,
        cancel: &CancelToken,
    ) -> Result<PhaseResult, DiagError> {
        // Progress plumbing per source: a cosmetic ticker, or a forwarder
        // translating the sampler's chunk reports into events.
        let mut ticker = None;
        let mut forwarder = None;
        let mut chunk_tx = None;

        if let Some(tx) = events {
            match self.progress_source {
                ProgressSource::Timer => {
                    ticker = Some(spawn_timer_ticker(phase, tx.clone()));
                }
                ProgressSource::Chunks => {
                    let (update_tx, mut update_rx) =
                        mpsc::unbounded_channel::<crate::progress::ChunkUpdate>();
                    let event_tx = tx.clone();
                    forwarder = Some(tokio::spawn(async move {
                        while let Some(update) = update_rx.recv().await {
                            let sent =
                                event_tx.send(ProgressEvent::PhaseProgress {
                                    phase,
                                    percent: update.percent(),
                                });
                            if sent.is_err() {
                                break;
                            }
                        }
                    }));
                    chunk_tx = Some(update_tx);
                }
            }
        }

        let outcome = self.sample_phase(phase, chunk_tx, cancel).await;

        if let Some(handle) = ticker {
            handle.abort();
        }
        if let Some(handle) = forwarder {
            // The chunk sender is dropped by now, so the forwarder drains
            // and exits on its own.
            let _ = handle.await;
        }

        outcome
    }

    async fn sample_phase(
        &self,
        phase: Phase,
        chunk_tx: Option<mpsc::UnboundedSender<crate::progress::ChunkUpdate>>,
        cancel: &CancelToken,
    ) -> Result<PhaseResult, DiagError> {
        if phase == Phase::Ping {
            let probes = self.sampler.ping_probes(cancel).await?;
            return Ok(aggregate_ping(&probes));
        }

        let bytes = self.size.bytes();
        match self
            .sampler
            .transfer(phase, bytes, chunk_tx.clone(), cancel)
            .await
        {
            Ok(samples) => Ok(aggregate_transfer(phase, &samples)),
            Err(DiagError::MeasurementFailed { message, .. })
                if self.size != SizeClass::Small =>
            {
                // The one sanctioned fallback: retry once at the smallest
                // tier before giving up on the phase.
                warn!(
                    "{} at {:?} size failed ({}), retrying at Small",
                    phase, self.size, message
                );
                let samples = self
                    .sampler
                    .transfer(
                        phase,
                        SizeClass::Small.bytes(),
                        chunk_tx,
                        cancel,
                    )
                    .await?;
                Ok(aggregate_transfer(phase, &samples))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::simulated::SimulatedSampler;
    use crate::sampler::Sample;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedSender;

    #[derive(Default)]
    struct ScriptedSampler {
        fail_ping: bool,
        fail_download: bool,
        fail_upload: bool,
        transfer_calls: AtomicUsize,
    }

    impl ScriptedSampler {
        fn fails(&self, phase: Phase) -> bool {
            match phase {
                Phase::Ping => self.fail_ping,
                Phase::Download => self.fail_download,
                Phase::Upload => self.fail_upload,
            }
        }
    }

    impl SampleGenerator for ScriptedSampler {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn ping_probes(
            &self,
            cancel: &CancelToken,
        ) -> Result<Vec<f64>, DiagError> {
            cancel.checkpoint()?;
            if self.fail_ping {
                return Err(DiagError::measurement(Phase::Ping, "down"));
            }
            Ok(vec![20.0, 22.0, 19.0, 25.0, 21.0])
        }

        async fn transfer(
            &self,
            phase: Phase,
            bytes: u64,
            chunks: Option<UnboundedSender<crate::progress::ChunkUpdate>>,
            cancel: &CancelToken,
        ) -> Result<Vec<Sample>, DiagError> {
            cancel.checkpoint()?;
            self.transfer_calls.fetch_add(1, Ordering::SeqCst);
            if self.fails(phase) {
                return Err(DiagError::measurement(phase, "down"));
            }
            if let Some(tx) = &chunks {
                let _ = tx.send(crate::progress::ChunkUpdate {
                    bytes_done: bytes,
                    total_bytes: bytes,
                });
            }
            Ok(vec![Sample::new(bytes, Duration::from_secs(1))])
        }
    }

    #[tokio::test]
    async fn test_successful_run_completes_in_order() {
        let sampler = ScriptedSampler::default();
        let mut orchestrator = Orchestrator::new(sampler, SizeClass::Small);
        let cancel = CancelToken::new();

        let run = orchestrator.start(None, &cancel).await.unwrap();
        assert_eq!(run.state, TestState::Completed);
        assert_eq!(run.active_phase, None);
        assert_eq!(run.ping.value, 21.4);
        assert_eq!(run.ping.jitter_ms, Some(6.0));
        assert_eq!(run.download.value, 8.0);
        assert_eq!(run.upload.value, 8.0);
        assert!(run.failures.is_empty());
    }

    #[tokio::test]
    async fn test_upload_runs_despite_earlier_failures() {
        let sampler = ScriptedSampler {
            fail_ping: true,
            fail_download: true,
            ..Default::default()
        };
        let mut orchestrator = Orchestrator::new(sampler, SizeClass::Small);
        let cancel = CancelToken::new();

        let run = orchestrator.start(None, &cancel).await.unwrap();
        assert_eq!(run.state, TestState::Completed);
        assert!(run.phase_failed(Phase::Ping));
        assert!(run.phase_failed(Phase::Download));
        assert!(!run.phase_failed(Phase::Upload));
        assert_eq!(run.ping.value, 0.0);
        assert_eq!(run.download.value, 0.0);
        assert_eq!(run.upload.value, 8.0);
    }

    #[tokio::test]
    async fn test_all_phases_failed_is_errored() {
        let sampler = ScriptedSampler {
            fail_ping: true,
            fail_download: true,
            fail_upload: true,
            ..Default::default()
        };
        let mut orchestrator = Orchestrator::new(sampler, SizeClass::Small);
        let cancel = CancelToken::new();

        let run = orchestrator.start(None, &cancel).await.unwrap();
        assert_eq!(run.state, TestState::Errored);
        assert_eq!(run.error.as_deref(), Some("all test phases failed"));
    }

    #[tokio::test]
    async fn test_failed_transfer_retries_once_at_small() {
        let sampler = ScriptedSampler {
            fail_download: true,
            ..Default::default()
        };
        let mut orchestrator = Orchestrator::new(sampler, SizeClass::Medium);
        let cancel = CancelToken::new();

        orchestrator.start(None, &cancel).await.unwrap();
        // Download tried at Medium, retried at Small, then upload once.
        assert_eq!(
            orchestrator.sampler.transfer_calls.load(Ordering::SeqCst),
            3
        );
        assert!(orchestrator.run().phase_failed(Phase::Download));
    }

    #[tokio::test]
    async fn test_small_tier_failure_is_not_retried() {
        let sampler = ScriptedSampler {
            fail_upload: true,
            ..Default::default()
        };
        let mut orchestrator = Orchestrator::new(sampler, SizeClass::Small);
        let cancel = CancelToken::new();

        orchestrator.start(None, &cancel).await.unwrap();
        // One download call and one upload call, no fallback at Small.
        assert_eq!(
            orchestrator.sampler.transfer_calls.load(Ordering::SeqCst),
            2
        );
    }

    #[tokio::test]
    async fn test_start_while_testing_is_rejected() {
        let sampler = ScriptedSampler::default();
        let mut orchestrator = Orchestrator::new(sampler, SizeClass::Small);
        orchestrator.run.state = TestState::Testing;
        let cancel = CancelToken::new();

        let result = orchestrator.start(None, &cancel).await;
        assert!(matches!(result, Err(DiagError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_rerun_resets_previous_results() {
        let mut orchestrator = Orchestrator::new(
            ScriptedSampler { fail_ping: true, ..Default::default() },
            SizeClass::Small,
        );
        let cancel = CancelToken::new();
        orchestrator.start(None, &cancel).await.unwrap();
        assert!(orchestrator.run().phase_failed(Phase::Ping));

        orchestrator.sampler.fail_ping = false;
        let run = orchestrator.start(None, &cancel).await.unwrap();
        assert!(run.failures.is_empty());
        assert_eq!(run.ping.value, 21.4);
    }

    #[tokio::test]
    async fn test_cancellation_ends_errored() {
        let sampler = ScriptedSampler::default();
        let mut orchestrator = Orchestrator::new(sampler, SizeClass::Small);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = orchestrator.start(None, &cancel).await;
        assert!(matches!(result, Err(DiagError::Cancelled)));
        assert_eq!(orchestrator.run().state, TestState::Errored);
    }

    #[tokio::test]
    async fn test_unexpected_failure_resets_to_not_started() {
        struct ExplodingSampler;
        impl SampleGenerator for ExplodingSampler {
            fn name(&self) -> &'static str {
                "exploding"
            }
            async fn ping_probes(
                &self,
                _cancel: &CancelToken,
            ) -> Result<Vec<f64>, DiagError> {
                Err(DiagError::unexpected("internal invariant broken"))
            }
            async fn transfer(
                &self,
                _phase: Phase,
                _bytes: u64,
                _chunks: Option<
                    UnboundedSender<crate::progress::ChunkUpdate>,
                >,
                _cancel: &CancelToken,
            ) -> Result<Vec<Sample>, DiagError> {
                unreachable!("run aborts during ping")
            }
        }

        let mut orchestrator =
            Orchestrator::new(ExplodingSampler, SizeClass::Small);
        let cancel = CancelToken::new();
        let result = orchestrator.start(None, &cancel).await;
        assert!(matches!(result, Err(DiagError::Unexpected { .. })));
        assert_eq!(orchestrator.run().state, TestState::NotStarted);
        assert!(orchestrator.run().error.is_some());
    }

    #[tokio::test]
    async fn test_chunk_progress_events_reach_the_sink() {
        let sampler = ScriptedSampler::default();
        let mut orchestrator = Orchestrator::new(sampler, SizeClass::Small)
            .with_progress_source(ProgressSource::Chunks);
        let cancel = CancelToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        orchestrator.start(Some(tx), &cancel).await.unwrap();

        let mut phase_changes = Vec::new();
        let mut saw_download_progress = false;
        let mut completed = false;
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::PhaseChange(phase) => phase_changes.push(phase),
                ProgressEvent::PhaseProgress {
                    phase: Phase::Download,
                    percent: 100,
                } => saw_download_progress = true,
                ProgressEvent::RunCompleted => completed = true,
                _ => {}
            }
        }
        assert_eq!(phase_changes, Phase::ORDER.to_vec());
        assert!(saw_download_progress);
        assert!(completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_end_to_end() {
        let mut orchestrator =
            Orchestrator::new(SimulatedSampler::new(), SizeClass::Small);
        let cancel = CancelToken::new();

        let run = orchestrator.start(None, &cancel).await.unwrap();
        assert_eq!(run.state, TestState::Completed);
        assert_eq!(run.ping.packet_loss, Some(0.0));
        assert_eq!(run.download.bytes_transferred, SizeClass::Small.bytes());
        assert_eq!(run.upload.progress, 100);
        assert_eq!(run.server.name, "simulated");
    }
}
