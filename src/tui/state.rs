//! Shared dashboard state, updated from progress events.

use crate::aggregate::PhaseResult;
use crate::progress::ProgressEvent;
use crate::sampler::Phase;

/// Display state for one phase's gauge.
#[derive(Debug, Clone, Default)]
pub struct PhaseView {
    pub percent: u8,
    pub result: Option<PhaseResult>,
}

impl PhaseView {
    pub fn finished(&self) -> bool {
        self.result.is_some()
    }

    /// A finished phase with a zero-progress result never completed its
    /// samples: it failed and was continued past.
    pub fn failed(&self) -> bool {
        self.result.map(|r| r.progress == 0).unwrap_or(false)
    }
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub active_phase: Option<Phase>,
    pub ping: PhaseView,
    pub download: PhaseView,
    pub upload: PhaseView,
    pub completed: bool,
    pub error: Option<String>,
    pub server_label: String,
    pub network_label: Option<String>,
}

impl DashboardState {
    pub fn new(server_label: String) -> Self {
        DashboardState { server_label, ..Default::default() }
    }

    pub fn view(&self, phase: Phase) -> &PhaseView {
        match phase {
            Phase::Ping => &self.ping,
            Phase::Download => &self.download,
            Phase::Upload => &self.upload,
        }
    }

    fn view_mut(&mut self, phase: Phase) -> &mut PhaseView {
        match phase {
            Phase::Ping => &mut self.ping,
            Phase::Download => &mut self.download,
            Phase::Upload => &mut self.upload,
        }
    }

    /// The run settled, one way or the other.
    pub fn finished(&self) -> bool {
        self.completed || self.error.is_some()
    }

    pub fn update_from_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::PhaseChange(phase) => {
                self.active_phase = Some(*phase);
            }
            ProgressEvent::PhaseProgress { phase, percent } => {
                let view = self.view_mut(*phase);
                // Ticker events can arrive late; progress never walks back.
                view.percent = view.percent.max(*percent);
            }
            ProgressEvent::PhaseFinished { phase, result } => {
                let view = self.view_mut(*phase);
                view.percent = 100;
                view.result = Some(*result);
            }
            ProgressEvent::RunCompleted => {
                self.active_phase = None;
                self.completed = true;
            }
            ProgressEvent::RunFailed(message) => {
                self.active_phase = None;
                self.error = Some(message.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::PhaseResult;

    #[test]
    fn test_progress_never_walks_back() {
        let mut state = DashboardState::default();
        state.update_from_event(&ProgressEvent::PhaseProgress {
            phase: Phase::Download,
            percent: 40,
        });
        state.update_from_event(&ProgressEvent::PhaseProgress {
            phase: Phase::Download,
            percent: 20,
        });
        assert_eq!(state.download.percent, 40);
    }

    #[test]
    fn test_phase_finished_pins_progress() {
        let mut state = DashboardState::default();
        let mut result = PhaseResult::zeroed(Phase::Ping);
        result.value = 21.4;
        result.progress = 100;

        state.update_from_event(&ProgressEvent::PhaseFinished {
            phase: Phase::Ping,
            result,
        });
        assert_eq!(state.ping.percent, 100);
        assert!(state.ping.finished());
        assert!(!state.ping.failed());
    }

    #[test]
    fn test_zeroed_result_reads_as_failed() {
        let mut state = DashboardState::default();
        state.update_from_event(&ProgressEvent::PhaseFinished {
            phase: Phase::Upload,
            result: PhaseResult::zeroed(Phase::Upload),
        });
        assert!(state.upload.failed());
    }

    #[test]
    fn test_run_completed_clears_active_phase() {
        let mut state = DashboardState::default();
        state.update_from_event(&ProgressEvent::PhaseChange(Phase::Upload));
        assert_eq!(state.active_phase, Some(Phase::Upload));

        state.update_from_event(&ProgressEvent::RunCompleted);
        assert_eq!(state.active_phase, None);
        assert!(state.finished());
    }

    #[test]
    fn test_run_failed_records_message() {
        let mut state = DashboardState::default();
        state.update_from_event(&ProgressEvent::RunFailed(
            "test run cancelled".into(),
        ));
        assert_eq!(state.error.as_deref(), Some("test run cancelled"));
        assert!(state.finished());
    }
}
