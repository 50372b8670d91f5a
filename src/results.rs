//! Final report assembly.
//!
//! Gathers the run record, optional network identity, and derived scores
//! into one serializable structure for JSON output. Scores are recomputed
//! from the phase results on every call, never cached, so two reports built
//! from the same run are identical.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{PhaseResult, StreamingVerdict, ThroughputSummary};
use crate::netinfo::NetworkInfo;
use crate::orchestrator::{PhaseFailure, ServerInfo, TestRun, TestState};
use crate::scoring::{
    self, BufferingRisk, Compatibility, OverallRating, Stability,
};
use crate::sampler::{Phase, StreamQuality};

/// Derived classifications over a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub stability: Stability,
    pub rating: OverallRating,
    /// Per-tier streaming outlook derived from the download result.
    pub streaming: Vec<TierOutlook>,
    pub platforms: Vec<Compatibility>,
    pub games: Vec<Compatibility>,
}

/// Streaming outlook for one quality tier.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TierOutlook {
    pub quality: StreamQuality,
    pub required_bitrate_mbps: f64,
    pub can_stream: bool,
    pub buffering_risk: BufferingRisk,
}

impl ScoreReport {
    /// Derive all classifications from a run's phase results.
    pub fn from_run(run: &TestRun) -> Self {
        let ping = run.ping.value;
        let download = run.download.value;
        let upload = run.upload.value;
        // A failed ping leaves no jitter measurement, which the rating
        // treats as the midpoint rather than the floor.
        let jitter = run.ping.jitter_ms;
        let packet_loss = run.ping.packet_loss.unwrap_or(0.0);
        let download_floor =
            run.download.range.map(|r| r.min).unwrap_or(download);

        let streaming = StreamQuality::ALL
            .iter()
            .map(|&quality| {
                let required = quality.required_bitrate_mbps();
                let (can_stream, buffering_risk) = scoring::assess_streaming(
                    required,
                    download,
                    download_floor,
                );
                TierOutlook {
                    quality,
                    required_bitrate_mbps: required,
                    can_stream,
                    buffering_risk,
                }
            })
            .collect();

        ScoreReport {
            stability: scoring::stability_score(
                ping,
                jitter.unwrap_or(0.0),
                packet_loss,
            ),
            rating: scoring::overall_rating(download, upload, ping, jitter),
            streaming,
            platforms: scoring::platform_compatibility(download, ping),
            games: scoring::game_compatibility(download, ping),
        }
    }
}

/// Complete results from one diagnostic session.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    /// Timestamp when the report was assembled.
    pub timestamp: DateTime<Utc>,
    pub state: TestState,
    pub server: ServerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkInfo>,
    pub ping: PhaseResult,
    pub download: PhaseResult,
    pub upload: PhaseResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<PhaseFailure>,
    /// Surfaced message when the run aborted or every phase failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only once the run reached `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming_benchmark: Option<StreamingVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<ThroughputSummary>,
}

impl DiagnosticReport {
    pub fn new(run: &TestRun, network: Option<NetworkInfo>) -> Self {
        let scores = (run.state == TestState::Completed)
            .then(|| ScoreReport::from_run(run));

        DiagnosticReport {
            timestamp: Utc::now(),
            state: run.state,
            server: run.server.clone(),
            network,
            ping: *run.result(Phase::Ping),
            download: *run.result(Phase::Download),
            upload: *run.result(Phase::Upload),
            failures: run.failures.clone(),
            error: run.error.clone(),
            scores,
            streaming_benchmark: None,
            throughput: None,
        }
    }

    pub fn with_streaming(mut self, verdict: StreamingVerdict) -> Self {
        self.streaming_benchmark = Some(verdict);
        self
    }

    pub fn with_throughput(mut self, summary: ThroughputSummary) -> Self {
        self.throughput = Some(summary);
        self
    }
}
