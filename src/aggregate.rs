//! Reduction of raw samples into per-phase summary statistics.
//!
//! Every numeric field that leaves this module is rounded to two decimals.
//! Speeds follow the `(bytes / 1 MiB * 8) / seconds` rule, with a
//! zero-duration guard so no input can yield NaN or a negative value.

use serde::Serialize;

use crate::sampler::{Phase, Sample, StreamQuality, MIB};
use crate::scoring::{assess_streaming, BufferingRisk};
use crate::stats;

/// Observed extremes across a phase's samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

/// Summary of one completed phase.
///
/// `value` is Mbps for transfer phases and average milliseconds for ping.
/// Jitter and packet loss only apply to ping and stay `None` elsewhere.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PhaseResult {
    pub phase: Phase,
    pub value: f64,
    pub range: Option<MinMax>,
    pub jitter_ms: Option<f64>,
    pub packet_loss: Option<f64>,
    pub bytes_transferred: u64,
    pub duration_secs: f64,
    /// Completion percentage at the time of last update, 0..=100.
    pub progress: u8,
}

impl PhaseResult {
    /// The zero-valued placeholder a failed or not-yet-run phase holds.
    pub fn zeroed(phase: Phase) -> Self {
        PhaseResult {
            phase,
            value: 0.0,
            range: None,
            jitter_ms: None,
            packet_loss: None,
            bytes_transferred: 0,
            duration_secs: 0.0,
            progress: 0,
        }
    }
}

/// Reduce transfer samples to a download/upload result.
///
/// Speed is computed over the whole transfer, not averaged per chunk, so a
/// few slow chunks weigh in proportionally. The reported range is widened
/// to enclose the overall speed when rounding would otherwise let the
/// average escape it.
pub fn aggregate_transfer(phase: Phase, samples: &[Sample]) -> PhaseResult {
    let total_bytes: u64 = samples.iter().map(|s| s.bytes).sum();
    let total_secs: f64 = samples.iter().map(|s| s.elapsed.as_secs_f64()).sum();

    if total_bytes == 0 || total_secs <= 0.0 {
        return PhaseResult::zeroed(phase);
    }

    let speed =
        stats::round2((total_bytes as f64 / MIB as f64 * 8.0) / total_secs);

    let chunk_speeds: Vec<f64> =
        samples.iter().map(Sample::speed_mbps).collect();
    let range = MinMax {
        min: stats::round2(stats::min(&chunk_speeds)).min(speed),
        max: stats::round2(stats::max(&chunk_speeds)).max(speed),
    };

    PhaseResult {
        phase,
        value: speed,
        range: Some(range),
        jitter_ms: None,
        packet_loss: None,
        bytes_transferred: total_bytes,
        duration_secs: stats::round2(total_secs),
        progress: 100,
    }
}

/// Reduce ping probes to a latency result.
///
/// Jitter is exactly `max - min` over the probe set. Packet loss is
/// reported as a flat zero: probes that fail at the transport level are
/// still timed, so nothing is ever counted as lost.
pub fn aggregate_ping(probes_ms: &[f64]) -> PhaseResult {
    if probes_ms.is_empty() {
        return PhaseResult::zeroed(Phase::Ping);
    }

    let min = stats::min(probes_ms);
    let max = stats::max(probes_ms);
    let total_secs = probes_ms.iter().sum::<f64>() / 1000.0;

    PhaseResult {
        phase: Phase::Ping,
        value: stats::round2(stats::mean(probes_ms)),
        range: Some(MinMax {
            min: stats::round2(min),
            max: stats::round2(max),
        }),
        jitter_ms: Some(stats::round2(max - min)),
        packet_loss: Some(0.0),
        bytes_transferred: 0,
        duration_secs: stats::round2(total_secs),
        progress: 100,
    }
}

/// Outcome of a streaming benchmark at one quality tier.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StreamingVerdict {
    pub quality: StreamQuality,
    pub required_bitrate_mbps: f64,
    pub avg_mbps: f64,
    pub min_mbps: f64,
    pub max_mbps: f64,
    pub can_stream: bool,
    pub buffering_risk: BufferingRisk,
    pub duration_secs: f64,
    pub file_size_bytes: u64,
}

pub fn aggregate_streaming(
    quality: StreamQuality,
    samples: &[Sample],
) -> StreamingVerdict {
    let required = quality.required_bitrate_mbps();
    let chunk_speeds: Vec<f64> =
        samples.iter().map(Sample::speed_mbps).collect();
    let total_secs: f64 = samples.iter().map(|s| s.elapsed.as_secs_f64()).sum();

    let avg = stats::round2(stats::mean(&chunk_speeds));
    let min = if chunk_speeds.is_empty() {
        0.0
    } else {
        stats::round2(stats::min(&chunk_speeds))
    };
    let max = if chunk_speeds.is_empty() {
        0.0
    } else {
        stats::round2(stats::max(&chunk_speeds))
    };

    let (can_stream, buffering_risk) = assess_streaming(required, avg, min);

    StreamingVerdict {
        quality,
        required_bitrate_mbps: required,
        avg_mbps: avg,
        min_mbps: min,
        max_mbps: max,
        can_stream,
        buffering_risk,
        duration_secs: stats::round2(total_secs),
        file_size_bytes: quality.file_size_bytes(),
    }
}

/// One point in a sustained-throughput trace.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThroughputPoint {
    pub elapsed_secs: f64,
    pub speed_mbps: f64,
}

/// Aggregate view of a sustained-throughput run.
#[derive(Debug, Clone, Serialize)]
pub struct ThroughputSummary {
    pub duration_secs: f64,
    pub avg_mbps: f64,
    pub min_mbps: f64,
    pub max_mbps: f64,
    /// 100 minus the coefficient of variation as a percentage, floored at
    /// zero. Steadier links score higher.
    pub stability_pct: f64,
    pub total_bytes: u64,
    pub measurements: Vec<ThroughputPoint>,
}

pub fn aggregate_throughput(samples: &[Sample]) -> ThroughputSummary {
    let speeds: Vec<f64> = samples.iter().map(Sample::speed_mbps).collect();
    let total_bytes: u64 = samples.iter().map(|s| s.bytes).sum();
    let total_secs: f64 = samples.iter().map(|s| s.elapsed.as_secs_f64()).sum();

    let avg = stats::mean(&speeds);
    let stability = if speeds.is_empty() || avg <= 0.0 {
        0.0
    } else {
        (100.0 - (stats::stddev(&speeds) / avg) * 100.0).max(0.0)
    };

    let mut measurements = Vec::with_capacity(samples.len());
    let mut elapsed = 0.0;
    for sample in samples {
        elapsed += sample.elapsed.as_secs_f64();
        measurements.push(ThroughputPoint {
            elapsed_secs: stats::round2(elapsed),
            speed_mbps: stats::round2(sample.speed_mbps()),
        });
    }

    ThroughputSummary {
        duration_secs: stats::round2(total_secs),
        avg_mbps: stats::round2(avg),
        min_mbps: if speeds.is_empty() {
            0.0
        } else {
            stats::round2(stats::min(&speeds))
        },
        max_mbps: if speeds.is_empty() {
            0.0
        } else {
            stats::round2(stats::max(&speeds))
        },
        stability_pct: stats::round2(stability),
        total_bytes,
        measurements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_aggregate_transfer_basic() {
        // 1 MiB in one second is 8 Mbps.
        let samples = [Sample::new(MIB, Duration::from_secs(1))];
        let result = aggregate_transfer(Phase::Download, &samples);
        assert_eq!(result.value, 8.0);
        assert_eq!(result.bytes_transferred, MIB);
        let range = result.range.unwrap();
        assert_eq!(range.min, 8.0);
        assert_eq!(range.max, 8.0);
    }

    #[test]
    fn test_aggregate_transfer_zero_duration() {
        let samples = [Sample::new(MIB, Duration::ZERO)];
        let result = aggregate_transfer(Phase::Download, &samples);
        assert_eq!(result.value, 0.0);
        assert!(result.range.is_none());
    }

    #[test]
    fn test_aggregate_transfer_empty() {
        let result = aggregate_transfer(Phase::Upload, &[]);
        assert_eq!(result.value, 0.0);
        assert_eq!(result.bytes_transferred, 0);
    }

    #[test]
    fn test_aggregate_transfer_range_encloses_average() {
        let samples = [
            Sample::new(MIB, Duration::from_millis(500)),
            Sample::new(MIB, Duration::from_millis(2000)),
        ];
        let result = aggregate_transfer(Phase::Download, &samples);
        let range = result.range.unwrap();
        assert!(range.min <= result.value);
        assert!(result.value <= range.max);
        // Overall: 2 MiB over 2.5 s = 6.4 Mbps.
        assert_eq!(result.value, 6.4);
    }

    #[test]
    fn test_aggregate_ping_reference_samples() {
        let result = aggregate_ping(&[20.0, 22.0, 19.0, 25.0, 21.0]);
        assert_eq!(result.value, 21.4);
        let range = result.range.unwrap();
        assert_eq!(range.min, 19.0);
        assert_eq!(range.max, 25.0);
        assert_eq!(result.jitter_ms, Some(6.0));
        assert_eq!(result.packet_loss, Some(0.0));
    }

    #[test]
    fn test_aggregate_ping_order_independent() {
        let forward = aggregate_ping(&[20.0, 22.0, 19.0, 25.0, 21.0]);
        let reversed = aggregate_ping(&[21.0, 25.0, 19.0, 22.0, 20.0]);
        assert_eq!(forward.value, reversed.value);
        assert_eq!(forward.jitter_ms, reversed.jitter_ms);
    }

    #[test]
    fn test_aggregate_ping_empty() {
        let result = aggregate_ping(&[]);
        assert_eq!(result.value, 0.0);
        assert!(result.jitter_ms.is_none());
    }

    #[test]
    fn test_aggregate_streaming_steady_link() {
        // 256 KiB chunks in 100 ms each is a steady 20 Mbps.
        let samples =
            vec![Sample::new(256 * 1024, Duration::from_millis(100)); 10];
        let verdict = aggregate_streaming(StreamQuality::Q1080p, &samples);
        assert!(verdict.can_stream);
        assert_eq!(verdict.buffering_risk, BufferingRisk::Low);
        assert_eq!(verdict.required_bitrate_mbps, 8.0);
    }

    #[test]
    fn test_aggregate_streaming_dip_below_bitrate() {
        let mut samples =
            vec![Sample::new(256 * 1024, Duration::from_millis(100)); 9];
        // One chunk crawling at 2 Mbps.
        samples.push(Sample::new(256 * 1024, Duration::from_secs(1)));
        let verdict = aggregate_streaming(StreamQuality::Q1080p, &samples);
        assert!(!verdict.can_stream);
        assert_eq!(verdict.buffering_risk, BufferingRisk::High);
    }

    #[test]
    fn test_aggregate_throughput_constant_speed() {
        let samples = vec![Sample::new(MIB, Duration::from_secs(1)); 5];
        let summary = aggregate_throughput(&samples);
        assert_eq!(summary.avg_mbps, 8.0);
        assert_eq!(summary.stability_pct, 100.0);
        assert_eq!(summary.total_bytes, 5 * MIB);
        assert_eq!(summary.measurements.len(), 5);
        assert_eq!(summary.measurements[4].elapsed_secs, 5.0);
    }

    #[test]
    fn test_aggregate_throughput_empty() {
        let summary = aggregate_throughput(&[]);
        assert_eq!(summary.avg_mbps, 0.0);
        assert_eq!(summary.stability_pct, 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Speed is never negative or NaN for any sample set.
        #[test]
        fn transfer_speed_well_formed(
            samples in prop::collection::vec(
                (1u64..10 * 1024 * 1024, 0u64..5_000),
                0..40,
            )
        ) {
            let samples: Vec<Sample> = samples
                .into_iter()
                .map(|(bytes, ms)| {
                    Sample::new(bytes, Duration::from_millis(ms))
                })
                .collect();
            let result = aggregate_transfer(Phase::Download, &samples);
            prop_assert!(!result.value.is_nan());
            prop_assert!(result.value >= 0.0);
            if let Some(range) = result.range {
                prop_assert!(range.min <= result.value);
                prop_assert!(result.value <= range.max);
            }
        }

        /// Jitter is exactly max minus min for any probe set.
        #[test]
        fn ping_jitter_is_spread(
            probes in prop::collection::vec(1.0f64..500.0, 1..10)
        ) {
            let result = aggregate_ping(&probes);
            let spread = crate::stats::round2(
                crate::stats::max(&probes) - crate::stats::min(&probes),
            );
            prop_assert_eq!(result.jitter_ms, Some(spread));
        }
    }
}
