//! Small numeric helpers shared by the aggregator and scoring engine.

/// Round to two decimal places.
///
/// Every externally reported numeric field goes through this, matching the
/// `round(x * 100) / 100` rule the measurement endpoints use.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    samples.iter().sum::<f64>() / samples.len() as f64
}

pub fn min(samples: &[f64]) -> f64 {
    samples.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn max(samples: &[f64]) -> f64 {
    samples.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Population standard deviation.
pub fn stddev(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let avg = mean(samples);
    let variance = samples
        .iter()
        .map(|sample| (sample - avg).powi(2))
        .sum::<f64>()
        / samples.len() as f64;

    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(87.4999), 87.5);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(21.399999999999999), 21.4);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[20.0, 22.0, 19.0, 25.0, 21.0]), 21.4);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_min_max() {
        let samples = [20.0, 22.0, 19.0, 25.0, 21.0];
        assert_eq!(min(&samples), 19.0);
        assert_eq!(max(&samples), 25.0);
    }

    #[test]
    fn test_stddev_constant_samples() {
        assert_eq!(stddev(&[5.0, 5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_stddev_population() {
        // Population stddev of [2, 4, 4, 4, 5, 5, 7, 9] is exactly 2.
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((stddev(&samples) - 2.0).abs() < 1e-9);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Mean is independent of sample order.
        #[test]
        fn mean_order_independent(
            mut samples in prop::collection::vec(0.0f64..1000.0, 1..50)
        ) {
            let forward = mean(&samples);
            samples.reverse();
            prop_assert!((mean(&samples) - forward).abs() < 1e-9);
        }

        /// min <= mean <= max for any non-empty sample set.
        #[test]
        fn mean_bounded_by_extremes(
            samples in prop::collection::vec(0.0f64..1000.0, 1..50)
        ) {
            let avg = mean(&samples);
            prop_assert!(min(&samples) <= avg + 1e-9);
            prop_assert!(avg <= max(&samples) + 1e-9);
        }

        /// round2 never produces NaN and stays within a half-cent of the input.
        #[test]
        fn round2_close_to_input(value in -1.0e6f64..1.0e6) {
            let rounded = round2(value);
            prop_assert!(!rounded.is_nan());
            prop_assert!((rounded - value).abs() <= 0.005 + 1e-9);
        }
    }
}
