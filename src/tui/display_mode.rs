//! Display mode detection.
//!
//! Determines whether to use the live dashboard, silent, or JSON output
//! mode based on CLI flags and terminal capabilities.

/// The display mode for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Full dashboard with live gauges.
    Tui,
    /// No output until final results.
    Silent,
    /// Structured output only.
    Json,
}

impl DisplayMode {
    /// Determine display mode from CLI flags and environment.
    ///
    /// `--json` wins regardless of TTY status; otherwise a TTY gets the
    /// dashboard and a pipe gets silent output.
    pub fn detect(json_flag: bool, is_tty: bool) -> Self {
        if json_flag {
            DisplayMode::Json
        } else if is_tty {
            DisplayMode::Tui
        } else {
            DisplayMode::Silent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_json_flag_wins() {
        assert_eq!(DisplayMode::detect(true, true), DisplayMode::Json);
        assert_eq!(DisplayMode::detect(true, false), DisplayMode::Json);
    }

    #[test]
    fn test_tty_without_json_is_tui() {
        assert_eq!(DisplayMode::detect(false, true), DisplayMode::Tui);
    }

    #[test]
    fn test_pipe_without_json_is_silent() {
        assert_eq!(DisplayMode::detect(false, false), DisplayMode::Silent);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The three-way split is total: json beats tty beats silent.
        #[test]
        fn detection_is_total(
            json_flag in any::<bool>(),
            is_tty in any::<bool>()
        ) {
            let mode = DisplayMode::detect(json_flag, is_tty);
            if json_flag {
                prop_assert_eq!(mode, DisplayMode::Json);
            } else if is_tty {
                prop_assert_eq!(mode, DisplayMode::Tui);
            } else {
                prop_assert_eq!(mode, DisplayMode::Silent);
            }
        }
    }
}
