//! Live terminal dashboard.
//!
//! Renders per-phase gauges and the final summary while a test run is in
//! flight, fed by the orchestrator's progress events.

pub mod controller;
pub mod display_mode;
pub mod renderer;
pub mod state;

pub use controller::TuiController;
pub use display_mode::DisplayMode;
pub use state::DashboardState;
