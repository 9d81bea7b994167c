//! Trace utilities

/// Trace category for key binding and inputrc processing.
pub const BINDINGS: &str = "bindings";
/// Trace category for the display engine.
pub const DISPLAY: &str = "display";
/// Trace category for key dispatch and input reading.
pub const INPUT: &str = "input";
/// Trace category for signal coordination.
pub const SIGNALS: &str = "signals";
