//! TUI panel implementations.

mod bar;
mod diagnostics;
mod options;

pub use bar::BarPanel;
pub use diagnostics::DiagnosticsPanel;
pub use options::OptionsPanel;
