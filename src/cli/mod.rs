pub mod format;
pub mod tui;
