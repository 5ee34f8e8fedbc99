/// Viewer widgets
///
/// - `panel.rs` - filter checkboxes and parameter controls

pub mod panel;
