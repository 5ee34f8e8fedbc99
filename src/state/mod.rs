/// State management module
///
/// This module handles all viewer state, including:
/// - Image and frame buffers (data.rs)
/// - Mutually exclusive filter selection (filter.rs)
/// - Persisted settings (settings.rs)

pub mod data;
pub mod filter;
pub mod settings;
