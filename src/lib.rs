/// Filter Viewer - GPU convolution filters for still images
///
/// The library is the programmatic core consumed by the viewer binary (or
/// any other UI layer):
/// - `kernel.rs` - Gaussian, sharpening and edge-detection weight tables
/// - `state/` - images, mutually exclusive filter selection, settings
/// - `gpu/` - the `RenderTarget` boundary with wgpu and software backends
/// - `render.rs` - the one/two pass pipeline driving a `RenderTarget`
/// - `image_io.rs` - decode/encode helpers at the edges

pub mod error;
pub mod gpu;
pub mod image_io;
pub mod kernel;
pub mod render;
pub mod state;

pub use error::{FilterError, Result};
pub use render::PassPipeline;
pub use state::filter::{FilterKind, FilterParams, FilterSelector, PassPlan};
