/// Rendering backends for the filter passes
///
/// Architecture:
/// - `target.rs` - the `RenderTarget` boundary the pass pipeline drives
/// - `shaders.rs` - WGSL filter programs
/// - `pipeline.rs` - wgpu implementation
/// - `software.rs` - CPU reference implementation

pub mod pipeline;
pub mod shaders;
pub mod software;
pub mod target;

pub use pipeline::GpuTarget;
pub use software::SoftwareTarget;
pub use target::{PassDescriptor, PassUniforms, RenderTarget, ShaderProgram, Surface, TextureSlot};
