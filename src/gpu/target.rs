/// The boundary between the pass pipeline and whatever executes the passes
///
/// The pipeline only says "run this program, reading this texture, writing
/// that surface, with these uniforms". Backends own every texture and
/// framebuffer object.

use crate::error::Result;
use crate::kernel::{Kernel, WEIGHT_ROWS};
use crate::state::data::{Frame, SourceImage, TexelOffset};

/// The filter programs a backend must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderProgram {
    Passthrough,
    GaussianBlur,
    Bilateral,
    Sharpen,
    EdgeDetection,
}

impl ShaderProgram {
    pub const ALL: [ShaderProgram; 5] = [
        Self::Passthrough,
        Self::GaussianBlur,
        Self::Bilateral,
        Self::Sharpen,
        Self::EdgeDetection,
    ];
}

/// Texture a pass samples from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSlot {
    Source,
    Offscreen,
}

/// Framebuffer a pass draws into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Screen,
    Offscreen,
}

/// Uniform values for one pass
#[derive(Debug, Clone, PartialEq)]
pub struct PassUniforms {
    pub texel_offset: TexelOffset,
    /// Edge length of `weights`
    pub kernel_size: u32,
    pub weights: Vec<f32>,
    /// Bilateral intensity sensitivity
    pub range: f32,
    /// Sharpening strength
    pub scale_factor: f32,
}

impl PassUniforms {
    /// Uniforms for programs that take no kernel
    pub fn plain(texel_offset: TexelOffset) -> Self {
        Self {
            texel_offset,
            kernel_size: 0,
            weights: Vec::new(),
            range: 0.0,
            scale_factor: 0.0,
        }
    }

    pub fn with_kernel(texel_offset: TexelOffset, kernel: &Kernel) -> Self {
        Self {
            texel_offset,
            kernel_size: kernel.size() as u32,
            weights: kernel.weights().to_vec(),
            range: 0.0,
            scale_factor: 0.0,
        }
    }

    /// Weights packed four per row for a uniform buffer
    pub fn padded_weights(&self) -> [[f32; 4]; WEIGHT_ROWS] {
        let mut rows = [[0.0f32; 4]; WEIGHT_ROWS];
        for (i, w) in self.weights.iter().take(WEIGHT_ROWS * 4).enumerate() {
            rows[i / 4][i % 4] = *w;
        }
        rows
    }
}

/// One full-screen draw
#[derive(Debug, Clone, PartialEq)]
pub struct PassDescriptor {
    pub program: ShaderProgram,
    pub input: TextureSlot,
    pub output: Surface,
    pub uniforms: PassUniforms,
}

/// Capability required from a rendering backend
pub trait RenderTarget {
    /// (Re)create the source texture and a screen framebuffer of the image's size
    fn upload_source(&mut self, image: &SourceImage) -> Result<()>;

    /// Make an off-screen target of the given size available, reusing the
    /// pooled one when the size matches
    fn ensure_offscreen(&mut self, width: u32, height: u32) -> Result<()>;

    /// Drop the pooled off-screen target
    fn release_offscreen(&mut self);

    /// Execute one pass to completion
    fn draw(&mut self, pass: &PassDescriptor) -> Result<()>;

    /// Read back the screen framebuffer
    fn read_screen(&mut self) -> Result<Frame>;

    /// Short description for logs
    fn describe(&self) -> String;
}

impl<T: RenderTarget + ?Sized> RenderTarget for Box<T> {
    fn upload_source(&mut self, image: &SourceImage) -> Result<()> {
        (**self).upload_source(image)
    }

    fn ensure_offscreen(&mut self, width: u32, height: u32) -> Result<()> {
        (**self).ensure_offscreen(width, height)
    }

    fn release_offscreen(&mut self) {
        (**self).release_offscreen()
    }

    fn draw(&mut self, pass: &PassDescriptor) -> Result<()> {
        (**self).draw(pass)
    }

    fn read_screen(&mut self) -> Result<Frame> {
        (**self).read_screen()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
