/// CPU reference backend
///
/// Executes the same programs as the WGSL shaders, texel by texel, with
/// clamp-to-edge sampling and RGBA8 storage for every surface. Used when no
/// GPU adapter is available and as the deterministic backend in tests.

use tracing::debug;

use super::target::{PassDescriptor, PassUniforms, RenderTarget, ShaderProgram, Surface, TextureSlot};
use crate::error::{FilterError, Result};
use crate::state::data::{Frame, SourceImage};

/// An RGBA8 surface
#[derive(Debug, Clone)]
struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Texture {
    fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Normalized texel with coordinates clamped into the texture
    fn fetch(&self, x: i32, y: i32) -> [f32; 4] {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        let i = (y * self.width as usize + x) * 4;
        let p = &self.pixels[i..i + 4];
        [
            f32::from(p[0]) / 255.0,
            f32::from(p[1]) / 255.0,
            f32::from(p[2]) / 255.0,
            f32::from(p[3]) / 255.0,
        ]
    }
}

/// Software `RenderTarget`
#[derive(Debug, Default)]
pub struct SoftwareTarget {
    source: Option<Texture>,
    screen: Option<Texture>,
    offscreen: Option<Texture>,
    /// Count of off-screen allocations, for checking reuse
    offscreen_allocations: usize,
}

impl SoftwareTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times an off-screen surface has been allocated
    pub fn offscreen_allocations(&self) -> usize {
        self.offscreen_allocations
    }

    pub fn has_offscreen(&self) -> bool {
        self.offscreen.is_some()
    }
}

impl RenderTarget for SoftwareTarget {
    fn upload_source(&mut self, image: &SourceImage) -> Result<()> {
        let (width, height) = image.dimensions();
        self.source = Some(Texture {
            width,
            height,
            pixels: image.pixels().to_vec(),
        });
        self.screen = Some(Texture::blank(width, height));
        debug!(width, height, "software source uploaded");
        Ok(())
    }

    fn ensure_offscreen(&mut self, width: u32, height: u32) -> Result<()> {
        let reusable = self
            .offscreen
            .as_ref()
            .is_some_and(|t| t.width == width && t.height == height);
        if !reusable {
            self.offscreen = Some(Texture::blank(width, height));
            self.offscreen_allocations += 1;
            debug!(width, height, "software off-screen target allocated");
        }
        Ok(())
    }

    fn release_offscreen(&mut self) {
        self.offscreen = None;
    }

    fn draw(&mut self, pass: &PassDescriptor) -> Result<()> {
        if pass.input == TextureSlot::Offscreen && pass.output == Surface::Offscreen {
            return Err(FilterError::invalid("a pass cannot read and write the off-screen target"));
        }

        let input = match pass.input {
            TextureSlot::Source => self.source.as_ref(),
            TextureSlot::Offscreen => self.offscreen.as_ref(),
        }
        .ok_or_else(|| FilterError::unavailable(format!("{:?} texture is not allocated", pass.input)))?;

        let (width, height) = match pass.output {
            Surface::Screen => self.screen.as_ref(),
            Surface::Offscreen => self.offscreen.as_ref(),
        }
        .map(|t| (t.width, t.height))
        .ok_or_else(|| FilterError::unavailable(format!("{:?} surface is not allocated", pass.output)))?;

        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let color = shade(pass.program, input, x, y, &pass.uniforms);
                pixels.extend(color.iter().map(|c| to_unorm8(*c)));
            }
        }

        let output = match pass.output {
            Surface::Screen => self.screen.as_mut(),
            Surface::Offscreen => self.offscreen.as_mut(),
        };
        if let Some(surface) = output {
            surface.pixels = pixels;
        }
        Ok(())
    }

    fn read_screen(&mut self) -> Result<Frame> {
        let screen = self
            .screen
            .as_ref()
            .ok_or_else(|| FilterError::unavailable("no screen framebuffer, load an image first"))?;
        Ok(Frame {
            width: screen.width,
            height: screen.height,
            pixels: screen.pixels.clone(),
        })
    }

    fn describe(&self) -> String {
        "software".to_string()
    }
}

/// Run `program` for the output texel at (x, y)
fn shade(program: ShaderProgram, input: &Texture, x: i32, y: i32, uniforms: &PassUniforms) -> [f32; 4] {
    let center = input.fetch(x, y);
    match program {
        ShaderProgram::Passthrough => center,
        ShaderProgram::GaussianBlur => {
            let mut sum = [0.0f32; 3];
            for_each_tap(input, x, y, uniforms, |w, texel| {
                for c in 0..3 {
                    sum[c] += w * texel[c];
                }
            });
            [sum[0], sum[1], sum[2], center[3]]
        }
        ShaderProgram::Bilateral => {
            let range = uniforms.range;
            let denom = 2.0 * range * range;
            let mut sum = [0.0f32; 3];
            let mut norm = 0.0f32;
            for_each_tap(input, x, y, uniforms, |w, texel| {
                let dist_sq: f32 = (0..3).map(|c| (texel[c] - center[c]).powi(2)).sum();
                let weight = w * (-dist_sq / denom).exp();
                for c in 0..3 {
                    sum[c] += weight * texel[c];
                }
                norm += weight;
            });
            if norm > 0.0 {
                [sum[0] / norm, sum[1] / norm, sum[2] / norm, center[3]]
            } else {
                center
            }
        }
        ShaderProgram::Sharpen => {
            let mut laplacian = [0.0f32; 3];
            for_each_tap(input, x, y, uniforms, |w, texel| {
                for c in 0..3 {
                    laplacian[c] += w * texel[c];
                }
            });
            let s = uniforms.scale_factor;
            [
                center[0] + s * laplacian[0],
                center[1] + s * laplacian[1],
                center[2] + s * laplacian[2],
                center[3],
            ]
        }
        ShaderProgram::EdgeDetection => {
            let mut gradient = [0.0f32; 3];
            for_each_tap(input, x, y, uniforms, |w, texel| {
                for c in 0..3 {
                    gradient[c] += w * texel[c];
                }
            });
            [gradient[0].abs(), gradient[1].abs(), gradient[2].abs(), center[3]]
        }
    }
}

/// Visit every kernel tap around (x, y); kernel row 0 lies above the centre
fn for_each_tap(
    input: &Texture,
    x: i32,
    y: i32,
    uniforms: &PassUniforms,
    mut visit: impl FnMut(f32, [f32; 4]),
) {
    let n = uniforms.kernel_size as i32;
    let half = n / 2;
    for row in 0..n {
        for col in 0..n {
            let Some(&w) = uniforms.weights.get((row * n + col) as usize) else {
                continue;
            };
            visit(w, input.fetch(x + col - half, y + row - half));
        }
    }
}

fn to_unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
