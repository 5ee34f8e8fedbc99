/// Multi-pass rendering of the active filter
///
/// Every call to `PassPipeline::render` walks `Idle -> Pass1 -> (Pass2) ->
/// Idle`. One-pass filters draw straight into the screen framebuffer;
/// separable edge operators draw their x pass into a pooled off-screen
/// target and their y pass from there into the screen.

use tracing::{debug, info, warn};

use crate::error::{FilterError, Result};
use crate::gpu::target::{PassDescriptor, PassUniforms, RenderTarget, ShaderProgram, Surface, TextureSlot};
use crate::kernel::{self, BilateralKernel, EdgePass, Kernel, KernelSize};
use crate::state::data::{Frame, SourceImage, TexelOffset};
use crate::state::filter::{FilterParams, FilterSelector, PassPlan};

/// Where the pass state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Pass1,
    Pass2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LoadedImage {
    width: u32,
    height: u32,
    texel_offset: TexelOffset,
}

/// Cache key for the Gaussian: identical bits give identical weights
type GaussianKey = (KernelSize, u32);

/// Gaussian key plus the range bits
type BilateralKey = (KernelSize, u32, u32);

/// Drives a `RenderTarget` through one or two passes per frame
pub struct PassPipeline<T: RenderTarget> {
    target: T,
    image: Option<LoadedImage>,
    state: PassState,
    gaussian_cache: Option<(GaussianKey, Kernel)>,
    bilateral_cache: Option<(BilateralKey, BilateralKernel)>,
    last_frame: Option<Frame>,
}

impl<T: RenderTarget> std::fmt::Debug for PassPipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassPipeline")
            .field("target", &self.target.describe())
            .field("image", &self.image)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<T: RenderTarget> PassPipeline<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            image: None,
            state: PassState::Idle,
            gaussian_cache: None,
            bilateral_cache: None,
            last_frame: None,
        }
    }

    /// Upload a new source image
    ///
    /// Recomputes the texel offset, drops the pooled off-screen target (its
    /// size belonged to the previous image) and forgets the last frame.
    pub fn load_image(&mut self, image: &SourceImage) -> Result<TexelOffset> {
        self.target.release_offscreen();
        self.last_frame = None;
        self.image = None;

        self.target.upload_source(image)?;

        let texel_offset = image.texel_offset();
        self.image = Some(LoadedImage {
            width: image.width(),
            height: image.height(),
            texel_offset,
        });
        info!(
            width = image.width(),
            height = image.height(),
            backend = %self.target.describe(),
            "image loaded"
        );
        Ok(texel_offset)
    }

    /// Render `filter` (or the original image for `None`) and return the
    /// screen contents
    pub fn render(&mut self, filter: Option<&FilterParams>) -> Result<Frame> {
        let image = self
            .image
            .ok_or_else(|| FilterError::unavailable("no image loaded, nothing to render"))?;
        let filter = filter.map(|params| params.clamped());
        let plan = filter.map(|params| params.plan()).unwrap_or(PassPlan::OnePass);

        let result = self.run_passes(filter.as_ref(), plan, image);
        self.state = PassState::Idle;

        match result {
            Ok(frame) => {
                self.last_frame = Some(frame.clone());
                Ok(frame)
            }
            Err(e) => {
                warn!(error = %e, ?plan, "render failed");
                self.target.release_offscreen();
                self.last_frame = None;
                Err(e)
            }
        }
    }

    /// Render whatever `selector` has active
    pub fn render_selector(&mut self, selector: &FilterSelector) -> Result<Frame> {
        self.render(selector.active().as_ref())
    }

    /// Pixels written to the screen by the most recent successful render
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    /// The frame to hand to an encoder when saving
    pub fn save_frame(&self) -> Result<Frame> {
        self.last_frame
            .clone()
            .ok_or_else(|| FilterError::unavailable("nothing rendered yet, nothing to save"))
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn texel_offset(&self) -> Option<TexelOffset> {
        self.image.map(|i| i.texel_offset)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.map(|i| (i.width, i.height))
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    fn run_passes(&mut self, filter: Option<&FilterParams>, plan: PassPlan, image: LoadedImage) -> Result<Frame> {
        self.state = PassState::Pass1;
        let first_output = match plan {
            PassPlan::OnePass => Surface::Screen,
            PassPlan::TwoPass => Surface::Offscreen,
        };
        let first = self.first_pass(filter, first_output, image.texel_offset)?;

        if plan == PassPlan::TwoPass {
            self.target.ensure_offscreen(image.width, image.height)?;
        }
        debug!(program = ?first.program, output = ?first.output, "pass 1");
        self.target.draw(&first)?;

        if plan == PassPlan::TwoPass {
            self.state = PassState::Pass2;
            let second = self.second_pass(filter, image.texel_offset)?;
            debug!(program = ?second.program, "pass 2");
            self.target.draw(&second)?;
        }

        self.target.read_screen()
    }

    fn first_pass(
        &mut self,
        filter: Option<&FilterParams>,
        output: Surface,
        texel_offset: TexelOffset,
    ) -> Result<PassDescriptor> {
        let (program, uniforms) = match filter {
            None => (ShaderProgram::Passthrough, PassUniforms::plain(texel_offset)),
            Some(FilterParams::Blur(p)) => {
                let key = (p.kernel_size, p.deviation.to_bits());
                let gaussian = memoized(&mut self.gaussian_cache, key, || {
                    kernel::gaussian_kernel(p.kernel_size, p.deviation)
                });
                (ShaderProgram::GaussianBlur, PassUniforms::with_kernel(texel_offset, &gaussian))
            }
            Some(FilterParams::Bilateral(p)) => {
                let key = (p.kernel_size, p.deviation.to_bits(), p.range.to_bits());
                let bilateral = memoized(&mut self.bilateral_cache, key, || {
                    kernel::bilateral_kernel(p.kernel_size, p.deviation, p.range)
                });
                let mut uniforms = PassUniforms::with_kernel(texel_offset, &bilateral.spatial);
                uniforms.range = bilateral.range;
                (ShaderProgram::Bilateral, uniforms)
            }
            Some(FilterParams::Sharpen(p)) => {
                let mut uniforms = PassUniforms::with_kernel(texel_offset, &kernel::sharpening_kernel());
                uniforms.scale_factor = p.scale_factor;
                (ShaderProgram::Sharpen, uniforms)
            }
            Some(FilterParams::Edge(p)) => {
                let pass = if p.algorithm.is_two_pass() {
                    EdgePass::First
                } else {
                    EdgePass::Single
                };
                let table = kernel::edge_kernel(p.algorithm, pass)?;
                (ShaderProgram::EdgeDetection, PassUniforms::with_kernel(texel_offset, &table))
            }
        };
        Ok(PassDescriptor {
            program,
            input: TextureSlot::Source,
            output,
            uniforms,
        })
    }

    fn second_pass(&self, filter: Option<&FilterParams>, texel_offset: TexelOffset) -> Result<PassDescriptor> {
        match filter {
            Some(FilterParams::Edge(p)) => {
                let table = kernel::edge_kernel(p.algorithm, EdgePass::Second)?;
                Ok(PassDescriptor {
                    program: ShaderProgram::EdgeDetection,
                    input: TextureSlot::Offscreen,
                    output: Surface::Screen,
                    uniforms: PassUniforms::with_kernel(texel_offset, &table),
                })
            }
            other => Err(FilterError::invalid(format!("{other:?} has no second pass"))),
        }
    }
}

/// Reuse the value in `slot` when its key matches, otherwise build and keep it
fn memoized<K: PartialEq, V: Clone>(slot: &mut Option<(K, V)>, key: K, build: impl FnOnce() -> V) -> V {
    if let Some((cached, value)) = slot {
        if *cached == key {
            return value.clone();
        }
    }
    let value = build();
    *slot = Some((key, value.clone()));
    value
}

impl<T: RenderTarget> Drop for PassPipeline<T> {
    fn drop(&mut self) {
        self.target.release_offscreen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::SoftwareTarget;
    use crate::kernel::{bilateral_kernel, gaussian_kernel, EdgeAlgorithm};
    use crate::state::filter::{BilateralParams, BlurParams, EdgeParams, SharpenParams};

    /// Records passes and fails on demand
    #[derive(Default)]
    struct RecordingTarget {
        passes: Vec<PassDescriptor>,
        offscreen: Option<(u32, u32)>,
        offscreen_released: usize,
        fail_on_draw: Option<usize>,
        size: Option<(u32, u32)>,
    }

    impl RenderTarget for RecordingTarget {
        fn upload_source(&mut self, image: &SourceImage) -> Result<()> {
            self.size = Some(image.dimensions());
            Ok(())
        }

        fn ensure_offscreen(&mut self, width: u32, height: u32) -> Result<()> {
            self.offscreen = Some((width, height));
            Ok(())
        }

        fn release_offscreen(&mut self) {
            self.offscreen = None;
            self.offscreen_released += 1;
        }

        fn draw(&mut self, pass: &PassDescriptor) -> Result<()> {
            if self.fail_on_draw == Some(self.passes.len()) {
                return Err(FilterError::Gpu("device lost".to_string()));
            }
            if pass.input == TextureSlot::Offscreen || pass.output == Surface::Offscreen {
                assert!(self.offscreen.is_some(), "off-screen used before allocation");
            }
            self.passes.push(pass.clone());
            Ok(())
        }

        fn read_screen(&mut self) -> Result<Frame> {
            let (width, height) = self.size.ok_or_else(|| FilterError::unavailable("no screen"))?;
            Ok(Frame {
                width,
                height,
                pixels: vec![0; (width * height * 4) as usize],
            })
        }

        fn describe(&self) -> String {
            "recording".to_string()
        }
    }

    fn edge(algorithm: EdgeAlgorithm) -> FilterParams {
        FilterParams::Edge(EdgeParams { algorithm })
    }

    fn loaded_recorder() -> PassPipeline<RecordingTarget> {
        let mut pipeline = PassPipeline::new(RecordingTarget::default());
        pipeline
            .load_image(&SourceImage::uniform(8, 4, [10, 20, 30, 255]).unwrap())
            .unwrap();
        pipeline
    }

    #[test]
    fn test_render_without_image_is_unavailable() {
        let mut pipeline = PassPipeline::new(RecordingTarget::default());
        let err = pipeline.render(None).unwrap_err();
        assert!(matches!(err, FilterError::ResourceUnavailable(_)));
        assert!(pipeline.target().passes.is_empty());
        assert_eq!(pipeline.state(), PassState::Idle);
        assert!(pipeline.save_frame().is_err());
    }

    #[test]
    fn test_passthrough_is_one_pass_to_screen() {
        let mut pipeline = loaded_recorder();
        pipeline.render(None).unwrap();

        let passes = &pipeline.target().passes;
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].program, ShaderProgram::Passthrough);
        assert_eq!(passes[0].input, TextureSlot::Source);
        assert_eq!(passes[0].output, Surface::Screen);
        assert_eq!(passes[0].uniforms.texel_offset, TexelOffset { x: 0.125, y: 0.25 });
        assert_eq!(pipeline.state(), PassState::Idle);
    }

    #[test]
    fn test_sobel_runs_x_then_y_through_offscreen() {
        let mut pipeline = loaded_recorder();
        pipeline.render(Some(&edge(EdgeAlgorithm::Sobel))).unwrap();

        let passes = &pipeline.target().passes;
        assert_eq!(passes.len(), 2);
        assert_eq!((passes[0].input, passes[0].output), (TextureSlot::Source, Surface::Offscreen));
        assert_eq!((passes[1].input, passes[1].output), (TextureSlot::Offscreen, Surface::Screen));
        assert_eq!(passes[0].uniforms.weights, vec![-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0]);
        assert_eq!(passes[1].uniforms.weights, vec![1.0, 2.0, 1.0, 0.0, 0.0, 0.0, -1.0, -2.0, -1.0]);
        assert_eq!(pipeline.target().offscreen, Some((8, 4)));
        assert_eq!(pipeline.state(), PassState::Idle);
    }

    #[test]
    fn test_laplacian_is_single_pass() {
        let mut pipeline = loaded_recorder();
        pipeline.render(Some(&edge(EdgeAlgorithm::LaplacianOfGaussian))).unwrap();

        let passes = &pipeline.target().passes;
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].output, Surface::Screen);
        assert_eq!(passes[0].uniforms.weights, vec![0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_blur_uploads_gaussian_weights() {
        let mut pipeline = loaded_recorder();
        let params = FilterParams::Blur(BlurParams {
            kernel_size: KernelSize::Five,
            deviation: 1.5,
        });
        pipeline.render(Some(&params)).unwrap();
        pipeline.render(Some(&params)).unwrap();

        let passes = &pipeline.target().passes;
        let expected = gaussian_kernel(KernelSize::Five, 1.5);
        assert_eq!(passes[0].uniforms.kernel_size, 5);
        assert_eq!(passes[0].uniforms.weights, expected.weights());
        // Cached kernel is bit-identical
        assert_eq!(passes[1].uniforms, passes[0].uniforms);
    }

    #[test]
    fn test_sharpen_passes_scale_factor() {
        let mut pipeline = loaded_recorder();
        pipeline
            .render(Some(&FilterParams::Sharpen(SharpenParams { scale_factor: 12.5 })))
            .unwrap();
        let pass = &pipeline.target().passes[0];
        assert_eq!(pass.program, ShaderProgram::Sharpen);
        assert_eq!(pass.uniforms.scale_factor, 12.5);
        assert_eq!(pass.uniforms.kernel_size, 3);
    }

    #[test]
    fn test_out_of_domain_scale_factor_is_clamped() {
        let mut pipeline = loaded_recorder();
        pipeline
            .render(Some(&FilterParams::Sharpen(SharpenParams { scale_factor: -7.0 })))
            .unwrap();
        pipeline
            .render(Some(&FilterParams::Sharpen(SharpenParams { scale_factor: 1000.0 })))
            .unwrap();

        let passes = &pipeline.target().passes;
        assert_eq!(passes[0].uniforms.scale_factor, 0.0);
        assert_eq!(passes[1].uniforms.scale_factor, 50.0);
    }

    #[test]
    fn test_bilateral_uploads_spatial_table_and_range() {
        let mut pipeline = loaded_recorder();
        let params = FilterParams::Bilateral(BilateralParams {
            kernel_size: KernelSize::Seven,
            deviation: 2.0,
            range: 0.4,
        });
        pipeline.render(Some(&params)).unwrap();
        pipeline.render(Some(&params)).unwrap();

        let expected = bilateral_kernel(KernelSize::Seven, 2.0, 0.4);
        let passes = &pipeline.target().passes;
        assert_eq!(passes[0].program, ShaderProgram::Bilateral);
        assert_eq!(passes[0].uniforms.kernel_size, 7);
        assert_eq!(passes[0].uniforms.weights, expected.spatial.weights());
        assert_eq!(passes[0].uniforms.range, expected.range);
        assert_eq!(passes[1].uniforms, passes[0].uniforms);
    }

    #[test]
    fn test_degenerate_range_stays_positive() {
        let mut pipeline = loaded_recorder();
        pipeline
            .render(Some(&FilterParams::Bilateral(BilateralParams {
                kernel_size: KernelSize::Three,
                deviation: 0.5,
                range: 0.0,
            })))
            .unwrap();
        assert_eq!(pipeline.target().passes[0].uniforms.range, kernel::MIN_RANGE);
    }

    #[test]
    fn test_failed_second_pass_releases_offscreen() {
        let mut pipeline = loaded_recorder();
        pipeline.target_mut().fail_on_draw = Some(1);
        let released_before = pipeline.target().offscreen_released;

        let err = pipeline.render(Some(&edge(EdgeAlgorithm::Prewitt))).unwrap_err();
        assert!(matches!(err, FilterError::Gpu(_)));
        assert_eq!(pipeline.state(), PassState::Idle);
        assert_eq!(pipeline.target().offscreen, None);
        assert_eq!(pipeline.target().offscreen_released, released_before + 1);
        assert!(pipeline.last_frame().is_none());
    }

    #[test]
    fn test_loading_image_resets_offset_and_offscreen() {
        let mut pipeline = PassPipeline::new(SoftwareTarget::new());
        pipeline
            .load_image(&SourceImage::uniform(4, 4, [0, 0, 0, 255]).unwrap())
            .unwrap();
        pipeline.render(Some(&edge(EdgeAlgorithm::Sobel))).unwrap();
        pipeline.render(Some(&edge(EdgeAlgorithm::Sobel))).unwrap();
        assert_eq!(pipeline.target().offscreen_allocations(), 1);

        let offset = pipeline
            .load_image(&SourceImage::uniform(10, 5, [0, 0, 0, 255]).unwrap())
            .unwrap();
        assert_eq!(offset, TexelOffset { x: 0.1, y: 0.2 });
        assert!(!pipeline.target().has_offscreen());
        assert!(pipeline.last_frame().is_none());

        let frame = pipeline.render(Some(&edge(EdgeAlgorithm::Sobel))).unwrap();
        assert_eq!((frame.width, frame.height), (10, 5));
        assert_eq!(pipeline.target().offscreen_allocations(), 2);
    }
}
