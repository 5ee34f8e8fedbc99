//! End-to-end filter scenarios on the software backend

use filter_viewer::error::FilterError;
use filter_viewer::gpu::SoftwareTarget;
use filter_viewer::image_io;
use filter_viewer::kernel::{EdgeAlgorithm, KernelSize};
use filter_viewer::render::{PassPipeline, PassState};
use filter_viewer::state::data::{Frame, SourceImage, TexelOffset};
use filter_viewer::state::filter::{
    BilateralParams, BlurParams, EdgeParams, FilterKind, FilterParams, FilterSelector, ParamUpdate, PassPlan,
    SharpenParams,
};

/// Black left half, white right half
fn step_edge(width: u32, height: u32) -> SourceImage {
    let mut pixels = Vec::new();
    for _y in 0..height {
        for x in 0..width {
            let v = if x < width / 2 { 0 } else { 255 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    SourceImage::new(width, height, pixels).unwrap()
}

/// Red ramp along x, green ramp along y
fn ramp(width: u32, height: u32) -> SourceImage {
    let mut pixels = Vec::new();
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[(x * 40) as u8, (y * 30) as u8, 90, 255]);
        }
    }
    SourceImage::new(width, height, pixels).unwrap()
}

/// Black 3x3 with one grey centre texel
fn centre_dot(value: u8) -> SourceImage {
    let mut pixels = [0, 0, 0, 255].repeat(9);
    pixels[16..19].copy_from_slice(&[value, value, value]);
    SourceImage::new(3, 3, pixels).unwrap()
}

/// One grey row with the given values
fn grey_row(values: &[u8]) -> SourceImage {
    let pixels = values.iter().flat_map(|&v| [v, v, v, 255]).collect();
    SourceImage::new(values.len() as u32, 1, pixels).unwrap()
}

/// Red channel of every texel, row-major; all rows in these tests are grey
fn reds(frame: &Frame) -> Vec<u8> {
    frame.pixels.chunks(4).map(|p| p[0]).collect()
}

fn assert_grey_opaque(frame: &Frame) {
    for p in frame.pixels.chunks(4) {
        assert_eq!((p[0], p[3]), (p[1], 255));
        assert_eq!(p[1], p[2]);
    }
}

fn edge(algorithm: EdgeAlgorithm) -> FilterParams {
    FilterParams::Edge(EdgeParams { algorithm })
}

fn loaded(image: &SourceImage) -> PassPipeline<SoftwareTarget> {
    let mut pipeline = PassPipeline::new(SoftwareTarget::new());
    pipeline.load_image(image).unwrap();
    pipeline
}

#[test]
fn blur_of_uniform_image_is_unchanged() {
    let image = SourceImage::uniform(4, 4, [128, 128, 128, 255]).unwrap();
    let mut pipeline = loaded(&image);

    let mut selector = FilterSelector::new();
    selector.set_active(FilterParams::Blur(BlurParams {
        kernel_size: KernelSize::Three,
        deviation: 0.5,
    }));

    let frame = pipeline.render_selector(&selector).unwrap();
    assert_eq!(frame.pixels, image.pixels());
    assert_eq!(pipeline.state(), PassState::Idle);
}

#[test]
fn passthrough_then_save_reproduces_the_input() {
    let image = ramp(5, 3);
    let mut pipeline = loaded(&image);

    let frame = pipeline.render_selector(&FilterSelector::new()).unwrap();
    assert_eq!(frame.pixels, image.pixels());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.png");
    image_io::save_frame(&path, &pipeline.save_frame().unwrap()).unwrap();

    let reloaded = image_io::load_image(&path).unwrap();
    assert_eq!(reloaded.dimensions(), (5, 3));
    assert_eq!(reloaded.pixels(), image.pixels());
}

#[test]
fn sobel_toggle_switches_between_one_and_two_passes() {
    let image = SourceImage::uniform(6, 4, [200, 100, 50, 255]).unwrap();
    let mut pipeline = loaded(&image);
    let mut selector = FilterSelector::new();

    selector.activate(FilterKind::Edge);
    selector
        .update_parameter(ParamUpdate::EdgeAlgorithm(EdgeAlgorithm::Sobel))
        .unwrap();
    assert_eq!(selector.current_plan(), PassPlan::TwoPass);

    // no gradient anywhere on a flat image
    let frame = pipeline.render_selector(&selector).unwrap();
    assert!(frame.pixels.chunks(4).all(|p| p == [0, 0, 0, 255]));
    assert!(pipeline.target().has_offscreen());

    // the pooled target is reused by the next two-pass frame
    pipeline.render_selector(&selector).unwrap();
    assert_eq!(pipeline.target().offscreen_allocations(), 1);

    selector.toggle(FilterKind::Edge, false);
    assert_eq!(selector.current_plan(), PassPlan::OnePass);
    let frame = pipeline.render_selector(&selector).unwrap();
    assert_eq!(frame.pixels, image.pixels());
}

#[test]
fn loading_a_new_image_resets_texel_offset() {
    let mut pipeline = loaded(&SourceImage::uniform(4, 4, [0, 0, 0, 255]).unwrap());
    assert_eq!(pipeline.texel_offset(), Some(TexelOffset::for_dimensions(4, 4)));

    let mut selector = FilterSelector::new();
    selector.set_active(FilterParams::default_for(FilterKind::Edge));
    selector
        .update_parameter(ParamUpdate::EdgeAlgorithm(EdgeAlgorithm::Prewitt))
        .unwrap();
    pipeline.render_selector(&selector).unwrap();

    let offset = pipeline
        .load_image(&SourceImage::uniform(8, 2, [0, 0, 0, 255]).unwrap())
        .unwrap();
    assert_eq!(offset, TexelOffset::for_dimensions(8, 2));
    assert_eq!(pipeline.dimensions(), Some((8, 2)));
    assert!(!pipeline.target().has_offscreen());
    assert!(pipeline.last_frame().is_none());

    let frame = pipeline.render_selector(&selector).unwrap();
    assert_eq!((frame.width, frame.height), (8, 2));
}

#[test]
fn sharpen_with_zero_scale_is_identity() {
    let image = ramp(4, 4);
    let mut pipeline = loaded(&image);

    let mut selector = FilterSelector::new();
    selector.activate(FilterKind::Sharpen);
    selector.update_parameter(ParamUpdate::ScaleFactor(0.0)).unwrap();

    let frame = pipeline.render_selector(&selector).unwrap();
    assert_eq!(frame.pixels, image.pixels());
}

#[test]
fn bilateral_keeps_edges_that_blur_smears() {
    let image = step_edge(8, 2);
    let mut pipeline = loaded(&image);

    let blurred = pipeline
        .render(Some(&FilterParams::Blur(BlurParams {
            kernel_size: KernelSize::Five,
            deviation: 2.0,
        })))
        .unwrap();
    // last black column picks up white from across the edge
    assert!(blurred.pixel(3, 0).unwrap()[0] > 0);
    assert!(blurred.pixel(4, 0).unwrap()[0] < 255);

    let bilateral = pipeline
        .render(Some(&FilterParams::Bilateral(BilateralParams {
            kernel_size: KernelSize::Five,
            deviation: 2.0,
            range: 0.1,
        })))
        .unwrap();
    assert_eq!(bilateral.pixels, image.pixels());
}

#[test]
fn nothing_to_save_before_first_render() {
    let pipeline = loaded(&ramp(2, 2));
    let err = pipeline.save_frame().unwrap_err();
    assert!(matches!(err, FilterError::ResourceUnavailable(_)));
}

#[test]
fn sobel_second_pass_reads_the_first_pass_result() {
    let mut pipeline = loaded(&centre_dot(40));
    let frame = pipeline.render(Some(&edge(EdgeAlgorithm::Sobel))).unwrap();

    // |Kx * I| = [40 0 40; 80 0 80; 40 0 40], then |Ky * that| with clamped borders
    assert_grey_opaque(&frame);
    assert_eq!(reds(&frame), vec![120, 80, 120, 0, 0, 0, 120, 80, 120]);
}

#[test]
fn prewitt_second_pass_reads_the_first_pass_result() {
    let mut pipeline = loaded(&centre_dot(40));
    let frame = pipeline.render(Some(&edge(EdgeAlgorithm::Prewitt))).unwrap();

    // |Kx * I| has identical rows [40 0 40], so the y gradient vanishes;
    // reading the source instead would give a non-zero top and bottom row
    assert_grey_opaque(&frame);
    assert_eq!(reds(&frame), vec![0; 9]);
}

#[test]
fn laplacian_single_pass_values() {
    let mut pipeline = loaded(&centre_dot(40));
    let frame = pipeline
        .render(Some(&edge(EdgeAlgorithm::LaplacianOfGaussian)))
        .unwrap();

    assert!(!pipeline.target().has_offscreen());
    assert_grey_opaque(&frame);
    assert_eq!(reds(&frame), vec![0, 40, 0, 40, 160, 40, 0, 40, 0]);
}

#[test]
fn sharpen_adds_scaled_laplacian() {
    // one row: vertical taps clamp onto the row itself
    let mut pipeline = loaded(&grey_row(&[0, 60, 120, 180]));
    let frame = pipeline
        .render(Some(&FilterParams::Sharpen(SharpenParams { scale_factor: 0.5 })))
        .unwrap();

    // laplacian response is [-60, 0, 0, 60]
    assert_grey_opaque(&frame);
    assert_eq!(reds(&frame), vec![0, 60, 120, 210]);
}

#[test]
fn negative_scale_from_a_stored_session_does_not_invert() {
    let image = grey_row(&[0, 60, 120, 180]);
    let mut pipeline = loaded(&image);

    let selector = FilterSelector::from_json(r#"{"active":"sharpen","sharpen":{"scale_factor":-7.0}}"#).unwrap();
    let frame = pipeline.render_selector(&selector).unwrap();
    assert_eq!(frame.pixels, image.pixels());

    // the raw value is clamped on the render path as well
    let frame = pipeline
        .render(Some(&FilterParams::Sharpen(SharpenParams { scale_factor: -7.0 })))
        .unwrap();
    assert_eq!(frame.pixels, image.pixels());
}
