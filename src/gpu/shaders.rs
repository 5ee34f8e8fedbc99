/// WGSL source for the filter programs
///
/// One module, one vertex entry point (full-screen triangle) and one
/// fragment entry point per `ShaderProgram`. Neighbours are sampled through
/// a nearest, clamp-to-edge sampler at multiples of the texel offset.

use super::target::ShaderProgram;

pub const FILTER_SHADER: &str = r#"
// ========== Vertex Shader ==========
// Full-screen triangle (no vertex buffers needed)

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coords: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;

    // Vertex 0: (-1, -1), vertex 1: (3, -1), vertex 2: (-1, 3)
    let x = f32(i32(vertex_index & 1u) * 4 - 1);
    let y = f32(i32(vertex_index >> 1u) * 4 - 1);

    // Texture row 0 ends up at the top of the framebuffer
    output.clip_position = vec4<f32>(x, -y, 0.0, 1.0);
    output.tex_coords = vec2<f32>((x + 1.0) * 0.5, (y + 1.0) * 0.5);

    return output;
}

// ========== Fragment Shaders ==========

struct FilterUniforms {
    texel_offset: vec2<f32>,  // (1 / width, 1 / height)
    kernel_size: u32,         // 3, 5, 7 or 9; 0 when unused
    padding0: u32,
    range: f32,               // bilateral intensity sensitivity
    scale_factor: f32,        // sharpening strength
    padding1: vec2<f32>,
    weights: array<vec4<f32>, 21>,  // up to 81 weights, row-major
}

@group(0) @binding(0)
var input_texture: texture_2d<f32>;

@group(0) @binding(1)
var input_sampler: sampler;  // nearest, clamp-to-edge

@group(0) @binding(2)
var<uniform> params: FilterUniforms;

fn sample_at(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(input_texture, input_sampler, uv, 0.0);
}

fn weight(index: i32) -> f32 {
    return params.weights[index / 4][index % 4];
}

// Centre of the output texel in normalized coordinates
fn texel_center(position: vec4<f32>) -> vec2<f32> {
    return position.xy * params.texel_offset;
}

// Weighted sum of the neighbourhood; kernel row 0 lies above the centre
fn convolve(uv: vec2<f32>) -> vec3<f32> {
    let n = i32(params.kernel_size);
    let radius = n / 2;
    var sum = vec3<f32>(0.0);
    for (var row = 0; row < n; row++) {
        for (var col = 0; col < n; col++) {
            let offset = vec2<f32>(f32(col - radius), f32(row - radius)) * params.texel_offset;
            sum += weight(row * n + col) * sample_at(uv + offset).rgb;
        }
    }
    return sum;
}

@fragment
fn fs_passthrough(input: VertexOutput) -> @location(0) vec4<f32> {
    return sample_at(texel_center(input.clip_position));
}

@fragment
fn fs_gaussian_blur(input: VertexOutput) -> @location(0) vec4<f32> {
    let uv = texel_center(input.clip_position);
    let center = sample_at(uv);
    return vec4<f32>(clamp(convolve(uv), vec3<f32>(0.0), vec3<f32>(1.0)), center.a);
}

@fragment
fn fs_bilateral(input: VertexOutput) -> @location(0) vec4<f32> {
    let uv = texel_center(input.clip_position);
    let center = sample_at(uv);
    let n = i32(params.kernel_size);
    let radius = n / 2;
    let denom = 2.0 * params.range * params.range;

    var sum = vec3<f32>(0.0);
    var norm = 0.0;
    for (var row = 0; row < n; row++) {
        for (var col = 0; col < n; col++) {
            let offset = vec2<f32>(f32(col - radius), f32(row - radius)) * params.texel_offset;
            let texel = sample_at(uv + offset).rgb;
            let diff = texel - center.rgb;
            let w = weight(row * n + col) * exp(-dot(diff, diff) / denom);
            sum += w * texel;
            norm += w;
        }
    }

    if norm <= 0.0 {
        return center;
    }
    return vec4<f32>(clamp(sum / norm, vec3<f32>(0.0), vec3<f32>(1.0)), center.a);
}

@fragment
fn fs_sharpen(input: VertexOutput) -> @location(0) vec4<f32> {
    let uv = texel_center(input.clip_position);
    let center = sample_at(uv);
    let sharpened = center.rgb + params.scale_factor * convolve(uv);
    return vec4<f32>(clamp(sharpened, vec3<f32>(0.0), vec3<f32>(1.0)), center.a);
}

@fragment
fn fs_edge_detection(input: VertexOutput) -> @location(0) vec4<f32> {
    let uv = texel_center(input.clip_position);
    let center = sample_at(uv);
    return vec4<f32>(clamp(abs(convolve(uv)), vec3<f32>(0.0), vec3<f32>(1.0)), center.a);
}
"#;

/// Fragment entry point implementing `program`
pub fn fragment_entry_point(program: ShaderProgram) -> &'static str {
    match program {
        ShaderProgram::Passthrough => "fs_passthrough",
        ShaderProgram::GaussianBlur => "fs_gaussian_blur",
        ShaderProgram::Bilateral => "fs_bilateral",
        ShaderProgram::Sharpen => "fs_sharpen",
        ShaderProgram::EdgeDetection => "fs_edge_detection",
    }
}
