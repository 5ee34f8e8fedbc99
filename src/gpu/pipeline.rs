/// wgpu backend for the filter passes
///
/// This module manages all the wgpu boilerplate:
/// - Device and queue initialization
/// - Source, screen and pooled off-screen textures
/// - Uniform buffer for pass parameters
/// - One render pipeline per filter program
/// - Screen read-back

use std::collections::HashMap;

// Use wgpu from iced to avoid dependency conflicts
use iced_wgpu::wgpu;
use tracing::{debug, info};

use super::shaders;
use super::target::{PassDescriptor, PassUniforms, RenderTarget, ShaderProgram, Surface, TextureSlot};
use crate::error::{FilterError, Result};
use crate::kernel::WEIGHT_ROWS;
use crate::state::data::{Frame, SourceImage};

const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Pass uniforms in a GPU-friendly format
/// Must match the WGSL `FilterUniforms` layout
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuFilterUniforms {
    texel_offset: [f32; 2],
    kernel_size: u32,
    _padding0: u32,
    range: f32,
    scale_factor: f32,
    _padding1: [f32; 2],  // array below starts on a 16-byte boundary
    weights: [[f32; 4]; WEIGHT_ROWS],
}

impl From<&PassUniforms> for GpuFilterUniforms {
    fn from(uniforms: &PassUniforms) -> Self {
        Self {
            texel_offset: uniforms.texel_offset.as_array(),
            kernel_size: uniforms.kernel_size,
            _padding0: 0,
            range: uniforms.range,
            scale_factor: uniforms.scale_factor,
            _padding1: [0.0; 2],
            weights: uniforms.padded_weights(),
        }
    }
}

/// A texture plus its default view
struct GpuSurface {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// GPU `RenderTarget`
pub struct GpuTarget {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    pipelines: HashMap<ShaderProgram, wgpu::RenderPipeline>,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    source: Option<GpuSurface>,
    screen: Option<GpuSurface>,
    offscreen: Option<GpuSurface>,
}

// Manual Debug implementation (wgpu types don't implement Debug)
impl std::fmt::Debug for GpuTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTarget")
            .field("adapter", &self.adapter_name)
            .field("source", &self.source.as_ref().map(|s| (s.width, s.height)))
            .field("offscreen", &self.offscreen.as_ref().map(|s| (s.width, s.height)))
            .finish_non_exhaustive()
    }
}

impl GpuTarget {
    /// Request an adapter and device and build every filter pipeline
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| FilterError::Gpu("failed to find a suitable GPU adapter".to_string()))?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "GPU adapter selected"
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Filter Viewer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| FilterError::Gpu(format!("failed to create device: {e:?}")))?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Filter Input Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Filter Uniform Buffer"),
            size: std::mem::size_of::<GpuFilterUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Filter Bind Group Layout"),
            entries: &[
                // Input texture (source or off-screen)
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Uniform buffer
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Filter Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::FILTER_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Filter Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipelines = ShaderProgram::ALL
            .into_iter()
            .map(|program| {
                let pipeline = create_filter_pipeline(&device, &pipeline_layout, &shader, program);
                (program, pipeline)
            })
            .collect();

        Ok(Self {
            device,
            queue,
            adapter_name: adapter_info.name,
            pipelines,
            bind_group_layout,
            sampler,
            uniform_buffer,
            source: None,
            screen: None,
            offscreen: None,
        })
    }

    fn create_surface(&self, label: &str, width: u32, height: u32, usage: wgpu::TextureUsages) -> GpuSurface {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuSurface {
            texture,
            view,
            width,
            height,
        }
    }
}

fn create_filter_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    program: ShaderProgram,
) -> wgpu::RenderPipeline {
    let label = format!("{program:?} Render Pipeline");
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: shaders::fragment_entry_point(program),
            targets: &[Some(wgpu::ColorTargetState {
                format: SURFACE_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None, // Disable culling for full-screen triangle
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

impl RenderTarget for GpuTarget {
    fn upload_source(&mut self, image: &SourceImage) -> Result<()> {
        let (width, height) = image.dimensions();
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(FilterError::Gpu(format!(
                "{width}x{height} exceeds the device texture limit of {max}"
            )));
        }

        let source = self.create_surface(
            "Source Texture",
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.pixels(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let screen = self.create_surface(
            "Screen Texture",
            width,
            height,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );

        self.source = Some(source);
        self.screen = Some(screen);
        debug!(width, height, bytes = image.pixels().len(), "source uploaded to GPU");
        Ok(())
    }

    fn ensure_offscreen(&mut self, width: u32, height: u32) -> Result<()> {
        let reusable = self
            .offscreen
            .as_ref()
            .is_some_and(|s| s.width == width && s.height == height);
        if !reusable {
            self.offscreen = Some(self.create_surface(
                "Off-screen Texture",
                width,
                height,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            ));
            debug!(width, height, "off-screen target allocated");
        }
        Ok(())
    }

    fn release_offscreen(&mut self) {
        if let Some(surface) = self.offscreen.take() {
            surface.texture.destroy();
        }
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

        let output = match pass.output {
            Surface::Screen => self.screen.as_ref(),
            Surface::Offscreen => self.offscreen.as_ref(),
        }
        .ok_or_else(|| FilterError::unavailable(format!("{:?} surface is not allocated", pass.output)))?;

        let pipeline = self
            .pipelines
            .get(&pass.program)
            .ok_or_else(|| FilterError::Gpu(format!("no pipeline for {:?}", pass.program)))?;

        let uniforms = GpuFilterUniforms::from(&pass.uniforms);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Filter Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&input.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Filter Pass Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Filter Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &output.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_viewport(0.0, 0.0, output.width as f32, output.height as f32, 0.0, 1.0);
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1); // Full-screen triangle
        }

        // Each pass is its own submission, so pass 2 sees pass 1's writes
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn read_screen(&mut self) -> Result<Frame> {
        let screen = self
            .screen
            .as_ref()
            .ok_or_else(|| FilterError::unavailable("no screen framebuffer, load an image first"))?;
        let (width, height) = (screen.width, screen.height);

        let bytes_per_row = width * 4;
        let padded_bytes_per_row = (bytes_per_row + 255) & !255;
        let buffer_size = (padded_bytes_per_row * height) as u64;

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Screen Read-back Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Read-back Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &screen.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| FilterError::Gpu(format!("read-back channel closed: {e}")))?
            .map_err(|e| FilterError::Gpu(format!("failed to map read-back buffer: {e:?}")))?;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((bytes_per_row * height) as usize);
        for y in 0..height {
            let start = (y * padded_bytes_per_row) as usize;
            let end = start + bytes_per_row as usize;
            pixels.extend_from_slice(&data[start..end]);
        }

        drop(data);
        output_buffer.unmap();
        Ok(Frame {
            width,
            height,
            pixels,
        })
    }

    fn describe(&self) -> String {
        format!("wgpu ({})", self.adapter_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{gaussian_kernel, KernelSize};
    use crate::state::data::TexelOffset;

    #[test]
    fn test_uniform_layout_matches_wgsl() {
        // 32 bytes of scalars, then 21 vec4 rows
        assert_eq!(std::mem::size_of::<GpuFilterUniforms>(), 32 + 16 * WEIGHT_ROWS);
        assert_eq!(std::mem::offset_of!(GpuFilterUniforms, weights), 32);
    }

    #[test]
    fn test_uniform_conversion() {
        let kernel = gaussian_kernel(KernelSize::Five, 1.0);
        let mut uniforms = PassUniforms::with_kernel(TexelOffset::for_dimensions(4, 2), &kernel);
        uniforms.range = 0.3;

        let gpu = GpuFilterUniforms::from(&uniforms);
        assert_eq!(gpu.texel_offset, [0.25, 0.5]);
        assert_eq!(gpu.kernel_size, 5);
        assert_eq!(gpu.range, 0.3);
        assert_eq!(gpu.weights[6][0], kernel.weights()[24]);
        assert_eq!(gpu.weights[6][1], 0.0);
    }
}
