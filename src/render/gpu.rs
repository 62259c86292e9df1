//! wgpu backend
//!
//! `GpuContext` owns the device and queue. `GpuRenderer` owns the pipelines and
//! the offscreen target, created in `init` and released in `teardown`.

use std::sync::Arc;

use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::pipeline::{RenderTarget, StencilPipelines, COLOR_FORMAT};
use super::{DrawCommand, FramePlan, RenderBackend, STENCIL_REFERENCE};
use crate::error::RenderError;
use crate::settings::{CompositorSettings, TextureFilter};

/// Texture handle for the GPU backend
pub type GpuTexture = Arc<wgpu::TextureView>;

/// Headless GPU device and queue
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Create a context without a surface, blocking until the device is ready
    pub fn new() -> Result<Self, RenderError> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> Result<Self, RenderError> {
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
            .ok_or(RenderError::NoAdapter)?;

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("AuroraMapper Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

struct GpuState {
    context: Arc<GpuContext>,
    pipelines: StencilPipelines,
    target: RenderTarget,
}

/// Executes frame plans with wgpu
pub struct GpuRenderer {
    width: u32,
    height: u32,
    filter: TextureFilter,
    state: Option<GpuState>,
}

enum PreparedDraw {
    Mask {
        vertices: wgpu::Buffer,
        count: u32,
    },
    Surface {
        vertices: wgpu::Buffer,
        count: u32,
        texture: wgpu::BindGroup,
        uniforms: wgpu::BindGroup,
    },
}

impl GpuRenderer {
    pub fn new(settings: &CompositorSettings) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            filter: settings.texture_filter,
            state: None,
        }
    }

    /// Create pipelines and the offscreen target on `context`
    pub fn init(&mut self, context: Arc<GpuContext>) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidTargetSize {
                width: self.width,
                height: self.height,
            });
        }
        let pipelines = StencilPipelines::new(&context.device, self.filter);
        let target = RenderTarget::new(&context.device, self.width, self.height);
        log::info!("GPU renderer initialized at {}x{}", self.width, self.height);
        self.state = Some(GpuState {
            context,
            pipelines,
            target,
        });
        Ok(())
    }

    /// Release every GPU resource held by the renderer
    pub fn teardown(&mut self) {
        if self.state.take().is_some() {
            log::info!("GPU renderer torn down");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn state(&self) -> Result<&GpuState, RenderError> {
        self.state.as_ref().ok_or(RenderError::NotInitialized)
    }

    /// Upload an RGBA8 image as a frame texture
    pub fn upload_texture(&self, image: &RgbaImage) -> Result<GpuTexture, RenderError> {
        let state = self.state()?;
        let device = &state.context.device;
        let size = wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Frame Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        state.context.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width()),
                rows_per_image: Some(image.height()),
            },
            size,
        );

        Ok(Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default())))
    }

    fn prepare(state: &GpuState, plan: &FramePlan<GpuTexture>) -> Vec<PreparedDraw> {
        let device = &state.context.device;
        let mut draws = Vec::with_capacity(plan.commands.len());

        for command in &plan.commands {
            match command {
                DrawCommand::ClearStencil => {}
                DrawCommand::Mask { geometry, .. } => {
                    let list = geometry.triangle_list();
                    if list.is_empty() {
                        continue;
                    }
                    let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Mask Vertex Buffer"),
                        contents: bytemuck::cast_slice(&list),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                    draws.push(PreparedDraw::Mask {
                        vertices,
                        count: list.len() as u32,
                    });
                }
                DrawCommand::Surface {
                    geometry,
                    texture,
                    uniforms,
                    ..
                } => {
                    let list = geometry.triangle_list();
                    if list.is_empty() {
                        continue;
                    }
                    let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Surface Vertex Buffer"),
                        contents: bytemuck::cast_slice(&list),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                    let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Surface Uniform Buffer"),
                        contents: bytemuck::bytes_of(uniforms),
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                    let texture_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Frame Texture Bind Group"),
                        layout: &state.pipelines.texture_bind_group_layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: wgpu::BindingResource::TextureView(texture.as_ref()),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: wgpu::BindingResource::Sampler(&state.pipelines.sampler),
                            },
                        ],
                    });
                    let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Surface Uniform Bind Group"),
                        layout: &state.pipelines.uniform_bind_group_layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniform_buffer.as_entire_binding(),
                        }],
                    });
                    draws.push(PreparedDraw::Surface {
                        vertices,
                        count: list.len() as u32,
                        texture: texture_group,
                        uniforms: uniform_group,
                    });
                }
            }
        }

        draws
    }
}

impl Drop for GpuRenderer {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl RenderBackend for GpuRenderer {
    type Texture = GpuTexture;

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn execute(&mut self, plan: &FramePlan<GpuTexture>) -> Result<(), RenderError> {
        let state = self.state()?;
        let draws = Self::prepare(state, plan);
        let clear_stencil = matches!(plan.commands.first(), Some(DrawCommand::ClearStencil));
        let [r, g, b, a] = plan.clear_color.map(f64::from);

        let mut encoder = state
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Stencil Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &state.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &state.target.stencil_view,
                    depth_ops: None,
                    stencil_ops: Some(wgpu::Operations {
                        load: if clear_stencil {
                            wgpu::LoadOp::Clear(0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_stencil_reference(u32::from(STENCIL_REFERENCE));

            for draw in &draws {
                match draw {
                    PreparedDraw::Mask { vertices, count } => {
                        pass.set_pipeline(&state.pipelines.mask_pipeline);
                        pass.set_vertex_buffer(0, vertices.slice(..));
                        pass.draw(0..*count, 0..1);
                    }
                    PreparedDraw::Surface {
                        vertices,
                        count,
                        texture,
                        uniforms,
                    } => {
                        pass.set_pipeline(&state.pipelines.surface_pipeline);
                        pass.set_bind_group(0, texture, &[]);
                        pass.set_bind_group(1, uniforms, &[]);
                        pass.set_vertex_buffer(0, vertices.slice(..));
                        pass.draw(0..*count, 0..1);
                    }
                }
            }
        }

        state.context.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn read_pixels(&mut self) -> Result<RgbaImage, RenderError> {
        let state = self.state()?;
        let device = &state.context.device;
        let (width, height) = (state.target.width, state.target.height);

        let unpadded = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &state.target.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        state.context.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| RenderError::Readback(e.to_string()))?
            .map_err(|e| RenderError::Readback(e.to_string()))?;

        let mut data = Vec::with_capacity((unpadded * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded as usize) {
                data.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();

        RgbaImage::from_raw(width, height, data)
            .ok_or_else(|| RenderError::Readback("readback size mismatch".to_string()))
    }
}
