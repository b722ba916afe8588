use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use pixels::wgpu::{self, util::DeviceExt};
use pixels::{Pixels, PixelsBuilder, SurfaceTexture};
use winit::window::Window;

use super::{Filter, GfxError, GraphicsDevice, ProgramId, Quad, ShaderStage, TextureId};
use crate::{MAX_FRAME_HEIGHT, MAX_FRAME_WIDTH};

const QUAD_BUFFER_SIZE: wgpu::BufferAddress = (Quad::VERTEX_COUNT as u64) * 2 * 4;

struct GpuTexture {
    filter: Filter,
    sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
}

/// A [`GraphicsDevice`] backed by the wgpu context of a `pixels` surface.
///
/// Clears and draws are recorded and only submitted on [`GraphicsDevice::present`], as a single
/// render pass.
pub struct WgpuDevice {
    pixels: Pixels<'static>,
    bind_group_layout: wgpu::BindGroupLayout,
    positions: wgpu::Buffer,
    tex_coords: wgpu::Buffer,
    programs: HashMap<ProgramId, wgpu::RenderPipeline>,
    textures: HashMap<TextureId, GpuTexture>,
    next_id: u32,
    clear_colour: wgpu::Color,
    pending_draw: Option<(ProgramId, TextureId)>,
}

impl WgpuDevice {
    pub fn new(window: Arc<Window>) -> Result<Self, GfxError> {
        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width.max(1), size.height.max(1), window);
        let pixels = PixelsBuilder::new(MAX_FRAME_WIDTH, MAX_FRAME_HEIGHT, surface)
            .enable_vsync(true)
            .build()
            .map_err(|e| GfxError::Surface(e.to_string()))?;
        info!(
            "Created {}x{} surface, format {:?}",
            size.width,
            size.height,
            pixels.render_texture_format()
        );

        let device = pixels.device();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame bind group layout"),
            entries: &[
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
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let positions = quad_buffer(device, "quad positions");
        let tex_coords = quad_buffer(device, "quad texture coordinates");

        Ok(Self {
            pixels,
            bind_group_layout,
            positions,
            tex_coords,
            programs: HashMap::new(),
            textures: HashMap::new(),
            next_id: 0,
            clear_colour: wgpu::Color::BLACK,
            pending_draw: None,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), GfxError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels
            .resize_surface(width, height)
            .map_err(|e| GfxError::Surface(e.to_string()))
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Run `f` and collect the validation error it raised, if any.
    fn validated<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<String>) {
        let device = self.pixels.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(device);
        let error = pollster::block_on(device.pop_error_scope());
        (value, error.map(|e| e.to_string()))
    }

    fn compile_stage(
        &self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<wgpu::ShaderModule, GfxError> {
        let (module, error) = self.validated(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "frame vertex shader",
                    ShaderStage::Fragment => "frame fragment shader",
                }),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });
        match error {
            Some(log) => Err(GfxError::Compile { stage, log }),
            None => Ok(module),
        }
    }

    fn bind_group(&self, view: &wgpu::TextureView, sampler: &wgpu::Sampler) -> wgpu::BindGroup {
        self.pixels
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("frame bind group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            })
    }

    fn texture_with_data(
        &self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<wgpu::TextureView, GfxError> {
        let max_dimension = self.pixels.device().limits().max_texture_dimension_2d;
        check_upload(width, height, rgba.len(), max_dimension)?;

        let queue = self.pixels.queue();
        let (texture, error) = self.validated(|device| {
            device.create_texture_with_data(
                queue,
                &wgpu::TextureDescriptor {
                    label: Some("frame texture"),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                rgba,
            )
        });
        match error {
            Some(log) => Err(GfxError::Texture(log)),
            None => Ok(texture.create_view(&wgpu::TextureViewDescriptor::default())),
        }
    }
}

fn quad_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: QUAD_BUFFER_SIZE,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn filter_mode(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
    }
}

/// Reject uploads the device cannot hold before wgpu sees them.
fn check_upload(width: u32, height: u32, len: usize, max_dimension: u32) -> Result<(), GfxError> {
    if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
        return Err(GfxError::Texture(format!(
            "{}x{} is outside the supported 1x1 to {}x{}",
            width, height, max_dimension, max_dimension
        )));
    }
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4));
    if expected != Some(len) {
        return Err(GfxError::Texture(format!(
            "{} bytes do not make a {}x{} RGBA texture",
            len, width, height
        )));
    }
    Ok(())
}

impl GraphicsDevice for WgpuDevice {
    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramId, GfxError> {
        let vertex = self.compile_stage(ShaderStage::Vertex, vertex)?;
        let fragment = self.compile_stage(ShaderStage::Fragment, fragment)?;
        let format = self.pixels.render_texture_format();

        let (pipeline, error) = self.validated(|device| {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("frame pipeline layout"),
                bind_group_layouts: &[&self.bind_group_layout],
                push_constant_ranges: &[],
            });
            let attribute = |location| {
                [wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 0,
                    shader_location: location,
                }]
            };
            let position_attributes = attribute(0);
            let tex_coord_attributes = attribute(1);
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("frame pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: "vs_main",
                    buffers: &[
                        wgpu::VertexBufferLayout {
                            array_stride: 8,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &position_attributes,
                        },
                        wgpu::VertexBufferLayout {
                            array_stride: 8,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &tex_coord_attributes,
                        },
                    ],
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &fragment,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            })
        });
        if let Some(log) = error {
            return Err(GfxError::Link(log));
        }

        let id = ProgramId(self.next_id());
        debug!("Linked shader program {}", id.0);
        self.programs.insert(id, pipeline);
        Ok(id)
    }

    fn create_texture(&mut self, filter: Filter) -> Result<TextureId, GfxError> {
        let (sampler, error) = self.validated(|device| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("frame sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter_mode(filter),
                min_filter: filter_mode(filter),
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        });
        if let Some(log) = error {
            return Err(GfxError::Texture(log));
        }

        // A black texel until the first upload
        let view = self.texture_with_data(1, 1, &[0, 0, 0, 0xff])?;
        let bind_group = self.bind_group(&view, &sampler);
        let id = TextureId(self.next_id());
        self.textures.insert(
            id,
            GpuTexture {
                filter,
                sampler,
                bind_group,
            },
        );
        Ok(id)
    }

    fn upload_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), GfxError> {
        let Some(entry) = self.textures.get(&texture) else {
            return Err(GfxError::UnknownTexture(texture));
        };
        let view = self.texture_with_data(width, height, rgba)?;
        let bind_group = self.bind_group(&view, &entry.sampler);
        if let Some(entry) = self.textures.get_mut(&texture) {
            entry.bind_group = bind_group;
        }
        Ok(())
    }

    fn clear(&mut self, colour: [f32; 4]) {
        let [r, g, b, a] = colour.map(f64::from);
        self.clear_colour = wgpu::Color { r, g, b, a };
        self.pending_draw = None;
    }

    fn draw(
        &mut self,
        program: ProgramId,
        texture: TextureId,
        quad: &Quad,
    ) -> Result<(), GfxError> {
        if !self.programs.contains_key(&program) {
            return Err(GfxError::UnknownProgram(program));
        }
        if !self.textures.contains_key(&texture) {
            return Err(GfxError::UnknownTexture(texture));
        }

        let queue = self.pixels.queue();
        queue.write_buffer(&self.positions, 0, bytemuck::cast_slice(&quad.positions));
        queue.write_buffer(&self.tex_coords, 0, bytemuck::cast_slice(&quad.tex_coords));
        self.pending_draw = Some((program, texture));
        Ok(())
    }

    fn present(&mut self) -> Result<(), GfxError> {
        let draw = self.pending_draw.take().and_then(|(program, texture)| {
            Some((self.programs.get(&program)?, self.textures.get(&texture)?))
        });
        let clear_colour = self.clear_colour;
        let (positions, tex_coords) = (&self.positions, &self.tex_coords);

        self.pixels
            .render_with(|encoder, target, _context| {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("frame pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: target,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(clear_colour),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                if let Some((pipeline, texture)) = draw {
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, &texture.bind_group, &[]);
                    pass.set_vertex_buffer(0, positions.slice(..));
                    pass.set_vertex_buffer(1, tex_coords.slice(..));
                    pass.draw(0..Quad::VERTEX_COUNT, 0..1);
                }
                Ok(())
            })
            .map_err(|e| GfxError::Surface(e.to_string()))
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() {
            debug!("Deleted shader program {}", program.0);
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(entry) = self.textures.remove(&texture) {
            debug!("Deleted {:?} texture {}", entry.filter, texture.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_upload_accepts_full_frame() {
        assert!(check_upload(256, 240, 256 * 240 * 4, 8192).is_ok());
        assert!(check_upload(1, 1, 4, 8192).is_ok());
    }

    #[test]
    fn test_check_upload_rejects_size_mismatch() {
        assert!(matches!(
            check_upload(256, 240, 256 * 240 * 2, 8192),
            Err(GfxError::Texture(_))
        ));
    }

    #[test]
    fn test_check_upload_rejects_oversized_frame() {
        assert!(matches!(
            check_upload(8193, 1, 8193 * 4, 8192),
            Err(GfxError::Texture(_))
        ));
        assert!(matches!(
            check_upload(0, 240, 0, 8192),
            Err(GfxError::Texture(_))
        ));
    }

    #[test]
    fn test_check_upload_size_does_not_wrap() {
        // 65536 * 16384 * 4 wraps to 0 in 32 bits
        assert!(matches!(
            check_upload(65536, 16384, 0, u32::MAX),
            Err(GfxError::Texture(_))
        ));
    }
}
