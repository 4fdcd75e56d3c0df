//! Renderer (C11): window, GPU pipeline, and per-frame image drawing.
//!
//! The source opens a single GL context and a vertex/fragment shader pair
//! that samples one texture per draw call, reusing a fixed pool of texture
//! units with no reclamation policy specified (spec.md section 9). Here the
//! window/event-loop shape follows the teacher's winit driver
//! (`crates/chip8-drivers/src/winit_driver.rs`); the GPU side is expressed
//! with `wgpu` instead of the teacher's `pixels` crate, since this renderer
//! draws textured, rotated quads rather than a raw framebuffer.

use bytemuck::{Pod, Zeroable};
use glam::{Mat2, Vec2};
use log::{debug, warn};
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

const WINDOW_TITLE: &str = "gm8run";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

/// Per-vertex attributes the shader consumes: a unit-quad position plus its
/// texture coordinate. Per-draw state (`objAlpha`, `objBlend`, `objPos`,
/// `objWH`, rotation) is supplied as push-constant-style uniform data on
/// each `DrawImage` call rather than baked into the vertex buffer.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 2],
    uv: [f32; 2],
}

const QUAD: [Vertex; 4] = [
    Vertex { position: [0.0, 0.0], uv: [0.0, 0.0] },
    Vertex { position: [1.0, 0.0], uv: [1.0, 0.0] },
    Vertex { position: [1.0, 1.0], uv: [1.0, 1.0] },
    Vertex { position: [0.0, 1.0], uv: [0.0, 1.0] },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Per-draw uniform values the fragment/vertex shaders read: position,
/// width/height, rotation, tint, and alpha for one `DrawImage` call.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DrawUniform {
    obj_pos: [f32; 2],
    obj_wh: [f32; 2],
    /// Precomputed 2x2 rotation matrix, column-major, so the vertex shader
    /// only has to do one matrix-vector multiply before the aspect divide
    /// (spec.md section 9: the source's shader never applied `rot` at all).
    rotation: [f32; 4],
    obj_blend: [f32; 3],
    obj_alpha: f32,
}

const SHADER_SOURCE: &str = r#"
struct DrawUniform {
    obj_pos: vec2<f32>,
    obj_wh: vec2<f32>,
    rotation: mat2x2<f32>,
    obj_blend: vec3<f32>,
    obj_alpha: f32,
};

@group(0) @binding(0) var<uniform> draw: DrawUniform;
@group(0) @binding(1) var tex: texture_2d<f32>;
@group(0) @binding(2) var samp: sampler;

struct VertexOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) uv: vec2<f32>) -> VertexOut {
    var out: VertexOut;
    let local = (position - vec2<f32>(0.5, 0.5)) * draw.obj_wh;
    let rotated = draw.rotation * local;
    let world = rotated + draw.obj_pos;
    out.clip_position = vec4<f32>(world, 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {
    let sampled = textureSample(tex, samp, in.uv);
    return vec4<f32>(sampled.rgb * draw.obj_blend, sampled.a * draw.obj_alpha);
}
"#;

/// One uploaded image: its RGBA bytes, the GPU texture that holds them, and
/// the frame counter it was last drawn with (for LRU eviction).
struct LoadedImage {
    image_index: u32,
    width: u32,
    height: u32,
    texture: wgpu::Texture,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    last_drawn_frame: u64,
}

/// The renderer's owned GPU state: a single window, device, queue, pipeline,
/// and a fixed-size pool of texture units reused across frames.
pub struct Renderer {
    window: Window,
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// Fixed-size LRU pool of uploaded images. `None` means the unit is
    /// free.
    texture_units: Vec<Option<LoadedImage>>,
    frame_counter: u64,
}

impl Renderer {
    /// Number of simultaneously resident GPU textures before the LRU policy
    /// starts evicting.
    pub const TEXTURE_UNIT_COUNT: usize = 32;

    /// Create a window and GPU pipeline, sized to `scale` times the default
    /// window dimensions.
    pub fn new(event_loop: &EventLoop<()>, scale: u32) -> Self {
        let size = LogicalSize::new(DEFAULT_WIDTH * scale.max(1), DEFAULT_HEIGHT * scale.max(1));
        let window = WindowBuilder::new()
            .with_title(WINDOW_TITLE)
            .with_inner_size(size)
            .with_min_inner_size(LogicalSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT))
            .build(event_loop)
            .expect("failed to create window");

        let instance = wgpu::Instance::new(wgpu::Backends::PRIMARY);
        let surface = unsafe { instance.create_surface(&window) }.expect("failed to create GPU surface for window");
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("no compatible GPU adapter found");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor { label: Some("gm8run-device"), features: wgpu::Features::empty(), limits: wgpu::Limits::default() },
            None,
        ))
        .expect("failed to acquire GPU device");

        let inner = window.inner_size();
        let format = surface.get_capabilities(&adapter).formats[0];
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: inner.width.max(1),
            height: inner.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gm8run-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gm8run-draw-bind-group-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gm8run-pipeline-layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("gm8run-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let vertex_buffer = wgpu::util::DeviceExt::create_buffer_init(
            &device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("gm8run-quad-vertices"),
                contents: bytemuck::cast_slice(&QUAD),
                usage: wgpu::BufferUsages::VERTEX,
            },
        );
        let index_buffer = wgpu::util::DeviceExt::create_buffer_init(
            &device,
            &wgpu::util::BufferInitDescriptor {
                label: Some("gm8run-quad-indices"),
                contents: bytemuck::cast_slice(&QUAD_INDICES),
                usage: wgpu::BufferUsages::INDEX,
            },
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("gm8run-sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut texture_units = Vec::with_capacity(Self::TEXTURE_UNIT_COUNT);
        texture_units.resize_with(Self::TEXTURE_UNIT_COUNT, || None);

        Renderer {
            window,
            surface,
            device,
            queue,
            config,
            pipeline,
            vertex_buffer,
            index_buffer,
            uniform_bind_group_layout,
            sampler,
            texture_units,
            frame_counter: 0,
        }
    }

    fn find_unit(&self, image_index: u32) -> Option<usize> {
        self.texture_units.iter().position(|slot| matches!(slot, Some(img) if img.image_index == image_index))
    }

    /// Pick a free unit, or if none is free, evict whichever unit was drawn
    /// least recently (spec.md section 9's LRU reclamation policy).
    fn pick_unit_for_upload(&self) -> usize {
        if let Some(free) = self.texture_units.iter().position(|slot| slot.is_none()) {
            return free;
        }
        let stamps: Vec<u64> = self.texture_units.iter().map(|slot| slot.as_ref().map(|img| img.last_drawn_frame).unwrap_or(0)).collect();
        lru_candidate(&stamps).expect("texture unit pool is never empty")
    }

    fn upload(&mut self, unit: usize, image_index: u32, width: u32, height: u32, rgba: &[u8]) {
        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("gm8run-image-texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture { texture: &texture, mip_level: 0, origin: wgpu::Origin3d::ZERO, aspect: wgpu::TextureAspect::All },
            rgba,
            wgpu::ImageDataLayout { offset: 0, bytes_per_row: Some(4 * width), rows_per_image: Some(height) },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gm8run-draw-uniform"),
            size: std::mem::size_of::<DrawUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gm8run-draw-bind-group"),
            layout: &self.uniform_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&self.sampler) },
            ],
        });

        debug!("uploaded image {} into texture unit {}", image_index, unit);
        self.texture_units[unit] = Some(LoadedImage {
            image_index,
            width,
            height,
            texture,
            uniform_buffer,
            bind_group,
            last_drawn_frame: self.frame_counter,
        });
    }

    /// Draw one image, lazily uploading it into a texture unit on first use
    /// (evicting the least-recently-drawn unit if the pool is full).
    ///
    /// Rotation is applied in the vertex shader via `rotation`, a fix over
    /// the source's vertex shader, which never read its `rot` input
    /// (spec.md section 9).
    #[allow(clippy::too_many_arguments)]
    pub fn draw_image(
        &mut self,
        image_index: u32,
        rgba: Option<(u32, u32, &[u8])>,
        x: f32,
        y: f32,
        xscale: f32,
        yscale: f32,
        rotation_degrees: f32,
        blend: [f32; 3],
        alpha: f32,
    ) {
        self.frame_counter += 1;

        let unit = match self.find_unit(image_index) {
            Some(u) => u,
            None => {
                let (w, h, bytes) = match rgba {
                    Some(v) => v,
                    None => {
                        warn!("draw_image({}) requested but no pixel data and no cached texture", image_index);
                        return;
                    }
                };
                let unit = self.pick_unit_for_upload();
                self.upload(unit, image_index, w, h, bytes);
                unit
            }
        };

        let rot = rotation_degrees.to_radians();
        let m = Mat2::from_angle(rot);
        let size = Vec2::new(xscale, yscale);

        if let Some(loaded) = &mut self.texture_units[unit] {
            loaded.last_drawn_frame = self.frame_counter;
            let uniform = DrawUniform {
                obj_pos: [x, y],
                obj_wh: [loaded.width as f32 * size.x, loaded.height as f32 * size.y],
                rotation: [m.x_axis.x, m.x_axis.y, m.y_axis.x, m.y_axis.y],
                obj_blend: blend,
                obj_alpha: alpha,
            };
            self.queue.write_buffer(&loaded.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
        }
    }

    /// Present the frame: clear to black and draw every unit that holds an
    /// image, then swap buffers.
    pub fn present(&mut self) {
        let frame = match self.surface.get_current_texture() {
            Ok(f) => f,
            Err(e) => {
                warn!("surface texture acquisition failed: {}", e);
                return;
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gm8run-frame-encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("gm8run-frame-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            for unit in self.texture_units.iter().flatten() {
                pass.set_bind_group(0, &unit.bind_group, &[]);
                pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }

    /// Reconfigure the swapchain after a resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Run the window's event loop, calling `on_tick` once per frame before
    /// presenting. `on_tick` returns `false` to request a clean exit.
    pub fn run(mut self, event_loop: EventLoop<()>, mut on_tick: impl FnMut(&mut Renderer) -> bool + 'static) -> ! {
        event_loop.run(move |event, _, control_flow| {
            *control_flow = ControlFlow::Poll;
            match event {
                Event::WindowEvent { event: WindowEvent::CloseRequested, .. } => {
                    *control_flow = ControlFlow::Exit;
                }
                Event::WindowEvent { event: WindowEvent::Resized(size), .. } => {
                    self.resize(size.width, size.height);
                }
                Event::MainEventsCleared => {
                    if !on_tick(&mut self) {
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                    self.present();
                    self.window.request_redraw();
                }
                _ => {}
            }
        })
    }
}

/// Index of the stamp with the smallest frame count, i.e. the unit that was
/// drawn least recently. Pulled out of `Renderer` so the eviction policy can
/// be exercised without constructing real GPU resources.
fn lru_candidate(stamps: &[u64]) -> Option<usize> {
    stamps.iter().enumerate().min_by_key(|(_, &stamp)| stamp).map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_eviction_picks_the_oldest_stamp() {
        let stamps = [5u64, 1, 9];
        assert_eq!(lru_candidate(&stamps), Some(1));
    }

    #[test]
    fn lru_eviction_is_none_for_an_empty_pool() {
        let stamps: [u64; 0] = [];
        assert_eq!(lru_candidate(&stamps), None);
    }
}
