use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

use crate::assets::VideoFrame;
use crate::error::RenderError;
use crate::model::{Camera, LightKind, MaterialSlot, MeshData, NodeId, SceneContext, TextureData, UvTransform, Vertex, VideoId};

use super::{Frame, GpuContext, RenderBackend};

pub const MAX_DIRECTIONAL: usize = 4;
pub const MAX_POINT: usize = 8;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DirectionalUniform {
    pub direction: [f32; 4],
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PointUniform {
    /// w: cutoff distance
    pub position: [f32; 4],
    /// rgb * intensity, w: decay
    pub color: [f32; 4],
}

/// Group 0: camera, lights and fog. Mirrors `Globals` in scene.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GlobalsUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub ambient: [f32; 4],
    pub fog_color: [f32; 4],
    pub fog: [f32; 4],
    pub counts: [u32; 4],
    pub directional: [DirectionalUniform; MAX_DIRECTIONAL],
    pub points: [PointUniform; MAX_POINT],
}

impl GlobalsUniform {
    /// Packs the scene lights. Lights beyond the shader's fixed slots are
    /// dropped in id order.
    pub fn new(scene: &SceneContext, camera: &Camera) -> Self {
        let mut globals = GlobalsUniform::zeroed();
        globals.view_proj = camera.view_proj().to_cols_array_2d();
        globals.camera_pos = camera.eye.extend(1.0).to_array();

        let atmosphere = &scene.atmosphere;
        let [r, g, b] = atmosphere.fog_color.to_linear();
        globals.fog_color = [r, g, b, 1.0];
        globals.fog = [atmosphere.fog_near, atmosphere.fog_far, 0.0, 0.0];

        let mut n_dir = 0;
        let mut n_point = 0;
        for (_, light) in scene.lights() {
            let [r, g, b] = light.color.to_linear();
            let i = light.intensity;
            let radiance = [r * i, g * i, b * i];
            match light.kind {
                LightKind::Ambient => {
                    for c in 0..3 {
                        globals.ambient[c] += radiance[c];
                    }
                }
                LightKind::Directional { position } => {
                    if n_dir == MAX_DIRECTIONAL {
                        continue;
                    }
                    let dir = position.normalize_or_zero();
                    globals.directional[n_dir] = DirectionalUniform {
                        direction: dir.extend(0.0).to_array(),
                        color: [radiance[0], radiance[1], radiance[2], 1.0],
                    };
                    n_dir += 1;
                }
                LightKind::Point { position, distance, decay } => {
                    if n_point == MAX_POINT {
                        continue;
                    }
                    globals.points[n_point] = PointUniform {
                        position: position.extend(distance).to_array(),
                        color: [radiance[0], radiance[1], radiance[2], decay],
                    };
                    n_point += 1;
                }
            }
        }
        globals.counts = [n_dir as u32, n_point as u32, 0, 0];
        globals
    }
}

/// Group 1 uniform, one per draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawUniform {
    pub model: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    /// w: 1.0 for unlit
    pub emissive: [f32; 4],
    pub uv: [f32; 4],
}

impl DrawUniform {
    pub fn new(world: Mat4, material: &MaterialSlot) -> Self {
        let [er, eg, eb] = material.emissive;
        Self {
            model: world.to_cols_array_2d(),
            base_color: material.base_color,
            emissive: [er, eg, eb, if material.unlit { 1.0 } else { 0.0 }],
            uv: UvTransform::IDENTITY.to_array(),
        }
    }

    /// Unlit, untinted, sampling the given sub-rectangle.
    pub fn video(world: Mat4, uv: UvTransform) -> Self {
        Self {
            model: world.to_cols_array_2d(),
            base_color: [1.0; 4],
            emissive: [0.0, 0.0, 0.0, 1.0],
            uv: uv.to_array(),
        }
    }
}

pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub struct GlobalsResources {
    pub buffer: wgpu::Buffer,
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
}

pub fn create_globals_resources(device: &wgpu::Device) -> GlobalsResources {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("globals_buffer"),
        size: std::mem::size_of::<GlobalsUniform>() as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("globals_bind_group_layout"),
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("globals_bind_group"),
        layout: &layout,
        entries: &[wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() }],
    });

    GlobalsResources { buffer, layout, bind_group }
}

pub fn create_material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("material_bind_group_layout"),
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
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
    })
}

fn material_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform: &wgpu::Buffer,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("material_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: uniform.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(view) },
            wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
    })
}

pub fn create_scene_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    globals_layout: &wgpu::BindGroupLayout,
    material_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scene_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("scene_pipeline_layout"),
        bind_group_layouts: &[globals_layout, material_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("scene_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[
                    wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x3 },
                    wgpu::VertexAttribute { offset: 12, shader_location: 1, format: wgpu::VertexFormat::Float32x3 },
                    wgpu::VertexAttribute { offset: 24, shader_location: 2, format: wgpu::VertexFormat::Float32x2 },
                ],
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // Gallery models are authored double-sided
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    })
}

fn create_sampler(device: &wgpu::Device, label: &str, address_mode: wgpu::AddressMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn create_rgba_texture(device: &wgpu::Device, label: &str, width: u32, height: u32, extra: wgpu::TextureUsages) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | extra,
        view_formats: &[],
    })
}

fn write_rgba(queue: &wgpu::Queue, texture: &wgpu::Texture, width: u32, height: u32, rgba: &[u8]) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
}

fn upload_texture(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> wgpu::TextureView {
    let texture = create_rgba_texture(device, "model_texture", data.width, data.height, wgpu::TextureUsages::empty());
    write_rgba(queue, &texture, data.width, data.height, &data.rgba);
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn surface_error(e: wgpu::SurfaceError) -> RenderError {
    match e {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => RenderError::Lost,
        wgpu::SurfaceError::OutOfMemory => RenderError::OutOfMemory,
        other => RenderError::Surface(other.to_string()),
    }
}

struct GpuDraw {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    material: Option<String>,
    video: Option<VideoId>,
}

struct GpuNode {
    world: Mat4,
    draws: Vec<GpuDraw>,
}

/// Streaming texture for one bound video, resized to the decoded frame.
struct VideoTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

impl VideoTexture {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        // External image copies need RENDER_ATTACHMENT on the destination
        let texture = create_rgba_texture(device, "video_texture", width, height, wgpu::TextureUsages::RENDER_ATTACHMENT);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view, size: (width, height) }
    }

    fn upload(&self, queue: &wgpu::Queue, frame: &VideoFrame) {
        match frame {
            #[cfg(target_arch = "wasm32")]
            VideoFrame::Element(video) => {
                let (width, height) = self.size;
                queue.copy_external_image_to_texture(
                    &wgpu::CopyExternalImageSourceInfo {
                        source: wgpu::ExternalImageSource::HTMLVideoElement(video.clone()),
                        origin: wgpu::Origin2d::ZERO,
                        flip_y: false,
                    },
                    wgpu::CopyExternalImageDestInfo {
                        texture: &self.texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                        color_space: wgpu::PredefinedColorSpace::Srgb,
                        premultiplied_alpha: false,
                    },
                    wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                );
            }
            VideoFrame::Rgba { width, height, pixels } => write_rgba(queue, &self.texture, *width, *height, pixels),
        }
    }
}

/// wgpu implementation of the render backend, with an egui HUD on top.
pub struct WgpuRenderer {
    gpu: GpuContext,
    depth: (wgpu::Texture, wgpu::TextureView),
    pipeline: wgpu::RenderPipeline,
    globals: GlobalsResources,
    material_layout: wgpu::BindGroupLayout,
    repeat_sampler: wgpu::Sampler,
    video_sampler: wgpu::Sampler,
    white: wgpu::TextureView,
    nodes: HashMap<NodeId, GpuNode>,
    videos: HashMap<VideoId, VideoTexture>,
    egui_ctx: egui::Context,
    egui_renderer: egui_wgpu::Renderer,
    pixels_per_point: f32,
}

impl WgpuRenderer {
    pub fn new(gpu: GpuContext) -> Self {
        let device = gpu.device.as_ref();
        let globals = create_globals_resources(device);
        let material_layout = create_material_layout(device);
        let pipeline = create_scene_pipeline(device, gpu.format, &globals.layout, &material_layout);
        let depth = create_depth_texture(device, gpu.width(), gpu.height());

        let white_texture = create_rgba_texture(device, "white_texture", 1, 1, wgpu::TextureUsages::empty());
        write_rgba(&gpu.queue, &white_texture, 1, 1, &[255; 4]);
        let white = white_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let repeat_sampler = create_sampler(device, "repeat_sampler", wgpu::AddressMode::Repeat);
        let video_sampler = create_sampler(device, "video_sampler", wgpu::AddressMode::ClampToEdge);
        let egui_renderer = egui_wgpu::Renderer::new(device, gpu.format, egui_wgpu::RendererOptions::default());

        info!("Renderer ready ({}x{}, {:?})", gpu.width(), gpu.height(), gpu.format);
        Self {
            gpu,
            depth,
            pipeline,
            globals,
            material_layout,
            repeat_sampler,
            video_sampler,
            white,
            nodes: HashMap::new(),
            videos: HashMap::new(),
            egui_ctx: egui::Context::default(),
            egui_renderer,
            pixels_per_point: 1.0,
        }
    }

    /// HUD scale, e.g. the browser's device pixel ratio.
    pub fn set_pixels_per_point(&mut self, pixels_per_point: f32) {
        self.pixels_per_point = pixels_per_point.max(0.5);
    }

    fn refresh_videos(&mut self, scene: &SceneContext) {
        let mut resized = Vec::new();
        for (id, texture) in self.videos.iter_mut() {
            let Some(frame) = scene.video(*id).and_then(|binding| binding.stream.current_frame()) else {
                continue;
            };
            let size = frame.size();
            if size.0 == 0 || size.1 == 0 {
                continue;
            }
            if size != texture.size {
                debug!("Video texture {:?} now {}x{}", id, size.0, size.1);
                *texture = VideoTexture::new(&self.gpu.device, size.0, size.1);
                resized.push(*id);
            }
            texture.upload(&self.gpu.queue, &frame);
        }
        for id in resized {
            self.rebind_video(id);
        }
    }

    fn rebind_video(&mut self, video: VideoId) {
        let Some(texture) = self.videos.get(&video) else {
            return;
        };
        for draw in self.nodes.values_mut().flat_map(|n| n.draws.iter_mut()) {
            if draw.video == Some(video) {
                draw.bind_group = material_bind_group(
                    &self.gpu.device,
                    &self.material_layout,
                    &draw.uniform_buffer,
                    &texture.view,
                    &self.video_sampler,
                );
            }
        }
    }

    fn hud_primitives(&mut self, frame: &Frame) -> (Vec<egui::ClippedPrimitive>, egui::TexturesDelta) {
        let ppp = self.pixels_per_point;
        let raw_input = egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(
                egui::Pos2::ZERO,
                egui::vec2(self.gpu.width() as f32 / ppp, self.gpu.height() as f32 / ppp),
            )),
            ..Default::default()
        };
        self.egui_ctx.set_pixels_per_point(ppp);
        let output = self.egui_ctx.run(raw_input, |ctx| crate::ui::build_hud(ctx, frame));
        let primitives = self.egui_ctx.tessellate(output.shapes, output.pixels_per_point);
        (primitives, output.textures_delta)
    }
}

impl RenderBackend for WgpuRenderer {
    fn insert_node(&mut self, node: NodeId, mesh: &MeshData, world: Mat4) -> Result<(), RenderError> {
        let device = self.gpu.device.as_ref();
        let textures: Vec<wgpu::TextureView> =
            mesh.textures.iter().map(|t| upload_texture(device, &self.gpu.queue, t)).collect();

        let mut draws = Vec::with_capacity(mesh.primitives.len());
        for prim in mesh.primitives.iter().filter(|p| !p.indices.is_empty()) {
            let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("node_vertices"),
                contents: bytemuck::cast_slice(&prim.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("node_indices"),
                contents: bytemuck::cast_slice(&prim.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("draw_uniform"),
                contents: bytemuck::bytes_of(&DrawUniform::new(world, &prim.material)),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let view = prim.material.base_color_texture.and_then(|i| textures.get(i)).unwrap_or(&self.white);
            let bind_group =
                material_bind_group(device, &self.material_layout, &uniform_buffer, view, &self.repeat_sampler);

            draws.push(GpuDraw {
                vertex_buffer,
                index_buffer,
                index_count: prim.indices.len() as u32,
                uniform_buffer,
                bind_group,
                material: prim.material.name.clone(),
                video: None,
            });
        }

        debug!("Uploaded node {:?}: {} draw(s), {} texture(s)", node, draws.len(), textures.len());
        self.nodes.insert(node, GpuNode { world, draws });
        Ok(())
    }

    fn apply_video_material(&mut self, node: NodeId, material: &str, video: VideoId, uv: UvTransform) -> usize {
        let Some(gpu_node) = self.nodes.get_mut(&node) else {
            warn!("Video material for unknown node {:?}", node);
            return 0;
        };
        let device = self.gpu.device.as_ref();
        let texture = self.videos.entry(video).or_insert_with(|| VideoTexture::new(device, 1, 1));

        let uniform = DrawUniform::video(gpu_node.world, uv);
        let mut slots = 0;
        for draw in gpu_node.draws.iter_mut().filter(|d| d.material.as_deref() == Some(material)) {
            self.gpu.queue.write_buffer(&draw.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
            draw.bind_group =
                material_bind_group(device, &self.material_layout, &draw.uniform_buffer, &texture.view, &self.video_sampler);
            draw.video = Some(video);
            slots += 1;
        }
        slots
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.gpu.resize(width, height);
        self.depth = create_depth_texture(&self.gpu.device, width, height);
    }

    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        self.refresh_videos(frame.scene);

        let globals = GlobalsUniform::new(frame.scene, frame.camera);
        self.gpu.queue.write_buffer(&self.globals.buffer, 0, bytemuck::bytes_of(&globals));

        let surface_texture = match self.gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Timeout) => {
                debug!("Surface timeout, skipping frame");
                return Ok(());
            }
            Err(e) => {
                if matches!(e, wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) {
                    self.gpu.reconfigure();
                }
                return Err(surface_error(e));
            }
        };

        let (primitives, textures_delta) = self.hud_primitives(frame);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gpu.width(), self.gpu.height()],
            pixels_per_point: self.pixels_per_point,
        };

        let device = self.gpu.device.as_ref();
        let queue = self.gpu.queue.as_ref();
        let view = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("encoder") });

        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(frame.scene.atmosphere.background.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.1,
                    depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(1.0), store: wgpu::StoreOp::Store }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_pipeline(&self.pipeline);
            rp.set_bind_group(0, &self.globals.bind_group, &[]);
            for draw in self.nodes.values().flat_map(|n| n.draws.iter()) {
                rp.set_bind_group(1, &draw.bind_group, &[]);
                rp.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
                rp.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                rp.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        for (id, image_delta) in &textures_delta.set {
            self.egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        let hud_commands =
            self.egui_renderer
                .update_buffers(device, queue, &mut encoder, &primitives, &screen_descriptor);

        {
            let hud_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("hud_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.egui_renderer
                .render(&mut hud_pass.forget_lifetime(), &primitives, &screen_descriptor);
        }

        for id in &textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        queue.submit(hud_commands.into_iter().chain(std::iter::once(encoder.finish())));
        surface_texture.present();
        Ok(())
    }
}
