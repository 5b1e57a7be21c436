use super::{physical_size, PerspectiveCamera, RenderBackend, RenderError, RenderSurface};
use crate::dom::Element;
use crate::scene::{Light, Mesh, MeshId, Scene};
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniform {
    view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
    light_color: [f32; 4],
    ambient: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ObjectUniform {
    model: [[f32; 4]; 4],
    color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuVertex {
    position: [f32; 3],
    normal: [f32; 3],
}

impl GpuVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Geometry and material buffers for one scene mesh.
struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
}

impl GpuMesh {
    fn destroy(self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.object_buffer.destroy();
    }
}

/// Creates wgpu surfaces on a winit window.
pub struct GpuBackend {
    instance: wgpu::Instance,
    window: Arc<Window>,
}

impl GpuBackend {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            instance: wgpu::Instance::default(),
            window,
        }
    }
}

impl RenderBackend for GpuBackend {
    type Surface = GpuSurface;

    fn create_surface(
        &self,
        width: u32,
        height: u32,
        pixel_ratio: f64,
    ) -> Result<GpuSurface, RenderError> {
        pollster::block_on(GpuSurface::new(
            &self.instance,
            self.window.clone(),
            width,
            height,
            pixel_ratio,
        ))
    }
}

pub struct GpuSurface {
    canvas: Element,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    logical_size: (u32, u32),
    pixel_ratio: f64,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    pipeline: wgpu::RenderPipeline,
    object_layout: wgpu::BindGroupLayout,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    meshes: HashMap<MeshId, GpuMesh>,
    disposed: bool,
}

impl GpuSurface {
    async fn new(
        instance: &wgpu::Instance,
        window: Arc<Window>,
        width: u32,
        height: u32,
        pixel_ratio: f64,
    ) -> Result<Self, RenderError> {
        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::SurfaceCreateFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("hero-viewer device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceCreateFailed(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(RenderError::NoSurfaceFormat)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (physical_width, physical_height) = physical_size(width, height, pixel_ratio);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: physical_width,
            height: physical_height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let (depth_texture, depth_view) = create_depth_texture(&device, &config);

        let shader = device.create_shader_module(wgpu::include_wgsl!("shader.wgsl"));

        let scene_layout = uniform_layout(&device, "Scene Layout");
        let object_layout = uniform_layout(&device, "Object Layout");

        let scene_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Buffer"),
            contents: bytemuck::cast_slice(&[SceneUniform::identity()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Model Pipeline Layout"),
            bind_group_layouts: &[&scene_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Model Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[GpuVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        log::info!(
            "GPU surface ready: {}x{} (ratio {:.2}, {:?})",
            physical_width,
            physical_height,
            pixel_ratio,
            adapter.get_info().backend
        );

        let canvas = Element::new("canvas");
        canvas.set_client_size(width, height);

        Ok(Self {
            canvas,
            surface,
            device,
            queue,
            config,
            logical_size: (width, height),
            pixel_ratio,
            depth_texture,
            depth_view,
            pipeline,
            object_layout,
            scene_buffer,
            scene_bind_group,
            meshes: HashMap::new(),
            disposed: false,
        })
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
        self.depth_texture.destroy();
        let (depth_texture, depth_view) = create_depth_texture(&self.device, &self.config);
        self.depth_texture = depth_texture;
        self.depth_view = depth_view;
    }

    fn upload_mesh(&self, mesh: &Mesh) -> Option<GpuMesh> {
        let geometry = &mesh.geometry;
        if geometry.is_disposed() || geometry.indices().is_empty() {
            return None;
        }
        let vertices: Vec<GpuVertex> = geometry
            .positions()
            .iter()
            .zip(geometry.normals())
            .map(|(&position, &normal)| GpuVertex { position, normal })
            .collect();
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(geometry.indices()),
                usage: wgpu::BufferUsages::INDEX,
            });
        let object_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Mesh Object Buffer"),
            size: std::mem::size_of::<ObjectUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let object_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh Object Bind Group"),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: object_buffer.as_entire_binding(),
            }],
        });
        Some(GpuMesh {
            vertex_buffer,
            index_buffer,
            num_indices: geometry.indices().len() as u32,
            object_buffer,
            object_bind_group,
        })
    }
}

impl RenderSurface for GpuSurface {
    fn canvas(&self) -> &Element {
        &self.canvas
    }

    fn size(&self) -> (u32, u32) {
        self.logical_size
    }

    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn set_size(&mut self, width: u32, height: u32) {
        if self.logical_size == (width, height) || self.disposed {
            return;
        }
        self.logical_size = (width, height);
        let (physical_width, physical_height) = physical_size(width, height, self.pixel_ratio);
        self.config.width = physical_width;
        self.config.height = physical_height;
        self.canvas.set_client_size(width, height);
        self.reconfigure();
    }

    fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 || self.disposed {
            return;
        }
        if (self.pixel_ratio - pixel_ratio).abs() < f64::EPSILON {
            return;
        }
        log::debug!("Surface pixel ratio {} -> {}", self.pixel_ratio, pixel_ratio);
        self.pixel_ratio = pixel_ratio;
        let (width, height) = self.logical_size;
        let (physical_width, physical_height) = physical_size(width, height, pixel_ratio);
        self.config.width = physical_width;
        self.config.height = physical_height;
        self.reconfigure();
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) {
        if self.disposed {
            return;
        }

        self.queue.write_buffer(
            &self.scene_buffer,
            0,
            bytemuck::cast_slice(&[SceneUniform::from_scene(scene, camera)]),
        );

        let mut draw_list = Vec::new();
        let mut uploads = Vec::new();
        scene.visit_meshes(|world, mesh| {
            if !self.meshes.contains_key(&mesh.id()) {
                if let Some(gpu) = self.upload_mesh(mesh) {
                    uploads.push((mesh.id(), gpu));
                }
            }
            draw_list.push((
                mesh.id(),
                ObjectUniform {
                    model: world.to_cols_array_2d(),
                    color: mesh.material.base_color,
                },
            ));
        });
        self.meshes.extend(uploads);
        for (id, object) in &draw_list {
            if let Some(gpu) = self.meshes.get(id) {
                self.queue
                    .write_buffer(&gpu.object_buffer, 0, bytemuck::cast_slice(&[*object]));
            }
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.reconfigure();
                return;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory while acquiring frame");
                return;
            }
            Err(e) => {
                log::warn!("Skipping frame: {e:?}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Model Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.scene_bind_group, &[]);
            for (id, _) in &draw_list {
                if let Some(gpu) = self.meshes.get(id) {
                    pass.set_bind_group(1, &gpu.object_bind_group, &[]);
                    pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
                    pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..gpu.num_indices, 0, 0..1);
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }

    fn release_mesh(&mut self, mesh: MeshId) {
        if let Some(gpu) = self.meshes.remove(&mesh) {
            gpu.destroy();
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.depth_texture.destroy();
        self.scene_buffer.destroy();
        log::debug!("GPU surface disposed ({} mesh buffers outstanding)", self.meshes.len());
    }
}

impl Drop for GpuSurface {
    fn drop(&mut self) {
        for (_, gpu) in self.meshes.drain() {
            gpu.destroy();
        }
    }
}

impl SceneUniform {
    fn identity() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            light_dir: [0.0, 1.0, 0.0, 0.0],
            light_color: [0.0; 4],
            ambient: [0.0; 4],
        }
    }

    fn from_scene(scene: &Scene, camera: &PerspectiveCamera) -> Self {
        let mut uniform = Self::identity();
        uniform.view_proj = camera.view_projection().to_cols_array_2d();
        let mut ambient = Vec3::ZERO;
        for light in scene.lights() {
            match *light {
                Light::Ambient { color, intensity } => {
                    ambient += Vec3::from(color) * intensity;
                }
                Light::Directional {
                    color,
                    intensity,
                    position,
                } => {
                    let dir = position.try_normalize().unwrap_or(Vec3::Y);
                    uniform.light_dir = dir.extend(0.0).to_array();
                    uniform.light_color = (Vec3::from(color) * intensity).extend(1.0).to_array();
                }
            }
        }
        uniform.ambient = ambient.extend(1.0).to_array();
        uniform
    }
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn create_depth_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
