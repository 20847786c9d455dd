use anyhow::{anyhow, Context};
use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Perspective3, Vector3};
use std::borrow::Cow;
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    vertex_attr_array, Backends, BindGroup, BindGroupDescriptor, BindGroupEntry,
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, Buffer,
    BufferBindingType, BufferUsages, Color, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, CompareFunction, DepthStencilState, Device, DeviceDescriptor,
    Extent3d, Features, FragmentState, Instance, InstanceDescriptor, Limits, LoadOp, Operations,
    PipelineLayoutDescriptor, PowerPreference, PrimitiveState, PushConstantRange, Queue,
    RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDescriptor,
    RenderPipeline, RenderPipelineDescriptor, RequestAdapterOptions, SamplerBindingType,
    ShaderModule, ShaderSource, ShaderStages, Surface, SurfaceConfiguration, SurfaceError,
    TextureDescriptor, TextureDimension, TextureFormat, TextureSampleType, TextureUsages,
    TextureView, TextureViewDescriptor, TextureViewDimension, VertexBufferLayout, VertexState,
    VertexStepMode,
};
use winit::window::Window;

use crate::camera::Camera3D;
use crate::group::FLOATS_PER_VERTEX;
use crate::gpumesh::{DrawConstants, GpuMesh, TextureBindings, PROJECTILE_COLOR, PROJECTILE_SCALE};
use crate::mesh::Mesh;
use crate::scene::{Attenuation, Fog, Light};
use crate::texture::TextureCache;

const NEAR: f32 = 0.1;
const FAR: f32 = 100.0;
const CLEAR_COLOR: [f32; 3] = [0.85, 1.0, 0.85];

// nalgebra's projection maps depth to [-1, 1], wgpu wants [0, 1]
#[rustfmt::skip]
fn opengl_to_wgpu() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

fn depth(device: &Device, width: u32, height: u32) -> TextureView {
    let depth = device.create_texture(&TextureDescriptor {
        size: Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Depth32Float,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
        label: None,
    });
    depth.create_view(&TextureViewDescriptor::default())
}

fn projgen(width: u32, height: u32, fov: f32) -> Matrix4<f32> {
    let proj = Perspective3::new(width as f32 / height.max(1) as f32, fov, NEAR, FAR);
    opengl_to_wgpu() * proj.to_homogeneous()
}

// per-frame uniform, laid out exactly like `Frame` in shader.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct FrameUniform {
    projview: [[f32; 4]; 4],
    view_pos: [f32; 4],
    light_pos: [f32; 4],
    light_intensity: [f32; 4],
    attenuation: [f32; 4],
    fog_color: [f32; 4],
    fog_density: f32,
    fog_start: f32,
    fog_end: f32,
    fog_kind: u32,
}

fn vec4(v: &Vector3<f32>, w: f32) -> [f32; 4] {
    [v.x, v.y, v.z, w]
}

pub fn clear_color(fog: &Fog) -> [f32; 3] {
    if fog.enabled {
        fog.color.into()
    } else {
        CLEAR_COLOR
    }
}

pub enum Renderable<'a> {
    SceneMesh {
        mesh: &'a GpuMesh,
        transform: Matrix4<f32>,
    },
    Projectile {
        position: Vector3<f32>,
    },
}

impl<'a> Renderable<'a> {
    pub fn model(&self) -> Matrix4<f32> {
        match self {
            Renderable::SceneMesh { transform, .. } => *transform,
            Renderable::Projectile { position } => {
                Matrix4::new_translation(position) * Matrix4::new_scaling(PROJECTILE_SCALE)
            }
        }
    }
}

pub struct RenderState {
    // base
    _instance: Instance,
    surface: Surface,
    surface_cfg: SurfaceConfiguration,
    device: Device,
    queue: Queue,
    _shader: ShaderModule,
    // pipeline & layouts
    texture_layout: BindGroupLayout,
    pipeline: RenderPipeline,
    frame_buffer: Buffer,
    frame_bind_group: BindGroup,
    textures: Option<TextureBindings>,
    projectile_cube: GpuMesh,
    depth_view: TextureView,
    // uniform contents, written once per render
    frame: FrameUniform,
    clear: [f32; 3],
}

impl RenderState {
    pub fn create(window: &Window) -> anyhow::Result<Self> {
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::PRIMARY,
            dx12_shader_compiler: Default::default(),
        });
        let surface = unsafe { instance.create_surface(&window) }
            .context("couldn't create a surface for the window")?;
        let adapter = futures::executor::block_on(async {
            instance
                .request_adapter(&RequestAdapterOptions {
                    power_preference: PowerPreference::HighPerformance,
                    force_fallback_adapter: false,
                    compatible_surface: Some(&surface),
                })
                .await
        })
        .ok_or_else(|| anyhow!("no graphics adapter can draw to this window"))?;
        log::info!("Chose the adapter: {:?}", adapter.get_info());
        let (width, height) = window.inner_size().into();
        let surface_cfg = surface
            .get_default_config(&adapter, width, height)
            .ok_or_else(|| anyhow!("the surface isn't supported by the adapter"))?;
        let (device, queue) = futures::executor::block_on(async {
            adapter
                .request_device(
                    &DeviceDescriptor {
                        label: None,
                        features: Features::PUSH_CONSTANTS,
                        limits: Limits {
                            // supported on basically every platform
                            max_push_constant_size: 128,
                            ..Default::default()
                        },
                    },
                    None,
                )
                .await
        })
        .context("couldn't open the graphics device")?;
        surface.configure(&device, &surface_cfg);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: None,
            source: ShaderSource::Wgsl(Cow::Borrowed(include_str!("shader.wgsl"))),
        });
        let frame_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: None,
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: None,
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[&frame_layout, &texture_layout],
            push_constant_ranges: &[PushConstantRange {
                stages: ShaderStages::VERTEX_FRAGMENT,
                range: 0..std::mem::size_of::<DrawConstants>() as u32,
            }],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: None,
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[VertexBufferLayout {
                    array_stride: (FLOATS_PER_VERTEX * 4) as u64,
                    step_mode: VertexStepMode::Vertex,
                    attributes: &vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3],
                }],
            },
            // triangles, no culling; obj winding isn't reliable
            primitive: PrimitiveState::default(),
            depth_stencil: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(ColorTargetState {
                    format: surface_cfg.format,
                    blend: None,
                    write_mask: ColorWrites::COLOR,
                })],
            }),
            multiview: None,
        });

        let frame = FrameUniform::zeroed();
        let frame_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: None,
            contents: bytemuck::bytes_of(&frame),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let frame_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: &frame_layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let projectile_cube = GpuMesh::cube(&device);
        let depth_view = depth(&device, width, height);
        Ok(Self {
            _instance: instance,
            surface,
            surface_cfg,
            device,
            queue,
            _shader: shader,
            texture_layout,
            pipeline,
            frame_buffer,
            frame_bind_group,
            textures: None,
            projectile_cube,
            depth_view,
            frame,
            clear: CLEAR_COLOR,
        })
    }

    // every cached image becomes a bind group, indexed by its TextureId
    pub fn upload_textures(&mut self, textures: &TextureCache) {
        if textures.is_empty() {
            log::debug!("No textures cached, everything draws untextured");
        } else {
            log::debug!("Uploading {} cached texture(s)", textures.len());
        }
        self.textures = Some(TextureBindings::create(
            &self.device,
            &self.queue,
            &self.texture_layout,
            textures,
        ));
    }

    pub fn upload_mesh(&self, mesh: &Mesh) -> GpuMesh {
        GpuMesh::create(&self.device, mesh)
    }

    pub fn resize(&mut self, (width, height): (u32, u32)) {
        // minimized
        if width == 0 || height == 0 {
            return;
        }
        self.surface_cfg.width = width;
        self.surface_cfg.height = height;
        self.surface.configure(&self.device, &self.surface_cfg);
        self.depth_view = depth(&self.device, width, height);
    }

    pub fn update_camera(&mut self, camera: &Camera3D) {
        let proj = projgen(self.surface_cfg.width, self.surface_cfg.height, camera.fov());
        self.frame.projview = (proj * camera.matrix()).into();
        self.frame.view_pos = vec4(&camera.position, 1.0);
    }

    pub fn set_environment(&mut self, light: &Light, attenuation: &Attenuation, fog: &Fog) {
        self.frame.light_pos = vec4(&light.position, 1.0);
        self.frame.light_intensity = vec4(&light.intensity, 0.0);
        self.frame.attenuation = [
            attenuation.constant,
            attenuation.linear,
            attenuation.quadratic,
            0.0,
        ];
        self.frame.fog_color = vec4(&fog.color, fog.enabled as u8 as f32);
        self.frame.fog_density = fog.density;
        self.frame.fog_start = fog.start;
        self.frame.fog_end = fog.end;
        self.frame.fog_kind = fog.kind as u32;
        self.clear = clear_color(fog);
    }

    pub fn render(&self, renderables: &[Renderable]) -> anyhow::Result<()> {
        let textures = self
            .textures
            .as_ref()
            .ok_or_else(|| anyhow!("textures have to be uploaded before rendering"))?;
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost) | Err(SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.surface_cfg);
                return Ok(());
            }
            Err(SurfaceError::Timeout) => {
                log::warn!("Timed out waiting for the next frame");
                return Ok(());
            }
            Err(e) => return Err(e).context("couldn't get the next frame"),
        };
        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&self.frame));

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        {
            let [r, g, b] = self.clear;
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: 1.0,
                        }),
                        store: true,
                    },
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: true,
                    }),
                    stencil_ops: None,
                }),
            });
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.frame_bind_group, &[]);
            for renderable in renderables.iter() {
                let model = renderable.model();
                match renderable {
                    Renderable::SceneMesh { mesh, .. } => mesh.draw(&mut rpass, textures, &model),
                    Renderable::Projectile { .. } => {
                        self.projectile_cube
                            .draw_solid(&mut rpass, textures, &model, PROJECTILE_COLOR)
                    }
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}
