use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use nalgebra::{Matrix4, Vector2, Vector3};
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindingResource, Buffer, BufferUsages, Device, Extent3d, FilterMode, Queue, RenderPass,
    SamplerDescriptor, ShaderStages, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsages, TextureViewDescriptor,
};

use crate::face::Face;
use crate::group::{build_vertex_buffer, FLOATS_PER_VERTEX};
use crate::material::Material;
use crate::mesh::Mesh;
use crate::texture::{TextureCache, TextureId};

pub const OBJECT_COLOR: [f32; 3] = [0.7, 0.7, 0.7];
pub const PROJECTILE_COLOR: [f32; 3] = [1.0, 1.0, 0.0];
pub const PROJECTILE_SCALE: f32 = 0.05;

// push constant block, laid out exactly like `Draw` in shader.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct DrawConstants {
    pub model: [[f32; 4]; 4],
    pub ka: [f32; 4],
    // w: 1 when the bound texture should be used
    pub kd: [f32; 4],
    // w: shininess
    pub ks: [f32; 4],
    // w: 1 for projectiles
    pub base_color: [f32; 4],
}

impl DrawConstants {
    pub fn new(
        model: &Matrix4<f32>,
        material: &Material,
        textured: bool,
        base_color: [f32; 3],
        projectile: bool,
    ) -> Self {
        let [r, g, b] = base_color;
        Self {
            model: (*model).into(),
            ka: [material.ka.x, material.ka.y, material.ka.z, 0.0],
            kd: [material.kd.x, material.kd.y, material.kd.z, textured as u8 as f32],
            ks: [material.ks.x, material.ks.y, material.ks.z, material.ns],
            base_color: [r, g, b, projectile as u8 as f32],
        }
    }
}

// one diffuse map bind group per cached texture, plus a white one for everything else
pub struct TextureBindings {
    maps: Vec<BindGroup>,
    white: BindGroup,
}

impl TextureBindings {
    pub fn create(
        device: &Device,
        queue: &Queue,
        layout: &BindGroupLayout,
        textures: &TextureCache,
    ) -> Self {
        let maps = textures
            .iter()
            .map(|(_, image)| texture_bind_group(device, queue, layout, image))
            .collect::<Vec<_>>();
        let white = texture_bind_group(
            device,
            queue,
            layout,
            &RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])),
        );
        log::info!("Uploaded {} texture(s)", maps.len());
        Self { maps, white }
    }

    pub fn get(&self, id: Option<TextureId>) -> &BindGroup {
        id.and_then(|id| self.maps.get(id.0)).unwrap_or(&self.white)
    }
}

fn texture_bind_group(
    device: &Device,
    queue: &Queue,
    layout: &BindGroupLayout,
    image: &RgbaImage,
) -> BindGroup {
    let tex = device.create_texture_with_data(
        queue,
        &TextureDescriptor {
            label: None,
            size: Extent3d {
                width: image.width(),
                height: image.height(),
                depth_or_array_layers: 1,
            },
            // TODO: mipmaps
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        image.as_raw(),
    );
    let view = tex.create_view(&TextureViewDescriptor::default());
    let sampler = device.create_sampler(&SamplerDescriptor {
        address_mode_u: AddressMode::Repeat,
        address_mode_v: AddressMode::Repeat,
        min_filter: FilterMode::Linear,
        mag_filter: FilterMode::Linear,
        ..Default::default()
    });
    device.create_bind_group(&BindGroupDescriptor {
        label: None,
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(&view),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(&sampler),
            },
        ],
    })
}

// one draw call's worth of triangles
pub struct GpuGroup {
    vertex_buffer: Buffer,
    vertex_count: u32,
    material: Material,
    texture: Option<TextureId>,
}

impl GpuGroup {
    pub fn create(
        device: &Device,
        vertices: &[f32],
        material: Material,
        texture: Option<TextureId>,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: None,
            contents: bytemuck::cast_slice(vertices),
            usage: BufferUsages::VERTEX,
        });
        Self {
            vertex_buffer,
            vertex_count: (vertices.len() / FLOATS_PER_VERTEX) as u32,
            material,
            texture,
        }
    }

    pub fn draw<'a>(
        &'a self,
        rpass: &mut RenderPass<'a>,
        textures: &'a TextureBindings,
        constants: &DrawConstants,
    ) {
        rpass.set_bind_group(1, textures.get(self.texture), &[]);
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        rpass.set_push_constants(
            ShaderStages::VERTEX_FRAGMENT,
            0,
            bytemuck::bytes_of(constants),
        );
        rpass.draw(0..self.vertex_count, 0..1);
    }
}

pub struct GpuMesh {
    groups: Vec<GpuGroup>,
}

impl GpuMesh {
    pub fn create(device: &Device, mesh: &Mesh) -> Self {
        let groups = mesh
            .groups
            .iter()
            .filter(|g| g.vertex_count() > 0)
            .map(|g| GpuGroup::create(device, &g.vertices, g.material.clone(), g.texture))
            .collect();
        Self { groups }
    }

    // a unit cube around the origin; projectiles scale it down
    pub fn cube(device: &Device) -> Self {
        Self {
            groups: vec![GpuGroup::create(
                device,
                &cube_vertices(),
                Material::default(),
                None,
            )],
        }
    }

    // scene objects: per-group material and texture
    pub fn draw<'a>(
        &'a self,
        rpass: &mut RenderPass<'a>,
        textures: &'a TextureBindings,
        model: &Matrix4<f32>,
    ) {
        for group in self.groups.iter() {
            let constants = DrawConstants::new(
                model,
                &group.material,
                group.texture.is_some(),
                OBJECT_COLOR,
                false,
            );
            group.draw(rpass, textures, &constants);
        }
    }

    // flat colour, textures ignored
    pub fn draw_solid<'a>(
        &'a self,
        rpass: &mut RenderPass<'a>,
        textures: &'a TextureBindings,
        model: &Matrix4<f32>,
        color: [f32; 3],
    ) {
        for group in self.groups.iter() {
            let constants = DrawConstants::new(model, &group.material, false, color, true);
            group.draw(rpass, textures, &constants);
        }
    }
}

fn cube_vertices() -> Vec<f32> {
    let positions = [
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
    ]
    .map(|[x, y, z]: [f32; 3]| Vector3::new(x, y, z));
    let normals = [
        [0.0, 0.0, -1.0],
        [0.0, 0.0, 1.0],
        [-1.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 1.0, 0.0],
    ]
    .map(|[x, y, z]: [f32; 3]| Vector3::new(x, y, z));
    let sides: [([u32; 4], u32); 6] = [
        ([1, 4, 3, 2], 1),
        ([5, 6, 7, 8], 2),
        ([1, 5, 8, 4], 3),
        ([2, 3, 7, 6], 4),
        ([1, 2, 6, 5], 5),
        ([4, 8, 7, 3], 6),
    ];
    let faces = sides
        .iter()
        .flat_map(|(quad, n)| Face::new(quad.to_vec(), vec![], vec![*n; 4]).triangulate())
        .collect::<Vec<_>>();
    build_vertex_buffer(&faces, &positions, &[] as &[Vector2<f32>], &normals)
}
