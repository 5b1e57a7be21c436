use glam::{Mat4, Quat, Vec3};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique mesh identity; render backends key GPU buffers by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(u64);

impl MeshId {
    fn next() -> Self {
        Self(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Aabb {
            min: first,
            max: first,
        };
        for p in iter {
            aabb.expand_point(p);
        }
        Some(aabb)
    }

    pub fn expand_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(self, other: Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let mut out: Option<Aabb> = None;
        for corner in self.corners() {
            let p = matrix.transform_point3(corner);
            match &mut out {
                Some(aabb) => aabb.expand_point(p),
                None => out = Some(Aabb { min: p, max: p }),
            }
        }
        out.unwrap_or(*self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    indices: Vec<u32>,
    bounds: Option<Aabb>,
    disposed: bool,
}

impl Geometry {
    /// Builds indexed triangle geometry. Missing normals are derived from the
    /// triangles.
    pub fn new(positions: Vec<[f32; 3]>, normals: Option<Vec<[f32; 3]>>, indices: Vec<u32>) -> Self {
        let normals = match normals {
            Some(n) if n.len() == positions.len() => n,
            _ => vertex_normals(&positions, &indices),
        };
        let bounds = Aabb::from_points(positions.iter().copied().map(Vec3::from));
        Self {
            positions,
            normals,
            indices,
            bounds,
            disposed: false,
        }
    }

    /// Axis-aligned box spanning `min..max`, 12 triangles.
    pub fn cuboid(min: Vec3, max: Vec3) -> Self {
        let corners = Aabb { min, max }.corners();
        let positions: Vec<[f32; 3]> = corners.iter().map(|c| c.to_array()).collect();
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 1, 2, 3, // -z
            4, 5, 6, 5, 7, 6, // +z
            0, 4, 2, 2, 4, 6, // -x
            1, 3, 5, 3, 7, 5, // +x
            0, 1, 4, 1, 5, 4, // -y
            2, 6, 3, 3, 6, 7, // +y
        ];
        Self::new(positions, None, indices)
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn dispose(&mut self) {
        self.positions = Vec::new();
        self.normals = Vec::new();
        self.indices = Vec::new();
        self.disposed = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub base_color: [f32; 4],
    disposed: bool,
}

impl Material {
    pub fn new(base_color: [f32; 4]) -> Self {
        Self {
            base_color,
            disposed: false,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    id: MeshId,
    pub geometry: Geometry,
    pub material: Material,
}

impl Mesh {
    pub fn new(geometry: Geometry, material: Material) -> Self {
        Self {
            id: MeshId::next(),
            geometry,
            material,
        }
    }

    pub fn id(&self) -> MeshId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub meshes: Vec<Mesh>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// World-space bounds of every mesh under this node, with this node's
    /// own transform applied on top of `parent`.
    pub fn world_bounds(&self, parent: &Mat4) -> Option<Aabb> {
        let world = *parent * self.transform.matrix();
        let own = self
            .meshes
            .iter()
            .filter_map(|m| m.geometry.bounds())
            .map(|b| b.transformed(&world))
            .reduce(Aabb::union);
        self.children
            .iter()
            .filter_map(|c| c.world_bounds(&world))
            .fold(own, |acc, b| Some(acc.map_or(b, |a| a.union(b))))
    }

    pub fn visit_meshes<F: FnMut(&Mat4, &Mesh)>(&self, parent: &Mat4, f: &mut F) {
        let world = *parent * self.transform.matrix();
        for mesh in &self.meshes {
            f(&world, mesh);
        }
        for child in &self.children {
            child.visit_meshes(&world, f);
        }
    }

    pub fn visit_meshes_mut<F: FnMut(&mut Mesh)>(&mut self, f: &mut F) {
        for mesh in &mut self.meshes {
            f(mesh);
        }
        for child in &mut self.children {
            child.visit_meshes_mut(f);
        }
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len() + self.children.iter().map(Node::mesh_count).sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient {
        color: [f32; 3],
        intensity: f32,
    },
    /// Shines from `position` towards the origin.
    Directional {
        color: [f32; 3],
        intensity: f32,
        position: Vec3,
    },
}

#[derive(Default)]
pub struct Scene {
    next_node_id: u64,
    roots: Vec<(NodeId, Node)>,
    lights: Vec<Light>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        self.next_node_id += 1;
        let id = NodeId(self.next_node_id);
        self.roots.push((id, node));
        id
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let index = self.roots.iter().position(|(rid, _)| *rid == id)?;
        Some(self.roots.remove(index).1)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.roots.iter().find(|(rid, _)| *rid == id).map(|(_, n)| n)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.roots.iter().map(|(_, n)| n)
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn visit_meshes<F: FnMut(&Mat4, &Mesh)>(&self, mut f: F) {
        for (_, node) in &self.roots {
            node.visit_meshes(&Mat4::IDENTITY, &mut f);
        }
    }

    pub fn visit_meshes_mut<F: FnMut(&mut Mesh)>(&mut self, mut f: F) {
        for (_, node) in &mut self.roots {
            node.visit_meshes_mut(&mut f);
        }
    }
}

/// Area-weighted vertex normals for an indexed triangle list.
pub fn vertex_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let (ia, ib, ic) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if ia >= positions.len() || ib >= positions.len() || ic >= positions.len() {
            continue;
        }
        let a = Vec3::from(positions[ia]);
        let b = Vec3::from(positions[ib]);
        let c = Vec3::from(positions[ic]);
        let face = (b - a).cross(c - a);
        normals[ia] += face;
        normals[ib] += face;
        normals[ic] += face;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}
