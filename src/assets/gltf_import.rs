use super::AssetError;
use crate::scene::{Geometry, Material, Mesh, Node, Transform};
use glam::{Quat, Vec3};
use std::path::Path;

/// Reads a glTF/GLB file and converts its default scene into a node tree.
pub fn import_gltf(path: &Path) -> Result<Node, AssetError> {
    let display = path.display().to_string();
    std::fs::metadata(path).map_err(|source| AssetError::Read {
        path: display.clone(),
        source,
    })?;
    let (document, buffers, _images) =
        gltf::import(path).map_err(|source| AssetError::ParseGltf {
            path: display.clone(),
            source,
        })?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| AssetError::NoScene {
            path: display.clone(),
        })?;

    let name = scene
        .name()
        .map(str::to_string)
        .or_else(|| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "scene".to_string());

    let mut root = Node::new(name);
    let mut ancestors = Vec::new();
    for node in scene.nodes() {
        root.children
            .push(convert_node(&node, &buffers, &mut ancestors, &display)?);
    }
    log::info!(
        "Imported {} ({} meshes, {} top-level nodes)",
        display,
        root.mesh_count(),
        root.children.len()
    );
    Ok(root)
}

/// `ancestors` holds the node indices on the path from the scene root; a
/// node that reappears there would recurse forever.
fn convert_node(
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    ancestors: &mut Vec<usize>,
    path: &str,
) -> Result<Node, AssetError> {
    if ancestors.contains(&node.index()) {
        return Err(AssetError::CyclicHierarchy {
            path: path.to_string(),
            node: node.index(),
        });
    }
    ancestors.push(node.index());

    let (translation, rotation, scale) = node.transform().decomposed();
    let mut out = Node::new(node.name().unwrap_or("node"));
    out.transform = Transform {
        translation: Vec3::from(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from(scale),
    };

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping non-triangle primitive {:?} in mesh {}",
                    primitive.mode(),
                    mesh.index()
                );
                continue;
            }
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let positions: Vec<[f32; 3]> = match reader.read_positions() {
                Some(positions) => positions.collect(),
                None => {
                    log::warn!("Primitive in mesh {} has no positions", mesh.index());
                    continue;
                }
            };
            let normals = reader.read_normals().map(|normals| normals.collect());
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            let base_color = primitive
                .material()
                .pbr_metallic_roughness()
                .base_color_factor();
            out.meshes.push(Mesh::new(
                Geometry::new(positions, normals, indices),
                Material::new(base_color),
            ));
        }
    }

    for child in node.children() {
        out.children
            .push(convert_node(&child, buffers, ancestors, path)?);
    }
    ancestors.pop();
    Ok(out)
}
