use std::path::Path;

use glam::{Mat4, Quat, Vec3};

use crate::error::LoadError;

pub struct NodeData {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub translation: Vec3,
    pub rotation: Quat,
    /// Non-uniform scales are collapsed to their largest component
    pub scale: f32,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
}

pub struct PrimitiveData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
    pub base_color: [f32; 4],
}

impl PrimitiveData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

pub struct MeshData {
    pub name: String,
    pub primitives: Vec<PrimitiveData>,
}

pub struct SkinData {
    /// Node indices of the joints, in skin order
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// A character model decoded from glTF: node hierarchy, meshes and skins.
pub struct ModelAsset {
    pub name: String,
    pub nodes: Vec<NodeData>,
    pub meshes: Vec<MeshData>,
    pub skins: Vec<SkinData>,
}

impl ModelAsset {
    pub fn from_gltf_slice(path: &Path, bytes: &[u8]) -> Result<Self, LoadError> {
        let (document, buffers, _images) =
            gltf::import_slice(bytes).map_err(|source| LoadError::Gltf {
                path: path.to_path_buf(),
                source,
            })?;

        let node_count = document.nodes().count();
        if node_count == 0 {
            return Err(LoadError::EmptyModel {
                path: path.to_path_buf(),
            });
        }

        let mut nodes: Vec<NodeData> = document
            .nodes()
            .map(|node| {
                let (translation, rotation, scale) = node.transform().decomposed();
                NodeData {
                    name: node
                        .name()
                        .map(String::from)
                        .unwrap_or_else(|| format!("node_{}", node.index())),
                    parent: None,
                    children: node.children().map(|child| child.index()).collect(),
                    translation: Vec3::from(translation),
                    rotation: Quat::from_array(rotation).normalize(),
                    scale: Vec3::from(scale).max_element(),
                    mesh: node.mesh().map(|mesh| mesh.index()),
                    skin: node.skin().map(|skin| skin.index()),
                }
            })
            .collect();

        for index in 0..nodes.len() {
            for child in nodes[index].children.clone() {
                nodes[child].parent = Some(index);
            }
        }

        let skins = document
            .skins()
            .map(|skin| {
                let joints: Vec<usize> = skin.joints().map(|joint| joint.index()).collect();
                let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
                let inverse_bind_matrices = reader
                    .read_inverse_bind_matrices()
                    .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
                    .unwrap_or_else(|| vec![Mat4::IDENTITY; joints.len()]);

                SkinData {
                    joints,
                    inverse_bind_matrices,
                }
            })
            .collect();

        let mut meshes = Vec::new();
        for mesh in document.meshes() {
            let mut primitives = Vec::new();

            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    log::warn!(
                        "Skipping primitive {} of {}: unsupported mode {:?}",
                        primitive.index(),
                        mesh.name().unwrap_or("mesh"),
                        primitive.mode()
                    );
                    continue;
                }

                let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

                let positions: Vec<Vec3> = reader
                    .read_positions()
                    .map(|iter| iter.map(Vec3::from).collect())
                    .unwrap_or_default();
                if positions.is_empty() {
                    continue;
                }

                let vertex_count = positions.len();

                let normals: Vec<Vec3> = reader
                    .read_normals()
                    .map(|iter| iter.map(Vec3::from).collect())
                    .unwrap_or_else(|| vec![Vec3::Y; vertex_count]);

                let joints: Vec<[u16; 4]> = reader
                    .read_joints(0)
                    .map(|iter| iter.into_u16().collect())
                    .unwrap_or_else(|| vec![[0; 4]; vertex_count]);

                let weights: Vec<[f32; 4]> = reader
                    .read_weights(0)
                    .map(|iter| iter.into_f32().collect())
                    .unwrap_or_else(|| vec![[1.0, 0.0, 0.0, 0.0]; vertex_count]);

                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|iter| iter.into_u32().collect())
                    .unwrap_or_else(|| (0..vertex_count as u32).collect());

                let base_color = primitive
                    .material()
                    .pbr_metallic_roughness()
                    .base_color_factor();

                let data = PrimitiveData {
                    positions,
                    normals,
                    joints,
                    weights,
                    indices,
                    base_color,
                };
                if !is_consistent(&data) {
                    log::warn!(
                        "Skipping primitive {} of {}: attribute counts or indices out of range",
                        primitive.index(),
                        mesh.name().unwrap_or("mesh")
                    );
                    continue;
                }
                primitives.push(data);
            }

            meshes.push(MeshData {
                name: mesh
                    .name()
                    .map(String::from)
                    .unwrap_or_else(|| format!("mesh_{}", mesh.index())),
                primitives,
            });
        }

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        let vertex_total: usize = meshes
            .iter()
            .flat_map(|mesh| mesh.primitives.iter())
            .map(PrimitiveData::vertex_count)
            .sum();

        log::info!(
            "Parsed model {}: {} nodes, {} meshes, {} skins, {} vertices",
            name,
            nodes.len(),
            meshes.len(),
            document.skins().count(),
            vertex_total
        );

        Ok(ModelAsset {
            name,
            nodes,
            meshes,
            skins,
        })
    }
}

/// Checks that a primitive's attribute arrays line up.
fn is_consistent(primitive: &PrimitiveData) -> bool {
    let count = primitive.positions.len();
    [
        primitive.normals.len(),
        primitive.joints.len(),
        primitive.weights.len(),
    ]
    .iter()
    .all(|&len| len == count)
        && primitive.indices.iter().all(|&index| (index as usize) < count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_parse_character_fixture() {
        let bytes = test_support::character_glb();
        let model = ModelAsset::from_gltf_slice(Path::new("character.glb"), &bytes).unwrap();

        assert_eq!(model.name, "character");
        assert_eq!(model.nodes.len(), 4);
        assert_eq!(model.nodes[0].name, "Hips");
        assert_eq!(model.nodes[1].parent, Some(0));
        assert_eq!(model.nodes[2].parent, Some(1));
        assert_eq!(model.nodes[3].mesh, Some(0));
        assert_eq!(model.nodes[3].skin, Some(0));

        assert_eq!(model.skins[0].joints, vec![0, 1, 2]);
        assert_eq!(model.skins[0].inverse_bind_matrices.len(), 3);

        let primitive = &model.meshes[0].primitives[0];
        assert_eq!(primitive.vertex_count(), 3);
        assert_eq!(primitive.indices, vec![0, 1, 2]);
        assert!(is_consistent(primitive));
    }

    #[test]
    fn test_model_without_nodes_is_rejected() {
        let bytes = test_support::empty_glb();
        let result = ModelAsset::from_gltf_slice(Path::new("empty.glb"), &bytes);
        assert!(matches!(result, Err(LoadError::EmptyModel { .. })));
    }

    #[test]
    fn test_invalid_bytes_are_gltf_error() {
        let result = ModelAsset::from_gltf_slice(Path::new("broken.glb"), b"not a model");
        assert!(matches!(result, Err(LoadError::Gltf { .. })));
    }
}
