//! CPU linear blend skinning into world space.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use itertools::izip;
use rayon::prelude::*;

use crate::scene_graph::scene::Scene;
use crate::scene_graph::scene_model::SceneModel;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SkinnedVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: [f32; 4],
}

/// Skins every primitive of `model` with the scene's current world matrices.
/// Models without a skin follow their node rigidly.
pub fn skin_model(scene: &Scene, model: &SceneModel) -> Vec<Vec<SkinnedVertex>> {
    let joint_matrices: Vec<Mat4> = match &model.skin {
        Some(skin) => izip!(&skin.joints, &skin.inverse_bind_matrices)
            .map(|(&joint, inverse_bind)| scene.world_matrix(joint) * *inverse_bind)
            .collect(),
        None => vec![scene.world_matrix(model.object_id)],
    };

    model
        .primitives
        .iter()
        .map(|primitive| {
            (0..primitive.vertex_count())
                .into_par_iter()
                .map(|index| {
                    let matrix = if model.skin.is_some() {
                        blend(&joint_matrices, primitive.joints[index], primitive.weights[index])
                    } else {
                        joint_matrices[0]
                    };

                    SkinnedVertex {
                        position: matrix.transform_point3(primitive.positions[index]),
                        normal: matrix
                            .transform_vector3(primitive.normals[index])
                            .normalize_or_zero(),
                        color: primitive.base_color,
                    }
                })
                .collect()
        })
        .collect()
}

fn blend(joint_matrices: &[Mat4], joints: [u16; 4], weights: [f32; 4]) -> Mat4 {
    let mut matrix = Mat4::ZERO;
    let mut total = 0.0;

    for (&joint, &weight) in joints.iter().zip(weights.iter()) {
        if weight <= 1e-4 {
            continue;
        }
        if let Some(joint_matrix) = joint_matrices.get(joint as usize) {
            matrix += *joint_matrix * weight;
            total += weight;
        }
    }

    if total <= 1e-6 {
        Mat4::IDENTITY
    } else {
        matrix * (1.0 / total)
    }
}
