use std::collections::HashMap;
use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use gltf::animation::util::ReadOutputs;

use crate::animation::clip::{AnimationClip, Channel, Interpolation, Keyframes};
use crate::error::LoadError;

fn import(path: &Path, bytes: &[u8]) -> Result<(gltf::Document, Vec<gltf::buffer::Data>), LoadError> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).map_err(|source| LoadError::Gltf {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((document, buffers))
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(String::from)
        .unwrap_or_else(|| format!("node_{}", node.index()))
}

fn read_channels(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    mut accept: impl FnMut(&gltf::Node) -> bool,
) -> Vec<Channel> {
    let mut channels = Vec::new();

    for animation in document.animations() {
        for channel in animation.channels() {
            let node = channel.target().node();
            if !accept(&node) {
                continue;
            }

            let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(inputs) = reader.read_inputs() else {
                continue;
            };
            let times: Vec<f32> = inputs.collect();

            let keyframes = match reader.read_outputs() {
                Some(ReadOutputs::Translations(values)) => {
                    Keyframes::Translation(values.map(Vec3::from).collect())
                }
                Some(ReadOutputs::Rotations(values)) => Keyframes::Rotation(
                    values.into_f32().map(Quat::from_array).collect(),
                ),
                Some(ReadOutputs::Scales(values)) => Keyframes::Scale(
                    values.map(|scale| Vec3::from(scale).max_element()).collect(),
                ),
                Some(ReadOutputs::MorphTargetWeights(_)) => {
                    log::debug!("Ignoring morph target channel on {}", node_name(&node));
                    continue;
                }
                None => continue,
            };

            let interpolation = match channel.sampler().interpolation() {
                gltf::animation::Interpolation::Step => Interpolation::Step,
                gltf::animation::Interpolation::Linear => Interpolation::Linear,
                gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
            };

            channels.push(Channel {
                target: node_name(&node),
                times,
                keyframes,
                interpolation,
            });
        }
    }

    channels
}

fn clip_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "motion".to_string())
}

/// Reads every animation in a glTF file into one clip addressed by node name.
pub fn clip_from_gltf_slice(path: &Path, bytes: &[u8]) -> Result<AnimationClip, LoadError> {
    let (document, buffers) = import(path, bytes)?;

    let channels = read_channels(&document, &buffers, |_| true);
    if channels.is_empty() {
        return Err(LoadError::MissingAnimation {
            path: path.to_path_buf(),
        });
    }

    let clip = AnimationClip::new(clip_name(path), channels);
    log::info!(
        "Parsed motion {}: {} channels, {:.2}s",
        clip.name,
        clip.channels.len(),
        clip.duration
    );

    Ok(clip)
}

/// Animation of a single camera node.
#[derive(Debug, Clone)]
pub struct CameraMotion {
    pub clip: AnimationClip,
    pub node_name: String,
    /// Rest pose of the node
    pub translation: Vec3,
    pub rotation: Quat,
    /// World matrix of the node's parent in rest pose
    pub parent_matrix: Mat4,
    /// Vertical field of view in degrees, when the file defines one
    pub fov: Option<f32>,
}

impl CameraMotion {
    pub fn from_gltf_slice(path: &Path, bytes: &[u8]) -> Result<Self, LoadError> {
        let (document, buffers) = import(path, bytes)?;

        let animated: Vec<usize> = document
            .animations()
            .flat_map(|animation| {
                animation
                    .channels()
                    .map(|channel| channel.target().node().index())
                    .collect::<Vec<_>>()
            })
            .collect();

        let camera_node = document
            .nodes()
            .find(|node| node.camera().is_some())
            .or_else(|| {
                animated
                    .first()
                    .and_then(|&index| document.nodes().nth(index))
            })
            .ok_or_else(|| LoadError::MissingCamera {
                path: path.to_path_buf(),
            })?;

        let camera_index = camera_node.index();
        let channels = read_channels(&document, &buffers, |node| node.index() == camera_index);
        if channels.is_empty() {
            return Err(LoadError::MissingAnimation {
                path: path.to_path_buf(),
            });
        }

        let mut parents: HashMap<usize, gltf::Node> = HashMap::new();
        for node in document.nodes() {
            for child in node.children() {
                parents.insert(child.index(), node.clone());
            }
        }

        let mut parent_matrix = Mat4::IDENTITY;
        let mut current = parents.get(&camera_index);
        while let Some(parent) = current {
            parent_matrix = Mat4::from_cols_array_2d(&parent.transform().matrix()) * parent_matrix;
            current = parents.get(&parent.index());
        }

        let fov = camera_node.camera().and_then(|camera| match camera.projection() {
            gltf::camera::Projection::Perspective(perspective) => {
                Some(perspective.yfov().to_degrees())
            }
            gltf::camera::Projection::Orthographic(_) => None,
        });

        let (translation, rotation, _) = camera_node.transform().decomposed();

        let clip = AnimationClip::new(clip_name(path), channels);
        log::info!(
            "Parsed camera motion {}: node {}, {:.2}s",
            clip.name,
            node_name(&camera_node),
            clip.duration
        );

        Ok(CameraMotion {
            clip,
            node_name: node_name(&camera_node),
            translation: Vec3::from(translation),
            rotation: Quat::from_array(rotation).normalize(),
            parent_matrix,
            fov,
        })
    }

    /// Merges several camera motions; rest pose and parent come from the first.
    pub fn merge(motions: Vec<CameraMotion>) -> Option<CameraMotion> {
        let mut motions = motions.into_iter();
        let mut first = motions.next()?;

        let rest: Vec<AnimationClip> = motions
            .map(|motion| {
                let mut clip = motion.clip;
                for channel in &mut clip.channels {
                    channel.target = first.node_name.clone();
                }
                clip
            })
            .collect();

        if !rest.is_empty() {
            let name = first.clip.name.clone();
            first.clip = AnimationClip::merge(name, std::iter::once(first.clip).chain(rest));
        }

        Some(first)
    }
}
