//! Verlet spring bones for secondary motion (hair, skirts, ribbons).
//!
//! Each joint tracks the world position of its bone's tail. Per step the tail
//! keeps part of its previous velocity, is pulled back towards the animated
//! pose and by gravity, is constrained to the bone length and pushed out of
//! sphere colliders. The joint is then rotated so the bone points at the tail.

use glam::{Quat, Vec3};

use crate::config::PhysicsConfig;
use crate::debug_lines::{push_sphere, Line};
use crate::scene_graph::object3d::ObjectId;
use crate::scene_graph::scene::Scene;

const JOINT_COLOR: [f32; 4] = [0.2, 0.4, 1.0, 1.0];
const COLLIDER_COLOR: [f32; 4] = [1.0, 0.5, 0.0, 1.0];
const COLLISION_PASSES: usize = 3;

struct JointState {
    object_id: ObjectId,
    prev_tail: Vec3,
    current_tail: Vec3,
    bone_length: f32,
    /// Rest direction to the child, in the joint's local space
    bone_axis: Vec3,
    stiffness: f32,
    gravity_power: f32,
    drag: f32,
    hit_radius: f32,
}

struct SphereCollider {
    object_id: ObjectId,
    offset: Vec3,
    radius: f32,
}

pub struct SpringBoneSimulator {
    chains: Vec<Vec<JointState>>,
    colliders: Vec<SphereCollider>,
    gravity_dir: Vec3,
    max_step: f32,
}

impl SpringBoneSimulator {
    /// Builds chains from the scene's current pose. Each chain starts at its
    /// configured root and follows first children down to a leaf.
    pub fn from_config(
        config: &PhysicsConfig,
        scene: &Scene,
        resolve: impl Fn(&str) -> Option<ObjectId>,
    ) -> Self {
        let mut chains = Vec::new();

        for chain in &config.chains {
            let Some(root) = resolve(&chain.root) else {
                log::warn!("Skipping spring chain {}: node not found in model", chain.root);
                continue;
            };

            let mut joints = Vec::new();
            let mut current = root;
            while let Some(child) = scene
                .get_object(current)
                .and_then(|object| object.child_ids.first().copied())
            {
                let position = scene.world_position(current);
                let to_child = scene.world_position(child) - position;
                let bone_length = to_child.length();

                if bone_length > 1e-6 {
                    let rotation = world_rotation(scene, current);
                    joints.push(JointState {
                        object_id: current,
                        prev_tail: position + to_child,
                        current_tail: position + to_child,
                        bone_length,
                        bone_axis: rotation.inverse() * (to_child / bone_length),
                        stiffness: chain.stiffness,
                        gravity_power: chain.gravity_power,
                        drag: chain.drag.clamp(0.0, 1.0),
                        hit_radius: chain.hit_radius,
                    });
                }

                current = child;
            }

            if joints.is_empty() {
                log::warn!("Spring chain {} has no bones", chain.root);
            } else {
                chains.push(joints);
            }
        }

        let colliders = config
            .colliders
            .iter()
            .filter_map(|collider| match resolve(&collider.node) {
                Some(object_id) => Some(SphereCollider {
                    object_id,
                    offset: Vec3::from(collider.offset),
                    radius: collider.radius,
                }),
                None => {
                    log::warn!("Skipping collider on {}: node not found", collider.node);
                    None
                }
            })
            .collect::<Vec<_>>();

        log::info!(
            "Spring bone simulator: {} chains, {} colliders",
            chains.len(),
            colliders.len()
        );

        Self {
            chains,
            colliders,
            gravity_dir: Vec3::from(config.gravity_dir).normalize_or_zero(),
            max_step: config.max_step,
        }
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Advances the simulation by `dt` seconds. World matrices must be
    /// current on entry and are kept current.
    pub fn step(&mut self, scene: &mut Scene, dt: f32) {
        let dt = dt.min(self.max_step);
        if dt < 1e-6 {
            return;
        }

        let colliders: Vec<(Vec3, f32)> = self
            .colliders
            .iter()
            .map(|collider| {
                let matrix = scene.world_matrix(collider.object_id);
                (matrix.transform_point3(collider.offset), collider.radius)
            })
            .collect();

        for joint in self.chains.iter_mut().flatten() {
            let Some(object) = scene.get_object(joint.object_id) else {
                continue;
            };
            let local_rotation = object.transform.rotation();
            let parent_rotation = object
                .parent_id
                .map(|parent| world_rotation(scene, parent))
                .unwrap_or(Quat::IDENTITY);
            let position = scene.world_position(joint.object_id);

            let rest_dir = parent_rotation * local_rotation * joint.bone_axis;

            let inertia = (joint.current_tail - joint.prev_tail) * (1.0 - joint.drag);
            let stiffness = rest_dir * (dt * joint.stiffness);
            let gravity = self.gravity_dir * (dt * joint.gravity_power);

            let mut next_tail = constrain_length(
                joint.current_tail + inertia + stiffness + gravity,
                position,
                joint.bone_length,
                rest_dir,
            );

            for _ in 0..COLLISION_PASSES {
                let mut moved = false;
                for &(center, radius) in &colliders {
                    let resolved = push_out_of_sphere(
                        next_tail,
                        joint.hit_radius,
                        center,
                        radius,
                        position,
                        joint.bone_length,
                    );
                    if resolved != next_tail {
                        next_tail = resolved;
                        moved = true;
                    }
                }
                if !moved {
                    break;
                }
            }

            joint.prev_tail = joint.current_tail;
            joint.current_tail = next_tail;

            let current_dir = (next_tail - position).normalize_or_zero();
            let rest_dir = rest_dir.normalize_or_zero();
            if current_dir == Vec3::ZERO || rest_dir == Vec3::ZERO {
                continue;
            }

            let world_delta = Quat::from_rotation_arc(rest_dir, current_dir);
            let rotation =
                parent_rotation.inverse() * world_delta * parent_rotation * local_rotation;
            scene.set_object_rotation(joint.object_id, rotation.normalize());
            scene.refresh_subtree(joint.object_id);
        }
    }

    /// Puts every tail back where the current pose places it.
    pub fn reset(&mut self, scene: &Scene) {
        for joint in self.chains.iter_mut().flatten() {
            let position = scene.world_position(joint.object_id);
            let rotation = world_rotation(scene, joint.object_id);
            let tail = position + rotation * joint.bone_axis * joint.bone_length;
            joint.prev_tail = tail;
            joint.current_tail = tail;
        }
    }

    pub fn overlay_lines(&self, scene: &Scene, lines: &mut Vec<Line>) {
        for joint in self.chains.iter().flatten() {
            let position = scene.world_position(joint.object_id);
            lines.push(Line::new(position, joint.current_tail, JOINT_COLOR));
            push_sphere(lines, joint.current_tail, joint.hit_radius, JOINT_COLOR);
        }

        for collider in &self.colliders {
            let center = scene
                .world_matrix(collider.object_id)
                .transform_point3(collider.offset);
            push_sphere(lines, center, collider.radius, COLLIDER_COLOR);
        }
    }
}

fn world_rotation(scene: &Scene, object_id: ObjectId) -> Quat {
    scene
        .get_object(object_id)
        .map(|object| object.transform.world_rotation())
        .unwrap_or(Quat::IDENTITY)
}

/// Places `tail` exactly `bone_length` away from `origin`.
fn constrain_length(tail: Vec3, origin: Vec3, bone_length: f32, fallback_dir: Vec3) -> Vec3 {
    let to_tail = tail - origin;
    let distance = to_tail.length();
    if distance > 1e-6 {
        origin + (to_tail / distance) * bone_length
    } else {
        origin + fallback_dir * bone_length
    }
}

fn push_out_of_sphere(
    tail: Vec3,
    hit_radius: f32,
    center: Vec3,
    radius: f32,
    origin: Vec3,
    bone_length: f32,
) -> Vec3 {
    let diff = tail - center;
    let distance = diff.length();
    let min_distance = radius + hit_radius;
    if distance >= min_distance || distance <= 1e-6 {
        return tail;
    }

    let pushed = center + (diff / distance) * min_distance;
    let to_pushed = pushed - origin;
    let length = to_pushed.length();
    if length > 1e-6 {
        origin + (to_pushed / length) * bone_length
    } else {
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColliderConfig, SpringChainConfig};
    use crate::scene_graph::object3d::Object3D;
    use crate::scene_graph::transform::Transform;
    use crate::test_support;

    /// A horizontal bone from the origin to (1, 0, 0).
    fn hair_scene() -> Scene {
        let mut scene = Scene::new();
        let hair = scene.add_object(Object3D::named("Hair"));
        let mut tip = Object3D::named("HairTip");
        tip.transform = Transform::from_translation(Vec3::X);
        let tip = scene.add_object(tip);
        scene.set_object_parent(tip, Some(hair));
        let head = scene.add_object(Object3D::named("Head"));
        scene.set_object_parent(hair, Some(head));
        scene.update_world_transforms();
        scene
    }

    fn hair_config(colliders: Vec<ColliderConfig>) -> PhysicsConfig {
        PhysicsConfig {
            chains: vec![SpringChainConfig {
                root: "Hair".to_string(),
                stiffness: 0.0,
                gravity_power: 1.0,
                drag: 0.4,
                hit_radius: 0.02,
            }],
            colliders,
            ..PhysicsConfig::default()
        }
    }

    fn simulate(scene: &mut Scene, simulator: &mut SpringBoneSimulator, steps: usize) {
        for _ in 0..steps {
            simulator.step(scene, 1.0 / 60.0);
        }
    }

    fn tip_position(scene: &Scene) -> Vec3 {
        scene.world_position(test_support::find_object(&scene, "HairTip").unwrap())
    }

    #[test]
    fn test_chain_follows_children_to_leaf() {
        let scene = hair_scene();
        let simulator = SpringBoneSimulator::from_config(&hair_config(Vec::new()), &scene, |name| {
            test_support::find_object(&scene, name)
        });

        assert_eq!(simulator.chain_count(), 1);
        assert_eq!(simulator.chains[0].len(), 1);
        assert!((simulator.chains[0][0].bone_length - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_gravity_pulls_tail_down_at_constant_length() {
        let mut scene = hair_scene();
        let mut simulator =
            SpringBoneSimulator::from_config(&hair_config(Vec::new()), &scene, |name| {
                test_support::find_object(&scene, name)
            });

        simulate(&mut scene, &mut simulator, 300);

        let tip = tip_position(&scene);
        assert!(tip.y < -0.9, "tip at {tip}");
        assert!((tip.length() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_collider_blocks_swing() {
        let mut scene = hair_scene();
        let config = hair_config(vec![ColliderConfig {
            node: "Head".to_string(),
            offset: [0.7, -0.7, 0.0],
            radius: 0.3,
        }]);
        let mut simulator = SpringBoneSimulator::from_config(&config, &scene, |name| {
            test_support::find_object(&scene, name)
        });

        simulate(&mut scene, &mut simulator, 300);

        let tip = tip_position(&scene);
        assert!(tip.y > -0.6, "tip at {tip}");
    }

    #[test]
    fn test_zero_step_is_ignored() {
        let mut scene = hair_scene();
        let mut simulator =
            SpringBoneSimulator::from_config(&hair_config(Vec::new()), &scene, |name| {
                test_support::find_object(&scene, name)
            });

        simulator.step(&mut scene, 0.0);
        assert!(tip_position(&scene).abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn test_reset_restores_tails() {
        let mut scene = hair_scene();
        let mut simulator =
            SpringBoneSimulator::from_config(&hair_config(Vec::new()), &scene, |name| {
                test_support::find_object(&scene, name)
            });
        simulate(&mut scene, &mut simulator, 30);

        let hair = test_support::find_object(&scene, "Hair").unwrap();
        scene.set_object_rotation(hair, Quat::IDENTITY);
        scene.update_world_transforms();
        simulator.reset(&scene);

        assert!(simulator.chains[0][0].current_tail.abs_diff_eq(Vec3::X, 1e-5));
        assert_eq!(
            simulator.chains[0][0].current_tail,
            simulator.chains[0][0].prev_tail
        );
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let scene = hair_scene();
        let mut config = hair_config(Vec::new());
        config.chains[0].root = "Ponytail".to_string();

        let simulator =
            SpringBoneSimulator::from_config(&config, &scene, |name| test_support::find_object(&scene, name));
        assert_eq!(simulator.chain_count(), 0);
    }
}
