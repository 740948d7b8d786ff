//! Cyclic coordinate descent IK over the scene graph.

use glam::{Quat, Vec3};

use crate::config::IkConfig;
use crate::debug_lines::{push_sphere, Line};
use crate::scene_graph::object3d::ObjectId;
use crate::scene_graph::scene::Scene;

const LINK_COLOR: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
const TARGET_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const EPSILON: f32 = 1e-5;

#[derive(Debug, Clone)]
pub struct IkLink {
    pub object_id: ObjectId,
    /// Local axis the link may rotate around
    pub limitation: Option<Vec3>,
}

#[derive(Debug, Clone)]
pub struct IkChain {
    pub target: ObjectId,
    pub effector: ObjectId,
    pub links: Vec<IkLink>,
    pub iterations: u32,
    pub max_angle: Option<f32>,
}

#[derive(Debug, Default)]
pub struct IkSolver {
    chains: Vec<IkChain>,
}

impl IkSolver {
    pub fn new(chains: Vec<IkChain>) -> Self {
        Self { chains }
    }

    /// Resolves configured chains by node name, skipping any with missing nodes.
    pub fn from_config(config: &IkConfig, resolve: impl Fn(&str) -> Option<ObjectId>) -> Self {
        let chains = config
            .chains
            .iter()
            .filter_map(|chain| {
                let target = resolve(&chain.target);
                let effector = resolve(&chain.effector);
                let links: Option<Vec<IkLink>> = chain
                    .links
                    .iter()
                    .map(|link| {
                        resolve(&link.node).map(|object_id| IkLink {
                            object_id,
                            limitation: link
                                .limitation
                                .map(|axis| Vec3::from(axis).normalize_or_zero())
                                .filter(|axis| *axis != Vec3::ZERO),
                        })
                    })
                    .collect();

                match (target, effector, links) {
                    (Some(target), Some(effector), Some(links)) => Some(IkChain {
                        target,
                        effector,
                        links,
                        iterations: chain.iterations,
                        max_angle: chain.max_angle,
                    }),
                    _ => {
                        log::warn!(
                            "Skipping IK chain {} -> {}: node not found in model",
                            chain.effector,
                            chain.target
                        );
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        log::debug!("IK solver with {} chains", chains.len());
        Self { chains }
    }

    pub fn chains(&self) -> &[IkChain] {
        &self.chains
    }

    /// Rotates chain links so each effector approaches its target. World
    /// matrices must be current on entry and are kept current.
    pub fn solve(&self, scene: &mut Scene) {
        for chain in &self.chains {
            solve_chain(chain, scene);
        }
    }

    pub fn overlay_lines(&self, scene: &Scene, lines: &mut Vec<Line>) {
        for chain in &self.chains {
            let mut previous = scene.world_position(chain.effector);
            for link in &chain.links {
                let position = scene.world_position(link.object_id);
                lines.push(Line::new(position, previous, LINK_COLOR));
                previous = position;
            }
            push_sphere(lines, scene.world_position(chain.target), 0.2, TARGET_COLOR);
        }
    }
}

fn solve_chain(chain: &IkChain, scene: &mut Scene) {
    let target_position = scene.world_position(chain.target);

    for _ in 0..chain.iterations {
        let mut rotated = false;

        for link in &chain.links {
            let Some(object) = scene.get_object(link.object_id) else {
                continue;
            };
            let link_position = object.transform.world_position();
            let link_rotation = object.transform.world_rotation();
            let local_rotation = object.transform.rotation();

            let effector_position = scene.world_position(chain.effector);
            if effector_position.distance_squared(target_position) < EPSILON * EPSILON {
                return;
            }

            let to_effector = (effector_position - link_position).normalize_or_zero();
            let to_target = (target_position - link_position).normalize_or_zero();
            if to_effector == Vec3::ZERO || to_target == Vec3::ZERO {
                continue;
            }

            let mut angle = to_effector.dot(to_target).clamp(-1.0, 1.0).acos();
            if angle < EPSILON {
                continue;
            }
            if let Some(max_angle) = chain.max_angle {
                angle = angle.min(max_angle);
            }

            let axis = to_effector.cross(to_target);
            if axis.length_squared() < EPSILON * EPSILON {
                continue;
            }
            let local_axis = (link_rotation.inverse() * axis).normalize();

            let mut new_rotation = local_rotation * Quat::from_axis_angle(local_axis, angle);
            if let Some(limitation) = link.limitation {
                new_rotation = twist_around(new_rotation, limitation);
            }

            scene.set_object_rotation(link.object_id, new_rotation.normalize());
            scene.refresh_subtree(link.object_id);
            rotated = true;
        }

        if !rotated {
            break;
        }
    }
}

/// Keeps only the part of `rotation` that turns around `axis`.
fn twist_around(rotation: Quat, axis: Vec3) -> Quat {
    let projected = axis * rotation.xyz().dot(axis);
    let twist = Quat::from_xyzw(projected.x, projected.y, projected.z, rotation.w);
    if twist.length_squared() < EPSILON {
        Quat::IDENTITY
    } else {
        twist.normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IkChainConfig, IkLinkConfig};
    use crate::scene_graph::object3d::Object3D;
    use crate::scene_graph::transform::Transform;
    use crate::test_support;

    /// Leg at the origin with Foot one unit above and a target at `target`.
    fn leg_scene(target: Vec3) -> Scene {
        let mut scene = Scene::new();
        let leg = scene.add_object(Object3D::named("Leg"));
        let mut foot = Object3D::named("Foot");
        foot.transform = Transform::from_translation(Vec3::Y);
        let foot = scene.add_object(foot);
        scene.set_object_parent(foot, Some(leg));
        let mut ik = Object3D::named("FootIK");
        ik.transform = Transform::from_translation(target);
        scene.add_object(ik);
        scene.update_world_transforms();
        scene
    }

    fn leg_config(limitation: Option<[f32; 3]>, max_angle: Option<f32>, iterations: u32) -> IkConfig {
        IkConfig {
            chains: vec![IkChainConfig {
                target: "FootIK".to_string(),
                effector: "Foot".to_string(),
                links: vec![IkLinkConfig {
                    node: "Leg".to_string(),
                    limitation,
                }],
                iterations,
                max_angle,
            }],
        }
    }

    fn foot_position(scene: &Scene) -> Vec3 {
        scene.world_position(test_support::find_object(&scene, "Foot").unwrap())
    }

    #[test]
    fn test_single_link_reaches_target() {
        let mut scene = leg_scene(Vec3::X);
        let solver = IkSolver::from_config(&leg_config(None, None, 10), |name| {
            test_support::find_object(&scene, name)
        });
        assert_eq!(solver.chains().len(), 1);

        solver.solve(&mut scene);
        assert!(foot_position(&scene).abs_diff_eq(Vec3::X, 1e-4));
    }

    #[test]
    fn test_limitation_allows_rotation_around_axis() {
        let mut scene = leg_scene(Vec3::Z);
        let solver = IkSolver::from_config(&leg_config(Some([1.0, 0.0, 0.0]), None, 10), |name| {
            test_support::find_object(&scene, name)
        });

        solver.solve(&mut scene);
        assert!(foot_position(&scene).abs_diff_eq(Vec3::Z, 1e-4));
    }

    #[test]
    fn test_limitation_blocks_other_axes() {
        let mut scene = leg_scene(Vec3::X);
        let solver = IkSolver::from_config(&leg_config(Some([1.0, 0.0, 0.0]), None, 10), |name| {
            test_support::find_object(&scene, name)
        });

        solver.solve(&mut scene);
        assert!(foot_position(&scene).abs_diff_eq(Vec3::Y, 1e-4));
    }

    #[test]
    fn test_max_angle_limits_each_step() {
        let mut scene = leg_scene(Vec3::X);
        let solver = IkSolver::from_config(&leg_config(None, Some(0.1), 1), |name| {
            test_support::find_object(&scene, name)
        });

        solver.solve(&mut scene);
        let foot = foot_position(&scene);
        let angle = foot.angle_between(Vec3::Y);
        assert!((angle - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_unknown_nodes_skip_chain() {
        let scene = leg_scene(Vec3::X);
        let mut config = leg_config(None, None, 10);
        config.chains[0].links[0].node = "Missing".to_string();

        let solver = IkSolver::from_config(&config, |name| test_support::find_object(&scene, name));
        assert!(solver.chains().is_empty());
    }

    #[test]
    fn test_overlay_draws_links_and_target() {
        let scene = leg_scene(Vec3::X);
        let solver = IkSolver::from_config(&leg_config(None, None, 10), |name| {
            test_support::find_object(&scene, name)
        });

        let mut lines = Vec::new();
        solver.overlay_lines(&scene, &mut lines);
        assert_eq!(lines.len(), 1 + 48);
        assert_eq!(lines[0].start, Vec3::ZERO);
        assert_eq!(lines[0].end, Vec3::Y);
    }
}
