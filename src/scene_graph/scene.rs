use glam::{Mat4, Quat, Vec3};
use id_arena::Arena;

use crate::assets::model::ModelAsset;
use crate::scene_graph::object3d::{Object3D, ObjectId};
use crate::scene_graph::scene_model::{SceneModel, SceneModelId, SceneSkin};
use crate::scene_graph::transform::Transform;

/// Objects created for one spawned model asset.
pub struct SpawnedModel {
    pub root: ObjectId,
    /// Scene objects indexed like the asset's nodes
    pub nodes: Vec<ObjectId>,
    pub models: Vec<SceneModelId>,
}

impl SpawnedModel {
    pub fn find_node(&self, scene: &Scene, name: &str) -> Option<ObjectId> {
        self.nodes
            .iter()
            .copied()
            .find(|&id| scene.get_object(id).is_some_and(|object| object.name == name))
    }
}

#[derive(Default)]
pub struct Scene {
    pub objects: Arena<Object3D>,
    pub models: Arena<SceneModel>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, object: Object3D) -> ObjectId {
        self.objects.alloc(object)
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id)
    }

    pub fn add_model(&mut self, model: SceneModel) -> SceneModelId {
        self.models.alloc(model)
    }

    /// Moves a model asset into the scene under a new root object named after it.
    pub fn spawn_model(&mut self, asset: ModelAsset) -> SpawnedModel {
        let root = self.add_object(Object3D::named(asset.name.clone()));

        let nodes: Vec<ObjectId> = asset
            .nodes
            .iter()
            .map(|node| {
                let mut object = Object3D::named(node.name.clone());
                object.transform = Transform::new(node.translation, node.rotation, node.scale);
                self.add_object(object)
            })
            .collect();

        for (index, node) in asset.nodes.iter().enumerate() {
            let parent = node.parent.map(|parent| nodes[parent]).unwrap_or(root);
            self.set_object_parent(nodes[index], Some(parent));
        }

        let skins: Vec<SceneSkin> = asset
            .skins
            .into_iter()
            .map(|skin| SceneSkin {
                joints: skin.joints.iter().map(|&joint| nodes[joint]).collect(),
                inverse_bind_matrices: skin.inverse_bind_matrices,
            })
            .collect();

        let mut meshes: Vec<_> = asset.meshes.into_iter().map(Some).collect();
        let mut models = Vec::new();

        for (index, node) in asset.nodes.iter().enumerate() {
            let Some(mesh_index) = node.mesh else {
                continue;
            };
            // A mesh shared by several nodes is only instanced once
            let Some(mesh) = meshes.get_mut(mesh_index).and_then(Option::take) else {
                log::warn!("Mesh {} of {} is instanced more than once", mesh_index, asset.name);
                continue;
            };
            // Body, hair and clothes meshes usually share one skin
            let skin = node
                .skin
                .and_then(|skin_index| skins.get(skin_index).cloned());

            let model_id = self.add_model(SceneModel {
                name: mesh.name,
                object_id: nodes[index],
                primitives: mesh.primitives,
                skin,
            });
            if let Some(object) = self.objects.get_mut(nodes[index]) {
                object.model_id = Some(model_id);
            }
            models.push(model_id);
        }

        self.update_world_transforms();

        log::debug!(
            "Spawned {} with {} objects and {} models",
            asset.name,
            nodes.len(),
            models.len()
        );

        SpawnedModel {
            root,
            nodes,
            models,
        }
    }

    /// Updates all object transforms in hierarchical order
    pub fn update_world_transforms(&self) {
        let roots = self
            .objects
            .iter()
            .filter(|(_, object)| object.parent_id.is_none())
            .map(|(id, _)| id);

        for root_id in roots {
            self.update_object_transform_recursive(root_id, Mat4::IDENTITY, false);
        }
    }

    fn update_object_transform_recursive(
        &self,
        object_id: ObjectId,
        parent_world_matrix: Mat4,
        parent_changed: bool,
    ) {
        let Some(object) = self.objects.get(object_id) else {
            return;
        };

        let changed = parent_changed || object.transform.is_world_dirty();
        if changed {
            let local_matrix = *object.transform.get_local_matrix();
            object
                .transform
                .set_world_matrix(parent_world_matrix * local_matrix);
        }

        let world_matrix = *object.transform.get_world_matrix();
        for &child_id in &object.child_ids {
            self.update_object_transform_recursive(child_id, world_matrix, changed);
        }
    }

    /// Recomputes world matrices of an object and its descendants from its
    /// parent's current world matrix.
    pub fn refresh_subtree(&self, object_id: ObjectId) {
        let parent_world = self
            .get_object(object_id)
            .and_then(|object| object.parent(self))
            .map(|parent| *parent.transform.get_world_matrix())
            .unwrap_or(Mat4::IDENTITY);

        self.update_object_transform_recursive(object_id, parent_world, true);
    }

    pub fn world_matrix(&self, object_id: ObjectId) -> Mat4 {
        self.get_object(object_id)
            .map(|object| *object.transform.get_world_matrix())
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn world_position(&self, object_id: ObjectId) -> Vec3 {
        self.get_object(object_id)
            .map(|object| object.transform.world_position())
            .unwrap_or(Vec3::ZERO)
    }

    /// Invalidates world transforms for an object and all its descendants
    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        if let Some(object) = self.objects.get(object_id) {
            object.transform.invalidate_world();

            for &child_id in &object.child_ids {
                self.invalidate_object_hierarchy(child_id);
            }
        }
    }

    /// Sets the parent of an object and updates child relationships
    pub fn set_object_parent(&mut self, child_id: ObjectId, new_parent_id: Option<ObjectId>) {
        if let Some(old_parent_id) = self.objects.get(child_id).and_then(|child| child.parent_id) {
            if let Some(old_parent) = self.objects.get_mut(old_parent_id) {
                old_parent.child_ids.retain(|&id| id != child_id);
            }
        }

        if let Some(child) = self.objects.get_mut(child_id) {
            child.parent_id = new_parent_id;
        }

        if let Some(new_parent) = new_parent_id.and_then(|id| self.objects.get_mut(id)) {
            new_parent.child_ids.push(child_id);
        }

        self.invalidate_object_hierarchy(child_id);
    }

    pub fn set_object_rotation(&mut self, object_id: ObjectId, rotation: Quat) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_rotation(rotation);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn get_object_transform(&self, object_id: ObjectId) -> Option<&Transform> {
        self.objects.get(object_id).map(|object| &object.transform)
    }
}
