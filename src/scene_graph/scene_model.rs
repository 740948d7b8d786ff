use glam::Mat4;
use id_arena::Id;

use crate::assets::model::PrimitiveData;
use crate::scene_graph::object3d::ObjectId;

pub type SceneModelId = Id<SceneModel>;

#[derive(Clone)]
pub struct SceneSkin {
    /// Scene objects driving each joint, in skin order
    pub joints: Vec<ObjectId>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// A mesh instance placed in the scene graph.
pub struct SceneModel {
    pub name: String,
    pub object_id: ObjectId,
    pub primitives: Vec<PrimitiveData>,
    pub skin: Option<SceneSkin>,
}

impl SceneModel {
    pub fn vertex_count(&self) -> usize {
        self.primitives.iter().map(PrimitiveData::vertex_count).sum()
    }
}
