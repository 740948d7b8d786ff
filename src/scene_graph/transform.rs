use glam::{Mat4, Quat, Vec3};
use std::cell::{Cell, Ref, RefCell};

#[derive(Debug, Clone)]
pub struct Transform {
    translation: Vec3,
    rotation: Quat,
    scale: f32,

    local_matrix: RefCell<Mat4>,
    world_matrix: RefCell<Mat4>,
    local_dirty: Cell<bool>,
    world_dirty: Cell<bool>,
}

impl Transform {
    pub fn new(translation: Vec3, rotation: Quat, scale: f32) -> Self {
        Self {
            translation,
            rotation,
            scale,
            local_matrix: RefCell::new(Mat4::IDENTITY),
            world_matrix: RefCell::new(Mat4::IDENTITY),
            local_dirty: Cell::new(true),
            world_dirty: Cell::new(true),
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::IDENTITY, 1.0)
    }

    pub fn get_local_matrix(&self) -> Ref<Mat4> {
        if self.local_dirty.get() {
            let matrix = Mat4::from_scale_rotation_translation(
                Vec3::splat(self.scale),
                self.rotation,
                self.translation,
            );

            self.local_matrix.replace(matrix);
            self.local_dirty.set(false);
            self.invalidate_world();
        }

        self.local_matrix.borrow()
    }

    pub fn get_world_matrix(&self) -> Ref<Mat4> {
        self.world_matrix.borrow()
    }

    pub fn world_position(&self) -> Vec3 {
        self.world_matrix.borrow().w_axis.truncate()
    }

    pub fn world_rotation(&self) -> Quat {
        let (_, rotation, _) = self.world_matrix.borrow().to_scale_rotation_translation();
        rotation.normalize()
    }

    pub fn set_world_matrix(&self, world_matrix: Mat4) {
        self.world_matrix.replace(world_matrix);
        self.world_dirty.set(false);
    }

    pub fn invalidate_local(&self) {
        self.local_dirty.set(true);
        self.world_dirty.set(true);
    }

    pub fn invalidate_world(&self) {
        self.world_dirty.set(true);
    }

    pub fn is_world_dirty(&self) -> bool {
        self.world_dirty.get()
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.invalidate_local();
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
        self.invalidate_local();
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
        self.invalidate_local();
    }

    pub fn set_transform(&mut self, translation: Vec3, rotation: Quat, scale: f32) {
        self.translation = translation;
        self.rotation = rotation;
        self.scale = scale;
        self.invalidate_local();
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_translation(Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_local_matrix_applies_scale_rotation_translation() {
        let transform = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_z(FRAC_PI_2),
            2.0,
        );

        let point = transform.get_local_matrix().transform_point3(Vec3::X);
        assert!(point.abs_diff_eq(Vec3::new(1.0, 4.0, 3.0), 1e-5));
    }

    #[test]
    fn test_setters_mark_world_dirty_until_written() {
        let mut transform = Transform::default();
        transform.set_world_matrix(Mat4::IDENTITY);
        assert!(!transform.is_world_dirty());

        transform.set_translation(Vec3::Y);
        assert!(transform.is_world_dirty());

        let local = *transform.get_local_matrix();
        transform.set_world_matrix(local);
        assert!(!transform.is_world_dirty());
        assert!(transform.world_position().abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn test_world_rotation_ignores_scale() {
        let transform = Transform::default();
        let rotation = Quat::from_rotation_y(FRAC_PI_2);
        transform.set_world_matrix(Mat4::from_scale_rotation_translation(
            Vec3::splat(3.0),
            rotation,
            Vec3::ZERO,
        ));

        assert!(transform.world_rotation().abs_diff_eq(rotation, 1e-5));
    }
}
