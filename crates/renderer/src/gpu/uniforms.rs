use bytemuck::{Pod, Zeroable};
use engine::Camera;
use glam::Mat4;

/// Camera-derived matrices shared by every program.
///
/// The layout must match the `ShaderlabScene` block emitted by `compile.rs`.
/// The model matrix is the identity; meshes are authored in world space.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SceneUniforms {
    pub projection: [[f32; 4]; 4],
    pub model_view: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    /// Inverse transpose of `model_view`, read as a mat3 by the shaders.
    pub normal: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
}

unsafe impl Zeroable for SceneUniforms {}
unsafe impl Pod for SceneUniforms {}

impl SceneUniforms {
    pub fn from_camera(camera: &Camera) -> Self {
        let model = Mat4::IDENTITY;
        let view = camera.view();
        let model_view = view * model;
        Self {
            projection: camera.projection().to_cols_array_2d(),
            model_view: model_view.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            normal: model_view.inverse().transpose().to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    #[test]
    fn scene_block_size_matches_std140() {
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 5 * 64 + 16);
    }

    #[test]
    fn origin_lands_in_front_of_the_camera() {
        let uniforms = SceneUniforms::from_camera(&Camera::default());
        let model_view = Mat4::from_cols_array_2d(&uniforms.model_view);
        let projection = Mat4::from_cols_array_2d(&uniforms.projection);

        let eye = model_view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((eye.z + 4.0).abs() < 1e-5);

        let clip = projection * eye;
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
        assert_eq!(uniforms.camera_position, [0.0, 0.0, 4.0, 1.0]);
    }

    #[test]
    fn normal_matrix_keeps_view_facing_normals() {
        let uniforms = SceneUniforms::from_camera(&Camera::default());
        let normal = Mat4::from_cols_array_2d(&uniforms.normal);
        let facing = (normal * Vec3::Z.extend(0.0)).truncate().normalize();
        assert!((facing - Vec3::Z).length() < 1e-5);
    }
}
