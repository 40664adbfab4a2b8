use crate::Vec3;

/// Point light placeholder. Uploaded to the shader but not used in shading yet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
}

impl Light {
    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::new(Vec3::new(1.2, 1.0, 2.0), Vec3::ONE)
    }
}
