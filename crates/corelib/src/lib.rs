//! Core types: math re-exports, Transform, Camera, Light.

pub use glam::{EulerRot, Mat4, Quat, Vec2, Vec3, vec3};

pub mod camera;
pub mod light;
pub mod transform;
