//! Scene-level state shared by the pointer tracker and the renderer: the mesh
//! kind, the viewport, and the single perspective camera.
//!
//! The camera is fixed at `(0, 0, 4)` looking at the origin; pointer events
//! are projected through it onto the `z = 0` plane that holds the plane mesh.
use std::fmt;
use std::str::FromStr;

use glam::{Mat4, Vec2, Vec3, Vec4};
use labconfig::GeometrySetting;

/// Edge length of the plane mesh in world units.
pub const PLANE_SIZE: f32 = 3.0;

/// Mesh the active material is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryKind {
    #[default]
    Plane,
    Sphere,
    Torus,
    Box,
}

impl GeometryKind {
    pub const ALL: [GeometryKind; 4] = [
        GeometryKind::Plane,
        GeometryKind::Sphere,
        GeometryKind::Torus,
        GeometryKind::Box,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GeometryKind::Plane => "plane",
            GeometryKind::Sphere => "sphere",
            GeometryKind::Torus => "torus",
            GeometryKind::Box => "box",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GeometryKind::Plane => "Plane",
            GeometryKind::Sphere => "Sphere",
            GeometryKind::Torus => "Torus",
            GeometryKind::Box => "Box",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        GeometryKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown geometry '{value}'"))
    }
}

impl From<GeometrySetting> for GeometryKind {
    fn from(setting: GeometrySetting) -> Self {
        match setting {
            GeometrySetting::Plane => GeometryKind::Plane,
            GeometrySetting::Sphere => GeometryKind::Sphere,
            GeometrySetting::Torus => GeometryKind::Torus,
            GeometrySetting::Box => GeometryKind::Box,
        }
    }
}

/// Drawable size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    /// Maps a pixel position to normalized device coordinates (y up).
    pub fn to_ndc(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(x / self.width * 2.0 - 1.0, -(y / self.height) * 2.0 + 1.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 4.0),
            target: Vec3::ZERO,
            fov_y_degrees: 50.0,
            near: 0.1,
            far: 100.0,
            aspect: 16.0 / 9.0,
        }
    }
}

impl Camera {
    pub fn set_aspect(&mut self, viewport: Viewport) {
        self.aspect = viewport.aspect();
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    /// World-space ray through a point in normalized device coordinates.
    pub fn ray(&self, ndc: Vec2) -> (Vec3, Vec3) {
        let inverse = (self.projection() * self.view()).inverse();
        let unproject = |depth: f32| {
            let clip = inverse * Vec4::new(ndc.x, ndc.y, depth, 1.0);
            clip.truncate() / clip.w
        };
        let near = unproject(0.0);
        let far = unproject(1.0);
        (near, (far - near).normalize_or_zero())
    }

    /// Intersects the ray through `ndc` with the `z = 0` plane, returning the
    /// hit in world space.
    pub fn project_to_plane(&self, ndc: Vec2) -> Option<Vec3> {
        let (origin, direction) = self.ray(ndc);
        if direction.z.abs() < 1e-6 {
            return None;
        }
        let distance = -origin.z / direction.z;
        if distance < 0.0 {
            return None;
        }
        Some(origin + direction * distance)
    }
}

/// Converts a pixel position into surface uv coordinates.
///
/// Rays that hit the plane map through the plane's parametrization and are
/// clamped to `[0, 1]`; misses fall back to the plain screen fraction.
pub fn surface_uv(camera: &Camera, viewport: Viewport, x: f32, y: f32) -> Vec2 {
    let ndc = viewport.to_ndc(x, y);
    match camera.project_to_plane(ndc) {
        Some(hit) => Vec2::new(hit.x / PLANE_SIZE + 0.5, hit.y / PLANE_SIZE + 0.5)
            .clamp(Vec2::ZERO, Vec2::ONE),
        None => Vec2::new(x / viewport.width, 1.0 - y / viewport.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> (Camera, Viewport) {
        let viewport = Viewport::new(800.0, 800.0);
        let mut camera = Camera::default();
        camera.set_aspect(viewport);
        (camera, viewport)
    }

    #[test]
    fn centre_of_screen_hits_centre_of_plane() {
        let (camera, viewport) = square();
        let uv = surface_uv(&camera, viewport, 400.0, 400.0);
        assert!((uv - Vec2::splat(0.5)).length() < 1e-4, "{uv:?}");
    }

    #[test]
    fn screen_up_is_surface_up() {
        let (camera, viewport) = square();
        let upper = surface_uv(&camera, viewport, 400.0, 300.0);
        let right = surface_uv(&camera, viewport, 500.0, 400.0);
        assert!(upper.y > 0.5);
        assert!(right.x > 0.5);
    }

    #[test]
    fn far_corners_clamp_into_unit_square() {
        let (camera, viewport) = square();
        let uv = surface_uv(&camera, viewport, 0.0, 0.0);
        assert!(uv.x >= 0.0 && uv.y <= 1.0);
        assert_eq!(uv, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn camera_looking_away_falls_back_to_screen_fraction() {
        let viewport = Viewport::new(200.0, 100.0);
        let camera = Camera {
            target: Vec3::new(0.0, 0.0, 8.0),
            ..Camera::default()
        };
        let uv = surface_uv(&camera, viewport, 50.0, 25.0);
        assert_eq!(uv, Vec2::new(0.25, 0.75));
    }

    #[test]
    fn geometry_parses_case_insensitively() {
        assert_eq!("Torus".parse::<GeometryKind>(), Ok(GeometryKind::Torus));
        assert!("cone".parse::<GeometryKind>().is_err());
        assert_eq!(GeometryKind::from(GeometrySetting::Box), GeometryKind::Box);
    }
}
