//! Turns raw pointer events into the smoothed pointer signal shaders read.
//!
//! Positions are projected through the camera onto the surface and
//! expressed in uv space. Velocity is the clamped, exponentially smoothed
//! uv delta per second; once the pointer stops, `tick` decays it every frame
//! until it drops under the configured epsilon.
use std::time::Instant;

use glam::Vec2;
use labconfig::PointerSettings;

use crate::scene::{surface_uv, Camera, Viewport};
use crate::store::{ParameterStore, PointerSignal};

#[derive(Debug, Clone)]
pub struct PointerTracker {
    settings: PointerSettings,
    position: Vec2,
    velocity: Vec2,
    pressed: bool,
    last_time: Instant,
}

impl PointerTracker {
    pub fn new(settings: PointerSettings, now: Instant) -> Self {
        Self {
            settings,
            position: Vec2::splat(0.5),
            velocity: Vec2::ZERO,
            pressed: false,
            last_time: now,
        }
    }

    pub fn settings(&self) -> &PointerSettings {
        &self.settings
    }

    pub fn signal(&self) -> PointerSignal {
        PointerSignal {
            u: self.position.x,
            v: self.position.y,
            velocity_u: self.velocity.x,
            velocity_v: self.velocity.y,
            pressed: self.pressed,
        }
    }

    /// Handles a pointer move to pixel `(x, y)` observed at `now`.
    pub fn handle_move(
        &mut self,
        x: f32,
        y: f32,
        viewport: Viewport,
        camera: &Camera,
        now: Instant,
        store: &mut ParameterStore,
    ) {
        let uv = surface_uv(camera, viewport, x, y);
        self.move_to(uv, now);
        store.set_pointer_signal(self.signal());
    }

    /// Moves to an already projected uv position.
    pub fn move_to(&mut self, uv: Vec2, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_time);
        let dt = elapsed.max(self.settings.min_interval).as_secs_f32();

        let raw = ((uv - self.position) / dt).clamp_length_max(self.settings.max_speed);
        self.velocity = self.velocity.lerp(raw, self.settings.smoothing);
        self.position = uv;
        self.last_time = now;
    }

    pub fn press(&mut self, store: &mut ParameterStore) {
        self.pressed = true;
        store.set_pointer_signal(self.signal());
    }

    /// Also used when the pointer leaves the surface.
    pub fn release(&mut self, store: &mut ParameterStore) {
        self.pressed = false;
        store.set_pointer_signal(self.signal());
    }

    /// Per-frame decay. Returns whether a new signal was published.
    pub fn tick(&mut self, store: &mut ParameterStore) -> bool {
        if self.velocity.length() <= self.settings.epsilon {
            return false;
        }
        self.velocity *= self.settings.decay;
        store.set_pointer_signal(self.signal());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use catalog::Catalog;

    fn store() -> ParameterStore {
        ParameterStore::new(Arc::new(Catalog::new()))
    }

    #[test]
    fn velocity_is_smoothed_against_previous() {
        let start = Instant::now();
        let mut tracker = PointerTracker::new(PointerSettings::default(), start);
        tracker.move_to(Vec2::new(0.6, 0.5), start + Duration::from_millis(100));
        // raw 1.0 u/s blended halfway from zero
        assert!((tracker.signal().velocity_u - 0.5).abs() < 1e-4);
        tracker.move_to(Vec2::new(0.7, 0.5), start + Duration::from_millis(200));
        assert!((tracker.signal().velocity_u - 0.75).abs() < 1e-4);
    }

    #[test]
    fn fast_jumps_are_clamped() {
        let start = Instant::now();
        let mut tracker = PointerTracker::new(PointerSettings::default(), start);
        // same instant: dt floors at 1ms, raw speed 400 u/s clamps to 10
        tracker.move_to(Vec2::new(0.9, 0.5), start);
        assert!((tracker.signal().velocity().length() - 5.0).abs() < 1e-3);
    }

    #[test]
    fn decay_is_geometric_and_stops_under_epsilon() {
        let start = Instant::now();
        let mut store = store();
        let mut tracker = PointerTracker::new(PointerSettings::default(), start);
        tracker.move_to(Vec2::new(0.6, 0.5), start + Duration::from_millis(100));
        let initial = tracker.signal().velocity().length();

        for step in 1..=10 {
            assert!(tracker.tick(&mut store));
            let expected = initial * 0.95_f32.powi(step);
            assert!((store.pointer().velocity().length() - expected).abs() < 1e-5);
        }

        let mut published = 10;
        while tracker.tick(&mut store) {
            published += 1;
            assert!(published < 1000, "decay never settled");
        }
        assert!(store.pointer().velocity().length() <= 0.001 / 0.95);
        assert!(!tracker.tick(&mut store));
    }

    #[test]
    fn press_state_is_independent_of_motion() {
        let start = Instant::now();
        let mut store = store();
        let mut tracker = PointerTracker::new(PointerSettings::default(), start);
        tracker.press(&mut store);
        assert!(store.pointer().pressed);
        tracker.move_to(Vec2::new(0.2, 0.2), start + Duration::from_millis(16));
        assert!(tracker.signal().pressed);
        tracker.release(&mut store);
        assert!(!store.pointer().pressed);
        assert_eq!(store.pointer().position(), Vec2::new(0.2, 0.2));
    }

    #[test]
    fn moves_project_through_the_camera() {
        let start = Instant::now();
        let mut store = store();
        let viewport = Viewport::new(400.0, 400.0);
        let mut camera = Camera::default();
        camera.set_aspect(viewport);
        let mut tracker = PointerTracker::new(PointerSettings::default(), start);
        tracker.handle_move(
            200.0,
            200.0,
            viewport,
            &camera,
            start + Duration::from_millis(10),
            &mut store,
        );
        assert!((store.pointer().position() - Vec2::splat(0.5)).length() < 1e-4);
    }
}
