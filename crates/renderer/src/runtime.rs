use std::time::{Duration, Instant};

/// Decides when the next frame is due.
///
/// Without a frame cap every `ready_for_frame` call returns true and redraws
/// are paced by the swapchain. With a cap, frames are spaced by the cap's
/// interval; a late frame re-anchors the schedule instead of bursting to
/// catch up.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval: Option<Duration>,
    next_frame: Option<Instant>,
    in_flight: bool,
}

impl FrameScheduler {
    pub fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f32(1.0 / fps));
        Self {
            interval,
            next_frame: None,
            in_flight: false,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// True when a redraw should be requested now. Returns false while a
    /// requested frame has not been rendered yet.
    pub fn ready_for_frame(&mut self, now: Instant) -> bool {
        if self.in_flight {
            return false;
        }
        let due = match self.next_frame {
            Some(deadline) => now >= deadline,
            None => true,
        };
        if due {
            self.in_flight = true;
        }
        due
    }

    /// Deadline for the next frame when one is scheduled in the future.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.in_flight {
            return None;
        }
        self.next_frame
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.in_flight = false;
        self.next_frame = self.interval.map(|interval| {
            let planned = self.next_frame.map_or(now, |previous| previous + interval);
            if planned <= now {
                now + interval
            } else {
                planned
            }
        });
    }

    pub fn reset(&mut self) {
        self.next_frame = None;
        self.in_flight = false;
    }
}

/// Rolling frames-per-second estimate refreshed once a second.
#[derive(Debug, Clone)]
pub struct FrameStats {
    window_start: Instant,
    frames: u32,
    fps: f32,
    total_frames: u64,
}

impl FrameStats {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
            total_frames: 0,
        }
    }

    /// Counts a frame; returns the new estimate when the window rolled over.
    pub fn record(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        self.total_frames = self.total_frames.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        self.fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(self.fps)
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_scheduler_is_always_ready_after_render() {
        let mut scheduler = FrameScheduler::new(None);
        let now = Instant::now();
        assert!(scheduler.ready_for_frame(now));
        assert!(!scheduler.ready_for_frame(now));
        scheduler.mark_rendered(now);
        assert!(scheduler.next_deadline().is_none());
        assert!(scheduler.ready_for_frame(now));
    }

    #[test]
    fn capped_scheduler_waits_for_interval() {
        let mut scheduler = FrameScheduler::new(Some(10.0));
        let start = Instant::now();
        assert!(scheduler.ready_for_frame(start));
        scheduler.mark_rendered(start);

        let deadline = scheduler.next_deadline().expect("deadline");
        assert_eq!(deadline, start + Duration::from_millis(100));
        assert!(!scheduler.ready_for_frame(start + Duration::from_millis(50)));
        assert!(scheduler.ready_for_frame(deadline));
    }

    #[test]
    fn late_frames_reanchor_instead_of_bursting() {
        let mut scheduler = FrameScheduler::new(Some(10.0));
        let start = Instant::now();
        scheduler.ready_for_frame(start);
        scheduler.mark_rendered(start);

        let late = start + Duration::from_millis(450);
        assert!(scheduler.ready_for_frame(late));
        scheduler.mark_rendered(late);
        assert_eq!(
            scheduler.next_deadline(),
            Some(late + Duration::from_millis(100))
        );
    }

    #[test]
    fn zero_fps_means_uncapped() {
        assert!(FrameScheduler::new(Some(0.0)).interval().is_none());
    }

    #[test]
    fn stats_roll_over_each_second() {
        let start = Instant::now();
        let mut stats = FrameStats::new(start);
        for step in 1..30 {
            assert!(stats.record(start + Duration::from_millis(step * 10)).is_none());
        }
        let fps = stats.record(start + Duration::from_secs(1)).expect("estimate");
        assert!((fps - 30.0).abs() < 0.01);
        assert_eq!(stats.total_frames(), 30);
    }
}
