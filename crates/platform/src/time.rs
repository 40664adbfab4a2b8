use std::time::{Duration, Instant};

/// Monotonic frame clock.
#[derive(Debug, Default)]
pub struct FrameClock {
    last_frame: Option<Instant>,
}

impl FrameClock {
    /// Seconds since the previous tick; zero on the first frame.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| (now - last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        dt
    }
}

#[derive(Debug)]
pub struct FpsStats {
    pub fps: u32,
    pub frame_time: Duration,
}

pub struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl Default for FpsCounter {
    fn default() -> Self {
        FpsCounter {
            frames: 0,
            since: Instant::now(),
        }
    }
}

impl FpsCounter {
    /// Counts a frame; returns stats once per second.
    pub fn on_frame(&mut self) -> Option<FpsStats> {
        self.frames += 1;

        let elapsed = self.since.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let stats = FpsStats {
                fps: self.frames,
                frame_time: elapsed / self.frames,
            };

            self.frames = 0;
            self.since = Instant::now();

            Some(stats)
        } else {
            None
        }
    }
}
