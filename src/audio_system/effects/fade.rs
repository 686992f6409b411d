/// Linear volume ramp
///
/// A fade interpolates from a start volume to a target volume over a fixed
/// duration, sampled against a caller-supplied clock so the background tick
/// and tests drive it the same way.

use std::time::{Duration, Instant};

use crate::utils::clamp_volume;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    from: f32,
    to: f32,
    started_at: Instant,
    duration: Duration,
}

/// Result of sampling a fade
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeStep {
    /// Still ramping; apply this volume
    Running(f32),

    /// Reached the end; apply the exact target and drop the fade
    Finished(f32),
}

impl FadeStep {
    pub fn volume(self) -> f32 {
        match self {
            FadeStep::Running(v) | FadeStep::Finished(v) => v,
        }
    }
}

impl Fade {
    /// Start a ramp from `from` to `to` beginning at `now`
    pub fn new(from: f32, to: f32, duration: Duration, now: Instant) -> Self {
        Self {
            from: clamp_volume(from),
            to: clamp_volume(to),
            started_at: now,
            duration,
        }
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn end(&self) -> Instant {
        self.started_at + self.duration
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        now >= self.end()
    }

    /// Interpolated volume at `now`, clamped to the ramp's endpoints
    pub fn volume_at(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return self.to;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        let progress = (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * progress
    }

    pub fn step(&self, now: Instant) -> FadeStep {
        if self.is_finished(now) {
            FadeStep::Finished(self.to)
        } else {
            FadeStep::Running(self.volume_at(now))
        }
    }
}
