//! Listener/emitter geometry: distance attenuation and stereo panning.

use crate::config::SpatialDefaults;

pub use glam::Vec3;

/// Smallest minimum distance accepted; non-positive values clamp up to this
pub const MIN_DISTANCE_FLOOR: f32 = 0.01;

/// The single listener sounds are positioned against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Listener {
    pub position: Vec3,
    /// Forward direction (unit length)
    pub direction: Vec3,
    /// Up vector (unit length)
    pub up: Vec3,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            up: Vec3::Y,
        }
    }
}

impl Listener {
    /// Unit vector pointing to the listener's right
    pub fn right(&self) -> Vec3 {
        self.direction.cross(self.up).normalize_or_zero()
    }
}

/// Per-sound emitter parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialParams {
    pub position: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rolloff: f32,
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self::from_defaults(&SpatialDefaults::default())
    }
}

impl SpatialParams {
    pub fn from_defaults(defaults: &SpatialDefaults) -> Self {
        let mut params = Self {
            position: Vec3::ZERO,
            min_distance: 1.0,
            max_distance: f32::MAX,
            rolloff: 1.0,
        };
        params.set_min_distance(defaults.min_distance);
        params.set_max_distance(defaults.max_distance);
        params.set_rolloff(defaults.rolloff);
        params
    }

    pub fn set_min_distance(&mut self, distance: f32) {
        self.min_distance = if distance > 0.0 {
            distance
        } else {
            MIN_DISTANCE_FLOOR
        };
    }

    /// Values at or below the min distance (or NaN) become min + 1
    pub fn set_max_distance(&mut self, distance: f32) {
        self.max_distance = if distance > self.min_distance {
            distance
        } else {
            self.min_distance + 1.0
        };
    }

    pub fn set_rolloff(&mut self, rolloff: f32) {
        self.rolloff = if rolloff.is_nan() { 0.0 } else { rolloff.max(0.0) };
    }

    /// Inverse-distance attenuation clamped to [min_distance, max_distance]
    pub fn attenuation(&self, distance: f32) -> f32 {
        let min = self.min_distance.max(MIN_DISTANCE_FLOOR);
        let max = self.max_distance.max(min);
        let d = distance.clamp(min, max);
        min / (min + self.rolloff * (d - min))
    }

    /// Gains for the left and right output channels relative to `listener`
    pub fn stereo_gains(&self, listener: &Listener) -> StereoGains {
        let offset = self.position - listener.position;
        let distance = offset.length();
        let gain = self.attenuation(distance);

        let pan = if distance > f32::EPSILON {
            (offset / distance).dot(listener.right()).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        StereoGains {
            left: gain * (1.0 - pan.max(0.0)),
            right: gain * (1.0 + pan.min(0.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoGains {
    pub left: f32,
    pub right: f32,
}

impl StereoGains {
    pub const UNITY: Self = Self {
        left: 1.0,
        right: 1.0,
    };

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}
