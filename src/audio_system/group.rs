//! Volume bus with a fade envelope.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::effects::{Fade, FadeStep};
use super::engine::Bus;
use crate::utils::clamp_volume;

pub(crate) struct AudioGroup {
    name: Option<String>,
    bus: Arc<dyn Bus>,
    volume: f32,
    fade: Option<Fade>,
}

impl AudioGroup {
    pub(crate) fn new(name: Option<String>, bus: Arc<dyn Bus>) -> Self {
        let volume = bus.volume();
        Self {
            name,
            bus,
            volume,
            fade: None,
        }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn bus(&self) -> &Arc<dyn Bus> {
        &self.bus
    }

    pub(crate) fn volume(&self) -> f32 {
        self.volume
    }

    /// Jump to `volume`, cancelling any fade
    pub(crate) fn set_volume(&mut self, volume: f32) {
        self.fade = None;
        self.apply_volume(volume);
    }

    pub(crate) fn fade_to(&mut self, target: f32, duration: Duration, now: Instant) {
        self.fade = Some(Fade::new(self.volume, target, duration, now));
    }

    pub(crate) fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Fade target, or the current volume when idle
    pub(crate) fn target_volume(&self) -> f32 {
        self.fade.map_or(self.volume, |fade| fade.target())
    }

    pub(crate) fn update(&mut self, now: Instant) {
        let Some(fade) = self.fade else {
            return;
        };
        match fade.step(now) {
            FadeStep::Running(volume) => self.apply_volume(volume),
            FadeStep::Finished(volume) => {
                self.apply_volume(volume);
                self.fade = None;
            }
        }
    }

    fn apply_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
        self.bus.set_volume(self.volume);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::engine::SharedGain;

    fn group() -> AudioGroup {
        AudioGroup::new(Some("music".to_string()), Arc::new(SharedGain::default()))
    }

    #[test]
    fn test_set_volume_clamps_and_reaches_bus() {
        let mut group = group();
        group.set_volume(1.7);
        assert_eq!(group.volume(), 1.0);
        group.set_volume(0.25);
        assert_eq!(group.bus().volume(), 0.25);
    }

    #[test]
    fn test_fade_converges() {
        let mut group = group();
        let start = Instant::now();
        group.fade_to(0.0, Duration::from_millis(500), start);
        assert!(group.is_fading());
        assert_eq!(group.target_volume(), 0.0);

        group.update(start + Duration::from_millis(250));
        assert!((group.volume() - 0.5).abs() < 1e-4);

        group.update(start + Duration::from_millis(600));
        assert_eq!(group.volume(), 0.0);
        assert!(!group.is_fading());
    }

    #[test]
    fn test_set_volume_cancels_fade() {
        let mut group = group();
        let start = Instant::now();
        group.fade_to(0.0, Duration::from_secs(1), start);
        group.set_volume(0.8);
        assert!(!group.is_fading());

        group.update(start + Duration::from_millis(500));
        assert_eq!(group.volume(), 0.8);
    }

    #[test]
    fn test_refade_starts_from_current_volume() {
        let mut group = group();
        let start = Instant::now();
        group.fade_to(0.0, Duration::from_millis(100), start);
        group.update(start + Duration::from_millis(50));
        let midway = group.volume();

        group.fade_to(1.0, Duration::from_millis(100), start + Duration::from_millis(50));
        group.update(start + Duration::from_millis(50));
        assert!((group.volume() - midway).abs() < 1e-4);
        assert_eq!(group.name(), Some("music"));
    }
}
