//! Scoped ownership of the manager's lifecycle.

use super::manager::AudioManager;
use crate::error::AudioResult;

/// Initializes the manager on creation and shuts it down when closed or
/// dropped, but only if this session was the one that initialized it.
pub struct AudioSession {
    audio: AudioManager,
    owns_init: bool,
}

impl AudioSession {
    pub fn new(audio: &AudioManager) -> AudioResult<Self> {
        let owns_init = audio.initialize()?;
        Ok(Self {
            audio: audio.clone(),
            owns_init,
        })
    }

    /// Whether dropping this session will shut the manager down
    pub fn owns_init(&self) -> bool {
        self.owns_init
    }

    pub fn audio(&self) -> &AudioManager {
        &self.audio
    }

    pub fn close(&mut self) {
        if !self.owns_init {
            return;
        }
        self.audio.shutdown();
        self.owns_init = false;
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;

    #[test]
    fn test_session_owns_fresh_init() {
        let manager = AudioManager::headless(AudioConfig::default());
        {
            let session = AudioSession::new(&manager).unwrap();
            assert!(session.owns_init());
            assert!(manager.is_initialized());
        }
        assert!(!manager.is_initialized());
    }

    #[test]
    fn test_nested_session_leaves_manager_running() {
        let manager = AudioManager::headless(AudioConfig::default());
        let outer = AudioSession::new(&manager).unwrap();
        {
            let inner = AudioSession::new(&manager).unwrap();
            assert!(!inner.owns_init());
        }
        assert!(manager.is_initialized());
        drop(outer);
        assert!(!manager.is_initialized());
    }

    #[test]
    fn test_close_is_idempotent() {
        let manager = AudioManager::headless(AudioConfig::default());
        let mut session = AudioSession::new(&manager).unwrap();
        session.close();
        assert!(!manager.is_initialized());

        // Someone else re-initializes; the closed session must not interfere
        manager.initialize().unwrap();
        session.close();
        drop(session);
        assert!(manager.is_initialized());
        manager.shutdown();
    }
}
