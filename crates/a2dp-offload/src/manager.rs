//! Session manager
//!
//! The audio server creates one [`SessionManager`] and routes every A2DP
//! parameter and stream operation through it. Source and sink sessions sit
//! behind independent locks, so playback and capture control never wait on
//! each other.

use crate::abr::ImcInstanceAllocator;
use crate::error::{OffloadError, Result};
use crate::session::{OffloadHal, Session, SessionKind, SessionSnapshot};
use a2dp_offload_config::{ConfigError, OffloadConfig};
use a2dp_offload_hal::PlaybackRouter;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A2DP device type named in connect and disconnect requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum A2dpDevice {
    /// Headset receiving our playback
    Output,
    /// Remote source whose audio we capture
    Input,
}

/// Serializable status of the whole offload path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagerSnapshot {
    pub offload_enabled: bool,
    pub source: SessionSnapshot,
    pub sink: SessionSnapshot,
}

pub struct SessionManager {
    config: Arc<OffloadConfig>,
    router: Arc<dyn PlaybackRouter>,
    source: Mutex<Session>,
    sink: Mutex<Session>,
}

impl SessionManager {
    pub fn new(config: OffloadConfig, hal: OffloadHal) -> Self {
        let config = Arc::new(config);
        let imc = Arc::new(ImcInstanceAllocator::new());

        if !config.is_offload_enabled() {
            tracing::warn!("A2DP offload disabled by configuration");
        }
        tracing::info!(
            "A2DP offload manager created (source lib {}, sink lib {})",
            config.libraries.source,
            config.libraries.sink
        );

        Self {
            router: Arc::clone(&hal.router),
            source: Mutex::new(Session::new(
                SessionKind::Source,
                hal.clone(),
                Arc::clone(&config),
                Arc::clone(&imc),
            )),
            sink: Mutex::new(Session::new(
                SessionKind::Sink,
                hal,
                Arc::clone(&config),
                imc,
            )),
            config,
        }
    }

    /// Create a manager from the configuration at the default locations
    pub fn load_default(hal: OffloadHal) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(OffloadConfig::load_default()?, hal))
    }

    pub fn config(&self) -> &OffloadConfig {
        &self.config
    }

    fn source(&self) -> MutexGuard<'_, Session> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sink(&self) -> MutexGuard<'_, Session> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self, device: A2dpDevice) -> MutexGuard<'_, Session> {
        match device {
            A2dpDevice::Output => self.source(),
            A2dpDevice::Input => self.sink(),
        }
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.config.is_offload_enabled() {
            Ok(())
        } else {
            Err(OffloadError::OffloadDisabled)
        }
    }

    pub fn connect(&self, device: A2dpDevice) -> Result<()> {
        self.ensure_enabled()?;
        tracing::debug!("Device connect request for {:?}", device);
        self.session(device).on_device_connect()
    }

    pub fn disconnect(&self, device: A2dpDevice) -> Result<()> {
        self.ensure_enabled()?;
        tracing::debug!("Device disconnect request for {:?}", device);
        self.session(device).on_device_disconnect()
    }

    pub fn set_a2dp_suspended(&self, suspended: bool) -> Result<()> {
        self.ensure_enabled()?;
        // Re-routing may stop or start playback, so the source lock is
        // released before the router runs
        let outcome = self.source().set_suspended(suspended);
        outcome.notify(&*self.router)
    }

    /// `mono` selects mono TWS playback, otherwise dual mono
    pub fn set_tws_channel_mode(&self, mono: bool) -> Result<()> {
        self.ensure_enabled()?;
        self.source().set_tws_mono_mode(mono);
        Ok(())
    }

    /// An encoder reconfiguration applies only while a sink is connected
    pub fn reconfig_requested(&self) -> Result<bool> {
        self.ensure_enabled()?;
        Ok(self.source().phase() != crate::session::Phase::Disconnected)
    }

    pub fn is_reconfig_supported(&self) -> bool {
        self.config.is_offload_enabled()
    }

    pub fn start_playback(&self) -> Result<()> {
        self.ensure_enabled()?;
        self.source().start()
    }

    pub fn stop_playback(&self) -> Result<()> {
        self.ensure_enabled()?;
        self.source().stop()
    }

    pub fn start_capture(&self) -> Result<()> {
        self.ensure_enabled()?;
        self.sink().start()
    }

    pub fn stop_capture(&self) -> Result<()> {
        self.ensure_enabled()?;
        self.sink().stop()
    }

    pub fn configure_swb(&self, speech_mode: u32) -> Result<()> {
        self.ensure_enabled()?;
        self.source().configure_swb(speech_mode)
    }

    pub fn reset_swb(&self) -> Result<()> {
        self.ensure_enabled()?;
        self.source().reset_swb();
        Ok(())
    }

    pub fn set_handoff_mode(&self, on: bool) {
        self.source().set_handoff_mode(on);
    }

    pub fn is_force_device_switch(&self) -> bool {
        self.source().is_force_device_switch()
    }

    pub fn is_source_suspended(&self) -> bool {
        self.source().is_suspended()
    }

    pub fn source_is_ready(&self) -> bool {
        self.source().is_ready()
    }

    pub fn sink_is_ready(&self) -> bool {
        self.sink().is_ready()
    }

    pub fn encoder_latency(&self) -> u32 {
        self.source().encoder_latency()
    }

    pub fn decoder_latency(&self) -> u32 {
        self.sink().decoder_latency()
    }

    pub fn encoder_sample_rate(&self) -> u32 {
        self.source().sample_rate()
    }

    pub fn decoder_sample_rate(&self) -> u32 {
        self.sink().sample_rate()
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        ManagerSnapshot {
            offload_enabled: self.config.is_offload_enabled(),
            source: self.source().snapshot(),
            sink: self.sink().snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Phase, mock_handles};
    use a2dp_offload_hal::mock::{MockHal, MockProfile};

    fn disabled_config() -> OffloadConfig {
        let mut config = OffloadConfig::default();
        config.offload.disabled = true;
        config
    }

    #[test]
    fn test_disabled_offload_rejects_everything() {
        let hal = MockHal::new(MockProfile::Standard);
        let manager = SessionManager::new(disabled_config(), mock_handles(&hal));

        assert!(matches!(
            manager.connect(A2dpDevice::Output),
            Err(OffloadError::OffloadDisabled)
        ));
        assert!(matches!(
            manager.start_playback(),
            Err(OffloadError::OffloadDisabled)
        ));
        assert!(matches!(
            manager.set_a2dp_suspended(true),
            Err(OffloadError::OffloadDisabled)
        ));
        assert!(matches!(
            manager.reconfig_requested(),
            Err(OffloadError::OffloadDisabled)
        ));
        assert!(!manager.is_reconfig_supported());
        assert!(!manager.snapshot().offload_enabled);
        assert_eq!(hal.source.calls().open, 0);
    }

    #[test]
    fn test_reconfig_follows_source_connection() {
        let hal = MockHal::new(MockProfile::Standard);
        let manager = SessionManager::new(OffloadConfig::default(), mock_handles(&hal));
        assert!(manager.is_reconfig_supported());
        assert!(!manager.reconfig_requested().unwrap());

        manager.connect(A2dpDevice::Output).unwrap();
        assert!(manager.reconfig_requested().unwrap());

        manager.disconnect(A2dpDevice::Output).unwrap();
        assert!(!manager.reconfig_requested().unwrap());
    }

    #[test]
    fn test_source_and_sink_are_independent() {
        let hal = MockHal::new(MockProfile::Standard);
        let manager = SessionManager::new(OffloadConfig::default(), mock_handles(&hal));

        manager.connect(A2dpDevice::Input).unwrap();
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.sink.phase, Phase::Connected);
        assert_eq!(snapshot.source.phase, Phase::Disconnected);
        assert_eq!(hal.sink.calls().open, 1);
        assert_eq!(hal.source.calls().open, 0);
    }

    #[test]
    fn test_tws_channel_mode() {
        let hal = MockHal::new(MockProfile::Standard);
        let manager = SessionManager::new(OffloadConfig::default(), mock_handles(&hal));
        manager.set_tws_channel_mode(true).unwrap();
        assert!(manager.snapshot().source.tws_mono);
        hal.inspect(|s| {
            assert_eq!(
                s.last_enum(a2dp_offload_hal::controls::TWS_CHANNEL_MODE),
                Some("One")
            )
        });
    }

    #[test]
    fn test_snapshot_serializes() {
        let hal = MockHal::new(MockProfile::Standard);
        let manager = SessionManager::new(OffloadConfig::default(), mock_handles(&hal));
        let json = serde_json::to_value(manager.snapshot()).unwrap();
        assert_eq!(json["offload_enabled"], true);
        assert_eq!(json["source"]["phase"], "Disconnected");
        assert_eq!(json["source"]["codec"], "Pcm");
        assert_eq!(json["sink"]["kind"], "Sink");
        assert!(json["source"]["backend_rate"].is_null());
    }
}
