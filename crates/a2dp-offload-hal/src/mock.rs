//! Mock implementations for testing without real hardware
//!
//! This module provides mock backends for every HAL interface, allowing the
//! session manager to be exercised on a desktop system without a DSP or a
//! Bluetooth stack. All mocks share one [`MockState`] so a test can script the
//! controller and then inspect every mixer write the core made.
//!
//! # Usage
//!
//! ```no_run
//! use a2dp_offload_hal::mock::{MockHal, MockProfile};
//!
//! // Platform with the split Rx/Tx backend controls
//! let hal = MockHal::new(MockProfile::Standard);
//!
//! // Script the source controller before starting a session
//! hal.source.set_encoder_report(0x2300_0000, vec![0; 64]);
//! ```

use crate::controls;
use crate::{
    A2dpController, ControlId, ControllerError, ControllerResult, DecoderConfigReport,
    EncoderConfigReport, FeedbackDirection, FeedbackHandle, FeedbackPath, FeedbackPcmConfig,
    HalError, Mixer, PlaybackRouter, UsecaseId,
};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Pre-defined mock platform profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockProfile {
    /// Split Rx/Tx backend controls, base aptX Adaptive block only
    Standard,
    /// Standard plus the extended aptX Adaptive encoder block
    AptxAdaptiveR2,
    /// Older firmware with the single legacy backend rate control
    LegacyBackend,
}

impl MockProfile {
    /// Mixer controls exposed by this profile
    pub fn controls(self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = controls::STANDARD.to_vec();
        match self {
            MockProfile::Standard => {}
            MockProfile::AptxAdaptiveR2 => names.push(controls::ENC_APTX_AD_CONFIG_BLOCK),
            MockProfile::LegacyBackend => {
                names.retain(|n| {
                    *n != controls::SAMPLE_RATE_RX && *n != controls::SOURCE_SAMPLE_RATE_TX
                });
                names.push(controls::SAMPLE_RATE_DEFAULT);
            }
        }
        names
    }

    /// Get profile from string name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "standard" => Some(MockProfile::Standard),
            "r2" | "aptx_ad_r2" => Some(MockProfile::AptxAdaptiveR2),
            "legacy" => Some(MockProfile::LegacyBackend),
            _ => None,
        }
    }

    /// List all available mock profiles
    pub fn all() -> &'static [MockProfile] {
        &[
            MockProfile::Standard,
            MockProfile::AptxAdaptiveR2,
            MockProfile::LegacyBackend,
        ]
    }
}

/// Value written to a mock mixer control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixerValue {
    Int(i64),
    Enum(String),
    Array(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixerWrite {
    pub control: String,
    pub value: MixerValue,
}

/// Call counters for one mock controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerCalls {
    pub open: u32,
    pub close: u32,
    pub start: u32,
    pub stop: u32,
    pub suspend: u32,
    pub clear_suspend_flag: u32,
    pub handoff: u32,
    pub setup_complete: u32,
}

/// Scriptable behavior of one mock controller
#[derive(Debug, Clone)]
pub struct MockControllerState {
    pub calls: ControllerCalls,
    pub fail_open: bool,
    pub fail_start: bool,
    pub fail_stop: bool,
    pub refuse_close: bool,
    pub supports_suspend: bool,
    pub encoder_report: Option<EncoderConfigReport>,
    pub decoder_report: Option<DecoderConfigReport>,
    pub ready: bool,
    pub latency: Option<u16>,
    pub scrambling: Option<bool>,
    pub tws_mono: Option<bool>,
    pub last_setup_latency: Option<u64>,
}

impl Default for MockControllerState {
    fn default() -> Self {
        Self {
            calls: ControllerCalls::default(),
            fail_open: false,
            fail_start: false,
            fail_stop: false,
            refuse_close: false,
            supports_suspend: true,
            encoder_report: None,
            decoder_report: None,
            ready: true,
            latency: None,
            scrambling: None,
            tws_mono: None,
            last_setup_latency: None,
        }
    }
}

/// Shared mock state for synchronized access
#[derive(Debug, Default)]
pub struct MockState {
    /// Known control names, index is the [`ControlId`]
    pub controls: Vec<String>,
    /// Controls hidden from lookup
    pub removed_controls: HashSet<String>,
    /// Controls whose writes are rejected
    pub failing_controls: HashSet<String>,
    /// Every accepted write, in order
    pub writes: Vec<MixerWrite>,
    pub source: MockControllerState,
    pub sink: MockControllerState,
    pub next_feedback_handle: u32,
    pub open_feedback: Vec<(FeedbackHandle, FeedbackDirection)>,
    pub feedback_opens: u32,
    pub feedback_closes: u32,
    pub failing_feedback: HashSet<FeedbackDirection>,
    pub usecases: Vec<UsecaseId>,
    pub restore_calls: Vec<(UsecaseId, bool)>,
}

impl MockState {
    pub fn new(profile: MockProfile) -> Self {
        Self {
            controls: profile.controls().into_iter().map(Into::into).collect(),
            next_feedback_handle: 1,
            ..Default::default()
        }
    }

    fn control_name(&self, ctl: ControlId) -> Option<&str> {
        self.controls.get(ctl.0 as usize).map(String::as_str)
    }

    /// All writes made to a control
    pub fn writes_to(&self, control: &str) -> Vec<&MixerValue> {
        self.writes
            .iter()
            .filter(|w| w.control == control)
            .map(|w| &w.value)
            .collect()
    }

    pub fn last_write(&self, control: &str) -> Option<&MixerValue> {
        self.writes
            .iter()
            .rev()
            .find(|w| w.control == control)
            .map(|w| &w.value)
    }

    pub fn last_enum(&self, control: &str) -> Option<&str> {
        match self.last_write(control) {
            Some(MixerValue::Enum(label)) => Some(label.as_str()),
            _ => None,
        }
    }

    pub fn last_value(&self, control: &str) -> Option<i64> {
        match self.last_write(control) {
            Some(MixerValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn last_array(&self, control: &str) -> Option<&[u8]> {
        match self.last_write(control) {
            Some(MixerValue::Array(bytes)) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    pub fn open_feedback_count(&self) -> usize {
        self.open_feedback.len()
    }

    pub fn has_open_feedback(&self, direction: FeedbackDirection) -> bool {
        self.open_feedback.iter().any(|(_, d)| *d == direction)
    }
}

/// Mock mixer backed by the shared state
pub struct MockMixer {
    state: Arc<RwLock<MockState>>,
}

impl MockMixer {
    pub fn new(state: Arc<RwLock<MockState>>) -> Self {
        Self { state }
    }

    /// Hide a control from lookup, as if the firmware did not expose it
    pub fn remove_control(&self, name: &str) {
        if let Ok(mut state) = self.state.write() {
            state.removed_controls.insert(name.to_string());
        }
    }

    /// Expose an additional control
    pub fn add_control(&self, name: &str) {
        if let Ok(mut state) = self.state.write() {
            state.removed_controls.remove(name);
            if !state.controls.iter().any(|c| c == name) {
                state.controls.push(name.to_string());
            }
        }
    }

    /// Make every write to `name` fail
    pub fn fail_control(&self, name: &str, fail: bool) {
        if let Ok(mut state) = self.state.write() {
            if fail {
                state.failing_controls.insert(name.to_string());
            } else {
                state.failing_controls.remove(name);
            }
        }
    }

    fn record(&self, ctl: ControlId, value: MixerValue) -> crate::Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| HalError::ControlNotFound(format!("{:?}", ctl)))?;
        let Some(name) = state.control_name(ctl).map(str::to_string) else {
            return Err(HalError::ControlNotFound(format!("{:?}", ctl)));
        };
        if state.failing_controls.contains(&name) {
            tracing::debug!("[MOCK] Rejecting write to {}", name);
            return Err(HalError::WriteRejected {
                control: name,
                reason: "mock failure".into(),
            });
        }
        tracing::debug!("[MOCK] {} <- {:?}", name, value);
        state.writes.push(MixerWrite {
            control: name,
            value,
        });
        Ok(())
    }
}

impl Mixer for MockMixer {
    fn control(&self, name: &str) -> Option<ControlId> {
        let state = self.state.read().ok()?;
        if state.removed_controls.contains(name) {
            return None;
        }
        state
            .controls
            .iter()
            .position(|c| c == name)
            .map(|idx| ControlId(idx as u32))
    }

    fn set_value(&self, ctl: ControlId, value: i64) -> crate::Result<()> {
        self.record(ctl, MixerValue::Int(value))
    }

    fn set_enum(&self, ctl: ControlId, label: &str) -> crate::Result<()> {
        self.record(ctl, MixerValue::Enum(label.to_string()))
    }

    fn set_array(&self, ctl: ControlId, bytes: &[u8]) -> crate::Result<()> {
        self.record(ctl, MixerValue::Array(bytes.to_vec()))
    }
}

/// Which controller slot of the shared state a mock controller drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSide {
    Source,
    Sink,
}

/// Mock Bluetooth stack controller
pub struct MockController {
    side: MockSide,
    state: Arc<RwLock<MockState>>,
}

impl MockController {
    pub fn new(side: MockSide, state: Arc<RwLock<MockState>>) -> Self {
        Self { side, state }
    }

    fn with<R>(&self, f: impl FnOnce(&mut MockControllerState) -> R) -> Option<R> {
        let mut state = self.state.write().ok()?;
        let slot = match self.side {
            MockSide::Source => &mut state.source,
            MockSide::Sink => &mut state.sink,
        };
        Some(f(slot))
    }

    /// Snapshot of the call counters
    pub fn calls(&self) -> ControllerCalls {
        self.with(|s| s.calls).unwrap_or_default()
    }

    /// Script the encoder configuration the stack reports on start
    pub fn set_encoder_report(&self, codec_type: u32, blob: Vec<u8>) {
        self.with(|s| {
            s.encoder_report = Some(EncoderConfigReport {
                codec_type,
                multicast: false,
                num_devices: 1,
                blob,
            })
        });
    }

    /// Script the decoder configuration the stack reports on start
    pub fn set_decoder_report(&self, codec_type: u32, blob: Vec<u8>) {
        self.with(|s| s.decoder_report = Some(DecoderConfigReport { codec_type, blob }));
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.with(|s| s.fail_start = fail);
    }

    pub fn set_fail_stop(&self, fail: bool) {
        self.with(|s| s.fail_stop = fail);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.with(|s| s.fail_open = fail);
    }

    pub fn set_ready(&self, ready: bool) {
        self.with(|s| s.ready = ready);
    }

    pub fn set_latency(&self, latency: Option<u16>) {
        self.with(|s| s.latency = latency);
    }

    pub fn set_scrambling(&self, enabled: Option<bool>) {
        self.with(|s| s.scrambling = enabled);
    }

    pub fn set_tws_mono(&self, enabled: Option<bool>) {
        self.with(|s| s.tws_mono = enabled);
    }

    pub fn set_supports_suspend(&self, supported: bool) {
        self.with(|s| s.supports_suspend = supported);
    }

    pub fn last_setup_latency(&self) -> Option<u64> {
        self.with(|s| s.last_setup_latency).flatten()
    }
}

impl A2dpController for MockController {
    fn open(&self) -> ControllerResult<()> {
        let fail = self
            .with(|s| {
                s.calls.open += 1;
                s.fail_open
            })
            .unwrap_or(true);
        tracing::debug!("[MOCK] {:?} controller open", self.side);
        if fail {
            Err(ControllerError::Status(-1))
        } else {
            Ok(())
        }
    }

    fn close(&self) -> ControllerResult<bool> {
        let refused = self
            .with(|s| {
                s.calls.close += 1;
                s.refuse_close
            })
            .unwrap_or(true);
        tracing::debug!("[MOCK] {:?} controller close", self.side);
        Ok(!refused)
    }

    fn start(&self) -> ControllerResult<()> {
        let fail = self
            .with(|s| {
                s.calls.start += 1;
                s.fail_start
            })
            .unwrap_or(true);
        tracing::debug!("[MOCK] {:?} controller start (fail: {})", self.side, fail);
        if fail {
            Err(ControllerError::Status(-110))
        } else {
            Ok(())
        }
    }

    fn stop(&self) -> ControllerResult<()> {
        let fail = self
            .with(|s| {
                s.calls.stop += 1;
                s.fail_stop
            })
            .unwrap_or(true);
        tracing::debug!("[MOCK] {:?} controller stop", self.side);
        if fail {
            Err(ControllerError::Status(-1))
        } else {
            Ok(())
        }
    }

    fn suspend(&self) -> ControllerResult<()> {
        let supported = self
            .with(|s| {
                if s.supports_suspend {
                    s.calls.suspend += 1;
                }
                s.supports_suspend
            })
            .unwrap_or(false);
        if supported {
            Ok(())
        } else {
            Err(ControllerError::Missing("suspend"))
        }
    }

    fn encoder_config(&self) -> ControllerResult<EncoderConfigReport> {
        self.with(|s| s.encoder_report.clone())
            .flatten()
            .ok_or(ControllerError::Missing("encoder_config"))
    }

    fn decoder_config(&self) -> ControllerResult<DecoderConfigReport> {
        self.with(|s| s.decoder_report.clone())
            .flatten()
            .ok_or(ControllerError::Missing("decoder_config"))
    }

    fn is_ready(&self) -> bool {
        self.with(|s| s.ready).unwrap_or(false)
    }

    fn latency(&self) -> Option<u16> {
        self.with(|s| s.latency).flatten()
    }

    fn clear_suspend_flag(&self) -> ControllerResult<()> {
        self.with(|s| s.calls.clear_suspend_flag += 1);
        Ok(())
    }

    fn handoff_triggered(&self) -> ControllerResult<()> {
        self.with(|s| s.calls.handoff += 1);
        Ok(())
    }

    fn is_scrambling_enabled(&self) -> Option<bool> {
        self.with(|s| s.scrambling).flatten()
    }

    fn is_tws_mono_mode_enabled(&self) -> Option<bool> {
        self.with(|s| s.tws_mono).flatten()
    }

    fn session_setup_complete(&self, system_latency_ms: u64) -> ControllerResult<()> {
        self.with(|s| {
            s.calls.setup_complete += 1;
            s.last_setup_latency = Some(system_latency_ms);
        });
        Ok(())
    }
}

/// Mock feedback front end
pub struct MockFeedbackPath {
    state: Arc<RwLock<MockState>>,
}

impl MockFeedbackPath {
    pub fn new(state: Arc<RwLock<MockState>>) -> Self {
        Self { state }
    }

    /// Make opens in one direction fail
    pub fn fail_direction(&self, direction: FeedbackDirection, fail: bool) {
        if let Ok(mut state) = self.state.write() {
            if fail {
                state.failing_feedback.insert(direction);
            } else {
                state.failing_feedback.remove(&direction);
            }
        }
    }
}

impl FeedbackPath for MockFeedbackPath {
    fn open(
        &self,
        direction: FeedbackDirection,
        config: &FeedbackPcmConfig,
    ) -> crate::Result<FeedbackHandle> {
        let mut state = self
            .state
            .write()
            .map_err(|_| HalError::FeedbackOpen(direction, "state poisoned".into()))?;
        if state.failing_feedback.contains(&direction) {
            return Err(HalError::FeedbackOpen(direction, "mock failure".into()));
        }
        let handle = FeedbackHandle(state.next_feedback_handle);
        state.next_feedback_handle += 1;
        state.feedback_opens += 1;
        state.open_feedback.push((handle, direction));
        tracing::debug!(
            "[MOCK] Opened {:?} feedback {:?} at {} Hz",
            direction,
            handle,
            config.rate
        );
        Ok(handle)
    }

    fn close(&self, handle: FeedbackHandle) {
        if let Ok(mut state) = self.state.write() {
            state.open_feedback.retain(|(h, _)| *h != handle);
            state.feedback_closes += 1;
        }
        tracing::debug!("[MOCK] Closed feedback {:?}", handle);
    }
}

/// Mock use-case router
pub struct MockRouter {
    state: Arc<RwLock<MockState>>,
}

impl MockRouter {
    pub fn new(state: Arc<RwLock<MockState>>) -> Self {
        Self { state }
    }

    /// Register an active playback use case on the A2DP device
    pub fn add_usecase(&self, id: UsecaseId) {
        if let Ok(mut state) = self.state.write() {
            state.usecases.push(id);
        }
    }

    pub fn restore_calls(&self) -> Vec<(UsecaseId, bool)> {
        self.state
            .read()
            .map(|s| s.restore_calls.clone())
            .unwrap_or_default()
    }
}

impl PlaybackRouter for MockRouter {
    fn a2dp_playback_usecases(&self) -> Vec<UsecaseId> {
        self.state
            .read()
            .map(|s| s.usecases.clone())
            .unwrap_or_default()
    }

    fn check_restore(&self, usecase: UsecaseId, restore: bool) {
        if let Ok(mut state) = self.state.write() {
            state.restore_calls.push((usecase, restore));
        }
    }
}

/// Complete mock HAL for testing
pub struct MockHal {
    pub mixer: Arc<MockMixer>,
    pub source: Arc<MockController>,
    pub sink: Arc<MockController>,
    pub feedback: Arc<MockFeedbackPath>,
    pub router: Arc<MockRouter>,
    state: Arc<RwLock<MockState>>,
}

impl MockHal {
    /// Create a complete mock HAL with the given profile
    pub fn new(profile: MockProfile) -> Self {
        let state = Arc::new(RwLock::new(MockState::new(profile)));

        Self {
            mixer: Arc::new(MockMixer::new(Arc::clone(&state))),
            source: Arc::new(MockController::new(MockSide::Source, Arc::clone(&state))),
            sink: Arc::new(MockController::new(MockSide::Sink, Arc::clone(&state))),
            feedback: Arc::new(MockFeedbackPath::new(Arc::clone(&state))),
            router: Arc::new(MockRouter::new(Arc::clone(&state))),
            state,
        }
    }

    /// Create from environment or default
    pub fn from_env() -> Self {
        let profile = std::env::var("A2DP_MOCK_PROFILE")
            .ok()
            .and_then(|s| MockProfile::from_name(&s))
            .unwrap_or(MockProfile::Standard);

        Self::new(profile)
    }

    /// Get shared state for inspection in tests
    pub fn state(&self) -> Arc<RwLock<MockState>> {
        Arc::clone(&self.state)
    }

    /// Run a closure against the shared state
    pub fn inspect<R>(&self, f: impl FnOnce(&MockState) -> R) -> R {
        let state = self
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&state)
    }

    /// Forget recorded mixer writes
    pub fn clear_writes(&self) {
        if let Ok(mut state) = self.state.write() {
            state.writes.clear();
        }
    }
}
