//! Per-direction A2DP offload session
//!
//! A [`Session`] tracks one direction of the A2DP link: the source side encodes
//! playback towards the headset, the sink side decodes capture from it. Both
//! follow the same life cycle:
//!
//! ```text
//! Disconnected -> Connected -> Started -> Stopped -> Started ...
//!       ^                                    |
//!       +------------- disconnect -----------+
//! ```
//!
//! `start` and `stop` are reference counted so several playback streams can
//! share one controller session. Every mutating operation either commits its
//! new state or leaves the previous one in place.

use crate::abr::{AbrController, ImcInstanceAllocator};
use crate::backend::{self, BackendRate};
use crate::codec::dsp::{self, bit_format_label};
use crate::codec::latency;
use crate::codec::{
    AacShape, CodecConfig, CodecId, DEFAULT_BITS_PER_SAMPLE, Direction, NegotiationContext,
    NegotiationError, SpeechConfig, StreamParams, negotiate,
};
use crate::error::{OffloadError, Result};
use crate::mixer_ext::MixerExt;
use a2dp_offload_config::OffloadConfig;
use a2dp_offload_hal::{A2dpController, FeedbackPath, Mixer, PlaybackRouter, controls};
use serde::Serialize;
use std::sync::Arc;

/// Which side of the A2DP link a session drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionKind {
    /// Playback towards a headset, DSP encodes
    Source,
    /// Capture from a remote source, DSP decodes
    Sink,
}

impl SessionKind {
    pub fn direction(self) -> Direction {
        match self {
            SessionKind::Source => Direction::Encode,
            SessionKind::Sink => Direction::Decode,
        }
    }
}

/// Life cycle position of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// No device, control path closed
    Disconnected,
    /// Control path open, stream never started
    Connected,
    /// Stream running with a negotiated codec
    Started,
    /// Stream stopped after running; the control path stays open
    Stopped,
}

/// Everything a session talks to.
///
/// A missing controller means the Bluetooth IPC library for that direction
/// could not be resolved.
#[derive(Clone)]
pub struct OffloadHal {
    pub source: Option<Arc<dyn A2dpController>>,
    pub sink: Option<Arc<dyn A2dpController>>,
    pub mixer: Arc<dyn Mixer>,
    pub feedback: Arc<dyn FeedbackPath>,
    pub router: Arc<dyn PlaybackRouter>,
}

impl OffloadHal {
    /// Handles without any controller bound
    pub fn new(
        mixer: Arc<dyn Mixer>,
        feedback: Arc<dyn FeedbackPath>,
        router: Arc<dyn PlaybackRouter>,
    ) -> Self {
        Self {
            source: None,
            sink: None,
            mixer,
            feedback,
            router,
        }
    }

    /// Bind the source (playback) controller
    pub fn with_source(mut self, controller: Arc<dyn A2dpController>) -> Self {
        self.source = Some(controller);
        self
    }

    /// Bind the sink (capture) controller
    pub fn with_sink(mut self, controller: Arc<dyn A2dpController>) -> Self {
        self.sink = Some(controller);
        self
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub kind: SessionKind,
    pub phase: Phase,
    pub codec: CodecId,
    pub sample_rate: u32,
    pub channels: u16,
    pub active_requests: u32,
    pub suspended: bool,
    pub handoff: bool,
    pub swb_configured: bool,
    pub tws_mono: bool,
    pub abr_started: bool,
    pub backend_rate: Option<BackendRate>,
}

fn advisory(what: &str, result: a2dp_offload_hal::Result<()>) {
    if let Err(e) = result {
        tracing::warn!("{} failed: {}", what, e);
    }
}

/// Committed suspend state change whose routing follow-up is still pending.
///
/// Re-evaluating a use case's routing may stop or start playback again, so
/// the router must only be called after the session lock is released.
#[must_use = "playback use cases must be told about the suspend state change"]
#[derive(Debug)]
pub struct SuspendOutcome {
    result: Result<()>,
    restore: Option<bool>,
}

impl SuspendOutcome {
    fn unchanged() -> Self {
        Self {
            result: Ok(()),
            restore: None,
        }
    }

    /// `Some(restore)` when the playback use cases need re-routing
    pub fn restore(&self) -> Option<bool> {
        self.restore
    }

    /// Notify the bound playback use cases and return the state change result
    pub fn notify(self, router: &dyn PlaybackRouter) -> Result<()> {
        if let Some(restore) = self.restore {
            for usecase in router.a2dp_playback_usecases() {
                router.check_restore(usecase, restore);
            }
        }
        self.result
    }
}

pub struct Session {
    kind: SessionKind,
    hal: OffloadHal,
    config: Arc<OffloadConfig>,
    imc: Arc<ImcInstanceAllocator>,
    phase: Phase,
    active: u32,
    suspended: bool,
    handoff: bool,
    swb_configured: bool,
    tws_mono: bool,
    /// Controller session was started but the DSP was never configured
    controller_started_unconfigured: bool,
    codec: CodecConfig,
    last_known: Option<StreamParams>,
    backend_rate: Option<BackendRate>,
    abr: AbrController,
}

impl Session {
    pub fn new(
        kind: SessionKind,
        hal: OffloadHal,
        config: Arc<OffloadConfig>,
        imc: Arc<ImcInstanceAllocator>,
    ) -> Self {
        Self {
            kind,
            hal,
            config,
            imc,
            phase: Phase::Disconnected,
            active: 0,
            suspended: false,
            handoff: false,
            swb_configured: false,
            tws_mono: false,
            controller_started_unconfigured: false,
            codec: CodecConfig::default(),
            last_known: None,
            backend_rate: None,
            abr: AbrController::new(),
        }
    }

    fn controller(&self) -> Result<Arc<dyn A2dpController>> {
        let controller = match self.kind {
            SessionKind::Source => self.hal.source.clone(),
            SessionKind::Sink => self.hal.sink.clone(),
        };
        controller.ok_or_else(|| {
            OffloadError::ControllerUnavailable(format!("{:?} IPC library not loaded", self.kind))
        })
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active_requests(&self) -> u32 {
        self.active
    }

    pub fn codec(&self) -> &CodecConfig {
        &self.codec
    }

    pub fn abr(&self) -> &AbrController {
        &self.abr
    }

    pub fn is_swb_configured(&self) -> bool {
        self.swb_configured
    }

    pub fn is_tws_mono(&self) -> bool {
        self.tws_mono
    }

    /// Open the controller control path for a newly connected device.
    ///
    /// Only acts from `Disconnected`; repeated connects are ignored. A failing
    /// open is logged and the session still counts as connected.
    pub fn on_device_connect(&mut self) -> Result<()> {
        if self.phase != Phase::Disconnected {
            tracing::debug!("{:?} already connected ({:?})", self.kind, self.phase);
            return Ok(());
        }
        let controller = self.controller()?;

        if let Err(e) = controller.open() {
            tracing::error!("Failed to open {:?} control path: {}", self.kind, e);
        }
        self.phase = Phase::Connected;
        tracing::info!("{:?} connected", self.kind);
        Ok(())
    }

    /// Close the control path and return every setting to its default
    pub fn on_device_disconnect(&mut self) -> Result<()> {
        let controller = self.controller()?;

        if self.phase != Phase::Disconnected {
            match controller.close() {
                Ok(true) => {}
                Ok(false) => tracing::error!("{:?} control path refused to close", self.kind),
                Err(e) => tracing::error!("Failed to close {:?} control path: {}", self.kind, e),
            }
        }

        self.abr.stop(&*self.hal.mixer, &*self.hal.feedback);
        self.active = 0;
        self.suspended = false;
        self.controller_started_unconfigured = false;
        self.codec = CodecConfig::default();
        self.last_known = None;
        self.backend_rate = None;

        match self.kind {
            SessionKind::Source => {
                self.reset_encoder_params();
                let mixer = &*self.hal.mixer;
                advisory(
                    "Feedback decoder reset",
                    mixer.write_block(&dsp::source_decoder_reset_block()),
                );
                advisory(
                    "Backend reset",
                    backend::reset_backend(mixer, Direction::Encode, false),
                );
            }
            SessionKind::Sink => self.reset_decoder_params(),
        }

        self.phase = Phase::Disconnected;
        tracing::info!("{:?} disconnected", self.kind);
        Ok(())
    }

    /// Take one reference on the stream, starting and configuring it on the
    /// first one.
    pub fn start(&mut self) -> Result<()> {
        match self.kind {
            SessionKind::Source => self.start_playback(),
            SessionKind::Sink => self.start_capture(),
        }
    }

    /// Drop one reference; the last one stops the stream
    pub fn stop(&mut self) -> Result<()> {
        let controller = self.controller()?;

        if self.active == 0 {
            tracing::error!("{:?}: {}", self.kind, OffloadError::ReferenceCountUnderflow);
        } else {
            self.active -= 1;
        }

        if self.active > 0 {
            tracing::debug!("{:?} still has {} active requests", self.kind, self.active);
            return Ok(());
        }
        if self.phase != Phase::Started && !self.controller_started_unconfigured {
            return Ok(());
        }

        let result = controller.stop();
        match self.kind {
            SessionKind::Source => {
                if !self.suspended && !self.swb_configured {
                    self.reset_codec_config();
                    self.codec = CodecConfig::default();
                }
            }
            SessionKind::Sink => {
                self.reset_decoder_params();
                self.codec = CodecConfig::default();
            }
        }
        self.controller_started_unconfigured = false;
        if self.phase == Phase::Started {
            self.phase = Phase::Stopped;
        }
        tracing::info!("{:?} stopped", self.kind);

        result.map_err(|e| {
            tracing::error!("{:?} controller stop failed: {}", self.kind, e);
            OffloadError::ControllerStop(e)
        })
    }

    fn start_playback(&mut self) -> Result<()> {
        let controller = self.controller()?;

        if self.suspended || self.swb_configured {
            tracing::debug!("Playback start requested while suspended");
            return Err(OffloadError::SuspendedRetry);
        }

        if self.phase == Phase::Started && self.active > 0 {
            self.active += 1;
            self.run_post_start_actions(&*controller);
            tracing::debug!("Playback joined, {} active requests", self.active);
            return Ok(());
        }

        controller.start().map_err(|e| {
            tracing::error!("Controller start failed: {}", e);
            OffloadError::ControllerStart(e)
        })?;

        let config = match self.configure_encoder(&*controller) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Unable to configure DSP encoder: {}", e);
                self.active = 0;
                self.controller_started_unconfigured = true;
                return Err(e);
            }
        };

        self.controller_started_unconfigured = false;
        self.last_known = Some(config.stream_params());
        self.codec = config;
        self.phase = Phase::Started;
        self.active = 1;
        tracing::info!(
            "Playback started with {} at {} Hz",
            self.codec.codec_id(),
            self.codec.sample_rate()
        );

        self.run_post_start_actions(&*controller);
        Ok(())
    }

    /// Negotiate the reported encoder configuration and program the DSP
    fn configure_encoder(&mut self, controller: &dyn A2dpController) -> Result<CodecConfig> {
        let report = controller
            .encoder_config()
            .map_err(|e| OffloadError::ControllerUnavailable(format!("encoder config: {}", e)))?;
        let codec = CodecId::from_raw(report.codec_type);
        tracing::debug!(
            "Encoder config {} (multicast: {}, devices: {})",
            codec,
            report.multicast,
            report.num_devices
        );

        let ctx = NegotiationContext {
            aac_shape: AacShape::from_flags(
                self.config.aac.frame_control,
                self.config.aac.vbr_control,
            ),
            aptx_ad_extended: self.hal.mixer.has_control(controls::ENC_APTX_AD_CONFIG_BLOCK),
            last_known: self.last_known,
            imc_instance: if codec.uses_imc() {
                self.imc.allocate()
            } else {
                0
            },
        };

        let config = match negotiate(&report.blob, codec, Direction::Encode, &ctx) {
            Ok(config) => config,
            Err(NegotiationError::Unsupported { .. }) => {
                tracing::warn!("Unsupported encoder {}, no DSP configuration applied", codec);
                return Ok(CodecConfig::default());
            }
            Err(e) => return Err(e.into()),
        };

        if codec == CodecId::AptxDualMono {
            if let Some(mono) = controller.is_tws_mono_mode_enabled() {
                self.tws_mono = mono;
            }
        }

        if let Err(e) = self.write_encoder_blocks(&config) {
            advisory(
                "Encoder reset",
                self.hal.mixer.write_block(&dsp::encoder_reset_block()),
            );
            return Err(e);
        }
        Ok(config)
    }

    fn write_encoder_blocks(&self, config: &CodecConfig) -> Result<()> {
        let mixer = &*self.hal.mixer;
        if let Some(block) = dsp::encoder_block(config) {
            mixer.write_block(&block)?;
            mixer.set_enum_named(
                controls::ENC_BIT_FORMAT,
                bit_format_label(config.bits_per_sample()),
            )?;
        }
        if let Some(block) = dsp::source_decoder_block(config) {
            mixer.write_block(&block)?;
        }
        Ok(())
    }

    /// Best-effort configuration after the start has committed
    fn run_post_start_actions(&mut self, controller: &dyn A2dpController) {
        let mixer = &*self.hal.mixer;

        if self.phase != Phase::Disconnected && controller.is_scrambling_enabled() == Some(true) {
            advisory(
                "Scrambler enable",
                mixer.set_value_named(controls::SCRAMBLER_MODE, 1),
            );
        }

        self.write_tws_mode();

        let abr_enabled = self.codec.is_abr_eligible();
        match backend::configure_backend(mixer, &self.codec, abr_enabled) {
            Ok(rate) => self.backend_rate = Some(rate),
            Err(e) => tracing::warn!("Backend configuration failed: {}", e),
        }

        if abr_enabled {
            if let Err(e) = self.abr.start(&self.codec, mixer, &*self.hal.feedback) {
                tracing::warn!("ABR start failed: {}", e);
            }
        }
    }

    fn write_tws_mode(&self) {
        let label = if self.tws_mono { "One" } else { "Two" };
        tracing::debug!("TWS channel mode {}", label);
        advisory(
            "TWS channel mode",
            self.hal.mixer.set_enum_named(controls::TWS_CHANNEL_MODE, label),
        );
    }

    fn start_capture(&mut self) -> Result<()> {
        let controller = self.controller()?;

        if self.phase == Phase::Started && self.active > 0 {
            self.active += 1;
            self.configure_sink_backend();
            return Ok(());
        }

        controller.start().map_err(|e| {
            tracing::error!("Controller start capture failed: {}", e);
            OffloadError::ControllerStart(e)
        })?;

        if !controller.is_ready() {
            tracing::warn!("Sink not ready after start");
        }

        let config = match self.configure_decoder(&*controller) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Unable to configure DSP decoder: {}", e);
                self.active = 0;
                self.controller_started_unconfigured = true;
                return Err(e);
            }
        };

        self.controller_started_unconfigured = false;
        self.last_known = Some(config.stream_params());
        self.codec = config;
        self.phase = Phase::Started;
        self.active = 1;
        tracing::info!(
            "Capture started with {} at {} Hz",
            self.codec.codec_id(),
            self.codec.sample_rate()
        );

        let latency = u64::from(self.decoder_latency());
        if let Err(e) = controller.session_setup_complete(latency) {
            if !e.is_missing() {
                tracing::warn!("Sink session setup notification failed: {}", e);
            }
        }
        self.configure_sink_backend();
        Ok(())
    }

    fn configure_decoder(&self, controller: &dyn A2dpController) -> Result<CodecConfig> {
        let report = controller
            .decoder_config()
            .map_err(|e| OffloadError::ControllerUnavailable(format!("decoder config: {}", e)))?;
        let codec = CodecId::from_raw(report.codec_type);

        let config = negotiate(
            &report.blob,
            codec,
            Direction::Decode,
            &NegotiationContext::default(),
        )?;
        let block =
            dsp::sink_decoder_block(&config).ok_or(OffloadError::NegotiationUnsupported(codec))?;

        let mixer = &*self.hal.mixer;
        mixer.write_block(&block)?;
        mixer.set_enum_named(
            controls::DEC_BIT_FORMAT,
            bit_format_label(DEFAULT_BITS_PER_SAMPLE),
        )?;
        Ok(config)
    }

    fn configure_sink_backend(&mut self) {
        match backend::configure_backend(&*self.hal.mixer, &self.codec, false) {
            Ok(rate) => self.backend_rate = Some(rate),
            Err(e) => tracing::warn!("Sink backend configuration failed: {}", e),
        }
    }

    /// Encoder block, bit format and TWS mode back to defaults
    fn reset_encoder_params(&mut self) {
        let mixer = &*self.hal.mixer;
        advisory("Encoder reset", mixer.write_block(&dsp::encoder_reset_block()));
        advisory(
            "Encoder bit format reset",
            mixer.set_enum_named(
                controls::ENC_BIT_FORMAT,
                bit_format_label(DEFAULT_BITS_PER_SAMPLE),
            ),
        );
        advisory(
            "TWS channel mode reset",
            mixer.set_enum_named(controls::TWS_CHANNEL_MODE, "Two"),
        );
        self.tws_mono = false;
    }

    /// Tear down everything a source start programmed, keeping the
    /// negotiated codec.
    fn reset_codec_config(&mut self) {
        self.reset_encoder_params();

        let mixer = &*self.hal.mixer;
        advisory(
            "Feedback decoder reset",
            mixer.write_block(&dsp::source_decoder_reset_block()),
        );
        advisory(
            "Backend reset",
            backend::reset_backend(mixer, Direction::Encode, self.codec.is_abr_eligible()),
        );
        self.backend_rate = None;
        self.abr.stop(mixer, &*self.hal.feedback);
    }

    fn reset_decoder_params(&mut self) {
        let mixer = &*self.hal.mixer;
        advisory(
            "Sink decoder reset",
            mixer.write_block(&dsp::sink_decoder_reset_block()),
        );
        advisory(
            "Decoder bit format reset",
            mixer.set_enum_named(
                controls::DEC_BIT_FORMAT,
                bit_format_label(DEFAULT_BITS_PER_SAMPLE),
            ),
        );
        advisory(
            "Sink backend reset",
            backend::reset_backend(mixer, Direction::Decode, false),
        );
        self.backend_rate = None;
    }

    /// Suspend (`true`) or resume (`false`) the source stream.
    ///
    /// Suspend tears down the DSP configuration but keeps the negotiated
    /// codec and reference count, so resume can pick up where it left off.
    /// The returned [`SuspendOutcome`] still has to notify the playback
    /// use cases once the session is unlocked.
    pub fn set_suspended(&mut self, suspend: bool) -> SuspendOutcome {
        let Ok(controller) = self.controller() else {
            tracing::debug!("No {:?} controller, ignoring suspend state", self.kind);
            return SuspendOutcome::unchanged();
        };

        if suspend {
            if self.suspended {
                tracing::debug!("Already suspended");
                return SuspendOutcome::unchanged();
            }
            self.suspended = true;
            if self.phase == Phase::Disconnected {
                return SuspendOutcome::unchanged();
            }

            if !self.swb_configured {
                self.reset_codec_config();
            }
            if let Err(e) = controller.suspend() {
                if !e.is_missing() {
                    tracing::warn!("Controller suspend failed: {}", e);
                }
            }
            tracing::info!("{:?} suspended", self.kind);
            return SuspendOutcome {
                result: Ok(()),
                restore: Some(false),
            };
        }

        if !self.suspended {
            return SuspendOutcome::unchanged();
        }
        if let Err(e) = controller.clear_suspend_flag() {
            if !e.is_missing() {
                tracing::warn!("Failed to clear suspend flag: {}", e);
            }
        }
        self.suspended = false;

        // Consumers that never stopped while suspended need the stream back
        let mut result = Ok(());
        if self.active > 0 {
            tracing::debug!("Restarting controller after suspend");
            if let Err(e) = controller.start() {
                tracing::error!("Controller start after suspend failed: {}", e);
                if self.phase == Phase::Started {
                    self.phase = Phase::Stopped;
                }
                result = Err(OffloadError::ControllerStart(e));
            }
        }

        tracing::info!("{:?} resumed", self.kind);
        SuspendOutcome {
            result,
            restore: Some(true),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Routing should force a device switch during a handoff or while no
    /// stream is running.
    pub fn is_force_device_switch(&self) -> bool {
        self.handoff || self.phase != Phase::Started
    }

    pub fn set_handoff_mode(&mut self, on: bool) {
        self.handoff = on;
        if on {
            if let Ok(controller) = self.controller() {
                if let Err(e) = controller.handoff_triggered() {
                    if !e.is_missing() {
                        tracing::warn!("Handoff notification failed: {}", e);
                    }
                }
            }
        }
    }

    /// Offload is usable and the controller reports a ready link
    pub fn is_ready(&self) -> bool {
        if self.suspended
            || self.phase == Phase::Disconnected
            || !self.config.is_offload_enabled()
        {
            return false;
        }
        self.controller().map(|c| c.is_ready()).unwrap_or(false)
    }

    /// Playback latency in milliseconds
    pub fn encoder_latency(&self) -> u32 {
        let reported = self.controller().ok().and_then(|c| c.latency());
        latency::encoder_latency(self.codec.codec_id(), reported, &self.config.latency)
    }

    /// Capture latency in milliseconds
    pub fn decoder_latency(&self) -> u32 {
        latency::decoder_latency(self.codec.codec_id())
    }

    pub fn sample_rate(&self) -> u32 {
        self.codec.sample_rate()
    }

    /// Select mono or dual-mono TWS playback
    pub fn set_tws_mono_mode(&mut self, mono: bool) {
        self.tws_mono = mono;
        self.write_tws_mode();
    }

    /// Run the SWB voice codec on the source backend
    pub fn configure_swb(&mut self, speech_mode: u32) -> Result<()> {
        if self.swb_configured {
            tracing::debug!("SWB already configured");
            return Ok(());
        }

        let config = CodecConfig::AptxAdaptiveSpeech(SpeechConfig { speech_mode });
        self.write_encoder_blocks(&config)?;

        self.codec = config;
        let mixer = &*self.hal.mixer;
        match backend::configure_backend(mixer, &self.codec, true) {
            Ok(rate) => self.backend_rate = Some(rate),
            Err(e) => tracing::warn!("SWB backend configuration failed: {}", e),
        }
        if let Err(e) = self.abr.start(&self.codec, mixer, &*self.hal.feedback) {
            tracing::warn!("SWB feedback start failed: {}", e);
        }

        self.swb_configured = true;
        tracing::info!("SWB configured (speech mode {})", speech_mode);
        Ok(())
    }

    pub fn reset_swb(&mut self) {
        if !self.swb_configured {
            return;
        }
        self.reset_codec_config();
        self.codec = CodecConfig::default();
        self.swb_configured = false;
        tracing::info!("SWB reset");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            kind: self.kind,
            phase: self.phase,
            codec: self.codec.codec_id(),
            sample_rate: self.codec.sample_rate(),
            channels: self.codec.channels(),
            active_requests: self.active,
            suspended: self.suspended,
            handoff: self.handoff,
            swb_configured: self.swb_configured,
            tws_mono: self.tws_mono,
            abr_started: self.abr.is_started(),
            backend_rate: self.backend_rate,
        }
    }
}

/// Handles wired to every part of a mock HAL
#[cfg(test)]
pub(crate) fn mock_handles(hal: &a2dp_offload_hal::mock::MockHal) -> OffloadHal {
    OffloadHal::new(hal.mixer.clone(), hal.feedback.clone(), hal.router.clone())
        .with_source(hal.source.clone())
        .with_sink(hal.sink.clone())
}
