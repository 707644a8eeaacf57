//! Adaptive bit rate (ABR) feedback channel
//!
//! While an ABR capable codec is streaming, the Bluetooth chip reports link
//! quality to the encoder over a hostless capture front end (transmit). The SWB
//! speech codec additionally needs the playback front end (receive).

use crate::codec::dsp::SPEECH_IMC_INSTANCE;
use crate::codec::{CodecConfig, CodecId};
use crate::mixer_ext::MixerExt;
use a2dp_offload_hal::{
    ABR_FEEDBACK_PCM, FeedbackDirection, FeedbackHandle, FeedbackPath, HalError, Mixer, controls,
};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Highest IMC instance id handed out; the counter counts down from here
pub const IMC_INSTANCE_MAX: u32 = u32::MAX / 2;

#[derive(Debug, Error)]
pub enum AbrError {
    #[error("Codec {0} does not support ABR feedback")]
    NotEligible(CodecId),

    #[error("Feedback switch write failed: {0}")]
    Mixer(HalError),

    #[error("Feedback path failed: {0}")]
    Feedback(HalError),
}

/// Process-wide source of IMC instance ids pairing an encoder with its
/// feedback decoder.
#[derive(Debug)]
pub struct ImcInstanceAllocator {
    next: AtomicU32,
}

impl Default for ImcInstanceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ImcInstanceAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(IMC_INSTANCE_MAX),
        }
    }

    /// Hand out the next id, wrapping back to [`IMC_INSTANCE_MAX`] once the
    /// counter is exhausted.
    pub fn allocate(&self) -> u32 {
        let normalize = |id: u32| {
            if id == 0 || id > IMC_INSTANCE_MAX {
                IMC_INSTANCE_MAX
            } else {
                id
            }
        };
        let prev = match self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| {
                Some(normalize(id) - 1)
            }) {
            Ok(id) | Err(id) => id,
        };
        normalize(prev)
    }
}

fn imc_instance(config: &CodecConfig) -> u32 {
    match config {
        CodecConfig::AptxAdaptive(c) => c.imc_instance,
        CodecConfig::Ldac(c) => c.imc_instance,
        CodecConfig::AptxAdaptiveSpeech(_) => SPEECH_IMC_INSTANCE,
        _ => 0,
    }
}

/// Feedback channel owned by the source session
#[derive(Debug, Default)]
pub struct AbrController {
    tx: Option<FeedbackHandle>,
    rx: Option<FeedbackHandle>,
    instance: u32,
    started: bool,
}

impl AbrController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// IMC instance of the running feedback channel, zero when stopped
    pub fn instance(&self) -> u32 {
        self.instance
    }

    pub fn has_receive_path(&self) -> bool {
        self.rx.is_some()
    }

    /// Enable the feedback switches and open the feedback front ends.
    ///
    /// A no-op when already started. On failure everything opened so far is
    /// torn down again.
    pub fn start(
        &mut self,
        config: &CodecConfig,
        mixer: &dyn Mixer,
        feedback: &dyn FeedbackPath,
    ) -> Result<(), AbrError> {
        if self.started {
            return Ok(());
        }
        if !config.is_abr_eligible() {
            return Err(AbrError::NotEligible(config.codec_id()));
        }

        mixer
            .set_value_named(controls::ABR_TX_FEEDBACK_PATH, 1)
            .map_err(AbrError::Mixer)?;

        if let Err(e) = self.open_paths(config, mixer, feedback) {
            tracing::error!("ABR start failed: {}", e);
            self.teardown(mixer, feedback);
            return Err(e);
        }

        self.instance = imc_instance(config);
        self.started = true;
        tracing::info!(
            "ABR started for {} (instance {})",
            config.codec_id(),
            self.instance
        );
        Ok(())
    }

    fn open_paths(
        &mut self,
        config: &CodecConfig,
        mixer: &dyn Mixer,
        feedback: &dyn FeedbackPath,
    ) -> Result<(), AbrError> {
        mixer
            .set_value_named(controls::SET_FEEDBACK_CHANNEL, 1)
            .map_err(AbrError::Mixer)?;
        self.tx = Some(
            feedback
                .open(FeedbackDirection::Transmit, &ABR_FEEDBACK_PCM)
                .map_err(AbrError::Feedback)?,
        );

        if config.codec_id() == CodecId::AptxAdaptiveSpeech {
            mixer
                .set_value_named(controls::ABR_RX_FEEDBACK_PATH, 1)
                .map_err(AbrError::Mixer)?;
            mixer
                .set_value_named(controls::SET_FEEDBACK_CHANNEL, 1)
                .map_err(AbrError::Mixer)?;
            self.rx = Some(
                feedback
                    .open(FeedbackDirection::Receive, &ABR_FEEDBACK_PCM)
                    .map_err(AbrError::Feedback)?,
            );
        }
        Ok(())
    }

    /// Close the feedback front ends and disable the switches
    pub fn stop(&mut self, mixer: &dyn Mixer, feedback: &dyn FeedbackPath) {
        if !self.started {
            return;
        }
        self.teardown(mixer, feedback);
        tracing::info!("ABR stopped");
    }

    fn teardown(&mut self, mixer: &dyn Mixer, feedback: &dyn FeedbackPath) {
        if let Some(handle) = self.tx.take() {
            feedback.close(handle);
        }
        if let Some(handle) = self.rx.take() {
            feedback.close(handle);
        }
        self.instance = 0;
        self.started = false;

        for (control, value) in [
            (controls::SET_FEEDBACK_CHANNEL, 0),
            (controls::ABR_TX_FEEDBACK_PATH, 0),
            (controls::ABR_RX_FEEDBACK_PATH, 0),
        ] {
            if let Err(e) = mixer.set_value_named(control, value) {
                tracing::warn!("Failed to reset {}: {}", control, e);
            }
        }
    }
}
