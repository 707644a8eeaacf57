//! Hostless PCM handles for the ABR feedback channel

use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackDirection {
    /// Link-quality telemetry from the Bluetooth chip to the DSP (capture)
    Transmit,
    /// Speech return path towards the Bluetooth chip (playback)
    Receive,
}

/// Sample format of a feedback PCM; the DSP front end only runs 16-bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PcmFormat {
    S16Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackPcmConfig {
    pub channels: u16,
    pub rate: u32,
    pub period_size: u32,
    pub period_count: u32,
    pub format: PcmFormat,
}

/// PCM parameters of the ABR feedback front end
pub const ABR_FEEDBACK_PCM: FeedbackPcmConfig = FeedbackPcmConfig {
    channels: 1,
    rate: 8000,
    period_size: 240,
    period_count: 2,
    format: PcmFormat::S16Le,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedbackHandle(pub u32);

/// Opens and closes feedback front ends.
///
/// `open` must leave the handle prepared and started; a handle that fails to
/// start must be released by the implementation before returning the error.
pub trait FeedbackPath: Send + Sync {
    fn open(
        &self,
        direction: FeedbackDirection,
        config: &FeedbackPcmConfig,
    ) -> Result<FeedbackHandle>;

    fn close(&self, handle: FeedbackHandle);
}
