//! Hardware Abstraction Layer (HAL) for the A2DP offload core
//!
//! The session manager never talks to hardware directly. Everything it needs from
//! the outside world goes through the narrow interfaces defined here:
//!
//! - [`A2dpController`]: the Bluetooth stack's IPC library (source or sink side)
//! - [`Mixer`]: the named-control plane used to program the DSP and the backend
//! - [`FeedbackPath`]: hostless PCM handles carrying ABR link-quality feedback
//! - [`PlaybackRouter`]: the audio server's view of active playback use cases
//!
//! The [`mock`] module provides in-memory implementations of all of them.
//!
//! # Example
//!
//! ```no_run
//! use a2dp_offload_hal::mock::{MockHal, MockProfile};
//! use a2dp_offload_hal::{controls, Mixer};
//!
//! fn main() -> anyhow::Result<()> {
//!     let hal = MockHal::new(MockProfile::Standard);
//!     let ctl = hal.mixer.control(controls::ENC_BIT_FORMAT).expect("control exists");
//!     hal.mixer.set_enum(ctl, "S16_LE")?;
//!     Ok(())
//! }
//! ```

pub mod controller;
pub mod controls;
pub mod feedback;
pub mod mixer;
pub mod mock;
pub mod routing;

pub use controller::{
    A2dpController, ControllerError, ControllerResult, DecoderConfigReport, EncoderConfigReport,
};
pub use feedback::{
    ABR_FEEDBACK_PCM, FeedbackDirection, FeedbackHandle, FeedbackPath, FeedbackPcmConfig,
    PcmFormat,
};
pub use mixer::{ControlId, Mixer};
pub use routing::{PlaybackRouter, UsecaseId};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HalError {
    #[error("Mixer control not found: {0}")]
    ControlNotFound(String),

    #[error("Mixer write rejected on {control}: {reason}")]
    WriteRejected { control: String, reason: String },

    #[error("Failed to open {0:?} feedback path: {1}")]
    FeedbackOpen(FeedbackDirection, String),
}

/// HAL Result type
pub type Result<T> = std::result::Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hal_error_display() {
        let err = HalError::ControlNotFound("BT SampleRate RX".into());
        assert!(err.to_string().contains("BT SampleRate RX"));

        let err = HalError::FeedbackOpen(FeedbackDirection::Receive, "busy".into());
        assert!(err.to_string().contains("Receive"));
    }
}
