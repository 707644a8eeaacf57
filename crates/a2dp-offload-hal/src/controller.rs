//! Bluetooth stack IPC interface
//!
//! The vendor Bluetooth library is resolved at runtime, so any individual entry
//! point may be missing. Optional entry points therefore have default bodies that
//! report [`ControllerError::Missing`]; callers treat that as "capability absent"
//! rather than as a failure of the whole session.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("Controller entry point not available: {0}")]
    Missing(&'static str),

    #[error("Controller call returned status {0}")]
    Status(i32),
}

impl ControllerError {
    /// True when the failure only means the entry point was never resolved
    pub fn is_missing(&self) -> bool {
        matches!(self, ControllerError::Missing(_))
    }
}

pub type ControllerResult<T> = std::result::Result<T, ControllerError>;

/// Encoder configuration as reported by the Bluetooth stack.
///
/// `blob` is the in-memory image of the stack's codec configuration struct and is
/// interpreted according to `codec_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderConfigReport {
    pub codec_type: u32,
    pub multicast: bool,
    pub num_devices: u8,
    pub blob: Vec<u8>,
}

/// Decoder configuration as reported by the Bluetooth stack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderConfigReport {
    pub codec_type: u32,
    pub blob: Vec<u8>,
}

/// Control path into the Bluetooth stack for one direction
pub trait A2dpController: Send + Sync {
    /// Open the control path after the remote device connected
    fn open(&self) -> ControllerResult<()>;

    /// Close the control path. `Ok(false)` means the stack refused the close.
    fn close(&self) -> ControllerResult<bool>;

    /// Start streaming on the controller side
    fn start(&self) -> ControllerResult<()>;

    /// Stop streaming on the controller side
    fn stop(&self) -> ControllerResult<()>;

    fn suspend(&self) -> ControllerResult<()> {
        Err(ControllerError::Missing("suspend"))
    }

    fn encoder_config(&self) -> ControllerResult<EncoderConfigReport> {
        Err(ControllerError::Missing("encoder_config"))
    }

    fn decoder_config(&self) -> ControllerResult<DecoderConfigReport> {
        Err(ControllerError::Missing("decoder_config"))
    }

    fn is_ready(&self) -> bool {
        false
    }

    /// Sink-side latency in milliseconds, if the stack reports one
    fn latency(&self) -> Option<u16> {
        None
    }

    /// Clear the stack's pending "suspended" flag once audio resumes
    fn clear_suspend_flag(&self) -> ControllerResult<()> {
        Err(ControllerError::Missing("clear_suspend_flag"))
    }

    fn handoff_triggered(&self) -> ControllerResult<()> {
        Err(ControllerError::Missing("handoff_triggered"))
    }

    fn is_scrambling_enabled(&self) -> Option<bool> {
        None
    }

    fn is_tws_mono_mode_enabled(&self) -> Option<bool> {
        None
    }

    /// Tell the sink-side stack that the capture session is configured
    fn session_setup_complete(&self, _system_latency_ms: u64) -> ControllerResult<()> {
        Err(ControllerError::Missing("session_setup_complete"))
    }
}
