//! Session error taxonomy

use crate::abr::AbrError;
use crate::codec::{CodecId, NegotiationError};
use a2dp_offload_hal::{ControllerError, HalError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OffloadError {
    #[error("Bluetooth controller unavailable: {0}")]
    ControllerUnavailable(String),

    #[error("Controller start failed: {0}")]
    ControllerStart(ControllerError),

    #[error("Controller stop failed: {0}")]
    ControllerStop(ControllerError),

    #[error("Codec {0} is not supported for offload")]
    NegotiationUnsupported(CodecId),

    #[error("Malformed codec configuration: {0}")]
    NegotiationMalformed(String),

    #[error("DSP configuration write failed: {0}")]
    ConfigWriteFailed(#[from] HalError),

    /// Not a failure: retry once the session resumes
    #[error("Session is suspended, retry after resume")]
    SuspendedRetry,

    #[error("Codec {0} is not eligible for ABR")]
    AbrNotEligible(CodecId),

    #[error("Stop without a matching start")]
    ReferenceCountUnderflow,

    #[error("A2DP offload is disabled")]
    OffloadDisabled,

    #[error("ABR feedback error: {0}")]
    Abr(AbrError),
}

impl From<AbrError> for OffloadError {
    fn from(err: AbrError) -> Self {
        match err {
            AbrError::NotEligible(codec) => OffloadError::AbrNotEligible(codec),
            other => OffloadError::Abr(other),
        }
    }
}

impl From<NegotiationError> for OffloadError {
    fn from(err: NegotiationError) -> Self {
        match err {
            NegotiationError::Unsupported { codec, .. } => OffloadError::NegotiationUnsupported(codec),
            malformed @ NegotiationError::Malformed { .. } => {
                OffloadError::NegotiationMalformed(malformed.to_string())
            }
        }
    }
}

impl OffloadError {
    /// The caller should retry the same request later
    pub fn is_retry(&self) -> bool {
        matches!(self, OffloadError::SuspendedRetry)
    }
}

/// Session Result type
pub type Result<T> = std::result::Result<T, OffloadError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Direction;

    #[test]
    fn test_abr_error_conversion() {
        let err: OffloadError = AbrError::NotEligible(CodecId::Sbc).into();
        assert!(matches!(err, OffloadError::AbrNotEligible(CodecId::Sbc)));

        let err: OffloadError =
            AbrError::Mixer(HalError::ControlNotFound("BT set feedback channel".into())).into();
        assert!(matches!(err, OffloadError::Abr(_)));
    }

    #[test]
    fn test_negotiation_error_conversion() {
        let err: OffloadError = NegotiationError::Unsupported {
            codec: CodecId::Celt,
            direction: Direction::Decode,
        }
        .into();
        assert!(matches!(err, OffloadError::NegotiationUnsupported(CodecId::Celt)));

        let err: OffloadError = NegotiationError::Malformed {
            codec: CodecId::Sbc,
            reason: "subbands 3".into(),
        }
        .into();
        assert!(err.to_string().contains("subbands 3"));
    }

    #[test]
    fn test_retry_signal() {
        assert!(OffloadError::SuspendedRetry.is_retry());
        assert!(!OffloadError::OffloadDisabled.is_retry());
    }
}
