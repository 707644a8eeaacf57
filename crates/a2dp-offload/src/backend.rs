//! Bluetooth backend (slimbus port) rate and channel configuration
//!
//! Some codecs run the port at twice the stream rate: the LDAC and aptX
//! Adaptive encoders, and the SBC and AAC sink decoders, all at 44.1 or 48 kHz.
//! PCM passthrough never touches the backend.

use crate::codec::{CodecConfig, CodecId, Direction};
use crate::mixer_ext::MixerExt;
use a2dp_offload_hal::{HalError, Mixer, controls};
use serde::Serialize;

/// Rate written to the backend controls on reset
pub const RESET_RATE_LABEL: &str = "KHZ_8";
/// Channel label written to the AFE channel controls on reset
pub const RESET_CHANNEL_LABEL: &str = "Zero";

/// A backend port rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackendRate {
    pub hz: u32,
}

impl BackendRate {
    pub const KHZ_8: BackendRate = BackendRate { hz: 8000 };
    pub const KHZ_96: BackendRate = BackendRate { hz: 96_000 };

    /// Enumerated label understood by the rate controls
    pub fn label(self) -> &'static str {
        match self.hz {
            8000 => "KHZ_8",
            44100 => "KHZ_44P1",
            88200 => "KHZ_88P2",
            96000 => "KHZ_96",
            _ => "KHZ_48",
        }
    }
}

fn doubles(codec: CodecId, direction: Direction) -> bool {
    match direction {
        Direction::Encode => matches!(codec, CodecId::Ldac | CodecId::AptxAdaptive),
        Direction::Decode => matches!(codec, CodecId::Sbc | CodecId::Aac),
    }
}

/// Port rate for a stream at `reported_rate`
pub fn resolve_backend_rate(codec: CodecId, direction: Direction, reported_rate: u32) -> BackendRate {
    let hz = match reported_rate {
        44100 | 48000 if doubles(codec, direction) => reported_rate * 2,
        44100 | 48000 | 88200 | 96000 => reported_rate,
        _ => 48000,
    };
    BackendRate { hz }
}

/// Transmit tap rate while ABR feedback is running
pub fn abr_tx_rate(codec: CodecId) -> BackendRate {
    if codec == CodecId::AptxAdaptiveSpeech {
        BackendRate::KHZ_96
    } else {
        BackendRate::KHZ_8
    }
}

pub fn channel_label(channels: u16) -> &'static str {
    if channels == 1 { "One" } else { "Two" }
}

fn rate_control(mixer: &dyn Mixer, direction: Direction) -> Option<&'static str> {
    let preferred = match direction {
        Direction::Encode => controls::SAMPLE_RATE_RX,
        Direction::Decode => controls::SINK_SAMPLE_RATE,
    };
    [preferred, controls::SAMPLE_RATE_DEFAULT]
        .into_iter()
        .find(|name| mixer.has_control(name))
}

fn channel_control(direction: Direction) -> &'static str {
    match direction {
        Direction::Encode => controls::AFE_IN_CHANNELS,
        Direction::Decode => controls::AFE_SINK_CHANNELS,
    }
}

/// Program the backend for a negotiated configuration.
///
/// `abr_enabled` also programs the source transmit tap, which only exists
/// alongside the split Rx/Tx rate controls.
pub fn configure_backend(
    mixer: &dyn Mixer,
    config: &CodecConfig,
    abr_enabled: bool,
) -> a2dp_offload_hal::Result<BackendRate> {
    let codec = config.codec_id();
    let direction = config.direction();
    let rate = resolve_backend_rate(codec, direction, config.sample_rate());

    if codec == CodecId::Pcm {
        tracing::debug!("PCM passthrough, backend left untouched");
        return Ok(rate);
    }

    let control = rate_control(mixer, direction)
        .ok_or_else(|| HalError::ControlNotFound(controls::SAMPLE_RATE_DEFAULT.into()))?;
    tracing::debug!("Backend {:?} rate {} on {}", direction, rate.label(), control);
    mixer.set_enum_named(control, rate.label())?;

    if direction == Direction::Encode && abr_enabled && control == controls::SAMPLE_RATE_RX {
        let tx = abr_tx_rate(codec);
        tracing::debug!("Backend tx rate {}", tx.label());
        mixer.set_enum_named(controls::SOURCE_SAMPLE_RATE_TX, tx.label())?;
    }

    let channels = channel_label(config.channels());
    match mixer.control(channel_control(direction)) {
        Some(ctl) => mixer.set_enum(ctl, channels)?,
        None => tracing::error!("AFE channel control not found for {:?}", direction),
    }

    Ok(rate)
}

/// Return the backend to its idle rate and channel count
pub fn reset_backend(
    mixer: &dyn Mixer,
    direction: Direction,
    abr_enabled: bool,
) -> a2dp_offload_hal::Result<()> {
    let control = rate_control(mixer, direction)
        .ok_or_else(|| HalError::ControlNotFound(controls::SAMPLE_RATE_DEFAULT.into()))?;
    mixer.set_enum_named(control, RESET_RATE_LABEL)?;

    if abr_enabled && control != controls::SAMPLE_RATE_DEFAULT {
        mixer.set_enum_named(controls::SOURCE_SAMPLE_RATE_TX, RESET_RATE_LABEL)?;
    }

    mixer.set_enum_named(channel_control(direction), RESET_CHANNEL_LABEL)
}
