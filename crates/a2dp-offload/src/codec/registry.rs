//! Codec capability registry
//!
//! Turns the configuration image reported by the Bluetooth stack into a typed
//! [`CodecConfig`]. The registry is pure: everything that depends on session or
//! platform state arrives through [`NegotiationContext`]: AAC feature flags,
//! whether the extended aptX Adaptive control exists, last-known stream
//! parameters and the IMC instance.
//!
//! # Stack configuration layouts
//!
//! All little-endian with natural C alignment (`_` marks padding).
//!
//! | Codec | Layout |
//! |---|---|
//! | SBC | `u32 subbands, u32 block_len, u16 rate, u8 channel_mode, u8 alloc, u8 min_bitpool, u8 max_bitpool, _2, u32 bitrate, u32 bits` |
//! | aptX / aptX-HD | `u16 rate, u8 channels, _1, u32 bitrate, u32 bits` |
//! | aptX dual mono | `u16 rate, u8 channels, _1, u32 bitrate, u32 sync_mode, u32 bits` |
//! | aptX Adaptive | `u32 freq, u32 mtu, i32 channel_mode, u32 sink_modes[6], u32 encoder_mode, u8 ttp[6], _2, u32 bits, u32 input_mode, u32 fade, u8 sink_cap[11]` |
//! | AAC | `u32 mode, u16 format_flag, u16 channels, u32 rate, u32 bitrate, u32 bits` |
//! | AAC + frame control | AAC, `u32 type, u32 value` |
//! | AAC + VBR | AAC + frame control, `u8 vbr_present, _3, u32 type, u32 value` |
//! | CELT | `u32 rate, u16 channels, u16 frame_size, u16 complexity, u16 prediction, u16 vbr, _2, u32 bitrate, u32 bits` |
//! | LDAC | `u32 rate, u32 bitrate, u16 channel_mode, u16 mtu, u32 bits, u8 abr, _3, u32 num_levels, {u32 level, u32 bitrate}[5]` |
//! | SBC decoder | `u16 channels, _2, u32 rate` |
//! | AAC decoder | `u16 format_flag, u16 object_type, u16 channels, u16 pce_bits, u32 rate` |

use super::blob::{BlobReader, Truncated};
use super::{
    AacConfig, AacDecoderConfig, AacObjectType, AptxAdaptiveConfig, AptxAdaptiveExtension,
    AptxConfig, BitrateLevel, CeltConfig, CodecConfig, CodecId, Direction, FrameControl,
    LdacConfig, SbcAllocation, SbcChannelMode, SbcConfig, SbcDecoderConfig,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound of the ABR quality level table
pub const MAX_ABR_QUALITY_LEVELS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("{codec} is not supported for {direction:?} offload")]
    Unsupported { codec: CodecId, direction: Direction },

    #[error("Malformed {codec} configuration: {reason}")]
    Malformed { codec: CodecId, reason: String },
}

impl NegotiationError {
    fn malformed(codec: CodecId, reason: impl Into<String>) -> Self {
        NegotiationError::Malformed {
            codec,
            reason: reason.into(),
        }
    }

    fn truncated(codec: CodecId) -> impl Fn(Truncated) -> Self {
        move |t| {
            Self::malformed(
                codec,
                format!("blob is {} bytes, layout needs {}", t.available, t.needed),
            )
        }
    }
}

/// Sample rate and channel count of the last configured stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamParams {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

/// Which AAC configuration layout the stack reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AacShape {
    #[default]
    Plain,
    FrameControl,
    Vbr,
}

impl AacShape {
    /// VBR wins over frame control
    pub fn from_flags(frame_control: bool, vbr_control: bool) -> Self {
        if vbr_control {
            AacShape::Vbr
        } else if frame_control {
            AacShape::FrameControl
        } else {
            AacShape::Plain
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NegotiationContext {
    pub aac_shape: AacShape,
    /// Platform exposes the extended aptX Adaptive encoder block
    pub aptx_ad_extended: bool,
    /// Resolves the aptX Adaptive "unchanged" values
    pub last_known: Option<StreamParams>,
    pub imc_instance: u32,
}

/// Negotiate a codec configuration from a stack configuration image
pub fn negotiate(
    blob: &[u8],
    codec: CodecId,
    direction: Direction,
    ctx: &NegotiationContext,
) -> Result<CodecConfig, NegotiationError> {
    match (direction, codec) {
        (Direction::Encode, CodecId::Pcm) => Ok(CodecConfig::Pcm(StreamParams::default())),
        (Direction::Encode, CodecId::Sbc) => parse_sbc(blob).map(CodecConfig::Sbc),
        (Direction::Encode, CodecId::Aac) => parse_aac(blob, ctx.aac_shape).map(CodecConfig::Aac),
        (Direction::Encode, CodecId::Aptx) => parse_aptx(blob, codec, false).map(CodecConfig::Aptx),
        (Direction::Encode, CodecId::AptxDualMono) => {
            parse_aptx(blob, codec, true).map(CodecConfig::Aptx)
        }
        (Direction::Encode, CodecId::AptxHd) => {
            parse_aptx(blob, codec, false).map(CodecConfig::AptxHd)
        }
        (Direction::Encode, CodecId::AptxAdaptive) => {
            parse_aptx_adaptive(blob, ctx).map(CodecConfig::AptxAdaptive)
        }
        (Direction::Encode, CodecId::Ldac) => {
            parse_ldac(blob, ctx.imc_instance).map(CodecConfig::Ldac)
        }
        (Direction::Encode, CodecId::Celt) => parse_celt(blob).map(CodecConfig::Celt),
        (Direction::Decode, CodecId::Sbc) => parse_sbc_decoder(blob).map(CodecConfig::SbcDecoder),
        (Direction::Decode, CodecId::Aac) => parse_aac_decoder(blob).map(CodecConfig::AacDecoder),
        _ => Err(NegotiationError::Unsupported { codec, direction }),
    }
}

fn parse_sbc(blob: &[u8]) -> Result<SbcConfig, NegotiationError> {
    let codec = CodecId::Sbc;
    let err = NegotiationError::truncated(codec);
    let mut r = BlobReader::new(blob);

    let subbands = r.u32().map_err(&err)?;
    let block_len = r.u32().map_err(&err)?;
    let sample_rate = r.u16().map_err(&err)?;
    let channel_mode = r.u8().map_err(&err)?;
    let allocation = r.u8().map_err(&err)?;
    let min_bitpool = r.u8().map_err(&err)?;
    let max_bitpool = r.u8().map_err(&err)?;
    let bitrate = r.u32().map_err(&err)?;
    let bits_per_sample = r.u32().map_err(&err)?;

    if !matches!(subbands, 4 | 8) {
        return Err(NegotiationError::malformed(
            codec,
            format!("unsupported subband count {}", subbands),
        ));
    }
    if !matches!(block_len, 4 | 8 | 12 | 16) {
        return Err(NegotiationError::malformed(
            codec,
            format!("unsupported block length {}", block_len),
        ));
    }
    let channel_mode = match channel_mode {
        0 => SbcChannelMode::Mono,
        1 => SbcChannelMode::DualMono,
        2 => SbcChannelMode::Stereo,
        3 => SbcChannelMode::JointStereo,
        other => {
            return Err(NegotiationError::malformed(
                codec,
                format!("unsupported channel mode {}", other),
            ));
        }
    };
    let allocation = match allocation {
        0 => SbcAllocation::Loudness,
        1 => SbcAllocation::Snr,
        other => {
            return Err(NegotiationError::malformed(
                codec,
                format!("unsupported allocation method {}", other),
            ));
        }
    };

    Ok(SbcConfig {
        subbands,
        block_len,
        sample_rate: u32::from(sample_rate),
        channel_mode,
        allocation,
        min_bitpool,
        max_bitpool,
        bitrate,
        bits_per_sample,
    })
}

fn parse_aac(blob: &[u8], shape: AacShape) -> Result<AacConfig, NegotiationError> {
    let err = NegotiationError::truncated(CodecId::Aac);
    let mut r = BlobReader::new(blob);

    let mode = r.u32().map_err(&err)?;
    let format_flag = r.u16().map_err(&err)?;
    let channels = r.u16().map_err(&err)?;
    let sample_rate = r.u32().map_err(&err)?;
    let bitrate = r.u32().map_err(&err)?;
    let bits_per_sample = r.u32().map_err(&err)?;

    let mut config = AacConfig {
        object_type: AacObjectType::from_mode(mode),
        format_flag,
        channels,
        sample_rate,
        bitrate,
        bits_per_sample,
        frame_control: None,
        vbr_control: None,
    };

    if shape != AacShape::Plain {
        config.frame_control = Some(FrameControl {
            control_type: r.u32().map_err(&err)?,
            value: r.u32().map_err(&err)?,
        });
    }

    if shape == AacShape::Vbr {
        let present = r.u8().map_err(&err)? != 0;
        let control_type = r.u32().map_err(&err)?;
        let value = r.u32().map_err(&err)?;
        config.vbr_control = Some(if present {
            FrameControl {
                control_type,
                value,
            }
        } else {
            tracing::warn!("AAC VBR control absent, falling back to defaults");
            FrameControl::default()
        });
    }

    Ok(config)
}

fn parse_aptx(blob: &[u8], codec: CodecId, dual_mono: bool) -> Result<AptxConfig, NegotiationError> {
    let err = NegotiationError::truncated(codec);
    let mut r = BlobReader::new(blob);

    let sample_rate = r.u16().map_err(&err)?;
    let channels = r.u8().map_err(&err)?;
    let bitrate = r.u32().map_err(&err)?;
    let sync_mode = if dual_mono {
        Some(r.u32().map_err(&err)?)
    } else {
        None
    };
    let bits_per_sample = r.u32().map_err(&err)?;

    Ok(AptxConfig {
        sample_rate: u32::from(sample_rate),
        channels: u16::from(channels),
        bitrate,
        bits_per_sample,
        sync_mode,
    })
}

const APTX_AD_CHANNEL_UNCHANGED: i32 = -1;
const APTX_AD_CHANNEL_MONO: i32 = 1;
const APTX_AD_SR_UNCHANGED: u32 = 0;
const APTX_AD_SR_44_1: u32 = 2;
const APTX_AD_SR_96: u32 = 3;

fn parse_aptx_adaptive(
    blob: &[u8],
    ctx: &NegotiationContext,
) -> Result<AptxAdaptiveConfig, NegotiationError> {
    let err = NegotiationError::truncated(CodecId::AptxAdaptive);
    let mut r = BlobReader::new(blob);

    let sampling_freq = r.u32().map_err(&err)?;
    let mtu = r.u32().map_err(&err)?;
    let channel_mode = r.i32().map_err(&err)?;
    let mut sink_modes = [0u32; 6];
    for mode in sink_modes.iter_mut() {
        *mode = r.u32().map_err(&err)?;
    }
    let encoder_mode = r.u32().map_err(&err)?;
    let time_to_play = r.bytes::<6>().map_err(&err)?;
    let bits_per_sample = r.u32().map_err(&err)?;

    let extension = if ctx.aptx_ad_extended {
        Some(AptxAdaptiveExtension {
            input_mode: r.u32().map_err(&err)?,
            fade_duration: r.u32().map_err(&err)?,
            sink_capability: r.bytes::<11>().map_err(&err)?,
        })
    } else {
        None
    };

    let last_known = ctx.last_known.unwrap_or_default();
    let channels = match channel_mode {
        APTX_AD_CHANNEL_UNCHANGED => last_known.channels,
        APTX_AD_CHANNEL_MONO => 1,
        _ => 2,
    };
    let sample_rate = match sampling_freq {
        APTX_AD_SR_UNCHANGED => last_known.sample_rate,
        APTX_AD_SR_44_1 => 44_100,
        APTX_AD_SR_96 if extension.is_some() => 96_000,
        _ => 48_000,
    };

    Ok(AptxAdaptiveConfig {
        sample_rate,
        channels,
        sampling_freq,
        channel_mode,
        mtu,
        sink_modes,
        encoder_mode,
        time_to_play,
        bits_per_sample,
        extension,
        imc_instance: ctx.imc_instance,
    })
}

fn parse_ldac(blob: &[u8], imc_instance: u32) -> Result<LdacConfig, NegotiationError> {
    let codec = CodecId::Ldac;
    let err = NegotiationError::truncated(codec);
    let mut r = BlobReader::new(blob);

    let sample_rate = r.u32().map_err(&err)?;
    let bitrate = r.u32().map_err(&err)?;
    let channel_mode = r.u16().map_err(&err)?;
    let mtu = r.u16().map_err(&err)?;
    let bits_per_sample = r.u32().map_err(&err)?;
    let abr_enabled = r.u8().map_err(&err)? != 0;
    let num_levels = r.u32().map_err(&err)? as usize;

    if num_levels > MAX_ABR_QUALITY_LEVELS {
        return Err(NegotiationError::malformed(
            codec,
            format!("{} quality levels, at most {}", num_levels, MAX_ABR_QUALITY_LEVELS),
        ));
    }

    let mut table = Vec::with_capacity(MAX_ABR_QUALITY_LEVELS);
    for _ in 0..MAX_ABR_QUALITY_LEVELS {
        table.push(BitrateLevel {
            link_quality: r.u32().map_err(&err)?,
            bitrate: r.u32().map_err(&err)?,
        });
    }
    table.truncate(num_levels);

    Ok(LdacConfig {
        sample_rate,
        bitrate,
        channel_mode,
        mtu,
        bits_per_sample,
        abr_enabled,
        levels: table,
        imc_instance,
    })
}

fn parse_celt(blob: &[u8]) -> Result<CeltConfig, NegotiationError> {
    let err = NegotiationError::truncated(CodecId::Celt);
    let mut r = BlobReader::new(blob);

    Ok(CeltConfig {
        sample_rate: r.u32().map_err(&err)?,
        channels: r.u16().map_err(&err)?,
        frame_size: r.u16().map_err(&err)?,
        complexity: r.u16().map_err(&err)?,
        prediction_mode: r.u16().map_err(&err)?,
        vbr_flag: r.u16().map_err(&err)?,
        bitrate: r.u32().map_err(&err)?,
        bits_per_sample: r.u32().map_err(&err)?,
    })
}

fn parse_sbc_decoder(blob: &[u8]) -> Result<SbcDecoderConfig, NegotiationError> {
    let err = NegotiationError::truncated(CodecId::Sbc);
    let mut r = BlobReader::new(blob);

    Ok(SbcDecoderConfig {
        channel_field: r.u16().map_err(&err)?,
        sample_rate: r.u32().map_err(&err)?,
    })
}

fn parse_aac_decoder(blob: &[u8]) -> Result<AacDecoderConfig, NegotiationError> {
    let err = NegotiationError::truncated(CodecId::Aac);
    let mut r = BlobReader::new(blob);

    Ok(AacDecoderConfig {
        format_flag: r.u16().map_err(&err)?,
        object_type: AacObjectType::from_mode(u32::from(r.u16().map_err(&err)?)),
        channels: r.u16().map_err(&err)?,
        pce_bits: r.u16().map_err(&err)?,
        sample_rate: r.u32().map_err(&err)?,
    })
}
