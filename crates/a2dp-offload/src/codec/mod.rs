//! Codec identifiers and negotiated codec configurations

pub mod blob;
pub mod dsp;
pub mod latency;
pub mod registry;

pub use registry::{AacShape, NegotiationContext, NegotiationError, StreamParams, negotiate};

use serde::{Deserialize, Serialize};

/// Codec identifier as reported by the Bluetooth stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecId {
    Pcm,
    Sbc,
    Aac,
    Aptx,
    AptxHd,
    /// Reported id of the aptX family when the remote is a TWS pair
    AptxDualMono,
    AptxAdaptive,
    AptxAdaptiveSpeech,
    Ldac,
    Celt,
    Invalid,
}

impl CodecId {
    const RAW: &'static [(CodecId, u32)] = &[
        (CodecId::Pcm, 0x0000_0001),
        (CodecId::Aac, 0x0400_0000),
        (CodecId::Sbc, 0x1F00_0000),
        (CodecId::Aptx, 0x2000_0000),
        (CodecId::AptxHd, 0x2100_0000),
        (CodecId::AptxDualMono, 0x2200_0000),
        (CodecId::Ldac, 0x2300_0000),
        (CodecId::Celt, 0x2400_0000),
        (CodecId::AptxAdaptive, 0x2500_0000),
        (CodecId::AptxAdaptiveSpeech, 0x2600_0000),
    ];

    /// Map a raw controller codec type; unknown values become `Invalid`
    pub fn from_raw(raw: u32) -> Self {
        Self::RAW
            .iter()
            .find(|(_, value)| *value == raw)
            .map(|(id, _)| *id)
            .unwrap_or(CodecId::Invalid)
    }

    /// Raw controller codec type
    pub fn raw(self) -> u32 {
        Self::RAW
            .iter()
            .find(|(id, _)| *id == self)
            .map(|(_, value)| *value)
            .unwrap_or(u32::MAX)
    }

    pub fn name(self) -> &'static str {
        match self {
            CodecId::Pcm => "PCM",
            CodecId::Sbc => "SBC",
            CodecId::Aac => "AAC",
            CodecId::Aptx => "aptX",
            CodecId::AptxHd => "aptX-HD",
            CodecId::AptxDualMono => "aptX dual mono",
            CodecId::AptxAdaptive => "aptX Adaptive",
            CodecId::AptxAdaptiveSpeech => "aptX Adaptive Speech",
            CodecId::Ldac => "LDAC",
            CodecId::Celt => "CELT",
            CodecId::Invalid => "invalid",
        }
    }

    /// Codecs that need an IMC instance before their encoder block is built
    pub fn uses_imc(self) -> bool {
        matches!(
            self,
            CodecId::AptxAdaptive | CodecId::AptxAdaptiveSpeech | CodecId::Ldac
        )
    }
}

impl std::fmt::Display for CodecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of the DSP a codec configuration programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Encode,
    Decode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SbcChannelMode {
    Mono,
    DualMono,
    Stereo,
    JointStereo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SbcAllocation {
    Loudness,
    Snr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SbcConfig {
    /// Subband count, 4 or 8
    pub subbands: u32,
    /// Blocks per frame
    pub block_len: u32,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel mode as negotiated
    pub channel_mode: SbcChannelMode,
    /// Bit allocation method
    pub allocation: SbcAllocation,
    /// Lower bitpool bound
    pub min_bitpool: u8,
    /// Upper bitpool bound
    pub max_bitpool: u8,
    /// Target bit rate in bits per second
    pub bitrate: u32,
    /// PCM sample width fed to the encoder
    pub bits_per_sample: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AacObjectType {
    Lc,
    Sbr,
    Ps,
}

impl AacObjectType {
    /// Stack encode mode: 0 LC, 2 PS, anything else SBR
    pub fn from_mode(mode: u32) -> Self {
        match mode {
            0 => AacObjectType::Lc,
            2 => AacObjectType::Ps,
            _ => AacObjectType::Sbr,
        }
    }
}

/// Frame size or VBR control pair appended to the AAC encoder config
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameControl {
    pub control_type: u32,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AacConfig {
    /// Audio object type derived from the stack encode mode
    pub object_type: AacObjectType,
    /// Bit stream transport format as reported
    pub format_flag: u16,
    /// Channel count
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Target bit rate in bits per second
    pub bitrate: u32,
    /// PCM sample width fed to the encoder
    pub bits_per_sample: u32,
    /// Frame size control, when the configured shape carries one
    pub frame_control: Option<FrameControl>,
    /// VBR control, when the configured shape carries one
    pub vbr_control: Option<FrameControl>,
}

/// aptX (default or dual mono) and aptX-HD parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AptxConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate: u32,
    pub bits_per_sample: u32,
    /// Present for the dual mono variant
    pub sync_mode: Option<u32>,
}

/// Fields only carried by the extended aptX Adaptive layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AptxAdaptiveExtension {
    pub input_mode: u32,
    pub fade_duration: u32,
    pub sink_capability: [u8; 11],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AptxAdaptiveConfig {
    /// Resolved sample rate in Hz
    pub sample_rate: u32,
    /// Resolved channel count
    pub channels: u16,
    /// Sampling frequency enum as reported, forwarded to the encoder
    pub sampling_freq: u32,
    /// Channel mode as reported, forwarded to the encoder
    pub channel_mode: i32,
    pub mtu: u32,
    /// min/max sink buffering for modes A, B and C
    pub sink_modes: [u32; 6],
    pub encoder_mode: u32,
    pub time_to_play: [u8; 6],
    pub bits_per_sample: u32,
    pub extension: Option<AptxAdaptiveExtension>,
    pub imc_instance: u32,
}

/// SWB voice configuration on the A2DP backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechConfig {
    pub speech_mode: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitrateLevel {
    pub link_quality: u32,
    pub bitrate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LdacConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Starting bit rate in bits per second
    pub bitrate: u32,
    /// Channel mode as reported; 4 is mono, anything else stereo
    pub channel_mode: u16,
    /// Link MTU in bytes
    pub mtu: u16,
    /// PCM sample width fed to the encoder
    pub bits_per_sample: u32,
    /// Stack asked for adaptive bit rate
    pub abr_enabled: bool,
    /// Link quality to bit rate table, at most five entries
    pub levels: Vec<BitrateLevel>,
    /// IMC instance shared with the feedback decoder
    pub imc_instance: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CeltConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Samples per frame
    pub frame_size: u16,
    /// Encoder complexity level
    pub complexity: u16,
    /// Inter-frame prediction mode
    pub prediction_mode: u16,
    /// Non-zero enables variable bit rate
    pub vbr_flag: u16,
    /// Target bit rate in bits per second
    pub bitrate: u32,
    /// PCM sample width fed to the encoder
    pub bits_per_sample: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SbcDecoderConfig {
    /// Channel field as reported; 1 means mono
    pub channel_field: u16,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AacDecoderConfig {
    pub format_flag: u16,
    pub object_type: AacObjectType,
    pub channels: u16,
    pub pce_bits: u16,
    pub sample_rate: u32,
}

/// A negotiated codec configuration.
///
/// Built fresh on every negotiation and replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CodecConfig {
    Pcm(StreamParams),
    Sbc(SbcConfig),
    Aac(AacConfig),
    Aptx(AptxConfig),
    AptxHd(AptxConfig),
    AptxAdaptive(AptxAdaptiveConfig),
    AptxAdaptiveSpeech(SpeechConfig),
    Ldac(LdacConfig),
    Celt(CeltConfig),
    SbcDecoder(SbcDecoderConfig),
    AacDecoder(AacDecoderConfig),
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig::Pcm(StreamParams::default())
    }
}

/// Backend rate the SWB voice path runs at
pub const SPEECH_BACKEND_RATE: u32 = 96_000;

/// Default encoder bit width
pub const DEFAULT_BITS_PER_SAMPLE: u32 = 16;

impl CodecConfig {
    pub fn codec_id(&self) -> CodecId {
        match self {
            CodecConfig::Pcm(_) => CodecId::Pcm,
            CodecConfig::Sbc(_) | CodecConfig::SbcDecoder(_) => CodecId::Sbc,
            CodecConfig::Aac(_) | CodecConfig::AacDecoder(_) => CodecId::Aac,
            CodecConfig::Aptx(_) => CodecId::Aptx,
            CodecConfig::AptxHd(_) => CodecId::AptxHd,
            CodecConfig::AptxAdaptive(_) => CodecId::AptxAdaptive,
            CodecConfig::AptxAdaptiveSpeech(_) => CodecId::AptxAdaptiveSpeech,
            CodecConfig::Ldac(_) => CodecId::Ldac,
            CodecConfig::Celt(_) => CodecId::Celt,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            CodecConfig::SbcDecoder(_) | CodecConfig::AacDecoder(_) => Direction::Decode,
            _ => Direction::Encode,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        match self {
            CodecConfig::Pcm(p) => p.sample_rate,
            CodecConfig::Sbc(c) => c.sample_rate,
            CodecConfig::Aac(c) => c.sample_rate,
            CodecConfig::Aptx(c) | CodecConfig::AptxHd(c) => c.sample_rate,
            CodecConfig::AptxAdaptive(c) => c.sample_rate,
            CodecConfig::AptxAdaptiveSpeech(_) => SPEECH_BACKEND_RATE,
            CodecConfig::Ldac(c) => c.sample_rate,
            CodecConfig::Celt(c) => c.sample_rate,
            CodecConfig::SbcDecoder(c) => c.sample_rate,
            CodecConfig::AacDecoder(c) => c.sample_rate,
        }
    }

    pub fn channels(&self) -> u16 {
        match self {
            CodecConfig::Pcm(p) => p.channels,
            CodecConfig::Sbc(c) => {
                if c.channel_mode == SbcChannelMode::Mono {
                    1
                } else {
                    2
                }
            }
            CodecConfig::Aac(c) => c.channels,
            CodecConfig::Aptx(c) | CodecConfig::AptxHd(c) => c.channels,
            CodecConfig::AptxAdaptive(c) => c.channels,
            CodecConfig::AptxAdaptiveSpeech(_) => 1,
            CodecConfig::Ldac(c) => {
                if c.channel_mode == 4 {
                    1
                } else {
                    2
                }
            }
            CodecConfig::Celt(c) => c.channels,
            CodecConfig::SbcDecoder(c) => {
                if c.channel_field == 1 {
                    1
                } else {
                    2
                }
            }
            CodecConfig::AacDecoder(c) => c.channels,
        }
    }

    /// Bit width programmed into the encoder input format
    pub fn bits_per_sample(&self) -> u32 {
        match self {
            CodecConfig::Sbc(c) => c.bits_per_sample,
            CodecConfig::Aac(c) => c.bits_per_sample,
            CodecConfig::Aptx(c) | CodecConfig::AptxHd(c) => c.bits_per_sample,
            CodecConfig::AptxAdaptive(c) => c.bits_per_sample,
            CodecConfig::Ldac(c) => c.bits_per_sample,
            CodecConfig::Celt(c) => c.bits_per_sample,
            _ => DEFAULT_BITS_PER_SAMPLE,
        }
    }

    /// Only aptX Adaptive, its speech variant and LDAC with ABR may run the
    /// feedback channel.
    pub fn is_abr_eligible(&self) -> bool {
        match self {
            CodecConfig::AptxAdaptive(_) | CodecConfig::AptxAdaptiveSpeech(_) => true,
            CodecConfig::Ldac(c) => c.abr_enabled,
            _ => false,
        }
    }

    pub fn stream_params(&self) -> StreamParams {
        StreamParams {
            sample_rate: self.sample_rate(),
            channels: self.channels(),
        }
    }
}
