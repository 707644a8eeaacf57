//! DSP configuration blocks
//!
//! Every [`CodecConfig`] renders into the packed little-endian block written to
//! the encoder or decoder configuration control. ABR capable codecs carry an
//! IMC section that pairs the encoder with the feedback decoder.

use super::blob::BlobWriter;
use super::{
    AacObjectType, CodecConfig, CodecId, FrameControl, SbcAllocation, SbcChannelMode,
    SpeechConfig,
};
use super::registry::MAX_ABR_QUALITY_LEVELS;
use a2dp_offload_hal::controls;

/// DSP media format identifiers
pub mod media_fmt {
    pub const AAC: u32 = 0x0001_0DA6;
    pub const APTX: u32 = 0x0001_31FF;
    pub const APTX_HD: u32 = 0x0001_3200;
    pub const APTX_AD: u32 = 0x0001_3204;
    pub const APTX_AD_SPEECH: u32 = 0x0001_3208;
    pub const SBC: u32 = 0x0001_0BF2;
    pub const CELT: u32 = 0x0001_3221;
    pub const LDAC: u32 = 0x0001_3224;
}

const AAC_AOT_LC: u32 = 2;
const AAC_AOT_SBR: u32 = 5;
const AAC_AOT_PS: u32 = 29;

const PCM_CHANNEL_L: u8 = 1;
const PCM_CHANNEL_R: u8 = 2;
const PCM_CHANNEL_C: u8 = 3;

const SBC_CHANNEL_MODE_MONO: u32 = 1;
const SBC_CHANNEL_MODE_STEREO: u32 = 2;
const SBC_CHANNEL_MODE_DUAL_MONO: u32 = 8;
const SBC_CHANNEL_MODE_JOINT_STEREO: u32 = 9;
const SBC_ALLOCATION_LOUDNESS: u32 = 0;
const SBC_ALLOCATION_SNR: u32 = 1;

/// Purpose id of the Bluetooth link-quality IMC channel
pub const IMC_PURPOSE_BT_INFO: u32 = 0x0001_32E2;
const IMC_ENABLE: u32 = 1;
const SWAP_ENABLE: u32 = 1;

/// Fixed IMC instance of the SWB voice session
pub const SPEECH_IMC_INSTANCE: u32 = 37;

/// Size of `custom_enc_cfg`
const CUSTOM_CFG_SIZE: u32 = 24;
/// Size of `abr_enc_cfg`: level table, IMC info and the enable flag
const ABR_ENC_CFG_SIZE: u32 = 4 + 8 * MAX_ABR_QUALITY_LEVELS as u32 + 16 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImcDirection {
    Transmit = 0,
    Receive = 1,
}

/// A rendered configuration block and the control it is written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DspBlock {
    pub control: &'static str,
    pub bytes: Vec<u8>,
}

/// Label for the AFE bit format control
pub fn bit_format_label(bits_per_sample: u32) -> &'static str {
    match bits_per_sample {
        32 => "S32_LE",
        24 => "S24_LE",
        _ => "S16_LE",
    }
}

fn channel_map(w: BlobWriter, map: &[u8]) -> BlobWriter {
    let mut slots = [0u8; 8];
    slots[..map.len()].copy_from_slice(map);
    w.bytes(&slots)
}

fn stereo_or_centre(channels: u16) -> &'static [u8] {
    if channels == 1 {
        &[PCM_CHANNEL_C]
    } else {
        &[PCM_CHANNEL_L, PCM_CHANNEL_R]
    }
}

fn custom_cfg(
    format: u32,
    sample_rate: u32,
    channels: u16,
    map: &[u8],
    custom_size: u32,
) -> BlobWriter {
    let w = BlobWriter::packed()
        .u32(format)
        .u32(sample_rate)
        .u16(channels)
        .u16(0);
    channel_map(w, map).u32(custom_size)
}

fn imc(w: BlobWriter, direction: ImcDirection, instance: u32) -> BlobWriter {
    w.u32(direction as u32)
        .u32(IMC_ENABLE)
        .u32(IMC_PURPOSE_BT_INFO)
        .u32(instance)
}

fn abr_enc_cfg(
    w: BlobWriter,
    levels: &[(u32, u32)],
    instance: u32,
    enabled: bool,
) -> BlobWriter {
    let mut w = w.u32(levels.len() as u32);
    for slot in 0..MAX_ABR_QUALITY_LEVELS {
        let (level, bitrate) = levels.get(slot).copied().unwrap_or((0, 0));
        w = w.u32(level).u32(bitrate);
    }
    imc(w, ImcDirection::Receive, instance).u8(enabled as u8)
}

fn aac_object_type(object_type: AacObjectType) -> u32 {
    match object_type {
        AacObjectType::Lc => AAC_AOT_LC,
        AacObjectType::Sbr => AAC_AOT_SBR,
        AacObjectType::Ps => AAC_AOT_PS,
    }
}

fn frame_control(w: BlobWriter, ctl: FrameControl) -> BlobWriter {
    w.u32(ctl.control_type).u32(ctl.value)
}

/// Encoder block for a negotiated configuration.
///
/// `None` for PCM passthrough and for decoder configurations. The extended
/// aptX Adaptive layout targets its own control.
pub fn encoder_block(config: &CodecConfig) -> Option<DspBlock> {
    let mut control = controls::ENC_CONFIG_BLOCK;
    let w = match config {
        CodecConfig::Pcm(_) | CodecConfig::SbcDecoder(_) | CodecConfig::AacDecoder(_) => {
            return None;
        }
        CodecConfig::Sbc(c) => {
            let channel_mode = match c.channel_mode {
                SbcChannelMode::Mono => SBC_CHANNEL_MODE_MONO,
                SbcChannelMode::DualMono => SBC_CHANNEL_MODE_DUAL_MONO,
                SbcChannelMode::Stereo => SBC_CHANNEL_MODE_STEREO,
                SbcChannelMode::JointStereo => SBC_CHANNEL_MODE_JOINT_STEREO,
            };
            // Stack loudness (0) selects the encoder's SNR method and vice versa
            let alloc = match c.allocation {
                SbcAllocation::Loudness => SBC_ALLOCATION_SNR,
                SbcAllocation::Snr => SBC_ALLOCATION_LOUDNESS,
            };
            BlobWriter::packed()
                .u32(media_fmt::SBC)
                .u32(c.subbands)
                .u32(c.block_len)
                .u32(channel_mode)
                .u32(alloc)
                .u32(c.bitrate)
                .u32(c.sample_rate)
        }
        CodecConfig::Aac(c) => {
            let mut w = BlobWriter::packed()
                .u32(media_fmt::AAC)
                .u32(c.bitrate)
                .u32(aac_object_type(c.object_type))
                .u16(c.format_flag)
                .u16(c.channels)
                .u32(c.sample_rate);
            if let Some(ctl) = c.frame_control {
                w = frame_control(w, ctl);
            }
            if let Some(ctl) = c.vbr_control {
                w = frame_control(w, ctl);
            }
            w
        }
        CodecConfig::Aptx(c) => custom_cfg(
            media_fmt::APTX,
            c.sample_rate,
            c.channels,
            stereo_or_centre(c.channels),
            0,
        )
        .u32(c.sync_mode.unwrap_or(0)),
        CodecConfig::AptxHd(c) => custom_cfg(
            media_fmt::APTX_HD,
            c.sample_rate,
            c.channels,
            stereo_or_centre(c.channels),
            0,
        ),
        CodecConfig::AptxAdaptive(c) => {
            let mut w = custom_cfg(
                media_fmt::APTX_AD,
                c.sample_rate,
                c.channels,
                stereo_or_centre(c.channels),
                0,
            )
            .u32(c.sampling_freq)
            .u32(c.mtu)
            .i32(c.channel_mode);
            for mode in c.sink_modes {
                w = w.u32(mode);
            }
            w = w.u32(c.encoder_mode);
            if let Some(ext) = &c.extension {
                control = controls::ENC_APTX_AD_CONFIG_BLOCK;
                w = w
                    .u32(ext.input_mode)
                    .u32(ext.fade_duration)
                    .bytes(&ext.sink_capability);
            }
            abr_enc_cfg(w, &[], c.imc_instance, false)
        }
        CodecConfig::AptxAdaptiveSpeech(c) => speech_mode(
            imc(
                custom_cfg(media_fmt::APTX_AD_SPEECH, 32_000, 1, &[PCM_CHANNEL_L], 0),
                ImcDirection::Receive,
                SPEECH_IMC_INSTANCE,
            ),
            c,
        ),
        CodecConfig::Ldac(c) => {
            let channels = config.channels();
            let w = custom_cfg(
                media_fmt::LDAC,
                c.sample_rate,
                channels,
                stereo_or_centre(channels),
                CUSTOM_CFG_SIZE + 8 + ABR_ENC_CFG_SIZE,
            )
            .u32(c.bitrate)
            .u16(c.channel_mode)
            .u16(c.mtu);
            if c.abr_enabled {
                let levels: Vec<(u32, u32)> = c
                    .levels
                    .iter()
                    .map(|l| (l.link_quality, l.bitrate))
                    .collect();
                abr_enc_cfg(w, &levels, c.imc_instance, true)
            } else {
                w.zeros(ABR_ENC_CFG_SIZE as usize)
            }
        }
        CodecConfig::Celt(c) => custom_cfg(
            media_fmt::CELT,
            c.sample_rate,
            c.channels,
            stereo_or_centre(c.channels),
            CUSTOM_CFG_SIZE + 12,
        )
        .u32(c.bitrate)
        .u16(c.frame_size)
        .u16(c.complexity)
        .u16(c.prediction_mode)
        .u16(c.vbr_flag),
    };

    Some(DspBlock {
        control,
        bytes: w.finish(),
    })
}

fn speech_mode(w: BlobWriter, c: &SpeechConfig) -> BlobWriter {
    w.u32(c.speech_mode).u32(SWAP_ENABLE)
}

/// Feedback decoder block on the source Tx path, for ABR codecs only
pub fn source_decoder_block(config: &CodecConfig) -> Option<DspBlock> {
    let w = match config {
        CodecConfig::AptxAdaptive(c) => imc(
            BlobWriter::packed().u32(media_fmt::APTX_AD),
            ImcDirection::Transmit,
            c.imc_instance,
        ),
        CodecConfig::Ldac(c) if c.abr_enabled => imc(
            BlobWriter::packed().u32(CodecId::Ldac.raw()),
            ImcDirection::Transmit,
            c.imc_instance,
        ),
        CodecConfig::AptxAdaptiveSpeech(c) => speech_mode(
            imc(
                BlobWriter::packed().u32(media_fmt::APTX_AD_SPEECH),
                ImcDirection::Transmit,
                SPEECH_IMC_INSTANCE,
            ),
            c,
        ),
        _ => return None,
    };

    Some(DspBlock {
        control: controls::SOURCE_DEC_CONFIG_BLOCK,
        bytes: w.finish(),
    })
}

/// Decoder block for the sink (capture) path
pub fn sink_decoder_block(config: &CodecConfig) -> Option<DspBlock> {
    let w = match config {
        CodecConfig::SbcDecoder(c) => BlobWriter::packed()
            .u32(media_fmt::SBC)
            .u16(c.channel_field)
            .u32(c.sample_rate),
        CodecConfig::AacDecoder(c) => BlobWriter::packed()
            .u32(media_fmt::AAC)
            .u16(c.format_flag)
            .u16(aac_object_type(c.object_type) as u16)
            .u16(c.channels)
            .u16(c.pce_bits)
            .u32(c.sample_rate),
        _ => return None,
    };

    Some(DspBlock {
        control: controls::SINK_DEC_CONFIG_BLOCK,
        bytes: w.finish(),
    })
}

/// Zeroed SBC encoder block used to reset the encoder
pub fn encoder_reset_block() -> DspBlock {
    DspBlock {
        control: controls::ENC_CONFIG_BLOCK,
        bytes: vec![0; 28],
    }
}

/// Zeroed feedback decoder block
pub fn source_decoder_reset_block() -> DspBlock {
    DspBlock {
        control: controls::SOURCE_DEC_CONFIG_BLOCK,
        bytes: vec![0; 20],
    }
}

/// Zeroed AAC decoder block used to reset the sink decoder
pub fn sink_decoder_reset_block() -> DspBlock {
    DspBlock {
        control: controls::SINK_DEC_CONFIG_BLOCK,
        bytes: vec![0; 16],
    }
}
