//! Mixer control names shared with the DSP firmware.
//!
//! These strings are a fixed contract with the platform's mixer driver and are
//! used as opaque keys.

/// Encoder configuration block on the Bluetooth Rx backend
pub const ENC_CONFIG_BLOCK: &str = "SLIM_7_RX Encoder Config";
/// Extended aptX Adaptive encoder block, only present on newer firmware
pub const ENC_APTX_AD_CONFIG_BLOCK: &str = "SLIM_7_RX APTX_AD Enc Cfg";
/// ABR feedback decoder block on the source side
pub const SOURCE_DEC_CONFIG_BLOCK: &str = "SLIM_7_TX Decoder Config";
/// Decoder block for A2DP sink (capture from headset)
pub const SINK_DEC_CONFIG_BLOCK: &str = "SLIM_9_TX Decoder Config";

pub const ENC_BIT_FORMAT: &str = "AFE Input Bit Format";
pub const DEC_BIT_FORMAT: &str = "AFE Output Bit Format";
pub const SCRAMBLER_MODE: &str = "AFE Scrambler Mode";

pub const SAMPLE_RATE_RX: &str = "BT SampleRate RX";
pub const SOURCE_SAMPLE_RATE_TX: &str = "BT SampleRate TX";
/// Legacy single rate control used when the split Rx/Tx controls are absent
pub const SAMPLE_RATE_DEFAULT: &str = "BT SampleRate";
pub const SINK_SAMPLE_RATE: &str = "BT_TX SampleRate";

pub const AFE_IN_CHANNELS: &str = "AFE Input Channels";
pub const AFE_SINK_CHANNELS: &str = "AFE Output Channels";

pub const ABR_TX_FEEDBACK_PATH: &str = "A2DP_SLIM7_UL_HL Switch";
pub const ABR_RX_FEEDBACK_PATH: &str = "SCO_SLIM7_DL_HL Switch";
pub const SET_FEEDBACK_CHANNEL: &str = "BT set feedback channel";

pub const TWS_CHANNEL_MODE: &str = "TWS Channel Mode";

/// Every control a fully featured platform exposes, minus the optional
/// extended aptX Adaptive block.
pub const STANDARD: &[&str] = &[
    ENC_CONFIG_BLOCK,
    SOURCE_DEC_CONFIG_BLOCK,
    SINK_DEC_CONFIG_BLOCK,
    ENC_BIT_FORMAT,
    DEC_BIT_FORMAT,
    SCRAMBLER_MODE,
    SAMPLE_RATE_RX,
    SOURCE_SAMPLE_RATE_TX,
    SINK_SAMPLE_RATE,
    AFE_IN_CHANNELS,
    AFE_SINK_CHANNELS,
    ABR_TX_FEEDBACK_PATH,
    ABR_RX_FEEDBACK_PATH,
    SET_FEEDBACK_CHANNEL,
    TWS_CHANNEL_MODE,
];
