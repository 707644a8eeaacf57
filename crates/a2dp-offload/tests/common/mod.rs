//! Shared helpers for the offload integration tests

#![allow(dead_code)]

use a2dp_offload::codec::blob::BlobWriter;
use a2dp_offload::{OffloadHal, SessionManager};
use a2dp_offload_config::OffloadConfig;
use a2dp_offload_hal::mock::{MockHal, MockProfile};

/// Route test logs through the libtest writer; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Handles wired to every part of a mock HAL
pub fn mock_handles(hal: &MockHal) -> OffloadHal {
    OffloadHal::new(hal.mixer.clone(), hal.feedback.clone(), hal.router.clone())
        .with_source(hal.source.clone())
        .with_sink(hal.sink.clone())
}

/// Test environment holding a mock HAL and a manager wired to it
pub struct OffloadTestEnvironment {
    pub hal: MockHal,
    pub manager: SessionManager,
}

impl OffloadTestEnvironment {
    pub fn new() -> Self {
        Self::with_config(MockProfile::Standard, OffloadConfig::default())
    }

    pub fn with_config(profile: MockProfile, config: OffloadConfig) -> Self {
        init_tracing();
        let hal = MockHal::new(profile);
        let manager = SessionManager::new(config, mock_handles(&hal));
        Self { hal, manager }
    }
}

pub fn sbc_blob(channel_mode: u8) -> Vec<u8> {
    BlobWriter::aligned()
        .u32(8)
        .u32(16)
        .u16(44100)
        .u8(channel_mode)
        .u8(0)
        .u8(2)
        .u8(53)
        .u32(328_000)
        .u32(16)
        .finish()
}

pub fn ldac_blob(channel_mode: u16, abr: bool) -> Vec<u8> {
    let mut w = BlobWriter::aligned()
        .u32(48000)
        .u32(909_000)
        .u16(channel_mode)
        .u16(679)
        .u32(24)
        .u8(u8::from(abr))
        .u32(3);
    for level in 0..5u32 {
        w = w.u32(level).u32(330_000 + level * 100_000);
    }
    w.finish()
}

/// SBC sink decoder report: channel field then sample rate
pub fn sbc_decoder_blob(channel_field: u16, sample_rate: u32) -> Vec<u8> {
    BlobWriter::aligned().u16(channel_field).u32(sample_rate).finish()
}

/// aptX Adaptive encoder report; `extended` appends the r2 trailer.
/// `freq` 0 and `channel_mode` -1 ask to keep the previous stream shape
pub fn aptx_ad_blob(freq: u32, channel_mode: i32, extended: bool) -> Vec<u8> {
    let mut w = BlobWriter::aligned()
        .u32(freq)
        .u32(660)
        .i32(channel_mode)
        .u32(1)
        .u32(2)
        .u32(3)
        .u32(4)
        .u32(5)
        .u32(6)
        .u32(0)
        .bytes(&[10, 20, 30, 40, 50, 60])
        .u32(24);
    if extended {
        w = w.u32(1).u32(250).bytes(&[7; 11]);
    }
    w.finish()
}
