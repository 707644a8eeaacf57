//! Name-based mixer writes

use crate::codec::dsp::DspBlock;
use a2dp_offload_hal::{HalError, Mixer};

/// Resolve-then-write helpers on top of [`Mixer`]
pub trait MixerExt {
    fn set_enum_named(&self, name: &str, label: &str) -> a2dp_offload_hal::Result<()>;

    fn set_value_named(&self, name: &str, value: i64) -> a2dp_offload_hal::Result<()>;

    fn write_block(&self, block: &DspBlock) -> a2dp_offload_hal::Result<()>;
}

impl<M: Mixer + ?Sized> MixerExt for M {
    fn set_enum_named(&self, name: &str, label: &str) -> a2dp_offload_hal::Result<()> {
        let ctl = self
            .control(name)
            .ok_or_else(|| HalError::ControlNotFound(name.to_string()))?;
        self.set_enum(ctl, label)
    }

    fn set_value_named(&self, name: &str, value: i64) -> a2dp_offload_hal::Result<()> {
        let ctl = self
            .control(name)
            .ok_or_else(|| HalError::ControlNotFound(name.to_string()))?;
        self.set_value(ctl, value)
    }

    fn write_block(&self, block: &DspBlock) -> a2dp_offload_hal::Result<()> {
        let ctl = self
            .control(block.control)
            .ok_or_else(|| HalError::ControlNotFound(block.control.to_string()))?;
        self.set_array(ctl, &block.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2dp_offload_hal::controls;
    use a2dp_offload_hal::mock::{MixerValue, MockHal, MockProfile};

    #[test]
    fn test_named_writes() {
        let hal = MockHal::new(MockProfile::Standard);
        hal.mixer
            .set_enum_named(controls::ENC_BIT_FORMAT, "S24_LE")
            .unwrap();
        hal.mixer.set_value_named(controls::SCRAMBLER_MODE, 1).unwrap();

        hal.inspect(|s| {
            assert_eq!(s.last_enum(controls::ENC_BIT_FORMAT), Some("S24_LE"));
            assert_eq!(s.last_value(controls::SCRAMBLER_MODE), Some(1));
        });
    }

    #[test]
    fn test_missing_control_is_reported() {
        let hal = MockHal::new(MockProfile::Standard);
        let block = DspBlock {
            control: controls::ENC_APTX_AD_CONFIG_BLOCK,
            bytes: vec![1, 2, 3],
        };
        let err = hal.mixer.write_block(&block).unwrap_err();
        assert!(matches!(err, HalError::ControlNotFound(_)));
        hal.inspect(|s| assert!(s.writes.is_empty()));

        let block = DspBlock {
            control: controls::ENC_CONFIG_BLOCK,
            bytes: vec![1, 2, 3],
        };
        hal.mixer.write_block(&block).unwrap();
        hal.inspect(|s| {
            assert_eq!(
                s.last_write(controls::ENC_CONFIG_BLOCK),
                Some(&MixerValue::Array(vec![1, 2, 3]))
            )
        });
    }
}
