//! Playback and capture latency estimates

use super::CodecId;
use a2dp_offload_config::LatencyOverrides;

/// Returned when a codec has no known latency
pub const DEFAULT_LATENCY_MS: u32 = 200;

/// Built-in DSP encoder latency and the sink latency assumed when the
/// controller does not report one.
fn builtin(codec: CodecId) -> Option<(u32, u32)> {
    match codec {
        CodecId::Sbc => Some((10, 140)),
        CodecId::Aptx => Some((40, 160)),
        CodecId::AptxHd => Some((20, 180)),
        CodecId::Aac => Some((70, 180)),
        CodecId::Celt => Some((40, 180)),
        CodecId::Ldac => Some((40, 180)),
        CodecId::Pcm => Some((50, 140)),
        _ => None,
    }
}

fn override_for(codec: CodecId, offsets: [u32; 6]) -> Option<u32> {
    let [sbc, aptx, aptx_hd, aac, celt, ldac] = offsets;
    match codec {
        CodecId::Sbc => Some(sbc),
        CodecId::Aptx => Some(aptx),
        CodecId::AptxHd => Some(aptx_hd),
        CodecId::Aac => Some(aac),
        CodecId::Celt => Some(celt),
        CodecId::Ldac => Some(ldac),
        _ => None,
    }
}

/// End-to-end playback latency in milliseconds.
///
/// `controller_latency` replaces the default sink latency when non-zero.
/// aptX Adaptive relies on the controller figure alone.
pub fn encoder_latency(
    codec: CodecId,
    controller_latency: Option<u16>,
    overrides: &LatencyOverrides,
) -> u32 {
    let reported = controller_latency.map(u32::from).filter(|l| *l > 0);

    if codec == CodecId::AptxAdaptive {
        return reported.unwrap_or(0);
    }
    if codec == CodecId::Pcm {
        return 50 + 140;
    }

    let Some((encoder, sink)) = builtin(codec) else {
        return DEFAULT_LATENCY_MS;
    };
    let encoder = overrides
        .complete()
        .and_then(|offsets| override_for(codec, offsets))
        .unwrap_or(encoder);

    encoder + reported.unwrap_or(sink)
}

/// Capture latency of the sink decoder in milliseconds
pub fn decoder_latency(codec: CodecId) -> u32 {
    match codec {
        CodecId::Sbc => 140,
        CodecId::Aac => 180,
        _ => DEFAULT_LATENCY_MS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_overrides() -> LatencyOverrides {
        LatencyOverrides {
            sbc: Some(1),
            aptx: Some(2),
            aptx_hd: Some(3),
            aac: Some(4),
            celt: Some(5),
            ldac: Some(6),
        }
    }

    #[test]
    fn test_builtin_latencies() {
        let none = LatencyOverrides::default();
        assert_eq!(encoder_latency(CodecId::Sbc, None, &none), 150);
        assert_eq!(encoder_latency(CodecId::Aptx, None, &none), 200);
        assert_eq!(encoder_latency(CodecId::AptxHd, None, &none), 200);
        assert_eq!(encoder_latency(CodecId::Aac, None, &none), 250);
        assert_eq!(encoder_latency(CodecId::Celt, None, &none), 220);
        assert_eq!(encoder_latency(CodecId::Ldac, None, &none), 220);
        assert_eq!(encoder_latency(CodecId::Pcm, None, &none), 190);
    }

    #[test]
    fn test_controller_latency_replaces_sink_default() {
        let none = LatencyOverrides::default();
        assert_eq!(encoder_latency(CodecId::Aac, Some(100), &none), 170);
        assert_eq!(encoder_latency(CodecId::Aac, Some(0), &none), 250);
        // PCM ignores the controller
        assert_eq!(encoder_latency(CodecId::Pcm, Some(100), &none), 190);
    }

    #[test]
    fn test_aptx_adaptive_uses_controller_only() {
        let none = LatencyOverrides::default();
        assert_eq!(encoder_latency(CodecId::AptxAdaptive, Some(250), &none), 250);
        assert_eq!(encoder_latency(CodecId::AptxAdaptive, None, &none), 0);
    }

    #[test]
    fn test_overrides_need_full_tuple() {
        assert_eq!(encoder_latency(CodecId::Sbc, None, &complete_overrides()), 141);
        assert_eq!(encoder_latency(CodecId::Ldac, Some(20), &complete_overrides()), 26);

        let mut partial = complete_overrides();
        partial.celt = None;
        assert_eq!(encoder_latency(CodecId::Sbc, None, &partial), 150);
    }

    #[test]
    fn test_unknown_codecs() {
        let none = LatencyOverrides::default();
        assert_eq!(encoder_latency(CodecId::Invalid, None, &none), DEFAULT_LATENCY_MS);
        assert_eq!(decoder_latency(CodecId::Sbc), 140);
        assert_eq!(decoder_latency(CodecId::Aac), 180);
        assert_eq!(decoder_latency(CodecId::Ldac), DEFAULT_LATENCY_MS);
    }
}
