//! Integration tests for the source and sink session life cycle

mod common;

use a2dp_offload::abr::IMC_INSTANCE_MAX;
use a2dp_offload::{
    A2dpDevice, BackendRate, CodecId, OffloadError, OffloadHal, Phase, SessionManager,
};
use a2dp_offload_config::OffloadConfig;
use a2dp_offload_hal::mock::{MixerValue, MockHal, MockProfile, MockRouter};
use a2dp_offload_hal::{PlaybackRouter, UsecaseId, controls};
use common::{
    OffloadTestEnvironment, aptx_ad_blob, init_tracing, ldac_blob, sbc_blob, sbc_decoder_blob,
};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::Duration;

#[test]
fn test_repeated_connect_opens_once() -> anyhow::Result<()> {
    let env = OffloadTestEnvironment::new();
    env.manager.connect(A2dpDevice::Output)?;
    env.manager.connect(A2dpDevice::Output)?;
    env.manager.connect(A2dpDevice::Output)?;

    assert_eq!(env.hal.source.calls().open, 1);
    assert_eq!(env.manager.snapshot().source.phase, Phase::Connected);
    Ok(())
}

#[test]
fn test_reference_counted_playback() -> anyhow::Result<()> {
    let env = OffloadTestEnvironment::new();
    env.hal.source.set_encoder_report(CodecId::Sbc.raw(), sbc_blob(3));
    env.manager.connect(A2dpDevice::Output)?;

    for _ in 0..3 {
        env.manager.start_playback()?;
    }
    assert_eq!(env.hal.source.calls().start, 1);
    assert_eq!(env.manager.snapshot().source.active_requests, 3);

    for _ in 0..2 {
        env.manager.stop_playback()?;
    }
    assert_eq!(env.hal.source.calls().stop, 0);
    assert_eq!(env.manager.snapshot().source.phase, Phase::Started);

    env.manager.stop_playback()?;
    let snapshot = env.manager.snapshot().source;
    assert_eq!(env.hal.source.calls().stop, 1);
    assert_eq!(snapshot.phase, Phase::Stopped);
    assert_eq!(snapshot.active_requests, 0);
    assert_eq!(snapshot.codec, CodecId::Pcm);

    // Extra stop only logs the underflow
    env.manager.stop_playback()?;
    assert_eq!(env.hal.source.calls().stop, 1);
    Ok(())
}

#[test]
fn test_suspend_resume_round_trip() -> anyhow::Result<()> {
    let env = OffloadTestEnvironment::new();
    env.hal.router.add_usecase(UsecaseId(1));
    env.hal.source.set_encoder_report(CodecId::Sbc.raw(), sbc_blob(3));
    env.manager.connect(A2dpDevice::Output)?;
    env.manager.start_playback()?;

    env.manager.set_a2dp_suspended(true)?;
    assert!(env.manager.is_source_suspended());
    assert!(!env.manager.source_is_ready());
    assert_eq!(env.hal.source.calls().suspend, 1);
    env.hal.inspect(|s| {
        assert_eq!(
            s.last_write(controls::ENC_CONFIG_BLOCK),
            Some(&MixerValue::Array(vec![0; 28]))
        );
    });

    let err = env.manager.start_playback().unwrap_err();
    assert!(err.is_retry());

    env.manager.set_a2dp_suspended(false)?;
    assert!(!env.manager.is_source_suspended());
    // The one consumer that never stopped gets its stream back
    assert_eq!(env.hal.source.calls().start, 2);
    assert_eq!(
        env.hal.router.restore_calls(),
        vec![(UsecaseId(1), false), (UsecaseId(1), true)]
    );

    let snapshot = env.manager.snapshot().source;
    assert_eq!(snapshot.phase, Phase::Started);
    assert_eq!(snapshot.active_requests, 1);
    assert_eq!(snapshot.codec, CodecId::Sbc);
    Ok(())
}

#[test]
fn test_config_write_failure_rolls_back() -> anyhow::Result<()> {
    let env = OffloadTestEnvironment::new();
    env.hal.source.set_encoder_report(CodecId::Sbc.raw(), sbc_blob(3));
    env.hal.mixer.fail_control(controls::ENC_CONFIG_BLOCK, true);
    env.manager.connect(A2dpDevice::Output)?;

    let err = env.manager.start_playback().unwrap_err();
    assert!(matches!(err, OffloadError::ConfigWriteFailed(_)));
    let snapshot = env.manager.snapshot().source;
    assert_ne!(snapshot.phase, Phase::Started);
    assert_eq!(snapshot.active_requests, 0);

    // The controller session opened by the failed start still gets closed
    env.manager.stop_playback()?;
    assert_eq!(env.hal.source.calls().stop, 1);

    env.hal.mixer.fail_control(controls::ENC_CONFIG_BLOCK, false);
    env.manager.start_playback()?;
    assert_eq!(env.manager.snapshot().source.phase, Phase::Started);
    Ok(())
}

#[test]
fn test_disconnect_while_streaming() -> anyhow::Result<()> {
    let env = OffloadTestEnvironment::new();
    env.hal.source.set_encoder_report(CodecId::Ldac.raw(), ldac_blob(1, true));
    env.manager.connect(A2dpDevice::Output)?;
    env.manager.start_playback()?;
    env.manager.start_playback()?;

    env.manager.disconnect(A2dpDevice::Output)?;
    let snapshot = env.manager.snapshot().source;
    assert_eq!(snapshot.phase, Phase::Disconnected);
    assert_eq!(snapshot.active_requests, 0);
    assert!(!snapshot.abr_started);
    assert!(snapshot.backend_rate.is_none());
    assert_eq!(env.hal.source.calls().close, 1);
    env.hal.inspect(|s| assert_eq!(s.open_feedback_count(), 0));

    // Reconnect starts from a clean session
    env.manager.connect(A2dpDevice::Output)?;
    env.manager.start_playback()?;
    assert_eq!(env.manager.snapshot().source.active_requests, 1);
    Ok(())
}

#[test]
fn test_capture_session() -> anyhow::Result<()> {
    let env = OffloadTestEnvironment::new();
    env.hal.sink.set_decoder_report(CodecId::Sbc.raw(), sbc_decoder_blob(1, 44100));
    env.manager.connect(A2dpDevice::Input)?;
    env.manager.start_capture()?;
    env.manager.start_capture()?;

    assert_eq!(env.hal.sink.calls().start, 1);
    assert_eq!(env.manager.decoder_sample_rate(), 44100);
    env.hal.inspect(|s| {
        assert_eq!(s.last_enum(controls::SINK_SAMPLE_RATE), Some("KHZ_88P2"));
        assert_eq!(s.last_enum(controls::AFE_SINK_CHANNELS), Some("One"));
    });
    // Playback side is untouched
    assert_eq!(env.hal.source.calls().start, 0);

    env.manager.stop_capture()?;
    env.manager.stop_capture()?;
    assert_eq!(env.hal.sink.calls().stop, 1);
    assert_eq!(env.manager.snapshot().sink.phase, Phase::Stopped);

    env.manager.disconnect(A2dpDevice::Input)?;
    assert_eq!(env.hal.sink.calls().close, 1);
    Ok(())
}

#[test]
fn test_swb_blocks_playback() -> anyhow::Result<()> {
    let env = OffloadTestEnvironment::new();
    env.hal.source.set_encoder_report(CodecId::Sbc.raw(), sbc_blob(3));
    env.manager.connect(A2dpDevice::Output)?;
    env.manager.configure_swb(4)?;

    let snapshot = env.manager.snapshot().source;
    assert!(snapshot.swb_configured);
    assert_eq!(snapshot.codec, CodecId::AptxAdaptiveSpeech);
    assert!(env.manager.start_playback().unwrap_err().is_retry());

    env.manager.reset_swb()?;
    env.manager.start_playback()?;
    assert_eq!(env.manager.snapshot().source.codec, CodecId::Sbc);
    Ok(())
}

#[test]
fn test_handoff_forces_device_switch() -> anyhow::Result<()> {
    let env = OffloadTestEnvironment::new();
    env.hal.source.set_encoder_report(CodecId::Sbc.raw(), sbc_blob(3));
    assert!(env.manager.is_force_device_switch());

    env.manager.connect(A2dpDevice::Output)?;
    env.manager.start_playback()?;
    assert!(!env.manager.is_force_device_switch());

    env.manager.set_handoff_mode(true);
    assert!(env.manager.is_force_device_switch());
    env.manager.set_handoff_mode(false);
    assert!(!env.manager.is_force_device_switch());
    Ok(())
}

#[test]
fn test_concurrent_playback_requests() -> anyhow::Result<()> {
    let env = OffloadTestEnvironment::new();
    env.hal.source.set_encoder_report(CodecId::Sbc.raw(), sbc_blob(3));
    env.hal.sink.set_decoder_report(CodecId::Sbc.raw(), sbc_decoder_blob(0, 48000));
    env.manager.connect(A2dpDevice::Output)?;
    env.manager.connect(A2dpDevice::Input)?;

    let manager = Arc::new(env.manager);
    let workers: Vec<_> = (0..4)
        .map(|i| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for _ in 0..10 {
                    if i % 2 == 0 {
                        manager.start_playback().expect("start playback");
                        manager.stop_playback().expect("stop playback");
                    } else {
                        manager.start_capture().expect("start capture");
                        manager.stop_capture().expect("stop capture");
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.source.active_requests, 0);
    assert_eq!(snapshot.sink.active_requests, 0);
    assert_eq!(env.hal.source.calls().start, env.hal.source.calls().stop);
    assert_eq!(env.hal.sink.calls().start, env.hal.sink.calls().stop);
    Ok(())
}

#[test]
fn test_aptx_adaptive_keeps_previous_stream_shape() -> anyhow::Result<()> {
    let env = OffloadTestEnvironment::with_config(
        MockProfile::AptxAdaptiveR2,
        OffloadConfig::default(),
    );
    let raw = CodecId::AptxAdaptive.raw();
    env.hal.source.set_encoder_report(raw, aptx_ad_blob(2, 1, true));
    env.manager.connect(A2dpDevice::Output)?;
    env.manager.start_playback()?;

    let snapshot = env.manager.snapshot().source;
    assert_eq!(snapshot.codec, CodecId::AptxAdaptive);
    assert_eq!(env.manager.encoder_sample_rate(), 44100);
    assert_eq!(snapshot.channels, 1);
    assert!(snapshot.abr_started);
    assert_eq!(snapshot.backend_rate, Some(BackendRate { hz: 88200 }));

    env.hal.inspect(|s| {
        // The r2 control takes the encoder block
        assert!(s.writes_to(controls::ENC_CONFIG_BLOCK).is_empty());
        let encoder = s
            .last_array(controls::ENC_APTX_AD_CONFIG_BLOCK)
            .expect("r2 encoder block");
        let decoder = s
            .last_array(controls::SOURCE_DEC_CONFIG_BLOCK)
            .expect("feedback decoder block");

        // Encoder and feedback decoder share one IMC instance
        let instance = IMC_INSTANCE_MAX.to_le_bytes();
        assert!(encoder.windows(4).any(|w| w == instance));
        assert_eq!(&decoder[16..20], &instance);

        assert_eq!(s.last_enum(controls::SAMPLE_RATE_RX), Some("KHZ_88P2"));
        assert_eq!(s.last_enum(controls::SOURCE_SAMPLE_RATE_TX), Some("KHZ_8"));
        assert_eq!(s.open_feedback_count(), 1);
    });

    env.manager.stop_playback()?;
    assert!(!env.manager.snapshot().source.abr_started);

    // Unchanged rate and channel mode resolve to the last stream
    env.hal.source.set_encoder_report(raw, aptx_ad_blob(0, -1, true));
    env.manager.start_playback()?;
    let snapshot = env.manager.snapshot().source;
    assert_eq!(snapshot.sample_rate, 44100);
    assert_eq!(snapshot.channels, 1);
    assert_eq!(snapshot.backend_rate, Some(BackendRate { hz: 88200 }));
    Ok(())
}

#[test]
fn test_aptx_adaptive_without_r2_control() -> anyhow::Result<()> {
    let env = OffloadTestEnvironment::new();
    env.hal
        .source
        .set_encoder_report(CodecId::AptxAdaptive.raw(), aptx_ad_blob(0, -1, false));
    env.manager.connect(A2dpDevice::Output)?;
    env.manager.start_playback()?;

    // Nothing to fall back on yet, so the stream comes up stereo at 48 kHz
    let snapshot = env.manager.snapshot().source;
    assert_eq!(snapshot.sample_rate, 48000);
    assert_eq!(snapshot.channels, 2);
    env.hal.inspect(|s| {
        assert!(s.writes_to(controls::ENC_APTX_AD_CONFIG_BLOCK).is_empty());
        assert!(s.last_array(controls::ENC_CONFIG_BLOCK).is_some());
    });
    Ok(())
}

/// Router that stops or restarts playback from inside `check_restore`,
/// the way an audio server re-routes streams off a suspended device
struct ReroutingRouter {
    inner: Arc<MockRouter>,
    manager: OnceLock<Weak<SessionManager>>,
    reroutes: Mutex<Vec<bool>>,
}

impl PlaybackRouter for ReroutingRouter {
    fn a2dp_playback_usecases(&self) -> Vec<UsecaseId> {
        self.inner.a2dp_playback_usecases()
    }

    fn check_restore(&self, usecase: UsecaseId, restore: bool) {
        self.inner.check_restore(usecase, restore);
        let Some(manager) = self.manager.get().and_then(Weak::upgrade) else {
            return;
        };
        let result = if restore {
            manager.start_playback()
        } else {
            manager.stop_playback()
        };
        self.reroutes.lock().unwrap().push(result.is_ok());
    }
}

#[test]
fn test_router_may_reroute_during_suspend() -> anyhow::Result<()> {
    init_tracing();
    let hal = MockHal::new(MockProfile::Standard);
    hal.router.add_usecase(UsecaseId(2));
    hal.source.set_encoder_report(CodecId::Sbc.raw(), sbc_blob(3));

    let router = Arc::new(ReroutingRouter {
        inner: Arc::clone(&hal.router),
        manager: OnceLock::new(),
        reroutes: Mutex::new(Vec::new()),
    });
    let handles = OffloadHal::new(hal.mixer.clone(), hal.feedback.clone(), router.clone())
        .with_source(hal.source.clone())
        .with_sink(hal.sink.clone());
    let manager = Arc::new(SessionManager::new(OffloadConfig::default(), handles));
    let _ = router.manager.set(Arc::downgrade(&manager));

    manager.connect(A2dpDevice::Output)?;
    manager.start_playback()?;

    // A deadlock would leave the worker blocked forever
    let (tx, rx) = mpsc::channel();
    let worker = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            let suspended = manager.set_a2dp_suspended(true).is_ok();
            let resumed = manager.set_a2dp_suspended(false).is_ok();
            let _ = tx.send((suspended, resumed));
        })
    };
    let (suspended, resumed) = rx.recv_timeout(Duration::from_secs(5))?;
    worker.join().expect("worker panicked");

    assert!(suspended);
    assert!(resumed);
    assert_eq!(*router.reroutes.lock().unwrap(), vec![true, true]);
    assert_eq!(hal.source.calls().stop, 1);
    assert_eq!(hal.source.calls().start, 2);
    assert_eq!(
        hal.router.restore_calls(),
        vec![(UsecaseId(2), false), (UsecaseId(2), true)]
    );

    let snapshot = manager.snapshot().source;
    assert_eq!(snapshot.phase, Phase::Started);
    assert_eq!(snapshot.active_requests, 1);
    assert_eq!(snapshot.codec, CodecId::Sbc);
    Ok(())
}
