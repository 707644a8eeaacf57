//! Bluetooth A2DP offload session manager
//!
//! This crate sits between an audio server and a Bluetooth stack whose A2DP
//! encoding (and decoding) runs on an audio DSP. It negotiates the codec the
//! stack reports, programs the DSP and the Bluetooth backend through named
//! mixer controls, and runs the adaptive bit rate feedback channel.
//!
//! # Example
//!
//! ```no_run
//! use a2dp_offload::{A2dpDevice, OffloadHal, SessionManager};
//! use a2dp_offload_config::OffloadConfig;
//! use a2dp_offload_hal::mock::{MockHal, MockProfile};
//!
//! fn main() -> anyhow::Result<()> {
//!     let hal = MockHal::new(MockProfile::Standard);
//!     let handles = OffloadHal::new(hal.mixer.clone(), hal.feedback.clone(), hal.router.clone())
//!         .with_source(hal.source.clone())
//!         .with_sink(hal.sink.clone());
//!     let manager = SessionManager::new(OffloadConfig::default(), handles);
//!
//!     manager.connect(A2dpDevice::Output)?;
//!     manager.start_playback()?;
//!     println!("Encoder latency: {} ms", manager.encoder_latency());
//!     manager.stop_playback()?;
//!     Ok(())
//! }
//! ```

pub mod abr;
pub mod backend;
pub mod codec;
pub mod error;
pub mod manager;
pub mod mixer_ext;
pub mod session;

pub use abr::{AbrController, AbrError, ImcInstanceAllocator};
pub use backend::BackendRate;
pub use codec::{CodecConfig, CodecId, Direction, NegotiationContext, NegotiationError, negotiate};
pub use error::{OffloadError, Result};
pub use manager::{A2dpDevice, ManagerSnapshot, SessionManager};
pub use session::{OffloadHal, Phase, Session, SessionKind, SessionSnapshot, SuspendOutcome};
