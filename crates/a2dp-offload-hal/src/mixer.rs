//! Named-control plane (ALSA-style mixer)

use crate::Result;

/// Opaque handle to a resolved mixer control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(pub u32);

/// Access to the platform's mixer controls.
///
/// Implementations are shared by the source and sink sessions, which run under
/// independent locks, so all methods take `&self`.
pub trait Mixer: Send + Sync {
    /// Resolve a control by name
    fn control(&self, name: &str) -> Option<ControlId>;

    /// Write a scalar value to element 0 of the control
    fn set_value(&self, ctl: ControlId, value: i64) -> Result<()>;

    /// Select an enumerated value by its label
    fn set_enum(&self, ctl: ControlId, label: &str) -> Result<()>;

    /// Write a raw byte array (configuration blocks)
    fn set_array(&self, ctl: ControlId, bytes: &[u8]) -> Result<()>;

    fn has_control(&self, name: &str) -> bool {
        self.control(name).is_some()
    }
}
