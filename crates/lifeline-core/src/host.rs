//! Host platform boundary.
//!
//! Everything the bridge needs from the host that is not a window or an input
//! queue: the VM binding used by the application thread, activity metadata,
//! and the configuration snapshot delivered with configuration changes.

use std::{fmt, path::PathBuf};

use bytes::Bytes;

use crate::error::BridgeError;

/// Opaque handle to a resolved host entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle(pub u64);

/// Binding to the host VM.
///
/// The application thread attaches when it starts and detaches right before
/// it exits. The binding itself must outlive the thread, which the bridge
/// guarantees by holding it in an `Arc`.
///
/// # Invariants
///
/// - `detach` is only called after a successful `attach`, on the same thread
/// - `resolve` may be called from the attached thread at any time in between
pub trait HostVm: Send + Sync + 'static {
    /// Attach the calling thread to the VM.
    fn attach(&self) -> Result<(), BridgeError>;

    /// Detach the calling thread.
    fn detach(&self);

    /// Look up a named entry point on the long-lived host object.
    fn resolve(&self, name: &str) -> Option<HostHandle>;
}

/// VM binding for hosts without a VM. Attaching always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedVm;

impl HostVm for DetachedVm {
    fn attach(&self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn detach(&self) {}

    fn resolve(&self, _name: &str) -> Option<HostHandle> {
        None
    }
}

/// Static facts about the hosting activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityInfo {
    /// Private storage directory
    pub internal_data_path: PathBuf,
    /// Shared storage directory, if available
    pub external_data_path: Option<PathBuf>,
    /// Platform API level
    pub sdk_version: u32,
}

/// Screen orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// Not reported
    #[default]
    Any,
    /// Taller than wide
    Portrait,
    /// Wider than tall
    Landscape,
    /// Square
    Square,
}

/// Snapshot of the device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Configuration {
    /// Screen orientation
    pub orientation: Orientation,
    /// Screen density in dots per inch
    pub density_dpi: u32,
    /// Screen width in density-independent pixels
    pub screen_width_dp: u32,
    /// Screen height in density-independent pixels
    pub screen_height_dp: u32,
    /// Language code, e.g. `en`
    pub language: String,
    /// Country code, e.g. `US`
    pub country: String,
    /// Night mode active
    pub night_mode: bool,
}

impl Configuration {
    /// Log every field at debug level.
    pub fn log(&self) {
        tracing::debug!(
            orientation = ?self.orientation,
            density_dpi = self.density_dpi,
            width_dp = self.screen_width_dp,
            height_dp = self.screen_height_dp,
            language = %self.language,
            country = %self.country,
            night_mode = self.night_mode,
            "configuration"
        );
    }
}

/// Visible content area of the window, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge
    pub left: i32,
    /// Top edge
    pub top: i32,
    /// Right edge (exclusive)
    pub right: i32,
    /// Bottom edge (exclusive)
    pub bottom: i32,
}

impl Rect {
    /// Width, zero for inverted rectangles.
    pub fn width(&self) -> u32 {
        span(self.left, self.right)
    }

    /// Height, zero for inverted rectangles.
    pub fn height(&self) -> u32 {
        span(self.top, self.bottom)
    }
}

/// Distance from `start` to `end`. Any two `i32` edges fit in a `u32`.
fn span(start: i32, end: i32) -> u32 {
    u32::try_from((i64::from(end) - i64::from(start)).max(0)).unwrap_or(u32::MAX)
}

/// Everything the platform hands over when the activity is created.
#[derive(Clone, Default)]
pub struct StartupParams {
    /// Activity metadata
    pub activity: ActivityInfo,
    /// State saved by a previous instance of the process
    pub saved_state: Option<Bytes>,
    /// Configuration at creation time
    pub configuration: Configuration,
}

impl fmt::Debug for StartupParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupParams")
            .field("activity", &self.activity)
            .field("saved_state_len", &self.saved_state.as_ref().map(Bytes::len))
            .field("configuration", &self.configuration)
            .finish()
    }
}
