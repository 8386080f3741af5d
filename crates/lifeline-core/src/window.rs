//! Native window boundary and pixel buffer types.
//!
//! The platform supplies windows as [`NativeWindow`] trait objects. The bridge
//! never touches platform memory: `lock` describes the platform buffer, the
//! application draws into its own [`PixelBuffer`], and `unlock_and_post`
//! hands that buffer back for composition.

use std::{fmt, sync::Arc};

use thiserror::Error;

/// Shared handle to a platform window.
pub type WindowHandle = Arc<dyn NativeWindow>;

/// Pixel layouts a window buffer can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 32-bit RGBA
    Rgba8888,
    /// 32-bit RGB, alpha ignored
    Rgbx8888,
    /// 16-bit RGB 5-6-5
    Rgb565,
}

impl PixelFormat {
    /// Bytes per pixel.
    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8888 | Self::Rgbx8888 => 4,
            Self::Rgb565 => 2,
        }
    }

    /// Platform format code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Rgba8888 => 1,
            Self::Rgbx8888 => 2,
            Self::Rgb565 => 4,
        }
    }

    /// Decode a platform format code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Rgba8888),
            2 => Some(Self::Rgbx8888),
            4 => Some(Self::Rgb565),
            _ => None,
        }
    }
}

/// Current size and format of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: PixelFormat,
}

/// Platform buffer description returned by [`NativeWindow::lock`].
///
/// Refreshed on every lock; a resize shows up as different dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// Opaque platform address of the buffer
    pub address: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Row length in pixels (>= width)
    pub stride: u32,
    /// Pixel format
    pub format: PixelFormat,
}

impl BufferDescriptor {
    /// Geometry part of the descriptor.
    #[must_use]
    pub fn geometry(&self) -> WindowGeometry {
        WindowGeometry { width: self.width, height: self.height, format: self.format }
    }
}

/// Application-owned logical view of the screen.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Default for PixelBuffer {
    fn default() -> Self {
        Self { width: 0, height: 0, stride: 0, format: PixelFormat::Rgba8888, data: Vec::new() }
    }
}

impl PixelBuffer {
    /// Zeroed buffer of the given geometry, stride equal to width.
    pub fn new(geometry: WindowGeometry) -> Self {
        let mut buffer = Self::default();
        buffer.reshape(geometry);
        buffer
    }

    /// Resize the view to `geometry`. Returns whether anything changed.
    ///
    /// Contents are not preserved across a geometry change.
    pub(crate) fn reshape(&mut self, geometry: WindowGeometry) -> bool {
        if self.geometry() == geometry {
            return false;
        }
        self.width = geometry.width;
        self.height = geometry.height;
        self.stride = geometry.width;
        self.format = geometry.format;
        let len = self.row_bytes() * self.height as usize;
        self.data.clear();
        self.data.resize(len, 0);
        true
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row length in pixels.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Pixel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Geometry of the view.
    pub fn geometry(&self) -> WindowGeometry {
        WindowGeometry { width: self.width, height: self.height, format: self.format }
    }

    /// Bytes per row, stride included.
    pub fn row_bytes(&self) -> usize {
        self.stride as usize * self.format.bytes_per_pixel()
    }

    /// Whether the view has no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw pixel bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw pixel bytes, row-major.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes of row `y`, or `None` past the last row.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let range = self.row_range(y)?;
        self.data.get(range)
    }

    /// Mutable bytes of row `y`, or `None` past the last row.
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        let range = self.row_range(y)?;
        self.data.get_mut(range)
    }

    /// Byte range of row `y`; `None` past the last row or on overflow.
    fn row_range(&self, y: u32) -> Option<std::ops::Range<usize>> {
        if y >= self.height {
            return None;
        }
        let row_bytes = self.row_bytes();
        let start = row_bytes.checked_mul(y as usize)?;
        Some(start..start.checked_add(row_bytes)?)
    }

    /// Set every byte to `value`.
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }
}

/// Platform-side window failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface backing the window is gone.
    #[error("surface lost")]
    Lost,

    /// The platform refused the operation.
    #[error("surface rejected: {0}")]
    Rejected(String),
}

/// A platform window the application can draw into.
///
/// Implementations must tolerate `lock`/`unlock_and_post` from the
/// application thread while callbacks run on the platform thread.
pub trait NativeWindow: Send + Sync + fmt::Debug {
    /// Current size and format.
    fn geometry(&self) -> WindowGeometry;

    /// Prepare the platform buffer for drawing.
    ///
    /// The platform must not resize or reclaim the surface until
    /// `unlock_and_post`.
    fn lock(&self) -> Result<BufferDescriptor, SurfaceError>;

    /// Release the buffer and composite `frame` onto the window.
    fn unlock_and_post(&self, frame: &PixelBuffer) -> Result<(), SurfaceError>;
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn geometry(width: u32, height: u32, format: PixelFormat) -> WindowGeometry {
        WindowGeometry { width, height, format }
    }

    #[test]
    fn format_codes_round_trip() {
        for format in [PixelFormat::Rgba8888, PixelFormat::Rgbx8888, PixelFormat::Rgb565] {
            assert_eq!(PixelFormat::from_code(format.code()), Some(format));
        }
        assert_eq!(PixelFormat::from_code(3), None);
    }

    #[test]
    fn new_buffer_is_sized_from_geometry() {
        let buffer = PixelBuffer::new(geometry(4, 3, PixelFormat::Rgb565));
        assert_eq!(buffer.stride(), 4);
        assert_eq!(buffer.row_bytes(), 8);
        assert_eq!(buffer.data().len(), 24);
        assert!(buffer.row(2).is_some());
        assert!(buffer.row(3).is_none());
    }

    #[test]
    fn reshape_reports_changes_only() {
        let mut buffer = PixelBuffer::new(geometry(2, 2, PixelFormat::Rgba8888));
        assert!(!buffer.reshape(geometry(2, 2, PixelFormat::Rgba8888)));
        assert!(buffer.reshape(geometry(3, 1, PixelFormat::Rgba8888)));
        assert_eq!(buffer.data().len(), 12);
    }

    #[test]
    fn rows_are_independent() {
        let mut buffer = PixelBuffer::new(geometry(2, 2, PixelFormat::Rgba8888));
        buffer.row_mut(1).expect("row 1").fill(0xff);
        assert!(buffer.row(0).expect("row 0").iter().all(|b| *b == 0));
        assert!(buffer.row(1).expect("row 1").iter().all(|b| *b == 0xff));
    }

    #[test]
    fn rows_past_the_end_are_none() {
        let mut buffer = PixelBuffer::new(geometry(2, 2, PixelFormat::Rgb565));
        assert!(buffer.row(2).is_none());
        assert!(buffer.row(u32::MAX).is_none());
        assert!(buffer.row_mut(u32::MAX).is_none());
        assert!(PixelBuffer::default().row(0).is_none());
    }
}
