//! Fake native window.
//!
//! Behaves like a platform surface that can be resized, lost and inspected.
//! Every successful post is recorded with the geometry of the frame.

use std::sync::Arc;

use lifeline_core::{
    BufferDescriptor, NativeWindow, PixelBuffer, PixelFormat, SurfaceError, WindowGeometry,
    WindowHandle,
};
use parking_lot::Mutex;

/// One composited frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostedFrame {
    /// Geometry of the posted buffer
    pub geometry: WindowGeometry,
    /// First byte of the buffer, or `None` for an empty frame
    pub first_byte: Option<u8>,
}

#[derive(Debug)]
struct WindowState {
    geometry: WindowGeometry,
    lost: bool,
    locked: bool,
    locks: usize,
    posts: Vec<PostedFrame>,
}

/// Scriptable [`NativeWindow`].
#[derive(Debug)]
pub struct FakeWindow {
    state: Mutex<WindowState>,
}

impl FakeWindow {
    /// RGBA window of `width` x `height` pixels.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_geometry(WindowGeometry { width, height, format: PixelFormat::Rgba8888 })
    }

    /// Window with an explicit geometry.
    pub fn with_geometry(geometry: WindowGeometry) -> Self {
        Self {
            state: Mutex::new(WindowState {
                geometry,
                lost: false,
                locked: false,
                locks: 0,
                posts: Vec::new(),
            }),
        }
    }

    /// Shared handle, ready to hand to the bridge.
    pub fn handle(width: u32, height: u32) -> (Arc<Self>, WindowHandle) {
        let window = Arc::new(Self::new(width, height));
        let handle: WindowHandle = Arc::clone(&window) as WindowHandle;
        (window, handle)
    }

    /// Change the size reported by the next `geometry` or `lock`.
    pub fn resize(&self, width: u32, height: u32) {
        let mut state = self.state.lock();
        state.geometry.width = width;
        state.geometry.height = height;
    }

    /// Make every following `lock` fail until [`FakeWindow::restore`].
    pub fn lose_surface(&self) {
        self.state.lock().lost = true;
    }

    /// Undo [`FakeWindow::lose_surface`].
    pub fn restore(&self) {
        self.state.lock().lost = false;
    }

    /// Whether the platform buffer is currently locked.
    pub fn is_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Successful locks so far.
    pub fn lock_count(&self) -> usize {
        self.state.lock().locks
    }

    /// Frames posted so far, oldest first.
    pub fn posted(&self) -> Vec<PostedFrame> {
        self.state.lock().posts.clone()
    }
}

impl NativeWindow for FakeWindow {
    fn geometry(&self) -> WindowGeometry {
        self.state.lock().geometry
    }

    fn lock(&self) -> Result<BufferDescriptor, SurfaceError> {
        let mut state = self.state.lock();
        if state.lost {
            return Err(SurfaceError::Lost);
        }
        if state.locked {
            return Err(SurfaceError::Rejected("already locked".to_string()));
        }
        state.locked = true;
        state.locks += 1;

        let geometry = state.geometry;
        Ok(BufferDescriptor {
            address: 0x4000_0000 + state.locks,
            width: geometry.width,
            height: geometry.height,
            stride: geometry.width,
            format: geometry.format,
        })
    }

    fn unlock_and_post(&self, frame: &PixelBuffer) -> Result<(), SurfaceError> {
        let mut state = self.state.lock();
        if !state.locked {
            return Err(SurfaceError::Rejected("post without lock".to_string()));
        }
        state.locked = false;
        state.posts.push(PostedFrame {
            geometry: frame.geometry(),
            first_byte: frame.data().first().copied(),
        });
        Ok(())
    }
}
