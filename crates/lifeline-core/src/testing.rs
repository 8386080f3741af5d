//! Minimal doubles for unit tests inside this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::window::{
    BufferDescriptor, NativeWindow, PixelBuffer, PixelFormat, SurfaceError, WindowGeometry,
};

#[derive(Debug)]
pub(crate) struct StubWindow {
    pub(crate) geometry: WindowGeometry,
    pub(crate) refuse_lock: AtomicBool,
    pub(crate) posts: AtomicUsize,
}

impl StubWindow {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            geometry: WindowGeometry { width, height, format: PixelFormat::Rgba8888 },
            refuse_lock: AtomicBool::new(false),
            posts: AtomicUsize::new(0),
        }
    }
}

impl NativeWindow for StubWindow {
    fn geometry(&self) -> WindowGeometry {
        self.geometry
    }

    fn lock(&self) -> Result<BufferDescriptor, SurfaceError> {
        if self.refuse_lock.load(Ordering::SeqCst) {
            return Err(SurfaceError::Lost);
        }
        Ok(BufferDescriptor {
            address: 0x1000,
            width: self.geometry.width,
            height: self.geometry.height,
            stride: self.geometry.width,
            format: self.geometry.format,
        })
    }

    fn unlock_and_post(&self, _frame: &PixelBuffer) -> Result<(), SurfaceError> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
