//! Screen buffer guard.
//!
//! Serializes access to the window's pixel buffer between the application
//! thread (drawing) and the platform (compositing, resizing).
//!
//! ```text
//! ┌──────────┐  lock()   ┌────────┐
//! │ Unlocked │──────────>│ Locked │
//! └──────────┘<──────────└────────┘
//!       unlock_and_post() / drop
//! ```
//!
//! [`ScreenBuffer::lock`] returns a [`ScreenLock`]; dropping it releases and
//! posts the frame, so every successful lock is matched exactly once on every
//! exit path. The guard is not reentrant.

use std::{fmt, sync::Arc};

use crate::{
    error::{BridgeError, resource_leak},
    shared::Shared,
    window::{BufferDescriptor, PixelBuffer, WindowGeometry, WindowHandle},
};

/// The application's view of the screen plus the lock protocol around it.
pub struct ScreenBuffer {
    shared: Arc<Shared>,
    pixels: PixelBuffer,
}

impl fmt::Debug for ScreenBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenBuffer")
            .field("pixels", &self.pixels)
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl ScreenBuffer {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared, pixels: PixelBuffer::default() }
    }

    /// Whether a frame is currently being drawn.
    ///
    /// Advisory: by the time the caller acts on it the answer may have
    /// changed.
    pub fn is_locked(&self) -> bool {
        self.shared.lock().screen_locked
    }

    /// The logical buffer as last allocated.
    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Recompute the logical buffer for `geometry`. Does not draw.
    pub fn allocate(&mut self, geometry: WindowGeometry) {
        if self.pixels.reshape(geometry) {
            tracing::debug!(
                width = geometry.width,
                height = geometry.height,
                format = ?geometry.format,
                "screen buffer allocated"
            );
        }
    }

    /// Acquire the buffer for drawing a frame.
    ///
    /// # Errors
    ///
    /// - `BridgeError::SurfaceUnavailable` if no window is bound or the
    ///   platform refuses the lock; skip the frame
    /// - `BridgeError::ResourceLeak` (debug builds) if a previous lock was
    ///   never released
    pub fn lock(&mut self) -> Result<ScreenLock<'_>, BridgeError> {
        let window = {
            let mut state = self.shared.lock();
            if state.screen_locked {
                resource_leak("screen buffer locked twice")?;
            }
            let Some(window) = state.window.clone() else {
                return Err(BridgeError::surface("no window bound"));
            };
            state.screen_locked = true;
            window
        };

        let descriptor = match window.lock() {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.shared.lock().screen_locked = false;
                return Err(BridgeError::surface(err.to_string()));
            },
        };

        self.allocate(descriptor.geometry());
        Ok(ScreenLock { screen: self, window, descriptor, released: false })
    }

    fn release(&mut self, window: &WindowHandle) -> Result<(), BridgeError> {
        let posted = window.unlock_and_post(&self.pixels);
        self.shared.lock().screen_locked = false;
        posted.map_err(|err| BridgeError::surface(err.to_string()))
    }
}

/// An acquired screen buffer. Released and posted on drop.
pub struct ScreenLock<'a> {
    screen: &'a mut ScreenBuffer,
    window: WindowHandle,
    descriptor: BufferDescriptor,
    released: bool,
}

impl fmt::Debug for ScreenLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenLock").field("descriptor", &self.descriptor).finish_non_exhaustive()
    }
}

impl ScreenLock<'_> {
    /// Platform buffer description captured at lock time.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// The frame being drawn.
    pub fn pixels(&self) -> &PixelBuffer {
        &self.screen.pixels
    }

    /// The frame being drawn, writable.
    pub fn pixels_mut(&mut self) -> &mut PixelBuffer {
        &mut self.screen.pixels
    }

    /// Release the buffer and ask the platform to display the frame.
    ///
    /// # Errors
    ///
    /// - `BridgeError::SurfaceUnavailable` if the platform rejected the post;
    ///   the buffer is released regardless
    pub fn unlock_and_post(mut self) -> Result<(), BridgeError> {
        self.released = true;
        self.screen.release(&self.window)
    }
}

impl Drop for ScreenLock<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.screen.release(&self.window) {
            tracing::warn!(%err, "frame dropped on implicit unlock");
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::{config::BridgeConfig, host::Configuration, testing::StubWindow};

    fn bound_screen(window: &Arc<StubWindow>) -> ScreenBuffer {
        let shared = Shared::new(BridgeConfig::default(), Configuration::default());
        let handle: WindowHandle = Arc::clone(window) as WindowHandle;
        shared.lock().window = Some(handle);
        ScreenBuffer::new(shared)
    }

    #[test]
    fn no_window_means_no_frame() {
        let shared = Shared::new(BridgeConfig::default(), Configuration::default());
        let mut screen = ScreenBuffer::new(shared);

        assert!(matches!(screen.lock(), Err(BridgeError::SurfaceUnavailable { .. })));
        assert!(!screen.is_locked());
    }

    #[test]
    fn repeated_lock_unlock_posts_every_frame() {
        let window = Arc::new(StubWindow::new(4, 2));
        let mut screen = bound_screen(&window);

        for _ in 0..3 {
            let mut frame = screen.lock().expect("window bound");
            assert_eq!(frame.descriptor().width, 4);
            frame.pixels_mut().fill(0xff);
            frame.unlock_and_post().expect("post accepted");
            assert!(!screen.is_locked());
        }
        assert_eq!(window.posts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dropping_the_guard_releases_and_posts() {
        let window = Arc::new(StubWindow::new(2, 2));
        let mut screen = bound_screen(&window);

        {
            let frame = screen.lock().expect("window bound");
            assert_eq!(frame.pixels().height(), 2);
        }

        assert!(!screen.is_locked());
        assert_eq!(window.posts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refused_lock_leaves_the_guard_unlocked() {
        let window = Arc::new(StubWindow::new(2, 2));
        window.refuse_lock.store(true, Ordering::SeqCst);
        let mut screen = bound_screen(&window);

        assert!(matches!(screen.lock(), Err(BridgeError::SurfaceUnavailable { .. })));
        assert!(!screen.is_locked());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn leaked_guard_is_reported() {
        let window = Arc::new(StubWindow::new(2, 2));
        let mut screen = bound_screen(&window);

        std::mem::forget(screen.lock().expect("window bound"));

        assert_eq!(
            screen.lock().map(|_| ()),
            Err(BridgeError::ResourceLeak { what: "screen buffer locked twice" })
        );
    }
}
