//! Demo application.
//!
//! Animates a solid colour while resumed. A ticker thread posts timer slots
//! through the bridge's timer channel; every slot advances the colour and
//! draws a frame. The current colour is the saved state.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use bytes::Bytes;
use lifeline_core::{AppContext, AppHandler, BridgeError, Command, InputEvent};
use parking_lot::{Condvar, Mutex};

/// Colour step per timer tick.
const HUE_STEP: u8 = 8;

/// Counters shared with the simulator.
#[derive(Debug, Clone, Default)]
pub struct DemoStats {
    frames: Arc<AtomicUsize>,
    skipped: Arc<AtomicUsize>,
    ticks: Arc<AtomicUsize>,
    inputs: Arc<(Mutex<usize>, Condvar)>,
}

impl DemoStats {
    /// Frames posted.
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::Relaxed)
    }

    /// Frames skipped for lack of a surface.
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Timer slots received.
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Input events received.
    pub fn inputs(&self) -> usize {
        *self.inputs.0.lock()
    }

    /// Block until at least `count` input events were received or `timeout`
    /// elapses. Returns whether they were.
    pub fn wait_for_inputs(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let (inputs, cond) = &*self.inputs;
        let mut inputs = inputs.lock();
        while *inputs < count {
            match deadline {
                Some(deadline) => {
                    if cond.wait_until(&mut inputs, deadline).timed_out() {
                        return *inputs >= count;
                    }
                },
                None => cond.wait(&mut inputs),
            }
        }
        true
    }

    fn record_input(&self) {
        let (inputs, cond) = &*self.inputs;
        *inputs.lock() += 1;
        cond.notify_all();
    }
}

struct Ticker {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// The demo [`AppHandler`].
pub struct DemoHandler {
    tick: Duration,
    hue: u8,
    animating: bool,
    ticker: Option<Ticker>,
    stats: DemoStats,
}

impl std::fmt::Debug for DemoHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoHandler")
            .field("tick", &self.tick)
            .field("hue", &self.hue)
            .field("animating", &self.animating)
            .field("ticking", &self.ticker.is_some())
            .finish_non_exhaustive()
    }
}

impl DemoHandler {
    /// Handler ticking every `tick`, counting into `stats`.
    pub fn new(tick: Duration, stats: DemoStats) -> Self {
        Self { tick, hue: 0, animating: false, ticker: None, stats }
    }

    fn start_ticker(&mut self, ctx: &mut AppContext) -> Result<(), BridgeError> {
        ctx.create_timer_source()?;
        let Some(sender) = ctx.timer_sender() else {
            return Ok(());
        };

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let tick = self.tick;
        let thread = thread::Builder::new()
            .name("lifeline-ticker".to_string())
            .spawn(move || {
                let mut slot = 0u8;
                while !flag.load(Ordering::Acquire) {
                    thread::sleep(tick);
                    sender.send_timer_index(slot);
                    slot = slot.wrapping_add(1);
                }
            })
            .map_err(|err| BridgeError::Spawn(err.to_string()))?;

        self.ticker = Some(Ticker { stop, thread });
        Ok(())
    }

    fn stop_ticker(&mut self, ctx: &mut AppContext) {
        if let Some(Ticker { stop, thread }) = self.ticker.take() {
            stop.store(true, Ordering::Release);
            if thread.join().is_err() {
                tracing::warn!("ticker thread panicked");
            }
        }
        ctx.destroy_timer_source();
    }

    fn draw(&self, ctx: &mut AppContext) -> Result<(), BridgeError> {
        let mut frame = match ctx.screen_mut().lock() {
            Ok(frame) => frame,
            Err(err) if err.is_recoverable() => {
                tracing::debug!(%err, "no surface, frame skipped");
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            },
            Err(err) => return Err(err),
        };

        frame.pixels_mut().fill(self.hue);
        let (width, height) = (frame.pixels().width(), frame.pixels().height());
        frame.unlock_and_post()?;

        let frames = self.stats.frames.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(frames, width, height, hue = self.hue, "frame posted");
        Ok(())
    }
}

impl AppHandler for DemoHandler {
    fn on_start(&mut self, ctx: &mut AppContext) -> Result<(), BridgeError> {
        if let Some(&hue) = ctx.startup_saved_state().and_then(|state| state.first()) {
            tracing::info!(hue, "restored colour from saved state");
            self.hue = hue;
        }
        self.start_ticker(ctx)
    }

    fn on_command(&mut self, ctx: &mut AppContext, command: Command) -> Result<(), BridgeError> {
        match command {
            Command::Resume => self.animating = true,
            Command::Pause => self.animating = false,
            Command::SaveState => ctx.set_saved_state(Bytes::copy_from_slice(&[self.hue])),
            Command::WindowInit | Command::WindowResized | Command::RedrawNeeded => {
                return self.draw(ctx);
            },
            Command::ContentRectChanged => {
                let rect = ctx.content_rect();
                tracing::info!(width = rect.width(), height = rect.height(), "content area");
            },
            Command::LowMemory => tracing::info!("low memory, nothing to release"),
            _ => {},
        }
        Ok(())
    }

    fn on_input(&mut self, _ctx: &mut AppContext, event: InputEvent) -> Result<(), BridgeError> {
        self.stats.record_input();
        tracing::info!(source = event.source, len = event.payload.len(), "input");
        Ok(())
    }

    fn on_timer(&mut self, ctx: &mut AppContext, slot: u8) -> Result<(), BridgeError> {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);
        if !self.animating {
            return Ok(());
        }
        self.hue = self.hue.wrapping_add(HUE_STEP);
        tracing::trace!(slot, hue = self.hue, "tick");
        self.draw(ctx)
    }

    fn on_exit(&mut self, ctx: &mut AppContext) -> Result<(), BridgeError> {
        self.stop_ticker(ctx);
        tracing::info!(
            frames = self.stats.frames(),
            skipped = self.stats.skipped(),
            ticks = self.stats.ticks(),
            "demo finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_wait_returns_once_counted_elsewhere() {
        let stats = DemoStats::default();
        let writer = stats.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.record_input();
            writer.record_input();
        });

        assert!(stats.wait_for_inputs(2, Duration::MAX));
        assert_eq!(stats.inputs(), 2);
        assert!(handle.join().is_ok());
    }

    #[test]
    fn input_wait_times_out() {
        let stats = DemoStats::default();
        assert!(!stats.wait_for_inputs(1, Duration::from_millis(10)));
    }
}
