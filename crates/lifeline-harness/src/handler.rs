//! Recording application handler.
//!
//! [`RecordingHandler`] runs on the application thread and appends an
//! [`Observation`] to a shared [`Trace`] for everything it sees. Tests wait
//! on the trace from the platform side and feed it to the invariant checks.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use lifeline_core::{
    ActivityState, AppContext, AppHandler, BridgeError, Command, InputEvent, LooperId,
};
use parking_lot::{Condvar, Mutex};

/// Something the application thread observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// `on_start` ran
    Started {
        /// Startup saved state was present
        has_saved_state: bool,
    },
    /// A command was dispatched
    Command {
        /// The command
        command: Command,
        /// Lifecycle state after pre-exec
        state: ActivityState,
        /// A window was bound during dispatch
        window_bound: bool,
        /// The screen was locked during dispatch
        screen_locked: bool,
    },
    /// A frame was drawn and posted
    Frame {
        /// Frame width
        width: u32,
        /// Frame height
        height: u32,
    },
    /// A frame was skipped because no surface was available
    FrameSkipped,
    /// An input event arrived
    Input {
        /// Event source tag
        source: u32,
        /// Payload length
        len: usize,
    },
    /// A timer slot fired
    Timer {
        /// Fired slot
        slot: u8,
    },
    /// An application source became ready
    Source {
        /// Its identifier
        ident: LooperId,
    },
    /// The looper was woken
    Wake,
    /// `on_exit` ran
    Exit {
        /// Lifecycle state at exit
        state: ActivityState,
    },
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { has_saved_state } => write!(f, "started saved_state={has_saved_state}"),
            Self::Command { command, state, window_bound, screen_locked } => write!(
                f,
                "command {command} state={state:?} window={window_bound} locked={screen_locked}"
            ),
            Self::Frame { width, height } => write!(f, "frame {width}x{height}"),
            Self::FrameSkipped => f.write_str("frame skipped"),
            Self::Input { source, len } => write!(f, "input source={source} len={len}"),
            Self::Timer { slot } => write!(f, "timer slot={slot}"),
            Self::Source { ident } => write!(f, "source {ident}"),
            Self::Wake => f.write_str("wake"),
            Self::Exit { state } => write!(f, "exit state={state:?}"),
        }
    }
}

/// Observations shared between the application thread and the test.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    inner: Arc<(Mutex<Vec<Observation>>, Condvar)>,
}

impl Trace {
    /// Empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observation and wake waiters.
    pub fn record(&self, observation: Observation) {
        let (observations, cond) = &*self.inner;
        observations.lock().push(observation);
        cond.notify_all();
    }

    /// Copy of everything recorded so far.
    pub fn observations(&self) -> Vec<Observation> {
        self.inner.0.lock().clone()
    }

    /// Commands dispatched so far, in order.
    pub fn commands(&self) -> Vec<Command> {
        self.inner
            .0
            .lock()
            .iter()
            .filter_map(|o| match o {
                Observation::Command { command, .. } => Some(*command),
                _ => None,
            })
            .collect()
    }

    /// One observation per line.
    pub fn render(&self) -> String {
        self.inner.0.lock().iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
    }

    /// Block until `done` holds for the recorded observations or `timeout`
    /// elapses. Returns the final value of `done`.
    pub fn wait_until(
        &self,
        timeout: Duration,
        mut done: impl FnMut(&[Observation]) -> bool,
    ) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let (observations, cond) = &*self.inner;
        let mut observations = observations.lock();
        while !done(observations.as_slice()) {
            match deadline {
                Some(deadline) => {
                    if cond.wait_until(&mut observations, deadline).timed_out() {
                        return done(observations.as_slice());
                    }
                },
                None => cond.wait(&mut observations),
            }
        }
        true
    }

    /// Block until `command` has been dispatched.
    pub fn wait_for_command(&self, command: Command, timeout: Duration) -> bool {
        self.wait_until(timeout, |obs| {
            obs.iter().any(|o| matches!(o, Observation::Command { command: c, .. } if *c == command))
        })
    }

    /// Block until `on_exit` has run.
    pub fn wait_for_exit(&self, timeout: Duration) -> bool {
        self.wait_until(timeout, |obs| obs.iter().any(|o| matches!(o, Observation::Exit { .. })))
    }
}

/// [`AppHandler`] that records everything and optionally draws, saves state
/// or stalls.
#[derive(Debug, Clone)]
pub struct RecordingHandler {
    trace: Trace,
    draw_on_redraw: bool,
    fill: u8,
    save_payload: Option<Bytes>,
    stall: Option<(Command, Duration)>,
    timer_source: bool,
}

impl RecordingHandler {
    /// Handler recording into `trace`, doing nothing else.
    pub fn new(trace: Trace) -> Self {
        Self {
            trace,
            draw_on_redraw: false,
            fill: 0,
            save_payload: None,
            stall: None,
            timer_source: false,
        }
    }

    /// Draw a frame filled with `fill` on `WindowInit`, `WindowResized` and
    /// `RedrawNeeded`.
    #[must_use]
    pub fn drawing(mut self, fill: u8) -> Self {
        self.draw_on_redraw = true;
        self.fill = fill;
        self
    }

    /// Answer save requests with `payload`.
    #[must_use]
    pub fn saving(mut self, payload: impl Into<Bytes>) -> Self {
        self.save_payload = Some(payload.into());
        self
    }

    /// Sleep for `duration` while handling `command`.
    #[must_use]
    pub fn stalling_on(mut self, command: Command, duration: Duration) -> Self {
        self.stall = Some((command, duration));
        self
    }

    /// Create the timer source in `on_start`.
    #[must_use]
    pub fn with_timer_source(mut self) -> Self {
        self.timer_source = true;
        self
    }

    fn draw(&self, ctx: &mut AppContext) -> Result<(), BridgeError> {
        let mut frame = match ctx.screen_mut().lock() {
            Ok(frame) => frame,
            Err(err) if err.is_recoverable() => {
                self.trace.record(Observation::FrameSkipped);
                return Ok(());
            },
            Err(err) => return Err(err),
        };

        frame.pixels_mut().fill(self.fill);
        let (width, height) = (frame.pixels().width(), frame.pixels().height());
        frame.unlock_and_post()?;
        self.trace.record(Observation::Frame { width, height });
        Ok(())
    }
}

impl AppHandler for RecordingHandler {
    fn on_start(&mut self, ctx: &mut AppContext) -> Result<(), BridgeError> {
        self.trace
            .record(Observation::Started { has_saved_state: ctx.startup_saved_state().is_some() });
        if self.timer_source {
            ctx.create_timer_source()?;
        }
        Ok(())
    }

    fn on_command(&mut self, ctx: &mut AppContext, command: Command) -> Result<(), BridgeError> {
        self.trace.record(Observation::Command {
            command,
            state: ctx.activity_state(),
            window_bound: ctx.window().is_some(),
            screen_locked: ctx.screen().is_locked(),
        });

        if let Some((stalled, duration)) = self.stall
            && stalled == command
        {
            std::thread::sleep(duration);
        }

        match command {
            Command::SaveState => {
                if let Some(payload) = &self.save_payload {
                    ctx.set_saved_state(payload.clone());
                }
                Ok(())
            },
            Command::WindowInit | Command::WindowResized | Command::RedrawNeeded
                if self.draw_on_redraw =>
            {
                self.draw(ctx)
            },
            _ => Ok(()),
        }
    }

    fn on_input(&mut self, _ctx: &mut AppContext, event: InputEvent) -> Result<(), BridgeError> {
        self.trace.record(Observation::Input { source: event.source, len: event.payload.len() });
        Ok(())
    }

    fn on_timer(&mut self, _ctx: &mut AppContext, slot: u8) -> Result<(), BridgeError> {
        self.trace.record(Observation::Timer { slot });
        Ok(())
    }

    fn on_source(&mut self, _ctx: &mut AppContext, ident: LooperId) -> Result<(), BridgeError> {
        self.trace.record(Observation::Source { ident });
        Ok(())
    }

    fn on_wake(&mut self, _ctx: &mut AppContext) -> Result<(), BridgeError> {
        self.trace.record(Observation::Wake);
        Ok(())
    }

    fn on_exit(&mut self, ctx: &mut AppContext) -> Result<(), BridgeError> {
        self.trace.record(Observation::Exit { state: ctx.activity_state() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn wait_returns_once_recorded_elsewhere() {
        let trace = Trace::new();
        let writer = trace.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.record(Observation::Wake);
        });

        assert!(trace.wait_until(Duration::from_secs(5), |obs| !obs.is_empty()));
        assert!(handle.join().is_ok());
    }

    #[test]
    fn unbounded_wait_returns_once_recorded() {
        let trace = Trace::new();
        let writer = trace.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.record(Observation::Wake);
        });

        assert!(trace.wait_until(Duration::MAX, |obs| !obs.is_empty()));
        assert!(handle.join().is_ok());
    }

    #[test]
    fn wait_times_out_on_silence() {
        let trace = Trace::new();
        assert!(!trace.wait_for_exit(Duration::from_millis(10)));
    }

    #[test]
    fn render_is_one_line_per_observation() {
        let trace = Trace::new();
        trace.record(Observation::Started { has_saved_state: false });
        trace.record(Observation::Frame { width: 2, height: 3 });
        assert_eq!(trace.render(), "started saved_state=false\nframe 2x3");
    }
}
