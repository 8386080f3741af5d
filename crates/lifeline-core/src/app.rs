//! Application thread bootstrap and poll loop.
//!
//! [`Application::start`] spawns the dedicated application thread and waits
//! until it reports running. The thread attaches to the host VM, builds its
//! [`AppContext`], then runs the poll loop:
//!
//! ```text
//! poll_once ─┬─ MAIN   → read → pre_exec → on_command → post_exec
//!            ├─ INPUT  → on_input (one event)
//!            ├─ TIMER  → on_timer (one slot)
//!            ├─ user   → on_source
//!            ├─ Woken  → on_wake
//!            └─ Timeout→ on_idle
//! ```
//!
//! Once `Destroy` is dequeued the loop drains the remaining commands through
//! their hooks without dispatching them, tears down and exits.

use std::{
    any::Any,
    fmt,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    activity::Activity,
    channel::{CommandReader, command_channel},
    command::Command,
    config::BridgeConfig,
    context::AppContext,
    error::BridgeError,
    host::{HostVm, StartupParams},
    input::InputEvent,
    lifecycle::Lifecycle,
    looper::{LooperId, Poll},
    shared::Shared,
};

const THREAD_NAME: &str = "lifeline-app";

/// Application logic driven by the bridge.
///
/// Every method runs on the application thread. All have no-op defaults.
/// Errors are logged by the loop and do not stop it; call sites that need
/// to stop should act on the lifecycle instead.
#[allow(unused_variables)]
pub trait AppHandler: Send + 'static {
    /// Thread is attached and running; nothing dispatched yet.
    fn on_start(&mut self, ctx: &mut AppContext) -> Result<(), BridgeError> {
        Ok(())
    }

    /// A lifecycle command, between its pre- and post-exec hooks.
    fn on_command(&mut self, ctx: &mut AppContext, command: Command) -> Result<(), BridgeError> {
        Ok(())
    }

    /// One event from the attached input queue.
    fn on_input(&mut self, ctx: &mut AppContext, event: InputEvent) -> Result<(), BridgeError> {
        Ok(())
    }

    /// One fired timer slot.
    fn on_timer(&mut self, ctx: &mut AppContext, slot: u8) -> Result<(), BridgeError> {
        Ok(())
    }

    /// An application source registered with [`crate::Looper::add_source`] is
    /// ready. The handler must drain it.
    fn on_source(&mut self, ctx: &mut AppContext, ident: LooperId) -> Result<(), BridgeError> {
        Ok(())
    }

    /// The looper was woken through a [`crate::LooperWaker`].
    fn on_wake(&mut self, ctx: &mut AppContext) -> Result<(), BridgeError> {
        Ok(())
    }

    /// Nothing happened within [`BridgeConfig::poll_timeout`].
    fn on_idle(&mut self, ctx: &mut AppContext) -> Result<(), BridgeError> {
        Ok(())
    }

    /// The loop has ended; the context is still intact.
    fn on_exit(&mut self, ctx: &mut AppContext) -> Result<(), BridgeError> {
        Ok(())
    }
}

/// A running application thread and its dispatcher.
pub struct Application {
    activity: Activity,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("lifecycle", &self.lifecycle())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Spawn the application thread and wait until it is running.
    ///
    /// # Errors
    ///
    /// - `BridgeError::Spawn` if the thread could not be created
    /// - `BridgeError::Vm` (or whatever `vm.attach` returned) if the thread
    ///   could not attach
    /// - `BridgeError::StartupTimeout` if it did not report running within
    ///   [`BridgeConfig::handoff_timeout`]
    pub fn start<H: AppHandler>(
        params: StartupParams,
        config: BridgeConfig,
        vm: Arc<dyn HostVm>,
        handler: H,
    ) -> Result<Self, BridgeError> {
        let config = config.normalized();
        let timeout = config.handoff_timeout;
        let (writer, reader) = command_channel(config.command_capacity);
        let shared = Shared::new(config, params.configuration.clone());

        tracing::info!(
            command_capacity = shared.config().command_capacity,
            timer_capacity = shared.config().timer_capacity,
            has_saved_state = params.saved_state.is_some(),
            "starting application thread"
        );

        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || app_thread(thread_shared, reader, params, vm, handler))
            .map_err(|err| BridgeError::Spawn(err.to_string()))?;

        let ready = shared.wait_for(timeout, |s| s.lifecycle.is_running() || s.destroyed);
        let (startup_error, died) = {
            let mut state = shared.lock();
            (state.startup_error.take(), state.destroyed && !state.lifecycle.is_running())
        };

        if let Some(err) = startup_error {
            // Attach failed; the thread has already returned.
            if let Err(payload) = thread.join() {
                tracing::error!(panic = panic_message(&*payload), "application thread panicked");
            }
            return Err(err);
        }
        if died {
            let payload = thread.join().err();
            let panic = payload.as_deref().map_or("none", panic_message);
            tracing::error!(panic, "application thread died before running");
            return Err(BridgeError::ThreadPanicked);
        }
        if !ready {
            tracing::error!(?timeout, "application thread did not start");
            return Err(BridgeError::StartupTimeout { waited: timeout });
        }

        Ok(Self { activity: Activity::new(Arc::clone(&shared), writer), shared, thread: Some(thread) })
    }

    /// The dispatcher the platform calls into.
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Snapshot of the application's lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lock().lifecycle.clone()
    }

    /// Whether the application thread has exited.
    pub fn is_destroyed(&self) -> bool {
        self.shared.lock().destroyed
    }

    /// Block until the application thread has exited or `timeout` elapses.
    /// Returns whether it exited.
    pub fn wait_destroyed(&self, timeout: Duration) -> bool {
        self.shared.wait_for(timeout, |s| s.destroyed)
    }

    /// Drop this handle's dispatcher and wait for the thread to finish.
    ///
    /// The thread ends after `Destroy`, or once every [`Activity`] clone is
    /// gone.
    ///
    /// # Errors
    ///
    /// - `BridgeError::ThreadPanicked` if the application thread panicked
    pub fn join(self) -> Result<(), BridgeError> {
        let Self { activity, shared: _, thread } = self;
        drop(activity);
        match thread {
            Some(thread) => thread.join().map_err(|payload| {
                tracing::error!(panic = panic_message(&*payload), "application thread panicked");
                BridgeError::ThreadPanicked
            }),
            None => Ok(()),
        }
    }
}

/// Text of a panic payload, when it carries one.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Marks the thread finished on every exit path, unwinding included.
struct FinishGuard(Arc<Shared>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

fn app_thread<H: AppHandler>(
    shared: Arc<Shared>,
    commands: CommandReader,
    params: StartupParams,
    vm: Arc<dyn HostVm>,
    mut handler: H,
) {
    let span = tracing::info_span!("app_thread");
    let _entered = span.enter();
    let _finish = FinishGuard(Arc::clone(&shared));

    if let Err(err) = vm.attach() {
        tracing::error!(%err, "VM attach failed");
        shared.fail_startup(err);
        return;
    }

    let mut ctx = match AppContext::new(Arc::clone(&shared), commands, Arc::clone(&vm), params) {
        Ok(ctx) => ctx,
        Err(err) => {
            vm.detach();
            shared.fail_startup(err);
            return;
        },
    };

    shared.lock().lifecycle.mark_running(true);
    shared.notify();
    tracing::info!("application thread running");

    report("on_start", handler.on_start(&mut ctx));
    run_loop(&mut ctx, &mut handler);
    report("on_exit", handler.on_exit(&mut ctx));

    ctx.teardown();
    drop(ctx);
    vm.detach();
    tracing::info!("application thread exiting");
}

fn run_loop<H: AppHandler>(ctx: &mut AppContext, handler: &mut H) {
    let timeout = ctx.bridge_config().poll_timeout;

    loop {
        match ctx.looper_mut().poll_once(timeout) {
            Poll::Ready(LooperId::MAIN) => match ctx.read_command() {
                Ok(Some(command)) => dispatch_command(ctx, handler, command),
                Ok(None) => {},
                Err(BridgeError::PipeClosed { .. }) => {
                    tracing::debug!("command channel closed");
                    break;
                },
                Err(err) => tracing::warn!(%err, "skipping undecodable command"),
            },
            Poll::Ready(LooperId::INPUT) => {
                if let Some(event) = ctx.next_input_event() {
                    report("on_input", handler.on_input(ctx, event));
                }
            },
            Poll::Ready(LooperId::TIMER) => {
                if let Some(slot) = ctx.receive_timer_index() {
                    report("on_timer", handler.on_timer(ctx, slot));
                }
            },
            Poll::Ready(ident) => report("on_source", handler.on_source(ctx, ident)),
            Poll::Woken => report("on_wake", handler.on_wake(ctx)),
            Poll::Timeout => report("on_idle", handler.on_idle(ctx)),
        }

        if ctx.is_destroy_requested() {
            tracing::debug!("destroy requested, leaving poll loop");
            ctx.drain_commands();
            break;
        }
    }
}

fn dispatch_command<H: AppHandler>(ctx: &mut AppContext, handler: &mut H, command: Command) {
    let deliver = !ctx.is_destroy_requested();
    ctx.pre_exec(command);
    if deliver {
        tracing::trace!(%command, "dispatching command");
        report("on_command", handler.on_command(ctx, command));
    }
    ctx.post_exec(command);
}

fn report(callback: &'static str, result: Result<(), BridgeError>) {
    match result {
        Ok(()) => {},
        Err(err) if err.is_recoverable() => tracing::debug!(callback, %err, "handler error"),
        Err(err) => tracing::warn!(callback, %err, "handler error"),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{activity::ActivityCallbacks, host::DetachedVm};

    #[derive(Default)]
    struct Counting {
        commands: Arc<AtomicUsize>,
    }

    impl AppHandler for Counting {
        fn on_command(
            &mut self,
            _ctx: &mut AppContext,
            _command: Command,
        ) -> Result<(), BridgeError> {
            self.commands.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingVm;

    impl HostVm for FailingVm {
        fn attach(&self) -> Result<(), BridgeError> {
            Err(BridgeError::Vm("no VM".to_string()))
        }

        fn detach(&self) {}

        fn resolve(&self, _name: &str) -> Option<crate::host::HostHandle> {
            None
        }
    }

    #[test]
    fn starts_running_and_stops_on_destroy() {
        let handler = Counting::default();
        let commands = Arc::clone(&handler.commands);
        let app = Application::start(
            StartupParams::default(),
            BridgeConfig::default(),
            Arc::new(DetachedVm),
            handler,
        )
        .expect("thread starts");
        assert!(app.lifecycle().is_running());

        app.activity().on_start().expect("queued");
        app.activity().on_destroy().expect("queued");

        assert!(app.wait_destroyed(Duration::from_secs(5)));
        assert!(!app.lifecycle().is_running());
        assert_eq!(commands.load(Ordering::SeqCst), 2);
        app.join().expect("clean exit");
    }

    #[test]
    fn attach_failure_is_reported_by_start() {
        let result = Application::start(
            StartupParams::default(),
            BridgeConfig::default(),
            Arc::new(FailingVm),
            Counting::default(),
        );
        assert_eq!(result.map(|_| ()), Err(BridgeError::Vm("no VM".to_string())));
    }

    struct PanickingVm;

    impl HostVm for PanickingVm {
        #[allow(clippy::panic)]
        fn attach(&self) -> Result<(), BridgeError> {
            panic!("attach exploded")
        }

        fn detach(&self) {}

        fn resolve(&self, _name: &str) -> Option<crate::host::HostHandle> {
            None
        }
    }

    #[test]
    fn panic_before_running_is_reported_by_start() {
        let result = Application::start(
            StartupParams::default(),
            BridgeConfig::default(),
            Arc::new(PanickingVm),
            Counting::default(),
        );
        assert_eq!(result.map(|_| ()), Err(BridgeError::ThreadPanicked));
    }

    #[test]
    fn panic_messages_are_extracted() {
        let borrowed: Box<dyn Any + Send> = Box::new("static text");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned text"));
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*borrowed), "static text");
        assert_eq!(panic_message(&*owned), "owned text");
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }

    #[test]
    fn dropping_every_dispatcher_ends_the_thread() {
        let app = Application::start(
            StartupParams::default(),
            BridgeConfig::default(),
            Arc::new(DetachedVm),
            Counting::default(),
        )
        .expect("thread starts");
        app.join().expect("clean exit");
    }
}
