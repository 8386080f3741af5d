//! Property-based tests for the bridge under arbitrary platform scripts.
//!
//! Tests verify that trace invariants hold whatever order the platform
//! delivers lifecycle, window and input events in.

#![allow(clippy::expect_used)]

use std::{sync::Arc, time::Duration};

use lifeline_core::{ActivityCallbacks, Application, BridgeConfig, Command, InputQueue, StartupParams};
use lifeline_harness::{
    FakeVm, FakeWindow, HostEvent, InvariantRegistry, RecordingHandler, ScriptedHost, Trace,
    TraceSnapshot,
};
use proptest::prelude::*;

const WAIT: Duration = Duration::from_secs(5);

/// Platform events without payloads; windows and queues are created fresh.
#[derive(Debug, Clone, Copy)]
enum Step {
    Start,
    Resume,
    SaveState,
    Pause,
    Stop,
    Focus(bool),
    WindowCreated(u32, u32),
    WindowResized,
    RedrawNeeded,
    WindowDestroyed,
    InputCreated,
    InputDestroyed,
    LowMemory,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        1 => Just(Step::Start),
        1 => Just(Step::Resume),
        1 => Just(Step::SaveState),
        1 => Just(Step::Pause),
        1 => Just(Step::Stop),
        1 => any::<bool>().prop_map(Step::Focus),
        2 => (1u32..16, 1u32..16).prop_map(|(w, h)| Step::WindowCreated(w, h)),
        1 => Just(Step::WindowResized),
        3 => Just(Step::RedrawNeeded),
        2 => Just(Step::WindowDestroyed),
        1 => Just(Step::InputCreated),
        1 => Just(Step::InputDestroyed),
        1 => Just(Step::LowMemory),
    ]
}

/// Turn steps into a host script, keeping the windows for later checks.
fn script(steps: &[Step]) -> (Vec<HostEvent>, Vec<Arc<FakeWindow>>) {
    let mut windows = Vec::new();
    let events = steps
        .iter()
        .map(|step| match *step {
            Step::Start => HostEvent::Start,
            Step::Resume => HostEvent::Resume,
            Step::SaveState => HostEvent::SaveState,
            Step::Pause => HostEvent::Pause,
            Step::Stop => HostEvent::Stop,
            Step::Focus(focus) => HostEvent::Focus(focus),
            Step::WindowCreated(width, height) => {
                let (window, handle) = FakeWindow::handle(width, height);
                windows.push(window);
                HostEvent::WindowCreated(handle)
            },
            Step::WindowResized => HostEvent::WindowResized,
            Step::RedrawNeeded => HostEvent::RedrawNeeded,
            Step::WindowDestroyed => HostEvent::WindowDestroyed,
            Step::InputCreated => HostEvent::InputCreated(InputQueue::channel(4).1),
            Step::InputDestroyed => HostEvent::InputDestroyed,
            Step::LowMemory => HostEvent::LowMemory,
        })
        .collect();
    (events, windows)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_invariants_hold_for_any_script(steps in prop::collection::vec(step_strategy(), 0..40)) {
        let trace = Trace::new();
        let handler = RecordingHandler::new(trace.clone()).drawing(0x11).saving(&b"state"[..]);
        let app = Application::start(
            StartupParams::default(),
            BridgeConfig::default(),
            Arc::new(FakeVm::new()),
            handler,
        )
        .expect("thread starts");

        let (events, windows) = script(&steps);
        let report = ScriptedHost::new(events).run(app.activity());
        prop_assert!(report.errors.is_empty(), "callback errors: {:?}", report.errors);

        app.activity().on_destroy().expect("queued");
        prop_assert!(app.wait_destroyed(WAIT));
        app.join().expect("no panic");

        let snapshot = TraceSnapshot::from_trace(&trace);
        prop_assert!(InvariantRegistry::standard().check_all(&snapshot).is_ok());
        let commands = trace.commands();
        prop_assert_eq!(commands.last(), Some(&Command::Destroy));
        for window in &windows {
            prop_assert!(!window.is_locked(), "window left locked");
        }
    }

    #[test]
    fn prop_every_save_request_is_answered(saves in 1usize..6) {
        let trace = Trace::new();
        let handler = RecordingHandler::new(trace.clone()).saving(&b"blob"[..]);
        let app = Application::start(
            StartupParams::default(),
            BridgeConfig::default(),
            Arc::new(FakeVm::new()),
            handler,
        )
        .expect("thread starts");

        let report = ScriptedHost::new(vec![HostEvent::SaveState; saves]).run(app.activity());
        prop_assert_eq!(report.saved_states.len(), saves);
        prop_assert!(report.saved_states.iter().all(|s| s.as_deref() == Some(&b"blob"[..])));

        app.activity().on_destroy().expect("queued");
        prop_assert!(app.wait_destroyed(WAIT));
        app.join().expect("no panic");
    }
}
