//! Scripted platform scenarios.
//!
//! Each scenario is a fixed platform script played by a
//! [`ScriptedHost`] against a fresh [`Application`] running the demo handler.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use clap::ValueEnum;
use lifeline_core::{
    ActivityCallbacks, Application, BridgeConfig, Configuration, DetachedVm, HostVm, InputEvent, InputFeeder,
    InputQueue, Orientation, Rect, StartupParams,
};
use lifeline_harness::{FakeWindow, HostEvent, HostReport, ScriptedHost};

use crate::{
    demo::{DemoHandler, DemoStats},
    error::SimError,
};

/// Input events queued before the lifecycle scenario hands over its queue.
const QUEUED_INPUTS: usize = 3;

/// Shortest pause the scripts make between phases.
const MIN_SETTLE: Duration = Duration::from_millis(20);

/// Which script to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Start, draw, take input, save, tear down
    Lifecycle,
    /// Replace a portrait window with a landscape one mid-run
    Rotate,
    /// Save state, kill the instance, restore it in a new one
    Restart,
}

/// Knobs shared by every scenario.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Bridge configuration for each instance
    pub config: BridgeConfig,
    /// Demo ticker period
    pub tick: Duration,
}

impl RunSettings {
    fn settle(&self) -> Duration {
        self.tick.saturating_mul(5).max(MIN_SETTLE)
    }
}

/// What a scenario produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Application instances started
    pub instances: usize,
    /// Frames the demo posted
    pub frames: usize,
    /// Frames the demo skipped
    pub skipped: usize,
    /// Timer slots the demo received
    pub ticks: usize,
    /// Input events the demo received
    pub inputs: usize,
    /// Frames the fake windows composited
    pub composited: usize,
    /// Blobs returned to the platform by save requests
    pub saved_states: Vec<Option<Bytes>>,
}

impl RunSummary {
    fn absorb(&mut self, played: Played) {
        self.instances += 1;
        self.frames += played.stats.frames();
        self.skipped += played.stats.skipped();
        self.ticks += played.stats.ticks();
        self.inputs += played.stats.inputs();
        self.composited += played.windows.iter().map(|w| w.posted().len()).sum::<usize>();
        self.saved_states.extend(played.saved_states);
    }
}

/// One step of a script.
enum Stage {
    /// Deliver a platform event
    Host(HostEvent),
    /// Hold the platform until the application has read this many inputs
    AwaitInputs(usize),
}

/// A platform script plus the fakes it hands out.
struct Script {
    stages: Vec<Stage>,
    windows: Vec<Arc<FakeWindow>>,
    feeder: Option<InputFeeder>,
}

impl Script {
    fn new() -> Self {
        Self { stages: Vec::new(), windows: Vec::new(), feeder: None }
    }

    fn push(&mut self, event: HostEvent) -> &mut Self {
        self.stages.push(Stage::Host(event));
        self
    }

    fn await_inputs(&mut self, count: usize) -> &mut Self {
        self.stages.push(Stage::AwaitInputs(count));
        self
    }

    fn window(&mut self, width: u32, height: u32) -> &mut Self {
        let (window, handle) = FakeWindow::handle(width, height);
        self.windows.push(window);
        self.push(HostEvent::WindowCreated(handle))
    }

    /// Hand over an input queue holding `queued` events.
    fn input(&mut self, queued: usize) -> Result<&mut Self, SimError> {
        let (feeder, queue) = InputQueue::channel(queued.max(1));
        for n in 0..queued {
            if !feeder.push(InputEvent::new(n as u32, vec![0u8; n + 1])) {
                return Err(SimError::InputRejected { index: n });
            }
        }
        self.feeder = Some(feeder);
        Ok(self.push(HostEvent::InputCreated(queue)))
    }
}

struct Played {
    stats: DemoStats,
    windows: Vec<Arc<FakeWindow>>,
    saved_states: Vec<Option<Bytes>>,
}

/// Play `scenario` to completion.
///
/// # Errors
///
/// - `SimError::Bridge` if an instance fails to start or its thread panics
/// - `SimError::Callback` for the first failing platform callback
/// - `SimError::InputRejected` if a scripted input could not be queued
/// - `SimError::InputsNotRead` if the application stopped reading input
/// - `SimError::NotDestroyed` if an instance outlives its `Destroy`
/// - `SimError::StateNotRestored` if a restarted instance lost its state
pub fn run(scenario: Scenario, settings: &RunSettings) -> Result<RunSummary, SimError> {
    tracing::info!(?scenario, tick = ?settings.tick, "running scenario");
    let mut summary = RunSummary::default();

    match scenario {
        Scenario::Lifecycle => {
            summary.absorb(play(StartupParams::default(), lifecycle_script(settings)?, settings)?);
        },
        Scenario::Rotate => {
            summary.absorb(play(StartupParams::default(), rotate_script(settings), settings)?);
        },
        Scenario::Restart => {
            let first = play(StartupParams::default(), first_life_script(settings), settings)?;
            let expected = first.saved_states.last().cloned().flatten();
            summary.absorb(first);

            let params = StartupParams { saved_state: expected.clone(), ..StartupParams::default() };
            let second = play(params, second_life_script(), settings)?;
            let actual = second.saved_states.last().cloned().flatten();
            summary.absorb(second);

            if actual != expected {
                return Err(SimError::StateNotRestored {
                    expected: expected.map(|b| b.to_vec()),
                    actual: actual.map(|b| b.to_vec()),
                });
            }
        },
    }

    tracing::info!(
        instances = summary.instances,
        frames = summary.frames,
        composited = summary.composited,
        skipped = summary.skipped,
        ticks = summary.ticks,
        inputs = summary.inputs,
        "scenario finished"
    );
    Ok(summary)
}

fn play(params: StartupParams, script: Script, settings: &RunSettings) -> Result<Played, SimError> {
    let stats = DemoStats::default();
    let vm: Arc<dyn HostVm> = Arc::new(DetachedVm);
    let handler = DemoHandler::new(settings.tick, stats.clone());
    let app = Application::start(params, settings.config.clone(), vm, handler)?;

    let Script { stages, windows, feeder } = script;
    let waited = settings.config.handoff_timeout;
    let mut report = HostReport::default();
    let mut batch = Vec::new();
    let mut played = 0;

    for stage in stages {
        match stage {
            Stage::Host(event) => batch.push(event),
            Stage::AwaitInputs(count) => {
                played += flush(&mut batch, played, &app, &mut report);
                if !stats.wait_for_inputs(count, waited) {
                    if let Err(err) = app.activity().on_destroy() {
                        tracing::debug!(%err, "destroy after stalled input not delivered");
                    }
                    return Err(SimError::InputsNotRead { expected: count, read: stats.inputs() });
                }
            },
        }
    }
    flush(&mut batch, played, &app, &mut report);
    drop(feeder);

    if !app.wait_destroyed(waited) {
        return Err(SimError::NotDestroyed { waited });
    }
    app.join()?;

    if let Some((index, source)) = report.errors.into_iter().next() {
        return Err(SimError::Callback { index, source });
    }
    Ok(Played { stats, windows, saved_states: report.saved_states })
}

/// Play the queued events and merge their results into `report`, with event
/// indices counted from `offset`. Returns how many events were played.
fn flush(
    batch: &mut Vec<HostEvent>,
    offset: usize,
    app: &Application,
    report: &mut HostReport,
) -> usize {
    let events = std::mem::take(batch);
    let count = events.len();
    let played = ScriptedHost::new(events).run(app.activity());
    report.saved_states.extend(played.saved_states);
    report.errors.extend(played.errors.into_iter().map(|(index, err)| (offset + index, err)));
    count
}

fn lifecycle_script(settings: &RunSettings) -> Result<Script, SimError> {
    let settle = settings.settle();
    let mut script = Script::new();
    script
        .push(HostEvent::Start)
        .window(480, 320)
        .input(QUEUED_INPUTS)?
        .push(HostEvent::Resume)
        .push(HostEvent::Focus(true))
        .push(HostEvent::ContentRect(Rect { left: 0, top: 24, right: 480, bottom: 320 }))
        .push(HostEvent::Sleep(settle))
        .push(HostEvent::RedrawNeeded)
        .push(HostEvent::LowMemory)
        .push(HostEvent::Focus(false))
        .push(HostEvent::Pause)
        .push(HostEvent::SaveState)
        .push(HostEvent::Stop)
        .await_inputs(QUEUED_INPUTS)
        .push(HostEvent::InputDestroyed)
        .push(HostEvent::WindowDestroyed)
        .push(HostEvent::Destroy);
    Ok(script)
}

fn rotate_script(settings: &RunSettings) -> Script {
    let settle = settings.settle();
    let landscape = Configuration {
        orientation: Orientation::Landscape,
        screen_width_dp: 480,
        screen_height_dp: 320,
        ..Configuration::default()
    };

    let mut script = Script::new();
    script
        .push(HostEvent::Start)
        .window(320, 480)
        .push(HostEvent::Resume)
        .push(HostEvent::Sleep(settle))
        .push(HostEvent::Config(landscape))
        .window(480, 320)
        .push(HostEvent::WindowResized)
        .push(HostEvent::Sleep(settle))
        .push(HostEvent::Pause)
        .push(HostEvent::WindowDestroyed)
        .push(HostEvent::Stop)
        .push(HostEvent::Destroy);
    script
}

fn first_life_script(settings: &RunSettings) -> Script {
    let mut script = Script::new();
    script
        .push(HostEvent::Start)
        .window(240, 240)
        .push(HostEvent::Resume)
        .push(HostEvent::Sleep(settings.settle()))
        .push(HostEvent::Pause)
        .push(HostEvent::SaveState)
        .push(HostEvent::Stop)
        .push(HostEvent::WindowDestroyed)
        .push(HostEvent::Destroy);
    script
}

fn second_life_script() -> Script {
    let mut script = Script::new();
    script.push(HostEvent::Start).push(HostEvent::SaveState).push(HostEvent::Destroy);
    script
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn settings() -> RunSettings {
        RunSettings { config: BridgeConfig::default(), tick: Duration::from_millis(2) }
    }

    #[test]
    fn lifecycle_draws_and_reads_input() {
        let summary = run(Scenario::Lifecycle, &settings()).expect("scenario runs");
        assert_eq!(summary.instances, 1);
        assert!(summary.frames >= 1);
        assert_eq!(summary.frames, summary.composited);
        assert_eq!(summary.inputs, QUEUED_INPUTS);
        assert_eq!(summary.saved_states.len(), 1);
        assert!(summary.saved_states[0].is_some());
    }

    #[test]
    fn rotate_draws_on_both_windows() {
        let summary = run(Scenario::Rotate, &settings()).expect("scenario runs");
        assert!(summary.frames >= 2);
        assert_eq!(summary.frames, summary.composited);
    }

    #[test]
    fn restart_restores_the_saved_colour() {
        let summary = run(Scenario::Restart, &settings()).expect("scenario runs");
        assert_eq!(summary.instances, 2);
        assert_eq!(summary.saved_states.len(), 2);
        assert_eq!(summary.saved_states[0], summary.saved_states[1]);
    }

    #[test]
    fn scripts_end_with_destroy() {
        let settings = settings();
        for script in [
            lifecycle_script(&settings).expect("inputs queued"),
            rotate_script(&settings),
            first_life_script(&settings),
            second_life_script(),
        ] {
            assert!(matches!(script.stages.last(), Some(Stage::Host(HostEvent::Destroy))));
        }
    }
}
