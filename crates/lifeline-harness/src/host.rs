//! Scripted platform host.
//!
//! [`ScriptedHost`] plays a list of [`HostEvent`]s against any
//! [`ActivityCallbacks`] implementation the way a platform thread would:
//! one callback at a time, tracking the window and input queue it handed
//! out so the matching "destroyed" callbacks receive them back.

use std::{fmt, sync::Arc, thread, time::Duration};

use bytes::Bytes;
use lifeline_core::{
    ActivityCallbacks, BridgeError, Configuration, InputQueue, Rect, WindowHandle,
};
use parking_lot::Mutex;

/// One platform-side event.
#[derive(Clone)]
pub enum HostEvent {
    /// `on_start`
    Start,
    /// `on_resume`
    Resume,
    /// `on_save_instance_state`
    SaveState,
    /// `on_pause`
    Pause,
    /// `on_stop`
    Stop,
    /// `on_destroy`
    Destroy,
    /// `on_window_focus_changed`
    Focus(bool),
    /// `on_native_window_created`
    WindowCreated(WindowHandle),
    /// `on_native_window_resized` for the current window
    WindowResized,
    /// `on_native_window_redraw_needed` for the current window
    RedrawNeeded,
    /// `on_native_window_destroyed` for the current window
    WindowDestroyed,
    /// `on_input_queue_created`
    InputCreated(InputQueue),
    /// `on_input_queue_destroyed` for the current queue
    InputDestroyed,
    /// `on_content_rect_changed`
    ContentRect(Rect),
    /// `on_configuration_changed`
    Config(Configuration),
    /// `on_low_memory`
    LowMemory,
    /// Let the application thread run for a while
    Sleep(Duration),
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("Start"),
            Self::Resume => f.write_str("Resume"),
            Self::SaveState => f.write_str("SaveState"),
            Self::Pause => f.write_str("Pause"),
            Self::Stop => f.write_str("Stop"),
            Self::Destroy => f.write_str("Destroy"),
            Self::Focus(focus) => f.debug_tuple("Focus").field(focus).finish(),
            Self::WindowCreated(_) => f.write_str("WindowCreated"),
            Self::WindowResized => f.write_str("WindowResized"),
            Self::RedrawNeeded => f.write_str("RedrawNeeded"),
            Self::WindowDestroyed => f.write_str("WindowDestroyed"),
            Self::InputCreated(_) => f.write_str("InputCreated"),
            Self::InputDestroyed => f.write_str("InputDestroyed"),
            Self::ContentRect(rect) => f.debug_tuple("ContentRect").field(rect).finish(),
            Self::Config(_) => f.write_str("Config"),
            Self::LowMemory => f.write_str("LowMemory"),
            Self::Sleep(duration) => f.debug_tuple("Sleep").field(duration).finish(),
        }
    }
}

/// What the platform got back while playing a script.
#[derive(Debug, Default)]
pub struct HostReport {
    /// Blob returned by each `SaveState` event, in order
    pub saved_states: Vec<Option<Bytes>>,
    /// Callback errors with the index of the event that produced them
    pub errors: Vec<(usize, BridgeError)>,
}

/// A platform thread following a script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHost {
    events: Vec<HostEvent>,
}

impl ScriptedHost {
    /// Host that will play `events` in order.
    pub fn new(events: Vec<HostEvent>) -> Self {
        Self { events }
    }

    /// The script.
    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    /// Play the script on the calling thread.
    pub fn run(&self, callbacks: &dyn ActivityCallbacks) -> HostReport {
        let mut report = HostReport::default();
        let mut window: Option<WindowHandle> = None;
        let mut queue: Option<InputQueue> = None;

        for (index, event) in self.events.iter().enumerate() {
            tracing::trace!(index, ?event, "host event");
            let result = match event {
                HostEvent::Start => callbacks.on_start(),
                HostEvent::Resume => callbacks.on_resume(),
                HostEvent::SaveState => callbacks.on_save_instance_state().map(|saved| {
                    report.saved_states.push(saved);
                }),
                HostEvent::Pause => callbacks.on_pause(),
                HostEvent::Stop => callbacks.on_stop(),
                HostEvent::Destroy => callbacks.on_destroy(),
                HostEvent::Focus(focus) => callbacks.on_window_focus_changed(*focus),
                HostEvent::WindowCreated(created) => {
                    window = Some(Arc::clone(created));
                    callbacks.on_native_window_created(Arc::clone(created))
                },
                HostEvent::WindowResized => match &window {
                    Some(w) => callbacks.on_native_window_resized(w),
                    None => Ok(()),
                },
                HostEvent::RedrawNeeded => match &window {
                    Some(w) => callbacks.on_native_window_redraw_needed(w),
                    None => Ok(()),
                },
                HostEvent::WindowDestroyed => match window.take() {
                    Some(w) => callbacks.on_native_window_destroyed(&w),
                    None => Ok(()),
                },
                HostEvent::InputCreated(created) => {
                    queue = Some(created.clone());
                    callbacks.on_input_queue_created(created.clone())
                },
                HostEvent::InputDestroyed => match queue.take() {
                    Some(q) => callbacks.on_input_queue_destroyed(&q),
                    None => Ok(()),
                },
                HostEvent::ContentRect(rect) => callbacks.on_content_rect_changed(*rect),
                HostEvent::Config(configuration) => {
                    callbacks.on_configuration_changed(configuration.clone())
                },
                HostEvent::LowMemory => callbacks.on_low_memory(),
                HostEvent::Sleep(duration) => {
                    thread::sleep(*duration);
                    Ok(())
                },
            };

            if let Err(err) = result {
                tracing::debug!(index, %err, "host callback failed");
                report.errors.push((index, err));
            }
        }

        report
    }

    /// Play the script on a new thread.
    pub fn spawn<C>(self, callbacks: C) -> thread::JoinHandle<HostReport>
    where
        C: ActivityCallbacks + 'static,
    {
        thread::spawn(move || self.run(&callbacks))
    }
}

/// [`ActivityCallbacks`] that only records which callbacks ran.
#[derive(Debug, Default)]
pub struct RecordingCallbacks {
    calls: Mutex<Vec<&'static str>>,
    saved_state: Option<Bytes>,
}

impl RecordingCallbacks {
    /// Recorder answering save requests with nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder answering save requests with `saved_state`.
    pub fn with_saved_state(saved_state: impl Into<Bytes>) -> Self {
        Self { saved_state: Some(saved_state.into()), ..Self::default() }
    }

    /// Callback names in call order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn push(&self, name: &'static str) -> Result<(), BridgeError> {
        self.calls.lock().push(name);
        Ok(())
    }
}

impl ActivityCallbacks for RecordingCallbacks {
    fn on_start(&self) -> Result<(), BridgeError> {
        self.push("start")
    }

    fn on_resume(&self) -> Result<(), BridgeError> {
        self.push("resume")
    }

    fn on_save_instance_state(&self) -> Result<Option<Bytes>, BridgeError> {
        self.push("save_instance_state")?;
        Ok(self.saved_state.clone())
    }

    fn on_pause(&self) -> Result<(), BridgeError> {
        self.push("pause")
    }

    fn on_stop(&self) -> Result<(), BridgeError> {
        self.push("stop")
    }

    fn on_destroy(&self) -> Result<(), BridgeError> {
        self.push("destroy")
    }

    fn on_window_focus_changed(&self, has_focus: bool) -> Result<(), BridgeError> {
        self.push(if has_focus { "focus_gained" } else { "focus_lost" })
    }

    fn on_native_window_created(&self, _window: WindowHandle) -> Result<(), BridgeError> {
        self.push("window_created")
    }

    fn on_native_window_resized(&self, _window: &WindowHandle) -> Result<(), BridgeError> {
        self.push("window_resized")
    }

    fn on_native_window_redraw_needed(&self, _window: &WindowHandle) -> Result<(), BridgeError> {
        self.push("redraw_needed")
    }

    fn on_native_window_destroyed(&self, _window: &WindowHandle) -> Result<(), BridgeError> {
        self.push("window_destroyed")
    }

    fn on_input_queue_created(&self, _queue: InputQueue) -> Result<(), BridgeError> {
        self.push("input_created")
    }

    fn on_input_queue_destroyed(&self, _queue: &InputQueue) -> Result<(), BridgeError> {
        self.push("input_destroyed")
    }

    fn on_content_rect_changed(&self, _rect: Rect) -> Result<(), BridgeError> {
        self.push("content_rect_changed")
    }

    fn on_configuration_changed(&self, _configuration: Configuration) -> Result<(), BridgeError> {
        self.push("configuration_changed")
    }

    fn on_low_memory(&self) -> Result<(), BridgeError> {
        self.push("low_memory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::FakeWindow;

    #[test]
    fn destroyed_events_need_a_live_handle() {
        let host = ScriptedHost::new(vec![HostEvent::WindowDestroyed, HostEvent::InputDestroyed]);
        let callbacks = RecordingCallbacks::new();
        let report = host.run(&callbacks);
        assert!(callbacks.calls().is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn plays_events_in_order() {
        let (_window, handle) = FakeWindow::handle(4, 4);
        let (_feeder, queue) = InputQueue::channel(1);
        let host = ScriptedHost::new(vec![
            HostEvent::Start,
            HostEvent::WindowCreated(handle),
            HostEvent::InputCreated(queue),
            HostEvent::RedrawNeeded,
            HostEvent::SaveState,
            HostEvent::InputDestroyed,
            HostEvent::WindowDestroyed,
            HostEvent::Destroy,
        ]);
        let callbacks = RecordingCallbacks::with_saved_state(vec![1, 2]);

        let report = host.run(&callbacks);

        assert_eq!(callbacks.calls(), vec![
            "start",
            "window_created",
            "input_created",
            "redraw_needed",
            "save_instance_state",
            "input_destroyed",
            "window_destroyed",
            "destroy",
        ]);
        assert_eq!(report.saved_states, vec![Some(Bytes::from_static(&[1, 2]))]);
    }
}
