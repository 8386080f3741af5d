//! Fake VM binding.

use std::collections::HashMap;

use lifeline_core::{BridgeError, HostHandle, HostVm};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Counters {
    attached: usize,
    detached: usize,
}

/// [`HostVm`] that counts attach/detach calls and resolves a fixed table.
#[derive(Debug, Default)]
pub struct FakeVm {
    counters: Mutex<Counters>,
    entry_points: HashMap<String, HostHandle>,
    fail_attach: bool,
}

impl FakeVm {
    /// Binding whose attach always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding whose attach always fails.
    pub fn failing() -> Self {
        Self { fail_attach: true, ..Self::default() }
    }

    /// Make `name` resolvable.
    #[must_use]
    pub fn with_entry_point(mut self, name: &str, handle: HostHandle) -> Self {
        self.entry_points.insert(name.to_string(), handle);
        self
    }

    /// Successful attaches so far.
    pub fn attach_count(&self) -> usize {
        self.counters.lock().attached
    }

    /// Detaches so far.
    pub fn detach_count(&self) -> usize {
        self.counters.lock().detached
    }
}

impl HostVm for FakeVm {
    fn attach(&self) -> Result<(), BridgeError> {
        if self.fail_attach {
            return Err(BridgeError::Vm("attach refused".to_string()));
        }
        self.counters.lock().attached += 1;
        Ok(())
    }

    fn detach(&self) {
        self.counters.lock().detached += 1;
    }

    fn resolve(&self, name: &str) -> Option<HostHandle> {
        self.entry_points.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_attach_and_detach() {
        let vm = FakeVm::new();
        assert!(vm.attach().is_ok());
        vm.detach();
        assert_eq!((vm.attach_count(), vm.detach_count()), (1, 1));
    }

    #[test]
    fn failing_binding_never_attaches() {
        let vm = FakeVm::failing();
        assert_eq!(vm.attach(), Err(BridgeError::Vm("attach refused".to_string())));
        assert_eq!(vm.attach_count(), 0);
    }

    #[test]
    fn resolves_registered_entry_points_only() {
        let vm = FakeVm::new().with_entry_point("showSoftInput", HostHandle(7));
        assert_eq!(vm.resolve("showSoftInput"), Some(HostHandle(7)));
        assert_eq!(vm.resolve("finish"), None);
    }
}
