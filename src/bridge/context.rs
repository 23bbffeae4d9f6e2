//! Remote context lifecycle state
//!
//! `Unloaded -> Loading -> Ready`, back to `Loading` on every navigation and
//! to `Unloaded` on unload. The command handle is only present in `Ready`;
//! the utility handle is injected independently and may arrive before or after
//! it. Both are cleared on navigation.

use crate::cdp::types::ObjectHandle;

/// Lifecycle state of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Not listening to the page
    #[default]
    Unloaded,
    /// Waiting for the next load-complete notification
    Loading,
    /// Command namespace injected
    Ready,
}

/// Handles into the page's injected script state
#[derive(Debug, Clone, Default)]
pub struct RemoteContext {
    state: LifecycleState,
    command_handle: Option<ObjectHandle>,
    utility_handle: Option<ObjectHandle>,
    heartbeat_active: bool,
}

impl RemoteContext {
    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Handle of the command namespace
    pub fn command_handle(&self) -> Option<&ObjectHandle> {
        self.command_handle.as_ref()
    }

    /// Handle of the utility library
    pub fn utility_handle(&self) -> Option<&ObjectHandle> {
        self.utility_handle.as_ref()
    }

    /// Whether the keep-alive timer was running when this snapshot was taken
    pub fn heartbeat_active(&self) -> bool {
        self.heartbeat_active
    }

    pub(crate) fn snapshot(&self, heartbeat_active: bool) -> RemoteContext {
        RemoteContext {
            heartbeat_active,
            ..self.clone()
        }
    }

    pub(crate) fn begin_load(&mut self) {
        *self = RemoteContext {
            state: LifecycleState::Loading,
            ..RemoteContext::default()
        };
    }

    /// Returns false when the bridge was unloaded while injecting
    pub(crate) fn command_injected(&mut self, handle: ObjectHandle) -> bool {
        if self.state == LifecycleState::Unloaded {
            return false;
        }
        self.state = LifecycleState::Ready;
        self.command_handle = Some(handle);
        true
    }

    pub(crate) fn utility_injected(&mut self, handle: ObjectHandle) -> bool {
        if self.state == LifecycleState::Unloaded {
            return false;
        }
        self.utility_handle = Some(handle);
        true
    }

    pub(crate) fn navigation_started(&mut self) {
        if self.state == LifecycleState::Unloaded {
            return;
        }
        self.begin_load();
    }

    pub(crate) fn unload(&mut self) {
        *self = RemoteContext::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_navigate_reload() {
        let mut context = RemoteContext::default();
        assert_eq!(context.state(), LifecycleState::Unloaded);

        context.begin_load();
        assert_eq!(context.state(), LifecycleState::Loading);
        assert!(context.command_handle().is_none());

        assert!(context.utility_injected(ObjectHandle::new("jq-1")));
        assert!(context.command_injected(ObjectHandle::new("ld-1")));
        assert_eq!(context.state(), LifecycleState::Ready);
        assert!(!context.heartbeat_active());
        assert!(context.snapshot(true).heartbeat_active());

        context.navigation_started();
        assert_eq!(context.state(), LifecycleState::Loading);
        assert!(context.command_handle().is_none());
        assert!(context.utility_handle().is_none());

        context.command_injected(ObjectHandle::new("ld-2"));
        assert_eq!(context.command_handle(), Some(&ObjectHandle::new("ld-2")));
    }

    #[test]
    fn test_late_injection_after_unload_ignored() {
        let mut context = RemoteContext::default();
        context.begin_load();
        context.unload();

        assert!(!context.command_injected(ObjectHandle::new("late")));
        assert!(!context.utility_injected(ObjectHandle::new("late")));
        context.navigation_started();

        assert_eq!(context.state(), LifecycleState::Unloaded);
        assert!(context.command_handle().is_none());
    }
}
