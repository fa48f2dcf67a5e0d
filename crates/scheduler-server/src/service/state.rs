use axum::extract::FromRef;
use scheduler_core::SchedulerCore;

/// Shared application state, wired into every handler via `State<T>`
/// extraction.
///
/// A thin wrapper today — it exists so a second shared dependency (a
/// metrics handle, a feature-flag source) can be added later without
/// changing every handler's signature.
#[derive(Clone)]
pub struct ServiceState {
    core: SchedulerCore,
}

impl ServiceState {
    #[must_use]
    pub fn new(core: SchedulerCore) -> Self {
        Self { core }
    }
}

impl FromRef<ServiceState> for SchedulerCore {
    fn from_ref(state: &ServiceState) -> Self {
        state.core.clone()
    }
}
