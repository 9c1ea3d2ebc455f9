use crate::error::Result;
use crate::models::AppStatus;
use std::fmt;
use std::sync::Arc;

/// Receives every status change of an [`AppState`] it is attached to.
pub trait StateObserver: Send + Sync {
    fn state_changed(&self, state: &AppState) -> Result<()>;
}

/// In-memory install status of a single app.
///
/// Assigning a status through [`AppState::set_status`] publishes the new state to every
/// attached observer before the call returns.
#[derive(Default)]
pub struct AppState {
    status: AppStatus,
    observers: Vec<Arc<dyn StateObserver>>,
}

impl AppState {
    pub fn new(status: AppStatus) -> Self {
        Self {
            status,
            observers: Vec::new(),
        }
    }

    pub fn status(&self) -> AppStatus {
        self.status
    }

    pub fn attach(&mut self, observer: Arc<dyn StateObserver>) {
        self.observers.push(observer);
    }

    pub fn detach(&mut self, observer: &Arc<dyn StateObserver>) {
        self.observers.retain(|attached| !Arc::ptr_eq(attached, observer));
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Sets the status and notifies observers in attachment order.
    ///
    /// Every observer is called even if an earlier one fails; the first failure is returned.
    pub fn set_status(&mut self, status: AppStatus) -> Result<()> {
        self.status = status;

        let state: &AppState = self;
        let mut first_error = None;
        for observer in &state.observers {
            if let Err(e) = observer.state_changed(state) {
                log::error!("State observer failed for status {}: {}", status, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("status", &self.status)
            .field("observers", &self.observers.len())
            .finish()
    }
}
