//! The facade a PLC program's application logic is written against: a thin
//! wrapper over a [`Controller`] that exists so call sites read as
//! domain operations rather than raw memory plumbing.

use std::sync::Arc;
use std::time::Duration;

use crate::controller::Controller;

/// Holds the `Controller` an application's control logic runs against.
/// Intended to be extended per-application with domain-specific methods
/// built out of `controller()`'s wait/get/set primitives.
pub struct Logic {
    controller: Arc<Controller>,
}

impl Logic {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    /// Blocks until the underlying connection is live, per
    /// [`Controller::wait_until_connected`].
    pub async fn wait_until_connected(&self, timeout: Option<Duration>) -> bool {
        self.controller.wait_until_connected(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;

    #[tokio::test(start_paused = true)]
    async fn wait_until_connected_delegates_to_controller() {
        let memory = Arc::new(Memory::new());
        let controller = Controller::new(memory, None, None).await;
        let logic = Logic::new(controller);

        assert!(logic.wait_until_connected(Some(Duration::ZERO)).await);
    }
}
