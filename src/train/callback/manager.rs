//! Callback manager for dispatching events to multiple callbacks

use super::traits::{CallbackAction, CallbackContext, TrainerCallback};

/// Dispatches training events to borrowed callbacks.
///
/// Callbacks are borrowed rather than owned so the caller can read their state
/// (best epoch, recorded history) once training has finished.
#[derive(Default)]
pub struct CallbackManager<'a> {
    callbacks: Vec<&'a mut dyn TrainerCallback>,
}

impl<'a> CallbackManager<'a> {
    /// Create new callback manager
    pub fn new() -> Self {
        Self { callbacks: Vec::new() }
    }

    /// Add a callback
    pub fn add(&mut self, callback: &'a mut dyn TrainerCallback) {
        self.callbacks.push(callback);
    }

    /// Check if no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Get number of callbacks
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Fire train begin event
    pub fn on_train_begin(&mut self, ctx: &CallbackContext) -> CallbackAction {
        let mut action = CallbackAction::Continue;
        for cb in &mut self.callbacks {
            if cb.on_train_begin(ctx) == CallbackAction::Stop {
                action = CallbackAction::Stop;
            }
        }
        action
    }

    /// Fire train end event
    pub fn on_train_end(&mut self, ctx: &CallbackContext) {
        for cb in &mut self.callbacks {
            cb.on_train_end(ctx);
        }
    }

    /// Fire epoch end event
    ///
    /// Every callback observes the epoch even when an earlier one asks to
    /// stop, so histories stay complete.
    pub fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
        let mut action = CallbackAction::Continue;
        for cb in &mut self.callbacks {
            if cb.on_epoch_end(ctx) == CallbackAction::Stop {
                tracing::debug!(callback = cb.name(), epoch = ctx.epoch, "stop requested");
                action = CallbackAction::Stop;
            }
        }
        action
    }

    /// Names of the registered callbacks, in dispatch order
    pub fn names(&self) -> Vec<&'static str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        epochs: usize,
        ended: bool,
        stop_at: Option<usize>,
    }

    impl TrainerCallback for Counter {
        fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
            self.epochs += 1;
            if self.stop_at == Some(ctx.epoch) {
                CallbackAction::Stop
            } else {
                CallbackAction::Continue
            }
        }

        fn on_train_end(&mut self, _ctx: &CallbackContext) {
            self.ended = true;
        }

        fn name(&self) -> &'static str {
            "Counter"
        }
    }

    #[test]
    fn test_manager_empty() {
        let manager = CallbackManager::new();
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_stop_still_reaches_later_callbacks() {
        let mut stopper = Counter { stop_at: Some(0), ..Default::default() };
        let mut observer = Counter::default();
        {
            let mut manager = CallbackManager::new();
            manager.add(&mut stopper);
            manager.add(&mut observer);
            assert_eq!(manager.names(), vec!["Counter", "Counter"]);

            let ctx = CallbackContext::default();
            assert_eq!(manager.on_epoch_end(&ctx), CallbackAction::Stop);
            manager.on_train_end(&ctx);
        }
        assert_eq!(stopper.epochs, 1);
        assert_eq!(observer.epochs, 1);
        assert!(stopper.ended && observer.ended);
    }

    #[test]
    fn test_continue_when_nobody_stops() {
        let mut a = Counter::default();
        let mut manager = CallbackManager::new();
        manager.add(&mut a);
        let ctx = CallbackContext { epoch: 3, ..Default::default() };
        assert_eq!(manager.on_train_begin(&ctx), CallbackAction::Continue);
        assert_eq!(manager.on_epoch_end(&ctx), CallbackAction::Continue);
    }
}
