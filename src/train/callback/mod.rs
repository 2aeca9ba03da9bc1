//! Callback system for training events
//!
//! A training driver invokes these hooks in-line at well-defined boundaries:
//! - `on_train_begin` / `on_train_end` around each run or schedule stage
//! - `on_epoch_end` after every epoch, with that epoch's losses
//!
//! # Example
//!
//! ```rust
//! use filament_train::train::callback::{CallbackAction, CallbackContext, TrainerCallback};
//!
//! struct PrintCallback;
//!
//! impl TrainerCallback for PrintCallback {
//!     fn on_epoch_end(&mut self, ctx: &CallbackContext) -> CallbackAction {
//!         if let Some(val_loss) = ctx.val_loss() {
//!             println!("Epoch {} finished with val_loss {:.4}", ctx.epoch, val_loss);
//!         }
//!         CallbackAction::Continue
//!     }
//! }
//! ```

mod ema_early_stopping;
mod loss_history;
mod manager;
mod traits;

pub use ema_early_stopping::{BestEpochState, EmaEarlyStopping};
pub use loss_history::{export_path, LossHistory, LossLog};
pub use manager::CallbackManager;
pub use traits::{CallbackAction, CallbackContext, TrainerCallback};
