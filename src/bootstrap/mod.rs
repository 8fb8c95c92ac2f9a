//! Wallet bootstrap
//!
//! Decides on startup whether a wallet exists, drives setup from user input, and
//! reports progress as a [`BootstrapState`] stream plus navigation requests.

pub mod initializer;
pub mod machine;
pub mod navigation;
pub mod types;

pub use initializer::WalletInitializer;
pub use machine::Bootstrapper;
pub use navigation::{Navigator, RecordingNavigator, TracingNavigator};
pub use types::{AttemptOutcome, BootstrapError, BootstrapState, FailureSource, LoadStage};
