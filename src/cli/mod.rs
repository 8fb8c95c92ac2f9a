//! Command line front end

pub mod backend;
pub mod commands;

pub use backend::OfflineInitializer;
