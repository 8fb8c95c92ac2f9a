//! Credential ingestion
//!
//! Classifies setup input and persists the resulting record.
//!
//! ```text
//! raw text → classify → CredentialRecord → RecordStore
//! ```

pub mod classifier;
pub mod store;
pub mod types;

pub use classifier::{classify, classify_input, SetupPlan};
pub use store::RecordStore;
pub use types::{CredentialKind, CredentialRecord};
