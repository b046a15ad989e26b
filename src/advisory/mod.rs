//! Advisory client
//!
//! Turns a context digest into a fixed prompt, submits it to the injected
//! completion client, and normalizes whatever goes wrong into
//! [`AdvisoryError`].

mod client;
mod error;
pub mod prompt;

pub use client::{Advice, AdvisoryClient, AdvisorySettings};
pub use error::AdvisoryError;
pub use prompt::{build_prompt, SYSTEM_PROMPT};
