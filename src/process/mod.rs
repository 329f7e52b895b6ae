//! Child process lifecycle and output streaming.
//!
//! [`ProcessHandle`] knows nothing about URLs or instances; it runs one argv,
//! exposes the merged stdout/stderr through an [`OutputPump`] and reports the
//! exit through [`RunOutcome`].

mod error;
mod handle;
mod pump;

pub use error::StartError;
pub use handle::{ProcessHandle, RunOutcome};
pub use pump::{OutputPump, spawn_reader};
