// src/exec/mod.rs

//! OS process layer.
//!
//! - [`spawn`] starts a child with its output captured to scratch files and
//!   runs the single completion watcher for it.
//! - [`exit`] turns an OS exit status into an [`ExitOutcome`](crate::registry::ExitOutcome).
//! - [`signal`] delivers signals to supervised processes.

pub mod exit;
pub mod signal;
pub mod spawn;

pub use exit::{exit_outcome, signal_description};
pub use signal::deliver_signal;
pub use spawn::spawn_process;
