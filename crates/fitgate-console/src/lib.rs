//! # fitgate-console
//!
//! Interactive console that drives the fitgate session flows against the
//! simulated identity provider.

pub mod command;
pub mod console;

pub use command::Command;
pub use console::Console;
