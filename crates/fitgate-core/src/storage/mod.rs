//! Storage backends for the credential cache and session flags
//!
//! This module provides two storage backends:
//! 1. OS Keychain (hardware-backed where available)
//! 2. In-memory (volatile fallback)

mod keychain;
mod memory;
mod traits;

pub use keychain::KeychainStorage;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;
