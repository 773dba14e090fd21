//! tubekit-store - Token store implementations.

mod file;
mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;
