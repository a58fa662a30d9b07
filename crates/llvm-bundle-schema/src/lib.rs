//! Shared types for llvm-bundle: release versions, digests and the
//! per-platform packaging table.

pub mod hash;
pub mod platform;
pub mod version;

// Re-exports
pub use hash::*;
pub use platform::*;
pub use version::*;

/// Name every bundle stores its license text under.
pub const LICENSE_ARCNAME: &str = "LICENSE.TXT";
