// # Media Store Implementations
//
// Generated documents (monthly protocol, custom reports) are stored under a
// fixed ident per instance, replacing the previous document of that kind.

pub mod file;
pub mod memory;

pub use file::FileMediaStore;
pub use memory::MemoryMediaStore;

/// Ident of the monthly protocol document
pub const MONTHLY_PROTOCOL: &str = "monthly_protocol";

/// Ident of the custom report document
pub const REPORT: &str = "report";
