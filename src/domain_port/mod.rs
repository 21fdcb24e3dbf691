mod revocation_registry;
mod role_directory;

pub use revocation_registry::*;
pub use role_directory::*;
