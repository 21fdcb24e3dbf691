mod revocation_registry_memory;
mod role_directory_memory;

pub use revocation_registry_memory::*;
pub use role_directory_memory::*;
