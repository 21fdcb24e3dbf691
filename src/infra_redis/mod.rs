mod revocation_registry_redis;

pub use revocation_registry_redis::*;
