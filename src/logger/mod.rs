//! Tracing setup. Security events are emitted under the `security` target.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
