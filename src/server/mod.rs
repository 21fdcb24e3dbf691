mod server;
mod stats_reporter;

pub use server::*;
pub use stats_reporter::*;
