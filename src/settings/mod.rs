//! Settings come from a TOML file layered with `MESHPOINT__*` environment
//! variables.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
