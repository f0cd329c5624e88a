//! Settings come from a TOML file layered with `TOKENWARD__*` environment
//! variables. See `bin/settings_demo.rs` for a binary that prints what loads.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
