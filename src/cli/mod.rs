pub mod cli;

pub use cli::{Cli, Commands, run_cli, run_from_args};
