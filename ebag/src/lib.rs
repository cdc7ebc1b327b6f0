pub mod cli;
pub mod load_config;
pub mod mirror;
pub mod serve;
pub mod tags;

pub use cli::{run, Cli, Commands};
