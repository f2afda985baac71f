pub mod cli;
pub mod load_config;
pub mod render;
pub mod server;
pub mod synthesis;

pub use cli::{run, CacheCommand, Cli, Commands};
