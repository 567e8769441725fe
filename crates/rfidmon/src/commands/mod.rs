//! Command handlers, one module per subcommand.

pub mod config_cmd;
pub mod deactivate;
pub mod demo;
pub mod feed;
pub mod status;
pub mod watch;
