//! One module per `credvault` subcommand.

pub mod bulk_regenerate;
pub mod completions;
pub mod generate;
pub mod get;
pub mod key_usage;
pub mod regenerate;
pub mod rotate_keys;
pub mod set;
pub mod transitional;
pub mod versions;
