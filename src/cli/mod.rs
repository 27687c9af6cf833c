mod commands;

pub use commands::{AddressAction, Cli, Commands};
