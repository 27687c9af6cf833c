pub mod chain;
pub mod claim;
pub mod lockdrop;
pub mod storage;
pub mod config;
pub mod error;
pub mod utils;

pub use error::{ClaimError, Result};
pub use config::Config;
