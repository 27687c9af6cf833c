pub mod address;
pub mod db;

pub use address::RecipientAddressStore;
pub use db::{Database, KeyValueCache, MemoryCache};
