pub mod address;
pub mod destination;
pub mod source;

pub use address::Ss58Address;
pub use destination::{ClaimSigner, DestinationChain, TxHash};
pub use source::{BlockTag, EthereumRpcClient, EventLog, SourceChain, TransactionInfo};
