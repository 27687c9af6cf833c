use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lockdrop-claim")]
#[command(about = "Lockdrop reward claim client: lock discovery, claim requests and payouts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List lock events of the lockdrop contract
    Locks {
        /// Ethereum account that sent the lock transactions
        #[arg(required_unless_present = "all")]
        account: Option<String>,

        /// List every lock of the contract instead of one account's
        #[arg(short, long)]
        all: bool,

        /// Output format: table or json
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Derive the claim id of a lock
    ClaimId {
        /// Source chain of the lock (eth, btc)
        #[arg(long, default_value = "eth")]
        chain: String,

        /// Lock transaction hash (0x-prefixed hex)
        #[arg(long)]
        tx_hash: String,

        /// Compressed secp256k1 public key of the locker (0x-prefixed hex)
        #[arg(long)]
        public_key: String,

        /// Lock duration in seconds
        #[arg(long)]
        duration: u64,

        /// Locked amount in the smallest unit of the source chain
        #[arg(long)]
        value: u128,
    },

    /// Manage the reward recipient address of a public key
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },

    /// Evaluate claim eligibility for a vote tally
    Eligibility {
        /// Number of approving votes
        #[arg(long, default_value = "0")]
        approve: usize,

        /// Number of declining votes
        #[arg(long, default_value = "0")]
        decline: usize,

        /// Votes required before a decision is made
        #[arg(long)]
        threshold: u32,

        /// Approvals minus declines required for acceptance
        #[arg(long)]
        positive: u32,

        /// Mark the claim as already paid
        #[arg(long)]
        complete: bool,
    },

    /// Search the proof-of-work nonce of a claim request
    Nonce {
        /// Claim id (0x-prefixed hex)
        claim_id: String,
    },

    /// Initialize database and print configuration
    Init,
}

#[derive(Subcommand)]
pub enum AddressAction {
    /// Show the address rewards are paid to
    Show {
        public_key: String,
    },

    /// Save a custom recipient address
    Set {
        public_key: String,
        address: String,
    },

    /// Show the address derived from the public key
    Default {
        public_key: String,
    },
}
