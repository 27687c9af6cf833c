mod cli;

use clap::Parser;
use cli::{AddressAction, Cli, Commands};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use lockdrop_claim::{
    chain::EthereumRpcClient,
    claim::{eligibility::eligibility_reason, ActionHint, Eligibility},
    error::{self, ClaimError},
    lockdrop::{
        derive_claim_id,
        types::{ChainType, Claim, ClaimId, EthAddress, LockParam, VoteRequirement},
        FetchStatus, LockMonitor,
    },
    storage::{Database, RecipientAddressStore},
    utils, Config,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lockdrop_claim=debug,info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Locks { account, all, format } => {
            info!("Fetching lock events...");
            list_locks(account.as_deref(), all, &format).await
        }

        Commands::ClaimId {
            chain,
            tx_hash,
            public_key,
            duration,
            value,
        } => show_claim_id(&chain, &tx_hash, &public_key, duration, value),

        Commands::Address { action } => manage_address(action),

        Commands::Eligibility {
            approve,
            decline,
            threshold,
            positive,
            complete,
        } => show_eligibility(approve, decline, threshold, positive, complete),

        Commands::Nonce { claim_id } => {
            info!("Searching nonce for claim {}", claim_id);
            find_nonce(&claim_id).await
        }

        Commands::Init => {
            info!("Initializing...");
            initialize()
        }
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

fn load_config() -> error::Result<Config> {
    Config::load().map_err(|e| ClaimError::Config(e.to_string()))
}

async fn list_locks(account: Option<&str>, all: bool, format: &str) -> error::Result<()> {
    let config = load_config()?;
    let source = Arc::new(EthereumRpcClient::new(
        &config.ethereum.rpc_url,
        config.contract_address()?,
    ));
    let monitor = LockMonitor::new(source, config.ethereum.from_block);

    let snapshot = match (all, account) {
        (true, _) => monitor.fetch_all_locks().await,
        (false, Some(account)) => monitor.fetch_locks(&EthAddress::from_str(account)?).await,
        (false, None) => {
            return Err(ClaimError::InvalidParameter(
                "an account is required unless --all is given".into(),
            ))
        }
    };

    if let FetchStatus::SourceUnavailable(reason) = &snapshot.status {
        println!("{}", format!("Lock source unavailable: {}", reason).yellow());
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&snapshot.locks)?);
        return Ok(());
    }

    println!("\n{}", "=== Lock Events ===".cyan().bold());
    println!("Locks found: {}", snapshot.locks.len().to_string().green());

    if snapshot.locks.is_empty() {
        return Ok(());
    }

    let widths = [20, 10, 24, 8, 20, 20];
    utils::print_table_border(112);
    utils::print_table_row(
        &["Transaction", "Block", "Amount", "Days", "Lock", "Introducer"],
        &widths,
    );
    utils::print_table_border(112);

    for lock in &snapshot.locks {
        utils::print_table_row(
            &[
                &utils::format_hash(&lock.transaction_hash),
                &lock.block_number.to_string(),
                &utils::format_eth(lock.amount),
                &format!("{:.1}", utils::epoch_to_days(lock.duration)),
                &utils::format_hash(&lock.lock_address.to_string()),
                &utils::format_hash(&lock.introducer_address.to_string()),
            ],
            &widths,
        );
    }
    utils::print_table_border(112);

    Ok(())
}

fn show_claim_id(
    chain: &str,
    tx_hash: &str,
    public_key: &str,
    duration: u64,
    value: u128,
) -> error::Result<()> {
    let chain = ChainType::from_str(chain)?;
    let param = LockParam::from_hex(chain, tx_hash, public_key, duration, value)?;
    let id = derive_claim_id(&param)?;

    println!("{}", "=== Claim Parameter ===".cyan().bold());
    println!("Chain:       {}", chain.symbol());
    println!("Transaction: {}", param.transaction_hash_hex());
    println!("Public key:  {}", param.public_key_hex());
    println!("Duration:    {:.2} days", utils::epoch_to_days(duration));
    println!("Value:       {}", value);
    println!("Claim id:    {}", id.to_string().green());

    Ok(())
}

fn manage_address(action: AddressAction) -> error::Result<()> {
    let config = load_config()?;
    let network = config.plasm.network;
    let db = Database::new(&config.database.path)?;
    let store = RecipientAddressStore::new(Arc::new(db), network.ss58_prefix());

    match action {
        AddressAction::Show { public_key } => match store.load(&public_key) {
            Some(address) => {
                println!("Recipient: {} {}", address.to_string().green(), "(custom)".dimmed());
            }
            None => {
                let address = store.default_for(&public_key)?;
                println!("Recipient: {} {}", address.to_string().green(), "(default)".dimmed());
            }
        },

        AddressAction::Set { public_key, address } => {
            let saved = store.save(&public_key, &address)?;
            println!("✓ Rewards for {} will be paid to {}", utils::format_hash(&public_key), saved);
        }

        AddressAction::Default { public_key } => {
            let address = store.default_for(&public_key)?;
            println!("Default {:?} address: {}", network, address.to_string().green());
        }
    }

    Ok(())
}

fn show_eligibility(
    approve: usize,
    decline: usize,
    threshold: u32,
    positive: u32,
    complete: bool,
) -> error::Result<()> {
    let claim = Claim {
        id: ClaimId::from_bytes([0u8; 32]),
        approve: (0..approve).map(|i| format!("approver-{}", i)).collect(),
        decline: (0..decline).map(|i| format!("decliner-{}", i)).collect(),
        complete,
        amount: 0,
    };
    let requirement = VoteRequirement {
        positive_votes: positive,
        vote_threshold: threshold,
    };

    let flags = Eligibility::evaluate(Some(&claim), &requirement);
    let hint = ActionHint::from_eligibility(&flags);

    println!("{}", "=== Eligibility ===".cyan().bold());
    println!("All votes cast:   {}", yes_no(flags.has_all_votes));
    println!("Accepted:         {}", yes_no(flags.accepted));
    println!("Rejected:         {}", yes_no(flags.rejected));
    println!("Complete:         {}", yes_no(flags.complete));
    println!("Can submit claim: {}", yes_no(flags.can_submit_claim));
    println!("Next action:      {:?}", hint);
    println!("Status:           {}", eligibility_reason(Some(&claim), &requirement));

    Ok(())
}

fn yes_no(flag: bool) -> ColoredString {
    if flag {
        "yes".green()
    } else {
        "no".red()
    }
}

async fn find_nonce(claim_id: &str) -> error::Result<()> {
    let config = load_config()?;
    let id = ClaimId::from_str(claim_id)?;
    let search = config.nonce_search();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "Searching nonce ({} bits, up to {} attempts)",
        search.difficulty_bits, search.max_attempts
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = search.run(id, config.pow_timeout()).await;
    spinner.finish_and_clear();

    let nonce = result?;
    println!("✓ Nonce found: {}", nonce.0.to_string().green());
    println!("Claim id: {}", id);

    Ok(())
}

fn initialize() -> error::Result<()> {
    let config = load_config()?;

    println!("{}", "Initializing lockdrop claim client...".cyan());

    let db = Database::new(&config.database.path)?;
    println!("✓ Database initialized at: {}", config.database.path);
    println!("  Cached entries: {}", db.count()?);

    let rendered = toml::to_string_pretty(&config)
        .map_err(|e| ClaimError::Config(format!("cannot render configuration: {}", e)))?;

    println!("\n{}", "Configuration:".yellow());
    println!("{}", rendered);
    println!("{}", "Setup complete".green());

    Ok(())
}
