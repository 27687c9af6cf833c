use colored::Colorize;

use crate::config::Network;

/// Femto units per PLM/PLD
pub const FEMTO_PER_TOKEN: u128 = 1_000_000_000_000_000;

/// Wei per ETH
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

const SECONDS_PER_DAY: u64 = 86_400;

/// Integer amount scaled down by `unit`, trailing zeros removed
pub fn scale_amount(amount: u128, unit: u128) -> String {
    let whole = amount / unit;
    let frac = amount % unit;
    if frac == 0 {
        return whole.to_string();
    }

    let digits = unit.to_string().len() - 1;
    let frac = format!("{:0width$}", frac, width = digits);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Format a femto amount as PLM/PLD with color
pub fn format_plm(femto: u128, network: Network) -> String {
    format!("{} {}", scale_amount(femto, FEMTO_PER_TOKEN), network.token_symbol())
        .yellow()
        .to_string()
}

/// Format a wei amount as ETH
pub fn format_eth(wei: u128) -> String {
    format!("{} ETH", scale_amount(wei, WEI_PER_ETH))
}

/// Lock duration in days, fractional part kept
pub fn epoch_to_days(seconds: u64) -> f64 {
    seconds as f64 / SECONDS_PER_DAY as f64
}

/// Format hash or address truncated for display
pub fn format_hash(hash: &str) -> String {
    if hash.len() <= 16 {
        hash.to_string()
    } else {
        format!("{}...{}", &hash[..8], &hash[hash.len() - 6..])
    }
}

/// Format timestamp in human-readable format
pub fn format_timestamp(timestamp: &chrono::DateTime<chrono::Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Print a formatted table border
pub fn print_table_border(width: usize) {
    println!("{}", "=".repeat(width));
}

/// Print a table row with columns
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    let mut row = String::new();
    for (i, col) in columns.iter().enumerate() {
        if i < widths.len() {
            row.push_str(&format!("{:<width$}  ", col, width = widths[i]));
        }
    }
    println!("{}", row.trim_end());
}
