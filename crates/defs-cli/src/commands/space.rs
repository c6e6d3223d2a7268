use std::str::FromStr;

use defs_config::HumanBytes;
use defs_remote::DirectoryManager;

use super::{format_size, print_event, CommandResult};

pub async fn run(manager: &DirectoryManager) -> CommandResult {
    let occupied = manager.occupied_space().await?;
    let reserved = manager.reserved_space().await?;

    println!("Occupied:  {:>8}", format_size(occupied));
    println!("Reserved:  {:>8}", format_size(reserved));
    println!("Available: {:>8}", format_size(reserved.saturating_sub(occupied)));

    Ok(())
}

pub async fn reserve(manager: &DirectoryManager, amount: &str) -> CommandResult {
    let amount = HumanBytes::from_str(amount)?;
    let event = manager.reserve_space(amount.as_bytes()).await?;
    print_event(&event);
    Ok(())
}
