use defs_remote::DirectoryManager;

use super::{print_event, CommandResult};

pub async fn run(manager: &DirectoryManager, address: &str) -> CommandResult {
    let event = manager.grant_allocator_role(address).await?;
    print_event(&event);
    Ok(())
}
