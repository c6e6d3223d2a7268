use std::path::Path;

use defs_core::OperationEvent;
use defs_remote::DirectoryManager;

use super::{print_event, resolve_directory, CommandResult};

pub async fn run(manager: &DirectoryManager, local: &Path, dir: Option<String>) -> CommandResult {
    let event = upload(manager, local, dir.as_deref()).await?;
    print_event(&event);
    Ok(())
}

async fn upload(
    manager: &DirectoryManager,
    local: &Path,
    dir: Option<&str>,
) -> Result<OperationEvent, Box<dyn std::error::Error>> {
    let name = local
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Not a file name: {}", local.display()))?;
    let content = tokio::fs::read(local).await?;
    let dir = resolve_directory(manager, dir).await?;

    Ok(manager.upload_file(&dir, name, content).await?)
}
