use defs_core::FileOrDir;
use defs_remote::DirectoryManager;

use super::{resolve_directory, CommandResult};

pub async fn run(manager: &DirectoryManager, path: Option<String>, query: &str) -> CommandResult {
    let dir = resolve_directory(manager, path.as_deref()).await?;
    let matches = manager.search(dir, query).await?;

    for entry in matches {
        let marker = match entry {
            FileOrDir::Directory(_) => "d",
            FileOrDir::File(_) => "-",
        };
        println!("{} /{}", marker, entry.path());
    }

    Ok(())
}
