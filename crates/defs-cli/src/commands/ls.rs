use defs_core::FileOrDir;
use defs_remote::DirectoryManager;

use super::{format_size, resolve_directory, CommandResult};

pub async fn run(manager: &DirectoryManager, path: Option<String>, force: bool) -> CommandResult {
    let dir = resolve_directory(manager, path.as_deref()).await?;
    let entries = manager.load_directory(&dir, force).await?;

    if entries.is_empty() {
        println!("(empty)");
        return Ok(());
    }

    for entry in entries {
        match entry {
            FileOrDir::Directory(dir) => println!("d {:>8}  {}", "-", dir.name()),
            FileOrDir::File(file) => {
                println!("- {:>8}  {}", format_size(file.size()), file.name())
            }
        }
    }

    Ok(())
}
