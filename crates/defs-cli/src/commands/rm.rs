use defs_core::FileOrDir;
use defs_remote::DirectoryManager;

use super::{print_event, resolve, CommandResult};

pub async fn run(manager: &DirectoryManager, path: &str) -> CommandResult {
    let event = match resolve(manager, path).await? {
        FileOrDir::File(file) => manager.delete_file(&file).await?,
        FileOrDir::Directory(dir) => manager.delete_directory(&dir).await?,
    };
    print_event(&event);
    Ok(())
}
