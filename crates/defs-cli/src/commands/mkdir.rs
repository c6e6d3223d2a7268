use defs_core::path;
use defs_remote::DirectoryManager;

use super::{print_event, resolve_directory, CommandResult};

pub async fn run(manager: &DirectoryManager, target: &str) -> CommandResult {
    let depath = path::normalize(target);
    if depath.is_empty() {
        return Err("mkdir needs a directory name".into());
    }

    let parent = match path::parent_of(&depath) {
        "" => None,
        parent => Some(parent),
    };
    let parent = resolve_directory(manager, parent).await?;
    let event = manager
        .create_directory(&parent, path::file_name(&depath))
        .await?;
    print_event(&event);

    Ok(())
}
