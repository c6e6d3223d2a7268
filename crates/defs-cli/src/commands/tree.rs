use defs_core::{DirectoryNode, FileOrDir};
use defs_remote::DirectoryManager;

use super::{resolve_directory, CommandResult};

pub async fn run(
    manager: &DirectoryManager,
    path: Option<String>,
    max_depth: Option<usize>,
) -> CommandResult {
    let dir = resolve_directory(manager, path.as_deref()).await?;
    let max_depth = max_depth.unwrap_or(usize::MAX);

    println!("/{}", dir.path());
    print_tree(manager, &dir, "", 0, max_depth).await?;

    Ok(())
}

#[async_recursion::async_recursion]
async fn print_tree(
    manager: &DirectoryManager,
    dir: &DirectoryNode,
    prefix: &str,
    depth: usize,
    max_depth: usize,
) -> CommandResult {
    if depth >= max_depth {
        return Ok(());
    }

    let entries = manager.load_directory(dir, false).await?;

    let count = entries.len();
    for (i, entry) in entries.iter().enumerate() {
        let is_last_entry = i == count - 1;
        let connector = if is_last_entry { "└── " } else { "├── " };

        println!("{}{}{}", prefix, connector, entry.name());

        if let FileOrDir::Directory(child) = entry {
            let new_prefix = format!("{}{}", prefix, if is_last_entry { "    " } else { "│   " });
            print_tree(manager, child, &new_prefix, depth + 1, max_depth).await?;
        }
    }

    Ok(())
}
