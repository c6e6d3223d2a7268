use defs_core::FileOrDir;
use defs_remote::DirectoryManager;

use super::{resolve, CommandResult};

pub async fn run(manager: &DirectoryManager, path: &str) -> CommandResult {
    let entry = resolve(manager, path).await?;

    println!("Path:     /{}", entry.path());
    println!("Name:     {}", entry.name());
    println!("Type:     {}", entry.kind().as_str());

    if let FileOrDir::File(file) = &entry {
        println!("Size:     {} bytes", file.size());
        println!("Media:    {}", file.media_type());
        if let Some(modified) = file.modified() {
            println!("Modified: {}", modified.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }

    Ok(())
}
