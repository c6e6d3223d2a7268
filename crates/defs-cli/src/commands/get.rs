use std::io::Write;
use std::path::PathBuf;

use defs_core::FileOrDir;
use defs_remote::DirectoryManager;

use super::{resolve, CommandResult};

pub async fn run(manager: &DirectoryManager, path: &str, out: Option<PathBuf>) -> CommandResult {
    let file = match resolve(manager, path).await? {
        FileOrDir::File(file) => file,
        FileOrDir::Directory(dir) => {
            return Err(format!("Is a directory: /{}", dir.path()).into());
        }
    };

    let content = manager.download_file(&file).await?;
    match out {
        Some(out) => {
            tokio::fs::write(&out, &content).await?;
            eprintln!("{} bytes written to {}", content.len(), out.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
