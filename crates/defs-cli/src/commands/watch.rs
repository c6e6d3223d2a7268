use defs_remote::DirectoryManager;

use super::CommandResult;

pub async fn run(manager: &DirectoryManager) -> CommandResult {
    let mut events = manager.subscribe();

    eprintln!("Watching operation events on {}", manager.address());
    eprintln!("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => println!("{}", serde_json::to_string(&event)?),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
