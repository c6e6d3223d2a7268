use defs_config::DefsConfig;
use defs_remote::DirectoryManager;

use super::CommandResult;

pub async fn run(manager: &DirectoryManager, config: &DefsConfig) -> CommandResult {
    let stats = manager.cache_stats().await;

    println!("defs Status");
    println!("===========");
    println!();

    println!("Drive:   {}", config.name.as_deref().unwrap_or("unnamed"));
    println!("Address: {}", manager.address());
    println!("Backend: {}", config.backend.kind());
    match manager.signer() {
        Some(signer) => println!("Signer:  {}", signer),
        None => println!("Signer:  (none, read-only)"),
    }
    println!();

    println!("Cache:");
    println!("  enabled: {}", config.cache.enabled);
    println!("  entries: {}", stats.entries);
    println!(
        "  hits: {}, misses: {}, hit rate: {:.1}%",
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );
    println!(
        "  invalidations: {}, purges: {}, stale discards: {}",
        stats.invalidations, stats.purges, stats.stale_discards
    );
    println!();

    println!("Status: OK");

    Ok(())
}
