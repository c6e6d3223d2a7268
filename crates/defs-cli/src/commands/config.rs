use defs_config::DefsConfig;

use super::CommandResult;

pub fn run(config: &DefsConfig) -> CommandResult {
    // Print as YAML for readability
    let yaml = serde_yaml::to_string(&config.effective())?;
    println!("{}", yaml);

    Ok(())
}
