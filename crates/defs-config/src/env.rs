use regex::Regex;
use std::env;

use crate::ConfigError;

/// Interpolate environment variables in a string.
/// Replaces `${VAR_NAME}` with the value of the environment variable.
pub fn interpolate_env(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

    let mut result = input.to_string();
    let mut errors = Vec::new();

    // Collect matches first to avoid mutation during iteration
    let matches: Vec<(String, String)> = re
        .captures_iter(input)
        .filter_map(|cap| {
            let full_match = cap.get(0)?.as_str().to_string();
            let var_name = cap.get(1)?.as_str().to_string();
            Some((full_match, var_name))
        })
        .collect();

    for (full_match, var_name) in matches {
        match env::var(&var_name) {
            Ok(value) => {
                result = result.replace(&full_match, &value);
            }
            Err(_) => {
                if !errors.contains(&var_name) {
                    errors.push(var_name);
                }
            }
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::MissingEnvVars(errors));
    }

    Ok(result)
}
