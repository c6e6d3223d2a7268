use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Human-readable duration (e.g., "200ms", "5m", "1h").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanDuration(pub std::time::Duration);

impl Default for HumanDuration {
    fn default() -> Self {
        HumanDuration(std::time::Duration::from_secs(0))
    }
}

impl HumanDuration {
    pub fn as_duration(&self) -> std::time::Duration {
        self.0
    }
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        let (num_str, unit) = if let Some(num) = s.strip_suffix("ms") {
            (num, "ms")
        } else if let Some(num) = s.strip_suffix('s') {
            (num, "s")
        } else if let Some(num) = s.strip_suffix('m') {
            (num, "m")
        } else if let Some(num) = s.strip_suffix('h') {
            (num, "h")
        } else {
            return Err(format!("Invalid duration format: {}", s));
        };

        let num: u64 = num_str
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", s))?;

        let duration = match unit {
            "ms" => std::time::Duration::from_millis(num),
            "s" => std::time::Duration::from_secs(num),
            "m" => std::time::Duration::from_secs(num * 60),
            "h" => std::time::Duration::from_secs(num * 3600),
            _ => return Err(format!("Unknown duration unit: {}", unit)),
        };

        Ok(HumanDuration(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        let millis = self.0.as_millis();

        if millis < 1000 {
            write!(f, "{}ms", millis)
        } else if secs < 60 {
            write!(f, "{}s", secs)
        } else if secs < 3600 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{}h", secs / 3600)
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HumanDuration::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Human-readable bytes (e.g., "512mb", "2gb"). Used for space reservations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HumanBytes(pub u64);

impl HumanBytes {
    pub fn as_bytes(&self) -> u64 {
        self.0
    }
}

impl FromStr for HumanBytes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        let (num_str, multiplier) = if let Some(num) = s.strip_suffix("tb") {
            (num, 1024u64 * 1024 * 1024 * 1024)
        } else if let Some(num) = s.strip_suffix("gb") {
            (num, 1024u64 * 1024 * 1024)
        } else if let Some(num) = s.strip_suffix("mb") {
            (num, 1024u64 * 1024)
        } else if let Some(num) = s.strip_suffix("kb") {
            (num, 1024u64)
        } else if let Some(num) = s.strip_suffix('b') {
            (num, 1u64)
        } else {
            // Bare numbers are bytes
            (s.as_str(), 1u64)
        };

        let num: u64 = num_str
            .parse()
            .map_err(|_| format!("Invalid number in bytes: {}", s))?;

        num.checked_mul(multiplier)
            .map(HumanBytes)
            .ok_or_else(|| format!("Byte amount overflows: {}", s))
    }
}

impl fmt::Display for HumanBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;

        if bytes >= 1024 * 1024 * 1024 * 1024 {
            write!(f, "{}tb", bytes / (1024 * 1024 * 1024 * 1024))
        } else if bytes >= 1024 * 1024 * 1024 {
            write!(f, "{}gb", bytes / (1024 * 1024 * 1024))
        } else if bytes >= 1024 * 1024 {
            write!(f, "{}mb", bytes / (1024 * 1024))
        } else if bytes >= 1024 {
            write!(f, "{}kb", bytes / 1024)
        } else {
            write!(f, "{}b", bytes)
        }
    }
}

/// Strip a protocol prefix (`scheme://`) and surrounding slashes from a target address.
///
/// `dfs://0xabc/` -> `0xabc`
pub fn sanitize_address(address: &str) -> String {
    let trimmed = address.trim();
    let without_scheme = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed,
    };
    without_scheme.trim_matches('/').to_string()
}

/// The storage address whose tree is mirrored.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TargetConfig {
    pub address: String,
}

impl TargetConfig {
    /// Address without its protocol prefix; used as the root directory name.
    pub fn sanitized_address(&self) -> String {
        sanitize_address(&self.address)
    }
}

/// Signing account used for mutations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccountConfig {
    #[serde(default)]
    pub address: Option<String>,
    /// Content key handed to backend mutation calls.
    #[serde(default)]
    pub key: Option<String>,
}

/// Local filesystem backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FsBackendConfig {
    #[serde(default)]
    pub root: Option<String>,
}

/// In-memory backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemoryBackendConfig {
    /// Simulated latency applied to every backend call.
    #[serde(default)]
    pub latency: Option<HumanDuration>,
}

/// Tagged enum for backend configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Fs(FsBackendConfig),
    Memory(MemoryBackendConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory(MemoryBackendConfig::default())
    }
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Fs(_) => "fs",
            BackendConfig::Memory(_) => "memory",
        }
    }
}

/// Listing cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings { enabled: true }
    }
}

/// Operation queue settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueueSettings {
    /// Bound of the submission channel.
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Unread events per subscriber before it is reported as falling behind.
    #[serde(default)]
    pub bus_capacity: Option<usize>,
}

/// Name search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_true")]
    pub ignore_case: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings { ignore_case: true }
    }
}

fn default_true() -> bool {
    true
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefsConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub target: TargetConfig,
    #[serde(default)]
    pub account: Option<AccountConfig>,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    /// Warm the listing cache for the whole tree on startup.
    #[serde(default)]
    pub preload: bool,
    #[serde(default)]
    pub search: SearchSettings,
}
