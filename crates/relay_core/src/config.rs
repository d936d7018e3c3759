use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Credential lookup
// ---------------------------------------------------------------------------

/// Environment variables consulted for each provider's credential, in order.
/// The `RELAY_*` name always wins over the vendor's conventional variable.
const CREDENTIAL_VARS: &[(&str, &[&str])] = &[
    ("self-hosted", &["RELAY_SELF_HOSTED_API_KEY"]),
    ("gateway", &["RELAY_GATEWAY_API_KEY", "OPENROUTER_API_KEY"]),
    ("openai", &["RELAY_OPENAI_API_KEY", "OPENAI_API_KEY"]),
    ("gemini", &["RELAY_GEMINI_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"]),
    ("claude", &["RELAY_CLAUDE_API_KEY", "ANTHROPIC_API_KEY"]),
    ("grok", &["RELAY_GROK_API_KEY", "XAI_API_KEY"]),
    ("deepseek", &["RELAY_DEEPSEEK_API_KEY", "DEEPSEEK_API_KEY"]),
];

// ---------------------------------------------------------------------------
// Per-provider settings
// ---------------------------------------------------------------------------

/// Optional overrides for a single provider. Anything left `None` falls back
/// to the built-in catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub cost_per_1k_tokens: Option<f64>,
}

// ---------------------------------------------------------------------------
// RelayConfig
// ---------------------------------------------------------------------------

/// Router configuration stored at `~/.relay/config.json`.
///
/// API keys are **never** written to the JSON file. They are read from the
/// environment (see [`RelayConfig::populate_keys_from_env`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Provider id (`"openai"`, `"gateway"`, ...) to API key.
    #[serde(skip)]
    pub api_keys: BTreeMap<String, String>,

    // Self-hosted backend
    pub self_hosted_url: String,
    pub self_hosted_model: String,

    // Provider overrides keyed by provider id
    pub providers: BTreeMap<String, ProviderSettings>,

    // Routing
    pub default_tier: String,
    pub attempt_timeout_ms: u64,
    pub request_deadline_ms: Option<u64>,
    pub max_tokens: u32,
    pub scoring_enabled: bool,
    pub history_window_days: u32,

    // Circuit breaker
    pub circuit_failure_threshold: u32,
    pub circuit_cooldown_secs: u64,
    pub rate_limit_cooldown_secs: u64,

    // General
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_keys: BTreeMap::new(),
            self_hosted_url: "http://localhost:11434/v1".into(),
            self_hosted_model: "llama3.1:8b".into(),
            providers: BTreeMap::new(),
            default_tier: "standard".into(),
            attempt_timeout_ms: 30_000,
            request_deadline_ms: None,
            max_tokens: 4096,
            scoring_enabled: true,
            history_window_days: 7,
            circuit_failure_threshold: 3,
            circuit_cooldown_secs: 30,
            rate_limit_cooldown_secs: 60,
            log_level: "info".into(),
        }
    }
}

impl RelayConfig {
    /// Returns the base config directory: `~/.relay/`
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".relay"))
    }

    /// Returns the config file path: `~/.relay/config.json`
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.json"))
    }

    /// Returns the logs directory: `~/.relay/logs/`
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    /// Creates the base and logs directories if they don't exist.
    pub fn ensure_dirs() -> Result<()> {
        let base = Self::base_dir()?;
        std::fs::create_dir_all(&base)
            .with_context(|| format!("Failed to create {}", base.display()))?;
        std::fs::create_dir_all(Self::logs_dir()?)?;
        Ok(())
    }

    /// Loads config from disk (creating a default file if missing) and fills
    /// API keys from the environment.
    pub fn load() -> Result<Self> {
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        let mut config = Self::load_from_path(&path)?;
        config.populate_keys_from_env();
        Ok(config)
    }

    /// Load config from a specific file path. API keys are left empty.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    /// Saves config to the default location (API keys excluded).
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to_path(&path)
    }

    /// Save config to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Fill `api_keys` from the process environment.
    pub fn populate_keys_from_env(&mut self) {
        self.populate_keys_with(|name| std::env::var(name).ok());
    }

    /// Fill `api_keys` using an arbitrary variable lookup. Empty values are
    /// treated as absent.
    pub fn populate_keys_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (provider, vars) in CREDENTIAL_VARS {
            let key = vars
                .iter()
                .filter_map(|var| lookup(var))
                .find(|value| !value.trim().is_empty());
            match key {
                Some(key) => {
                    self.api_keys.insert((*provider).to_string(), key);
                }
                None => {
                    self.api_keys.remove(*provider);
                }
            }
        }
    }

    /// The API key configured for a provider, if any.
    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.api_keys
            .get(provider)
            .map(String::as_str)
            .filter(|k| !k.is_empty())
    }

    /// Set or clear a provider's API key (in memory only).
    pub fn set_api_key(&mut self, provider: &str, key: Option<String>) {
        match key {
            Some(k) if !k.is_empty() => {
                self.api_keys.insert(provider.to_string(), k);
            }
            _ => {
                self.api_keys.remove(provider);
            }
        }
    }

    /// Overrides for a provider; an empty [`ProviderSettings`] when unset.
    pub fn provider_settings(&self, provider: &str) -> ProviderSettings {
        self.providers.get(provider).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// ConfigManager
// ---------------------------------------------------------------------------

/// Thread-safe config holder with a file watcher for hot reload.
///
/// Readers always get a cloned snapshot, so a reload never changes the config
/// seen by a request that is already in flight.
pub struct ConfigManager {
    config: Arc<RwLock<RelayConfig>>,
    path: PathBuf,
    _watcher: Option<RecommendedWatcher>,
}

impl ConfigManager {
    /// Manage the config at the default location (`~/.relay/config.json`).
    pub fn new() -> Result<Self> {
        RelayConfig::ensure_dirs()?;
        Self::from_path(RelayConfig::config_path()?)
    }

    /// Manage the config at `path`, watching its directory for changes.
    pub fn from_path(path: PathBuf) -> Result<Self> {
        let mut config = RelayConfig::load_from_path(&path)?;
        config.populate_keys_from_env();
        let config = Arc::new(RwLock::new(config));

        let watcher = match Self::setup_watcher(Arc::clone(&config), path.clone()) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("Config watcher unavailable ({e}); hot reload disabled");
                None
            }
        };

        Ok(Self {
            config,
            path,
            _watcher: watcher,
        })
    }

    /// Get a clone of the current config (including API keys).
    pub fn get(&self) -> RelayConfig {
        self.config.read().clone()
    }

    /// Path of the managed config file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mutate the config and persist the non-secret fields.
    pub fn update(&self, f: impl FnOnce(&mut RelayConfig)) -> Result<()> {
        let mut config = self.config.write();
        f(&mut config);
        config.save_to_path(&self.path)
    }

    /// Re-read the file from disk immediately, keeping the current API keys
    /// when the environment no longer provides them.
    pub fn reload(&self) -> Result<()> {
        let fresh = Self::read_fresh(&self.path)?;
        *self.config.write() = fresh;
        info!("Config reloaded from {}", self.path.display());
        Ok(())
    }

    fn read_fresh(path: &Path) -> Result<RelayConfig> {
        let mut config = RelayConfig::load_from_path(path)?;
        config.populate_keys_from_env();
        Ok(config)
    }

    fn setup_watcher(
        config: Arc<RwLock<RelayConfig>>,
        path: PathBuf,
    ) -> Result<RecommendedWatcher> {
        let watch_dir = path
            .parent()
            .map(Path::to_path_buf)
            .context("Config path has no parent directory")?;
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .context("Config path has no file name")?;

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
            let Ok(event) = res else { return };
            if event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str())) {
                match Self::read_fresh(&path) {
                    Ok(new_config) => {
                        *config.write() = new_config;
                        info!("Config hot-reloaded");
                    }
                    Err(e) => warn!("Failed to hot-reload config: {e}"),
                }
            }
        })?;

        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_config_path() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        (tmp, path)
    }

    #[test]
    fn missing_file_creates_default() {
        let (_tmp, path) = temp_config_path();
        let config = RelayConfig::load_from_path(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.default_tier, "standard");
        assert_eq!(config.attempt_timeout_ms, 30_000);
        assert_eq!(config.history_window_days, 7);
    }

    #[test]
    fn api_keys_never_serialized() {
        let (_tmp, path) = temp_config_path();
        let mut config = RelayConfig::default();
        config.set_api_key("openai", Some("sk-secret".into()));
        config.save_to_path(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("sk-secret"));

        let loaded = RelayConfig::load_from_path(&path).unwrap();
        assert!(loaded.api_key("openai").is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let (_tmp, path) = temp_config_path();
        std::fs::write(
            &path,
            r#"{"default_tier":"premium","providers":{"grok":{"enabled":false}}}"#,
        )
        .unwrap();

        let config = RelayConfig::load_from_path(&path).unwrap();
        assert_eq!(config.default_tier, "premium");
        assert_eq!(config.circuit_failure_threshold, 3);
        assert_eq!(config.provider_settings("grok").enabled, Some(false));
        assert_eq!(config.provider_settings("openai"), ProviderSettings::default());
    }

    #[test]
    fn env_lookup_prefers_relay_variable() {
        let env: HashMap<&str, &str> = [
            ("RELAY_OPENAI_API_KEY", "sk-relay"),
            ("OPENAI_API_KEY", "sk-vendor"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("RELAY_GROK_API_KEY", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = RelayConfig::default();
        config.populate_keys_with(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.api_key("openai"), Some("sk-relay"));
        assert_eq!(config.api_key("claude"), Some("sk-ant"));
        assert_eq!(config.api_key("grok"), None);
        assert_eq!(config.api_key("gateway"), None);
    }

    #[test]
    fn set_api_key_empty_clears() {
        let mut config = RelayConfig::default();
        config.set_api_key("gemini", Some("AIza".into()));
        assert_eq!(config.api_key("gemini"), Some("AIza"));
        config.set_api_key("gemini", Some(String::new()));
        assert!(config.api_key("gemini").is_none());
    }

    #[test]
    fn manager_update_persists_and_reload_reads_disk() {
        let (_tmp, path) = temp_config_path();
        let manager = ConfigManager::from_path(path.clone()).unwrap();

        manager
            .update(|c| c.attempt_timeout_ms = 5_000)
            .unwrap();
        assert_eq!(manager.get().attempt_timeout_ms, 5_000);

        let on_disk = RelayConfig::load_from_path(&path).unwrap();
        assert_eq!(on_disk.attempt_timeout_ms, 5_000);

        let mut edited = on_disk;
        edited.default_tier = "enterprise".into();
        edited.save_to_path(&path).unwrap();
        manager.reload().unwrap();
        assert_eq!(manager.get().default_tier, "enterprise");
    }

    #[test]
    fn snapshot_is_independent_of_later_updates() {
        let (_tmp, path) = temp_config_path();
        let manager = ConfigManager::from_path(path).unwrap();
        let snapshot = manager.get();
        manager.update(|c| c.scoring_enabled = false).unwrap();
        assert!(snapshot.scoring_enabled);
        assert!(!manager.get().scoring_enabled);
    }
}
