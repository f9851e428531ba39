use serde::{Deserialize, Serialize};

use crate::storage::{BackendLocal, StorageManager};

/// Poll cadence shared by the new-records and pending-enrichment polls.
const DEFAULT_POLL_SECS: u64 = 4;
/// Delay before the semantic leg of a free-text search fires.
const DEFAULT_SEMANTIC_DEBOUNCE_MS: u64 = 300;

const DEFAULT_CAPTIONING_URL: &str = "http://localhost:9090/functions";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptioningConfig {
    /// Base URL of the captioning service (analyze-image, reembed,
    /// embed-text endpoints live under it).
    #[serde(default = "default_captioning_url")]
    pub base_url: String,

    /// Service token. Empty means "use the session token".
    #[serde(default)]
    pub token: String,
}

impl Default for CaptioningConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CAPTIONING_URL.to_string(),
            token: String::new(),
        }
    }
}

fn default_captioning_url() -> String {
    DEFAULT_CAPTIONING_URL.to_string()
}

fn default_poll_secs() -> u64 {
    DEFAULT_POLL_SECS
}

fn default_semantic_debounce_ms() -> u64 {
    DEFAULT_SEMANTIC_DEBOUNCE_MS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub captioning: CaptioningConfig,

    #[serde(default = "default_poll_secs")]
    pub new_records_poll_secs: u64,

    #[serde(default = "default_poll_secs")]
    pub enrichment_poll_secs: u64,

    #[serde(default = "default_semantic_debounce_ms")]
    pub semantic_debounce_ms: u64,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            captioning: CaptioningConfig::default(),
            new_records_poll_secs: DEFAULT_POLL_SECS,
            enrichment_poll_secs: DEFAULT_POLL_SECS,
            semantic_debounce_ms: DEFAULT_SEMANTIC_DEBOUNCE_MS,
            base_path: String::new(),
        }
    }
}

impl Config {
    fn validate(&mut self) {
        if let Err(err) = url::Url::parse(&self.captioning.base_url) {
            panic!(
                "captioning.base_url {:?} is not a valid URL: {err}",
                self.captioning.base_url
            );
        }

        if self.new_records_poll_secs == 0 {
            panic!("new_records_poll_secs must be greater than 0");
        }
        if self.enrichment_poll_secs == 0 {
            panic!("enrichment_poll_secs must be greater than 0");
        }
        if self.semantic_debounce_ms == 0 {
            panic!("semantic_debounce_ms must be greater than 0");
        }
    }

    pub fn load_with(base_path: &str) -> Self {
        let store = BackendLocal::new(base_path).expect("couldnt create data directory");

        // create new if does not exist
        if !store.exists("config.yaml") {
            store
                .write(
                    "config.yaml",
                    serde_yml::to_string(&Self::default()).unwrap().as_bytes(),
                )
                .expect("couldnt write default config");
        }

        let config_str = String::from_utf8(store.read("config.yaml").expect("couldnt read config"))
            .expect("config file is not valid utf8");
        let mut config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.base_path = base_path.to_string();

        config.validate();

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config).unwrap() {
            config.save();
        }

        config
    }

    pub fn save(&self) {
        let store = BackendLocal::new(&self.base_path).expect("couldnt create data directory");

        let config_str = serde_yml::to_string(&self).unwrap();
        if let Err(err) = store.write("config.yaml", config_str.as_bytes()) {
            log::error!("failed to write config: {err}");
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

/// Data directory: `KEEP_BASE_PATH` or `~/.local/share/keep`.
pub fn base_path() -> String {
    std::env::var("KEEP_BASE_PATH").unwrap_or(format!(
        "{}/.local/share/keep",
        homedir::my_home()
            .expect("couldnt find home dir")
            .expect("couldnt find home dir")
            .to_string_lossy()
    ))
}
