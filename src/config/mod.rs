#[cfg(feature = "cli")]
pub mod cli;

use crate::core::engine::{WriteMode, DEFAULT_IDENTIFIER_DELAY};
use crate::core::noise_filter::{ExclusionRules, DEFAULT_EXCLUSION_PATTERNS};
use crate::core::orchestrator::DEFAULT_ADAPTER_TIMEOUT;
use crate::core::throttle::IdentityPool;
use crate::utils::error::{Result, ScoutError};
use crate::utils::text::DEFAULT_PHRASE_TOKENS;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const RAKUTEN_ENDPOINT: &str =
    "https://app.rakuten.co.jp/services/api/IchibaItem/Search/20220601";
pub const YAHOO_ENDPOINT: &str = "https://shopping.yahooapis.jp/ShoppingWebService/V3/itemSearch";

/// Whole-process configuration, built once at start-up and passed down.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
    pub identity: Option<IdentityConfig>,
    pub filter: Option<FilterConfig>,
    pub naming: Option<NamingConfig>,
    #[serde(default)]
    pub sources: SourcesConfig,
    pub browser: Option<BrowserSettings>,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub identifier_delay_ms: Option<u64>,
    pub adapter_timeout_secs: Option<u64>,
    pub max_per_host: Option<usize>,
    pub mode: Option<WriteMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub user_agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Replaces the built-in patterns when `replace_defaults` is set,
    /// otherwise extends them.
    pub exclusion_patterns: Vec<String>,
    pub replace_defaults: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    pub enabled: Option<bool>,
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub rakuten: Option<RakutenConfig>,
    pub yahoo: Option<YahooConfig>,
    pub dom: Option<Vec<DomSourceConfig>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RakutenConfig {
    pub enabled: Option<bool>,
    pub application_id: Option<String>,
    pub endpoint: Option<String>,
    pub hits: Option<u32>,
    pub min_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YahooConfig {
    pub enabled: Option<bool>,
    pub app_id: Option<String>,
    pub endpoint: Option<String>,
    pub results: Option<u32>,
    pub min_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomSourceConfig {
    pub name: String,
    pub enabled: Option<bool>,
    /// Search page URL with a `{query}` placeholder.
    pub search_url: String,
    /// Container to wait for before reading the page.
    pub result_selector: Option<String>,
    pub item_selector: String,
    pub name_selector: String,
    pub price_selector: String,
    pub link_selector: Option<String>,
    pub wait_timeout_secs: Option<u64>,
    pub navigation_timeout_secs: Option<u64>,
    pub min_interval_ms: Option<u64>,
    pub max_listings: Option<usize>,
    /// Search with a product phrase instead of a barcode.
    pub free_text: Option<bool>,
    pub block_markers: Option<Vec<String>>,
}

impl DomSourceConfig {
    /// Hard-Off NetMall, the default scraping target.
    pub fn hardoff() -> Self {
        Self {
            name: "hardoff".to_string(),
            enabled: Some(true),
            search_url: "https://netmall.hardoff.co.jp/search/?q={query}".to_string(),
            result_selector: Some(".p-result-card".to_string()),
            item_selector: ".p-result-card".to_string(),
            name_selector: ".p-result-card__title".to_string(),
            price_selector: ".p-result-card__price".to_string(),
            link_selector: Some("a[href]".to_string()),
            wait_timeout_secs: None,
            navigation_timeout_secs: None,
            min_interval_ms: Some(3000),
            max_listings: None,
            free_text: Some(true),
            block_markers: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserSettings {
    pub chrome_path: Option<String>,
    pub headless: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Sheet that receives appended rows, or is refreshed in update mode.
    pub output_path: String,
    /// Identifier list for append mode.
    pub input_path: Option<String>,
    pub input_column: Option<usize>,
    pub has_header: Option<bool>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            output_path: "./prices.csv".to_string(),
            input_path: None,
            input_column: None,
            has_header: None,
        }
    }
}

/// An optional secret counts as absent when empty or when its `${VAR}`
/// placeholder was left unresolved.
pub fn resolve_secret(value: Option<&String>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || (value.starts_with("${") && value.ends_with('}')) {
        None
    } else {
        Some(value.to_string())
    }
}

fn is_enabled(flag: Option<bool>) -> bool {
    flag.unwrap_or(true)
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        toml::from_str(&processed).map_err(|e| ScoutError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value. Unset variables are
    /// left as-is so optional secrets can be detected as missing.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| ScoutError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn identifier_delay(&self) -> Duration {
        self.run
            .identifier_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_IDENTIFIER_DELAY)
    }

    pub fn adapter_timeout(&self) -> Duration {
        self.run
            .adapter_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_ADAPTER_TIMEOUT)
    }

    pub fn max_per_host(&self) -> usize {
        self.run.max_per_host.unwrap_or(1)
    }

    pub fn write_mode(&self) -> WriteMode {
        self.run.mode.unwrap_or_default()
    }

    pub fn exclusion_rules(&self) -> ExclusionRules {
        match &self.filter {
            Some(f) if f.replace_defaults.unwrap_or(false) => {
                ExclusionRules::new(&f.exclusion_patterns)
            }
            Some(f) => ExclusionRules::new(
                DEFAULT_EXCLUSION_PATTERNS
                    .iter()
                    .map(|p| p.to_string())
                    .chain(f.exclusion_patterns.iter().cloned()),
            ),
            None => ExclusionRules::default(),
        }
    }

    pub fn identity_pool(&self) -> IdentityPool {
        match &self.identity {
            Some(identity) => IdentityPool::new(identity.user_agents.clone()),
            None => IdentityPool::default(),
        }
    }

    pub fn naming_enabled(&self) -> bool {
        self.naming.as_ref().map(|n| is_enabled(n.enabled)).unwrap_or(false)
    }

    pub fn phrase_tokens(&self) -> usize {
        self.naming
            .as_ref()
            .and_then(|n| n.max_tokens)
            .unwrap_or(DEFAULT_PHRASE_TOKENS)
    }

    pub fn enabled_dom_sources(&self) -> Vec<&DomSourceConfig> {
        self.sources
            .dom
            .iter()
            .flatten()
            .filter(|d| is_enabled(d.enabled))
            .collect()
    }

    pub fn rakuten_enabled(&self) -> bool {
        self.sources.rakuten.as_ref().map(|r| is_enabled(r.enabled)).unwrap_or(false)
    }

    pub fn yahoo_enabled(&self) -> bool {
        self.sources.yahoo.as_ref().map(|y| is_enabled(y.enabled)).unwrap_or(false)
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(max) = self.run.max_per_host {
            validation::validate_positive_number("run.max_per_host", max as u64, 1)?;
        }
        if let Some(timeout) = self.run.adapter_timeout_secs {
            validation::validate_range("run.adapter_timeout_secs", timeout, 1, 600)?;
        }
        if let Some(tokens) = self.naming.as_ref().and_then(|n| n.max_tokens) {
            validation::validate_range("naming.max_tokens", tokens, 1, 10)?;
        }

        if let Some(rakuten) = &self.sources.rakuten {
            if let Some(endpoint) = &rakuten.endpoint {
                validation::validate_url("sources.rakuten.endpoint", endpoint)?;
            }
        }
        if let Some(yahoo) = &self.sources.yahoo {
            if let Some(endpoint) = &yahoo.endpoint {
                validation::validate_url("sources.yahoo.endpoint", endpoint)?;
            }
        }

        for dom in self.sources.dom.iter().flatten() {
            validation::validate_non_empty_string("sources.dom.name", &dom.name)?;
            validation::validate_search_template(
                &format!("sources.dom.{}.search_url", dom.name),
                &dom.search_url,
            )?;
            validation::validate_non_empty_string(
                &format!("sources.dom.{}.item_selector", dom.name),
                &dom.item_selector,
            )?;
        }

        let mut names: Vec<&str> = Vec::new();
        if self.rakuten_enabled() {
            names.push("rakuten");
        }
        if self.yahoo_enabled() {
            names.push("yahoo");
        }
        names.extend(self.enabled_dom_sources().iter().map(|d| d.name.as_str()));
        validation::validate_unique_names("sources", names.iter().copied())?;
        if names.is_empty() {
            return Err(ScoutError::ConfigError {
                message: "No sources enabled".to_string(),
            });
        }

        validation::validate_path("store.output_path", &self.store.output_path)?;
        if let Some(input) = &self.store.input_path {
            validation::validate_path("store.input_path", input)?;
        }

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
