// Adapters layer: concrete implementations of the domain ports (sources,
// browser, sheet) and the wiring that builds them from configuration.

pub mod browser;
pub mod dom;
pub mod http;
pub mod rakuten;
pub mod sheet;
pub mod yahoo;

use crate::config::AppConfig;
use crate::core::orchestrator::SourceOrchestrator;
use crate::domain::ports::{BrowserSession, NameResolver, SourceAdapter};
use crate::utils::error::Result;
use std::sync::Arc;

/// Builds the enabled adapters in a fixed order: APIs first, then DOM
/// sources in file order. This order breaks price ties.
pub fn build_adapters(
    config: &AppConfig,
    browser: Arc<dyn BrowserSession>,
) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    if config.rakuten_enabled() {
        if let Some(rakuten) = &config.sources.rakuten {
            adapters.push(Arc::new(rakuten::build(rakuten)?));
        }
    }
    if config.yahoo_enabled() {
        if let Some(yahoo) = &config.sources.yahoo {
            adapters.push(Arc::new(yahoo::build(yahoo)?));
        }
    }
    for dom_config in config.enabled_dom_sources() {
        adapters.push(Arc::new(dom::DomAdapter::from_config(dom_config, browser.clone())?));
    }

    Ok(adapters)
}

/// The barcode-to-name lookup rides on the Yahoo catalogue when naming is on.
pub fn build_resolver(config: &AppConfig) -> Result<Option<Arc<dyn NameResolver>>> {
    if !config.naming_enabled() {
        return Ok(None);
    }
    let yahoo_config = config.sources.yahoo.clone().unwrap_or_default();
    let resolver: Arc<dyn NameResolver> = Arc::new(yahoo::build(&yahoo_config)?);
    Ok(Some(resolver))
}

pub fn build_orchestrator(
    config: &AppConfig,
    browser: Arc<dyn BrowserSession>,
) -> Result<SourceOrchestrator> {
    let adapters = build_adapters(config, browser)?;
    let mut orchestrator = SourceOrchestrator::new(adapters, Arc::new(config.exclusion_rules()))
        .with_identities(config.identity_pool())
        .with_adapter_timeout(config.adapter_timeout())
        .with_max_per_host(config.max_per_host())
        .with_phrase_tokens(config.phrase_tokens());

    if let Some(resolver) = build_resolver(config)? {
        orchestrator = orchestrator.with_resolver(resolver);
    }
    Ok(orchestrator)
}
