use crate::core::noise_filter::ExclusionRules;
use crate::core::throttle::{BlockedHosts, HostThrottle, IdentityPool};
use crate::domain::model::{
    FailureKind, FetchContext, FetchOutcome, Identifier, RunReport, SearchQuery,
};
use crate::domain::ports::{NameResolver, SourceAdapter};
use crate::utils::text::{shorten_search_phrase, DEFAULT_PHRASE_TOKENS};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(45);

/// Fans one identifier out to every adapter concurrently and gathers what
/// comes back. A failing or slow adapter only ever costs its own result.
pub struct SourceOrchestrator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    resolver: Option<Arc<dyn NameResolver>>,
    rules: Arc<ExclusionRules>,
    identities: IdentityPool,
    throttle: HostThrottle,
    blocked: BlockedHosts,
    adapter_timeout: Duration,
    phrase_tokens: usize,
}

impl SourceOrchestrator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, rules: Arc<ExclusionRules>) -> Self {
        Self {
            adapters,
            resolver: None,
            rules,
            identities: IdentityPool::default(),
            throttle: HostThrottle::new(1),
            blocked: BlockedHosts::default(),
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
            phrase_tokens: DEFAULT_PHRASE_TOKENS,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_identities(mut self, identities: IdentityPool) -> Self {
        self.identities = identities;
        self
    }

    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    pub fn with_max_per_host(mut self, max_per_host: usize) -> Self {
        self.throttle = HostThrottle::new(max_per_host);
        self
    }

    pub fn with_phrase_tokens(mut self, tokens: usize) -> Self {
        self.phrase_tokens = tokens.max(1);
        self
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub async fn run(&self, identifier: &Identifier) -> RunReport {
        let ctx = FetchContext {
            user_agent: self.identities.pick(),
        };
        let raw_query = SearchQuery::raw(identifier);
        let phrase_query = self
            .resolve_phrase(identifier, &ctx)
            .await
            .map(|term| SearchQuery {
                identifier: identifier.clone(),
                term,
            });

        let mut pending: FuturesUnordered<_> = self
            .adapters
            .iter()
            .enumerate()
            .map(|(index, adapter)| {
                let query = match (&phrase_query, adapter.wants_free_text()) {
                    (Some(phrase), true) => phrase,
                    _ => &raw_query,
                };
                let ctx = &ctx;
                async move { (index, self.fetch_one(adapter.as_ref(), query, ctx).await) }
            })
            .collect();

        // Slots keep adapter order no matter which adapter finishes first.
        let mut slots: Vec<Option<FetchOutcome>> = vec![None; self.adapters.len()];
        while let Some((index, outcome)) = pending.next().await {
            tracing::info!(
                identifier = %identifier,
                source = self.adapters[index].name(),
                "Source finished: {}",
                outcome.label()
            );
            slots[index] = Some(outcome);
        }
        drop(pending);

        let mut per_source = BTreeMap::new();
        let mut all_candidates = Vec::new();
        for (adapter, slot) in self.adapters.iter().zip(slots) {
            let outcome = slot.unwrap_or(FetchOutcome::Failure(FailureKind::Timeout));
            all_candidates.extend(self.rules.filter(outcome.candidates()));
            per_source.insert(adapter.name().to_string(), outcome);
        }

        RunReport {
            identifier: identifier.clone(),
            search_term: phrase_query.map(|q| q.term),
            user_agent: ctx.user_agent,
            per_source,
            all_candidates,
        }
    }

    /// The timeout bounds the wait for the host slot as well as the fetch.
    async fn fetch_one(
        &self,
        adapter: &dyn SourceAdapter,
        query: &SearchQuery,
        ctx: &FetchContext,
    ) -> FetchOutcome {
        let host = adapter.host();
        tracing::debug!(source = adapter.name(), term = %query.term, "Querying source");
        let request = async {
            let outcome = adapter.fetch(query, ctx).await;
            if outcome == FetchOutcome::Failure(FailureKind::BlockedByHost) {
                self.blocked.block(host).await;
            }
            outcome
        };
        let attempt = self.on_host(host, adapter.min_interval(), request);

        match tokio::time::timeout(self.adapter_timeout, attempt).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => FetchOutcome::Failure(FailureKind::BlockedByHost),
            Err(_) => {
                tracing::warn!(
                    source = adapter.name(),
                    "Source exceeded {:?}; recording timeout",
                    self.adapter_timeout
                );
                FetchOutcome::Failure(FailureKind::Timeout)
            }
        }
    }

    /// Sends `request` once `host` has a free slot and its politeness delay
    /// has passed. `None` when the host is blocked.
    async fn on_host<T>(
        &self,
        host: &str,
        min_interval: Duration,
        request: impl Future<Output = T>,
    ) -> Option<T> {
        if self.blocked.is_blocked(host).await {
            return None;
        }
        let _permit = self.throttle.acquire(host, min_interval).await;
        // Another request to the same host may have been blocked while we waited.
        if self.blocked.is_blocked(host).await {
            return None;
        }
        Some(request.await)
    }

    /// Barcode to short product phrase, only when some adapter needs one.
    /// Any failure falls back to the raw identifier.
    async fn resolve_phrase(&self, identifier: &Identifier, ctx: &FetchContext) -> Option<String> {
        if !identifier.is_barcode() || !self.adapters.iter().any(|a| a.wants_free_text()) {
            return None;
        }
        let Some(resolver) = &self.resolver else {
            tracing::debug!(
                identifier = %identifier,
                "No name resolver configured; searching raw code"
            );
            return None;
        };

        let host = resolver.host();
        let request = async {
            let result = resolver.resolve(identifier, ctx).await;
            if matches!(&result, Err(e) if e.kind == FailureKind::BlockedByHost) {
                self.blocked.block(host).await;
            }
            result
        };
        let lookup = self.on_host(host, resolver.min_interval(), request);
        match tokio::time::timeout(self.adapter_timeout, lookup).await {
            Ok(Some(Ok(name))) => {
                let phrase = shorten_search_phrase(&name, self.phrase_tokens);
                match &phrase {
                    Some(p) => tracing::info!(identifier = %identifier, "Resolved to '{}'", p),
                    None => tracing::warn!(
                        identifier = %identifier,
                        "Resolved name '{}' had no usable tokens",
                        name
                    ),
                }
                phrase
            }
            Ok(Some(Err(e))) => {
                tracing::warn!(
                    identifier = %identifier,
                    "Name resolution failed ({}); using raw code",
                    e
                );
                None
            }
            Ok(None) => {
                tracing::warn!(
                    identifier = %identifier,
                    host,
                    "Name lookup host is blocked; using raw code"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    identifier = %identifier,
                    "Name resolution timed out; using raw code"
                );
                None
            }
        }
    }
}
