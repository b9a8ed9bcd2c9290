use crate::domain::model::{
    CellUpdate, FetchContext, FetchOutcome, Identifier, SearchQuery, SheetCell,
};
use crate::utils::error::{Result, SourceError};
use async_trait::async_trait;
use std::time::Duration;

/// A per-source fetch-and-normalize unit.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Host the adapter talks to; politeness and backoff are tracked per host.
    fn host(&self) -> &str;

    /// Minimum spacing between two requests this adapter sends to its host.
    fn min_interval(&self) -> Duration {
        Duration::ZERO
    }

    /// Whether a barcode must be turned into a product phrase before searching.
    fn wants_free_text(&self) -> bool {
        false
    }

    async fn fetch(&self, query: &SearchQuery, ctx: &FetchContext) -> FetchOutcome;
}

/// Looks up the catalogue name for a barcode. The lookup shares per-host
/// spacing and blocking with the adapters.
#[async_trait]
pub trait NameResolver: Send + Sync {
    fn host(&self) -> &str;

    fn min_interval(&self) -> Duration {
        Duration::ZERO
    }

    async fn resolve(
        &self,
        barcode: &Identifier,
        ctx: &FetchContext,
    ) -> std::result::Result<String, SourceError>;
}

/// The tabular store. Only reads of one column, appends, and targeted cell
/// writes are needed.
pub trait SheetClient: Send + Sync {
    fn read_column(
        &self,
        column: usize,
        skip_header: bool,
    ) -> impl std::future::Future<Output = Result<Vec<SheetCell>>> + Send;

    fn append_rows(
        &self,
        rows: Vec<Vec<String>>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Applies all updates together or none of them.
    fn update_cells(
        &self,
        updates: Vec<CellUpdate>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// A headless browser able to open independent tabs.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn open_page(&self, user_agent: &str) -> Result<Box<dyn PageHandle>>;
}

/// One browser tab. Only one navigation is in flight on a tab at a time,
/// which `&mut self` on `navigate` enforces.
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Polls until an element matching `selector` is present or `timeout`
    /// elapses. Returns whether it appeared.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool>;

    async fn title(&self) -> Result<String>;

    async fn content(&self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;
}
