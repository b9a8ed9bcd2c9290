use crate::domain::model::{CandidateListing, ReconciledRecord};

/// Picks the cheapest candidate. Among equal prices the earliest one in the
/// input wins; the orchestrator orders candidates by adapter position, so the
/// tie-break follows the configured adapter order.
pub fn reconcile(candidates: &[CandidateListing]) -> Option<ReconciledRecord> {
    let mut best: Option<&CandidateListing> = None;
    for candidate in candidates {
        match best {
            Some(current) if candidate.price() >= current.price() => {}
            _ => best = Some(candidate),
        }
    }

    best.map(|winner| ReconciledRecord {
        identifier: winner.identifier().clone(),
        canonical_name: winner.raw_name().to_string(),
        price: winner.price(),
        source_name: winner.source_name().to_string(),
        listing_url: winner.listing_url().to_string(),
        image_url: winner.image_url().map(str::to_string),
        category_id: winner.category_id().map(str::to_string),
    })
}
