use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;

use tender_core::domain::quotation::Quotation;
use tender_core::domain::request::RequestId;
use tender_core::domain::SupplierId;
use tender_core::errors::ApplicationError;
use tender_core::ranking::RankingEngine;
use tender_db::repositories::{QuotationRepository, RequestRepository};

/// Ranked view over a request's live quotations. Scores are returned to the
/// caller only and never written back.
pub struct ComparisonService {
    requests: Arc<dyn RequestRepository>,
    quotations: Arc<dyn QuotationRepository>,
    engine: RankingEngine,
}

impl ComparisonService {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        quotations: Arc<dyn QuotationRepository>,
        engine: RankingEngine,
    ) -> Self {
        Self { requests, quotations, engine }
    }

    pub async fn compare(
        &self,
        request_id: &RequestId,
        quality_scores: &HashMap<SupplierId, Decimal>,
    ) -> Result<Vec<Quotation>, ApplicationError> {
        if self.requests.find_by_id(request_id).await?.is_none() {
            return Err(ApplicationError::not_found("request", &request_id.0));
        }

        let active: Vec<Quotation> = self
            .quotations
            .list_by_request(request_id)
            .await?
            .into_iter()
            .filter(Quotation::is_active)
            .collect();
        let ranked = self.engine.rank(active, quality_scores);

        debug!(
            event_name = "rfq.ranking.computed",
            request_id = %request_id.0,
            quotations = ranked.len(),
            "ranked comparison computed"
        );
        Ok(ranked)
    }
}
