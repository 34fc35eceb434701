#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;

use tender_core::domain::quotation::{Currency, QuotationTerms};
use tender_core::domain::request::{ProcurementRequest, RequestId};
use tender_core::ranking::RankingEngine;
use tender_db::repositories::{InMemoryRfqStore, RfqRepositories};
use tender_db::{connect_with_settings, migrations, DbPool};
use tender_engine::{Dispatcher, Outbox, RecordingGateway, RetryPolicy, RfqServices};

pub const REQUEST_ID: &str = "REQ-1";
pub const REQUESTER: &str = "requester-1";
pub const MANAGER: &str = "manager-1";

pub struct Harness {
    pub services: Arc<RfqServices>,
    pub repositories: RfqRepositories,
    pub gateway: Arc<RecordingGateway>,
    pub outbox: Outbox,
    pub pool: Option<DbPool>,
    _dir: Option<TempDir>,
}

impl Harness {
    pub async fn memory() -> Self {
        Self::memory_with_gateway(RecordingGateway::default()).await
    }

    pub async fn memory_with_gateway(gateway: RecordingGateway) -> Self {
        let repositories = RfqRepositories::in_memory(Arc::new(InMemoryRfqStore::new()));
        Self::build(repositories, gateway, None, None).await
    }

    /// File-backed so that several pooled connections share one database.
    pub async fn sqlite() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("tender.db").display());
        let pool = connect_with_settings(&url, 5, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repositories = RfqRepositories::sql(pool.clone());
        Self::build(repositories, RecordingGateway::default(), Some(pool), Some(dir)).await
    }

    async fn build(
        repositories: RfqRepositories,
        gateway: RecordingGateway,
        pool: Option<DbPool>,
        dir: Option<TempDir>,
    ) -> Self {
        let gateway = Arc::new(gateway);
        let policy = RetryPolicy { max_attempts: 2, base_delay_ms: 1, max_delay_ms: 5 };
        let (outbox, _worker) = Dispatcher::new(gateway.clone(), gateway.clone(), policy).spawn(64);

        let mut request = ProcurementRequest::new(
            RequestId(REQUEST_ID.to_string()),
            "Steel beams",
            REQUESTER,
            Utc::now(),
        );
        request.requester_email = Some("buyer@example.com".to_string());
        repositories.requests.save(request).await.expect("seed request");

        let services =
            Arc::new(RfqServices::new(repositories.clone(), outbox.clone(), RankingEngine::new()));
        Self { services, repositories, gateway, outbox, pool, _dir: dir }
    }

    pub fn request_id(&self) -> RequestId {
        RequestId(REQUEST_ID.to_string())
    }

    pub async fn request(&self) -> ProcurementRequest {
        self.repositories
            .requests
            .find_by_id(&self.request_id())
            .await
            .expect("find request")
            .expect("request exists")
    }
}

pub fn terms(amount: i64, delivery_days: u32) -> QuotationTerms {
    QuotationTerms {
        total_amount: Decimal::from(amount),
        currency: Currency::Usd,
        delivery_days,
        payment_terms: "net 30".to_string(),
        valid_until: Utc::now() + Duration::days(30),
        notes: None,
        attachments: Vec::new(),
    }
}
