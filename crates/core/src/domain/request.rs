use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quotation::{Currency, QuotationId};
use crate::domain::SupplierId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    Pending,
    InProgress,
    Quoting,
    Awarded,
    Completed,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Quoting => "quoting",
            Self::Awarded => "awarded",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "quoting" => Some(Self::Quoting),
            "awarded" => Some(Self::Awarded),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// The procurement request an RFQ runs against.
///
/// Requests are created by the outer application. The engine only writes the
/// status and the winner/adjudication fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementRequest {
    pub id: RequestId,
    pub title: String,
    pub requester_id: String,
    pub requester_email: Option<String>,
    pub status: RequestStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub winner_id: Option<SupplierId>,
    pub winner_quotation_id: Option<QuotationId>,
    pub winner_amount: Option<Decimal>,
    pub winner_currency: Option<Currency>,
    pub winner_delivery_days: Option<u32>,
    /// Supplier penalized by a revocation. Kept after reselection for audit.
    pub previous_winner_id: Option<SupplierId>,
    pub revocation_reason: Option<String>,
    pub adjudicated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcurementRequest {
    pub fn new(
        id: RequestId,
        title: impl Into<String>,
        requester_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            requester_id: requester_id.into(),
            requester_email: None,
            status: RequestStatus::InProgress,
            due_date: None,
            winner_id: None,
            winner_quotation_id: None,
            winner_amount: None,
            winner_currency: None,
            winner_delivery_days: None,
            previous_winner_id: None,
            revocation_reason: None,
            adjudicated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_awarded(&self) -> bool {
        self.status == RequestStatus::Awarded
    }

    /// Invitations are refused once the request is adjudicated or closed.
    pub fn accepts_invitations(&self) -> bool {
        !matches!(
            self.status,
            RequestStatus::Awarded | RequestStatus::Completed | RequestStatus::Rejected
        )
    }

    /// Only the first round of invitations moves the request into quoting.
    pub fn should_enter_quoting(&self) -> bool {
        !matches!(
            self.status,
            RequestStatus::Quoting
                | RequestStatus::Awarded
                | RequestStatus::Completed
                | RequestStatus::Rejected
        )
    }
}
