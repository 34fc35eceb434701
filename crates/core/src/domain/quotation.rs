use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::invitation::InvitationId;
use crate::domain::request::RequestId;
use crate::domain::SupplierId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub String);

impl QuotationId {
    pub fn generate() -> Self {
        Self(format!("QTN-{}", uuid::Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USD" => Some(Self::Usd),
            "EUR" => Some(Self::Eur),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Submitted,
    Selected,
    Rejected,
    Cancelled,
    /// Penalty outcome for a winner that failed to perform. Distinct from
    /// `Rejected`, which marks an ordinary losing bid.
    Revoked,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Selected => "selected",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Revoked => "revoked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "selected" => Some(Self::Selected),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// Commercial terms a supplier submits or edits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationTerms {
    pub total_amount: Decimal,
    pub currency: Currency,
    pub delivery_days: u32,
    pub payment_terms: String,
    pub valid_until: DateTime<Utc>,
    pub notes: Option<String>,
    pub attachments: Vec<String>,
}

impl QuotationTerms {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.total_amount <= Decimal::ZERO {
            return Err(DomainError::Validation("total_amount must be greater than zero".into()));
        }
        if self.delivery_days == 0 {
            return Err(DomainError::Validation("delivery_days must be greater than zero".into()));
        }
        if self.payment_terms.trim().is_empty() {
            return Err(DomainError::Validation("payment_terms is required".into()));
        }
        if self.valid_until < now {
            return Err(DomainError::Validation("valid_until must not be in the past".into()));
        }
        Ok(())
    }
}

/// Partial edit of a quotation's terms. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationUpdate {
    pub total_amount: Option<Decimal>,
    pub currency: Option<Currency>,
    pub delivery_days: Option<u32>,
    pub payment_terms: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub attachments: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub invitation_id: InvitationId,
    pub request_id: RequestId,
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub total_amount: Decimal,
    pub currency: Currency,
    pub delivery_days: u32,
    pub delivery_date: DateTime<Utc>,
    pub payment_terms: String,
    pub valid_until: DateTime<Utc>,
    pub notes: Option<String>,
    pub attachments: Vec<String>,
    pub status: QuotationStatus,
    pub is_winner: bool,
    pub is_reselection: bool,
    /// Comparative score from the last ranking pass. Never authoritative.
    pub ranking_score: Option<Decimal>,
    pub submitted_at: DateTime<Utc>,
    pub selected_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        matches!(
            (self.status, next),
            (QuotationStatus::Submitted, QuotationStatus::Submitted)
                | (QuotationStatus::Cancelled, QuotationStatus::Submitted)
                | (QuotationStatus::Submitted, QuotationStatus::Selected)
                | (QuotationStatus::Submitted, QuotationStatus::Rejected)
                | (QuotationStatus::Submitted, QuotationStatus::Cancelled)
                | (QuotationStatus::Rejected, QuotationStatus::Selected)
                | (QuotationStatus::Selected, QuotationStatus::Rejected)
                | (QuotationStatus::Selected, QuotationStatus::Revoked)
        )
    }

    pub fn transition_to(&mut self, next: QuotationStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::invalid_transition("quotation", self.status.as_str(), next.as_str()))
    }

    /// Applies an edit in place. Returns whether the delivery date needs to
    /// be recomputed.
    pub fn apply_update(&mut self, update: QuotationUpdate) -> Result<bool, DomainError> {
        self.transition_to(QuotationStatus::Submitted)?;

        let mut delivery_changed = false;
        if let Some(total_amount) = update.total_amount {
            self.total_amount = total_amount;
        }
        if let Some(currency) = update.currency {
            self.currency = currency;
        }
        if let Some(delivery_days) = update.delivery_days {
            delivery_changed = delivery_days != self.delivery_days;
            self.delivery_days = delivery_days;
        }
        if let Some(payment_terms) = update.payment_terms {
            self.payment_terms = payment_terms;
        }
        if let Some(valid_until) = update.valid_until {
            self.valid_until = valid_until;
        }
        if let Some(notes) = update.notes {
            self.notes = Some(notes);
        }
        if let Some(attachments) = update.attachments {
            self.attachments = attachments;
        }

        Ok(delivery_changed)
    }

    pub fn terms(&self) -> QuotationTerms {
        QuotationTerms {
            total_amount: self.total_amount,
            currency: self.currency,
            delivery_days: self.delivery_days,
            payment_terms: self.payment_terms.clone(),
            valid_until: self.valid_until,
            notes: self.notes.clone(),
            attachments: self.attachments.clone(),
        }
    }

    /// Bids still in the running: cancelled and revoked ones are out.
    pub fn is_active(&self) -> bool {
        !matches!(self.status, QuotationStatus::Cancelled | QuotationStatus::Revoked)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{Currency, Quotation, QuotationId, QuotationStatus, QuotationTerms, QuotationUpdate};
    use crate::domain::invitation::InvitationId;
    use crate::domain::request::RequestId;
    use crate::domain::SupplierId;
    use crate::errors::DomainError;

    fn quotation(status: QuotationStatus) -> Quotation {
        let now = Utc::now();
        Quotation {
            id: QuotationId("QTN-1".to_string()),
            invitation_id: InvitationId("INV-1".to_string()),
            request_id: RequestId("REQ-1".to_string()),
            supplier_id: SupplierId("SUP-1".to_string()),
            supplier_name: "Acme Metals".to_string(),
            total_amount: Decimal::new(10_000, 2),
            currency: Currency::Usd,
            delivery_days: 5,
            delivery_date: now,
            payment_terms: "net 30".to_string(),
            valid_until: now + Duration::days(30),
            notes: None,
            attachments: Vec::new(),
            status,
            is_winner: false,
            is_reselection: false,
            ranking_score: None,
            submitted_at: now,
            selected_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn update_resubmits_cancelled_quotation() {
        let mut q = quotation(QuotationStatus::Submitted);
        q.transition_to(QuotationStatus::Cancelled).expect("submitted -> cancelled");

        let changed = q
            .apply_update(QuotationUpdate { delivery_days: Some(7), ..QuotationUpdate::default() })
            .expect("cancelled quotation can be resubmitted");

        assert!(changed);
        assert_eq!(q.status, QuotationStatus::Submitted);
        assert_eq!(q.delivery_days, 7);
    }

    #[test]
    fn update_is_refused_after_adjudication() {
        for status in
            [QuotationStatus::Selected, QuotationStatus::Rejected, QuotationStatus::Revoked]
        {
            let mut q = quotation(status);
            let error = q
                .apply_update(QuotationUpdate {
                    total_amount: Some(Decimal::ONE),
                    ..QuotationUpdate::default()
                })
                .expect_err("adjudicated quotations are frozen");
            assert!(matches!(error, DomainError::InvalidStateTransition { .. }));
            assert_eq!(q.status, status);
            assert_eq!(q.total_amount, Decimal::new(10_000, 2));
        }
    }

    #[test]
    fn same_delivery_days_do_not_trigger_recompute() {
        let mut q = quotation(QuotationStatus::Submitted);
        let changed = q
            .apply_update(QuotationUpdate { delivery_days: Some(5), ..QuotationUpdate::default() })
            .expect("edit");
        assert!(!changed);
    }

    #[test]
    fn selected_cannot_be_cancelled() {
        let mut q = quotation(QuotationStatus::Selected);
        assert!(q.transition_to(QuotationStatus::Cancelled).is_err());
    }

    #[test]
    fn terms_validation_rejects_non_positive_values() {
        let now = Utc::now();
        let mut terms = quotation(QuotationStatus::Submitted).terms();
        terms.total_amount = Decimal::ZERO;
        assert!(matches!(terms.validate(now), Err(DomainError::Validation(_))));

        let terms =
            QuotationTerms { delivery_days: 0, ..quotation(QuotationStatus::Submitted).terms() };
        assert!(matches!(terms.validate(now), Err(DomainError::Validation(_))));

        let terms = QuotationTerms {
            payment_terms: "  ".to_string(),
            ..quotation(QuotationStatus::Submitted).terms()
        };
        assert!(matches!(terms.validate(now), Err(DomainError::Validation(_))));
    }

    #[test]
    fn currency_parse_is_case_insensitive() {
        assert_eq!(Currency::parse("usd"), Some(Currency::Usd));
        assert_eq!(Currency::parse("EUR"), Some(Currency::Eur));
        assert_eq!(Currency::parse("GBP"), None);
    }
}
