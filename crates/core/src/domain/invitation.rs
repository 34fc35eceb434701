use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quotation::QuotationId;
use crate::domain::request::RequestId;
use crate::domain::SupplierId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvitationId(pub String);

impl InvitationId {
    pub fn generate() -> Self {
        Self(format!("INV-{}", uuid::Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Viewed,
    Quoted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Viewed => "viewed",
            Self::Quoted => "quoted",
            Self::Declined => "declined",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "viewed" => Some(Self::Viewed),
            "quoted" => Some(Self::Quoted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

/// A supplier's standing offer-to-bid on a request.
///
/// Callers are expected to send at most one invitation per
/// (request, supplier) pair; the store does not enforce it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub request_id: RequestId,
    pub supplier_id: SupplierId,
    pub manager_id: String,
    pub status: InvitationStatus,
    pub due_date: DateTime<Utc>,
    pub message: Option<String>,
    pub delivery_address: Option<String>,
    pub quotation_id: Option<QuotationId>,
    pub created_at: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn can_transition_to(&self, next: InvitationStatus) -> bool {
        matches!(
            (self.status, next),
            (InvitationStatus::Pending, InvitationStatus::Viewed)
                | (InvitationStatus::Pending, InvitationStatus::Declined)
                | (InvitationStatus::Viewed, InvitationStatus::Declined)
                | (InvitationStatus::Pending, InvitationStatus::Quoted)
                | (InvitationStatus::Viewed, InvitationStatus::Quoted)
                | (InvitationStatus::Quoted, InvitationStatus::Quoted)
                | (InvitationStatus::Quoted, InvitationStatus::Viewed)
        )
    }

    pub fn transition_to(&mut self, next: InvitationStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::invalid_transition("invitation", self.status.as_str(), next.as_str()))
    }

    /// Returns `false` when the invitation was already seen or answered.
    pub fn mark_viewed(&mut self, now: DateTime<Utc>) -> Result<bool, DomainError> {
        match self.status {
            InvitationStatus::Viewed | InvitationStatus::Quoted => Ok(false),
            InvitationStatus::Pending => {
                self.transition_to(InvitationStatus::Viewed)?;
                self.viewed_at = Some(now);
                Ok(true)
            }
            InvitationStatus::Declined => Err(DomainError::invalid_transition(
                "invitation",
                self.status.as_str(),
                InvitationStatus::Viewed.as_str(),
            )),
        }
    }

    pub fn link_quotation(&mut self, quotation_id: QuotationId) -> Result<(), DomainError> {
        self.transition_to(InvitationStatus::Quoted)?;
        self.quotation_id = Some(quotation_id);
        Ok(())
    }

    pub fn revert_to_viewed(&mut self) -> Result<(), DomainError> {
        if self.status != InvitationStatus::Quoted {
            return Err(DomainError::invalid_transition(
                "invitation",
                self.status.as_str(),
                InvitationStatus::Viewed.as_str(),
            ));
        }
        self.transition_to(InvitationStatus::Viewed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Invitation, InvitationId, InvitationStatus};
    use crate::domain::quotation::QuotationId;
    use crate::domain::request::RequestId;
    use crate::domain::SupplierId;
    use crate::errors::DomainError;

    fn invitation(status: InvitationStatus) -> Invitation {
        Invitation {
            id: InvitationId("INV-1".to_string()),
            request_id: RequestId("REQ-1".to_string()),
            supplier_id: SupplierId("SUP-1".to_string()),
            manager_id: "manager-1".to_string(),
            status,
            due_date: Utc::now(),
            message: None,
            delivery_address: None,
            quotation_id: None,
            created_at: Utc::now(),
            viewed_at: None,
        }
    }

    #[test]
    fn viewing_is_a_noop_once_seen() {
        let mut viewed = invitation(InvitationStatus::Viewed);
        assert!(!viewed.mark_viewed(Utc::now()).expect("viewed stays viewed"));

        let mut quoted = invitation(InvitationStatus::Quoted);
        assert!(!quoted.mark_viewed(Utc::now()).expect("quoted is not downgraded"));
        assert_eq!(quoted.status, InvitationStatus::Quoted);

        let mut pending = invitation(InvitationStatus::Pending);
        assert!(pending.mark_viewed(Utc::now()).expect("pending -> viewed"));
        assert!(pending.viewed_at.is_some());
    }

    #[test]
    fn declined_invitation_cannot_be_viewed_or_quoted() {
        let mut declined = invitation(InvitationStatus::Declined);
        assert!(matches!(
            declined.mark_viewed(Utc::now()),
            Err(DomainError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            declined.link_quotation(QuotationId("QTN-1".to_string())),
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn quoted_invitation_reverts_to_viewed() {
        let mut inv = invitation(InvitationStatus::Viewed);
        inv.link_quotation(QuotationId("QTN-1".to_string())).expect("viewed -> quoted");
        inv.revert_to_viewed().expect("quoted -> viewed");

        assert_eq!(inv.status, InvitationStatus::Viewed);
        assert_eq!(inv.quotation_id, Some(QuotationId("QTN-1".to_string())));
    }

    #[test]
    fn quoted_invitation_cannot_be_declined() {
        let mut inv = invitation(InvitationStatus::Quoted);
        assert!(inv.transition_to(InvitationStatus::Declined).is_err());
    }
}
