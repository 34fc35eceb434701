//! Outbound notification and email contracts.
//!
//! Gateways are write-only sinks. They are invoked after the core state
//! change has committed and their failures never flow back to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::invitation::Invitation;
use crate::domain::quotation::{Currency, Quotation};
use crate::domain::request::{ProcurementRequest, RequestId};
use crate::domain::SupplierId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    QuotationInvitation,
    QuotationReceived,
    QuotationNotSelected,
    QuotationWinner,
    SupplierSelected,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotationInvitation => "quotation_invitation",
            Self::QuotationReceived => "quotation_received",
            Self::QuotationNotSelected => "quotation_not_selected",
            Self::QuotationWinner => "quotation_winner",
            Self::SupplierSelected => "supplier_selected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "quotation_invitation" => Some(Self::QuotationInvitation),
            "quotation_received" => Some(Self::QuotationReceived),
            "quotation_not_selected" => Some(Self::QuotationNotSelected),
            "quotation_winner" => Some(Self::QuotationWinner),
            "supplier_selected" => Some(Self::SupplierSelected),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedType {
    Request,
    Invitation,
    Quotation,
}

impl RelatedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Invitation => "invitation",
            Self::Quotation => "quotation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "request" => Some(Self::Request),
            "invitation" => Some(Self::Invitation),
            "quotation" => Some(Self::Quotation),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_id: String,
    pub related_type: RelatedType,
}

impl Notification {
    pub fn invitation(invitation: &Invitation, request: &ProcurementRequest) -> Self {
        Self {
            user_id: invitation.supplier_id.0.clone(),
            kind: NotificationType::QuotationInvitation,
            title: "New quotation request".to_string(),
            message: format!(
                "You have been invited to quote on \"{}\" before {}",
                request.title,
                invitation.due_date.format("%Y-%m-%d")
            ),
            related_id: invitation.id.0.clone(),
            related_type: RelatedType::Invitation,
        }
    }

    pub fn quotation_received(manager_id: &str, quotation: &Quotation) -> Self {
        Self {
            user_id: manager_id.to_string(),
            kind: NotificationType::QuotationReceived,
            title: "Quotation received".to_string(),
            message: format!(
                "{} submitted a quotation of {} {}",
                quotation.supplier_name,
                quotation.total_amount,
                quotation.currency.as_str()
            ),
            related_id: quotation.id.0.clone(),
            related_type: RelatedType::Quotation,
        }
    }

    pub fn not_selected(quotation: &Quotation, request: &ProcurementRequest) -> Self {
        Self {
            user_id: quotation.supplier_id.0.clone(),
            kind: NotificationType::QuotationNotSelected,
            title: "Quotation not selected".to_string(),
            message: format!("Another quotation was selected for \"{}\"", request.title),
            related_id: quotation.id.0.clone(),
            related_type: RelatedType::Quotation,
        }
    }

    pub fn winner(quotation: &Quotation, request: &ProcurementRequest) -> Self {
        Self {
            user_id: quotation.supplier_id.0.clone(),
            kind: NotificationType::QuotationWinner,
            title: "Your quotation was selected".to_string(),
            message: format!("Your quotation for \"{}\" was selected", request.title),
            related_id: quotation.id.0.clone(),
            related_type: RelatedType::Quotation,
        }
    }

    pub fn supplier_selected(
        requester_id: &str,
        quotation: &Quotation,
        request: &ProcurementRequest,
    ) -> Self {
        Self {
            user_id: requester_id.to_string(),
            kind: NotificationType::SupplierSelected,
            title: "Supplier selected".to_string(),
            message: format!(
                "{} was selected for \"{}\" at {} {}",
                quotation.supplier_name,
                request.title,
                quotation.total_amount,
                quotation.currency.as_str()
            ),
            related_id: request.id.0.clone(),
            related_type: RelatedType::Request,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub title: String,
    pub requester_id: String,
}

impl From<&ProcurementRequest> for RequestMeta {
    fn from(request: &ProcurementRequest) -> Self {
        Self { title: request.title.clone(), requester_id: request.requester_id.clone() }
    }
}

/// One batch for all invited suppliers plus an informational copy for the
/// requester.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationEmails {
    pub request_id: RequestId,
    pub request: RequestMeta,
    pub supplier_ids: Vec<SupplierId>,
    pub requester_email: Option<String>,
    pub due_date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerEmails {
    pub request_id: RequestId,
    pub request: RequestMeta,
    pub winner_supplier_id: SupplierId,
    pub requester_email: Option<String>,
    pub amount: Decimal,
    pub currency: Currency,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmailMessage {
    Invitations(InvitationEmails),
    Winner(WinnerEmails),
}

impl EmailMessage {
    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::Invitations(emails) => &emails.request_id,
            Self::Winner(emails) => &emails.request_id,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway rejected message: {0}")]
    Rejected(String),
    #[error("gateway transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send_invitation_emails(&self, emails: &InvitationEmails) -> Result<(), GatewayError>;

    async fn send_winner_emails(&self, emails: &WinnerEmails) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{
        EmailMessage, Notification, NotificationType, RelatedType, RequestMeta, WinnerEmails,
    };
    use crate::domain::invitation::InvitationId;
    use crate::domain::quotation::{Currency, Quotation, QuotationId, QuotationStatus};
    use crate::domain::request::{ProcurementRequest, RequestId};
    use crate::domain::SupplierId;

    fn request() -> ProcurementRequest {
        ProcurementRequest::new(RequestId("REQ-1".to_string()), "Copper wire", "user-9", Utc::now())
    }

    fn quotation() -> Quotation {
        let now = Utc::now();
        Quotation {
            id: QuotationId("QTN-1".to_string()),
            invitation_id: InvitationId("INV-1".to_string()),
            request_id: RequestId("REQ-1".to_string()),
            supplier_id: SupplierId("SUP-1".to_string()),
            supplier_name: "Acme".to_string(),
            total_amount: Decimal::new(125_050, 2),
            currency: Currency::Eur,
            delivery_days: 3,
            delivery_date: now,
            payment_terms: "net 60".to_string(),
            valid_until: now + Duration::days(3),
            notes: None,
            attachments: Vec::new(),
            status: QuotationStatus::Selected,
            is_winner: true,
            is_reselection: false,
            ranking_score: None,
            submitted_at: now,
            selected_at: Some(now),
            updated_at: now,
        }
    }

    #[test]
    fn supplier_selected_targets_the_requester() {
        let notification = Notification::supplier_selected("user-9", &quotation(), &request());

        assert_eq!(notification.user_id, "user-9");
        assert_eq!(notification.kind, NotificationType::SupplierSelected);
        assert_eq!(notification.related_type, RelatedType::Request);
        assert!(notification.message.contains("1250.50 EUR"));
    }

    #[test]
    fn email_message_serializes_with_kind_tag() {
        let message = EmailMessage::Winner(WinnerEmails {
            request_id: RequestId("REQ-1".to_string()),
            request: RequestMeta::from(&request()),
            winner_supplier_id: SupplierId("SUP-1".to_string()),
            requester_email: Some("buyer@example.com".to_string()),
            amount: Decimal::new(125_050, 2),
            currency: Currency::Eur,
        });

        let json = serde_json::to_value(&message).expect("serialize");
        assert_eq!(json["kind"], "winner");
        assert_eq!(json["currency"], "EUR");
        assert_eq!(message.request_id(), &RequestId("REQ-1".to_string()));
    }
}
