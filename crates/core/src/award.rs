//! Winner selection, revocation and reselection planning.
//!
//! The functions here check preconditions against a snapshot and produce a
//! commit plan. Persistence applies a plan atomically and re-checks the
//! request status under its transaction, so a stale snapshot can only lead to
//! a rejected commit, never to a second winner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use crate::domain::request::{ProcurementRequest, RequestId, RequestStatus};
use crate::domain::SupplierId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardKind {
    Selection,
    Reselection,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AwardCommit {
    pub request_id: RequestId,
    pub quotation_id: QuotationId,
    pub supplier_id: SupplierId,
    pub kind: AwardKind,
    /// Required `previous_winner_id` on the request for a reselection.
    pub penalized_supplier: Option<SupplierId>,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AwardOutcome {
    pub request: ProcurementRequest,
    pub winner: Quotation,
    pub rejected: Vec<Quotation>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AwardCommitResult {
    Committed(AwardOutcome),
    /// The request was awarded by someone else after the snapshot was read.
    AlreadyAwarded,
    /// The candidate quotation is no longer in a selectable status.
    CandidateUnavailable { status: QuotationStatus },
    /// The candidate belongs to the supplier whose award was revoked.
    SupplierPenalized,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevocationCommit {
    pub request_id: RequestId,
    pub quotation_id: QuotationId,
    pub supplier_id: SupplierId,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevocationCommitResult {
    Committed { request: ProcurementRequest, revoked: Quotation },
    NotAwarded,
}

pub fn plan_selection(
    request: &ProcurementRequest,
    candidate: &Quotation,
    now: DateTime<Utc>,
) -> Result<AwardCommit, DomainError> {
    ensure_belongs(request, candidate)?;
    ensure_not_penalized(request, candidate)?;
    if request.is_awarded() {
        return Err(DomainError::AlreadyAwarded { request_id: request.id.0.clone() });
    }
    if candidate.status != QuotationStatus::Submitted {
        return Err(DomainError::invalid_transition(
            "quotation",
            candidate.status.as_str(),
            QuotationStatus::Selected.as_str(),
        ));
    }

    Ok(AwardCommit {
        request_id: request.id.clone(),
        quotation_id: candidate.id.clone(),
        supplier_id: candidate.supplier_id.clone(),
        kind: AwardKind::Selection,
        penalized_supplier: None,
        awarded_at: now,
    })
}

/// Plans a replacement award once the previous winner has been revoked.
///
/// The request may be back in `quoting` or may still read `awarded` when the
/// revocation happened elsewhere; what matters is that `previous_winner_id`
/// is set and no quotation of the request is currently `selected`.
pub fn plan_reselection(
    request: &ProcurementRequest,
    candidate: &Quotation,
    current_winner: Option<&Quotation>,
    now: DateTime<Utc>,
) -> Result<AwardCommit, DomainError> {
    ensure_belongs(request, candidate)?;
    let Some(penalized) = request.previous_winner_id.clone() else {
        return Err(DomainError::invalid_transition(
            "request",
            request.status.as_str(),
            "reselection (no revoked winner)",
        ));
    };
    ensure_not_penalized(request, candidate)?;
    if current_winner.is_some() {
        return Err(DomainError::AlreadyAwarded { request_id: request.id.0.clone() });
    }
    if !candidate.can_transition_to(QuotationStatus::Selected) {
        return Err(DomainError::invalid_transition(
            "quotation",
            candidate.status.as_str(),
            QuotationStatus::Selected.as_str(),
        ));
    }

    Ok(AwardCommit {
        request_id: request.id.clone(),
        quotation_id: candidate.id.clone(),
        supplier_id: candidate.supplier_id.clone(),
        kind: AwardKind::Reselection,
        penalized_supplier: Some(penalized),
        awarded_at: now,
    })
}

pub fn plan_revocation(
    request: &ProcurementRequest,
    winner: Option<&Quotation>,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<RevocationCommit, DomainError> {
    if reason.trim().is_empty() {
        return Err(DomainError::Validation("revocation reason is required".to_string()));
    }
    let winner = match winner {
        Some(winner) if request.is_awarded() && winner.is_winner => winner,
        _ => {
            return Err(DomainError::invalid_transition(
                "request",
                request.status.as_str(),
                "revoked",
            ))
        }
    };
    ensure_belongs(request, winner)?;

    Ok(RevocationCommit {
        request_id: request.id.clone(),
        quotation_id: winner.id.clone(),
        supplier_id: winner.supplier_id.clone(),
        reason: reason.trim().to_string(),
        revoked_at: now,
    })
}

/// Competitors a committed award marks as rejected. Cancelled bids stay
/// cancelled and a revoked bid keeps its penalty status.
pub fn is_rejected_by_award(quotation: &Quotation, winner_id: &QuotationId) -> bool {
    &quotation.id != winner_id
        && !matches!(quotation.status, QuotationStatus::Cancelled | QuotationStatus::Revoked)
}

/// Quotations a manager may pick from after a revocation.
pub fn eligible_for_reselection(
    quotations: Vec<Quotation>,
    penalized: Option<&SupplierId>,
) -> Vec<Quotation> {
    quotations
        .into_iter()
        .filter(|q| q.status != QuotationStatus::Revoked)
        .filter(|q| penalized.map_or(true, |supplier| &q.supplier_id != supplier))
        .collect()
}

impl Quotation {
    pub fn mark_winner(&mut self, commit: &AwardCommit) {
        self.status = QuotationStatus::Selected;
        self.is_winner = true;
        self.is_reselection = commit.kind == AwardKind::Reselection;
        self.selected_at = Some(commit.awarded_at);
        self.updated_at = commit.awarded_at;
    }

    pub fn mark_rejected(&mut self, at: DateTime<Utc>) {
        self.status = QuotationStatus::Rejected;
        self.is_winner = false;
        self.updated_at = at;
    }

    pub fn mark_revoked(&mut self, at: DateTime<Utc>) {
        self.status = QuotationStatus::Revoked;
        self.is_winner = false;
        self.updated_at = at;
    }
}

impl ProcurementRequest {
    pub fn record_award(&mut self, winner: &Quotation, at: DateTime<Utc>) {
        self.status = RequestStatus::Awarded;
        self.winner_id = Some(winner.supplier_id.clone());
        self.winner_quotation_id = Some(winner.id.clone());
        self.winner_amount = Some(winner.total_amount);
        self.winner_currency = Some(winner.currency);
        self.winner_delivery_days = Some(winner.delivery_days);
        self.adjudicated_at = Some(at);
        self.updated_at = at;
    }

    pub fn record_revocation(&mut self, commit: &RevocationCommit) {
        self.status = RequestStatus::Quoting;
        self.previous_winner_id = Some(commit.supplier_id.clone());
        self.revocation_reason = Some(commit.reason.clone());
        self.winner_id = None;
        self.winner_quotation_id = None;
        self.winner_amount = None;
        self.winner_currency = None;
        self.winner_delivery_days = None;
        self.updated_at = commit.revoked_at;
    }
}

/// The quotation currently holding the award, if any.
pub fn current_winner(quotations: &[Quotation]) -> Option<&Quotation> {
    quotations.iter().find(|q| q.status == QuotationStatus::Selected)
}

fn ensure_not_penalized(
    request: &ProcurementRequest,
    candidate: &Quotation,
) -> Result<(), DomainError> {
    if request.previous_winner_id.as_ref() == Some(&candidate.supplier_id) {
        return Err(DomainError::PolicyViolation {
            supplier_id: candidate.supplier_id.0.clone(),
            reason: "cannot re-award the penalized supplier".to_string(),
        });
    }
    Ok(())
}

fn ensure_belongs(request: &ProcurementRequest, quotation: &Quotation) -> Result<(), DomainError> {
    if quotation.request_id != request.id {
        return Err(DomainError::Validation(format!(
            "quotation {} does not belong to request {}",
            quotation.id.0, request.id.0
        )));
    }
    Ok(())
}
