mod common;

use std::collections::HashMap;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use common::{terms, Harness, MANAGER, REQUESTER};
use tender_core::domain::invitation::{InvitationId, InvitationStatus};
use tender_core::domain::quotation::{QuotationId, QuotationStatus, QuotationUpdate};
use tender_core::domain::request::{RequestId, RequestStatus};
use tender_core::domain::SupplierId;
use tender_core::notify::{EmailMessage, NotificationType};
use tender_engine::{InviteSuppliers, RecordingGateway, SubmitQuotation};

fn supplier(id: &str) -> SupplierId {
    SupplierId(id.to_string())
}

async fn invite(harness: &Harness, suppliers: &[&str]) -> Vec<InvitationId> {
    harness
        .services
        .invitations
        .invite(InviteSuppliers {
            request_id: harness.request_id(),
            supplier_ids: suppliers.iter().map(|id| supplier(id)).collect(),
            manager_id: MANAGER.to_string(),
            due_date: Utc::now() + Duration::days(14),
            message: Some("Please quote by end of month".to_string()),
            delivery_address: None,
        })
        .await
        .expect("invite suppliers")
}

async fn submit(
    harness: &Harness,
    invitation_id: &InvitationId,
    supplier_id: &str,
    amount: i64,
    delivery_days: u32,
) -> QuotationId {
    harness
        .services
        .quotations
        .submit(SubmitQuotation {
            invitation_id: invitation_id.clone(),
            supplier_id: supplier(supplier_id),
            supplier_name: format!("{supplier_id} Ltd"),
            terms: terms(amount, delivery_days),
        })
        .await
        .expect("submit quotation")
}

async fn award_then_reselect(harness: Harness) {
    let invitations = invite(&harness, &["SUP-1", "SUP-2"]).await;
    assert_eq!(invitations.len(), 2);
    assert_eq!(harness.request().await.status, RequestStatus::Quoting);

    harness.services.invitations.mark_viewed(&invitations[0]).await.expect("view");
    let first = submit(&harness, &invitations[0], "SUP-1", 1000, 5).await;
    let second = submit(&harness, &invitations[1], "SUP-2", 1200, 3).await;

    let linked = harness.services.invitations.get(&invitations[0]).await.expect("invitation");
    assert_eq!(linked.status, InvitationStatus::Quoted);
    assert_eq!(linked.quotation_id.as_ref(), Some(&first));

    let outcome = harness
        .services
        .selection
        .select_winner(&first, &harness.request_id(), REQUESTER)
        .await
        .expect("select winner");
    assert_eq!(outcome.winner.status, QuotationStatus::Selected);
    assert!(outcome.winner.is_winner);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].id, second);

    let request = harness.request().await;
    assert_eq!(request.status, RequestStatus::Awarded);
    assert_eq!(request.winner_id, Some(supplier("SUP-1")));
    assert_eq!(request.winner_quotation_id.as_ref(), Some(&first));
    assert_eq!(request.winner_amount, Some(Decimal::from(1000)));
    assert_eq!(
        harness.services.quotations.get(&second).await.expect("loser").status,
        QuotationStatus::Rejected
    );

    let reopened = harness
        .services
        .reselection
        .revoke_winner(&harness.request_id(), MANAGER, "missed the delivery window")
        .await
        .expect("revoke winner");
    assert_eq!(reopened.status, RequestStatus::Quoting);
    assert_eq!(reopened.previous_winner_id, Some(supplier("SUP-1")));
    assert_eq!(reopened.winner_quotation_id, None);

    let eligible = harness
        .services
        .reselection
        .get_eligible_for_reselection(&harness.request_id())
        .await
        .expect("eligible");
    assert_eq!(eligible.iter().map(|q| q.id.clone()).collect::<Vec<_>>(), vec![second.clone()]);

    let replacement = harness
        .services
        .reselection
        .reselect(&second, &harness.request_id(), MANAGER)
        .await
        .expect("reselect");
    assert!(replacement.winner.is_reselection);
    assert!(replacement.rejected.is_empty());

    let request = harness.request().await;
    assert_eq!(request.status, RequestStatus::Awarded);
    assert_eq!(request.winner_id, Some(supplier("SUP-2")));
    assert_eq!(request.previous_winner_id, Some(supplier("SUP-1")));
    assert_eq!(
        harness.services.quotations.get(&first).await.expect("revoked").status,
        QuotationStatus::Revoked
    );

    harness.outbox.flush().await;
    let kinds: Vec<(String, NotificationType)> = harness
        .gateway
        .notifications()
        .await
        .into_iter()
        .map(|n| (n.user_id, n.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("SUP-1".to_string(), NotificationType::QuotationInvitation),
            ("SUP-2".to_string(), NotificationType::QuotationInvitation),
            (MANAGER.to_string(), NotificationType::QuotationReceived),
            (MANAGER.to_string(), NotificationType::QuotationReceived),
            ("SUP-2".to_string(), NotificationType::QuotationNotSelected),
            ("SUP-1".to_string(), NotificationType::QuotationWinner),
            (REQUESTER.to_string(), NotificationType::SupplierSelected),
            ("SUP-2".to_string(), NotificationType::QuotationWinner),
        ]
    );

    let emails = harness.gateway.emails().await;
    assert_eq!(emails.len(), 2);
    assert!(matches!(emails[0], EmailMessage::Invitations(_)));
    assert!(matches!(&emails[1], EmailMessage::Winner(w) if w.winner_supplier_id.0 == "SUP-1"));
}

#[tokio::test]
async fn award_then_reselect_on_memory_store() {
    award_then_reselect(Harness::memory().await).await;
}

#[tokio::test]
async fn award_then_reselect_on_sqlite() {
    award_then_reselect(Harness::sqlite().await).await;
}

#[tokio::test]
async fn penalized_supplier_cannot_be_reselected() {
    let harness = Harness::memory().await;
    let invitations = invite(&harness, &["SUP-1", "SUP-2"]).await;
    let first = submit(&harness, &invitations[0], "SUP-1", 1000, 5).await;
    submit(&harness, &invitations[1], "SUP-2", 1200, 3).await;
    harness
        .services
        .selection
        .select_winner(&first, &harness.request_id(), REQUESTER)
        .await
        .expect("select");
    harness
        .services
        .reselection
        .revoke_winner(&harness.request_id(), MANAGER, "quality issues")
        .await
        .expect("revoke");

    let request_before = harness.request().await;
    let quotations_before =
        harness.services.quotations.list_by_request(&harness.request_id()).await.expect("list");

    let error = harness
        .services
        .reselection
        .reselect(&first, &harness.request_id(), MANAGER)
        .await
        .expect_err("penalized supplier");
    assert!(error.is_policy_violation());

    assert_eq!(harness.request().await, request_before);
    assert_eq!(
        harness.services.quotations.list_by_request(&harness.request_id()).await.expect("list"),
        quotations_before
    );
}

#[tokio::test]
async fn second_selection_is_refused_once_awarded() {
    let harness = Harness::sqlite().await;
    let invitations = invite(&harness, &["SUP-1", "SUP-2"]).await;
    let first = submit(&harness, &invitations[0], "SUP-1", 1000, 5).await;
    let second = submit(&harness, &invitations[1], "SUP-2", 900, 8).await;

    harness
        .services
        .selection
        .select_winner(&first, &harness.request_id(), REQUESTER)
        .await
        .expect("first selection");
    let error = harness
        .services
        .selection
        .select_winner(&second, &harness.request_id(), REQUESTER)
        .await
        .expect_err("already awarded");
    assert!(error.is_already_awarded());
    assert_eq!(harness.request().await.winner_quotation_id, Some(first));
}

#[tokio::test]
async fn cancelled_quotation_is_resubmitted_by_update() {
    let harness = Harness::memory().await;
    let invitations = invite(&harness, &["SUP-1"]).await;
    let quotation_id = submit(&harness, &invitations[0], "SUP-1", 1000, 5).await;

    let cancelled = harness
        .services
        .quotations
        .cancel(&quotation_id, &invitations[0])
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, QuotationStatus::Cancelled);
    let invitation = harness.services.invitations.get(&invitations[0]).await.expect("invitation");
    assert_eq!(invitation.status, InvitationStatus::Viewed);

    let updated = harness
        .services
        .quotations
        .update(
            &quotation_id,
            QuotationUpdate {
                total_amount: Some(Decimal::from(950)),
                ..QuotationUpdate::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(updated.status, QuotationStatus::Submitted);
    assert_eq!(updated.total_amount, Decimal::from(950));

    let invitation = harness.services.invitations.get(&invitations[0]).await.expect("invitation");
    assert_eq!(invitation.status, InvitationStatus::Quoted);
    assert_eq!(invitation.quotation_id, Some(quotation_id));
}

#[tokio::test]
async fn selected_quotation_cannot_be_edited_or_cancelled() {
    let harness = Harness::memory().await;
    let invitations = invite(&harness, &["SUP-1"]).await;
    let quotation_id = submit(&harness, &invitations[0], "SUP-1", 1000, 5).await;
    harness
        .services
        .selection
        .select_winner(&quotation_id, &harness.request_id(), REQUESTER)
        .await
        .expect("select");

    let error = harness
        .services
        .quotations
        .update(
            &quotation_id,
            QuotationUpdate { delivery_days: Some(2), ..QuotationUpdate::default() },
        )
        .await
        .expect_err("selected is final for edits");
    assert!(error.is_invalid_transition());

    let error = harness
        .services
        .quotations
        .cancel(&quotation_id, &invitations[0])
        .await
        .expect_err("selected cannot be cancelled");
    assert!(error.is_invalid_transition());
}

#[tokio::test]
async fn comparison_skips_cancelled_quotations() {
    let harness = Harness::memory().await;
    let invitations = invite(&harness, &["SUP-1", "SUP-2", "SUP-3"]).await;
    let cheap = submit(&harness, &invitations[0], "SUP-1", 800, 10).await;
    let fast = submit(&harness, &invitations[1], "SUP-2", 1000, 2).await;
    let withdrawn = submit(&harness, &invitations[2], "SUP-3", 500, 1).await;
    harness.services.quotations.cancel(&withdrawn, &invitations[2]).await.expect("cancel");

    let quality = HashMap::from([(supplier("SUP-1"), Decimal::from(60))]);
    let ranked = harness
        .services
        .comparison
        .compare(&harness.request_id(), &quality)
        .await
        .expect("compare");

    assert_eq!(ranked.len(), 2);
    assert!(ranked.iter().all(|q| q.ranking_score.is_some()));
    let ids: Vec<QuotationId> = ranked.iter().map(|q| q.id.clone()).collect();
    assert!(ids.contains(&cheap));
    assert!(ids.contains(&fast));
    assert!(ranked[0].ranking_score >= ranked[1].ranking_score);

    let stored = harness.services.quotations.get(&cheap).await.expect("stored");
    assert_eq!(stored.ranking_score, None);
}

#[tokio::test]
async fn missing_entities_are_reported_as_not_found() {
    let harness = Harness::memory().await;
    let missing_request = RequestId("REQ-404".to_string());

    let error = harness
        .services
        .comparison
        .compare(&missing_request, &HashMap::new())
        .await
        .expect_err("no request");
    assert!(error.is_not_found());

    let error = harness
        .services
        .invitations
        .invite(InviteSuppliers {
            request_id: missing_request,
            supplier_ids: vec![supplier("SUP-1")],
            manager_id: MANAGER.to_string(),
            due_date: Utc::now() + Duration::days(7),
            message: None,
            delivery_address: None,
        })
        .await
        .expect_err("no request");
    assert!(error.is_not_found());

    let error = harness
        .services
        .selection
        .select_winner(&QuotationId("QUO-404".to_string()), &harness.request_id(), REQUESTER)
        .await
        .expect_err("no quotation");
    assert!(error.is_not_found());
}

#[tokio::test]
async fn declined_invitation_cannot_be_quoted() {
    let harness = Harness::memory().await;
    let invitations = invite(&harness, &["SUP-1"]).await;
    harness.services.invitations.decline(&invitations[0]).await.expect("decline");

    let error = harness
        .services
        .quotations
        .submit(SubmitQuotation {
            invitation_id: invitations[0].clone(),
            supplier_id: supplier("SUP-1"),
            supplier_name: "SUP-1 Ltd".to_string(),
            terms: terms(1000, 5),
        })
        .await
        .expect_err("declined");
    assert!(error.is_invalid_transition());
    assert!(harness
        .services
        .quotations
        .list_by_request(&harness.request_id())
        .await
        .expect("list")
        .is_empty());
}

#[tokio::test]
async fn quotation_from_another_supplier_is_refused() {
    let harness = Harness::memory().await;
    let invitations = invite(&harness, &["SUP-1"]).await;

    let error = harness
        .services
        .quotations
        .submit(SubmitQuotation {
            invitation_id: invitations[0].clone(),
            supplier_id: supplier("SUP-9"),
            supplier_name: "Interloper".to_string(),
            terms: terms(1000, 5),
        })
        .await
        .expect_err("wrong supplier");
    assert!(error.is_validation());
}

#[tokio::test]
async fn gateway_failures_do_not_fail_operations() {
    let harness = Harness::memory_with_gateway(RecordingGateway::always_failing()).await;
    let invitations = invite(&harness, &["SUP-1"]).await;
    let quotation_id = submit(&harness, &invitations[0], "SUP-1", 1000, 5).await;
    harness
        .services
        .selection
        .select_winner(&quotation_id, &harness.request_id(), REQUESTER)
        .await
        .expect("select despite failing gateway");

    harness.outbox.flush().await;
    assert!(harness.gateway.notifications().await.is_empty());
    assert!(harness.gateway.attempts() > 0);
    assert_eq!(harness.request().await.status, RequestStatus::Awarded);
}

#[tokio::test]
async fn invitation_links_follow_quotation_lifecycle() {
    let harness = Harness::sqlite().await;
    let invitations = invite(&harness, &["SUP-1", "SUP-2"]).await;

    let linked = harness
        .services
        .invitations
        .link_quotation(&invitations[1], QuotationId("QTN-manual".to_string()))
        .await
        .expect("link");
    assert_eq!(linked.status, InvitationStatus::Quoted);
    let reverted =
        harness.services.invitations.revert_to_viewed(&invitations[1]).await.expect("revert");
    assert_eq!(reverted.status, InvitationStatus::Viewed);
    let error = harness
        .services
        .invitations
        .revert_to_viewed(&invitations[0])
        .await
        .expect_err("pending invitation has nothing to revert");
    assert!(error.is_invalid_transition());

    let quotation_id = submit(&harness, &invitations[0], "SUP-1", 700, 4).await;
    let found = harness
        .services
        .quotations
        .find_by_invitation(&invitations[0])
        .await
        .expect("find")
        .expect("quotation linked to invitation");
    assert_eq!(found.id, quotation_id);
    assert!(harness
        .services
        .quotations
        .find_by_invitation(&invitations[1])
        .await
        .expect("find")
        .is_none());

    let for_supplier =
        harness.services.invitations.list_by_supplier(&supplier("SUP-1")).await.expect("list");
    assert_eq!(for_supplier.len(), 1);
    assert_eq!(for_supplier[0].quotation_id.as_ref(), Some(&quotation_id));
    let bids =
        harness.services.quotations.list_by_supplier(&supplier("SUP-1")).await.expect("list");
    assert_eq!(bids.len(), 1);
    let for_request =
        harness.services.invitations.list_by_request(&harness.request_id()).await.expect("list");
    assert_eq!(for_request.len(), 2);
}
