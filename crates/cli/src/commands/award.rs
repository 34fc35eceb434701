use std::sync::Arc;

use anyhow::Context;
use tender_core::config::AppConfig;
use tender_core::domain::quotation::QuotationId;
use tender_core::domain::request::RequestId;
use tender_core::errors::ApplicationError;
use tender_core::ranking::RankingEngine;
use tender_db::repositories::SqlNotificationRepository;
use tender_db::{DbPool, RfqRepositories};
use tender_engine::{
    email_gateway_from_config, Dispatcher, Outbox, RetryPolicy, RfqServices,
    SqlNotificationGateway,
};

use crate::commands::{load_config, open_database, runtime, CommandResult};

/// Manager-side award operations run against the configured database.
#[derive(Clone, Debug)]
pub enum AwardAction {
    Select { request_id: String, quotation_id: String, requester_id: String },
    Revoke { request_id: String, manager_id: String, reason: String },
    Reselect { request_id: String, quotation_id: String, manager_id: String },
}

impl AwardAction {
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::Select { .. } => "select",
            Self::Revoke { .. } => "revoke",
            Self::Reselect { .. } => "reselect",
        }
    }
}

pub fn run(action: AwardAction) -> CommandResult {
    let command = action.command_name();
    let config = match load_config(command) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime(command) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match open_database(command, &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };
        let (services, outbox) = match wire_services(&config, pool.clone()) {
            Ok(wired) => wired,
            Err(error) => {
                return CommandResult::failure(command, "service_init", format!("{error:#}"), 3)
            }
        };

        let result = execute(&services, action).await;
        // Deliver queued notifications before the runtime shuts down.
        outbox.flush().await;
        pool.close().await;

        match result {
            Ok(message) => CommandResult::success(command, message),
            Err(error) => CommandResult::from_application_error(command, error),
        }
    })
}

fn wire_services(config: &AppConfig, pool: DbPool) -> anyhow::Result<(RfqServices, Outbox)> {
    let email = email_gateway_from_config(&config.email).context("building email gateway")?;
    let ranking = RankingEngine::with_weights(config.ranking).context("ranking weights")?;
    let notifications = SqlNotificationGateway::new(Arc::new(SqlNotificationRepository::new(
        pool.clone(),
    )));

    let (outbox, _worker) =
        Dispatcher::new(Arc::new(notifications), email, RetryPolicy::from(&config.dispatch))
            .spawn(config.dispatch.queue_capacity);
    let services = RfqServices::new(RfqRepositories::sql(pool), outbox.clone(), ranking);
    Ok((services, outbox))
}

async fn execute(services: &RfqServices, action: AwardAction) -> Result<String, ApplicationError> {
    match action {
        AwardAction::Select { request_id, quotation_id, requester_id } => {
            let outcome = services
                .selection
                .select_winner(
                    &QuotationId(quotation_id),
                    &RequestId(request_id),
                    &requester_id,
                )
                .await?;
            Ok(format!(
                "request {} awarded to {} (quotation {}); {} competing quotation(s) rejected",
                outcome.request.id.0,
                outcome.winner.supplier_id,
                outcome.winner.id.0,
                outcome.rejected.len()
            ))
        }
        AwardAction::Revoke { request_id, manager_id, reason } => {
            let request = services
                .reselection
                .revoke_winner(&RequestId(request_id), &manager_id, &reason)
                .await?;
            let penalized =
                request.previous_winner_id.as_ref().map(|id| id.0.as_str()).unwrap_or("<none>");
            Ok(format!(
                "request {} reopened for quoting; supplier {} is barred from reselection",
                request.id.0, penalized
            ))
        }
        AwardAction::Reselect { request_id, quotation_id, manager_id } => {
            let outcome = services
                .reselection
                .reselect(&QuotationId(quotation_id), &RequestId(request_id), &manager_id)
                .await?;
            Ok(format!(
                "request {} re-awarded to {} (quotation {})",
                outcome.request.id.0, outcome.winner.supplier_id, outcome.winner.id.0
            ))
        }
    }
}
