use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use tender_core::domain::quotation::Quotation;
use tender_core::domain::request::RequestId;
use tender_core::domain::SupplierId;
use tender_core::ranking::RankingEngine;
use tender_db::RfqRepositories;
use tender_engine::ComparisonService;

use crate::commands::{load_config, open_database, runtime, CommandResult};

/// Parses `SUPPLIER=SCORE` with a score in 0..=100.
pub fn parse_quality_score(raw: &str) -> Result<(String, Decimal), String> {
    let (supplier, score) =
        raw.split_once('=').ok_or_else(|| format!("expected SUPPLIER=SCORE, got `{raw}`"))?;
    let supplier = supplier.trim();
    if supplier.is_empty() {
        return Err("supplier id must not be blank".to_string());
    }
    let score = Decimal::from_str(score.trim())
        .map_err(|error| format!("invalid quality score `{score}`: {error}"))?;
    if score < Decimal::ZERO || score > Decimal::ONE_HUNDRED {
        return Err(format!("quality score for {supplier} must be within 0..=100"));
    }
    Ok((supplier.to_string(), score))
}

pub fn run(request_id: &str, quality: &[(String, Decimal)]) -> CommandResult {
    let config = match load_config("rank") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let engine = match RankingEngine::with_weights(config.ranking) {
        Ok(engine) => engine,
        Err(error) => {
            return CommandResult::failure("rank", "config_validation", error.to_string(), 2)
        }
    };
    let runtime = match runtime("rank") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let quality_scores: HashMap<SupplierId, Decimal> = quality
        .iter()
        .map(|(supplier, score)| (SupplierId(supplier.clone()), *score))
        .collect();
    let request_id = RequestId(request_id.to_string());

    runtime.block_on(async {
        let pool = match open_database("rank", &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };
        let repositories = RfqRepositories::sql(pool.clone());
        let comparison =
            ComparisonService::new(repositories.requests, repositories.quotations, engine);
        let ranked = comparison.compare(&request_id, &quality_scores).await;
        pool.close().await;

        match ranked {
            Ok(ranked) if ranked.is_empty() => CommandResult::success(
                "rank",
                format!("request {} has no active quotations", request_id.0),
            ),
            Ok(ranked) => CommandResult::success("rank", render_ranking(&ranked)),
            Err(error) => CommandResult::from_application_error("rank", error),
        }
    })
}

fn render_ranking(ranked: &[Quotation]) -> String {
    ranked
        .iter()
        .enumerate()
        .map(|(index, quotation)| {
            format!(
                "#{} {} supplier={} amount={} {} delivery_days={} score={}",
                index + 1,
                quotation.id.0,
                quotation.supplier_id,
                quotation.total_amount,
                quotation.currency.as_str(),
                quotation.delivery_days,
                quotation.ranking_score.unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
