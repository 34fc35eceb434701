//! Comparative scoring of competing quotations.
//!
//! Scores are relative to the set being compared: the cheapest and fastest
//! bids in the set anchor the price and delivery components. They are
//! recomputed on every call and never treated as authoritative; a manager may
//! select any active bid regardless of its rank.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::quotation::Quotation;
use crate::domain::SupplierId;
use crate::errors::DomainError;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Points awarded per scoring component. Must sum to 100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub price: Decimal,
    pub delivery: Decimal,
    pub quality: Decimal,
    /// Flat participation credit every bid receives.
    pub baseline: Decimal,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            price: Decimal::from(40),
            delivery: Decimal::from(30),
            quality: Decimal::from(20),
            baseline: Decimal::from(10),
        }
    }
}

impl RankingWeights {
    pub fn total(&self) -> Decimal {
        self.price + self.delivery + self.quality + self.baseline
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let components = [
            ("price", self.price),
            ("delivery", self.delivery),
            ("quality", self.quality),
            ("baseline", self.baseline),
        ];
        if let Some((name, _)) = components.iter().find(|(_, weight)| weight.is_sign_negative()) {
            return Err(DomainError::Validation(format!("{name} weight must not be negative")));
        }
        if self.total() != HUNDRED {
            return Err(DomainError::Validation(format!(
                "ranking weights must sum to 100, got {}",
                self.total()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct RankingEngine {
    weights: RankingWeights,
}

impl RankingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: RankingWeights) -> Result<Self, DomainError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }

    /// Scores and orders `quotations`, best first.
    ///
    /// Any `ranking_score` already present on the input is overwritten. Ties
    /// go to the earliest submission; bids submitted at the same instant keep
    /// their input order.
    pub fn rank(
        &self,
        mut quotations: Vec<Quotation>,
        quality_scores: &HashMap<SupplierId, Decimal>,
    ) -> Vec<Quotation> {
        let Some(min_price) = quotations.iter().map(|q| q.total_amount).min() else {
            return quotations;
        };
        let min_days = quotations.iter().map(|q| q.delivery_days).min().unwrap_or(0);

        for quotation in &mut quotations {
            let quality = quality_scores
                .get(&quotation.supplier_id)
                .copied()
                .unwrap_or(Decimal::ZERO)
                .clamp(Decimal::ZERO, HUNDRED);
            quotation.ranking_score = Some(self.score(quotation, min_price, min_days, quality));
        }

        quotations.sort_by(|left, right| {
            right
                .ranking_score
                .cmp(&left.ranking_score)
                .then_with(|| left.submitted_at.cmp(&right.submitted_at))
        });
        quotations
    }

    fn score(
        &self,
        quotation: &Quotation,
        min_price: Decimal,
        min_days: u32,
        quality: Decimal,
    ) -> Decimal {
        let price = if min_price > Decimal::ZERO && quotation.total_amount > Decimal::ZERO {
            min_price * self.weights.price / quotation.total_amount
        } else {
            Decimal::ZERO
        };
        let delivery = if min_days > 0 && quotation.delivery_days > 0 {
            Decimal::from(min_days) * self.weights.delivery / Decimal::from(quotation.delivery_days)
        } else {
            Decimal::ZERO
        };
        let quality = quality * self.weights.quality / HUNDRED;

        (price + delivery + quality + self.weights.baseline)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}
