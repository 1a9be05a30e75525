//! Informational cost estimates for the pre-flight printout.
//!
//! Prices are per 1K tokens in US dollars and only feed a message shown
//! before the confirmation prompt; nothing else depends on them.

/// Estimates the monetary cost of a request.
pub trait CostEstimator {
    /// Estimated dollars for `model`. `extra_tokens` are billed at the
    /// prompt rate.
    fn estimate(
        &self,
        model: &str,
        prompt_tokens: f64,
        completion_tokens: f64,
        extra_tokens: f64,
    ) -> f64;
}

/// Per-1K-token prices for one model family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

// Longest prefix wins, so "gpt-4o-mini" must be matched before "gpt-4o".
const PRICES: &[(&str, ModelPrice)] = &[
    (
        "gpt-3.5-turbo",
        ModelPrice {
            prompt_per_1k: 0.0015,
            completion_per_1k: 0.002,
        },
    ),
    (
        "gpt-4o-mini",
        ModelPrice {
            prompt_per_1k: 0.000_15,
            completion_per_1k: 0.0006,
        },
    ),
    (
        "gpt-4o",
        ModelPrice {
            prompt_per_1k: 0.0025,
            completion_per_1k: 0.01,
        },
    ),
    (
        "gpt-4-turbo",
        ModelPrice {
            prompt_per_1k: 0.01,
            completion_per_1k: 0.03,
        },
    ),
    (
        "gpt-4",
        ModelPrice {
            prompt_per_1k: 0.03,
            completion_per_1k: 0.06,
        },
    ),
];

/// Static price table keyed by model-name prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingTable;

impl PricingTable {
    /// Price for `model`, matched by longest known prefix.
    #[must_use]
    pub fn price_for(model: &str) -> Option<ModelPrice> {
        PRICES
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, price)| *price)
    }
}

impl CostEstimator for PricingTable {
    fn estimate(
        &self,
        model: &str,
        prompt_tokens: f64,
        completion_tokens: f64,
        extra_tokens: f64,
    ) -> f64 {
        let Some(price) = Self::price_for(model) else {
            tracing::warn!(model, "No price known for model, estimating $0");
            return 0.0;
        };

        (prompt_tokens + extra_tokens) / 1000.0 * price.prompt_per_1k
            + completion_tokens / 1000.0 * price.completion_per_1k
    }
}
