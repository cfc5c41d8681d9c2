//! Per-model token pricing.
//!
//! Prices are USD per million tokens. Lookup walks an ordered table and
//! returns the first entry whose pattern occurs in the lower-cased model
//! name, so versioned names (`claude-opus-4-5-20251101`) match their family
//! entry. Entries are ordered most-specific-first; a name that matches
//! nothing is billed at the default tier.

use serde::{Deserialize, Serialize};

use crate::types::TokenUsage;

const TOKENS_PER_UNIT: f64 = 1_000_000.0;

/// Unit prices for one model family, USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_creation: f64,
}

impl ModelPricing {
    pub const fn new(input: f64, output: f64, cache_read: f64, cache_creation: f64) -> Self {
        Self {
            input,
            output,
            cache_read,
            cache_creation,
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        [self.input, self.output, self.cache_read, self.cache_creation]
            .iter()
            .all(|p| p.is_finite() && *p >= 0.0)
    }
}

/// Billed when no table entry matches. Sonnet-class pricing.
pub const DEFAULT_PRICING: ModelPricing = ModelPricing::new(3.0, 15.0, 0.30, 3.75);

/// Built-in table, most specific pattern first.
const BUILTIN_PRICING: &[(&str, ModelPricing)] = &[
    ("opus-4-6", ModelPricing::new(5.0, 25.0, 0.50, 6.25)),
    ("opus-4-5", ModelPricing::new(5.0, 25.0, 0.50, 6.25)),
    ("opus-4-1", ModelPricing::new(15.0, 75.0, 1.50, 18.75)),
    ("opus-4", ModelPricing::new(15.0, 75.0, 1.50, 18.75)),
    ("opus", ModelPricing::new(15.0, 75.0, 1.50, 18.75)),
    ("sonnet-4-5", ModelPricing::new(3.0, 15.0, 0.30, 3.75)),
    ("sonnet", ModelPricing::new(3.0, 15.0, 0.30, 3.75)),
    ("haiku-4-5", ModelPricing::new(1.0, 5.0, 0.10, 1.25)),
    ("haiku-3-5", ModelPricing::new(0.80, 4.0, 0.08, 1.0)),
    ("3-5-haiku", ModelPricing::new(0.80, 4.0, 0.08, 1.0)),
    ("haiku", ModelPricing::new(0.25, 1.25, 0.03, 0.30)),
];

/// Ordered pattern -> pricing table with a default tier.
#[derive(Debug, Clone)]
pub struct PricingTable {
    entries: Vec<(String, ModelPricing)>,
    default: ModelPricing,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PricingTable {
    /// The built-in table.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_PRICING
                .iter()
                .map(|(pattern, pricing)| (pattern.to_string(), *pricing))
                .collect(),
            default: DEFAULT_PRICING,
        }
    }

    /// A table with exactly the given entries, in order.
    pub fn new(entries: Vec<(String, ModelPricing)>, default: ModelPricing) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(pattern, pricing)| (pattern.to_lowercase(), pricing))
                .collect(),
            default,
        }
    }

    /// Insert an entry ahead of every existing one.
    pub fn prepend(&mut self, pattern: &str, pricing: ModelPricing) {
        self.entries.insert(0, (pattern.to_lowercase(), pricing));
    }

    pub fn set_default(&mut self, pricing: ModelPricing) {
        self.default = pricing;
    }

    /// Pattern of the entry that prices `model`, `None` for the default tier.
    pub fn matching_pattern(&self, model: &str) -> Option<&str> {
        let lower = model.to_lowercase();
        self.entries
            .iter()
            .find(|(pattern, _)| lower.contains(pattern.as_str()))
            .map(|(pattern, _)| pattern.as_str())
    }

    /// Resolve pricing for a model name. Unknown or absent names get the
    /// default tier.
    pub fn pricing_for(&self, model: Option<&str>) -> ModelPricing {
        let Some(model) = model else {
            return self.default;
        };
        let lower = model.to_lowercase();
        self.entries
            .iter()
            .find(|(pattern, _)| lower.contains(pattern.as_str()))
            .map(|(_, pricing)| *pricing)
            .unwrap_or(self.default)
    }

    /// Cost in USD, rounded to 4 decimal places.
    pub fn cost(&self, usage: &TokenUsage, model: Option<&str>) -> f64 {
        let p = self.pricing_for(model);
        let raw = usage.input as f64 * p.input
            + usage.output as f64 * p.output
            + usage.cache_read as f64 * p.cache_read
            + usage.cache_creation as f64 * p.cache_creation;
        round_to(raw / TOKENS_PER_UNIT, 4)
    }
}

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
