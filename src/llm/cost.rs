//! Per-model pricing for LLM usage.
//!
//! Prices are expressed in dollars per 1000 tokens. Lookup is by exact model
//! identifier; models missing from the table cost nothing.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decimal places kept in reported costs.
pub const COST_DECIMALS: i32 = 6;

/// Errors that can occur while loading a price table.
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Negative price for model '{0}'")]
    NegativePrice(String),
}

/// Price of a single model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    /// Dollars per 1000 input tokens.
    pub input_per_1k: f64,
    /// Dollars per 1000 output tokens.
    pub output_per_1k: f64,
}

impl ModelPrice {
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Unrounded cost of one exchange in dollars.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_per_1k
    }
}

/// Model identifier to price mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTable {
    prices: HashMap<String, ModelPrice>,
}

impl PriceTable {
    /// An empty table: every model costs zero.
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Add or replace the price of a model.
    pub fn with_price(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.prices.insert(model.into(), price);
        self
    }

    /// Load a table from YAML (`model: {input_per_1k, output_per_1k}`).
    pub fn from_yaml_file(path: &Path) -> Result<Self, PricingError> {
        let content = std::fs::read_to_string(path)?;
        let table: PriceTable = serde_yaml::from_str(&content)?;
        if let Some((model, _)) = table
            .prices
            .iter()
            .find(|(_, p)| p.input_per_1k < 0.0 || p.output_per_1k < 0.0)
        {
            return Err(PricingError::NegativePrice(model.clone()));
        }
        Ok(table)
    }

    /// The table at `path`, or the built-in one when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, PricingError> {
        match path {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Price of a model, if known.
    pub fn get(&self, model: &str) -> Option<&ModelPrice> {
        self.prices.get(model)
    }

    /// Cost of one exchange; unknown models contribute zero.
    pub fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.get(model)
            .map(|price| price.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::empty()
            .with_price("claude-3-haiku-20240307", ModelPrice::new(0.00025, 0.00125))
            .with_price("claude-3-5-haiku-20241022", ModelPrice::new(0.0008, 0.004))
            .with_price("claude-3-sonnet-20240229", ModelPrice::new(0.003, 0.015))
            .with_price("claude-3-5-sonnet-20240620", ModelPrice::new(0.003, 0.015))
            .with_price("claude-3-5-sonnet-20241022", ModelPrice::new(0.003, 0.015))
            .with_price("claude-3-opus-20240229", ModelPrice::new(0.015, 0.075))
    }
}

/// Round a dollar amount to [`COST_DECIMALS`] places.
pub fn round_cost(cost: f64) -> f64 {
    let factor = 10f64.powi(COST_DECIMALS);
    (cost * factor).round() / factor
}
