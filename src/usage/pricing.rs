//! Per-model rate table for derived cost accounting.

use once_cell::sync::Lazy;

/// USD per 1K tokens for one model family.
#[derive(Debug, Clone)]
pub struct ModelRate {
    pub model: &'static str,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
}

impl ModelRate {
    pub const fn new(model: &'static str, input: f64, output: f64) -> Self {
        Self {
            model,
            input_cost_per_1k: input,
            output_cost_per_1k: output,
        }
    }

    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1000.0) * self.input_cost_per_1k
            + (completion_tokens as f64 / 1000.0) * self.output_cost_per_1k
    }
}

/// Applied when a model has no table entry. Unknown models never fail cost
/// derivation; they are just priced conservatively.
pub const DEFAULT_RATE: ModelRate = ModelRate::new("default", 0.002, 0.006);

static RATE_TABLE: Lazy<Vec<ModelRate>> = Lazy::new(|| {
    vec![
        ModelRate::new("gpt-4o-mini", 0.00015, 0.0006),
        ModelRate::new("gpt-4o", 0.005, 0.015),
        ModelRate::new("o3-mini", 0.0011, 0.0044),
        ModelRate::new("claude-3-5-sonnet", 0.003, 0.015),
        ModelRate::new("claude-3-haiku", 0.00025, 0.00125),
    ]
});

/// Longest-substring match against the table, falling back to
/// [`DEFAULT_RATE`]. Substring matching keeps dated variants like
/// `gpt-4o-2024-08-06` on the right rate.
pub fn rate_for(model: &str) -> &'static ModelRate {
    let needle = model.to_lowercase();
    RATE_TABLE
        .iter()
        .filter(|r| needle.contains(r.model))
        .max_by_key(|r| r.model.len())
        .unwrap_or(&DEFAULT_RATE)
}

/// Derived cost for a completed call.
pub fn cost_for(model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
    rate_for(model).cost(prompt_tokens, completion_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models_match_their_rate() {
        assert_eq!(rate_for("gpt-4o").model, "gpt-4o");
        assert_eq!(rate_for("claude-3-haiku").model, "claude-3-haiku");
    }

    #[test]
    fn dated_variants_match_by_substring() {
        assert_eq!(rate_for("gpt-4o-2024-08-06").model, "gpt-4o");
        // The longer family name wins over its prefix.
        assert_eq!(rate_for("gpt-4o-mini-2024-07-18").model, "gpt-4o-mini");
    }

    #[test]
    fn unknown_models_fall_back_to_default() {
        assert_eq!(rate_for("experimental-llm-v9").model, "default");
        let cost = cost_for("experimental-llm-v9", 1000, 1000);
        assert!((cost - 0.008).abs() < 1e-9);
    }

    #[test]
    fn cost_scales_with_tokens() {
        let rate = ModelRate::new("m", 0.001, 0.002);
        assert!((rate.cost(2000, 500) - 0.003).abs() < 1e-9);
        assert_eq!(rate.cost(0, 0), 0.0);
    }
}
