//! Token and cost estimation.

/// Rough token estimate: ~4 characters per token, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Estimated USD cost of `tokens` at a per-1k-token price.
pub fn estimate_cost(tokens: u32, cost_per_1k_tokens: f64) -> f64 {
    (tokens as f64 / 1000.0) * cost_per_1k_tokens
}
