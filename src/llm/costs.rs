//! Per-token list prices, USD.

use rust_decimal::Decimal;

/// (input, output) cost per token for a model name. Unknown models cost zero.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    let model = model.to_lowercase();
    // Prices per million tokens, scaled to per-token below.
    let (input_per_m, output_per_m) = if model.contains("haiku") {
        (Decimal::new(80, 2), Decimal::new(400, 2))
    } else if model.contains("sonnet") {
        (Decimal::from(3), Decimal::from(15))
    } else if model.contains("opus") {
        (Decimal::from(15), Decimal::from(75))
    } else if model.contains("gpt-4o-mini") {
        (Decimal::new(15, 2), Decimal::new(60, 2))
    } else if model.contains("gpt-4o") {
        (Decimal::new(250, 2), Decimal::from(10))
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };
    let million = Decimal::from(1_000_000);
    (input_per_m / million, output_per_m / million)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models_have_prices() {
        let (input, output) = model_cost("claude-3-5-sonnet-latest");
        assert_eq!(input, Decimal::new(3, 6));
        assert_eq!(output, Decimal::new(15, 6));
        assert!(model_cost("gpt-4o-mini").0 < model_cost("gpt-4o").0);
    }

    #[test]
    fn unknown_models_are_free() {
        assert_eq!(model_cost("local-llama"), (Decimal::ZERO, Decimal::ZERO));
    }
}
