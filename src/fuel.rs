use crate::gemini::GeminiClient;
use crate::models::FuelCostBreakdown;

const FUEL_SYSTEM_PROMPT: &str = "You are a pragmatic car running-cost advisor. Given a fuel \
    cost breakdown, explain the monthly and yearly impact in plain language and suggest one or \
    two realistic ways to reduce it.";

/// Extra consumption (L/100km) attributable to passenger weight.
pub fn additional_consumption(avg_person_weight: f64, num_people: u32) -> f64 {
    (avg_person_weight * num_people as f64 * 0.5) / 100.0
}

/// Pure fuel cost math for a monthly driving profile.
pub fn calculate_fuel_cost(
    km_per_month: f64,
    avg_consumption: f64,
    fuel_price: f64,
) -> (f64, f64, f64) {
    let liters_used = (km_per_month / 100.0) * avg_consumption;
    let monthly_cost = liters_used * fuel_price;
    let yearly_cost = monthly_cost * 12.0;
    (liters_used, monthly_cost, yearly_cost)
}

/// Fuel and running-cost estimates, optionally narrated by the model.
pub struct FuelCostService {
    client: GeminiClient,
}

impl FuelCostService {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    /// Infallible: the breakdown is pure arithmetic over the inputs.
    pub fn analyze(
        &self,
        km_per_month: f64,
        avg_consumption: f64,
        fuel_price: f64,
        avg_person_weight: Option<f64>,
        num_people: Option<u32>,
    ) -> FuelCostBreakdown {
        let (liters_used, monthly_cost, yearly_cost) =
            calculate_fuel_cost(km_per_month, avg_consumption, fuel_price);

        let additional = match (avg_person_weight, num_people) {
            (Some(weight), Some(people)) if weight > 0.0 && people > 0 => {
                additional_consumption(weight, people)
            }
            _ => 0.0,
        };

        FuelCostBreakdown {
            liters_used,
            monthly_cost,
            yearly_cost,
            additional_consumption: additional,
            final_consumption: avg_consumption + additional,
        }
    }

    /// Fail-open: `None` when the model is unavailable or errors out.
    pub async fn recommendation(&self, breakdown: &FuelCostBreakdown) -> Option<String> {
        if !self.client.has_api_key() {
            return None;
        }

        let data_json = serde_json::to_string_pretty(breakdown).ok()?;
        let prompt = format!("FUEL COST DATA:\n{}\n\nPlease advise:", data_json);

        match self
            .client
            .generate_text(&prompt, Some(FUEL_SYSTEM_PROMPT), 0.7)
            .await
        {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to generate fuel recommendation");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn service() -> FuelCostService {
        let config = Config::for_endpoint("https://example.com", "test");
        FuelCostService::new(GeminiClient::new(&config).unwrap())
    }

    #[test]
    fn fuel_cost_math() {
        let (liters, monthly, yearly) = calculate_fuel_cost(1000.0, 6.0, 1.8);
        assert!((liters - 60.0).abs() < f64::EPSILON);
        assert!((monthly - 108.0).abs() < 1e-9);
        assert!((yearly - 1296.0).abs() < 1e-9);
    }

    #[test]
    fn passenger_weight_raises_consumption() {
        assert!((additional_consumption(75.0, 4) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn analyze_without_passengers_adds_nothing() {
        let breakdown = service().analyze(1000.0, 6.0, 1.8, None, None);
        assert_eq!(breakdown.additional_consumption, 0.0);
        assert!((breakdown.final_consumption - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn analyze_with_passengers() {
        let breakdown = service().analyze(1000.0, 6.0, 1.8, Some(75.0), Some(4));
        assert!((breakdown.additional_consumption - 1.5).abs() < 1e-9);
        assert!((breakdown.final_consumption - 7.5).abs() < 1e-9);
    }
}
