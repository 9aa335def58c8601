use serde::{Deserialize, Serialize};

// ============ Core Pipeline Models ============

/// Structured search filters extracted from a free-text query.
///
/// Every field is optional: absence means "no constraint", never zero or an
/// empty string. Produced once per query and immutable once handed to
/// retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub min_price: Option<i64>,
    #[serde(default)]
    pub max_price: Option<i64>,
    #[serde(default)]
    pub min_year: Option<i64>,
    #[serde(default)]
    pub max_km: Option<i64>,
    #[serde(default)]
    pub fuel: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.brand.is_none()
            && self.model.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.min_year.is_none()
            && self.max_km.is_none()
            && self.fuel.is_none()
            && self.location.is_none()
    }
}

/// A single car listing as handed over by the retrieval collaborator.
///
/// Listings carry no stable identity from the source; within a ranking batch
/// identity is positional index. `ai_description` is populated only by the
/// ranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub price: i64,
    pub year: i32,
    pub km: i64,
    pub fuel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_description: Option<String>,
}

/// Evaluation of a single pasted offer: price fairness, scam risk and a
/// ready-to-send negotiation message. Always fully populated; see
/// [`OfferAssessment::fallback`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferAssessment {
    pub price_position: String,
    pub suggested_discount_eur: i64,
    pub justification: String,
    pub scam_risk_score: i64,
    pub scam_reasons: Vec<String>,
    /// Negotiation message for the seller, in Portuguese.
    pub buyer_message: String,
}

impl OfferAssessment {
    /// Fixed assessment used whenever the model output cannot be parsed.
    /// Total: the caller can always render something.
    pub fn fallback() -> Self {
        Self {
            price_position: "Unable to determine.".to_string(),
            suggested_discount_eur: 0,
            justification: "AI returned invalid format.".to_string(),
            scam_risk_score: 50,
            scam_reasons: vec!["Could not parse AI output.".to_string()],
            buyer_message: "Desculpa — não consegui analisar a oferta.".to_string(),
        }
    }
}

/// Fuel cost estimate for a monthly driving profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelCostBreakdown {
    pub liters_used: f64,
    pub monthly_cost: f64,
    pub yearly_cost: f64,
    /// Extra consumption (L/100km) attributable to passenger weight.
    pub additional_consumption: f64,
    pub final_consumption: f64,
}

// ============ HTTP Request/Response DTOs ============

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRequest {
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Listings fetched by the caller's retrieval step. The scraper itself
    /// lives outside this service.
    #[serde(default)]
    pub listings: Vec<Listing>,
    #[serde(default)]
    pub context_text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub filters: SearchFilters,
    pub results: Vec<Listing>,
    pub summary: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankRequest {
    pub query: String,
    #[serde(default)]
    pub listings: Vec<Listing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankResponse {
    pub results: Vec<Listing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub listings: Vec<Listing>,
    #[serde(default)]
    pub context_text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfferAnalysisRequest {
    pub description: String,
    pub price: f64,
    pub mileage: i64,
    pub year: i32,
    #[serde(default)]
    pub comparison_listings: Vec<Listing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FuelEstimateRequest {
    pub km_per_month: f64,
    pub avg_consumption: f64,
    pub fuel_price: f64,
    #[serde(default)]
    pub avg_person_weight: Option<f64>,
    #[serde(default)]
    pub num_people: Option<u32>,
    /// When true, attach a model-generated recommendation to the response.
    #[serde(default)]
    pub with_recommendation: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FuelEstimateResponse {
    #[serde(flatten)]
    pub breakdown: FuelCostBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_are_all_null() {
        let filters = SearchFilters::default();
        assert!(filters.is_empty());

        let json = serde_json::to_value(&filters).unwrap();
        assert_eq!(json["brand"], serde_json::Value::Null);
        assert_eq!(json["max_price"], serde_json::Value::Null);
    }

    #[test]
    fn filters_deserialize_with_missing_fields() {
        let filters: SearchFilters =
            serde_json::from_str(r#"{"brand": "BMW", "max_price": 30000}"#).unwrap();
        assert_eq!(filters.brand.as_deref(), Some("BMW"));
        assert_eq!(filters.max_price, Some(30000));
        assert_eq!(filters.min_year, None);
    }

    #[test]
    fn fallback_assessment_is_fully_populated() {
        let fb = OfferAssessment::fallback();
        assert_eq!(fb.price_position, "Unable to determine.");
        assert_eq!(fb.suggested_discount_eur, 0);
        assert_eq!(fb.scam_risk_score, 50);
        assert_eq!(fb.scam_reasons.len(), 1);
        assert!(!fb.buyer_message.is_empty());
    }
}
