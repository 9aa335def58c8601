use crate::gemini::GeminiClient;
use crate::models::{Listing, OfferAssessment};
use serde_json::{json, Value};

/// Maximum comparison listings embedded in the evaluation prompt.
pub const COMPARISON_CAP: usize = 8;

/// Evaluates a single pasted offer: price fairness, discount suggestion,
/// scam risk and a negotiation message in Portuguese.
///
/// The call goes through the free-text path, so the response may wrap the
/// JSON object in prose; extraction scans from the first `{` to the last `}`.
/// Any failure along the way yields [`OfferAssessment::fallback`] — the
/// operation is total and never raises past its boundary.
pub struct OfferAnalysisService {
    client: GeminiClient,
}

impl OfferAnalysisService {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    pub async fn analyze(
        &self,
        description: &str,
        price: f64,
        mileage: i64,
        year: i32,
        comparison_listings: &[Listing],
    ) -> OfferAssessment {
        let market_sample: Vec<Value> = comparison_listings
            .iter()
            .take(COMPARISON_CAP)
            .map(|car| {
                json!({"title": car.title, "price": car.price, "year": car.year, "km": car.km})
            })
            .collect();
        let market_json = serde_json::to_string_pretty(&market_sample)
            .unwrap_or_else(|_| "[]".to_string());

        let prompt = format!(
            "You are a professional used-car market analyst.\n\
             \n\
             Your task: Evaluate the offer and return a JSON object with:\n\
             - price_position (string)\n\
             - suggested_discount_eur (integer)\n\
             - justification (string)\n\
             - scam_risk_score (0-100)\n\
             - scam_reasons (array of strings)\n\
             - buyer_message (text in Portuguese)\n\
             \n\
             CAR OFFER:\n\
             Description: {description}\n\
             Price: {price} €\n\
             Mileage: {mileage} km\n\
             Year: {year}\n\
             \n\
             RECENT MARKET RESULTS (from user search):\n\
             {market_json}\n\
             \n\
             Now output JSON ONLY in this format:\n\
             \n\
             {{\n\
               \"price_position\": \"...\",\n\
               \"suggested_discount_eur\": 0,\n\
               \"justification\": \"...\",\n\
               \"scam_risk_score\": 0,\n\
               \"scam_reasons\": [\"...\"],\n\
               \"buyer_message\": \"...\"\n\
             }}"
        );

        let response = match self.client.generate_text(&prompt, None, 0.7).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Offer analysis call failed");
                return OfferAssessment::fallback();
            }
        };

        match parse_assessment(&response) {
            Some(assessment) => assessment,
            None => {
                tracing::warn!("Offer analysis response had no parseable JSON object");
                OfferAssessment::fallback()
            }
        }
    }
}

/// Extracts the substring between the first `{` and the last `}` (inclusive)
/// and parses it as an assessment. Omitted fields take the fallback's value;
/// out-of-range but parseable values pass through unchanged.
pub fn parse_assessment(response: &str) -> Option<OfferAssessment> {
    let json_text = extract_json_object(response)?;
    let data: Value = serde_json::from_str(json_text).ok()?;

    let defaults = OfferAssessment::fallback();
    Some(OfferAssessment {
        price_position: data
            .get("price_position")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(defaults.price_position),
        suggested_discount_eur: data
            .get("suggested_discount_eur")
            .and_then(Value::as_i64)
            .unwrap_or(defaults.suggested_discount_eur),
        justification: data
            .get("justification")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(defaults.justification),
        scam_risk_score: data
            .get("scam_risk_score")
            .and_then(Value::as_i64)
            .unwrap_or(defaults.scam_risk_score),
        scam_reasons: data
            .get("scam_reasons")
            .and_then(Value::as_array)
            .map(|reasons| {
                reasons
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or(defaults.scam_reasons),
        buyer_message: data
            .get("buyer_message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(defaults.buyer_message),
    })
}

/// Locates the first `{` and the last `}` in possibly noisy prose.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
