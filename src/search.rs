use crate::errors::AppError;
use crate::gemini::GeminiClient;
use crate::models::{Listing, SearchFilters};
use crate::source::ListingSource;
use serde_json::{json, Value};
use tracing::Instrument;

/// Maximum number of listings sent to the model per ranking or narrative
/// call. Listings beyond the cap are never ranked or annotated here.
pub const RANK_BATCH_CAP: usize = 15;

/// Annotation used when the model ranks a listing but omits its rationale.
pub const DEFAULT_ANNOTATION: &str = "Matches your search criteria.";
/// Annotation for listings the model failed to address.
pub const FALLBACK_ANNOTATION: &str = "Also found matching your criteria.";
/// Sentinel returned when a market summary cannot be produced.
pub const SUMMARY_UNAVAILABLE: &str = "Unable to generate summary.";
/// Sentinel returned when a chat answer cannot be produced.
pub const ANSWER_UNAVAILABLE: &str = "Unable to answer based on the current listings.";

const PARSE_SYSTEM_PROMPT: &str = "You are a helpful assistant that extracts structured search \
    parameters from a user's car search query. Output MUST be valid JSON. Extract fields: brand, \
    model, min_price, max_price, min_year, max_km, fuel, location. Rules: If a field is not \
    specified, use null — never zero or an empty string. Convert shorthand like '80k' to \
    thousands (80000).";

const RANK_SYSTEM_PROMPT: &str = "You are a personalized car shopping assistant. Re-order the \
    list so best matches appear first. Write a short 'ai_description' (1 sentence) \
    recommendation for each car.";

const SUMMARY_SYSTEM_PROMPT: &str = "You are a savvy car market expert. Review the listings and \
    generate a concise summary. Highlight price range, best value option, and red flags. \
    Reference user document context if provided.";

const CHAT_SYSTEM_PROMPT: &str =
    "You are a car analyst. Answer based ONLY on the provided listings.";

/// The query → filters → retrieval → ranking → narrative pipeline.
///
/// Every public operation is fail-open: on any internal error it returns its
/// documented default instead of propagating, so a broken model call degrades
/// the result rather than aborting the user's request.
pub struct CarSearchService {
    client: GeminiClient,
}

impl CarSearchService {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    /// Extracts structured filters from a free-text query.
    ///
    /// Fail-open: any client failure yields all-null filters, and the caller
    /// degrades to an unfiltered search.
    pub async fn parse_query(&self, user_query: &str) -> SearchFilters {
        if !self.client.has_api_key() {
            return SearchFilters::default();
        }

        match self
            .client
            .generate_structured(user_query, PARSE_SYSTEM_PROMPT, &parse_schema())
            .await
            .and_then(|value| {
                serde_json::from_value::<SearchFilters>(value).map_err(|e| {
                    AppError::MalformedResponse(format!("Filter object does not match: {}", e))
                })
            }) {
            Ok(filters) => {
                tracing::info!(?filters, "Parsed search filters");
                filters
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse query, degrading to unfiltered search");
                SearchFilters::default()
            }
        }
    }

    /// Runs the retrieval collaborator. Fail-open to an empty result set.
    pub async fn search_cars(
        &self,
        source: &dyn ListingSource,
        filters: &SearchFilters,
    ) -> Vec<Listing> {
        let span = tracing::info_span!("span", op = "retrieval");
        async {
            match source.search(filters).await {
                Ok(results) => {
                    tracing::info!(count = results.len(), "Retrieval returned listings");
                    results
                }
                Err(e) => {
                    tracing::error!(error = %e, "Retrieval failed");
                    Vec::new()
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Reorders and annotates the first [`RANK_BATCH_CAP`] listings for the
    /// given query, reconciling the model's partial output against the full
    /// capped batch so no listing is silently dropped.
    ///
    /// Fail-open: on any client failure the capped batch is returned
    /// unreordered and unannotated — never empty when the input was not.
    pub async fn rank_and_annotate(&self, user_query: &str, listings: &[Listing]) -> Vec<Listing> {
        let batch = &listings[..listings.len().min(RANK_BATCH_CAP)];
        if batch.is_empty() || !self.client.has_api_key() {
            return batch.to_vec();
        }

        let simplified: Vec<Value> = batch
            .iter()
            .enumerate()
            .map(|(i, c)| {
                json!({"id": i, "title": c.title, "price": c.price, "year": c.year, "km": c.km})
            })
            .collect();
        let prompt = format!(
            "User Query: '{}'\n\nListings to Rank:\n{}",
            user_query,
            Value::Array(simplified)
        );

        match self
            .client
            .generate_structured(&prompt, RANK_SYSTEM_PROMPT, &rank_schema())
            .await
        {
            Ok(processed) => reconcile_ranked(batch, &processed),
            Err(e) => {
                tracing::warn!(error = %e, "Ranking failed, returning listings unranked");
                batch.to_vec()
            }
        }
    }

    /// Generates a market snapshot over the capped listings, optionally
    /// grounded in side-channel document context.
    pub async fn summarize_results(&self, results: &[Listing], context_text: &str) -> String {
        if results.is_empty() || !self.client.has_api_key() {
            return SUMMARY_UNAVAILABLE.to_string();
        }

        let sample = match serde_json::to_string_pretty(&results[..results.len().min(RANK_BATCH_CAP)]) {
            Ok(json) => json,
            Err(_) => return SUMMARY_UNAVAILABLE.to_string(),
        };
        let context_block = if context_text.is_empty() {
            String::new()
        } else {
            format!("\n\nUSER CONTEXT (Insurance/Prefs):\n{}\n", context_text)
        };
        let prompt = format!(
            "{}\n\nMARKET DATA:\n{}\n\nPlease provide a market snapshot:",
            context_block, sample
        );

        match self
            .client
            .generate_text(&prompt, Some(SUMMARY_SYSTEM_PROMPT), 0.7)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => SUMMARY_UNAVAILABLE.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to generate market summary");
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }

    /// Answers a follow-up question about the capped listings. Conversational
    /// memory is the caller's responsibility; the full listings and context
    /// are supplied on every call.
    pub async fn chat_about_results(
        &self,
        question: &str,
        results: &[Listing],
        context_text: &str,
    ) -> String {
        if !self.client.has_api_key() {
            return ANSWER_UNAVAILABLE.to_string();
        }

        let listings_json =
            match serde_json::to_string_pretty(&results[..results.len().min(RANK_BATCH_CAP)]) {
                Ok(json) => json,
                Err(_) => return ANSWER_UNAVAILABLE.to_string(),
            };
        let context_block = if context_text.is_empty() {
            String::new()
        } else {
            format!("\n\nDOCUMENT CONTEXT:\n{}\n", context_text)
        };
        let prompt = format!(
            "{}\n\nCAR LISTINGS (JSON):\n{}\n\nUSER QUESTION: {}",
            context_block, listings_json, question
        );

        match self
            .client
            .generate_text(&prompt, Some(CHAT_SYSTEM_PROMPT), 0.5)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => ANSWER_UNAVAILABLE.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to answer question about listings");
                ANSWER_UNAVAILABLE.to_string()
            }
        }
    }
}

/// Merges the model's reordered, annotated output back against the original
/// capped batch without loss.
///
/// Single deterministic pass: each in-range, not-yet-used `original_id` pulls
/// its listing into the output with the model's annotation; duplicate or
/// out-of-range ids are ignored; listings the model never addressed are
/// appended in original relative order with [`FALLBACK_ANNOTATION`]. The
/// output is always a permutation-with-annotations of the batch.
pub fn reconcile_ranked(batch: &[Listing], processed: &Value) -> Vec<Listing> {
    let ranked = processed
        .get("ranked_cars")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut used = vec![false; batch.len()];
    let mut ordered = Vec::with_capacity(batch.len());

    for item in ranked {
        let Some(idx) = item.get("original_id").and_then(Value::as_i64) else {
            continue;
        };
        if idx < 0 || idx as usize >= batch.len() {
            continue;
        }
        let idx = idx as usize;
        if used[idx] {
            continue;
        }
        used[idx] = true;

        let mut listing = batch[idx].clone();
        listing.ai_description = Some(
            item.get("ai_description")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_ANNOTATION)
                .to_string(),
        );
        ordered.push(listing);
    }

    for (idx, listing) in batch.iter().enumerate() {
        if !used[idx] {
            let mut listing = listing.clone();
            listing.ai_description = Some(FALLBACK_ANNOTATION.to_string());
            ordered.push(listing);
        }
    }

    ordered
}

fn parse_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "brand": {"type": "STRING", "nullable": true},
            "model": {"type": "STRING", "nullable": true},
            "min_price": {"type": "INTEGER", "nullable": true},
            "max_price": {"type": "INTEGER", "nullable": true},
            "min_year": {"type": "INTEGER", "nullable": true},
            "max_km": {"type": "INTEGER", "nullable": true},
            "fuel": {"type": "STRING", "nullable": true},
            "location": {"type": "STRING", "nullable": true}
        }
    })
}

fn rank_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "ranked_cars": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "original_id": {"type": "INTEGER"},
                        "ai_description": {"type": "STRING"}
                    }
                }
            }
        }
    })
}
