/// Integration tests with a mocked Gemini endpoint
/// Exercises the full pipeline without hitting the real model service
use auto_hunter_api::config::{Config, DEFAULT_MODEL};
use auto_hunter_api::errors::AppError;
use auto_hunter_api::gemini::{GeminiClient, MAX_ATTEMPTS};
use auto_hunter_api::models::{Listing, OfferAssessment, SearchFilters};
use auto_hunter_api::offer::OfferAnalysisService;
use auto_hunter_api::search::{CarSearchService, FALLBACK_ANNOTATION, SUMMARY_UNAVAILABLE};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn generate_content_path() -> String {
    format!("/{}:generateContent", DEFAULT_MODEL)
}

/// Gemini response body wrapping the given generated text.
fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [
            {"content": {"parts": [{"text": text}]}}
        ]
    })
}

fn test_client(server: &MockServer) -> GeminiClient {
    let config = Config::for_endpoint(server.uri(), "test_key");
    GeminiClient::new(&config).unwrap()
}

fn keyless_client() -> GeminiClient {
    let config = Config {
        api_key: None,
        model: DEFAULT_MODEL.to_string(),
        gemini_base_url: "http://127.0.0.1:9".to_string(),
        port: 3000,
    };
    GeminiClient::new(&config).unwrap()
}

fn listing(title: &str, price: i64) -> Listing {
    Listing {
        title: title.to_string(),
        price,
        year: 2018,
        km: 80_000,
        fuel: "Diesel".to_string(),
        image_url: None,
        link: None,
        ai_description: None,
    }
}

#[tokio::test]
async fn parse_query_decodes_structured_filters() {
    let mock_server = MockServer::start().await;

    let filters_json = r#"{"brand":"BMW","model":"320d","min_price":20000,"max_price":30000,"min_year":2018,"max_km":80000,"fuel":"Diesel","location":null}"#;
    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .and(query_param("key", "test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(filters_json)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = CarSearchService::new(test_client(&mock_server));
    let filters = service
        .parse_query("Diesel BMW 320d from 2018, max 80k km, 20.000-30.000€")
        .await;

    assert_eq!(filters.brand.as_deref(), Some("BMW"));
    assert_eq!(filters.model.as_deref(), Some("320d"));
    assert_eq!(filters.min_price, Some(20_000));
    assert_eq!(filters.max_price, Some(30_000));
    assert_eq!(filters.min_year, Some(2018));
    assert_eq!(filters.max_km, Some(80_000));
    assert_eq!(filters.location, None);
}

#[tokio::test]
async fn structured_call_stops_after_exactly_five_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(MAX_ATTEMPTS as u64)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let result = client
        .generate_structured("query", "instruction", &json!({"type": "OBJECT"}))
        .await;

    match result {
        Err(AppError::RemoteApi(_)) => {}
        other => panic!("expected RemoteApi after exhausted retries, got {:?}", other),
    }
}

#[tokio::test]
async fn structured_call_recovers_after_transient_failures() {
    let mock_server = MockServer::start().await;

    // First two attempts fail, third succeeds.
    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(r#"{"ok":true}"#)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let result = client
        .generate_structured("query", "instruction", &json!({"type": "OBJECT"}))
        .await
        .unwrap();

    assert_eq!(result, json!({"ok": true}));
}

#[tokio::test]
async fn unnavigable_body_is_terminal_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": "shape"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let result = client
        .generate_structured("query", "instruction", &json!({"type": "OBJECT"}))
        .await;

    match result {
        Err(AppError::MalformedResponse(_)) => {}
        other => panic!("expected MalformedResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn semantically_empty_response_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("{}")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let result = client
        .generate_structured("query", "instruction", &json!({"type": "OBJECT"}))
        .await
        .unwrap();

    assert_eq!(result, json!({}));
}

#[tokio::test]
async fn identical_calls_decode_independently() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(r#"{"brand":"Audi"}"#)))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let first = client
        .generate_structured("query", "instruction", &json!({"type": "OBJECT"}))
        .await
        .unwrap();
    let second = client
        .generate_structured("query", "instruction", &json!({"type": "OBJECT"}))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first, json!({"brand": "Audi"}));
}

#[tokio::test]
async fn parse_query_fails_open_on_malformed_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"no": "candidates"})))
        .mount(&mock_server)
        .await;

    let service = CarSearchService::new(test_client(&mock_server));
    let filters = service.parse_query("any query").await;

    assert_eq!(filters, SearchFilters::default());
}

#[tokio::test]
async fn rank_reconciles_partial_model_output() {
    let mock_server = MockServer::start().await;

    // Model cites only listings 2 and 0 out of three.
    let ranked = r#"{"ranked_cars":[
        {"original_id":2,"ai_description":"Best value for the money"},
        {"original_id":0,"ai_description":"Newest of the lot"}
    ]}"#;
    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(ranked)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let listings = vec![
        listing("Golf", 18_000),
        listing("Passat", 22_000),
        listing("Polo", 12_000),
    ];
    let service = CarSearchService::new(test_client(&mock_server));
    let out = service.rank_and_annotate("cheap VW", &listings).await;

    assert_eq!(out.len(), 3);
    assert_eq!(out[0].title, "Polo");
    assert_eq!(
        out[0].ai_description.as_deref(),
        Some("Best value for the money")
    );
    assert_eq!(out[1].title, "Golf");
    assert_eq!(out[1].ai_description.as_deref(), Some("Newest of the lot"));
    assert_eq!(out[2].title, "Passat");
    assert_eq!(out[2].ai_description.as_deref(), Some(FALLBACK_ANNOTATION));
}

#[tokio::test]
async fn rank_fails_open_to_capped_input() {
    let mock_server = MockServer::start().await;

    // Terminal failure (no retries) keeps the test fast.
    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"no": "candidates"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let listings: Vec<Listing> = (0..20)
        .map(|i| listing(&format!("Car {}", i), 10_000 + i))
        .collect();
    let service = CarSearchService::new(test_client(&mock_server));
    let out = service.rank_and_annotate("anything", &listings).await;

    assert_eq!(out.len(), 15);
    for (i, result) in out.iter().enumerate() {
        assert_eq!(result.title, format!("Car {}", i));
        assert_eq!(result.ai_description, None);
    }
}

#[tokio::test]
async fn summarize_returns_model_prose() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            "Prices cluster around 18k; the Polo is the standout value.",
        )))
        .mount(&mock_server)
        .await;

    let service = CarSearchService::new(test_client(&mock_server));
    let summary = service
        .summarize_results(&[listing("Polo", 12_000)], "")
        .await;

    assert!(summary.contains("standout value"));
}

#[tokio::test]
async fn summarize_returns_sentinel_without_listings() {
    let service = CarSearchService::new(keyless_client());
    let summary = service.summarize_results(&[], "").await;
    assert_eq!(summary, SUMMARY_UNAVAILABLE);
}

#[tokio::test]
async fn chat_answers_from_listings() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            "The Polo represents the best value of the three.",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = CarSearchService::new(test_client(&mock_server));
    let answer = service
        .chat_about_results(
            "Which represents the best value?",
            &[listing("Polo", 12_000)],
            "insurance covers cars newer than 2015",
        )
        .await;

    assert!(answer.contains("Polo"));
}

#[tokio::test]
async fn offer_analysis_parses_json_wrapped_in_prose() {
    let mock_server = MockServer::start().await;

    let reply = concat!(
        "Sure, here you go: ",
        r#"{"price_position":"fair","suggested_discount_eur":500,"justification":"Consistent with market","scam_risk_score":12,"scam_reasons":[],"buyer_message":"Olá, tenho interesse."}"#,
        " hope that helps!"
    );
    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(reply)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = OfferAnalysisService::new(test_client(&mock_server));
    let assessment = service
        .analyze("Honda Civic 1.4i S, 2001", 3_500.0, 107_000, 2001, &[])
        .await;

    assert_eq!(assessment.price_position, "fair");
    assert_eq!(assessment.suggested_discount_eur, 500);
    assert_eq!(assessment.scam_risk_score, 12);
    assert_eq!(assessment.buyer_message, "Olá, tenho interesse.");
}

#[tokio::test]
async fn offer_analysis_falls_back_when_response_has_no_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            "I cannot produce a structured answer for this offer.",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = OfferAnalysisService::new(test_client(&mock_server));
    let assessment = service
        .analyze("suspicious deal", 500.0, 250_000, 1999, &[])
        .await;

    assert_eq!(assessment, OfferAssessment::fallback());
}

#[tokio::test]
async fn keyless_operations_degrade_to_documented_defaults() {
    let search = CarSearchService::new(keyless_client());
    let offer = OfferAnalysisService::new(keyless_client());
    let listings = vec![listing("Polo", 12_000)];

    assert_eq!(search.parse_query("a BMW").await, SearchFilters::default());

    let ranked = search.rank_and_annotate("a BMW", &listings).await;
    assert_eq!(ranked, listings);

    assert_eq!(
        search.summarize_results(&listings, "").await,
        SUMMARY_UNAVAILABLE
    );

    let assessment = offer.analyze("anything", 1_000.0, 100_000, 2010, &[]).await;
    assert_eq!(assessment, OfferAssessment::fallback());
}

#[tokio::test]
async fn concurrent_calls_share_no_state() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(generate_content_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(r#"{"brand":"VW"}"#)))
        .expect(10)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);

    let mut handles = vec![];
    for i in 0..10 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .generate_structured(&format!("query {}", i), "instruction", &json!({"type": "OBJECT"}))
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result, json!({"brand": "VW"}));
    }
}
