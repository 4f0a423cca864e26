//! Gemini wire format tests.

use serde_json::json;

use petaline::model::gemini::{build_request, parse_response, GenerateContentResponse};
use petaline::model::ModelError;

#[test]
fn request_wraps_prompt_in_single_user_turn() {
    let request = build_request("Classify this request");
    let wire = serde_json::to_value(&request).expect("serialize");
    assert_eq!(
        wire,
        json!({
            "contents": [
                { "parts": [ { "text": "Classify this request" } ] }
            ]
        })
    );
}

#[test]
fn response_text_comes_from_first_candidate() {
    let body = json!({
        "candidates": [
            {
                "content": {
                    "parts": [ { "text": "{\"action\": \"get_all_orders\"}" } ],
                    "role": "model"
                },
                "finishReason": "STOP"
            },
            {
                "content": { "parts": [ { "text": "ignored" } ] }
            }
        ],
        "usageMetadata": { "totalTokenCount": 42 }
    });
    let response: GenerateContentResponse =
        serde_json::from_value(body).expect("should parse");
    let text = parse_response(response).expect("should yield text");
    assert_eq!(text, "{\"action\": \"get_all_orders\"}");
}

#[test]
fn multi_part_candidate_is_concatenated() {
    let body = json!({
        "candidates": [
            {
                "content": {
                    "parts": [ { "text": "Hello " }, { "text": "[PERSON_1]" } ]
                }
            }
        ]
    });
    let response: GenerateContentResponse =
        serde_json::from_value(body).expect("should parse");
    let text = parse_response(response).expect("should yield text");
    assert_eq!(text, "Hello [PERSON_1]");
}

#[test]
fn empty_candidates_is_an_error() {
    let response: GenerateContentResponse =
        serde_json::from_value(json!({ "candidates": [] })).expect("should parse");
    match parse_response(response) {
        Err(ModelError::EmptyCompletion) => {}
        other => panic!("expected EmptyCompletion, got {other:?}"),
    }
}

#[test]
fn candidate_without_content_is_an_error() {
    let body = json!({
        "candidates": [ { "finishReason": "SAFETY" } ]
    });
    let response: GenerateContentResponse =
        serde_json::from_value(body).expect("should parse");
    match parse_response(response) {
        Err(ModelError::EmptyCompletion) => {}
        other => panic!("expected EmptyCompletion, got {other:?}"),
    }
}
