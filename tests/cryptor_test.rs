//! Privacy service wire format tests.

use serde_json::json;

use petaline::cryptor::{
    build_decrypt_request, build_detect_request, DecryptResponse, DetectEncryptResponse,
    DETECTION_THRESHOLD, PLACEHOLDER_SCHEMA,
};

#[test]
fn detect_request_wire_shape() {
    let request = build_detect_request("ai_private_demo", "Call me at +1-212-555-0100");
    let wire = serde_json::to_value(&request).expect("serialize");
    assert_eq!(
        wire,
        json!({
            "tenant_id": "ai_private_demo",
            "text": "Call me at +1-212-555-0100",
            "threshold": DETECTION_THRESHOLD,
            "schema": PLACEHOLDER_SCHEMA,
        })
    );
}

#[test]
fn detect_response_parses_live_bundles() {
    let body = json!({
        "text_with_placeholders": "Call me at [PHONE_1]",
        "bundles": [
            {"placeholder": "[PHONE_1]", "ciphertext": "enc-1", "entity_type": "PHONE"}
        ],
        "tenant_id": "ai_private_demo"
    });
    let response: DetectEncryptResponse =
        serde_json::from_value(body).expect("should parse");
    assert_eq!(response.text_with_placeholders, "Call me at [PHONE_1]");
    assert_eq!(response.tenant_id, "ai_private_demo");
    assert_eq!(response.bundles.len(), 1);
    assert_eq!(response.bundles[0].key(), Some("[PHONE_1]"));
}

#[test]
fn detect_response_requires_all_fields() {
    let body = json!({ "text_with_placeholders": "hello" });
    let result: Result<DetectEncryptResponse, _> = serde_json::from_value(body);
    assert!(result.is_err());
}

#[test]
fn decrypt_request_wire_shape_keeps_empty_bundles() {
    let request = build_decrypt_request("ai_private_demo", "Hi [PERSON_1]", &[]);
    let wire = serde_json::to_value(&request).expect("serialize");
    assert_eq!(
        wire,
        json!({
            "tenant_id": "ai_private_demo",
            "text_with_placeholders": "Hi [PERSON_1]",
            "bundles": [],
        })
    );
}

#[test]
fn decrypt_request_carries_stored_bundles() {
    let bundles = vec![
        serde_json::from_value(json!({"id": "bundle-7", "ciphertext": "enc"})).expect("bundle"),
    ];
    let request = build_decrypt_request("ai_private_demo", "Hi [PERSON_1]", &bundles);
    let wire = serde_json::to_value(&request).expect("serialize");
    assert_eq!(wire["bundles"][0]["id"], "bundle-7");
}

#[test]
fn decrypt_response_parses_text() {
    let response: DecryptResponse =
        serde_json::from_value(json!({ "text": "Hi John Smith" })).expect("should parse");
    assert_eq!(response.text, "Hi John Smith");
}

#[test]
fn decrypt_response_requires_text() {
    let result: Result<DecryptResponse, _> = serde_json::from_value(json!({}));
    assert!(result.is_err());
}
