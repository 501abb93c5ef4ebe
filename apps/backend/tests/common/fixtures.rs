//! Request body builders for integration tests.

use serde_json::{json, Value};

/// Body for POST /api/items.
pub fn create_item_request(content_type: &str, primary_text: &str) -> Value {
    json!({
        "content_type": content_type,
        "content_id": format!("content-{primary_text}"),
        "primary_text": primary_text,
        "secondary_text": "reading",
        "tags": ["n5"],
    })
}

/// Body for POST /api/sessions.
pub fn start_session_request(planned_items: u32) -> Value {
    json!({ "planned_items": planned_items })
}

/// Body for POST /api/sessions/{id}/results.
pub fn session_result(item_id: &str, correct: bool, response_ms: u32) -> Value {
    json!({
        "item_id": item_id,
        "correct": correct,
        "response_ms": response_ms,
    })
}

/// Wire study list for sync pushes.
pub fn wire_list(id: &str, name: &str, version: i64, updated_at_ms: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "kind": "flashcard",
        "item_ids": [],
        "version": version,
        "created_at_ms": updated_at_ms - 1000,
        "updated_at_ms": updated_at_ms,
        "deleted": false,
    })
}

/// Wire saved item for sync pushes.
pub fn wire_saved_item(id: &str, list_id: &str, version: i64, updated_at_ms: i64) -> Value {
    json!({
        "id": id,
        "content_type": "vocabulary",
        "primary_text": "はなす",
        "secondary_text": "to speak",
        "part_of_speech": "v5s",
        "tags": [],
        "list_ids": [list_id],
        "version": version,
        "created_at_ms": updated_at_ms - 1000,
        "updated_at_ms": updated_at_ms,
        "deleted": false,
    })
}
