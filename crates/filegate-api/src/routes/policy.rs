use axum::{extract::State, Json};
use filegate_core::archive::blocked_extensions;
use filegate_core::extension::POLICY_VERSION;
use filegate_core::text_scan::pattern_labels;
use filegate_core::AppState;
use serde_json::{json, Map, Value};

/// Enumerate the active inspection policy.
pub async fn get_policy(State(state): State<AppState>) -> Json<Value> {
    let gate = &state.gate;

    let mut extensions = Map::new();
    for (ext, rule) in gate.table().iter() {
        extensions.insert(ext.to_string(), json!(rule));
    }

    Json(json!({
        "version": POLICY_VERSION,
        "extensions": extensions,
        "blocked_archive_extensions": blocked_extensions(),
        "suspicious_patterns": pattern_labels().collect::<Vec<_>>(),
        "multi_suffix_allowlist": gate.filenames().multi_suffix_allowlist(),
        "text_scan_limit": gate.text_scanner().limit(),
        "max_archive_entries": gate.archive_inspector().max_entries(),
        "max_upload_size": state.max_upload_size,
    }))
}
