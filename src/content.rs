//! Post content objects: best-effort decoding of the composer's payload.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::models::{MediaRef, PostBody};
use crate::storage::{ContentStore, StorageError};

const FALLBACK_MIME: &str = "application/octet-stream";

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn non_empty_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn as_millis(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

/// Decodes raw bytes into a post body. Never fails: anything that is not a
/// JSON object is treated as plain text stamped with `now`.
pub fn parse_post_body(raw: &[u8], now: i64) -> PostBody {
    let plain = || PostBody {
        content: Some(String::from_utf8_lossy(raw).into_owned()),
        created_at: now,
        media: None,
    };
    let obj = match serde_json::from_slice::<Value>(raw) {
        Ok(v @ Value::Object(_)) => v,
        _ => return plain(),
    };

    let content = non_empty_str(&obj, "content")
        .or_else(|| non_empty_str(&obj, "text"))
        .map(str::to_string);
    // first present key wins, even when it does not coerce
    let created_at = ["createdAt", "timestamp"]
        .iter()
        .find_map(|k| obj.get(*k))
        .and_then(as_millis)
        .unwrap_or(now);
    let media = non_empty_str(&obj, "mediaArweaveId").map(|id| MediaRef {
        content_id: id.to_string(),
        mime_type: non_empty_str(&obj, "mediaType").unwrap_or_default().to_string(),
        filename: non_empty_str(&obj, "mediaFilename").map(str::to_string),
    });

    PostBody { content, created_at, media }
}

/// Fetches and decodes a post. Only a fetch-level failure is an error.
pub async fn fetch_post_body(store: &dyn ContentStore, id: &str) -> Result<PostBody, StorageError> {
    let raw = store.fetch(id).await?;
    let mut body = parse_post_body(&raw, now_ms());
    if let Some(media) = body.media.as_mut() {
        if media.mime_type.is_empty() {
            media.mime_type = match store.head(&media.content_id).await {
                Ok(meta) => meta.content_type.unwrap_or_else(|| FALLBACK_MIME.to_string()),
                Err(e) => {
                    debug!(post = id, media = %media.content_id, error = %e, "media head failed");
                    FALLBACK_MIME.to_string()
                }
            };
        }
    }
    Ok(body)
}
