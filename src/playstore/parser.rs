use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::playstore::source::{AppDetails, ReviewPage, StoreReview};

const XSSI_PREFIX: &str = ")]}'";

const INIT_DATA_PATTERN: &str =
    r"(?s)AF_initDataCallback\(\{key:\s*'(ds:\d+)'.*?data:(.*?), sideChannel: \{\}\}\);";

// The listing block on the details page.
const DETAILS_KEY: &str = "ds:5";

/// Build the `f.req` form value for the reviews RPC.
pub fn build_reviews_request(app_id: &str, sort: u8, count: u32, token: Option<&str>) -> String {
    let inner = serde_json::json!([
        null,
        null,
        [2, sort, [count, null, token], null, []],
        [app_id, 7]
    ]);
    serde_json::json!([[["UsvDTd", inner.to_string(), null, "generic"]]]).to_string()
}

pub fn parse_reviews_response(body: &str) -> Result<ReviewPage> {
    let envelope = strip_prefix(body)?;
    let outer: Value = serde_json::from_str(envelope)
        .map_err(|e| Error::ParseError(format!("Invalid batchexecute envelope: {}", e)))?;

    // The RPC payload is itself a JSON document encoded as a string.
    let payload = match walk(&outer, &[0, 2]) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => return Ok(ReviewPage::default()),
        Some(other) => {
            return Err(Error::ParseError(format!(
                "Unexpected reviews payload type: {}",
                other
            )))
        }
    };

    let inner: Value = serde_json::from_str(payload)
        .map_err(|e| Error::ParseError(format!("Invalid reviews payload: {}", e)))?;

    let reviews = match inner.get(0) {
        Some(Value::Array(items)) => items.iter().filter_map(parse_review).collect(),
        _ => Vec::new(),
    };

    Ok(ReviewPage {
        reviews,
        next_token: continuation_token(&inner),
    })
}

/// Extract listing details from the HTML of an app's store page.
///
/// The page embeds its data as `AF_initDataCallback` blocks; the listing
/// lives under `ds:5`.
pub fn parse_app_details(body: &str) -> Result<AppDetails> {
    let pattern = Regex::new(INIT_DATA_PATTERN)
        .map_err(|e| Error::ParseError(format!("Invalid details pattern: {}", e)))?;

    let data = pattern
        .captures_iter(body)
        .find(|caps| &caps[1] == DETAILS_KEY)
        .map(|caps| caps[2].to_string())
        .ok_or_else(|| Error::ParseError("No listing data in details page".to_string()))?;

    let listing: Value = serde_json::from_str(&data)
        .map_err(|e| Error::ParseError(format!("Invalid listing data: {}", e)))?;

    let title = string_at(&listing, &[1, 2, 0, 0])
        .ok_or_else(|| Error::ParseError("Listing has no title".to_string()))?;

    Ok(AppDetails {
        title,
        score: walk(&listing, &[1, 2, 51, 0, 1]).and_then(|v| v.as_f64()),
        ratings: walk(&listing, &[1, 2, 51, 2, 1]).and_then(|v| v.as_u64()).unwrap_or(0),
        reviews: walk(&listing, &[1, 2, 51, 3, 1]).and_then(|v| v.as_u64()).unwrap_or(0),
        installs: string_at(&listing, &[1, 2, 13, 0]),
    })
}

fn strip_prefix(body: &str) -> Result<&str> {
    let trimmed = body.trim_start();
    let rest = trimmed.strip_prefix(XSSI_PREFIX).unwrap_or(trimmed).trim();
    if rest.is_empty() {
        return Err(Error::ParseError("Empty response body".to_string()));
    }
    Ok(rest)
}

// The token is the trailing string of the first metadata array after the reviews.
fn continuation_token(inner: &Value) -> Option<String> {
    inner
        .as_array()?
        .iter()
        .skip(1)
        .filter_map(|v| v.as_array())
        .find_map(|meta| meta.last().and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

fn parse_review(item: &Value) -> Option<StoreReview> {
    let review_id = walk(item, &[0])?.as_str()?.to_string();
    let score = walk(item, &[2]).and_then(|v| v.as_u64()).unwrap_or(0);

    let at = walk(item, &[5, 0])
        .and_then(|v| v.as_i64())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

    Some(StoreReview {
        review_id,
        user_name: string_at(item, &[1, 0]),
        content: string_at(item, &[4]),
        score: score.min(u8::MAX as u64) as u8,
        thumbs_up: walk(item, &[6]).and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        app_version: string_at(item, &[10]),
        reply_content: string_at(item, &[7, 1]),
        at,
    })
}

fn string_at(value: &Value, path: &[usize]) -> Option<String> {
    walk(value, path).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn walk<'a>(value: &'a Value, path: &[usize]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, index| current.get(*index))
}
