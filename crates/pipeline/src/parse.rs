//! Generator output → typed candidates.
//!
//! The generator is unreliable: anything that does not parse into exactly the
//! expected number of well-formed items is a [`GenerationError`], which the
//! orchestrator treats as a failed attempt.

use serde_json::{Map, Value};
use wayfarer_core::error::GenerationError;
use wayfarer_core::{Bucket, Candidate, DEFAULT_CTA};

/// Which shape of batch to expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Titles,
    /// Items must also carry a non-empty `region`
    Regions,
}

/// Strip a surrounding Markdown code fence, if any.
pub fn extract_json(text: &str) -> &str {
    let s = text.trim();
    if !s.starts_with("```") {
        return s;
    }
    let body = match s.find('\n') {
        Some(pos) => &s[pos + 1..],
        None => return "",
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn decode(raw: &str) -> Result<Value, GenerationError> {
    match serde_json::from_str(raw.trim()) {
        Ok(value) => Ok(value),
        Err(first) => serde_json::from_str(extract_json(raw))
            .map_err(|_| GenerationError::InvalidJson(first.to_string())),
    }
}

fn text_field(item: &Map<String, Value>, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(
    item: &Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<String, GenerationError> {
    text_field(item, field).ok_or(GenerationError::MissingField { index, field })
}

fn parse_item(index: usize, value: &Value, mode: ParseMode) -> Result<Candidate, GenerationError> {
    let item = value
        .as_object()
        .ok_or_else(|| GenerationError::SchemaMismatch(format!("item {index} is not an object")))?;

    let raw_bucket = required(item, index, "bucket")?;
    let bucket = Bucket::parse(&raw_bucket).ok_or(GenerationError::UnknownBucket {
        index,
        value: raw_bucket,
    })?;

    let mut candidate = Candidate::new(
        bucket,
        required(item, index, "title")?,
        required(item, index, "angle")?,
        required(item, index, "target_audience")?,
    );
    candidate.cta = text_field(item, "cta").unwrap_or_else(|| DEFAULT_CTA.to_string());

    if mode == ParseMode::Regions {
        let region = required(item, index, "region")?;
        let hint = text_field(item, "location_hint").unwrap_or_default();
        candidate = candidate.with_region(region, hint);
    }
    Ok(candidate)
}

/// Parse `{"items":[...]}` into exactly `expected` candidates.
pub fn parse_batch(
    raw: &str,
    expected: usize,
    mode: ParseMode,
) -> Result<Vec<Candidate>, GenerationError> {
    let root = decode(raw)?;
    let root = root
        .as_object()
        .ok_or_else(|| GenerationError::SchemaMismatch("root is not an object".into()))?;
    let items = root
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| GenerationError::SchemaMismatch("missing 'items' array".into()))?;

    if items.len() != expected {
        return Err(GenerationError::WrongCardinality {
            expected,
            actual: items.len(),
        });
    }

    items
        .iter()
        .enumerate()
        .map(|(index, value)| parse_item(index, value, mode))
        .collect()
}
