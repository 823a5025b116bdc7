//! The source API's envelope types and validation of one input line.
//!
//! A line is `[postListing, replyListing?]`. Each listing is
//! `{"kind": "Listing", "data": {"children": [{"kind", "data"}, ...]}}`.

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use serde_json::Value;

pub const KIND_LISTING: &str = "Listing";
pub const KIND_POST: &str = "t3";
pub const KIND_COMMENT: &str = "t1";
pub const KIND_MORE: &str = "more";

/// One child record; `data` stays untyped because its schema varies by kind.
#[derive(Clone, Debug, Deserialize)]
pub struct Thing {
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl Thing {
    pub fn is_post(&self) -> bool {
        self.kind == KIND_POST
    }
    pub fn is_comment(&self) -> bool {
        self.kind == KIND_COMMENT
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<Thing>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Listing {
    pub kind: String,
    #[serde(default)]
    pub data: ListingData,
}

impl Listing {
    /// Parse a value as a listing; `None` unless it is an object of kind `Listing`.
    pub fn from_value(v: &Value) -> Option<Listing> {
        if v.get("kind").and_then(|k| k.as_str()) != Some(KIND_LISTING) {
            return None;
        }
        Listing::deserialize(v).ok()
    }

    /// Comment children, skipping "more" placeholders and any other kind.
    pub fn comments(&self) -> impl Iterator<Item = &Thing> {
        self.data.children.iter().filter(|t| t.is_comment())
    }

    pub fn posts(&self) -> impl Iterator<Item = &Thing> {
        self.data.children.iter().filter(|t| t.is_post())
    }
}

/// A validated input line.
#[derive(Clone, Debug)]
pub struct RawRecord {
    pub posts: Listing,
    pub replies: Option<Listing>,
}

/// Validate and split one input line. A missing or `null` second element means
/// "no replies"; any other non-listing second element rejects the record.
pub fn parse_record(line: &str) -> Result<RawRecord> {
    let v: Value = serde_json::from_str(line).map_err(|e| anyhow!("invalid JSON: {e}"))?;
    let items = match v.as_array() {
        Some(a) if !a.is_empty() => a,
        _ => bail!("not a [postListing, replyListing?] array"),
    };
    let posts = Listing::from_value(&items[0]).ok_or_else(|| anyhow!("first element is not a post listing"))?;
    let replies = match items.get(1) {
        None | Some(Value::Null) => None,
        Some(r) => Some(Listing::from_value(r).ok_or_else(|| anyhow!("second element is not a reply listing"))?),
    };
    Ok(RawRecord { posts, replies })
}

/// `kind` of a raw child value, or `""`.
pub fn child_kind(v: &Value) -> &str {
    v.get("kind").and_then(|k| k.as_str()).unwrap_or("")
}

/// Raw children of a comment's nested `replies` listing.
/// The API sends `""` instead of a listing when there are none.
pub fn reply_children(comment_data: &Value) -> &[Value] {
    match comment_data.get("replies") {
        Some(r) if child_kind(r) == KIND_LISTING => r
            .pointer("/data/children")
            .and_then(|c| c.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}
