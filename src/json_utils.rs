use serde_json::Value;

/// String field, if present and a string.
pub fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(|x| x.as_str())
}

/// String field that looks like an absolute http(s) URL.
pub fn http_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    str_field(v, key).filter(|s| s.starts_with("http"))
}

/// Integer field; the API emits some counters and timestamps as floats
/// (`created_utc: 1700000000.0`), which are truncated.
pub fn i64_field(v: &Value, key: &str) -> i64 {
    match v.get(key) {
        Some(x) => x
            .as_i64()
            .or_else(|| x.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        None => 0,
    }
}

/// Record id: prefer the fullname (`t1_abc`), fall back to the short id.
pub fn record_id(v: &Value) -> Option<String> {
    str_field(v, "name")
        .filter(|s| !s.is_empty())
        .or_else(|| str_field(v, "id").filter(|s| !s.is_empty()))
        .map(str::to_string)
}
