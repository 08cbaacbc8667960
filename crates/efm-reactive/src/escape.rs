//! HTML-escaped snapshots of data graphs handed to templates.

use serde_json::Value;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Deep copy of `data`; every string leaf (and object key) is escaped unless
/// `allow_html` is set.
pub fn snapshot(data: &Value, allow_html: bool) -> Value {
    if allow_html {
        return data.clone();
    }
    match data {
        Value::String(text) => Value::String(escape_html(text)),
        Value::Array(items) => Value::Array(items.iter().map(|item| snapshot(item, false)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (escape_html(key), snapshot(value, false)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_escapes_nested_strings() {
        let data = json!({"title": "<b>A & B</b>", "list": ["\"q\"", 3, null], "ok": true});
        let escaped = snapshot(&data, false);
        assert_eq!(escaped["title"], "&lt;b&gt;A &amp; B&lt;/b&gt;");
        assert_eq!(escaped["list"][0], "&quot;q&quot;");
        assert_eq!(escaped["list"][1], 3);
        assert_eq!(escaped["ok"], true);
    }

    #[test]
    fn test_snapshot_raw_when_html_allowed() {
        let data = json!({"html": "<i>x</i>"});
        assert_eq!(snapshot(&data, true), data);
    }
}
