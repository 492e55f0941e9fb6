//! Lenient coercion of client-supplied settings.
//!
//! # Design
//! - Sanitisation never fails: input that cannot be coerced leaves the current
//!   value in place.
//! - Only keys known to the schema are considered; `null` values are skipped.
//! - Applying the sanitizer to its own output yields the same snapshot.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Number, Value};

use crate::schema::{Schema, SettingDefinition, SettingKind, SettingValue};
use crate::snapshot::SettingsSnapshot;

type Pattern = LazyLock<Result<Regex, regex::Error>>;

static SCRIPT_OR_STYLE: Pattern = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
});
static TAG: Pattern = LazyLock::new(|| Regex::new(r"<[^>]*>"));
static OCTET: Pattern = LazyLock::new(|| Regex::new(r"%[a-fA-F0-9]{2}"));
static WHITESPACE: Pattern = LazyLock::new(|| Regex::new(r"\s+"));
static NUMERIC: Pattern =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$"));
static INTEGER: Pattern = LazyLock::new(|| Regex::new(r"^[+-]?\d+$"));

/// Merge `raw` client input into `current` according to `schema`.
///
/// Non-object input returns `current` unchanged.
#[must_use]
pub fn sanitize(raw: &Value, current: &SettingsSnapshot, schema: &Schema) -> SettingsSnapshot {
    let mut next = current.clone();
    let Value::Object(fields) = raw else {
        return next;
    };

    for definition in schema.definitions() {
        let Some(input) = fields.get(definition.key()) else {
            continue;
        };
        if input.is_null() {
            continue;
        }
        if let Some(value) = coerce_with_definition(definition, input, current.get(definition.key()))
        {
            next.insert(definition.key(), value);
        }
    }
    next
}

fn coerce_with_definition(
    definition: &SettingDefinition,
    input: &Value,
    current: Option<&SettingValue>,
) -> Option<SettingValue> {
    let kind = definition.kind();
    match definition.rule() {
        Some(rule) => rule(input).filter(|value| kind.matches(value)),
        None => coerce(kind, input, current),
    }
}

fn coerce(kind: SettingKind, input: &Value, current: Option<&SettingValue>) -> Option<SettingValue> {
    match kind {
        SettingKind::Boolean => Some(SettingValue::Bool(coerce_bool(input))),
        SettingKind::Integer => coerce_int(input).map(SettingValue::Int),
        SettingKind::String => coerce_text(input).map(SettingValue::String),
    }
    .or_else(|| current.cloned())
}

fn coerce_bool(input: &Value) -> bool {
    match input {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number_is_truthy(number),
        Value::String(text) => {
            let trimmed = text.trim();
            !(trimmed.is_empty() || trimmed == "0" || trimmed.eq_ignore_ascii_case("false"))
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn number_is_truthy(number: &Number) -> bool {
    if let Some(int) = number.as_i64() {
        int != 0
    } else if let Some(uint) = number.as_u64() {
        uint != 0
    } else {
        number.as_f64().is_some_and(|float| float != 0.0)
    }
}

fn coerce_int(input: &Value) -> Option<i64> {
    match input {
        Value::Bool(flag) => Some(i64::from(*flag)),
        Value::Number(number) => Some(absolute_number(number)),
        Value::String(text) => absolute_numeric_text(text.trim()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn absolute_number(number: &Number) -> i64 {
    if let Some(int) = number.as_i64() {
        int.saturating_abs()
    } else if let Some(uint) = number.as_u64() {
        i64::try_from(uint).unwrap_or(i64::MAX)
    } else {
        number.as_f64().map_or(0, absolute_float)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn absolute_float(value: f64) -> i64 {
    // `as` saturates at the i64 bounds and maps NaN to zero.
    (value.trunc() as i64).saturating_abs()
}

fn absolute_numeric_text(text: &str) -> Option<i64> {
    if !is_match(&NUMERIC, text) {
        return None;
    }
    if is_match(&INTEGER, text)
        && let Ok(int) = text.parse::<i64>()
    {
        return Some(int.saturating_abs());
    }
    text.parse::<f64>().ok().map(absolute_float)
}

fn coerce_text(input: &Value) -> Option<String> {
    match input {
        Value::String(text) => Some(sanitize_text_field(text)),
        Value::Number(number) => Some(sanitize_text_field(&number.to_string())),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some(String::new()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Reduce arbitrary text to a single trimmed line of plain text.
///
/// Script and style blocks are removed with their content, stray `<` is
/// escaped, remaining tags and `%XX` octets are stripped, control characters
/// become spaces and whitespace runs collapse to one space.
#[must_use]
pub fn sanitize_text_field(input: &str) -> String {
    let escaped = escape_unterminated_tags(input);
    let without_blocks = replace_all(&SCRIPT_OR_STYLE, &escaped, "");
    let mut text = replace_all(&TAG, &without_blocks, "");

    loop {
        let stripped = replace_all(&OCTET, &text, "");
        if stripped == text {
            break;
        }
        text = stripped;
    }

    let printable: String = text
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect();
    replace_all(&WHITESPACE, &printable, " ").trim().to_string()
}

fn escape_unterminated_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        match tail.find(['<', '>']) {
            Some(end) if tail.as_bytes()[end] == b'>' => {
                out.push_str(&rest[start..=start + 1 + end]);
                rest = &tail[end + 1..];
            }
            Some(end) => {
                out.push_str("&lt;");
                out.push_str(&tail[..end]);
                rest = &tail[end..];
            }
            None => {
                out.push_str("&lt;");
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn replace_all(pattern: &Pattern, input: &str, replacement: &str) -> String {
    match pattern.as_ref() {
        Ok(regex) => regex.replace_all(input, replacement).into_owned(),
        Err(_) => input.to_string(),
    }
}

fn is_match(pattern: &Pattern, input: &str) -> bool {
    pattern.as_ref().is_ok_and(|regex| regex.is_match(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::builtin_schema;
    use crate::schema::SchemaRegistry;
    use serde_json::json;

    fn schema_with(definitions: Vec<SettingDefinition>) -> Schema {
        let mut registry = SchemaRegistry::new();
        registry.register(definitions).expect("register");
        registry.freeze().expect("freeze")
    }

    #[test]
    fn boolean_coercion_table() {
        for (input, expected) in [
            (json!(true), true),
            (json!(false), false),
            (json!(0), false),
            (json!(2), true),
            (json!(0.0), false),
            (json!("yes"), true),
            (json!("no"), true),
            (json!(""), false),
            (json!(" 0 "), false),
            (json!("FALSE"), false),
            (json!([]), false),
            (json!([1]), true),
            (json!({}), false),
            (json!({"a": 1}), true),
        ] {
            assert_eq!(coerce_bool(&input), expected, "input {input}");
        }
    }

    #[test]
    fn integer_coercion_is_absolute_and_saturating() {
        assert_eq!(coerce_int(&json!(-5)), Some(5));
        assert_eq!(coerce_int(&json!("-5")), Some(5));
        assert_eq!(coerce_int(&json!(" 42 ")), Some(42));
        assert_eq!(coerce_int(&json!("3.9")), Some(3));
        assert_eq!(coerce_int(&json!(-2.7)), Some(2));
        assert_eq!(coerce_int(&json!(true)), Some(1));
        assert_eq!(coerce_int(&json!(i64::MIN)), Some(i64::MAX));
        assert_eq!(coerce_int(&json!(u64::MAX)), Some(i64::MAX));
        assert_eq!(coerce_int(&json!("99999999999999999999")), Some(i64::MAX));
        assert_eq!(coerce_int(&json!("12abc")), None);
        assert_eq!(coerce_int(&json!("abc")), None);
        assert_eq!(coerce_int(&json!("")), None);
        assert_eq!(coerce_int(&json!([1])), None);
    }

    #[test]
    fn text_field_strips_markup() {
        assert_eq!(sanitize_text_field("  <b>Bold</b>   text "), "Bold text");
        assert_eq!(
            sanitize_text_field("a<script>alert(1)</script>b"),
            "ab"
        );
        assert_eq!(sanitize_text_field("x <style>p{}</style> y"), "x y");
        assert_eq!(sanitize_text_field("1 < 2"), "1 &lt; 2");
        assert_eq!(sanitize_text_field("<a <b>c"), "&lt;a c");
        assert_eq!(sanitize_text_field("Hi <script>"), "Hi");
        assert_eq!(sanitize_text_field("100%25 done"), "100 done");
        assert_eq!(sanitize_text_field("a%%4141b"), "ab");
        assert_eq!(sanitize_text_field("line\none\ttab\u{0007}"), "line one tab");
    }

    #[test]
    fn text_field_is_idempotent() {
        for input in [
            "<p>Hello</p> <i>world",
            "a %2541 b",
            "  spaced\r\n\r\nout ",
            "<<<>>>",
            "plain",
        ] {
            let once = sanitize_text_field(input);
            assert_eq!(sanitize_text_field(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn string_kind_stringifies_scalars() {
        assert_eq!(coerce_text(&json!(12)), Some("12".to_string()));
        assert_eq!(coerce_text(&json!(true)), Some("1".to_string()));
        assert_eq!(coerce_text(&json!(false)), Some(String::new()));
        assert_eq!(coerce_text(&json!(["a"])), None);
    }

    #[test]
    fn unknown_and_null_keys_are_ignored() {
        let schema = builtin_schema().expect("schema");
        let current = schema.defaults();
        let next = sanitize(
            &json!({"bogus": 1, "global_enableFeature": null}),
            &current,
            &schema,
        );
        assert_eq!(next, current);
    }

    #[test]
    fn non_object_input_keeps_current() {
        let schema = builtin_schema().expect("schema");
        let current = schema.defaults();
        assert_eq!(sanitize(&json!([1, 2]), &current, &schema), current);
        assert_eq!(sanitize(&json!("x"), &current, &schema), current);
    }

    #[test]
    fn uncoercible_values_keep_prior() {
        let schema = schema_with(vec![
            SettingDefinition::integer("limit", 10),
            SettingDefinition::string("title", "t"),
        ]);
        let current = schema.defaults();
        let next = sanitize(&json!({"limit": "lots", "title": {"x": 1}}), &current, &schema);
        assert_eq!(next, current);
    }

    #[test]
    fn custom_rules_replace_kind_coercion() {
        let schema = schema_with(vec![
            SettingDefinition::string("mode", "light").with_rule(|value| {
                value
                    .as_str()
                    .filter(|mode| matches!(*mode, "light" | "dark"))
                    .map(SettingValue::from)
            }),
            SettingDefinition::integer("level", 1).with_rule(|_| Some(SettingValue::from("no"))),
        ]);
        let current = schema.defaults();

        let next = sanitize(&json!({"mode": "dark", "level": 5}), &current, &schema);
        assert_eq!(next.get("mode"), Some(&SettingValue::from("dark")));
        assert_eq!(next.get("level"), Some(&SettingValue::Int(1)));

        let rejected = sanitize(&json!({"mode": "neon"}), &next, &schema);
        assert_eq!(rejected.get("mode"), Some(&SettingValue::from("dark")));
    }

    #[test]
    fn current_is_not_mutated() {
        let schema = builtin_schema().expect("schema");
        let current = schema.defaults();
        let before = current.clone();
        let _ = sanitize(&json!({"debug_enableMode": true}), &current, &schema);
        assert_eq!(current, before);
    }
}
