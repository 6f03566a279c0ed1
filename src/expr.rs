//! Variable substitution over descriptor expressions and output templates.

use indexmap::IndexMap;
use itertools::Itertools;
use serde_json::Value;

use crate::error::Error;

/// Upper-case a name and replace anything outside `[A-Z0-9]` with `_`.
pub fn identifier(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Render a JSON value the way it appears in generated text.
///
/// Strings appear unquoted, everything else in JSON form.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Interpret substituted text as a JSON list literal, if it is one.
pub fn parse_list(text: &str) -> Option<Vec<String>> {
    if !text.trim_start().starts_with('[') {
        return None;
    }
    serde_json::from_str::<Vec<Value>>(text)
        .ok()
        .map(|items| items.iter().map(render_value).collect())
}

/// Variables visible to one substitution.
#[derive(Clone, Debug, Default)]
pub struct Context {
    vars: IndexMap<String, String>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Add a property and the keys derived from it.
    ///
    /// Strings get `.id` and `.length`. Arrays get `.id`, `.length` and
    /// `.mask`, the latter joining `prefix + ID` terms with `|`.
    pub fn insert_property(&mut self, name: &str, value: &Value, mask: Option<&str>) {
        self.insert(name, render_value(value));
        match value {
            Value::String(text) => {
                self.insert(format!("{name}.id"), identifier(text));
                self.insert(format!("{name}.length"), text.chars().count().to_string());
            }
            Value::Array(items) => {
                let ids: Vec<String> = items
                    .iter()
                    .map(|item| identifier(&render_value(item)))
                    .collect();
                let prefix = mask.unwrap_or("");
                let mask_value = if ids.is_empty() {
                    "0".to_string()
                } else {
                    ids.iter().map(|id| format!("{prefix}{id}")).join(" | ")
                };
                self.insert(format!("{name}.id"), ids.join("_"));
                self.insert(format!("{name}.length"), items.len().to_string());
                self.insert(format!("{name}.mask"), mask_value);
            }
            _ => {}
        }
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Replace `${key}` and `$key` references in `expression`.
///
/// `$$` produces a literal `$`. A `$` not followed by a key is kept as is.
pub fn substitute(expression: &str, context: &Context) -> Result<String, Error> {
    let mut output = String::with_capacity(expression.len());
    let mut rest = expression;
    while let Some(pos) = rest.find('$') {
        output.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (key, remainder) = if let Some(stripped) = after.strip_prefix('$') {
            output.push('$');
            rest = stripped;
            continue;
        } else if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], &braced[end + 1..]),
                None => {
                    output.push('$');
                    rest = after;
                    continue;
                }
            }
        } else {
            let end = after.find(|c| !is_key_char(c)).unwrap_or(after.len());
            // A bare key may not end in '.', so "$tag." keeps its full stop.
            let end = after[..end].trim_end_matches('.').len();
            (&after[..end], &after[end..])
        };
        if key.is_empty() {
            output.push('$');
            rest = after;
            continue;
        }
        match context.get(key) {
            Some(value) => output.push_str(value),
            None => return Err(Error::UndefinedVariable {
                key: key.to_string(),
                expression: expression.to_string(),
            }),
        }
        rest = remainder;
    }
    output.push_str(rest);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Context {
        let mut context = Context::new();
        context.insert("tag", "hid0");
        context.insert("tag.id", "HID0");
        context.insert_property("protocol", &json!("keyboard"), None);
        context.insert_property("reports", &json!(["keyboard", "mouse"]), None);
        context.insert_property("attrs", &json!(["will_detach", "can-download"]), Some("DFU_ATTR_"));
        context.insert_property("none", &json!([]), Some("DFU_ATTR_"));
        context.insert_property("size", &json!(64), None);
        context
    }

    #[test]
    fn test_identifier() {
        assert!(identifier("cdc-0 port") == "CDC_0_PORT");
        assert!(identifier("Config1") == "CONFIG1");
    }

    #[test]
    fn test_substitute() {
        let context = context();
        let check = |expression: &str, expected: &str| {
            let result = substitute(expression, &context).unwrap();
            assert!(result == expected, "{expression:?} gave {result:?}");
        };
        check("sizeof(desc_hid_report_${tag.id})", "sizeof(desc_hid_report_HID0)");
        check("HID_ITF_PROTOCOL_$protocol.id", "HID_ITF_PROTOCOL_KEYBOARD");
        check("${size}", "64");
        check("${reports}", "[\"keyboard\",\"mouse\"]");
        check("${reports.length} reports", "2 reports");
        check("${attrs.mask}", "DFU_ATTR_WILL_DETACH | DFU_ATTR_CAN_DOWNLOAD");
        check("${none.mask}", "0");
        check("$$tag is $tag.", "$tag is hid0.");
        check("no vars", "no vars");
    }

    #[test]
    fn test_undefined_variable() {
        match substitute("EP ${missing}", &context()) {
            Err(Error::UndefinedVariable { key, expression }) => {
                assert!(key == "missing");
                assert!(expression == "EP ${missing}");
            }
            other => panic!("Expected UndefinedVariable but got {:?}", other),
        }
    }

    #[test]
    fn test_parse_list() {
        assert!(parse_list("[\"a\", \"b\"]") == Some(vec!["a".to_string(), "b".to_string()]));
        assert!(parse_list("plain text") == None);
        assert!(parse_list("[]") == Some(vec![]));
    }
}
