use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::config::SanitizationConfig;

static COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?(-->|$)").expect("valid comment regex"));

static ANY_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)</?[a-zA-Z!?][^>]*(>|$)").expect("valid tag regex")
});

static DANGEROUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)<\s*/?\s*(script|iframe|object|embed|applet|meta|link|base|form)\b",
        r"|javascript\s*:",
        r"|vbscript\s*:",
        r"|data\s*:\s*text/html",
        r"|\bon[a-z]+\s*=",
        r"|expression\s*\(",
        r"|url\s*\(",
        r"|@import",
    ))
    .expect("valid dangerous-pattern regex")
});

/// Passes before the fallback kicks in. Ordinary input settles in one or two.
const MAX_PASSES: usize = 8;

/// Every pattern above needs at least one of these.
const PATTERN_CHARS: [char; 6] = ['<', '>', ':', '=', '(', '@'];

/// A string the sanitizer rewrote, reported in security events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedChange {
    pub field: String,
    pub original: String,
    pub sanitized: String,
}

/// Markup stripper for untrusted strings.
///
/// Output is plain text: no tags survive and nothing is entity-encoded,
/// since the result goes back into JSON rather than into HTML.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    elements: Vec<Regex>,
    unclosed: Option<Regex>,
    remove_null_bytes: bool,
    max_depth: usize,
}

impl Sanitizer {
    pub fn new(config: &SanitizationConfig) -> Result<Self, regex::Error> {
        // Closed element with its content.
        let elements = config
            .stripped_elements
            .iter()
            .map(|element| {
                let name = regex::escape(element);
                Regex::new(&format!(r"(?is)<\s*{name}\b[^>]*>.*?<\s*/\s*{name}\s*>"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Unclosed opener swallows the rest of the string.
        let unclosed = if config.stripped_elements.is_empty() {
            None
        } else {
            let names: Vec<String> = config
                .stripped_elements
                .iter()
                .map(|e| regex::escape(e))
                .collect();
            Some(Regex::new(&format!(r"(?is)<\s*(?:{})\b.*$", names.join("|")))?)
        };

        Ok(Self {
            elements,
            unclosed,
            remove_null_bytes: config.remove_null_bytes,
            max_depth: config.max_depth,
        })
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Strip markup until the string stops changing.
    ///
    /// Removing an inner fragment can reassemble an outer tag, so passes
    /// repeat. Input still changing after `MAX_PASSES` is nested on
    /// purpose; it loses every pattern character instead, which leaves
    /// nothing for another pass to match. Work stays linear in the input.
    pub fn sanitize_str(&self, input: &str) -> String {
        let mut current = if self.remove_null_bytes {
            input.replace('\0', "")
        } else {
            input.to_string()
        };
        if !current.contains(PATTERN_CHARS) {
            return current;
        }

        for _ in 0..MAX_PASSES {
            let next = self.single_pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }

        tracing::debug!(len = current.len(), "Markup nesting exceeds pass budget");
        current.retain(|c| !PATTERN_CHARS.contains(&c));
        current
    }

    fn single_pass(&self, input: &str) -> String {
        let mut out = input.to_string();
        for re in &self.elements {
            out = re.replace_all(&out, "").into_owned();
        }
        if let Some(unclosed) = &self.unclosed {
            out = unclosed.replace_all(&out, "").into_owned();
        }
        out = COMMENT.replace_all(&out, "").into_owned();
        out = ANY_TAG.replace_all(&out, "").into_owned();
        DANGEROUS.replace_all(&out, "").into_owned()
    }

    /// Sanitize every string in `value`, recording what changed.
    pub fn sanitize_value(&self, value: Value, changes: &mut Vec<SanitizedChange>) -> Value {
        self.walk(value, "$", 0, changes)
    }

    fn walk(
        &self,
        value: Value,
        field: &str,
        depth: usize,
        changes: &mut Vec<SanitizedChange>,
    ) -> Value {
        match value {
            Value::String(s) => Value::String(self.sanitize_field(field, s, changes)),
            Value::Array(_) | Value::Object(_) if depth >= self.max_depth => {
                tracing::warn!(field, depth, "Payload nesting exceeds limit, value dropped");
                Value::Null
            }
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| self.walk(v, &format!("{}[{}]", field, i), depth + 1, changes))
                    .collect(),
            ),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, v) in map {
                    let child = format!("{}.{}", field, k);
                    let v = self.walk(v, &child, depth + 1, changes);
                    out.insert(k, v);
                }
                Value::Object(out)
            }
            other => other,
        }
    }

    /// Sanitize one named string, recording it when it changed.
    pub fn sanitize_field(
        &self,
        field: &str,
        original: String,
        changes: &mut Vec<SanitizedChange>,
    ) -> String {
        let sanitized = self.sanitize_str(&original);
        if sanitized != original {
            changes.push(SanitizedChange {
                field: field.to_string(),
                original,
                sanitized: sanitized.clone(),
            });
        }
        sanitized
    }
}

/// Sanitizer built from the default configuration.
pub static DEFAULT_SANITIZER: Lazy<Sanitizer> = Lazy::new(|| {
    Sanitizer::new(&SanitizationConfig::default()).expect("default sanitizer patterns compile")
});
