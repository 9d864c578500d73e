//! Known-abuse request filter.
//!
//! # Responsibilities
//! - Recognise requests matching static spam signatures
//! - Decide before anything is forwarded to the origin
//!
//! # Design Decisions
//! - A signature matches on path prefix AND an exact body field value
//! - Absent or non-string fields never match; unparseable bodies are allowed
//! - Signatures are evaluated in order, first match wins
//! - Bodies are only parsed when some signature's path prefix matches

use axum::http::{header, HeaderMap, Method};
use serde_json::{Map, Value};

/// Condition on a single body field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRule {
    /// The field is a string equal to this value.
    Equals(&'static str),
}

impl FieldRule {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldRule::Equals(expected) => value.as_str() == Some(*expected),
        }
    }
}

/// One known-abuse request shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpamSignature {
    /// Label used in logs and metrics.
    pub name: &'static str,
    /// Restrict to one method; `None` matches any.
    pub method: Option<&'static str>,
    pub path_prefix: &'static str,
    /// Dot-separated path into the parsed body (e.g. "name", "labels.0.slug").
    pub field: &'static str,
    pub rule: FieldRule,
}

impl SpamSignature {
    pub fn applies_to(&self, method: &Method, path: &str) -> bool {
        path.starts_with(self.path_prefix) && self.method.map_or(true, |m| m == method.as_str())
    }

    pub fn matches(&self, method: &Method, path: &str, body: &ParsedBody) -> bool {
        self.applies_to(method, path)
            && body
                .lookup(self.field)
                .is_some_and(|value| self.rule.matches(value))
    }
}

/// Signatures shipped with the proxy.
pub fn default_signatures() -> Vec<SpamSignature> {
    vec![SpamSignature {
        name: "magic-link-bot-name",
        method: None,
        path_prefix: "/members/api/send-magic-link",
        field: "name",
        rule: FieldRule::Equals("adwdasddwa"),
    }]
}

/// Request body decoded for inspection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBody(Option<Value>);

impl ParsedBody {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn json(value: Value) -> Self {
        Self(Some(value))
    }

    /// Decode a JSON or urlencoded form body according to its content type.
    pub fn parse(content_type: Option<&str>, bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if mime == "application/json" || mime.ends_with("+json") {
            Self(serde_json::from_slice(bytes).ok())
        } else if mime == "application/x-www-form-urlencoded" {
            let mut fields = Map::new();
            for (key, value) in url::form_urlencoded::parse(bytes) {
                fields
                    .entry(key.into_owned())
                    .or_insert_with(|| Value::String(value.into_owned()));
            }
            Self(Some(Value::Object(fields)))
        } else {
            Self::empty()
        }
    }

    /// Follow a dot-separated path through objects and arrays.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let root = self.0.as_ref()?;
        path.split('.').try_fold(root, |value, key| match value {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

/// Filter decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Rejected by the named signature.
    Block(&'static str),
}

/// Pre-proxy spam filter.
#[derive(Debug, Clone)]
pub struct SpamFilter {
    enabled: bool,
    signatures: Vec<SpamSignature>,
}

impl SpamFilter {
    pub fn new(enabled: bool) -> Self {
        Self::with_signatures(enabled, default_signatures())
    }

    pub fn with_signatures(enabled: bool, signatures: Vec<SpamSignature>) -> Self {
        Self { enabled, signatures }
    }

    /// Pure decision over an already parsed body.
    pub fn evaluate(&self, method: &Method, path: &str, body: &ParsedBody) -> Verdict {
        if !self.enabled {
            return Verdict::Allow;
        }
        self.signatures
            .iter()
            .find(|signature| signature.matches(method, path, body))
            .map_or(Verdict::Allow, |signature| Verdict::Block(signature.name))
    }

    /// Decide on a raw request, parsing the body only if a signature could apply.
    pub fn inspect(&self, method: &Method, path: &str, headers: &HeaderMap, body: &[u8]) -> Verdict {
        if !self.enabled || !self.signatures.iter().any(|s| s.applies_to(method, path)) {
            return Verdict::Allow;
        }
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        self.evaluate(method, path, &ParsedBody::parse(content_type, body))
    }
}
