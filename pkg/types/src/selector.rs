//! Label selectors used to pick nodes and services.
//!
//! Supported syntax, comma-joined (all terms must match):
//! `key=value`, `key==value`, `key!=value`, `key`, `!key`,
//! `key in (a,b)`, `key notin (a,b)`. An empty selector matches everything.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty term in selector")]
    EmptyTerm,
    #[error("invalid label key '{0}'")]
    InvalidKey(String),
    #[error("invalid label value '{0}'")]
    InvalidValue(String),
    #[error("malformed set expression '{0}'")]
    MalformedSet(String),
    #[error("unbalanced parentheses in selector")]
    Unbalanced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        match self {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            // Like Kubernetes, a missing label satisfies `!=` and `notin`.
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
            Requirement::In(k, vs) => labels.get(k).is_some_and(|v| vs.contains(v)),
            Requirement::NotIn(k, vs) => labels.get(k).is_none_or(|v| !vs.contains(v)),
            Requirement::Exists(k) => labels.contains_key(k),
            Requirement::DoesNotExist(k) => !labels.contains_key(k),
        }
    }

    fn parse(term: &str) -> Result<Self, SelectorError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(SelectorError::EmptyTerm);
        }

        if let Some(key) = term.strip_prefix('!') {
            return Ok(Requirement::DoesNotExist(parse_key(key)?));
        }

        if term.contains('(') {
            return parse_set(term);
        }

        if let Some((k, v)) = term.split_once("!=") {
            return Ok(Requirement::NotEquals(parse_key(k)?, parse_value(v)?));
        }
        if let Some((k, v)) = term.split_once("==") {
            return Ok(Requirement::Equals(parse_key(k)?, parse_value(v)?));
        }
        if let Some((k, v)) = term.split_once('=') {
            return Ok(Requirement::Equals(parse_key(k)?, parse_value(v)?));
        }

        Ok(Requirement::Exists(parse_key(term)?))
    }
}

fn parse_set(term: &str) -> Result<Requirement, SelectorError> {
    let malformed = || SelectorError::MalformedSet(term.to_string());

    let (head, rest) = term.split_once('(').ok_or_else(malformed)?;
    let body = rest.strip_suffix(')').ok_or_else(malformed)?;
    let mut words = head.split_whitespace();
    let (Some(key), Some(op), None) = (words.next(), words.next(), words.next()) else {
        return Err(malformed());
    };

    let values = body
        .split(',')
        .map(parse_value)
        .collect::<Result<Vec<_>, _>>()?;
    if values.iter().all(|v| v.is_empty()) {
        return Err(malformed());
    }

    let key = parse_key(key)?;
    match op {
        "in" => Ok(Requirement::In(key, values)),
        "notin" => Ok(Requirement::NotIn(key, values)),
        _ => Err(malformed()),
    }
}

fn parse_key(key: &str) -> Result<String, SelectorError> {
    let key = key.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if !valid {
        return Err(SelectorError::InvalidKey(key.to_string()));
    }
    Ok(key.to_string())
}

fn parse_value(value: &str) -> Result<String, SelectorError> {
    let value = value.trim();
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(SelectorError::InvalidValue(value.to_string()));
    }
    Ok(value.to_string())
}

/// Split on commas that are not inside a `( ... )` value list.
fn split_terms(raw: &str) -> Result<Vec<&str>, SelectorError> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1).ok_or(SelectorError::Unbalanced)?,
            ',' if depth == 0 => {
                terms.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SelectorError::Unbalanced);
    }
    terms.push(&raw[start..]);
    Ok(terms)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    raw: String,
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// A selector matching every object.
    pub fn everything() -> Self {
        Self::default()
    }

    /// `key=value`
    pub fn equals(key: &str, value: &str) -> Self {
        Self {
            raw: format!("{}={}", key, value),
            requirements: vec![Requirement::Equals(key.to_string(), value.to_string())],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Ok(Self::everything());
        }
        let requirements = split_terms(raw)?
            .into_iter()
            .map(Requirement::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: raw.to_string(),
            requirements,
        })
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
