use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A single label-selector clause. An empty selector value is normalized to
/// [`LabelSelector::Present`] at construction (§3 "empty value = presence-only
/// selector").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelSelector {
    Present(String),
    Equals(String, String),
    Absent(String),
    In(String, Vec<String>),
}

impl LabelSelector {
    /// Construct an equality selector, normalizing an empty value to a
    /// presence-only check.
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            LabelSelector::Present(key.into())
        } else {
            LabelSelector::Equals(key.into(), value)
        }
    }

    /// Parse the CLI/query-string forms named in §4.1: `key`, `key=value`,
    /// `!key`, `key in {a,b,c}`.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        if let Some(key) = raw.strip_prefix('!') {
            return Ok(LabelSelector::Absent(key.trim().to_string()));
        }
        if let Some(rest) = raw.strip_suffix('}') {
            if let Some((key, values)) = rest.split_once(" in {") {
                let values = values
                    .split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                return Ok(LabelSelector::In(key.trim().to_string(), values));
            }
            return Err(DomainError::InvalidLabelSelector(raw.to_string()));
        }
        if let Some((key, value)) = raw.split_once('=') {
            return Ok(LabelSelector::equals(key.trim(), value.trim()));
        }
        if raw.is_empty() {
            return Err(DomainError::InvalidLabelSelector(raw.to_string()));
        }
        Ok(LabelSelector::Present(raw.to_string()))
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            LabelSelector::Present(k) => labels.contains_key(k),
            LabelSelector::Equals(k, v) => labels.get(k).is_some_and(|lv| lv == v),
            LabelSelector::Absent(k) => !labels.contains_key(k),
            LabelSelector::In(k, values) => labels.get(k).is_some_and(|lv| values.contains(lv)),
        }
    }
}

pub fn matches_all(selectors: &[LabelSelector], labels: &BTreeMap<String, String>) -> bool {
    selectors.iter().all(|s| s.matches(labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn parses_presence() {
        assert_eq!(LabelSelector::parse("foo").unwrap(), LabelSelector::Present("foo".into()));
    }

    #[test]
    fn parses_absence() {
        assert_eq!(LabelSelector::parse("!foo").unwrap(), LabelSelector::Absent("foo".into()));
    }

    #[test]
    fn parses_equals() {
        assert_eq!(
            LabelSelector::parse("foo=bar").unwrap(),
            LabelSelector::Equals("foo".into(), "bar".into())
        );
    }

    #[test]
    fn empty_value_normalizes_to_presence() {
        assert_eq!(LabelSelector::equals("foo", ""), LabelSelector::Present("foo".into()));
    }

    #[test]
    fn parses_in_set() {
        assert_eq!(
            LabelSelector::parse("foo in {a, b, c}").unwrap(),
            LabelSelector::In("foo".into(), vec!["a".into(), "b".into(), "c".into()])
        );
    }

    #[test]
    fn matches_all_requires_every_clause() {
        let l = labels(&[("a", "1"), ("b", "2")]);
        let sels = vec![LabelSelector::equals("a", "1"), LabelSelector::Present("b".into())];
        assert!(matches_all(&sels, &l));
        let sels2 = vec![LabelSelector::equals("a", "nope")];
        assert!(!matches_all(&sels2, &l));
    }
}
