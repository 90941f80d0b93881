use anyhow::anyhow;

use crate::error::{Error, Result};

/// A `xlator.key=value` directive for one translator of the volume graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XlatorOption {
    key: String,
    value: String,
    // byte offset of the '.' separating translator from setting within `key`
    split: usize,
}

impl XlatorOption {
    /// Splits on the first '=', then the key on its first '.'. Nothing is trimmed.
    pub fn parse(raw: &str) -> Result<Self> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| Error::parse(raw, anyhow!("expected XLATOR.KEY=VALUE, missing '='")))?;
        let split = key
            .find('.')
            .ok_or_else(|| Error::parse(raw, anyhow!("expected XLATOR.KEY=VALUE, missing '.'")))?;
        if split == 0 || split + 1 == key.len() {
            return Err(Error::parse(
                raw,
                anyhow!("expected XLATOR.KEY=VALUE, empty translator or key"),
            ));
        }
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
            split,
        })
    }

    /// Full dotted key, e.g. `performance.read-ahead`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn xlator(&self) -> &str {
        &self.key[..self.split]
    }

    pub fn setting(&self) -> &str {
        &self.key[self.split + 1..]
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::str::FromStr for XlatorOption {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for XlatorOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Translator options in the order they were given on the command line.
///
/// Order is significant: a later directive for the same key overrides an earlier one once
/// applied to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XlatorOptions {
    options: Vec<XlatorOption>,
}

impl XlatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, option: XlatorOption) {
        self.options.push(option);
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, XlatorOption> {
        self.options.iter()
    }
}

impl IntoIterator for XlatorOptions {
    type Item = XlatorOption;
    type IntoIter = std::vec::IntoIter<XlatorOption>;
    fn into_iter(self) -> Self::IntoIter {
        self.options.into_iter()
    }
}

impl FromIterator<XlatorOption> for XlatorOptions {
    fn from_iter<I: IntoIterator<Item = XlatorOption>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_basic() {
        let option = XlatorOption::parse("performance.read-ahead=off").unwrap();
        assert_eq!(option.key(), "performance.read-ahead");
        assert_eq!(option.xlator(), "performance");
        assert_eq!(option.setting(), "read-ahead");
        assert_eq!(option.value(), "off");
        assert_eq!(option.to_string(), "performance.read-ahead=off");
    }

    #[test]
    fn parse_splits_on_first_separator_only() {
        let option = XlatorOption::parse("a.b.c=x=y").unwrap();
        assert_eq!(option.xlator(), "a");
        assert_eq!(option.setting(), "b.c");
        assert_eq!(option.value(), "x=y");
    }

    #[test]
    fn parse_does_not_trim() {
        let option = XlatorOption::parse(" a.b = c").unwrap();
        assert_eq!(option.key(), " a.b ");
        assert_eq!(option.value(), " c");
    }

    #[test]
    fn parse_allows_empty_value() {
        assert_eq!(XlatorOption::parse("a.b=").unwrap().value(), "");
    }

    #[test]
    fn parse_rejects_malformed() {
        for raw in ["ab=c", "a.b", "", "=", ".b=c", "a.=c", "ab=c.d"] {
            let err = XlatorOption::parse(raw).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Parse, "{raw}");
            assert!(err.to_string().starts_with(raw), "{raw}");
        }
    }

    #[test]
    fn append_preserves_order() {
        let mut options = XlatorOptions::new();
        assert!(options.is_empty());
        options.append("x.a=1".parse().unwrap());
        options.append("x.b=2".parse().unwrap());
        options.append("x.a=3".parse().unwrap());
        let pairs: Vec<_> = options
            .iter()
            .map(|o| (o.key().to_string(), o.value().to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("x.a".to_string(), "1".to_string()),
                ("x.b".to_string(), "2".to_string()),
                ("x.a".to_string(), "3".to_string()),
            ]
        );
        assert_eq!(options.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_well_formed_directives(
            xlator in "[a-z*-]{1,12}",
            setting in "[a-z.-]{1,12}",
            value in "[^\n]{0,16}",
        ) {
            let option = XlatorOption::parse(&format!("{xlator}.{setting}={value}")).unwrap();
            prop_assert_eq!(option.key(), format!("{xlator}.{setting}"));
            prop_assert_eq!(option.xlator(), xlator.as_str());
            prop_assert_eq!(option.value(), value.as_str());
        }

        #[test]
        fn prop_no_dot_in_key_fails(key in "[a-z-]{1,12}", value in "[a-z.]{0,12}") {
            let parsed = XlatorOption::parse(&format!("{key}={value}"));
            prop_assert!(parsed.is_err());
        }

        #[test]
        fn prop_no_equals_fails(raw in "[a-z.]{0,24}") {
            let parsed = XlatorOption::parse(&raw);
            prop_assert!(parsed.is_err());
        }
    }
}
