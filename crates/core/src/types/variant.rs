//! Variant selection type.

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`VariantSelection`] entry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VariantSelectionError {
    /// The input does not contain an `=` separator.
    #[error("variant must be written as axis=value, got '{0}'")]
    MissingSeparator(String),
    /// The axis name (before `=`) is empty.
    #[error("variant axis cannot be empty")]
    EmptyAxis,
    /// The chosen value (after `=`) is empty.
    #[error("variant value cannot be empty")]
    EmptyValue,
}

/// A chosen combination of product options, keyed by axis name.
///
/// For example `{"Color": "Red", "Size": "M"}`. Entries are held in a
/// [`BTreeMap`] so two selections with the same pairs compare equal and
/// serialize identically no matter the order they were chosen in. This is
/// what makes `(product, selection)` usable as a line-item identity.
///
/// ## Examples
///
/// ```
/// use cartwheel_core::VariantSelection;
///
/// let a = VariantSelection::new().with("Size", "M").with("Color", "Red");
/// let b = VariantSelection::new().with("Color", "Red").with("Size", "M");
/// assert_eq!(a, b);
///
/// let parsed = VariantSelection::parse_all(["Color=Red", "Size=M"]).unwrap();
/// assert_eq!(parsed, a);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantSelection(BTreeMap<String, String>);

impl VariantSelection {
    /// An empty selection (the product's default options).
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Return this selection with `axis` set to `value`.
    #[must_use]
    pub fn with(mut self, axis: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(axis.into(), value.into());
        self
    }

    /// Set `axis` to `value`, replacing any previous choice for that axis.
    pub fn insert(&mut self, axis: impl Into<String>, value: impl Into<String>) {
        self.0.insert(axis.into(), value.into());
    }

    /// The value chosen for `axis`, if any.
    #[must_use]
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.0.get(axis).map(String::as_str)
    }

    /// Iterate `(axis, value)` pairs in axis order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether no options were chosen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of axes chosen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Parse a single `axis=value` entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the separator is missing or either side is empty
    /// after trimming.
    pub fn parse_entry(s: &str) -> Result<(String, String), VariantSelectionError> {
        let (axis, value) = s
            .split_once('=')
            .ok_or_else(|| VariantSelectionError::MissingSeparator(s.to_owned()))?;
        let axis = axis.trim();
        let value = value.trim();
        if axis.is_empty() {
            return Err(VariantSelectionError::EmptyAxis);
        }
        if value.is_empty() {
            return Err(VariantSelectionError::EmptyValue);
        }
        Ok((axis.to_owned(), value.to_owned()))
    }

    /// Parse a list of `axis=value` entries. Later entries for the same axis
    /// replace earlier ones.
    ///
    /// # Errors
    ///
    /// Returns the first entry error encountered.
    pub fn parse_all<'a>(
        entries: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, VariantSelectionError> {
        entries.into_iter().map(Self::parse_entry).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariantSelection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for VariantSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (axis, value) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{axis}: {value}")?;
            first = false;
        }
        Ok(())
    }
}
