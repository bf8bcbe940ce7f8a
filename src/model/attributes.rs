use serde::{Deserialize, Serialize};

/// One label/value/feature triple found in a detail document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeEntry {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Icon or machine key attached to feature rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

impl AttributeEntry {
    /// A `(title, value)` row
    pub fn valued(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: Some(value.into()),
            key: None,
            available: None,
        }
    }

    /// A `(title, availability)` feature row
    pub fn feature(title: impl Into<String>, available: bool, key: Option<String>) -> Self {
        Self {
            title: title.into(),
            value: None,
            key: key.filter(|k| !k.is_empty()),
            available: Some(available),
        }
    }

    /// The value with surrounding whitespace removed, if non-empty
    pub fn trimmed_value(&self) -> Option<&str> {
        self.value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Attribute entries with unique titles, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeList(Vec<AttributeEntry>);

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry unless its title is blank or already present
    ///
    /// Returns whether the entry was added.
    pub fn push(&mut self, mut entry: AttributeEntry) -> bool {
        entry.title = entry.title.trim().to_string();
        if entry.title.is_empty() || self.contains(&entry.title) {
            return false;
        }
        self.0.push(entry);
        true
    }

    pub fn contains(&self, title: &str) -> bool {
        self.get(title).is_some()
    }

    pub fn get(&self, title: &str) -> Option<&AttributeEntry> {
        let title = title.trim();
        self.0.iter().find(|entry| entry.title == title)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AttributeEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<AttributeEntry> {
        self.0
    }
}

impl<'a> IntoIterator for &'a AttributeList {
    type Item = &'a AttributeEntry;
    type IntoIter = std::slice::Iter<'a, AttributeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
