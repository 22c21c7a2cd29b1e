use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::data::{Attributes, ExtractionRecord};

/// Category name to the attribute sets recorded under it.
///
/// Categories keep first-seen order and each list keeps record order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatedResult {
    categories: IndexMap<String, Vec<Attributes>>,
}

impl AggregatedResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, category: &str, attributes: Attributes) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .push(attributes);
    }

    pub fn get(&self, category: &str) -> Option<&[Attributes]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Attributes])> {
        self.categories
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Number of attribute sets across all categories.
    pub fn total_entries(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }
}

/// Group records by their matched text.
///
/// Every record contributes exactly one entry; nothing is deduplicated.
pub fn aggregate<'a, I>(records: I) -> AggregatedResult
where
    I: IntoIterator<Item = &'a ExtractionRecord>,
{
    let mut result = AggregatedResult::new();
    for record in records {
        result.push(&record.extraction_text, record.attributes.clone());
    }
    result
}
