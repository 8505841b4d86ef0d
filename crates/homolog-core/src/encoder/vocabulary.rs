//! Frozen label vocabularies and frequency tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label id written where a value has no label.
pub const UNKNOWN_LABEL: i64 = -1;

/// Bijection between distinct category values and dense integer ids.
///
/// Ids follow the lexicographic order of the values, starting at 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabelMap {
    values: Vec<String>,
}

impl LabelMap {
    /// Build from every non-empty value seen.
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut values: Vec<String> = values
            .into_iter()
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        values.sort();
        values.dedup();
        Self { values }
    }

    pub fn encode(&self, value: &str) -> Option<u32> {
        self.values
            .binary_search_by(|v| v.as_str().cmp(value))
            .ok()
            .map(|idx| idx as u32)
    }

    pub fn decode(&self, label: u32) -> Option<&str> {
        self.values.get(label as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Value counts normalized into probabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FrequencyTable {
    counts: BTreeMap<String, u64>,
    total: u64,
}

impl FrequencyTable {
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts = BTreeMap::new();
        let mut total = 0;
        for value in values.into_iter().filter(|v| !v.is_empty()) {
            *counts.entry(value.to_string()).or_insert(0) += 1;
            total += 1;
        }
        Self { counts, total }
    }

    /// Count of `value`; 0 when never seen.
    pub fn frequency(&self, value: &str) -> u64 {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Share of `value` in the table; 0.0 when never seen.
    pub fn probability(&self, value: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.frequency(value) as f64 / self.total as f64
    }

    pub fn contains(&self, value: &str) -> bool {
        self.counts.contains_key(value)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Encoded view of one critical field for one record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CriticalFeature {
    pub label: Option<u32>,
    /// Value appears among valid records
    pub es_valido: bool,
    pub freq_validos: u64,
    pub prob_validos: f64,
}

impl CriticalFeature {
    pub fn label_or_sentinel(&self) -> i64 {
        label_or_sentinel(self.label)
    }
}

/// Encoded view of one important field for one record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ImportantFeature {
    pub label: Option<u32>,
    pub freq: u64,
    pub prob: f64,
}

impl ImportantFeature {
    pub fn label_or_sentinel(&self) -> i64 {
        label_or_sentinel(self.label)
    }
}

/// Critical field encoder: labels over all records, frequencies over valid ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CriticalEncoding {
    pub labels: LabelMap,
    pub valid_frequencies: FrequencyTable,
}

impl CriticalEncoding {
    pub fn fit<'a>(all: impl Iterator<Item = &'a str>, valid: impl Iterator<Item = &'a str>) -> Self {
        Self {
            labels: LabelMap::fit(all),
            valid_frequencies: FrequencyTable::fit(valid),
        }
    }

    pub fn encode(&self, value: &str) -> CriticalFeature {
        CriticalFeature {
            label: self.labels.encode(value),
            es_valido: self.valid_frequencies.contains(value),
            freq_validos: self.valid_frequencies.frequency(value),
            prob_validos: self.valid_frequencies.probability(value),
        }
    }
}

/// Important field encoder: labels and frequencies over all records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImportantEncoding {
    pub labels: LabelMap,
    pub frequencies: FrequencyTable,
}

impl ImportantEncoding {
    pub fn fit<'a>(all: impl Iterator<Item = &'a str> + Clone) -> Self {
        Self {
            labels: LabelMap::fit(all.clone()),
            frequencies: FrequencyTable::fit(all),
        }
    }

    pub fn encode(&self, value: &str) -> ImportantFeature {
        ImportantFeature {
            label: self.labels.encode(value),
            freq: self.frequencies.frequency(value),
            prob: self.frequencies.probability(value),
        }
    }
}

fn label_or_sentinel(label: Option<u32>) -> i64 {
    label.map(i64::from).unwrap_or(UNKNOWN_LABEL)
}
