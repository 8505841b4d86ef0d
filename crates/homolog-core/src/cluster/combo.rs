//! Exact (ATC, route) grouping of valid medications.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::MedicationRecord;

/// Metadata of one (ATC, route) combination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComboCluster {
    /// Sequential id; 0 is the most populated combination
    pub cluster_id: usize,
    /// Number of valid records with this combination
    pub count: usize,
    pub example_atc: String,
    pub example_via: String,
    /// Distinct active ingredients inside the combination
    pub distinct_ingredient_count: usize,
}

/// Read-only index of valid (ATC, route) combinations.
///
/// This is the homologation eligibility gate: a medication whose own
/// combination is absent has no valid homolog by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComboClusterIndex {
    clusters: Vec<ComboCluster>,
    // atc -> via -> cluster_id
    lookup: BTreeMap<String, BTreeMap<String, usize>>,
}

struct ComboAccumulator<'a> {
    first_seen: usize,
    atc: &'a str,
    via: &'a str,
    count: usize,
    ingredients: HashSet<&'a str>,
}

impl ComboClusterIndex {
    /// Group the valid records by their literal (ATC, route) pair.
    ///
    /// Invalid records and records missing ATC or route are ignored. Ids are assigned by descending count, ties
    /// broken by first-seen order.
    pub fn build(records: &[MedicationRecord]) -> Self {
        let mut groups: HashMap<(&str, &str), ComboAccumulator<'_>> = HashMap::new();

        for record in records.iter().filter(|r| r.is_valid()) {
            let key = record.combo();
            if key.0.is_empty() || key.1.is_empty() {
                continue;
            }
            let next_seen = groups.len();
            let group = groups.entry(key).or_insert_with(|| ComboAccumulator {
                first_seen: next_seen,
                atc: key.0,
                via: key.1,
                count: 0,
                ingredients: HashSet::new(),
            });
            group.count += 1;
            group.ingredients.insert(record.principio_activo.as_str());
        }

        let mut groups: Vec<ComboAccumulator<'_>> = groups.into_values().collect();
        groups.sort_by_key(|g| g.first_seen);
        // Stable: equal counts keep first-seen order
        groups.sort_by(|a, b| b.count.cmp(&a.count));

        let mut index = Self::default();
        for (cluster_id, group) in groups.into_iter().enumerate() {
            index
                .lookup
                .entry(group.atc.to_string())
                .or_default()
                .insert(group.via.to_string(), cluster_id);
            index.clusters.push(ComboCluster {
                cluster_id,
                count: group.count,
                example_atc: group.atc.to_string(),
                example_via: group.via.to_string(),
                distinct_ingredient_count: group.ingredients.len(),
            });
        }
        index
    }

    pub fn contains(&self, atc: &str, via: &str) -> bool {
        self.cluster_id(atc, via).is_some()
    }

    pub fn cluster_id(&self, atc: &str, via: &str) -> Option<usize> {
        self.lookup.get(atc)?.get(via).copied()
    }

    pub fn metadata(&self, atc: &str, via: &str) -> Option<&ComboCluster> {
        self.cluster_id(atc, via).and_then(|id| self.clusters.get(id))
    }

    /// Clusters ordered by id.
    pub fn clusters(&self) -> &[ComboCluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Check that the lookup table and cluster list agree.
    pub fn is_consistent(&self) -> bool {
        let mapped: usize = self.lookup.values().map(BTreeMap::len).sum();
        mapped == self.clusters.len()
            && self.clusters.iter().enumerate().all(|(id, c)| {
                c.cluster_id == id && self.cluster_id(&c.example_atc, &c.example_via) == Some(id)
            })
    }
}
