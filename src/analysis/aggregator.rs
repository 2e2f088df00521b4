//! Topic aggregation and label merging.
//!
//! [`TopicTable`] is the pipeline's working state: topic label to category
//! and per-day counts. Keys are normalized with [`label_key`], the one rule
//! used at every merge site (classifier output, dedup groups and the custom
//! topic merge), so casing or punctuation drift never yields two entries.

use crate::models::{Category, DayCounts, MergeGroup, SeedTopic};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Normalize a topic label for comparison.
///
/// Trims, collapses inner whitespace, strips trailing punctuation and
/// lowercases. The display spelling is kept separately.
pub fn label_key(label: &str) -> String {
    let collapsed = label.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'))
        .trim_end()
        .to_lowercase()
}

/// Merge custom topics into the built-in vocabulary.
///
/// Built-ins come first; the first occurrence of a label wins.
pub fn merge_seed_topics(builtin: Vec<SeedTopic>, custom: &[SeedTopic]) -> Vec<SeedTopic> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(builtin.len() + custom.len());

    for topic in builtin.into_iter().chain(custom.iter().cloned()) {
        let key = label_key(&topic.label);
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        merged.push(topic);
    }

    merged
}

/// One aggregated topic.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicEntry {
    /// First-seen spelling of the label.
    pub label: String,
    pub category: Category,
    pub frequencies: DayCounts,
    order: usize,
}

impl TopicEntry {
    pub fn total(&self) -> u64 {
        self.frequencies.values().map(|&c| u64::from(c)).sum()
    }
}

/// Outcome of applying dedup groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub groups_applied: usize,
    pub variants_merged: usize,
    /// Groups whose canonical label was never seen in this run.
    pub groups_skipped: usize,
}

/// Topic label to per-day frequency table.
#[derive(Debug, Default)]
pub struct TopicTable {
    entries: HashMap<String, TopicEntry>,
    next_order: usize,
}

impl TopicTable {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, label: &str) -> Option<&TopicEntry> {
        self.entries.get(&label_key(label))
    }

    #[cfg(test)]
    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(&label_key(label))
    }

    /// Add `count` attributions for `label` on `day`.
    ///
    /// Returns `true` when the label was created by this call. A zero
    /// count never creates an entry: a label exists only once a review
    /// has been attributed to it.
    pub fn record(&mut self, label: &str, category: Category, day: NaiveDate, count: u32) -> bool {
        if count == 0 {
            return false;
        }

        let key = label_key(label);
        if key.is_empty() {
            return false;
        }

        let mut created = false;
        let next_order = &mut self.next_order;
        let entry = self.entries.entry(key).or_insert_with(|| {
            created = true;
            let order = *next_order;
            *next_order += 1;
            TopicEntry {
                label: label.trim().to_string(),
                category,
                frequencies: DayCounts::new(),
                order,
            }
        });

        if !created && entry.category != category {
            debug!(
                topic = %entry.label,
                "ignoring category {} for topic already filed as {}",
                category,
                entry.category
            );
        }

        *entry.frequencies.entry(day).or_insert(0) += count;
        created
    }

    /// Labels in discovery order.
    pub fn labels(&self) -> Vec<String> {
        self.ordered().into_iter().map(|e| e.label.clone()).collect()
    }

    /// Sum of every count in the table.
    pub fn total_attributions(&self) -> u64 {
        self.entries.values().map(TopicEntry::total).sum()
    }

    /// Fold each group's variants into its canonical entry.
    ///
    /// Counts are only relabeled, never created or dropped. A group whose
    /// canonical label is absent is skipped entirely.
    pub fn apply_merges(&mut self, groups: &[MergeGroup]) -> MergeStats {
        let mut stats = MergeStats::default();

        for group in groups {
            if group.variants.is_empty() {
                continue;
            }

            let canonical_key = label_key(&group.canonical);
            if !self.entries.contains_key(&canonical_key) {
                warn!(
                    canonical = %group.canonical,
                    "skipping merge group: canonical topic was never observed"
                );
                stats.groups_skipped += 1;
                continue;
            }

            let mut merged_any = false;
            for variant in &group.variants {
                let variant_key = label_key(variant);
                if variant_key == canonical_key {
                    continue;
                }
                let Some(removed) = self.entries.remove(&variant_key) else {
                    debug!(variant = %variant, "variant not present, nothing to merge");
                    continue;
                };
                if let Some(canonical) = self.entries.get_mut(&canonical_key) {
                    for (day, count) in removed.frequencies {
                        *canonical.frequencies.entry(day).or_insert(0) += count;
                    }
                    debug!(
                        canonical = %canonical.label,
                        variant = %removed.label,
                        "merged topic variant"
                    );
                    stats.variants_merged += 1;
                    merged_any = true;
                }
            }

            if merged_any {
                stats.groups_applied += 1;
            }
        }

        stats
    }

    /// Consume the table, yielding entries in discovery order.
    pub fn into_entries(self) -> Vec<TopicEntry> {
        let mut entries: Vec<TopicEntry> = self.entries.into_values().collect();
        entries.sort_by_key(|e| e.order);
        entries
    }

    fn ordered(&self) -> Vec<&TopicEntry> {
        let mut entries: Vec<&TopicEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.order);
        entries
    }
}
