//! Keyword extraction and enrichment-map filtering.
//!
//! Both payloads come from the model and are filtered here before they reach a
//! prompt: keywords already present are dropped, and an enrichment map may only
//! point at real achievement indices and extracted candidates.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::resume::normalize;

/// JD keywords absent from the current achievements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordExtraction {
    #[serde(default)]
    pub missing_keywords: Vec<String>,
    #[serde(default)]
    pub critical_keywords: Vec<String>,
    #[serde(default)]
    pub nice_to_have_keywords: Vec<String>,
}

impl KeywordExtraction {
    /// Trims, deduplicates case-insensitively and drops every keyword that
    /// already occurs in one of `achievements`.
    pub fn filtered(self, achievements: &[String]) -> Self {
        let haystack: Vec<String> = achievements.iter().map(|a| a.to_lowercase()).collect();
        let filter = |keywords: Vec<String>| -> Vec<String> {
            let mut seen = HashSet::new();
            keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .filter(|k| seen.insert(normalize(k)))
                .filter(|k| {
                    let needle = k.to_lowercase();
                    let present = haystack.iter().any(|a| a.contains(&needle));
                    if present {
                        debug!(keyword = %k, "keyword already present, dropped");
                    }
                    !present
                })
                .collect()
        };

        Self {
            missing_keywords: filter(self.missing_keywords),
            critical_keywords: filter(self.critical_keywords),
            nice_to_have_keywords: filter(self.nice_to_have_keywords),
        }
    }

    /// All keywords, critical first, each appearing once.
    pub fn candidates(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.critical_keywords
            .iter()
            .chain(&self.missing_keywords)
            .chain(&self.nice_to_have_keywords)
            .filter(|k| seen.insert(normalize(k)))
            .cloned()
            .collect()
    }
}

/// Achievement index → keywords approved for injection into that achievement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EnrichmentMap(BTreeMap<usize, Vec<String>>);

impl EnrichmentMap {
    /// Builds a map from the model's raw `{"<index>": [keyword...]}` payload.
    ///
    /// Keys that are not indices into `0..achievement_count` are discarded, as are
    /// keywords outside `candidates`. Kept keywords take the candidate's spelling.
    pub fn from_raw(
        raw: HashMap<String, Vec<String>>,
        achievement_count: usize,
        candidates: &[String],
    ) -> Self {
        let canonical: HashMap<String, &String> = candidates.iter().map(|c| (normalize(c), c)).collect();
        let mut map = BTreeMap::new();

        for (key, keywords) in raw {
            let index = match key.trim().parse::<usize>() {
                Ok(i) if i < achievement_count => i,
                _ => {
                    warn!(key = %key, achievement_count, "Enrichment map key is not a valid index, discarded");
                    continue;
                }
            };

            let mut seen = HashSet::new();
            let approved: Vec<String> = keywords
                .iter()
                .filter_map(|k| match canonical.get(&normalize(k)) {
                    Some(c) => Some((*c).clone()),
                    None => {
                        warn!(index, keyword = %k, "Enrichment keyword was not extracted, discarded");
                        None
                    }
                })
                .filter(|k| seen.insert(normalize(k)))
                .collect();

            if !approved.is_empty() {
                map.insert(index, approved);
            }
        }

        Self(map)
    }

    pub fn for_index(&self, index: usize) -> &[String] {
        self.0.get(&index).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
