//! Rule-based palace interpretation over a static knowledge base.
//!
//! Records are keyed by `star_palace`, where `star` is a single star name or
//! a comma-joined pair and `palace` is a palace name, `格局` for patterns or
//! `化X` for transformation judgments.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::*;
use crate::patterns::{detect_patterns, PalaceContext};

/// Palace key under which named patterns are filed.
pub const PATTERN_PALACE: &str = "格局";

const BORROWED_PREFIX: &str = "(借星) ";
const BORROWED_TAG: &str = "#借星";

static BUILTIN: LazyLock<KnowledgeBase> = LazyLock::new(|| {
    KnowledgeBase::from_json_str(include_str!("../data/interpretations.json"))
        .expect("built-in knowledge base parses")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarInterpretation {
    pub star: String,
    pub palace: String,
    pub summary: String,
    pub detail: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StarInterpretation {
    fn borrowed(&self) -> Self {
        let mut record = self.clone();
        record.summary = format!("{}{}", BORROWED_PREFIX, self.summary);
        record.tags.push(BORROWED_TAG.to_string());
        record
    }

    /// Generic judgment for a palace nothing else matched.
    fn calm(palace_name: &str) -> Self {
        StarInterpretation {
            star: "平稳".to_string(),
            palace: palace_name.to_string(),
            summary: "星曜平淡，无风无浪".to_string(),
            detail: "此宫位内无强力主星或吉煞激荡，主该方面运势平稳，受对宫及三方四正影响较大。宜静守，顺其自然。"
                .to_string(),
            tags: vec!["#平稳".to_string(), "#静守".to_string()],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeBaseError {
    #[error("failed to read knowledge base {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse knowledge base: {0}")]
    Parse(#[from] serde_json::Error),
}

fn key(star: &str, palace: &str) -> String {
    format!("{}_{}", star, palace)
}

/// Interpretation records plus the lookup index derived from them.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    records: Vec<StarInterpretation>,
    index: HashMap<String, usize>,
}

impl KnowledgeBase {
    /// Indexes `records`. A pair `A,B` is also reachable as `B,A` unless an
    /// explicit `B,A` record exists. Repeated keys resolve to the last record.
    pub fn new(records: Vec<StarInterpretation>) -> Self {
        let mut index = HashMap::with_capacity(records.len() * 2);
        let mut reversed = HashSet::new();

        for (position, record) in records.iter().enumerate() {
            let direct = key(&record.star, &record.palace);
            if index.insert(direct.clone(), position).is_some() && !reversed.remove(&direct) {
                warn!(key = %direct, "duplicate knowledge base key, keeping the later record");
            }

            let parts: Vec<&str> = record.star.split(',').collect();
            if let [first, second] = parts.as_slice() {
                let reverse = key(&format!("{},{}", second, first), &record.palace);
                if !index.contains_key(&reverse) {
                    index.insert(reverse.clone(), position);
                    reversed.insert(reverse);
                }
            }
        }

        debug!(records = records.len(), keys = index.len(), "indexed knowledge base");
        KnowledgeBase { records, index }
    }

    pub fn from_json_str(json: &str) -> std::result::Result<Self, KnowledgeBaseError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> std::result::Result<Self, KnowledgeBaseError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| KnowledgeBaseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// The knowledge base bundled with the crate.
    pub fn builtin() -> &'static KnowledgeBase {
        &BUILTIN
    }

    pub fn records(&self) -> &[StarInterpretation] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn lookup(&self, star: &str, palace: &str) -> Option<&StarInterpretation> {
        self.index
            .get(&key(star, palace))
            .and_then(|&position| self.records.get(position))
    }

    /// Matches a palace against the knowledge base.
    ///
    /// Patterns are looked up under `格局`. An exact pair of major stars is
    /// tried as a combination first; single major stars are only consulted
    /// when no combination matched. Transformed major and minor stars are
    /// looked up under `化X`, minor and misc stars under the palace name.
    /// When main, transformations and minors all come up empty a generic calm
    /// judgment is added to minors.
    pub fn interpret(&self, query: &PalaceQuery<'_>) -> PalaceInterpretations {
        let mut result = PalaceInterpretations::default();
        let mark = |record: &StarInterpretation| {
            if query.borrowed {
                record.borrowed()
            } else {
                record.clone()
            }
        };

        let context = PalaceContext::new(query.palace_name, query.stars(), query.stem_branch);
        for pattern in detect_patterns(&context) {
            if let Some(record) = self.lookup(pattern.name(), PATTERN_PALACE) {
                result.patterns.push(record.clone());
            }
        }

        let mut found_dual = false;
        if let [first, second] = query.major_stars {
            let combination = format!("{},{}", first.name, second.name);
            if let Some(record) = self.lookup(&combination, query.palace_name) {
                result.main.push(mark(record));
                found_dual = true;
            }
        }

        if !found_dual {
            for star in query.major_stars {
                if let Some(record) = self.lookup(&star.name, query.palace_name) {
                    result.main.push(mark(record));
                }
            }
        }

        for star in query.major_stars.iter().chain(query.minor_stars) {
            if let Some(mutagen) = star.mutagen {
                if let Some(record) = self.lookup(&star.name, &mutagen.palace_key()) {
                    result.transformations.push(record.clone());
                }
            }
        }

        for star in query.minor_stars.iter().chain(query.misc_stars) {
            if let Some(record) = self.lookup(&star.name, query.palace_name) {
                result.minors.push(record.clone());
            }
        }

        if result.main.is_empty() && result.transformations.is_empty() && result.minors.is_empty() {
            result.minors.push(StarInterpretation::calm(query.palace_name));
        }

        result
    }
}

/// Inputs of the matcher for one palace.
#[derive(Debug, Clone, Copy)]
pub struct PalaceQuery<'a> {
    pub palace_name: &'a str,
    pub major_stars: &'a [Star],
    pub minor_stars: &'a [Star],
    pub misc_stars: &'a [Star],
    /// e.g. `甲子`; the second character drives branch-specific patterns.
    pub stem_branch: &'a str,
    /// Set when the major stars are borrowed from the opposite palace.
    pub borrowed: bool,
}

impl<'a> PalaceQuery<'a> {
    pub fn from_palace(palace: &'a Palace) -> Self {
        PalaceQuery {
            palace_name: &palace.palace_name,
            major_stars: &palace.major_stars,
            minor_stars: &palace.minor_stars,
            misc_stars: &palace.misc_stars,
            stem_branch: &palace.stem_branch,
            borrowed: false,
        }
    }

    pub fn borrowed(mut self, borrowed: bool) -> Self {
        self.borrowed = borrowed;
        self
    }

    fn stars(&self) -> impl Iterator<Item = &'a Star> {
        self.major_stars
            .iter()
            .chain(self.minor_stars)
            .chain(self.misc_stars)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PalaceInterpretations {
    pub patterns: Vec<StarInterpretation>,
    pub main: Vec<StarInterpretation>,
    pub transformations: Vec<StarInterpretation>,
    pub minors: Vec<StarInterpretation>,
}

/// Matches a palace against the built-in knowledge base.
pub fn palace_interpretations(query: &PalaceQuery<'_>) -> PalaceInterpretations {
    KnowledgeBase::builtin().interpret(query)
}

impl ZiweiChart {
    /// Matcher input for the natal palace at `index`.
    pub fn query(&self, index: usize, borrowed: bool) -> Option<PalaceQuery<'_>> {
        self.palaces
            .get(index)
            .map(|palace| PalaceQuery::from_palace(palace).borrowed(borrowed))
    }

    /// Matcher input for the palace at `index` judged with the major stars of
    /// its opposite palace.
    pub fn query_borrowing_opposite(&self, index: usize) -> Option<PalaceQuery<'_>> {
        let opposite = self.palaces.get((index + PALACE_COUNT / 2) % PALACE_COUNT)?;
        self.query(index, true).map(|query| PalaceQuery {
            major_stars: &opposite.major_stars,
            ..query
        })
    }
}
