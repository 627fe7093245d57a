use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{Hash, Hasher};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::id::{JurorId, QuestionId};
use crate::model::juror::Juror;

/// Every panel has exactly this many jurors; selection never silently
/// degrades below it.
pub const PANEL_SIZE: usize = 12;

/// The fixed set of jurors assigned to one question. Membership is immutable
/// after formation, even if a juror later goes inactive: replacing a panel
/// member mid-vote would corrupt the tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    question_id: QuestionId,
    jurors: Vec<JurorId>,
    diversity_score: f64,
}

/// A juror's demographic cell: one (dimension, bucket) pair per declared
/// dimension. Jurors with identical cells are interchangeable for stratification.
type Cell<'a> = Vec<(&'a str, &'a str)>;

impl Panel {
    /// Select a panel of exactly [`PANEL_SIZE`] distinct jurors from the
    /// eligible pool, maximizing demographic coverage.
    ///
    /// The pool is partitioned into demographic cells and the panel is built
    /// by weighted round-robin: each pick comes from the cell with the fewest
    /// panel members relative to its share of the pool. Within a cell, jurors
    /// are ranked by reliability (descending), then least-recent activity,
    /// then a seeded per-panel tie-break, so selection is reproducible for a
    /// fixed pool snapshot.
    pub fn select(question_id: QuestionId, eligible: &[Juror]) -> Result<Self> {
        if eligible.len() < PANEL_SIZE {
            return Err(Error::InsufficientPool {
                question_id,
                needed: PANEL_SIZE,
                available: eligible.len(),
            });
        }

        // Deterministic base order, then a seeded tie-break value per juror.
        let mut candidates: Vec<&Juror> = eligible.iter().collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        let mut rng = StdRng::seed_from_u64(panel_seed(&question_id));
        let tiebreak: HashMap<&JurorId, u64> = candidates
            .iter()
            .map(|j| (&j.id, rng.gen::<u64>()))
            .collect();

        // Partition into demographic cells.
        let mut cells: BTreeMap<Cell, Vec<&Juror>> = BTreeMap::new();
        for juror in &candidates {
            cells.entry(cell_of(juror)).or_default().push(juror);
        }

        // Rank within each cell.
        for members in cells.values_mut() {
            members.sort_by(|a, b| {
                b.reliability
                    .total_cmp(&a.reliability)
                    .then_with(|| a.last_active.cmp(&b.last_active))
                    .then_with(|| tiebreak[&a.id].cmp(&tiebreak[&b.id]))
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        // Weighted round-robin across cells: repeatedly take from the cell
        // whose taken/size ratio is lowest (compared exactly by
        // cross-multiplication), preferring larger cells on a tie and cell
        // key order after that.
        let cell_list: Vec<(Cell, Vec<&Juror>)> = cells.into_iter().collect();
        let mut taken = vec![0usize; cell_list.len()];
        let mut jurors = Vec::with_capacity(PANEL_SIZE);
        while jurors.len() < PANEL_SIZE {
            let mut best: Option<usize> = None;
            for (i, (_, members)) in cell_list.iter().enumerate() {
                if taken[i] >= members.len() {
                    continue;
                }
                best = match best {
                    None => Some(i),
                    Some(b) => {
                        let best_len = cell_list[b].1.len();
                        let beats = (taken[i] * best_len)
                            .cmp(&(taken[b] * members.len()))
                            .then_with(|| best_len.cmp(&members.len()))
                            .is_lt();
                        if beats {
                            Some(i)
                        } else {
                            Some(b)
                        }
                    }
                };
            }
            match best {
                Some(i) => {
                    jurors.push(cell_list[i].1[taken[i]].id.clone());
                    taken[i] += 1;
                }
                None => {
                    // Unreachable given the size check above, but the pool
                    // running dry must never silently shrink the panel.
                    return Err(Error::InsufficientPool {
                        question_id,
                        needed: PANEL_SIZE,
                        available: jurors.len(),
                    });
                }
            }
        }

        let distinct: HashSet<&JurorId> = jurors.iter().collect();
        if distinct.len() != PANEL_SIZE {
            return Err(Error::Invariant(format!(
                "Panel for question {question_id} contains a duplicate juror"
            )));
        }

        let diversity_score = diversity_score(&jurors, eligible);
        Ok(Self {
            question_id,
            jurors,
            diversity_score,
        })
    }

    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    pub fn members(&self) -> &[JurorId] {
        &self.jurors
    }

    pub fn contains(&self, juror_id: &JurorId) -> bool {
        self.jurors.iter().any(|id| id == juror_id)
    }

    pub fn diversity_score(&self) -> f64 {
        self.diversity_score
    }
}

/// Seed the per-panel RNG from the question id, so tie-breaking is random
/// across questions but reproducible for any one of them.
fn panel_seed(question_id: &QuestionId) -> u64 {
    let mut hasher = DefaultHasher::new();
    question_id.hash(&mut hasher);
    hasher.finish()
}

fn cell_of(juror: &Juror) -> Cell<'_> {
    juror
        .demographics
        .iter()
        .map(|(dimension, bucket)| (dimension.as_str(), bucket.as_str()))
        .collect()
}

/// Mean, over all demographic dimensions present in the pool, of the panel's
/// normalized Shannon entropy in that dimension. 1.0 means the panel spreads
/// evenly over every bucket the pool offers; a dimension with a single bucket
/// cannot discriminate and scores 1.0.
fn diversity_score(panel: &[JurorId], pool: &[Juror]) -> f64 {
    let by_id: HashMap<&JurorId, &Juror> = pool.iter().map(|j| (&j.id, j)).collect();
    let dimensions: BTreeSet<&str> = pool
        .iter()
        .flat_map(|j| j.demographics.keys().map(String::as_str))
        .collect();
    if dimensions.is_empty() {
        return 1.0;
    }

    let mut total = 0.0;
    for dimension in &dimensions {
        let pool_buckets: BTreeSet<&str> = pool
            .iter()
            .filter_map(|j| j.demographics.get(*dimension))
            .map(String::as_str)
            .collect();
        if pool_buckets.len() <= 1 {
            total += 1.0;
            continue;
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut represented = 0usize;
        for id in panel {
            if let Some(bucket) = by_id
                .get(id)
                .and_then(|j| j.demographics.get(*dimension))
            {
                *counts.entry(bucket.as_str()).or_default() += 1;
                represented += 1;
            }
        }
        if represented == 0 {
            continue;
        }
        let entropy: f64 = counts
            .values()
            .map(|&count| {
                let p = count as f64 / represented as f64;
                -p * p.ln()
            })
            .sum();
        total += entropy / (pool_buckets.len() as f64).ln();
    }
    total / dimensions.len() as f64
}
