use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::id::JurorId;

/// A juror's declared demographic attributes: named categorical dimensions
/// (e.g. `region`, `age_group`), each with a finite value set. A `BTreeMap`
/// keeps dimension order deterministic for bucketing and serialization.
pub type Demographics = BTreeMap<String, String>;

/// Eligibility status of a juror. Jurors are never hard-deleted; they are
/// soft-retired by status change only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JurorStatus {
    /// Eligible for panel selection.
    Active,
    /// Temporarily out of the pool, e.g. by their own choice.
    Inactive,
    /// Removed from the pool by an administrator.
    Suspended,
}

/// A registered member of the juror pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Juror {
    pub id: JurorId,
    pub demographics: Demographics,
    /// Question categories this juror has opted into.
    pub categories: HashSet<String>,
    pub status: JurorStatus,
    /// Reliability score in [0,1]; higher is better.
    pub reliability: f64,
    /// Number of questions this juror has cast a ballot on.
    pub questions_judged: u32,
    /// Last time this juror served on a panel; drives the selection
    /// preference for jurors who have not served recently.
    pub last_active: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

impl Juror {
    /// Create a freshly-registered, active juror.
    pub fn new(id: JurorId, demographics: Demographics, categories: HashSet<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            demographics,
            categories,
            status: JurorStatus::Active,
            reliability: 1.0,
            questions_judged: 0,
            last_active: now,
            registered_at: now,
        }
    }

    /// Is this juror eligible for selection on a question in `category`?
    /// `None` means the question is uncategorised and only status matters.
    pub fn is_eligible(&self, category: Option<&str>) -> bool {
        self.status == JurorStatus::Active
            && category.map_or(true, |c| self.categories.contains(c))
    }
}

#[cfg(test)]
pub mod examples {
    use super::*;

    /// A juror with the given id, region and age group, opted into every
    /// example category.
    pub fn juror(id: &str, region: &str, age_group: &str) -> Juror {
        let mut demographics = Demographics::new();
        demographics.insert("region".to_string(), region.to_string());
        demographics.insert("age_group".to_string(), age_group.to_string());
        let categories = ["Moral", "Fashion", "Workplace"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        Juror::new(JurorId::from(id), demographics, categories)
    }
}
