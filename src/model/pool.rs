use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rocket::tokio::sync::RwLock;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::id::JurorId;
use crate::model::juror::{Juror, JurorStatus};

/// The juror pool: all registered jurors keyed by id. The core engine only
/// reads from it; registration and status changes arrive from the account
/// collaborator. Read-mostly, so a single `RwLock` over the map gives
/// unlimited concurrent readers with single-writer isolation.
pub struct JurorPool {
    jurors: RwLock<HashMap<JurorId, Juror>>,
}

impl JurorPool {
    pub fn new() -> Self {
        Self {
            jurors: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new juror. Duplicate registration is rejected.
    pub async fn register(&self, juror: Juror) -> Result<()> {
        let mut jurors = self.jurors.write().await;
        if jurors.contains_key(&juror.id) {
            return Err(Error::BadRequest(format!(
                "Juror {} is already registered",
                juror.id
            )));
        }
        jurors.insert(juror.id.clone(), juror);
        Ok(())
    }

    /// Look up a single juror.
    pub async fn get(&self, id: &JurorId) -> Option<Juror> {
        self.jurors.read().await.get(id).cloned()
    }

    /// All `active` jurors, optionally restricted to those opted into
    /// `category`. Returns a snapshot; selection works over this snapshot
    /// rather than the live map.
    pub async fn list_eligible(&self, category: Option<&str>) -> Vec<Juror> {
        self.jurors
            .read()
            .await
            .values()
            .filter(|j| j.is_eligible(category))
            .cloned()
            .collect()
    }

    /// All jurors ordered by id, for the paginated listing endpoint.
    pub async fn list(&self, skip: usize, limit: usize) -> (Vec<Juror>, usize) {
        let jurors = self.jurors.read().await;
        let total = jurors.len();
        let mut all: Vec<_> = jurors.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        (all.into_iter().skip(skip).take(limit).collect(), total)
    }

    /// Soft status change (never a hard delete).
    pub async fn set_status(&self, id: &JurorId, status: JurorStatus) -> Result<()> {
        let mut jurors = self.jurors.write().await;
        let juror = jurors
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("Juror with ID '{id}'")))?;
        juror.status = status;
        Ok(())
    }

    /// Record that a juror cast a ballot at `when`: bumps their activity
    /// stats, which feed the selector's recency tie-break.
    pub async fn record_served(&self, id: &JurorId, when: DateTime<Utc>) {
        let mut jurors = self.jurors.write().await;
        if let Some(juror) = jurors.get_mut(id) {
            juror.questions_judged += 1;
            juror.last_active = when;
        }
    }

    /// Aggregate pool statistics for the stats endpoint.
    pub async fn stats(&self) -> PoolStats {
        let jurors = self.jurors.read().await;
        let total = jurors.len();
        let active = jurors
            .values()
            .filter(|j| j.status == JurorStatus::Active)
            .count();
        let mut demographics: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        let mut reliability_sum = 0.0;
        let mut judged_sum: u64 = 0;
        for juror in jurors.values() {
            for (dimension, bucket) in &juror.demographics {
                *demographics
                    .entry(dimension.clone())
                    .or_default()
                    .entry(bucket.clone())
                    .or_default() += 1;
            }
            reliability_sum += juror.reliability;
            judged_sum += u64::from(juror.questions_judged);
        }
        PoolStats {
            total_jurors: total,
            active_jurors: active,
            demographics,
            average_reliability: if total == 0 {
                0.0
            } else {
                reliability_sum / total as f64
            },
            average_questions_judged: if total == 0 {
                0.0
            } else {
                judged_sum as f64 / total as f64
            },
        }
    }
}

impl Default for JurorPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate juror pool statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub total_jurors: usize,
    pub active_jurors: usize,
    /// Per-dimension counts of jurors in each bucket.
    pub demographics: BTreeMap<String, BTreeMap<String, usize>>,
    pub average_reliability: f64,
    pub average_questions_judged: f64,
}
