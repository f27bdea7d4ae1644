//! Fingerprint-gated artifact cache.
//!
//! An artifact field is recomputed only when its stored `prompt_hash` differs
//! from the [`Fingerprint`] of the parameters the caller would use now, or when
//! the run was started with `redo`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;

use crate::record::{ArtifactRecord, RecordStore};

/// Short content hash of every parameter that determines a cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Number of hex characters kept from the SHA-256 digest.
    pub const LENGTH: usize = 8;

    /// Hash `parts` joined with `"; "`, in the order given.
    ///
    /// # Examples
    ///
    /// ```
    /// use framesense_common::Fingerprint;
    ///
    /// let a = Fingerprint::of(["llava:13b", "Describe the frame"]);
    /// let b = Fingerprint::of(["llava:13b", "Describe the frame"]);
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str().len(), Fingerprint::LENGTH);
    /// ```
    pub fn of<I, T>(parts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        let joined = parts
            .into_iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        let digest = Sha256::digest(joined.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(Self::LENGTH);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters recorded next to a computed value.
#[derive(Debug, Clone, Default)]
pub struct ParamSnapshot {
    pub operator: String,
    pub model: Option<String>,
    pub seed: Value,
    pub extra: Map<String, Value>,
}

impl ParamSnapshot {
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_seed(mut self, seed: Value) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// Output of a compute step: the value plus any per-call extras (e.g. `stats`).
#[derive(Debug, Clone, Default)]
pub struct Computed {
    pub value: Value,
    pub extra: Map<String, Value>,
}

impl From<Value> for Computed {
    fn from(value: Value) -> Self {
        Self {
            value,
            extra: Map::new(),
        }
    }
}

/// Whether a lookup was served from the record or freshly computed.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Reused(Value),
    Computed(Value),
}

impl Lookup {
    pub fn value(&self) -> &Value {
        match self {
            Lookup::Reused(v) | Lookup::Computed(v) => v,
        }
    }

    pub fn was_computed(&self) -> bool {
        matches!(self, Lookup::Computed(_))
    }
}

/// Counters reported at the end of an operator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub reused: usize,
    pub computed: usize,
}

/// Skip-or-recompute decisions for one operator run.
#[derive(Debug, Default)]
pub struct ArtifactCache {
    redo: bool,
    stats: CacheStats,
}

impl ArtifactCache {
    pub fn new(redo: bool) -> Self {
        Self {
            redo,
            stats: CacheStats::default(),
        }
    }

    /// True when the stored record for `(id, field)` can be reused as is.
    pub fn is_fresh(
        &self,
        store: &RecordStore,
        id: &str,
        field: &str,
        fingerprint: &Fingerprint,
    ) -> bool {
        !self.redo
            && store
                .get(id, field)
                .and_then(|r| r.prompt_hash.as_deref())
                .is_some_and(|stored| stored == fingerprint.as_str())
    }

    /// Store a freshly computed value and mark the store dirty.
    pub fn store(
        &mut self,
        store: &mut RecordStore,
        id: &str,
        field: &str,
        fingerprint: &Fingerprint,
        params: &ParamSnapshot,
        computed: Computed,
    ) {
        let mut extra = params.extra.clone();
        extra.extend(computed.extra);

        store.insert(
            id,
            field,
            ArtifactRecord {
                value: computed.value,
                operator: params.operator.clone(),
                model: params.model.clone(),
                seed: params.seed.clone(),
                updated: Some(Utc::now()),
                prompt_hash: Some(fingerprint.to_string()),
                extra,
            },
        );
        self.stats.computed += 1;
    }

    /// Return the stored value when fresh, otherwise run `compute` and record
    /// its output under `fingerprint`.
    pub async fn get_or_compute<F, Fut, E>(
        &mut self,
        store: &mut RecordStore,
        id: &str,
        field: &str,
        fingerprint: &Fingerprint,
        params: &ParamSnapshot,
        compute: F,
    ) -> Result<Lookup, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Computed, E>>,
    {
        if self.is_fresh(store, id, field, fingerprint) {
            if let Some(record) = store.get(id, field) {
                tracing::trace!("Reusing {id}/{field} ({fingerprint})");
                self.stats.reused += 1;
                return Ok(Lookup::Reused(record.value.clone()));
            }
        }

        let computed = compute().await?;
        let value = computed.value.clone();
        self.store(store, id, field, fingerprint, params, computed);
        Ok(Lookup::Computed(value))
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
