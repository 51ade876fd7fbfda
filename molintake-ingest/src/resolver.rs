//! Duplicate resolution for a normalized batch.
//!
//! Each record gets one [`Verdict`], decided in three phases:
//!
//! 1. **Within batch**: a content hash already seen earlier in the batch makes
//!    the record a [`Verdict::WithinBatchDuplicate`] of its first occurrence.
//! 2. **Exact**: first occurrences whose hash the store already knows are
//!    [`Verdict::ExactDuplicate`]s.
//! 3. **Similar**: the rest are compared by Tanimoto similarity, on the
//!    configured fingerprint family, against stored records with the same
//!    molecular formula. The best candidate at or above the threshold makes
//!    the record a [`Verdict::SimilarDuplicate`]; otherwise it is
//!    [`Verdict::New`].
//!
//! Formula bucketing bounds the comparison cost but can miss near-duplicates
//! whose formulas differ, and the per-formula candidate sample can miss
//! matches in very large buckets.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use molintake_chem::{tanimoto, CanonicalMolecule, FeatureSet, Fingerprint, FingerprintKind};
use molintake_core::{IntakeError, Result};

/// Identifier of a record in the existing store.
pub type ExistingId = String;

/// Resolver knobs; the defaults are tunable starting points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum Tanimoto score for a similar duplicate, in `[0, 1]`.
    pub similarity_threshold: f64,
    /// Most stored candidates compared per formula bucket.
    pub candidate_sample_size: usize,
    /// Fingerprint family used for similarity.
    pub fingerprint_family: FingerprintKind,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            similarity_threshold: 0.95,
            candidate_sample_size: 500,
            fingerprint_family: FingerprintKind::default(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(IntakeError::Config(format!(
                "similarity_threshold {} is outside [0, 1]",
                self.similarity_threshold
            )));
        }
        if self.candidate_sample_size == 0 {
            return Err(IntakeError::Config("candidate_sample_size must be positive".into()));
        }
        self.fingerprint_family.validate()
    }
}

/// Duplicate classification of one batch record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    New,
    ExactDuplicate { existing_id: ExistingId },
    SimilarDuplicate { existing_id: ExistingId, score: f64 },
    /// Same content hash as the earlier record at `batch_index`.
    WithinBatchDuplicate { batch_index: usize },
}

impl Verdict {
    pub fn is_new(&self) -> bool {
        matches!(self, Verdict::New)
    }

    pub fn is_duplicate(&self) -> bool {
        !self.is_new()
    }
}

/// Read-only access to already-stored molecules.
///
/// Implementations backed by a remote store should override the batched
/// methods to answer in one round trip each.
pub trait ExistingLookup {
    /// The stored record with this content hash, if any.
    fn lookup_by_hash(&self, hash: &str) -> Result<Option<ExistingId>>;

    /// Up to `limit` stored records with this formula and their fingerprint
    /// of `kind`.
    fn candidates_by_formula(
        &self,
        formula: &str,
        kind: FingerprintKind,
        limit: usize,
    ) -> Result<Vec<(ExistingId, Fingerprint)>>;

    /// Batched [`lookup_by_hash`](Self::lookup_by_hash): known hashes mapped
    /// to their record.
    fn lookup_many(&self, hashes: &[&str]) -> Result<HashMap<String, ExistingId>> {
        let mut found = HashMap::new();
        for &hash in hashes {
            if let Some(id) = self.lookup_by_hash(hash)? {
                found.insert(hash.to_string(), id);
            }
        }
        Ok(found)
    }

    /// Batched [`candidates_by_formula`](Self::candidates_by_formula).
    fn candidates_for_formulas(
        &self,
        formulas: &[&str],
        kind: FingerprintKind,
        limit: usize,
    ) -> Result<HashMap<String, Vec<(ExistingId, Fingerprint)>>> {
        formulas
            .iter()
            .map(|&f| Ok((f.to_string(), self.candidates_by_formula(f, kind, limit)?)))
            .collect()
    }
}

/// An in-memory store, for tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLookup {
    by_hash: HashMap<String, ExistingId>,
    by_formula: BTreeMap<String, Vec<(ExistingId, Fingerprint)>>,
}

impl InMemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processed molecule and all of its fingerprints.
    pub fn insert(&mut self, id: impl Into<ExistingId>, molecule: &CanonicalMolecule, features: &FeatureSet) {
        self.insert_raw(id, &molecule.content_hash, &molecule.formula, features.fingerprints.iter().cloned());
    }

    pub fn insert_raw(
        &mut self,
        id: impl Into<ExistingId>,
        hash: &str,
        formula: &str,
        fingerprints: impl IntoIterator<Item = Fingerprint>,
    ) {
        let id = id.into();
        self.by_hash.insert(hash.to_string(), id.clone());
        let bucket = self.by_formula.entry(formula.to_string()).or_default();
        bucket.extend(fingerprints.into_iter().map(|fp| (id.clone(), fp)));
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

impl ExistingLookup for InMemoryLookup {
    fn lookup_by_hash(&self, hash: &str) -> Result<Option<ExistingId>> {
        Ok(self.by_hash.get(hash).cloned())
    }

    fn candidates_by_formula(
        &self,
        formula: &str,
        kind: FingerprintKind,
        limit: usize,
    ) -> Result<Vec<(ExistingId, Fingerprint)>> {
        Ok(self
            .by_formula
            .get(formula)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|(_, fp)| fp.kind() == kind)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// A normalized record handed to the resolver.
#[derive(Debug, Clone, Copy)]
pub struct BatchEntry<'a> {
    pub molecule: &'a CanonicalMolecule,
    pub features: &'a FeatureSet,
}

/// Classify every entry of `batch`; verdicts align index for index.
pub fn resolve_duplicates(
    batch: &[BatchEntry<'_>],
    lookup: &dyn ExistingLookup,
    config: &ResolverConfig,
) -> Result<Vec<Verdict>> {
    let mut verdicts: Vec<Option<Verdict>> = vec![None; batch.len()];

    // within batch: first occurrence wins
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for (i, entry) in batch.iter().enumerate() {
        let hash = entry.molecule.content_hash.as_str();
        match first_seen.get(hash) {
            Some(&first) => verdicts[i] = Some(Verdict::WithinBatchDuplicate { batch_index: first }),
            None => {
                first_seen.insert(hash, i);
            }
        }
    }
    debug!(
        "resolver: {} records, {} within-batch duplicates",
        batch.len(),
        batch.len() - first_seen.len()
    );

    // exact matches in the store
    let mut hashes: Vec<&str> = first_seen.keys().copied().collect();
    hashes.sort_unstable();
    let known = lookup.lookup_many(&hashes)?;
    for (i, entry) in batch.iter().enumerate() {
        if verdicts[i].is_none() {
            if let Some(id) = known.get(&entry.molecule.content_hash) {
                verdicts[i] = Some(Verdict::ExactDuplicate { existing_id: id.clone() });
            }
        }
    }
    debug!("resolver: {} exact duplicates in store", known.len());

    // similarity within formula buckets
    let pending: Vec<usize> = (0..batch.len()).filter(|&i| verdicts[i].is_none()).collect();
    let formulas: Vec<&str> = pending
        .iter()
        .map(|&i| batch[i].molecule.formula.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let kind = config.fingerprint_family;
    let buckets = if formulas.is_empty() {
        HashMap::new()
    } else {
        lookup.candidates_for_formulas(&formulas, kind, config.candidate_sample_size)?
    };
    debug!(
        "resolver: {} records left across {} formula buckets",
        pending.len(),
        formulas.len()
    );

    let mut similar = 0usize;
    for i in pending {
        let entry = &batch[i];
        let candidates = buckets
            .get(&entry.molecule.formula)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let verdict = if candidates.is_empty() {
            Verdict::New
        } else {
            let query = query_fingerprint(entry, kind)?;
            best_match(&query, candidates, config)?
        };
        if matches!(verdict, Verdict::SimilarDuplicate { .. }) {
            similar += 1;
        }
        verdicts[i] = Some(verdict);
    }
    debug!("resolver: {similar} similar duplicates");

    Ok(verdicts.into_iter().map(|v| v.unwrap_or(Verdict::New)).collect())
}

/// The entry's fingerprint of `kind`, computed from the canonical graph when
/// the feature set lacks it.
fn query_fingerprint(entry: &BatchEntry<'_>, kind: FingerprintKind) -> Result<Fingerprint> {
    match entry.features.fingerprint(kind) {
        Some(fp) => Ok(fp.clone()),
        None => kind.compute(&entry.molecule.molecule),
    }
}

fn best_match(
    query: &Fingerprint,
    candidates: &[(ExistingId, Fingerprint)],
    config: &ResolverConfig,
) -> Result<Verdict> {
    let mut best: Option<(&ExistingId, f64)> = None;
    for (id, fp) in candidates.iter().take(config.candidate_sample_size) {
        if fp.kind() != query.kind() {
            warn!("skipping candidate {id}: fingerprint {} is not {}", fp.kind(), query.kind());
            continue;
        }
        let score = tanimoto(query, fp)?;
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((id, score));
        }
    }
    Ok(match best {
        Some((id, score)) if score >= config.similarity_threshold => Verdict::SimilarDuplicate {
            existing_id: id.clone(),
            score,
        },
        _ => Verdict::New,
    })
}
