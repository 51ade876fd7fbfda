//! Fingerprint similarity: pairwise metrics, bulk ranking, nearest
//! neighbours, similarity matrices and single-linkage clustering.
//!
//! Every operation requires all fingerprints to share one
//! [`FingerprintKind`](crate::FingerprintKind); mixing kinds is an
//! [`IntakeError::IncompatibleFingerprints`] error. Two all-zero fingerprints
//! have similarity 0.0.

use serde::{Deserialize, Serialize};

use molintake_core::{IntakeError, Result, Scored};

use crate::fingerprint::{Fingerprint, FingerprintKind};
use crate::molecule::Molecule;

/// Set-overlap similarity metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// |A∩B| / |A∪B|
    #[default]
    Tanimoto,
    /// 2|A∩B| / (|A| + |B|)
    Dice,
}

impl Metric {
    fn score(self, a: &Fingerprint, b: &Fingerprint) -> f64 {
        let common = a.and_count(b) as f64;
        let (na, nb) = (a.count_ones() as f64, b.count_ones() as f64);
        let denom = match self {
            Metric::Tanimoto => na + nb - common,
            Metric::Dice => (na + nb) / 2.0,
        };
        if denom == 0.0 {
            0.0
        } else {
            common / denom
        }
    }
}

fn check_compatible(a: &Fingerprint, b: &Fingerprint) -> Result<()> {
    if a.kind() != b.kind() {
        return Err(IntakeError::IncompatibleFingerprints(format!(
            "cannot compare {} with {}",
            a.kind(),
            b.kind()
        )));
    }
    Ok(())
}

fn check_all(query: &Fingerprint, candidates: &[Fingerprint]) -> Result<()> {
    candidates.iter().try_for_each(|c| check_compatible(query, c))
}

/// Similarity of two fingerprints of the same kind, in `[0, 1]`.
pub fn similarity(a: &Fingerprint, b: &Fingerprint, metric: Metric) -> Result<f64> {
    check_compatible(a, b)?;
    Ok(metric.score(a, b))
}

/// Tanimoto similarity between two fingerprints.
///
/// # Example
///
/// ```
/// use molintake_chem::{morgan_fingerprint, parse_smiles, tanimoto};
///
/// let mol = parse_smiles("CCO").unwrap();
/// let fp = morgan_fingerprint(&mol, 2, 2048);
/// assert_eq!(tanimoto(&fp, &fp).unwrap(), 1.0);
/// ```
pub fn tanimoto(a: &Fingerprint, b: &Fingerprint) -> Result<f64> {
    similarity(a, b, Metric::Tanimoto)
}

pub fn dice(a: &Fingerprint, b: &Fingerprint) -> Result<f64> {
    similarity(a, b, Metric::Dice)
}

/// A candidate index with its similarity to a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub index: usize,
    pub score: f64,
}

impl Scored for SimilarityHit {
    fn score(&self) -> f64 {
        self.score
    }
}

fn scores(query: &Fingerprint, candidates: &[Fingerprint], metric: Metric) -> Vec<f64> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        candidates.par_iter().map(|c| metric.score(query, c)).collect()
    }
    #[cfg(not(feature = "parallel"))]
    candidates.iter().map(|c| metric.score(query, c)).collect()
}

/// Score every candidate against `query`, best first.
///
/// Equal scores keep candidate order.
pub fn bulk_similarity(
    query: &Fingerprint,
    candidates: &[Fingerprint],
    metric: Metric,
) -> Result<Vec<SimilarityHit>> {
    check_all(query, candidates)?;
    let mut hits: Vec<SimilarityHit> = scores(query, candidates, metric)
        .into_iter()
        .enumerate()
        .map(|(index, score)| SimilarityHit { index, score })
        .collect();
    // stable sort keeps candidate order among ties
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(hits)
}

/// The `k` best candidates scoring at least `min_score`.
pub fn nearest_neighbors(
    query: &Fingerprint,
    candidates: &[Fingerprint],
    metric: Metric,
    k: usize,
    min_score: f64,
) -> Result<Vec<SimilarityHit>> {
    let mut hits = bulk_similarity(query, candidates, metric)?;
    hits.retain(|h| h.score >= min_score);
    hits.truncate(k);
    Ok(hits)
}

/// Symmetric `n x n` matrix of pairwise similarities.
pub fn similarity_matrix(population: &[Fingerprint], metric: Metric) -> Result<Vec<Vec<f64>>> {
    let Some(first) = population.first() else {
        return Ok(Vec::new());
    };
    check_all(first, population)?;
    let n = population.len();

    #[cfg(feature = "parallel")]
    let upper: Vec<Vec<f64>> = {
        use rayon::prelude::*;
        (0..n)
            .into_par_iter()
            .map(|i| (i..n).map(|j| metric.score(&population[i], &population[j])).collect())
            .collect()
    };
    #[cfg(not(feature = "parallel"))]
    let upper: Vec<Vec<f64>> = (0..n)
        .map(|i| (i..n).map(|j| metric.score(&population[i], &population[j])).collect())
        .collect();

    let mut matrix = vec![vec![0.0; n]; n];
    for (i, row) in upper.into_iter().enumerate() {
        for (offset, s) in row.into_iter().enumerate() {
            let j = i + offset;
            matrix[i][j] = s;
            matrix[j][i] = s;
        }
    }
    Ok(matrix)
}

/// Disjoint-set forest with path halving and union by size.
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind { parent: (0..n).collect(), size: vec![1; n] }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}

/// Single-linkage clustering: members of a group are connected, directly or
/// transitively, by pairwise scores `>= threshold`.
///
/// Groups are ordered by their smallest member; members are ascending.
/// Every index appears in exactly one group.
pub fn cluster_by_similarity(
    population: &[Fingerprint],
    threshold: f64,
    metric: Metric,
) -> Result<Vec<Vec<usize>>> {
    let Some(first) = population.first() else {
        return Ok(Vec::new());
    };
    check_all(first, population)?;
    let n = population.len();

    let linked = |i: usize| -> Vec<(usize, usize)> {
        ((i + 1)..n)
            .filter(|&j| metric.score(&population[i], &population[j]) >= threshold)
            .map(|j| (i, j))
            .collect()
    };
    #[cfg(feature = "parallel")]
    let edges: Vec<(usize, usize)> = {
        use rayon::prelude::*;
        (0..n).into_par_iter().flat_map_iter(linked).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let edges: Vec<(usize, usize)> = (0..n).flat_map(linked).collect();

    let mut uf = UnionFind::new(n);
    for (a, b) in edges {
        uf.union(a, b);
    }

    let mut group_of_root = vec![usize::MAX; n];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for i in 0..n {
        let root = uf.find(i);
        if group_of_root[root] == usize::MAX {
            group_of_root[root] = groups.len();
            groups.push(Vec::new());
        }
        groups[group_of_root[root]].push(i);
    }
    Ok(groups)
}

/// A match returned by [`FingerprintIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch<'a, Id> {
    pub id: &'a Id,
    /// Insertion position in the index.
    pub index: usize,
    pub score: f64,
}

impl<Id> Scored for IndexMatch<'_, Id> {
    fn score(&self) -> f64 {
        self.score
    }
}

/// An in-memory, append-only similarity index over one fingerprint family.
///
/// ```
/// use molintake_chem::{parse_smiles, FingerprintIndex, FingerprintKind};
///
/// let mut index = FingerprintIndex::new(FingerprintKind::default());
/// index.add_molecule("ethanol", &parse_smiles("CCO").unwrap()).unwrap();
/// index.add_molecule("benzene", &parse_smiles("c1ccccc1").unwrap()).unwrap();
///
/// let query = FingerprintKind::default().compute(&parse_smiles("OCC").unwrap()).unwrap();
/// let hits = index.search(&query, 0.7, None).unwrap();
/// assert_eq!(*hits[0].id, "ethanol");
/// assert_eq!(hits.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct FingerprintIndex<Id> {
    kind: FingerprintKind,
    metric: Metric,
    ids: Vec<Id>,
    fingerprints: Vec<Fingerprint>,
}

impl<Id> FingerprintIndex<Id> {
    pub fn new(kind: FingerprintKind) -> Self {
        Self::with_metric(kind, Metric::default())
    }

    pub fn with_metric(kind: FingerprintKind, metric: Metric) -> Self {
        FingerprintIndex { kind, metric, ids: Vec::new(), fingerprints: Vec::new() }
    }

    pub fn kind(&self) -> FingerprintKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    fn check_kind(&self, fp: &Fingerprint) -> Result<()> {
        if fp.kind() != self.kind {
            return Err(IntakeError::IncompatibleFingerprints(format!(
                "index holds {} fingerprints, got {}",
                self.kind,
                fp.kind()
            )));
        }
        Ok(())
    }

    /// Append a fingerprint; returns its position.
    pub fn add(&mut self, id: Id, fingerprint: Fingerprint) -> Result<usize> {
        self.check_kind(&fingerprint)?;
        self.ids.push(id);
        self.fingerprints.push(fingerprint);
        Ok(self.fingerprints.len() - 1)
    }

    /// Fingerprint `mol` with the index's family and append it.
    pub fn add_molecule(&mut self, id: Id, mol: &Molecule) -> Result<usize> {
        let fp = self.kind.compute(mol)?;
        self.add(id, fp)
    }

    /// Append several fingerprints. Nothing is added if any has the wrong
    /// family.
    pub fn add_many(&mut self, entries: impl IntoIterator<Item = (Id, Fingerprint)>) -> Result<Vec<usize>> {
        let entries: Vec<(Id, Fingerprint)> = entries.into_iter().collect();
        entries.iter().try_for_each(|(_, fp)| self.check_kind(fp))?;
        let start = self.len();
        for (id, fp) in entries {
            self.ids.push(id);
            self.fingerprints.push(fp);
        }
        Ok((start..self.len()).collect())
    }

    /// Entries scoring at least `threshold`, best first, at most `top_n`.
    pub fn search(&self, query: &Fingerprint, threshold: f64, top_n: Option<usize>) -> Result<Vec<IndexMatch<'_, Id>>> {
        self.check_kind(query)?;
        let mut hits = bulk_similarity(query, &self.fingerprints, self.metric)?;
        hits.retain(|h| h.score >= threshold);
        if let Some(n) = top_n {
            hits.truncate(n);
        }
        Ok(hits
            .into_iter()
            .map(|h| IndexMatch { id: &self.ids[h.index], index: h.index, score: h.score })
            .collect())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::fingerprint::FingerprintKind;
    use proptest::prelude::*;

    fn fingerprint(on: &[usize]) -> Fingerprint {
        let mut fp = Fingerprint::new(FingerprintKind::Morgan { radius: 2, nbits: 256 });
        for &b in on {
            fp.set_bit(b);
        }
        fp
    }

    proptest! {
        #[test]
        fn scores_are_bounded_and_symmetric(
            a in prop::collection::vec(0usize..256, 0..40),
            b in prop::collection::vec(0usize..256, 0..40),
        ) {
            let (fa, fb) = (fingerprint(&a), fingerprint(&b));
            for metric in [Metric::Tanimoto, Metric::Dice] {
                let s = similarity(&fa, &fb, metric).unwrap();
                prop_assert!((0.0..=1.0).contains(&s));
                prop_assert_eq!(s, similarity(&fb, &fa, metric).unwrap());
            }
        }

        #[test]
        fn clusters_partition_the_population(
            sets in prop::collection::vec(prop::collection::vec(0usize..32, 1..6), 0..12),
            threshold in 0.0f64..1.0,
        ) {
            let pop: Vec<Fingerprint> = sets.iter().map(|s| fingerprint(s)).collect();
            let groups = cluster_by_similarity(&pop, threshold, Metric::Tanimoto).unwrap();
            let mut seen: Vec<usize> = groups.iter().flatten().copied().collect();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..pop.len()).collect::<Vec<_>>());
        }
    }
}
