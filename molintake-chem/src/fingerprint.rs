//! Molecular fingerprints: tagged bit vectors with compact encodings.
//!
//! Five families are provided, each identified by a [`FingerprintKind`] that
//! carries its parameters. Fingerprints are only comparable when their kinds
//! are equal; the similarity engine enforces this.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use molintake_core::hash::sha256;
use molintake_core::{ContentAddressable, ErrorCode, IntakeError, Result};

use crate::maccs::maccs_keys;
use crate::molecule::{BondOrder, Molecule};
use crate::ring::RingInfo;

/// Bit length of the MACCS key vector (keys 1-166, bit 0 unused).
pub const MACCS_BITS: usize = 167;

/// Largest supported Morgan radius.
pub const MAX_MORGAN_RADIUS: u32 = 6;

/// Longest supported path, in bonds.
pub const MAX_PATH_LENGTH: u32 = 7;

/// A fingerprint family together with its generation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum FingerprintKind {
    /// 166 structural keys.
    Maccs,
    /// Circular atom environments up to `radius` bonds, folded to `nbits`.
    Morgan { radius: u32, nbits: usize },
    /// Linear bond paths of `min_len..=max_len` bonds, folded to `nbits`.
    Path { min_len: u32, max_len: u32, nbits: usize },
    /// Pairs of heavy atoms with their topological distance.
    AtomPair { nbits: usize },
    /// Topological torsions: linear four-atom chains.
    Torsion { nbits: usize },
}

impl Default for FingerprintKind {
    fn default() -> Self {
        FingerprintKind::Morgan { radius: 2, nbits: 2048 }
    }
}

impl FingerprintKind {
    /// The default path fingerprint: 1-7 bonds into 2048 bits.
    pub const fn default_path() -> Self {
        FingerprintKind::Path { min_len: 1, max_len: 7, nbits: 2048 }
    }

    pub fn nbits(&self) -> usize {
        match *self {
            FingerprintKind::Maccs => MACCS_BITS,
            FingerprintKind::Morgan { nbits, .. }
            | FingerprintKind::Path { nbits, .. }
            | FingerprintKind::AtomPair { nbits }
            | FingerprintKind::Torsion { nbits } => nbits,
        }
    }

    /// Check parameters; errors are configuration errors.
    pub fn validate(&self) -> Result<()> {
        match *self {
            FingerprintKind::Maccs => Ok(()),
            FingerprintKind::Morgan { radius, nbits } => {
                if radius > MAX_MORGAN_RADIUS {
                    return Err(IntakeError::Config(format!(
                        "morgan radius {radius} exceeds {MAX_MORGAN_RADIUS}"
                    )));
                }
                if nbits == 0 {
                    return Err(IntakeError::Config("morgan bit length must be positive".into()));
                }
                Ok(())
            }
            FingerprintKind::Path { min_len, max_len, nbits } => {
                if min_len == 0 || min_len > max_len || max_len > MAX_PATH_LENGTH {
                    return Err(IntakeError::Config(format!(
                        "path lengths {min_len}..={max_len} outside 1..={MAX_PATH_LENGTH}"
                    )));
                }
                if nbits == 0 {
                    return Err(IntakeError::Config("path bit length must be positive".into()));
                }
                Ok(())
            }
            FingerprintKind::AtomPair { nbits } | FingerprintKind::Torsion { nbits } => {
                if nbits == 0 {
                    return Err(IntakeError::Config(format!("{self} bit length must be positive")));
                }
                Ok(())
            }
        }
    }

    /// Compute a fingerprint of this kind.
    pub fn compute(&self, mol: &Molecule) -> Result<Fingerprint> {
        self.validate().map_err(|e| {
            IntakeError::computation(ErrorCode::FingerprintCalculationFailed, e.to_string())
                .with_detail("family", self)
        })?;
        Ok(match *self {
            FingerprintKind::Maccs => maccs_keys(mol),
            FingerprintKind::Morgan { radius, nbits } => morgan_fingerprint(mol, radius, nbits),
            FingerprintKind::Path { min_len, max_len, nbits } => path_fingerprint(mol, min_len, max_len, nbits),
            FingerprintKind::AtomPair { nbits } => atom_pair_fingerprint(mol, nbits),
            FingerprintKind::Torsion { nbits } => torsion_fingerprint(mol, nbits),
        })
    }
}

impl fmt::Display for FingerprintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FingerprintKind::Maccs => f.write_str("maccs"),
            FingerprintKind::Morgan { radius, nbits } => write!(f, "morgan_r{radius}_{nbits}"),
            FingerprintKind::Path { min_len, max_len, nbits } => {
                write!(f, "path_{min_len}_{max_len}_{nbits}")
            }
            FingerprintKind::AtomPair { nbits } => write!(f, "atom_pair_{nbits}"),
            FingerprintKind::Torsion { nbits } => write!(f, "torsion_{nbits}"),
        }
    }
}

/// A fixed-size bit vector tagged with its family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "EncodedFingerprint", try_from = "EncodedFingerprint")]
pub struct Fingerprint {
    kind: FingerprintKind,
    words: Vec<u64>,
}

impl Fingerprint {
    /// An all-zero fingerprint of the given kind.
    pub fn new(kind: FingerprintKind) -> Self {
        Fingerprint {
            kind,
            words: vec![0u64; kind.nbits().div_ceil(64)],
        }
    }

    pub fn kind(&self) -> FingerprintKind {
        self.kind
    }

    pub fn nbits(&self) -> usize {
        self.kind.nbits()
    }

    /// Set a bit; positions wrap modulo the bit length.
    pub fn set_bit(&mut self, pos: usize) {
        let nbits = self.nbits();
        if nbits == 0 {
            return;
        }
        let pos = pos % nbits;
        self.words[pos / 64] |= 1u64 << (pos % 64);
    }

    pub fn get_bit(&self, pos: usize) -> bool {
        pos < self.nbits() && (self.words[pos / 64] >> (pos % 64)) & 1 == 1
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// No bit set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Indices of set bits, ascending.
    pub fn on_bits(&self) -> Vec<usize> {
        (0..self.nbits()).filter(|&i| self.get_bit(i)).collect()
    }

    /// Number of bits set in both.
    pub(crate) fn and_count(&self, other: &Fingerprint) -> u32 {
        self.words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| (a & b).count_ones())
            .sum()
    }

    /// Packed bytes, bit `i` at byte `i / 8`, position `i % 8` (LSB first).
    pub fn to_bytes(&self) -> Vec<u8> {
        let nbytes = self.nbits().div_ceil(8);
        self.words
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .take(nbytes)
            .collect()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex_string(&self.to_bytes())
    }

    /// Rebuild a fingerprint from [`to_base64`](Self::to_base64) output.
    ///
    /// The byte length must match the kind and no bit past the end may be
    /// set.
    pub fn from_base64(kind: FingerprintKind, text: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| IntakeError::InvalidInput(format!("fingerprint is not valid base64: {e}")))?;
        Self::from_bytes(kind, &bytes)
    }

    pub fn from_bytes(kind: FingerprintKind, bytes: &[u8]) -> Result<Self> {
        let nbits = kind.nbits();
        let expected = nbits.div_ceil(8);
        if bytes.len() != expected {
            return Err(IntakeError::InvalidInput(format!(
                "{kind} fingerprint needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        let mut fp = Fingerprint::new(kind);
        for (i, &byte) in bytes.iter().enumerate() {
            for bit in 0..8 {
                if byte >> bit & 1 == 1 {
                    let pos = i * 8 + bit;
                    if pos >= nbits {
                        return Err(IntakeError::InvalidInput(format!(
                            "{kind} fingerprint has bit {pos} set beyond its length"
                        )));
                    }
                    fp.set_bit(pos);
                }
            }
        }
        Ok(fp)
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl ContentAddressable for Fingerprint {
    fn content_hash(&self) -> String {
        let mut data = self.kind.to_string().into_bytes();
        data.push(0);
        data.extend(self.to_bytes());
        sha256(&data)
    }
}

/// Serialized shape of a fingerprint: its kind plus base64 bits.
#[derive(Serialize, Deserialize)]
struct EncodedFingerprint {
    kind: FingerprintKind,
    bits: String,
}

impl From<Fingerprint> for EncodedFingerprint {
    fn from(fp: Fingerprint) -> Self {
        EncodedFingerprint {
            bits: fp.to_base64(),
            kind: fp.kind,
        }
    }
}

impl TryFrom<EncodedFingerprint> for Fingerprint {
    type Error = IntakeError;

    fn try_from(encoded: EncodedFingerprint) -> Result<Self> {
        Fingerprint::from_base64(encoded.kind, &encoded.bits)
    }
}

// FNV-1a for deterministic, platform-independent hashing
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a_update(hash: u64, value: u64) -> u64 {
    let mut h = hash;
    for b in value.to_le_bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

fn fold_hash(hash: u64, nbits: usize) -> usize {
    (hash % nbits as u64) as usize
}

fn bond_code(order: BondOrder) -> u64 {
    match order {
        BondOrder::Single => 1,
        BondOrder::Double => 2,
        BondOrder::Triple => 3,
        BondOrder::Aromatic => 4,
    }
}

/// Morgan (ECFP-like) fingerprint.
///
/// `radius` controls the neighborhood size (2 = ECFP4, 3 = ECFP6).
pub fn morgan_fingerprint(mol: &Molecule, radius: u32, nbits: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(FingerprintKind::Morgan { radius, nbits });
    let n = mol.atom_count();
    if n == 0 || nbits == 0 {
        return fp;
    }
    let rings = RingInfo::perceive(mol);

    let mut identifiers: Vec<u64> = mol
        .atoms
        .iter()
        .enumerate()
        .map(|(i, atom)| {
            [
                atom.atomic_number as u64,
                mol.heavy_degree(i) as u64,
                atom.implicit_hydrogens as u64,
                atom.formal_charge as i64 as u64,
                rings.atom_in_ring(i) as u64,
                atom.is_aromatic as u64,
                atom.isotope.unwrap_or(0) as u64,
            ]
            .into_iter()
            .fold(FNV_OFFSET, fnv1a_update)
        })
        .collect();
    for &id in &identifiers {
        fp.set_bit(fold_hash(id, nbits));
    }

    for round in 0..radius {
        let next: Vec<u64> = (0..n)
            .map(|i| {
                let mut neighbor_ids: Vec<(u64, u64)> = mol.adjacency[i]
                    .iter()
                    .map(|&(nb, bi)| (bond_code(mol.bonds[bi].order), identifiers[nb]))
                    .collect();
                neighbor_ids.sort_unstable();
                let mut h = fnv1a_update(FNV_OFFSET, round as u64 + 1);
                h = fnv1a_update(h, identifiers[i]);
                for (bond, id) in neighbor_ids {
                    h = fnv1a_update(fnv1a_update(h, bond), id);
                }
                h
            })
            .collect();
        for &id in &next {
            fp.set_bit(fold_hash(id, nbits));
        }
        identifiers = next;
    }
    fp
}

/// Path fingerprint over all simple bond paths of `min_len..=max_len`
/// bonds.
///
/// Each path is hashed from whichever direction gives the smaller label
/// sequence, so both traversals of a path set the same bit.
pub fn path_fingerprint(mol: &Molecule, min_len: u32, max_len: u32, nbits: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(FingerprintKind::Path { min_len, max_len, nbits });
    if nbits == 0 || min_len == 0 {
        return fp;
    }
    let labels: Vec<u64> = mol
        .atoms
        .iter()
        .map(|a| (a.atomic_number as u64) << 1 | a.is_aromatic as u64)
        .collect();

    let mut on_path = vec![false; mol.atom_count()];
    let mut atoms: Vec<usize> = Vec::new();
    let mut bonds: Vec<usize> = Vec::new();
    for start in 0..mol.atom_count() {
        atoms.push(start);
        on_path[start] = true;
        extend_paths(mol, &labels, min_len as usize, max_len as usize, &mut atoms, &mut bonds, &mut on_path, &mut fp);
        on_path[start] = false;
        atoms.pop();
    }
    fp
}

#[allow(clippy::too_many_arguments)]
fn extend_paths(
    mol: &Molecule,
    labels: &[u64],
    min_len: usize,
    max_len: usize,
    atoms: &mut Vec<usize>,
    bonds: &mut Vec<usize>,
    on_path: &mut [bool],
    fp: &mut Fingerprint,
) {
    if bonds.len() >= min_len {
        let nbits = fp.nbits();
        fp.set_bit(fold_hash(path_hash(mol, labels, atoms, bonds), nbits));
    }
    if bonds.len() == max_len {
        return;
    }
    let Some(&tail) = atoms.last() else {
        return;
    };
    for &(nb, bi) in &mol.adjacency[tail] {
        if on_path[nb] {
            continue;
        }
        on_path[nb] = true;
        atoms.push(nb);
        bonds.push(bi);
        extend_paths(mol, labels, min_len, max_len, atoms, bonds, on_path, fp);
        bonds.pop();
        atoms.pop();
        on_path[nb] = false;
    }
}

fn path_hash(mol: &Molecule, labels: &[u64], atoms: &[usize], bonds: &[usize]) -> u64 {
    let mut forward = Vec::with_capacity(atoms.len() + bonds.len());
    for (i, &a) in atoms.iter().enumerate() {
        forward.push(labels[a]);
        if let Some(&bi) = bonds.get(i) {
            forward.push(100 + bond_code(mol.bonds[bi].order));
        }
    }
    let backward: Vec<u64> = forward.iter().rev().copied().collect();
    let sequence = if backward < forward { backward } else { forward };
    let seed = fnv1a_update(FNV_OFFSET, bonds.len() as u64);
    sequence.into_iter().fold(seed, fnv1a_update)
}

/// Longest topological distance an atom pair encodes; farther pairs share
/// this bucket.
pub const MAX_PAIR_DISTANCE: usize = 30;

/// Atom code shared by the atom-pair and torsion families: element, heavy
/// neighbours (less `branch_offset`), pi electrons and aromaticity.
fn topological_atom_code(mol: &Molecule, atom: usize, branch_offset: usize) -> u64 {
    let a = &mol.atoms[atom];
    let pi: u64 = mol.adjacency[atom]
        .iter()
        .map(|&(_, bi)| match mol.bonds[bi].order {
            BondOrder::Double => 1,
            BondOrder::Triple => 2,
            _ => 0,
        })
        .sum();
    let branches = mol.heavy_degree(atom).saturating_sub(branch_offset) as u64;
    [a.atomic_number as u64, branches.min(7), pi.min(3), a.is_aromatic as u64]
        .into_iter()
        .fold(FNV_OFFSET, fnv1a_update)
}

/// Bond-count distances from `start` to every atom; `usize::MAX` when
/// unreachable.
fn topological_distances(mol: &Molecule, start: usize) -> Vec<usize> {
    let mut dist = vec![usize::MAX; mol.atom_count()];
    let mut queue = std::collections::VecDeque::from([start]);
    dist[start] = 0;
    while let Some(a) = queue.pop_front() {
        for &(nb, _) in &mol.adjacency[a] {
            if dist[nb] == usize::MAX {
                dist[nb] = dist[a] + 1;
                queue.push_back(nb);
            }
        }
    }
    dist
}

/// Hashed atom-pair fingerprint.
///
/// Every pair of connected heavy atoms contributes one bit from the two atom
/// codes (in sorted order) and the shortest-path distance between them.
pub fn atom_pair_fingerprint(mol: &Molecule, nbits: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(FingerprintKind::AtomPair { nbits });
    if nbits == 0 {
        return fp;
    }
    let heavy: Vec<usize> = (0..mol.atom_count()).filter(|&i| !mol.atoms[i].is_hydrogen()).collect();
    let codes: Vec<u64> = (0..mol.atom_count()).map(|i| topological_atom_code(mol, i, 0)).collect();
    for (k, &i) in heavy.iter().enumerate() {
        let dist = topological_distances(mol, i);
        for &j in &heavy[k + 1..] {
            if dist[j] == usize::MAX {
                continue;
            }
            let (lo, hi) = if codes[i] <= codes[j] { (codes[i], codes[j]) } else { (codes[j], codes[i]) };
            let d = dist[j].min(MAX_PAIR_DISTANCE) as u64;
            let h = [lo, d, hi].into_iter().fold(FNV_OFFSET, fnv1a_update);
            fp.set_bit(fold_hash(h, nbits));
        }
    }
    fp
}

/// Hashed topological-torsion fingerprint over linear chains of four heavy
/// atoms. End atoms are coded with one branch removed, inner atoms with two,
/// and each chain is hashed from its smaller end.
pub fn torsion_fingerprint(mol: &Molecule, nbits: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(FingerprintKind::Torsion { nbits });
    if nbits == 0 {
        return fp;
    }
    let heavy_neighbors = |a: usize| {
        mol.adjacency[a]
            .iter()
            .map(|&(nb, _)| nb)
            .filter(move |&nb| !mol.atoms[nb].is_hydrogen())
    };
    for b in 0..mol.atom_count() {
        if mol.atoms[b].is_hydrogen() {
            continue;
        }
        for c in heavy_neighbors(b) {
            // each central bond once
            if c < b {
                continue;
            }
            for a in heavy_neighbors(b).filter(|&a| a != c) {
                for d in heavy_neighbors(c).filter(|&d| d != b && d != a) {
                    let forward = [
                        topological_atom_code(mol, a, 1),
                        topological_atom_code(mol, b, 2),
                        topological_atom_code(mol, c, 2),
                        topological_atom_code(mol, d, 1),
                    ];
                    let mut backward = forward;
                    backward.reverse();
                    let chain = if backward < forward { backward } else { forward };
                    let h = chain.into_iter().fold(fnv1a_update(FNV_OFFSET, 4), fnv1a_update);
                    fp.set_bit(fold_hash(h, nbits));
                }
            }
        }
    }
    fp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn morgan(smiles: &str) -> Fingerprint {
        morgan_fingerprint(&parse_smiles(smiles).unwrap(), 2, 2048)
    }

    #[test]
    fn bit_operations() {
        let mut fp = Fingerprint::new(FingerprintKind::Morgan { radius: 2, nbits: 128 });
        assert!(!fp.get_bit(42));
        fp.set_bit(42);
        assert!(fp.get_bit(42));
        fp.set_bit(100);
        assert_eq!(fp.count_ones(), 2);
        assert_eq!(fp.on_bits(), vec![42, 100]);
        assert!(!fp.get_bit(500));
    }

    #[test]
    fn kinds_know_their_length() {
        assert_eq!(FingerprintKind::Maccs.nbits(), 167);
        assert_eq!(FingerprintKind::default().nbits(), 2048);
        assert_eq!(FingerprintKind::default().to_string(), "morgan_r2_2048");
        assert_eq!(FingerprintKind::default_path().to_string(), "path_1_7_2048");
    }

    #[test]
    fn kind_validation() {
        assert!(FingerprintKind::Morgan { radius: 7, nbits: 2048 }.validate().is_err());
        assert!(FingerprintKind::Morgan { radius: 2, nbits: 0 }.validate().is_err());
        assert!(FingerprintKind::Path { min_len: 0, max_len: 3, nbits: 64 }.validate().is_err());
        assert!(FingerprintKind::Path { min_len: 4, max_len: 3, nbits: 64 }.validate().is_err());
        assert!(FingerprintKind::default_path().validate().is_ok());
    }

    #[test]
    fn invalid_kind_fails_computation() {
        let mol = parse_smiles("CCO").unwrap();
        let err = FingerprintKind::Morgan { radius: 9, nbits: 64 }.compute(&mol).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FingerprintCalculationFailed);
    }

    #[test]
    fn morgan_is_deterministic() {
        let a = morgan("CCO");
        let b = morgan("CCO");
        assert_eq!(a, b);
        assert_eq!(a.content_hash(), b.content_hash());
        assert!(a.count_ones() > 0);
    }

    #[test]
    fn path_fingerprint_is_orientation_independent() {
        let a = path_fingerprint(&parse_smiles("CCO").unwrap(), 1, 7, 1024);
        let b = path_fingerprint(&parse_smiles("OCC").unwrap(), 1, 7, 1024);
        assert_eq!(a, b);
        // C-C, C-O, C-C-O
        assert_eq!(a.count_ones(), 3);
    }

    #[test]
    fn path_lengths_are_respected() {
        let mol = parse_smiles("CCCC").unwrap();
        let short = path_fingerprint(&mol, 1, 1, 4096);
        let long = path_fingerprint(&mol, 1, 3, 4096);
        assert_eq!(short.count_ones(), 1);
        assert!(long.count_ones() > short.count_ones());
    }

    #[test]
    fn base64_round_trip() {
        let fp = morgan("CC(=O)Oc1ccccc1C(=O)O");
        let text = fp.to_base64();
        let back = Fingerprint::from_base64(fp.kind(), &text).unwrap();
        assert_eq!(back, fp);
        assert_eq!(back.on_bits(), fp.on_bits());
    }

    #[test]
    fn bytes_are_lsb_first() {
        let mut fp = Fingerprint::new(FingerprintKind::Morgan { radius: 1, nbits: 16 });
        fp.set_bit(0);
        fp.set_bit(9);
        assert_eq!(fp.to_bytes(), vec![0b0000_0001, 0b0000_0010]);
        assert_eq!(fp.to_hex(), "0102");
    }

    #[test]
    fn decoding_checks_length() {
        let err = Fingerprint::from_base64(FingerprintKind::Maccs, "AAAA").unwrap_err();
        assert!(matches!(err, IntakeError::InvalidInput(_)));
        assert!(Fingerprint::from_base64(FingerprintKind::Maccs, "not base64!").is_err());
    }

    #[test]
    fn decoding_rejects_padding_bits() {
        // 167 bits use 21 bytes; the top bit of the last byte is past the end
        let mut bytes = vec![0u8; 21];
        bytes[20] = 0x80;
        assert!(Fingerprint::from_bytes(FingerprintKind::Maccs, &bytes).is_err());
    }

    #[test]
    fn atom_pair_counts_distinct_pairs() {
        let kind = FingerprintKind::AtomPair { nbits: 4096 };
        let mol = parse_smiles("CCO").unwrap();
        let fp = kind.compute(&mol).unwrap();
        // C-C (1), C-O (1), C..O (2): three distinct pair codes
        assert_eq!(fp.count_ones(), 3);
        assert_eq!(fp, kind.compute(&parse_smiles("OCC").unwrap()).unwrap());
        assert_eq!(kind.to_string(), "atom_pair_4096");
    }

    #[test]
    fn atom_pair_skips_disconnected_pairs() {
        let joined = atom_pair_fingerprint(&parse_smiles("CC.O").unwrap(), 4096);
        assert_eq!(joined.count_ones(), 1);
    }

    #[test]
    fn torsion_needs_four_atoms() {
        let kind = FingerprintKind::Torsion { nbits: 2048 };
        assert!(kind.compute(&parse_smiles("CCO").unwrap()).unwrap().is_empty());
        let butanol = kind.compute(&parse_smiles("CCCO").unwrap()).unwrap();
        assert_eq!(butanol.count_ones(), 1);
        assert_eq!(butanol, kind.compute(&parse_smiles("OCCC").unwrap()).unwrap());
        assert!(kind.compute(&parse_smiles("c1ccccc1").unwrap()).unwrap().count_ones() >= 1);
    }

    #[test]
    fn new_families_round_trip_and_validate() {
        let mol = parse_smiles("CC(=O)Oc1ccccc1C(=O)O").unwrap();
        for kind in [FingerprintKind::AtomPair { nbits: 2048 }, FingerprintKind::Torsion { nbits: 1024 }] {
            let fp = kind.compute(&mol).unwrap();
            assert!(fp.count_ones() > 0);
            let back = Fingerprint::from_base64(kind, &fp.to_base64()).unwrap();
            assert_eq!(back, fp);
            let json = serde_json::to_string(&fp).unwrap();
            assert_eq!(serde_json::from_str::<Fingerprint>(&json).unwrap(), fp);
        }
        assert!(FingerprintKind::AtomPair { nbits: 0 }.validate().is_err());
        assert!(FingerprintKind::Torsion { nbits: 0 }.validate().is_err());
        let json = serde_json::to_string(&FingerprintKind::AtomPair { nbits: 64 }).unwrap();
        assert_eq!(json, r#"{"family":"atom_pair","nbits":64}"#);
    }

    #[test]
    fn serde_uses_compact_form() {
        let fp = morgan("CCO");
        let json = serde_json::to_string(&fp).unwrap();
        assert!(json.contains("\"family\":\"morgan\""));
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
    }
}
