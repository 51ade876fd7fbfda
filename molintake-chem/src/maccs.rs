//! MACCS 166-key structural fingerprints.
//!
//! Each bit position corresponds to one structural key: element presence,
//! ring topology, bond types, small functional-group patterns and count
//! thresholds. Keys are evaluated directly on the molecular graph with a
//! handful of pattern helpers (bonded pairs, centers with a required set of
//! neighbors, and linear atom paths). Keys that need full SMARTS semantics
//! beyond these helpers stay unset.

use std::collections::BTreeSet;

use crate::fingerprint::{Fingerprint, FingerprintKind};
use crate::molecule::{BondOrder, Molecule};
use crate::ring::RingInfo;

const C: u8 = 6;
const N: u8 = 7;
const O: u8 = 8;
const F: u8 = 9;
const SI: u8 = 14;
const P: u8 = 15;
const S: u8 = 16;
const CL: u8 = 17;
const BR: u8 = 35;
const I: u8 = 53;

/// Atom classes used by key patterns.
#[derive(Debug, Clone, Copy)]
enum Q {
    /// Any atom.
    A,
    El(u8),
    /// Anything except carbon and hydrogen.
    Het,
    /// Heteroatom carrying at least one hydrogen.
    HetH,
    /// F, Cl, Br or I.
    X,
    Ch2,
    Ch3,
}

struct Keys<'a> {
    mol: &'a Molecule,
    rings: RingInfo,
    counts: [u32; 128],
}

impl<'a> Keys<'a> {
    fn new(mol: &'a Molecule) -> Self {
        let mut counts = [0u32; 128];
        for atom in &mol.atoms {
            counts[(atom.atomic_number as usize).min(127)] += 1;
        }
        Keys { mol, rings: RingInfo::perceive(mol), counts }
    }

    fn z(&self, i: usize) -> u8 {
        self.mol.atoms[i].atomic_number
    }

    fn h(&self, i: usize) -> u8 {
        self.mol.atoms[i].implicit_hydrogens
    }

    fn is(&self, i: usize, q: Q) -> bool {
        let z = self.z(i);
        match q {
            Q::A => true,
            Q::El(e) => z == e,
            Q::Het => z != C && z != 1,
            Q::HetH => z != C && z != 1 && self.h(i) > 0,
            Q::X => matches!(z, F | CL | BR | I),
            Q::Ch2 => z == C && self.h(i) == 2,
            Q::Ch3 => z == C && self.h(i) == 3,
        }
    }

    fn has(&self, z: u8) -> bool {
        self.counts[z as usize] > 0
    }

    fn has_any(&self, elements: &[u8]) -> bool {
        elements.iter().any(|&z| self.has(z))
    }

    fn count_atoms(&self, q: Q) -> usize {
        (0..self.mol.atom_count()).filter(|&i| self.is(i, q)).count()
    }

    /// Bonds joining a `a` atom to a `b` atom, optionally of one order.
    fn count_bonds(&self, a: Q, b: Q, order: Option<BondOrder>) -> usize {
        self.mol
            .bonds
            .iter()
            .filter(|bond| order.map_or(true, |o| bond.order == o))
            .filter(|bond| {
                (self.is(bond.atom1, a) && self.is(bond.atom2, b))
                    || (self.is(bond.atom1, b) && self.is(bond.atom2, a))
            })
            .count()
    }

    fn has_bond(&self, a: Q, b: Q, order: Option<BondOrder>) -> bool {
        self.count_bonds(a, b, order) > 0
    }

    /// Some `center` atom has distinct neighbors matching every query.
    fn has_center(&self, center: Q, around: &[Q]) -> bool {
        (0..self.mol.atom_count()).any(|i| {
            if !self.is(i, center) {
                return false;
            }
            let neighbors: Vec<usize> = self.mol.neighbors(i).collect();
            let mut used = vec![false; neighbors.len()];
            self.assign(&neighbors, around, &mut used)
        })
    }

    fn assign(&self, neighbors: &[usize], queries: &[Q], used: &mut [bool]) -> bool {
        let Some((&first, rest)) = queries.split_first() else {
            return true;
        };
        for (k, &nb) in neighbors.iter().enumerate() {
            if used[k] || !self.is(nb, first) {
                continue;
            }
            used[k] = true;
            let found = self.assign(neighbors, rest, used);
            used[k] = false;
            if found {
                return true;
            }
        }
        false
    }

    /// Distinct atom sets forming a simple path that matches `pattern` in
    /// order.
    fn count_paths(&self, pattern: &[Q]) -> usize {
        let mut seen = BTreeSet::new();
        let mut path = Vec::with_capacity(pattern.len());
        for start in 0..self.mol.atom_count() {
            if pattern.first().is_some_and(|&q| self.is(start, q)) {
                path.push(start);
                self.walk(pattern, &mut path, &mut seen);
                path.pop();
            }
        }
        seen.len()
    }

    fn walk(&self, pattern: &[Q], path: &mut Vec<usize>, seen: &mut BTreeSet<Vec<usize>>) {
        if path.len() == pattern.len() {
            let mut key = path.clone();
            key.sort_unstable();
            seen.insert(key);
            return;
        }
        let Some(&tail) = path.last() else {
            return;
        };
        let next = pattern[path.len()];
        for nb in self.mol.neighbors(tail) {
            if !path.contains(&nb) && self.is(nb, next) {
                path.push(nb);
                self.walk(pattern, path, seen);
                path.pop();
            }
        }
    }

    fn has_path(&self, pattern: &[Q]) -> bool {
        self.count_paths(pattern) > 0
    }

    fn ring_of_size(&self, pred: impl Fn(usize) -> bool) -> usize {
        self.rings.rings.iter().filter(|r| pred(r.len())).count()
    }

    fn ring_with(&self, size: Option<usize>, q: Q) -> bool {
        self.rings
            .rings
            .iter()
            .filter(|r| size.map_or(true, |s| r.len() == s))
            .any(|r| r.iter().any(|&a| self.is(a, q)))
    }

    /// A chain (non-ring) bond joins a ring atom to a `q` atom.
    fn ring_substituent(&self, q: Q) -> usize {
        self.mol
            .bonds
            .iter()
            .enumerate()
            .filter(|&(bi, _)| !self.rings.bond_in_ring(bi))
            .filter(|(_, b)| {
                (self.rings.atom_in_ring(b.atom1) && self.is(b.atom2, q))
                    || (self.rings.atom_in_ring(b.atom2) && self.is(b.atom1, q))
            })
            .count()
    }

    /// A `c` atom double bonded to a `d` atom that has further neighbors
    /// matching `rest`.
    fn double_bond_center(&self, c: Q, d: Q, rest: &[Q]) -> bool {
        self.mol.bonds.iter().filter(|b| b.order == BondOrder::Double).any(|b| {
            [(b.atom1, b.atom2), (b.atom2, b.atom1)].into_iter().any(|(x, y)| {
                if !self.is(x, c) || !self.is(y, d) {
                    return false;
                }
                let others: Vec<usize> = self.mol.neighbors(y).filter(|&nb| nb != x).collect();
                let mut used = vec![false; others.len()];
                self.assign(&others, rest, &mut used)
            })
        })
    }
}

/// Compute the 166-key MACCS fingerprint (bit `k` is key `k`; bit 0 unused).
///
/// # Example
///
/// ```
/// use molintake_chem::{parse_smiles, maccs_keys};
///
/// let aspirin = parse_smiles("CC(=O)Oc1ccccc1C(=O)O").unwrap();
/// let fp = maccs_keys(&aspirin);
/// assert!(fp.get_bit(154)); // C=O
/// assert!(fp.get_bit(162)); // aromatic
/// ```
pub fn maccs_keys(mol: &Molecule) -> Fingerprint {
    let mut fp = Fingerprint::new(FingerprintKind::Maccs);
    if mol.is_empty() {
        return fp;
    }
    let k = Keys::new(mol);
    let mut set = |key: usize, on: bool| {
        if on {
            fp.set_bit(key);
        }
    };

    set_element_keys(&k, &mut set);
    set_ring_keys(&k, &mut set);
    set_bond_keys(&k, &mut set);
    set_group_keys(&k, &mut set);
    set_count_keys(&k, &mut set);
    fp
}

fn set_element_keys(k: &Keys, set: &mut impl FnMut(usize, bool)) {
    set(2, k.counts[104..].iter().any(|&c| c > 0));
    set(3, k.has_any(&[32, 33, 34, 50, 51, 52, 82, 83, 84]));
    set(4, (89..=103).any(|z| k.has(z)));
    set(5, k.has_any(&[21, 22, 39, 40, 72]));
    set(6, (57..=71).any(|z| k.has(z)));
    set(7, k.has_any(&[23, 24, 25, 41, 42, 43, 73, 74, 75]));
    set(9, k.has_any(&[26, 27, 28, 44, 45, 46, 76, 77, 78]));
    set(10, k.has_any(&[4, 12, 20, 38, 56, 88]));
    set(12, k.has_any(&[29, 30, 47, 48, 79, 80]));
    set(18, k.has_any(&[5, 13, 31, 49, 81]));
    set(20, k.has(SI));
    set(27, k.has(I));
    set(29, k.has(P));
    set(35, k.has_any(&[3, 11, 19, 37, 55, 87]));
    set(42, k.has(F));
    set(44, {
        let common = [1, C, N, O, F, SI, P, S, CL, BR, I];
        k.mol.atoms.iter().any(|a| !common.contains(&a.atomic_number))
    });
    set(46, k.has(BR));
    set(49, k.mol.atoms.iter().any(|a| a.formal_charge != 0));
    set(88, k.has(S));
    set(103, k.has(CL));
    set(134, k.count_atoms(Q::X) > 0);
    set(161, k.has(N));
    set(162, k.mol.atoms.iter().any(|a| a.is_aromatic));
    set(164, k.has(O));
}

fn set_ring_keys(k: &Keys, set: &mut impl FnMut(usize, bool)) {
    set(8, k.ring_with(Some(4), Q::Het));
    set(11, k.ring_of_size(|s| s == 4) > 0);
    set(16, k.ring_with(Some(3), Q::Het));
    set(19, k.ring_of_size(|s| s == 7) > 0);
    set(22, k.ring_of_size(|s| s == 3) > 0);
    set(36, k.ring_with(None, Q::El(S)));
    set(57, k.ring_with(None, Q::El(O)));
    set(83, k.ring_with(Some(5), Q::Het));
    set(96, k.ring_of_size(|s| s == 5) > 0);
    set(98, k.ring_with(Some(6), Q::Het));
    set(101, k.ring_of_size(|s| s >= 8) > 0);
    set(105, (0..k.mol.atom_count()).any(|i| {
        k.mol.adjacency[i].iter().filter(|&&(_, bi)| k.rings.bond_in_ring(bi)).count() >= 3
    }));
    set(120, (0..k.mol.atom_count()).filter(|&i| k.rings.atom_in_ring(i) && k.is(i, Q::Het)).count() > 1);
    set(121, k.ring_with(None, Q::El(N)));
    set(125, k.rings.rings.iter().filter(|r| r.iter().all(|&a| k.mol.atoms[a].is_aromatic)).count() > 1);
    set(137, k.ring_with(None, Q::Het));
    set(145, k.ring_of_size(|s| s == 6) > 1);
    set(163, k.ring_of_size(|s| s == 6) > 0);
    set(165, k.rings.num_rings() > 0);

    // substituents on ring atoms through chain bonds
    set(62, k.ring_substituent(Q::A) > 0 && k.mol.bonds.iter().enumerate().any(|(bi, b)| {
        !k.rings.bond_in_ring(bi) && k.rings.atom_in_ring(b.atom1) && k.rings.atom_in_ring(b.atom2)
    }));
    set(64, k.ring_substituent(Q::El(S)) > 0);
    set(87, k.ring_substituent(Q::X) > 0);
    set(127, k.ring_substituent(Q::El(O)) > 1);
    set(133, k.ring_substituent(Q::El(N)) > 0);
    set(143, k.ring_substituent(Q::El(O)) > 0);
    set(75, (0..k.mol.atom_count()).any(|i| {
        k.is(i, Q::El(N))
            && k.rings.atom_in_ring(i)
            && k.mol.adjacency[i].iter().any(|&(_, bi)| !k.rings.bond_in_ring(bi))
    }));
    set(150, k.mol.bonds.iter().enumerate().any(|(bi, b)| {
        let chain_branch = |a: usize| k.mol.adjacency[a].iter().any(|&(_, x)| !k.rings.bond_in_ring(x));
        k.rings.bond_in_ring(bi) && chain_branch(b.atom1) && chain_branch(b.atom2)
    }));
}

fn set_bond_keys(k: &Keys, set: &mut impl FnMut(usize, bool)) {
    use BondOrder::{Aromatic, Double, Single, Triple};

    set(14, k.has_bond(Q::El(S), Q::El(S), Some(Single)));
    set(17, k.has_bond(Q::El(C), Q::El(C), Some(Triple)));
    set(24, k.has_bond(Q::El(N), Q::El(O), Some(Single)));
    set(31, k.has_bond(Q::Het, Q::X, None));
    set(33, k.has_bond(Q::El(N), Q::El(S), None));
    set(34, k.has_bond(Q::Ch2, Q::A, Some(Double)));
    set(40, k.has_bond(Q::El(S), Q::El(O), Some(Single)));
    set(41, k.has_bond(Q::El(C), Q::El(N), Some(Triple)));
    set(52, k.has_bond(Q::El(N), Q::El(N), None));
    set(60, k.has_bond(Q::El(S), Q::El(O), Some(Double)));
    set(63, k.has_bond(Q::El(N), Q::El(O), Some(Double)));
    set(65, k.has_bond(Q::El(C), Q::El(N), Some(Aromatic)));
    set(67, k.has_bond(Q::Het, Q::El(S), None));
    set(68, k.has_bond(Q::HetH, Q::HetH, None));
    set(69, k.has_bond(Q::Het, Q::HetH, None));
    set(71, k.has_bond(Q::El(N), Q::El(O), None));
    set(73, k.has_bond(Q::El(S), Q::A, Some(Double)));
    set(78, k.has_bond(Q::El(C), Q::El(N), Some(Double)));
    set(94, k.has_bond(Q::Het, Q::El(N), None));
    set(99, k.has_bond(Q::El(C), Q::El(C), Some(Double)));
    set(102, k.has_bond(Q::Het, Q::El(O), None));
    set(119, k.has_bond(Q::El(N), Q::A, Some(Double)));
    set(124, k.has_bond(Q::Het, Q::Het, None));
    set(130, k.count_bonds(Q::Het, Q::Het, None) > 1);
    set(136, k.count_bonds(Q::El(O), Q::A, Some(Double)) > 1);
    set(154, k.has_bond(Q::El(C), Q::El(O), Some(Double)));
    set(157, k.has_bond(Q::El(C), Q::El(O), Some(Single)));
    set(158, k.has_bond(Q::El(C), Q::El(N), Some(Single)));

    set(21, k.double_bond_center(Q::El(C), Q::El(C), &[Q::Het, Q::Het]));
    set(45, k.double_bond_center(Q::El(C), Q::El(C), &[Q::El(N)]));
    set(50, k.double_bond_center(Q::El(C), Q::El(C), &[Q::El(C), Q::El(C)]));
    set(76, k.double_bond_center(Q::El(C), Q::El(C), &[Q::A, Q::A]));
}

fn set_group_keys(k: &Keys, set: &mut impl FnMut(usize, bool)) {
    let (a, c, n, o, s) = (Q::A, Q::El(C), Q::El(N), Q::El(O), Q::El(S));

    // centers
    set(13, k.has_center(n, &[o, c, c]));
    set(15, k.has_center(c, &[o, o, o]));
    set(23, k.has_center(c, &[n, o, o]));
    set(25, k.has_center(c, &[n, n, n]));
    set(30, k.has_center(Q::Het, &[c, c, c, a]));
    set(37, k.has_center(c, &[n, o, n]));
    set(38, k.has_center(c, &[n, c, n]));
    set(39, k.has_center(s, &[o, o, o]));
    set(48, k.has_center(Q::Het, &[o, o, o]));
    set(55, k.has_center(s, &[o, o]));
    set(56, k.has_center(n, &[o, o, c]));
    set(61, k.has_center(s, &[a, a, a]));
    set(66, k.has_center(c, &[c, c, c, a]));
    set(81, k.has_center(a, &[s, a, a]));
    set(85, k.has_center(n, &[c, c, c]));
    set(92, k.has_center(c, &[o, n, c]));
    set(106, k.has_center(a, &[Q::Het, Q::Het, Q::Het]));
    set(107, k.has_center(a, &[Q::X, a, a]));
    set(110, k.has_center(c, &[n, o]));
    set(112, k.has_center(a, &[a, a, a, a]));
    set(122, k.has_center(n, &[a, a, a]));
    set(123, k.has_center(c, &[o, o]));
    set(148, k.has_center(Q::Het, &[a, a, a]));
    set(152, k.has_center(c, &[o, c, c]));
    set(156, k.has_center(a, &[n, a, a]));

    // linear paths
    set(28, k.has_path(&[Q::Het, Q::Ch2, Q::Het]));
    set(32, k.has_path(&[c, s, n]));
    set(43, k.has_path(&[Q::HetH, a, Q::HetH]));
    set(47, k.has_path(&[s, a, n]));
    set(51, k.has_path(&[c, s, o]));
    set(53, k.has_path(&[Q::HetH, a, a, a, Q::HetH]));
    set(54, k.has_path(&[Q::HetH, a, a, Q::HetH]));
    set(58, k.has_path(&[Q::Het, s, Q::Het]));
    set(70, k.has_path(&[Q::Het, n, Q::Het]));
    set(72, k.has_path(&[o, a, a, o]));
    set(74, k.has_path(&[Q::Ch3, a, Q::Ch3]));
    set(77, k.has_path(&[n, a, n]));
    set(79, k.has_path(&[n, a, a, n]));
    set(80, k.has_path(&[n, a, a, a, n]));
    set(82, k.has_path(&[a, Q::Ch2, Q::HetH]));
    set(86, k.has_path(&[Q::Ch2, Q::Het, Q::Ch2]));
    set(89, k.has_path(&[o, a, a, a, o]));
    set(90, k.has_path(&[Q::HetH, a, a, Q::Ch2, a]));
    set(91, k.has_path(&[Q::HetH, a, a, a, Q::Ch2, a]));
    set(93, k.has_path(&[Q::Het, Q::Ch3]));
    set(95, k.has_path(&[n, a, a, o]));
    set(97, k.has_path(&[n, a, a, a, o]));
    set(100, k.has_path(&[a, Q::Ch2, n]));
    set(104, k.has_path(&[Q::HetH, a, Q::Ch2, a]));
    set(108, k.has_path(&[Q::Ch3, a, a, a, Q::Ch2, a]));
    set(109, k.has_path(&[a, Q::Ch2, o]));
    set(111, k.has_path(&[n, a, Q::Ch2, a]));
    set(114, k.has_path(&[Q::Ch3, Q::Ch2, a]));
    set(115, k.has_path(&[Q::Ch3, a, Q::Ch2, a]));
    set(116, k.has_path(&[Q::Ch3, a, a, Q::Ch2, a]));
    set(117, k.has_path(&[n, a, o]));
    set(118, k.count_paths(&[a, Q::Ch2, Q::Ch2, a]) > 1);
    set(128, k.has_path(&[a, Q::Ch2, a, a, a, Q::Ch2, a]));
    set(129, k.has_path(&[a, Q::Ch2, a, a, Q::Ch2, a]));
    set(132, k.has_path(&[o, a, Q::Ch2, a]));
    set(138, k.count_paths(&[Q::Het, Q::Ch2, a]) > 1);
    set(147, k.has_path(&[a, Q::Ch2, Q::Ch2, a]));
    set(153, k.has_path(&[Q::Het, Q::Ch2, a]));

    // chain-only environments
    let chain_center = |z: Q| {
        (0..k.mol.atom_count()).any(|i| {
            k.is(i, z)
                && !k.rings.atom_in_ring(i)
                && k.mol.heavy_degree(i) == 2
        })
    };
    set(126, chain_center(o));
    set(155, chain_center(Q::Ch2));
}

fn set_count_keys(k: &Keys, set: &mut impl FnMut(usize, bool)) {
    let methyls = k.count_atoms(Q::Ch3);
    let nitrogens = k.counts[N as usize];
    let oxygens = k.counts[O as usize];

    set(84, (0..k.mol.atom_count()).any(|i| k.is(i, Q::El(N)) && k.h(i) == 2));
    set(131, k.count_atoms(Q::HetH) > 1);
    set(139, (0..k.mol.atom_count()).any(|i| k.is(i, Q::El(O)) && k.h(i) > 0));
    set(140, oxygens > 3);
    set(141, methyls > 2);
    set(142, nitrogens > 1);
    set(146, oxygens > 2);
    set(149, methyls > 1);
    set(151, (0..k.mol.atom_count()).any(|i| k.is(i, Q::El(N)) && k.h(i) == 1));
    set(159, oxygens > 1);
    set(160, methyls > 0);
    set(166, k.mol.fragments().len() > 1);
}
