//! Canonical SMILES generation.
//!
//! Atoms are ranked by iterative partition refinement over their local
//! invariants and neighbourhoods. Remaining ties (symmetric atoms) are broken
//! one at a time and the partition is refined again until every rank is
//! unique. The SMILES string is then written by a depth-first walk that
//! always starts from the lowest-ranked atom of a fragment and visits
//! neighbours in rank order.
//!
//! Stereochemistry is not encoded; the output captures connectivity,
//! charges, isotopes, hydrogen counts and aromaticity.
//!
//! # Example
//!
//! ```
//! use molintake_chem::{parse_smiles, canonical_smiles};
//!
//! let mol1 = parse_smiles("OCC").unwrap();
//! let mol2 = parse_smiles("CCO").unwrap();
//! assert_eq!(canonical_smiles(&mol1), canonical_smiles(&mol2));
//! ```

use std::fmt::Write as _;

use molintake_core::hash::content_hash;
use molintake_core::ContentAddressable;

use crate::element::{is_organic_subset, organic_subset_hydrogens, symbol_of};
use crate::molecule::{BondOrder, Molecule};

/// Generate a canonical SMILES string for the given molecule.
pub fn canonical_smiles(mol: &Molecule) -> String {
    let n = mol.atom_count();
    if n == 0 {
        return String::new();
    }
    let ranks = canonical_ranks(mol);
    let tree = build_traversal(mol, &ranks);
    write_smiles(mol, &tree)
}

impl ContentAddressable for Molecule {
    /// SHA-256 of the canonical SMILES.
    fn content_hash(&self) -> String {
        content_hash(&canonical_smiles(self))
    }
}

fn bond_code(order: BondOrder) -> u8 {
    match order {
        BondOrder::Single => 1,
        BondOrder::Double => 2,
        BondOrder::Triple => 3,
        BondOrder::Aromatic => 4,
    }
}

/// Unique rank per atom, 0-based.
pub fn canonical_ranks(mol: &Molecule) -> Vec<usize> {
    let n = mol.atom_count();
    let invariants: Vec<(u8, usize, u8, i8, u16, bool)> = mol
        .atoms
        .iter()
        .enumerate()
        .map(|(i, a)| {
            (
                a.atomic_number,
                mol.degree(i),
                a.implicit_hydrogens,
                a.formal_charge,
                a.isotope.unwrap_or(0),
                a.is_aromatic,
            )
        })
        .collect();
    let mut ranks = refine(mol, dense_rank(&invariants));

    while class_count(&ranks) < n {
        // break the lowest tied class at its first atom
        let mut members = vec![0usize; n];
        for &r in &ranks {
            members[r] += 1;
        }
        let Some(tied) = (0..n).find(|&r| members[r] > 1) else {
            break;
        };
        let Some(chosen) = (0..n).find(|&i| ranks[i] == tied) else {
            break;
        };
        let split: Vec<usize> = ranks
            .iter()
            .enumerate()
            .map(|(i, &r)| if i == chosen { 2 * r } else { 2 * r + 1 })
            .collect();
        ranks = refine(mol, dense_rank(&split));
    }
    ranks
}

/// Refine until the number of classes stops growing.
fn refine(mol: &Molecule, mut ranks: Vec<usize>) -> Vec<usize> {
    let n = mol.atom_count();
    let mut classes = class_count(&ranks);
    while classes < n {
        let keys: Vec<(usize, Vec<(usize, u8)>)> = (0..n)
            .map(|i| {
                let mut nbrs: Vec<(usize, u8)> = mol.adjacency[i]
                    .iter()
                    .map(|&(nb, bi)| (ranks[nb], bond_code(mol.bonds[bi].order)))
                    .collect();
                nbrs.sort_unstable();
                (ranks[i], nbrs)
            })
            .collect();
        let next = dense_rank(&keys);
        let next_classes = class_count(&next);
        ranks = next;
        if next_classes == classes {
            break;
        }
        classes = next_classes;
    }
    ranks
}

fn dense_rank<T: Ord>(keys: &[T]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    let mut ranks = vec![0usize; keys.len()];
    let mut rank = 0;
    for (pos, &idx) in order.iter().enumerate() {
        if pos > 0 && keys[idx] != keys[order[pos - 1]] {
            rank += 1;
        }
        ranks[idx] = rank;
    }
    ranks
}

fn class_count(ranks: &[usize]) -> usize {
    ranks.iter().max().map_or(0, |&m| m + 1)
}

/// A ring-closure digit written at an atom.
#[derive(Debug, Clone, Copy)]
struct Closure {
    bond: usize,
    opening: bool,
}

/// Spanning forest of the DFS walk plus its ring-closure bonds.
struct Traversal {
    /// Fragment roots in output order.
    roots: Vec<usize>,
    /// (child, bond) pairs in visit order.
    children: Vec<Vec<(usize, usize)>>,
    closures: Vec<Vec<Closure>>,
}

fn build_traversal(mol: &Molecule, ranks: &[usize]) -> Traversal {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut used_bond = vec![false; mol.bond_count()];
    let mut children = vec![Vec::new(); n];
    let mut closures: Vec<Vec<Closure>> = vec![Vec::new(); n];
    let mut roots = Vec::new();

    let sorted_neighbors = |atom: usize| {
        let mut nbrs = mol.adjacency[atom].clone();
        nbrs.sort_by_key(|&(nb, _)| ranks[nb]);
        nbrs
    };

    loop {
        let Some(root) = (0..n).filter(|&i| !visited[i]).min_by_key(|&i| ranks[i]) else {
            break;
        };
        roots.push(root);
        visited[root] = true;
        let mut stack = vec![(root, sorted_neighbors(root), 0usize)];
        while let Some(frame) = stack.last_mut() {
            let atom = frame.0;
            let Some(&(nb, bi)) = frame.1.get(frame.2) else {
                stack.pop();
                continue;
            };
            frame.2 += 1;
            if used_bond[bi] {
                continue;
            }
            used_bond[bi] = true;
            if visited[nb] {
                // back edge: the ring opens at the ancestor and closes here
                closures[nb].push(Closure { bond: bi, opening: true });
                closures[atom].push(Closure { bond: bi, opening: false });
            } else {
                visited[nb] = true;
                children[atom].push((nb, bi));
                stack.push((nb, sorted_neighbors(nb), 0));
            }
        }
    }
    Traversal { roots, children, closures }
}

enum Step {
    Atom { atom: usize, via: Option<usize> },
    Text(char),
}

fn write_smiles(mol: &Molecule, tree: &Traversal) -> String {
    let mut out = String::new();
    // ring digit currently assigned to each ring bond
    let mut digit_of_bond = vec![0usize; mol.bond_count()];
    let mut in_use: Vec<bool> = vec![false; 100];

    for (fi, &root) in tree.roots.iter().enumerate() {
        if fi > 0 {
            out.push('.');
        }
        let mut steps = vec![Step::Atom { atom: root, via: None }];
        while let Some(step) = steps.pop() {
            let (atom, via) = match step {
                Step::Text(c) => {
                    out.push(c);
                    continue;
                }
                Step::Atom { atom, via } => (atom, via),
            };
            if let Some(bi) = via {
                write_bond(mol, bi, &mut out);
            }
            write_atom(mol, atom, &mut out);

            // closings first, then openings on the lowest free digits
            let mut freed = Vec::new();
            let mut closings: Vec<&Closure> = tree.closures[atom].iter().filter(|c| !c.opening).collect();
            closings.sort_by_key(|c| digit_of_bond[c.bond]);
            for c in closings {
                let digit = digit_of_bond[c.bond];
                write_ring_digit(digit, &mut out);
                freed.push(digit);
            }
            for c in tree.closures[atom].iter().filter(|c| c.opening) {
                let digit = (1..in_use.len())
                    .find(|&d| !in_use[d] && !freed.contains(&d))
                    .unwrap_or_else(|| {
                        in_use.push(false);
                        in_use.len() - 1
                    });
                in_use[digit] = true;
                digit_of_bond[c.bond] = digit;
                write_bond(mol, c.bond, &mut out);
                write_ring_digit(digit, &mut out);
            }
            for digit in freed {
                in_use[digit] = false;
            }

            // last child continues the chain, the others become branches
            let kids = &tree.children[atom];
            if let Some((&(last, last_bond), rest)) = kids.split_last() {
                steps.push(Step::Atom { atom: last, via: Some(last_bond) });
                for &(child, bond) in rest.iter().rev() {
                    steps.push(Step::Text(')'));
                    steps.push(Step::Atom { atom: child, via: Some(bond) });
                    steps.push(Step::Text('('));
                }
            }
        }
    }
    out
}

fn write_ring_digit(digit: usize, out: &mut String) {
    if digit < 10 {
        let _ = write!(out, "{digit}");
    } else {
        let _ = write!(out, "%{digit:02}");
    }
}

fn write_bond(mol: &Molecule, bi: usize, out: &mut String) {
    let bond = &mol.bonds[bi];
    let both_aromatic = mol.atoms[bond.atom1].is_aromatic && mol.atoms[bond.atom2].is_aromatic;
    match bond.order {
        BondOrder::Single if both_aromatic => out.push('-'),
        BondOrder::Single => {}
        BondOrder::Double => out.push('='),
        BondOrder::Triple => out.push('#'),
        BondOrder::Aromatic if both_aromatic => {}
        BondOrder::Aromatic => out.push(':'),
    }
}

fn write_atom(mol: &Molecule, idx: usize, out: &mut String) {
    let atom = &mol.atoms[idx];
    let bond_sum = mol.explicit_valence(idx);
    let writable_bare = if atom.is_aromatic {
        matches!(atom.atomic_number, 5 | 6 | 7 | 8 | 15 | 16)
    } else {
        is_organic_subset(atom.atomic_number)
    };
    let needs_bracket = !writable_bare
        || atom.formal_charge != 0
        || atom.isotope.is_some()
        || atom.implicit_hydrogens
            != organic_subset_hydrogens(atom.atomic_number, atom.is_aromatic, bond_sum);

    let symbol = symbol_of(atom.atomic_number);
    let symbol = if atom.is_aromatic {
        symbol.to_ascii_lowercase()
    } else {
        symbol.to_string()
    };

    if !needs_bracket {
        out.push_str(&symbol);
        return;
    }

    out.push('[');
    if let Some(iso) = atom.isotope {
        let _ = write!(out, "{iso}");
    }
    out.push_str(&symbol);
    match atom.implicit_hydrogens {
        0 => {}
        1 => out.push('H'),
        h => {
            let _ = write!(out, "H{h}");
        }
    }
    match atom.formal_charge {
        0 => {}
        1 => out.push('+'),
        -1 => out.push('-'),
        q if q > 0 => {
            let _ = write!(out, "+{q}");
        }
        q => {
            let _ = write!(out, "-{}", -(q as i16));
        }
    }
    out.push(']');
}
