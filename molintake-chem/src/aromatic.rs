//! Kekulization, aromaticity perception and valence checks.
//!
//! Aromatic input is first turned into an explicit Kekulé structure by
//! pairing up the atoms that still need one double bond. Aromaticity is then
//! re-derived from that structure with a Hückel count, so that every input
//! spelling of the same ring system ends up with the same aromatic flags.

use molintake_core::{ErrorCode, IntakeError, Result};

use crate::element::{allowed_valences, symbol_of};
use crate::molecule::{BondOrder, Molecule};
use crate::ring::{ring_bonds, RingInfo};

const UNMATCHED: usize = usize::MAX;

/// Step limit for the exhaustive matching fallback.
const BACKTRACK_BUDGET: usize = 10_000;

fn kekulization_error(message: impl Into<String>) -> IntakeError {
    IntakeError::normalization(ErrorCode::KekulizationFailed, message)
}

/// Replace aromatic bonds with an alternating single/double pattern.
///
/// Fails with `KEKULIZATION_FAILED` when an aromatic atom or bond lies
/// outside any ring, or when no assignment gives every atom that needs a
/// double bond exactly one. The unmatched atoms are listed in the error
/// details.
pub fn kekulize(mol: &mut Molecule) -> Result<()> {
    let has_aromatic =
        mol.atoms.iter().any(|a| a.is_aromatic) || mol.bonds.iter().any(|b| b.is_aromatic());
    if !has_aromatic {
        return Ok(());
    }

    let rings = RingInfo::perceive(mol);
    if let Some(i) = (0..mol.atom_count()).find(|&i| mol.atoms[i].is_aromatic && !rings.atom_in_ring(i)) {
        return Err(kekulization_error(format!(
            "aromatic atom {i} ({}) is not in a ring",
            symbol_of(mol.atoms[i].atomic_number)
        ))
        .with_detail("atom", i));
    }
    if let Some(bi) = (0..mol.bond_count()).find(|&bi| mol.bonds[bi].is_aromatic() && !rings.bond_in_ring(bi)) {
        let bond = &mol.bonds[bi];
        return Err(kekulization_error(format!(
            "aromatic bond {}-{} is not in a ring",
            bond.atom1, bond.atom2
        ))
        .with_detail("bond", bi));
    }

    let n = mol.atom_count();
    let needs: Vec<bool> = (0..n).map(|i| needs_double_bond(mol, i)).collect();
    let mut graph: Vec<Vec<usize>> = vec![Vec::new(); n];
    for bond in &mol.bonds {
        if bond.is_aromatic() && needs[bond.atom1] && needs[bond.atom2] {
            graph[bond.atom1].push(bond.atom2);
            graph[bond.atom2].push(bond.atom1);
        }
    }

    let mate = match_double_bonds(&graph, &needs);
    let unmatched: Vec<usize> = (0..n).filter(|&i| needs[i] && mate[i] == UNMATCHED).collect();
    if !unmatched.is_empty() {
        let list = unmatched.iter().map(usize::to_string).collect::<Vec<_>>().join(",");
        return Err(kekulization_error(format!(
            "cannot assign alternating double bonds to {} aromatic atom(s)",
            unmatched.len()
        ))
        .with_detail("atoms", list));
    }

    for bond in &mut mol.bonds {
        if bond.is_aromatic() {
            bond.order = if mate[bond.atom1] == bond.atom2 {
                BondOrder::Double
            } else {
                BondOrder::Single
            };
        }
    }
    for atom in &mut mol.atoms {
        atom.is_aromatic = false;
    }
    Ok(())
}

/// An atom on an aromatic bond whose next allowed valence is exactly one
/// above what its bonds and hydrogens already use.
fn needs_double_bond(mol: &Molecule, idx: usize) -> bool {
    let on_aromatic_bond = mol.adjacency[idx]
        .iter()
        .any(|&(_, bi)| mol.bonds[bi].is_aromatic());
    if !on_aromatic_bond {
        return false;
    }
    let atom = &mol.atoms[idx];
    let used = mol.explicit_valence(idx) + atom.implicit_hydrogens;
    allowed_valences(atom.atomic_number, atom.formal_charge)
        .into_iter()
        .find(|&v| v >= used)
        .is_some_and(|target| target == used + 1)
}

/// Maximum matching on the candidate graph: greedy seed, augmenting paths,
/// then a bounded exhaustive search if atoms are still left over.
fn match_double_bonds(graph: &[Vec<usize>], needs: &[bool]) -> Vec<usize> {
    let n = graph.len();
    let mut order: Vec<usize> = (0..n).filter(|&i| needs[i]).collect();
    order.sort_by_key(|&i| (graph[i].len(), i));

    let mut mate = vec![UNMATCHED; n];
    for &u in &order {
        if mate[u] != UNMATCHED {
            continue;
        }
        if let Some(&v) = graph[u].iter().find(|&&v| mate[v] == UNMATCHED) {
            mate[u] = v;
            mate[v] = u;
        }
    }

    for &u in &order {
        if mate[u] == UNMATCHED {
            let mut visited = vec![false; n];
            augment(u, graph, &mut mate, &mut visited);
        }
    }

    if order.iter().any(|&u| mate[u] == UNMATCHED) {
        let mut trial = vec![UNMATCHED; n];
        let mut budget = BACKTRACK_BUDGET;
        if backtrack(graph, needs, &mut trial, &mut budget) {
            return trial;
        }
    }
    mate
}

/// Kuhn-style alternating path search from a free atom.
fn augment(u: usize, graph: &[Vec<usize>], mate: &mut [usize], visited: &mut [bool]) -> bool {
    visited[u] = true;
    if let Some(&v) = graph[u].iter().find(|&&v| !visited[v] && mate[v] == UNMATCHED) {
        mate[u] = v;
        mate[v] = u;
        return true;
    }
    for &v in &graph[u] {
        if visited[v] {
            continue;
        }
        visited[v] = true;
        let w = mate[v];
        if w != UNMATCHED && !visited[w] && augment(w, graph, mate, visited) {
            mate[u] = v;
            mate[v] = u;
            return true;
        }
    }
    false
}

fn backtrack(graph: &[Vec<usize>], needs: &[bool], mate: &mut [usize], budget: &mut usize) -> bool {
    let Some(u) = (0..graph.len()).find(|&i| needs[i] && mate[i] == UNMATCHED) else {
        return true;
    };
    if *budget == 0 {
        return false;
    }
    *budget -= 1;
    for &v in &graph[u] {
        if mate[v] != UNMATCHED {
            continue;
        }
        mate[u] = v;
        mate[v] = u;
        if backtrack(graph, needs, mate, budget) {
            return true;
        }
        mate[u] = UNMATCHED;
        mate[v] = UNMATCHED;
    }
    false
}

/// Re-derive aromatic atoms and bonds from a Kekulé structure.
///
/// Candidate systems are single rings of five to seven atoms and pairs of
/// such rings fused along one bond. A system is aromatic when every atom
/// contributes to the π count and the count is 4n+2. Systems that only pass
/// once a neighbouring ring is aromatic are picked up on later rounds.
pub fn perceive_aromaticity(mol: &mut Molecule) {
    let info = RingInfo::perceive(mol);
    let rings: Vec<(Vec<usize>, Vec<usize>)> = info
        .rings
        .iter()
        .filter(|r| (5..=7).contains(&r.len()))
        .map(|r| (r.clone(), ring_bonds(mol, r)))
        .collect();

    let mut systems = rings.clone();
    for i in 0..rings.len() {
        for j in (i + 1)..rings.len() {
            let shared = rings[i].1.iter().filter(|b| rings[j].1.contains(b)).count();
            if shared != 1 {
                continue;
            }
            let mut atoms: Vec<usize> = rings[i].0.iter().chain(&rings[j].0).copied().collect();
            atoms.sort_unstable();
            atoms.dedup();
            let mut bonds: Vec<usize> = rings[i].1.iter().chain(&rings[j].1).copied().collect();
            bonds.sort_unstable();
            bonds.dedup();
            systems.push((atoms, bonds));
        }
    }

    let mut aromatic_atom = vec![false; mol.atom_count()];
    let mut aromatic_bond = vec![false; mol.bond_count()];
    let mut accepted = vec![false; systems.len()];
    loop {
        let mut changed = false;
        for (si, (atoms, bonds)) in systems.iter().enumerate() {
            if accepted[si] {
                continue;
            }
            let Some(electrons) = pi_electrons(mol, atoms, bonds, &aromatic_atom) else {
                continue;
            };
            if electrons % 4 == 2 {
                accepted[si] = true;
                changed = true;
                for &a in atoms {
                    aromatic_atom[a] = true;
                }
                for &b in bonds {
                    aromatic_bond[b] = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    for (atom, flag) in mol.atoms.iter_mut().zip(&aromatic_atom) {
        atom.is_aromatic = *flag;
    }
    for (bond, flag) in mol.bonds.iter_mut().zip(&aromatic_bond) {
        if *flag {
            bond.order = BondOrder::Aromatic;
        }
    }
}

/// π electrons the system receives, or `None` if some atom cannot take part.
fn pi_electrons(mol: &Molecule, atoms: &[usize], bonds: &[usize], aromatic: &[bool]) -> Option<u32> {
    let mut total = 0u32;
    for &a in atoms {
        let mut double_inside = false;
        let mut double_outside = None;
        for &(nb, bi) in &mol.adjacency[a] {
            match mol.bonds[bi].order {
                BondOrder::Double if bonds.contains(&bi) => double_inside = true,
                BondOrder::Double => double_outside = Some(nb),
                BondOrder::Triple => return None,
                _ => {}
            }
        }

        let atom = &mol.atoms[a];
        total += if double_inside {
            1
        } else if let Some(nb) = double_outside {
            if matches!(mol.atoms[nb].atomic_number, 7 | 8 | 16) && !aromatic[nb] {
                0
            } else if aromatic[nb] {
                1
            } else {
                return None;
            }
        } else {
            let connections = mol.degree(a) + atom.implicit_hydrogens as usize;
            match (atom.atomic_number, atom.formal_charge, connections) {
                (7, 0, 3) | (7, -1, 2) | (15, 0, 3) | (6, -1, 3) => 2,
                (8, 0, 2) | (16, 0, 2) | (34, 0, 2) => 2,
                (6, 1, 3) | (5, 0, 3) => 0,
                _ => return None,
            }
        };
    }
    Some(total)
}

/// Reject atoms whose bonds and hydrogens exceed every allowed valence.
///
/// Runs on the Kekulé form; elements without valence rules are skipped.
pub fn validate_valences(mol: &Molecule) -> Result<()> {
    for (i, atom) in mol.atoms.iter().enumerate() {
        let allowed = allowed_valences(atom.atomic_number, atom.formal_charge);
        let Some(&max) = allowed.iter().max() else {
            continue;
        };
        let total = mol.explicit_valence(i) as u16 + atom.implicit_hydrogens as u16;
        if total > max as u16 {
            let symbol = symbol_of(atom.atomic_number);
            return Err(IntakeError::normalization(
                ErrorCode::CanonicalizationFailed,
                format!("atom {i} ({symbol}) has valence {total}, maximum allowed is {max}"),
            )
            .with_detail("atom", i)
            .with_detail("element", symbol)
            .with_detail("valence", total));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn double_bonds(mol: &Molecule) -> usize {
        mol.bonds.iter().filter(|b| b.order == BondOrder::Double).count()
    }

    fn kekulized(smiles: &str) -> Molecule {
        let mut mol = parse_smiles(smiles).unwrap();
        kekulize(&mut mol).unwrap();
        mol
    }

    #[test]
    fn benzene_gets_three_double_bonds() {
        let mol = kekulized("c1ccccc1");
        assert_eq!(double_bonds(&mol), 3);
        assert!(mol.atoms.iter().all(|a| !a.is_aromatic));
        assert!(mol.bonds.iter().all(|b| !b.is_aromatic()));
        // every carbon carries exactly one double bond
        for i in 0..6 {
            let doubles = mol.adjacency[i]
                .iter()
                .filter(|&&(_, bi)| mol.bonds[bi].order == BondOrder::Double)
                .count();
            assert_eq!(doubles, 1);
        }
    }

    #[test]
    fn heteroaromatics() {
        assert_eq!(double_bonds(&kekulized("c1ccncc1")), 3);
        assert_eq!(double_bonds(&kekulized("c1cc[nH]c1")), 2);
        assert_eq!(double_bonds(&kekulized("c1ccoc1")), 2);
        assert_eq!(double_bonds(&kekulized("c1ccsc1")), 2);
        assert_eq!(double_bonds(&kekulized("c1ccc2ccccc2c1")), 5);
        assert_eq!(double_bonds(&kekulized("O=c1cccc[nH]1")), 3);
    }

    #[test]
    fn pyrrole_without_hydrogen_fails() {
        let mut mol = parse_smiles("c1ccnc1").unwrap();
        let err = kekulize(&mut mol).unwrap_err();
        assert_eq!(err.code(), ErrorCode::KekulizationFailed);
        assert!(err.failure().unwrap().details.contains_key("atoms"));
    }

    #[test]
    fn aromatic_atom_outside_ring_fails() {
        let mut mol = parse_smiles("Cc").unwrap();
        let err = kekulize(&mut mol).unwrap_err();
        assert_eq!(err.code(), ErrorCode::KekulizationFailed);
    }

    #[test]
    fn aliphatic_input_is_untouched() {
        let mut mol = parse_smiles("C1=CCCCC1").unwrap();
        let before = mol.clone();
        kekulize(&mut mol).unwrap();
        assert_eq!(mol, before);
    }

    #[test]
    fn kekule_benzene_is_perceived_aromatic() {
        let mut mol = parse_smiles("C1=CC=CC=C1").unwrap();
        perceive_aromaticity(&mut mol);
        assert!(mol.atoms.iter().all(|a| a.is_aromatic));
        assert!(mol.bonds.iter().all(|b| b.is_aromatic()));
    }

    #[test]
    fn perception_round_trip_for_common_rings() {
        for smi in ["c1ccncc1", "c1cc[nH]c1", "c1ccoc1", "c1ccsc1", "c1ccc2ccccc2c1", "c1ccc2cc3ccccc3cc2c1"] {
            let mut mol = kekulized(smi);
            perceive_aromaticity(&mut mol);
            assert!(mol.atoms.iter().all(|a| a.is_aromatic), "{smi} lost aromaticity");
        }
    }

    #[test]
    fn non_aromatic_rings_stay_aliphatic() {
        for smi in ["C1=CCCC=C1", "C1CCCCC1", "C1=CC=CC1", "C1=CC=CC=CC=C1"] {
            let mut mol = parse_smiles(smi).unwrap();
            perceive_aromaticity(&mut mol);
            assert!(mol.atoms.iter().all(|a| !a.is_aromatic), "{smi} marked aromatic");
        }
    }

    #[test]
    fn exocyclic_carbonyl_keeps_pyridone_aromatic() {
        let mut mol = parse_smiles("O=C1C=CC=CN1").unwrap();
        perceive_aromaticity(&mut mol);
        assert!(!mol.atoms[0].is_aromatic);
        assert!((1..7).all(|i| mol.atoms[i].is_aromatic));
        assert_eq!(mol.bonds[0].order, BondOrder::Double);
    }

    #[test]
    fn substituents_are_not_aromatic() {
        let mut mol = kekulized("Cc1ccccc1");
        perceive_aromaticity(&mut mol);
        assert!(!mol.atoms[0].is_aromatic);
        assert_eq!(mol.bonds[0].order, BondOrder::Single);
    }

    #[test]
    fn valence_checks() {
        assert!(validate_valences(&parse_smiles("CC(=O)O").unwrap()).is_ok());
        assert!(validate_valences(&parse_smiles("[NH4+]").unwrap()).is_ok());
        assert!(validate_valences(&parse_smiles("OCl(=O)(=O)=O").unwrap()).is_ok());

        let err = validate_valences(&parse_smiles("C(C)(C)(C)(C)C").unwrap()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CanonicalizationFailed);
        let details = &err.failure().unwrap().details;
        assert_eq!(details.get("element").map(String::as_str), Some("C"));
        assert_eq!(details.get("atom").map(String::as_str), Some("0"));
    }
}
