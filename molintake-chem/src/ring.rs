//! Ring perception: cyclic bonds and the smallest set of smallest rings.

use std::collections::VecDeque;

use crate::molecule::Molecule;

/// Ring membership for one molecule.
#[derive(Debug, Clone, Default)]
pub struct RingInfo {
    /// SSSR rings as atom sequences in ring order, smallest first.
    pub rings: Vec<Vec<usize>>,
    atom_in_ring: Vec<bool>,
    bond_in_ring: Vec<bool>,
}

impl RingInfo {
    pub fn perceive(mol: &Molecule) -> Self {
        let bond_in_ring = cyclic_bonds(mol);
        let mut atom_in_ring = vec![false; mol.atom_count()];
        for (bi, bond) in mol.bonds.iter().enumerate() {
            if bond_in_ring[bi] {
                atom_in_ring[bond.atom1] = true;
                atom_in_ring[bond.atom2] = true;
            }
        }
        let rings = smallest_rings(mol, &bond_in_ring);
        RingInfo { rings, atom_in_ring, bond_in_ring }
    }

    pub fn atom_in_ring(&self, atom: usize) -> bool {
        self.atom_in_ring.get(atom).copied().unwrap_or(false)
    }

    pub fn bond_in_ring(&self, bond: usize) -> bool {
        self.bond_in_ring.get(bond).copied().unwrap_or(false)
    }

    pub fn num_rings(&self) -> usize {
        self.rings.len()
    }

    /// Number of SSSR rings containing `atom`.
    pub fn atom_ring_count(&self, atom: usize) -> usize {
        self.rings.iter().filter(|r| r.contains(&atom)).count()
    }

    /// Size of the smallest SSSR ring containing `atom`, if any.
    pub fn smallest_ring_size(&self, atom: usize) -> Option<usize> {
        self.rings.iter().filter(|r| r.contains(&atom)).map(Vec::len).min()
    }
}

/// Bond indices around a ring given as an atom cycle.
pub fn ring_bonds(mol: &Molecule, ring: &[usize]) -> Vec<usize> {
    (0..ring.len())
        .filter_map(|i| mol.bond_index(ring[i], ring[(i + 1) % ring.len()]))
        .collect()
}

/// Smallest set of smallest rings.
pub fn find_sssr(mol: &Molecule) -> Vec<Vec<usize>> {
    RingInfo::perceive(mol).rings
}

/// Mark every bond that is not a bridge (i.e. lies on some cycle).
///
/// Iterative Tarjan low-link so deep chains do not exhaust the stack.
fn cyclic_bonds(mol: &Molecule) -> Vec<bool> {
    let n = mol.atom_count();
    let mut cyclic = vec![true; mol.bond_count()];
    let mut disc = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut timer = 0usize;

    for root in 0..n {
        if disc[root] != usize::MAX {
            continue;
        }
        // (atom, bond used to reach it, next adjacency slot)
        let mut stack: Vec<(usize, usize, usize)> = vec![(root, usize::MAX, 0)];
        disc[root] = timer;
        low[root] = timer;
        timer += 1;

        while let Some(top) = stack.last_mut() {
            let (atom, via, slot) = *top;
            if let Some(&(nb, bi)) = mol.adjacency[atom].get(slot) {
                top.2 += 1;
                if bi == via {
                    continue;
                }
                if disc[nb] == usize::MAX {
                    disc[nb] = timer;
                    low[nb] = timer;
                    timer += 1;
                    stack.push((nb, bi, 0));
                } else {
                    low[atom] = low[atom].min(disc[nb]);
                }
            } else {
                stack.pop();
                if let Some(&(parent, _, _)) = stack.last() {
                    low[parent] = low[parent].min(low[atom]);
                    if low[atom] > disc[parent] {
                        cyclic[via] = false;
                    }
                }
            }
        }
    }
    cyclic
}

fn smallest_rings(mol: &Molecule, bond_in_ring: &[bool]) -> Vec<Vec<usize>> {
    let n_ring_bonds = bond_in_ring.iter().filter(|&&c| c).count();
    if n_ring_bonds == 0 {
        return Vec::new();
    }
    let components = mol.fragments().len();
    let expected = mol.bond_count() + components - mol.atom_count();

    let mut candidates: Vec<Vec<usize>> = Vec::new();
    for (bi, bond) in mol.bonds.iter().enumerate() {
        if !bond_in_ring[bi] {
            continue;
        }
        if let Some(mut ring) = shortest_path_avoiding(mol, bond.atom1, bond.atom2, bi, bond_in_ring) {
            canonical_rotation(&mut ring);
            if !candidates.contains(&ring) {
                candidates.push(ring);
            }
        }
    }
    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    // keep a ring only if it covers a bond no accepted ring covers yet,
    // which approximates linear independence for ordinary ring systems
    let mut covered = vec![false; mol.bond_count()];
    let mut rings: Vec<Vec<usize>> = Vec::new();
    let mut skipped = Vec::new();
    for ring in candidates {
        if rings.len() == expected {
            break;
        }
        let bonds = ring_bonds(mol, &ring);
        if bonds.iter().any(|&b| !covered[b]) {
            for b in bonds {
                covered[b] = true;
            }
            rings.push(ring);
        } else {
            skipped.push(ring);
        }
    }
    // cage systems: fill up with the smallest leftovers
    for ring in skipped {
        if rings.len() >= expected {
            break;
        }
        rings.push(ring);
    }
    rings.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    rings
}

/// BFS over ring bonds from `start` to `end` without the direct bond.
fn shortest_path_avoiding(
    mol: &Molecule,
    start: usize,
    end: usize,
    excluded_bond: usize,
    bond_in_ring: &[bool],
) -> Option<Vec<usize>> {
    let mut parent = vec![usize::MAX; mol.atom_count()];
    parent[start] = start;
    let mut queue = VecDeque::from([start]);

    while let Some(curr) = queue.pop_front() {
        if curr == end {
            let mut path = vec![end];
            let mut node = end;
            while node != start {
                node = parent[node];
                path.push(node);
            }
            path.reverse();
            return Some(path);
        }
        let mut next: Vec<(usize, usize)> = mol.adjacency[curr].clone();
        next.sort_unstable();
        for (nb, bi) in next {
            if bi == excluded_bond || !bond_in_ring[bi] || parent[nb] != usize::MAX {
                continue;
            }
            parent[nb] = curr;
            queue.push_back(nb);
        }
    }
    None
}

/// Rotate the cycle to start at its smallest atom and pick the direction with
/// the smaller second element.
fn canonical_rotation(ring: &mut Vec<usize>) {
    if ring.len() < 3 {
        return;
    }
    let min_pos = ring
        .iter()
        .enumerate()
        .min_by_key(|&(_, &a)| a)
        .map_or(0, |(i, _)| i);
    ring.rotate_left(min_pos);
    if ring[ring.len() - 1] < ring[1] {
        ring[1..].reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn benzene_has_one_ring() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        let info = RingInfo::perceive(&mol);
        assert_eq!(info.num_rings(), 1);
        assert_eq!(info.rings[0].len(), 6);
        assert!((0..6).all(|a| info.atom_in_ring(a)));
    }

    #[test]
    fn naphthalene_two_six_rings() {
        let mol = parse_smiles("c1ccc2ccccc2c1").unwrap();
        let info = RingInfo::perceive(&mol);
        assert_eq!(info.num_rings(), 2);
        assert!(info.rings.iter().all(|r| r.len() == 6));
        let fused = (0..mol.atom_count()).filter(|&a| info.atom_ring_count(a) == 2).count();
        assert_eq!(fused, 2);
    }

    #[test]
    fn chain_has_no_rings() {
        let mol = parse_smiles("CCCCO").unwrap();
        let info = RingInfo::perceive(&mol);
        assert_eq!(info.num_rings(), 0);
        assert!(!info.bond_in_ring(0));
    }

    #[test]
    fn biphenyl_linker_is_not_a_ring_bond() {
        let mol = parse_smiles("c1ccccc1-c1ccccc1").unwrap();
        let info = RingInfo::perceive(&mol);
        assert_eq!(info.num_rings(), 2);
        let linker = mol.bond_index(5, 6).unwrap();
        assert!(!info.bond_in_ring(linker));
        assert!(info.atom_in_ring(5));
    }

    #[test]
    fn spiro_rings() {
        let mol = parse_smiles("C1CCC2(C1)CCCC2").unwrap();
        let info = RingInfo::perceive(&mol);
        assert_eq!(info.num_rings(), 2);
        assert_eq!(info.smallest_ring_size(3), Some(5));
    }

    #[test]
    fn cyclopropane_ring_bonds() {
        let mol = parse_smiles("C1CC1").unwrap();
        let rings = find_sssr(&mol);
        assert_eq!(rings, vec![vec![0, 1, 2]]);
        assert_eq!(ring_bonds(&mol, &rings[0]).len(), 3);
    }
}
