//! SMILES string parser.
//!
//! Accepts the organic subset, bracket atoms (isotope, hydrogen count,
//! charge, atom class), ring closures including `%nn`, branches and `.`
//! fragment separators. Stereo markers are consumed and ignored.

use std::collections::BTreeMap;

use molintake_core::{ErrorCode, IntakeError, Result};

use crate::element::{element_by_symbol, organic_subset_hydrogens};
use crate::molecule::{Bond, BondOrder, MolAtom, Molecule};

/// Parse a SMILES string into a `Molecule`.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    parse_smiles_named(smiles, "")
}

/// Parse a SMILES string into a `Molecule` with a given name.
pub fn parse_smiles_named(smiles: &str, name: &str) -> Result<Molecule> {
    let trimmed = smiles.trim();
    if trimmed.is_empty() {
        return Err(IntakeError::parsing(ErrorCode::EmptyInput, "empty SMILES string"));
    }
    let mut parser = SmilesParser::new(trimmed);
    parser.parse()?;
    parser.finish()?;
    parser.compute_implicit_hydrogens();
    Ok(Molecule::new(name.to_string(), parser.atoms, parser.bonds))
}

fn invalid(message: impl Into<String>, pos: usize) -> IntakeError {
    IntakeError::parsing(ErrorCode::InvalidSmiles, message).with_detail("position", pos)
}

struct SmilesParser<'a> {
    input: &'a [u8],
    pos: usize,
    atoms: Vec<MolAtom>,
    /// bracket[i]: atom i came from `[...]` and carries its own H count
    bracket: Vec<bool>,
    bonds: Vec<Bond>,
    /// ring_closures[number] = (atom_idx, bond order written at the opening)
    ring_closures: BTreeMap<u16, (usize, Option<BondOrder>)>,
    /// Atoms that opened a branch
    stack: Vec<usize>,
    prev_atom: Option<usize>,
    pending_bond: Option<BondOrder>,
    /// Position of the most recent `(`, for empty-branch detection
    branch_opened_at: Option<usize>,
}

impl<'a> SmilesParser<'a> {
    fn new(input: &'a str) -> Self {
        SmilesParser {
            input: input.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bracket: Vec::new(),
            bonds: Vec::new(),
            ring_closures: BTreeMap::new(),
            stack: Vec::new(),
            prev_atom: None,
            pending_bond: None,
            branch_opened_at: None,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn set_pending(&mut self, order: BondOrder) -> Result<()> {
        if self.pending_bond.is_some() {
            return Err(invalid("two consecutive bond symbols", self.pos));
        }
        if self.prev_atom.is_none() {
            return Err(invalid("bond symbol without preceding atom", self.pos));
        }
        self.pending_bond = Some(order);
        Ok(())
    }

    fn parse(&mut self) -> Result<()> {
        while let Some(ch) = self.peek() {
            match ch {
                b'(' => {
                    let prev = self
                        .prev_atom
                        .ok_or_else(|| invalid("branch without preceding atom", self.pos))?;
                    if self.pending_bond.is_some() {
                        return Err(invalid("bond symbol before branch", self.pos));
                    }
                    self.stack.push(prev);
                    self.branch_opened_at = Some(self.pos);
                    self.advance();
                }
                b')' => {
                    if self.branch_opened_at == Some(self.pos.wrapping_sub(1)) {
                        return Err(invalid("empty branch", self.pos));
                    }
                    if self.pending_bond.is_some() {
                        return Err(invalid("dangling bond before ')'", self.pos));
                    }
                    let top = self.stack.pop().ok_or_else(|| invalid("unmatched ')'", self.pos))?;
                    self.prev_atom = Some(top);
                    self.advance();
                }
                b'-' => {
                    self.set_pending(BondOrder::Single)?;
                    self.advance();
                }
                b'=' => {
                    self.set_pending(BondOrder::Double)?;
                    self.advance();
                }
                b'#' => {
                    self.set_pending(BondOrder::Triple)?;
                    self.advance();
                }
                b':' => {
                    self.set_pending(BondOrder::Aromatic)?;
                    self.advance();
                }
                b'/' | b'\\' => {
                    // directional single bonds carry only stereo
                    self.set_pending(BondOrder::Single)?;
                    self.advance();
                }
                b'%' => {
                    let at = self.pos;
                    self.advance();
                    let ring_num = self.parse_two_digit_ring(at)?;
                    self.handle_ring_closure(ring_num, at)?;
                }
                b'[' => self.parse_bracket_atom()?,
                b'0'..=b'9' => {
                    let at = self.pos;
                    self.advance();
                    self.handle_ring_closure((ch - b'0') as u16, at)?;
                }
                b'.' => {
                    if self.pending_bond.is_some() {
                        return Err(invalid("dangling bond before '.'", self.pos));
                    }
                    if self.prev_atom.is_none() {
                        return Err(invalid("'.' without preceding atom", self.pos));
                    }
                    self.prev_atom = None;
                    self.advance();
                }
                _ if is_organic_atom_start(ch) => self.parse_organic_atom()?,
                _ => {
                    return Err(invalid(
                        format!("unexpected character '{}' at position {}", ch as char, self.pos),
                        self.pos,
                    ));
                }
            }
        }
        Ok(())
    }

    fn parse_organic_atom(&mut self) -> Result<()> {
        let ch = self.advance().unwrap_or(b'C');
        let is_aromatic = ch.is_ascii_lowercase();

        let atomic_number = match ch {
            b'B' if self.peek() == Some(b'r') => {
                self.advance();
                35
            }
            b'C' if self.peek() == Some(b'l') => {
                self.advance();
                17
            }
            b'B' | b'b' => 5,
            b'C' | b'c' => 6,
            b'N' | b'n' => 7,
            b'O' | b'o' => 8,
            b'P' | b'p' => 15,
            b'S' | b's' => 16,
            b'F' => 9,
            b'I' => 53,
            _ => {
                return Err(invalid(format!("unknown organic atom '{}'", ch as char), self.pos));
            }
        };

        self.push_atom(
            MolAtom { is_aromatic, ..MolAtom::new(atomic_number) },
            false,
        )
    }

    fn parse_bracket_atom(&mut self) -> Result<()> {
        let open = self.pos;
        self.advance(); // '['

        let isotope = self.parse_optional_number();

        let ch = self
            .advance()
            .ok_or_else(|| invalid("unexpected end of SMILES in bracket atom", open))?;
        if !ch.is_ascii_alphabetic() {
            return Err(invalid(format!("expected element symbol, found '{}'", ch as char), self.pos));
        }
        let is_aromatic = ch.is_ascii_lowercase();
        let upper = ch.to_ascii_uppercase() as char;

        // two-letter symbols win when they name a real element
        let mut symbol = upper.to_string();
        if let Some(next) = self.peek().filter(u8::is_ascii_lowercase) {
            let two = format!("{}{}", upper, next as char);
            if element_by_symbol(&two).is_some() {
                self.advance();
                symbol = two;
            }
        }
        let elem = element_by_symbol(&symbol)
            .ok_or_else(|| invalid(format!("unknown element '{symbol}'"), open))?;
        if is_aromatic && !matches!(elem.atomic_number, 5 | 6 | 7 | 8 | 15 | 16 | 33 | 34) {
            return Err(invalid(format!("element '{symbol}' cannot be aromatic"), open));
        }

        // chirality: @, @@, @TH1, @SP2, @OH12 ...
        if self.peek() == Some(b'@') {
            while self.peek() == Some(b'@') {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_uppercase() && c != b'H') {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let mut hydrogens = 0u8;
        if self.peek() == Some(b'H') {
            self.advance();
            hydrogens = match self.peek() {
                Some(d) if d.is_ascii_digit() => {
                    self.advance();
                    d - b'0'
                }
                _ => 1,
            };
        }

        let charge = self.parse_charge()?;

        // atom class, ignored
        if self.peek() == Some(b':') {
            self.advance();
            if self.parse_optional_number().is_none() {
                return Err(invalid("expected atom class number after ':'", self.pos));
            }
        }

        if self.advance() != Some(b']') {
            return Err(invalid("expected ']' in bracket atom", open));
        }

        let isotope = match isotope {
            Some(n) if n > u16::MAX as u32 => {
                return Err(invalid(format!("isotope {n} out of range"), open));
            }
            other => other.map(|n| n as u16),
        };

        self.push_atom(
            MolAtom {
                atomic_number: elem.atomic_number,
                formal_charge: charge,
                isotope,
                is_aromatic,
                implicit_hydrogens: hydrogens,
            },
            true,
        )
    }

    fn parse_charge(&mut self) -> Result<i8> {
        let sign: i8 = match self.peek() {
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return Ok(0),
        };
        let symbol = self.advance().unwrap_or(b'+');
        if let Some(d) = self.peek().filter(u8::is_ascii_digit) {
            self.advance();
            let mut magnitude = (d - b'0') as i8;
            if let Some(d2) = self.peek().filter(u8::is_ascii_digit) {
                self.advance();
                magnitude = magnitude * 10 + (d2 - b'0') as i8;
            }
            if magnitude > 15 {
                return Err(invalid(format!("charge {magnitude} out of range"), self.pos));
            }
            return Ok(sign * magnitude);
        }
        let mut magnitude = 1i8;
        while self.peek() == Some(symbol) {
            self.advance();
            magnitude += 1;
            if magnitude > 15 {
                return Err(invalid("charge out of range", self.pos));
            }
        }
        Ok(sign * magnitude)
    }

    fn parse_optional_number(&mut self) -> Option<u32> {
        let mut n: u32 = 0;
        let mut found = false;
        while let Some(ch) = self.peek().filter(u8::is_ascii_digit) {
            self.advance();
            n = n.saturating_mul(10).saturating_add((ch - b'0') as u32);
            found = true;
        }
        found.then_some(n)
    }

    fn parse_two_digit_ring(&mut self, at: usize) -> Result<u16> {
        match (self.advance(), self.advance()) {
            (Some(d1), Some(d2)) if d1.is_ascii_digit() && d2.is_ascii_digit() => {
                Ok((d1 - b'0') as u16 * 10 + (d2 - b'0') as u16)
            }
            _ => Err(invalid("expected two digits after '%'", at)),
        }
    }

    fn handle_ring_closure(&mut self, ring_num: u16, at: usize) -> Result<()> {
        let current = self
            .prev_atom
            .ok_or_else(|| invalid("ring closure without preceding atom", at))?;

        let Some((open_atom, open_bond)) = self.ring_closures.remove(&ring_num) else {
            self.ring_closures.insert(ring_num, (current, self.pending_bond.take()));
            return Ok(());
        };

        if open_atom == current {
            return Err(invalid(format!("ring closure {ring_num} bonds an atom to itself"), at));
        }
        let order = match (open_bond, self.pending_bond.take()) {
            (Some(a), Some(b)) if a != b => {
                return Err(invalid(format!("conflicting bond orders on ring closure {ring_num}"), at));
            }
            (Some(a), _) | (None, Some(a)) => a,
            (None, None) => self.implied_order(open_atom, current),
        };
        self.add_bond(open_atom, current, order, at)
    }

    fn implied_order(&self, a: usize, b: usize) -> BondOrder {
        if self.atoms[a].is_aromatic && self.atoms[b].is_aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn add_bond(&mut self, a: usize, b: usize, order: BondOrder, at: usize) -> Result<()> {
        let duplicate = self.bonds.iter().any(|bd| {
            (bd.atom1 == a && bd.atom2 == b) || (bd.atom1 == b && bd.atom2 == a)
        });
        if duplicate {
            return Err(invalid(format!("duplicate bond between atoms {a} and {b}"), at));
        }
        self.bonds.push(Bond::new(a, b, order));
        Ok(())
    }

    fn push_atom(&mut self, atom: MolAtom, bracket: bool) -> Result<()> {
        let atom_idx = self.atoms.len();
        self.atoms.push(atom);
        self.bracket.push(bracket);
        if let Some(prev) = self.prev_atom {
            let order = match self.pending_bond.take() {
                Some(order) => order,
                None => self.implied_order(prev, atom_idx),
            };
            self.add_bond(prev, atom_idx, order, self.pos)?;
        }
        self.pending_bond = None;
        self.prev_atom = Some(atom_idx);
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        if let Some((&num, _)) = self.ring_closures.iter().next() {
            return Err(invalid(format!("unclosed ring {num}"), self.pos));
        }
        if !self.stack.is_empty() {
            return Err(invalid(format!("{} unmatched '(' in SMILES", self.stack.len()), self.pos));
        }
        if self.pending_bond.is_some() {
            return Err(invalid("SMILES ends with a bond symbol", self.pos));
        }
        if self.atoms.is_empty() {
            return Err(IntakeError::parsing(ErrorCode::EmptyInput, "SMILES contains no atoms"));
        }
        Ok(())
    }

    fn compute_implicit_hydrogens(&mut self) {
        let mut bond_sum = vec![0u8; self.atoms.len()];
        for bond in &self.bonds {
            let v = bond.order.valence_contribution();
            bond_sum[bond.atom1] = bond_sum[bond.atom1].saturating_add(v);
            bond_sum[bond.atom2] = bond_sum[bond.atom2].saturating_add(v);
        }
        for (i, atom) in self.atoms.iter_mut().enumerate() {
            if self.bracket[i] {
                continue;
            }
            atom.implicit_hydrogens =
                organic_subset_hydrogens(atom.atomic_number, atom.is_aromatic, bond_sum[i]);
        }
    }
}

fn is_organic_atom_start(ch: u8) -> bool {
    matches!(
        ch,
        b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I' | b'b' | b'c' | b'n' | b'o' | b'p' | b's'
    )
}

/// Whether a line plausibly holds a SMILES string.
///
/// Cheap lexical test used by format sniffing; it does not parse.
pub fn looks_like_smiles(line: &str) -> bool {
    let token = line.split_whitespace().next().unwrap_or("");
    !token.is_empty()
        && token.bytes().any(|b| matches!(b, b'C' | b'c' | b'N' | b'n' | b'O' | b'o'))
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"()[]=#@+-/\\%.:*".contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_methane() {
        let mol = parse_smiles("C").unwrap();
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.bond_count(), 0);
        assert_eq!(mol.atoms[0].atomic_number, 6);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);
    }

    #[test]
    fn parse_ethanol() {
        let mol = parse_smiles("CCO").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 2);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 3);
        assert_eq!(mol.atoms[1].implicit_hydrogens, 2);
        assert_eq!(mol.atoms[2].implicit_hydrogens, 1);
    }

    #[test]
    fn parse_benzene() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert_eq!(mol.bond_count(), 6);
        for atom in &mol.atoms {
            assert!(atom.is_aromatic);
            assert_eq!(atom.implicit_hydrogens, 1);
        }
        assert!(mol.bonds.iter().all(|b| b.order == BondOrder::Aromatic));
    }

    #[test]
    fn parse_pyrrole_and_pyridine() {
        let pyrrole = parse_smiles("c1cc[nH]c1").unwrap();
        assert_eq!(pyrrole.atoms[3].implicit_hydrogens, 1);
        let pyridine = parse_smiles("c1ccncc1").unwrap();
        assert_eq!(pyridine.atoms[3].implicit_hydrogens, 0);
    }

    #[test]
    fn parse_branching() {
        let mol = parse_smiles("CC(C)C").unwrap();
        assert_eq!(mol.atom_count(), 4);
        assert_eq!(mol.bond_count(), 3);
        assert_eq!(mol.degree(1), 3);
    }

    #[test]
    fn parse_double_bond() {
        let mol = parse_smiles("C=C").unwrap();
        assert_eq!(mol.bonds[0].order, BondOrder::Double);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 2);
        assert_eq!(mol.atoms[1].implicit_hydrogens, 2);
    }

    #[test]
    fn parse_hypervalent_defaults() {
        // sulfone sulfur takes valence 6, no hydrogens
        let mol = parse_smiles("CS(=O)(=O)C").unwrap();
        assert_eq!(mol.atoms[1].implicit_hydrogens, 0);
        // nitro written with charges
        let nitro = parse_smiles("C[N+](=O)[O-]").unwrap();
        assert_eq!(nitro.atoms[1].formal_charge, 1);
        assert_eq!(nitro.atoms[1].implicit_hydrogens, 0);
        assert_eq!(nitro.atoms[3].formal_charge, -1);
    }

    #[test]
    fn parse_bracket_atoms() {
        let mol = parse_smiles("[NH4+]").unwrap();
        assert_eq!(mol.atoms[0].atomic_number, 7);
        assert_eq!(mol.atoms[0].formal_charge, 1);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);

        // bracket atoms keep their stated H count even when neutral
        let radical = parse_smiles("[CH3]").unwrap();
        assert_eq!(radical.atoms[0].implicit_hydrogens, 3);
        let bare = parse_smiles("[C]").unwrap();
        assert_eq!(bare.atoms[0].implicit_hydrogens, 0);

        let deut = parse_smiles("[2H]C").unwrap();
        assert_eq!(deut.atoms[0].isotope, Some(2));

        let fe = parse_smiles("[Fe+++]").unwrap();
        assert_eq!(fe.atoms[0].formal_charge, 3);
        let sulfate = parse_smiles("[O-2]").unwrap();
        assert_eq!(sulfate.atoms[0].formal_charge, -2);
    }

    #[test]
    fn stereo_and_atom_class_are_ignored() {
        let a = parse_smiles("N[C@@H](C)C(=O)O").unwrap();
        let b = parse_smiles("N[CH:7](C)C(=O)O").unwrap();
        assert_eq!(a.atoms, b.atoms);
        let trans = parse_smiles("F/C=C/F").unwrap();
        assert_eq!(trans.bond_count(), 3);
        assert_eq!(trans.bonds[1].order, BondOrder::Double);
    }

    #[test]
    fn parse_two_digit_ring_closure() {
        let mol = parse_smiles("C%10CCCCCCCCC%10").unwrap();
        assert_eq!(mol.atom_count(), 10);
        assert_eq!(mol.bond_count(), 10);
    }

    #[test]
    fn ring_closure_bond_order() {
        let mol = parse_smiles("C=1CCCCC1").unwrap();
        assert_eq!(mol.get_bond(0, 5).unwrap().order, BondOrder::Double);
        assert!(parse_smiles("C=1CCCCC#1").is_err());
    }

    #[test]
    fn fragments_are_disconnected() {
        let mol = parse_smiles("CC(=O)[O-].[Na+]").unwrap();
        assert_eq!(mol.fragments().len(), 2);
    }

    #[test]
    fn invalid_smiles_error() {
        for bad in ["C(", "C1CC", "[", "C)", "C()", "C=", "=C", "C..C", "[Xx]", "C1C1", "not_a_smiles"] {
            let err = parse_smiles(bad).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidSmiles, "{bad}");
        }
    }

    #[test]
    fn empty_input_has_its_own_code() {
        assert_eq!(parse_smiles("").unwrap_err().code(), ErrorCode::EmptyInput);
        assert_eq!(parse_smiles("   ").unwrap_err().code(), ErrorCode::EmptyInput);
    }

    #[test]
    fn error_reports_position() {
        let err = parse_smiles("CC?C").unwrap_err();
        let failure = err.failure().unwrap();
        assert_eq!(failure.details.get("position").map(String::as_str), Some("2"));
    }

    #[test]
    fn smiles_sniffing() {
        assert!(looks_like_smiles("CCO ethanol"));
        assert!(looks_like_smiles("c1ccccc1"));
        assert!(!looks_like_smiles("name,smiles"));
        assert!(!looks_like_smiles(""));
        assert!(!looks_like_smiles("$$$$"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Chains of organic subset atoms.
    fn simple_smiles() -> impl Strategy<Value = String> {
        let atoms = prop_oneof![Just("C"), Just("N"), Just("O"), Just("S"), Just("Cl"), Just("Br")];
        proptest::collection::vec(atoms, 1..=20).prop_map(|parts| parts.join(""))
    }

    proptest! {
        #[test]
        fn parse_smiles_does_not_panic(s in "\\PC{0,100}") {
            let _ = parse_smiles(&s);
        }

        #[test]
        fn chains_parse_to_one_atom_per_symbol(smi in simple_smiles()) {
            let mol = parse_smiles(&smi).unwrap();
            prop_assert!(mol.atom_count() > 0);
            prop_assert_eq!(mol.bond_count(), mol.atom_count() - 1);
        }
    }
}
