//! MOL V2000/V3000 connection tables and SDF record streams.
//!
//! An SDF file is a sequence of MOL blocks, each optionally followed by
//! `> <FIELD>` data items and terminated by a `$$$$` line. [`SdfBlocks`]
//! splits a reader into raw record texts lazily; [`parse_sdf_record`] and
//! [`parse_molblock`] turn one text into a molecule. A malformed record fails
//! on its own and never affects its neighbours.

use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;

use molintake_core::{ErrorCode, IntakeError, Result};

use crate::element::{element_by_number, element_by_symbol, implicit_hydrogens_for};
use crate::molecule::{Bond, BondOrder, MolAtom, Molecule};

/// Data item names consulted, in order, for a record's display name.
pub const NAME_PROPERTIES: [&str; 5] = ["NAME", "COMPOUND_NAME", "MOLECULE_NAME", "TITLE", "COMMON_NAME"];

/// Data item names consulted, in order, for a record's external identifier.
pub const ID_PROPERTIES: [&str; 10] = [
    "ID",
    "COMPOUND_ID",
    "MOL_ID",
    "MOLECULE_ID",
    "CAS",
    "CAS_NUMBER",
    "CHEMBL_ID",
    "PUBCHEM_CID",
    "INCHIKEY",
    "INCHI_KEY",
];

type CtabResult<T> = std::result::Result<T, String>;

/// One parsed SDF record.
#[derive(Debug, Clone)]
pub struct SdfRecord {
    /// First header line of the MOL block.
    pub title: String,
    pub molecule: Molecule,
    /// Data items keyed by field name as written.
    pub properties: BTreeMap<String, String>,
}

impl SdfRecord {
    /// Case-insensitive data item lookup; blank values count as absent.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// The title line, else the first name-like data item.
    pub fn display_name(&self) -> Option<&str> {
        let title = self.title.trim();
        if !title.is_empty() {
            return Some(title);
        }
        NAME_PROPERTIES.iter().find_map(|k| self.property(k))
    }

    /// The first identifier-like data item.
    pub fn external_id(&self) -> Option<&str> {
        ID_PROPERTIES.iter().find_map(|k| self.property(k))
    }
}

/// Parse a standalone MOL block. Failures carry `INVALID_MOLFILE`.
pub fn parse_molblock(text: &str) -> Result<Molecule> {
    let lines: Vec<&str> = text.lines().collect();
    let end = lines
        .iter()
        .position(|l| l.starts_with("M  END"))
        .map_or(lines.len(), |i| i + 1);
    parse_ctab(&lines[..end]).map_err(|msg| IntakeError::parsing(ErrorCode::InvalidMolfile, msg))
}

/// Parse one SDF record (MOL block plus data items). Failures carry
/// `INVALID_SDF`.
pub fn parse_sdf_record(text: &str) -> Result<SdfRecord> {
    let fail = |msg: String| IntakeError::parsing(ErrorCode::InvalidSdf, msg);
    let lines: Vec<&str> = text.lines().collect();
    if lines.iter().all(|l| l.trim().is_empty()) {
        return Err(IntakeError::parsing(ErrorCode::EmptyInput, "empty SDF record"));
    }
    let end = lines
        .iter()
        .position(|l| l.starts_with("M  END"))
        .ok_or_else(|| fail("record has no 'M  END' line".into()))?;
    let molecule = parse_ctab(&lines[..=end]).map_err(fail)?;
    let properties = parse_data_items(&lines[end + 1..]);
    Ok(SdfRecord {
        title: molecule.name.clone(),
        molecule,
        properties,
    })
}

/// Parse every record of an in-memory SDF text.
pub fn parse_sdf(input: &str) -> Vec<Result<SdfRecord>> {
    SdfBlocks::new(input.as_bytes())
        .map(|block| block.map_err(IntakeError::from).and_then(|b| parse_sdf_record(&b.text)))
        .collect()
}

/// Whether the block is a V3000 connection table.
pub fn is_v3000(block: &str) -> bool {
    block.lines().take(5).any(|line| line.contains("V3000")) || block.contains("M  V30 BEGIN CTAB")
}

fn parse_ctab(lines: &[&str]) -> CtabResult<Molecule> {
    if lines.len() < 4 {
        return Err("MOL block too short: expected three header lines and a counts line".into());
    }
    let name = lines[0].trim().to_string();
    let (mut atoms, bonds) = if lines[3].contains("V3000") {
        parse_v3000(lines)?
    } else {
        parse_v2000(lines)?
    };
    for bond in &bonds {
        if bond.order == BondOrder::Aromatic {
            atoms[bond.atom1].is_aromatic = true;
            atoms[bond.atom2].is_aromatic = true;
        }
    }
    assign_implicit_hydrogens(&mut atoms, &bonds);
    Ok(Molecule::new(name, atoms, bonds))
}

fn field<'a>(line: &'a str, range: std::ops::Range<usize>) -> &'a str {
    let end = range.end.min(line.len());
    line.get(range.start.min(end)..end).unwrap_or("").trim()
}

fn parse_count(line: &str, range: std::ops::Range<usize>, what: &str) -> CtabResult<usize> {
    let raw = field(line, range);
    raw.parse()
        .map_err(|_| format!("invalid {what} in counts line: '{raw}'"))
}

fn parse_v2000(lines: &[&str]) -> CtabResult<(Vec<MolAtom>, Vec<Bond>)> {
    let counts = lines[3];
    let num_atoms = parse_count(counts, 0..3, "atom count")?;
    let num_bonds = parse_count(counts, 3..6, "bond count")?;

    let atom_start = 4;
    let bond_start = atom_start + num_atoms;
    let props_start = bond_start + num_bonds;
    if lines.len() < props_start {
        return Err(format!(
            "counts line declares {num_atoms} atoms and {num_bonds} bonds but the block has only {} lines",
            lines.len()
        ));
    }

    let mut atoms = lines[atom_start..bond_start]
        .iter()
        .map(|l| parse_v2000_atom(l))
        .collect::<CtabResult<Vec<_>>>()?;
    let mut bonds = Vec::with_capacity(num_bonds);
    for line in &lines[bond_start..props_start] {
        let a1 = parse_count(line, 0..3, "bond atom")?;
        let a2 = parse_count(line, 3..6, "bond atom")?;
        let code = parse_count(line, 6..9, "bond type")?;
        push_bond(&mut bonds, num_atoms, a1, a2, code)?;
    }

    let mut charges_reset = false;
    for line in &lines[props_start..] {
        if line.starts_with("M  END") {
            break;
        }
        if line.starts_with("M  CHG") {
            // M  CHG supersedes every charge in the atom block
            if !charges_reset {
                atoms.iter_mut().for_each(|a| a.formal_charge = 0);
                charges_reset = true;
            }
            for (idx, value) in property_pairs(line)? {
                let atom = atom_at(&mut atoms, idx)?;
                atom.formal_charge =
                    i8::try_from(value).map_err(|_| format!("charge {value} out of range"))?;
            }
        } else if line.starts_with("M  ISO") {
            for (idx, value) in property_pairs(line)? {
                let atom = atom_at(&mut atoms, idx)?;
                atom.isotope =
                    Some(u16::try_from(value).map_err(|_| format!("isotope {value} out of range"))?);
            }
        }
    }
    Ok((atoms, bonds))
}

fn atom_at(atoms: &mut [MolAtom], one_based: i64) -> CtabResult<&mut MolAtom> {
    let len = atoms.len();
    usize::try_from(one_based)
        .ok()
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| atoms.get_mut(i))
        .ok_or_else(|| format!("property line references atom {one_based} of {len}"))
}

/// `M  XXX  n  aaa vvv ...` pairs.
fn property_pairs(line: &str) -> CtabResult<Vec<(i64, i64)>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let count: usize = parts
        .get(2)
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| format!("invalid property line: '{line}'"))?;
    if parts.len() < 3 + 2 * count {
        return Err(format!("property line declares {count} entries: '{line}'"));
    }
    (0..count)
        .map(|i| {
            let idx: i64 = parts[3 + 2 * i].parse().map_err(|_| format!("invalid atom index in '{line}'"))?;
            let val: i64 = parts[4 + 2 * i].parse().map_err(|_| format!("invalid value in '{line}'"))?;
            Ok((idx, val))
        })
        .collect()
}

fn element_atom(symbol: &str) -> CtabResult<MolAtom> {
    match symbol {
        "D" => Ok(MolAtom { isotope: Some(2), ..MolAtom::new(1) }),
        "T" => Ok(MolAtom { isotope: Some(3), ..MolAtom::new(1) }),
        _ => element_by_symbol(symbol)
            .map(|e| MolAtom::new(e.atomic_number))
            .ok_or_else(|| format!("unknown element '{symbol}'")),
    }
}

fn parse_v2000_atom(line: &str) -> CtabResult<MolAtom> {
    // x(0..10) y(10..20) z(20..30) _ symbol(31..34) dd(34..36) ccc(36..39)
    if line.len() < 34 {
        return Err(format!("atom line too short: '{line}'"));
    }
    let mut atom = element_atom(field(line, 31..34))?;
    atom.formal_charge = match field(line, 36..39).parse::<u8>() {
        Ok(1) => 3,
        Ok(2) => 2,
        Ok(3) => 1,
        Ok(5) => -1,
        Ok(6) => -2,
        Ok(7) => -3,
        _ => 0,
    };
    Ok(atom)
}

fn push_bond(bonds: &mut Vec<Bond>, num_atoms: usize, a1: usize, a2: usize, code: usize) -> CtabResult<()> {
    if a1 == 0 || a2 == 0 || a1 > num_atoms || a2 > num_atoms {
        return Err(format!("bond references atom outside 1..={num_atoms}: {a1}-{a2}"));
    }
    if a1 == a2 {
        return Err(format!("bond from atom {a1} to itself"));
    }
    let order = u8::try_from(code)
        .ok()
        .and_then(BondOrder::from_mdl)
        .ok_or_else(|| format!("unsupported bond type {code}"))?;
    let (a, b) = (a1 - 1, a2 - 1);
    if bonds.iter().any(|bd| (bd.atom1 == a && bd.atom2 == b) || (bd.atom1 == b && bd.atom2 == a)) {
        return Err(format!("duplicate bond {a1}-{a2}"));
    }
    bonds.push(Bond::new(a, b, order));
    Ok(())
}

/// Join `M  V30` lines, honouring `-` continuation markers.
fn v30_statements(lines: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut continuing = false;
    for line in lines {
        let Some(rest) = line.strip_prefix("M  V30") else {
            continue;
        };
        let rest = rest.trim();
        let (body, continues) = match rest.strip_suffix('-') {
            Some(b) => (b.trim_end(), true),
            None => (rest, false),
        };
        match out.last_mut() {
            Some(last) if continuing => {
                last.push(' ');
                last.push_str(body);
            }
            _ => out.push(body.to_string()),
        }
        continuing = continues;
    }
    out
}

fn parse_v3000(lines: &[&str]) -> CtabResult<(Vec<MolAtom>, Vec<Bond>)> {
    let statements = v30_statements(lines);
    let counts = statements
        .iter()
        .find(|s| s.starts_with("COUNTS"))
        .ok_or("V3000: missing COUNTS line")?;
    let parts: Vec<&str> = counts.split_whitespace().collect();
    let num_atoms: usize = parts
        .get(1)
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| format!("V3000: invalid atom count in '{counts}'"))?;
    let num_bonds: usize = parts
        .get(2)
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| format!("V3000: invalid bond count in '{counts}'"))?;

    let section = |name: &str| -> Option<&[String]> {
        let begin = statements.iter().position(|s| *s == format!("BEGIN {name}"))?;
        let end = statements.iter().position(|s| *s == format!("END {name}"))?;
        (end > begin).then(|| &statements[begin + 1..end])
    };

    let atom_lines = section("ATOM").ok_or("V3000: missing ATOM block")?;
    if atom_lines.len() != num_atoms {
        return Err(format!("V3000: COUNTS declares {num_atoms} atoms but the ATOM block has {}", atom_lines.len()));
    }
    let bond_lines = section("BOND").unwrap_or(&[]);
    if bond_lines.len() != num_bonds {
        return Err(format!("V3000: COUNTS declares {num_bonds} bonds but the BOND block has {}", bond_lines.len()));
    }

    let mut atoms = Vec::with_capacity(atom_lines.len());
    let mut index_of: HashMap<usize, usize> = HashMap::new();
    for stmt in atom_lines {
        let parts: Vec<&str> = stmt.split_whitespace().collect();
        if parts.len() < 6 {
            return Err(format!("V3000: atom line too short: '{stmt}'"));
        }
        let idx: usize = parts[0]
            .parse()
            .map_err(|_| format!("V3000: invalid atom index '{}'", parts[0]))?;
        let mut atom = element_atom(parts[1])?;
        for kv in &parts[6..] {
            if let Some(v) = kv.strip_prefix("CHG=") {
                atom.formal_charge = v.parse().map_err(|_| format!("V3000: invalid CHG value '{v}'"))?;
            } else if let Some(v) = kv.strip_prefix("MASS=") {
                atom.isotope = Some(v.parse().map_err(|_| format!("V3000: invalid MASS value '{v}'"))?);
            }
        }
        if index_of.insert(idx, atoms.len()).is_some() {
            return Err(format!("V3000: duplicate atom index {idx}"));
        }
        atoms.push(atom);
    }
    let mut bonds = Vec::with_capacity(bond_lines.len());
    for stmt in bond_lines {
        let parts: Vec<&str> = stmt.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(format!("V3000: bond line too short: '{stmt}'"));
        }
        let num = |s: &str| s.parse::<usize>().map_err(|_| format!("V3000: invalid number '{s}' in '{stmt}'"));
        let code = num(parts[1])?;
        let resolve = |s: &str| -> CtabResult<usize> {
            let i = num(s)?;
            index_of
                .get(&i)
                .map(|&p| p + 1)
                .ok_or_else(|| format!("V3000: bond references unknown atom {i}"))
        };
        let (a1, a2) = (resolve(parts[2])?, resolve(parts[3])?);
        push_bond(&mut bonds, num_atoms, a1, a2, code)?;
    }
    Ok((atoms, bonds))
}

/// MOL atoms carry no hydrogen counts; derive them from default valences.
fn assign_implicit_hydrogens(atoms: &mut [MolAtom], bonds: &[Bond]) {
    let mut bond_sum = vec![0u8; atoms.len()];
    for bond in bonds {
        let v = bond.order.valence_contribution();
        bond_sum[bond.atom1] = bond_sum[bond.atom1].saturating_add(v);
        bond_sum[bond.atom2] = bond_sum[bond.atom2].saturating_add(v);
    }
    for (i, atom) in atoms.iter_mut().enumerate() {
        if atom.is_hydrogen() {
            continue;
        }
        atom.implicit_hydrogens = if atom.is_aromatic {
            element_by_number(atom.atomic_number)
                .and_then(|e| e.default_valence())
                .map_or(0, |v| v.saturating_sub(1).saturating_sub(bond_sum[i]))
        } else {
            implicit_hydrogens_for(atom.atomic_number, atom.formal_charge, bond_sum[i])
        };
    }
}

/// `> <FIELD>` headers followed by value lines up to a blank line.
fn parse_data_items(lines: &[&str]) -> BTreeMap<String, String> {
    let mut items = BTreeMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    for line in lines {
        if line.starts_with('>') {
            if let Some((key, values)) = current.take() {
                items.insert(key, values.join("\n"));
            }
            let key = line
                .find('<')
                .and_then(|start| line[start + 1..].find('>').map(|len| &line[start + 1..start + 1 + len]));
            current = key.map(|k| (k.trim().to_string(), Vec::new()));
        } else if line.trim().is_empty() {
            if let Some((key, values)) = current.take() {
                items.insert(key, values.join("\n"));
            }
        } else if let Some((_, values)) = current.as_mut() {
            values.push(line.trim_end());
        }
    }
    if let Some((key, values)) = current {
        items.insert(key, values.join("\n"));
    }
    items
}

/// Raw text of one SDF record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    /// 0-based position of the record in the stream.
    pub index: usize,
    /// 1-based line number of the record's first line.
    pub first_line: usize,
    pub text: String,
}

/// Lazily splits a reader on `$$$$` terminator lines.
///
/// Blank-only records are skipped; a trailing record without a terminator is
/// still yielded.
pub struct SdfBlocks<R> {
    reader: R,
    line_no: usize,
    next_index: usize,
    done: bool,
}

impl<R: BufRead> SdfBlocks<R> {
    pub fn new(reader: R) -> Self {
        SdfBlocks { reader, line_no: 0, next_index: 0, done: false }
    }

    fn emit(&mut self, first_line: usize, text: String) -> RawBlock {
        let block = RawBlock { index: self.next_index, first_line, text };
        self.next_index += 1;
        block
    }
}

impl<R: BufRead> Iterator for SdfBlocks<R> {
    type Item = std::io::Result<RawBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut text = String::new();
        let mut first_line = self.line_no + 1;
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    return (!text.trim().is_empty()).then(|| Ok(self.emit(first_line, text)));
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
            self.line_no += 1;
            let content = line.trim_end_matches(&['\n', '\r'][..]);
            if content.trim_end() == "$$$$" {
                if text.trim().is_empty() {
                    text.clear();
                    first_line = self.line_no + 1;
                    continue;
                }
                return Some(Ok(self.emit(first_line, text)));
            }
            text.push_str(content);
            text.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use molintake_core::Annotated;

    fn minimal_mol() -> &'static str {
        "\
Methane
     RDKit          3D

  1  0  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
M  END"
    }

    fn ethanol_record() -> String {
        "\
Ethanol
  molintake

  3  2  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.0000    1.4000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  2  3  1  0
M  END
> <CHEMBL_ID>
CHEMBL545

> <Potency>
12.5

"
        .to_string()
    }

    #[test]
    fn parse_minimal_mol() {
        let mol = parse_molblock(minimal_mol()).unwrap();
        assert_eq!(mol.name(), "Methane");
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.atoms[0].atomic_number, 6);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);
    }

    #[test]
    fn parse_record_with_data_items() {
        let rec = parse_sdf_record(&ethanol_record()).unwrap();
        assert_eq!(rec.molecule.atom_count(), 3);
        assert_eq!(rec.molecule.atoms[2].implicit_hydrogens, 1);
        assert_eq!(rec.property("chembl_id"), Some("CHEMBL545"));
        assert_eq!(rec.property("POTENCY"), Some("12.5"));
        assert_eq!(rec.display_name(), Some("Ethanol"));
        assert_eq!(rec.external_id(), Some("CHEMBL545"));
    }

    #[test]
    fn name_falls_back_to_property() {
        let text = ethanol_record().replacen("Ethanol", "", 1).replace("Potency", "Name");
        let rec = parse_sdf_record(&text).unwrap();
        assert_eq!(rec.display_name(), Some("12.5"));
    }

    #[test]
    fn parse_mol_with_charges_and_isotopes() {
        let mol_str = "\
Charged
     RDKit          3D

  2  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 N   0  3  0  0  0  0  0  0  0  0  0  0
    1.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
M  CHG  1   2  -1
M  ISO  1   1  15
M  END";
        let mol = parse_molblock(mol_str).unwrap();
        // M  CHG resets the atom-block charge on N
        assert_eq!(mol.atoms[0].formal_charge, 0);
        assert_eq!(mol.atoms[1].formal_charge, -1);
        assert_eq!(mol.atoms[0].isotope, Some(15));
        assert_eq!(mol.atoms[0].implicit_hydrogens, 2);
        assert_eq!(mol.atoms[1].implicit_hydrogens, 0);
    }

    #[test]
    fn aromatic_bond_type_marks_atoms() {
        let mut block = String::from("Benzene\n\n\n  6  6  0  0  0  0  0  0  0  0999 V2000\n");
        for _ in 0..6 {
            block.push_str("    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n");
        }
        for i in 1..=6 {
            block.push_str(&format!("{:>3}{:>3}  4  0\n", i, i % 6 + 1));
        }
        block.push_str("M  END\n");
        let mol = parse_molblock(&block).unwrap();
        assert!(mol.atoms.iter().all(|a| a.is_aromatic && a.implicit_hydrogens == 1));
    }

    #[test]
    fn malformed_counts_fail_with_code() {
        let err = parse_molblock("name\nprog\ncomment\nabc  0").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidMolfile);
        let err = parse_molblock("too\nshort").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidMolfile);
        // counts claim more atoms than present
        let truncated = "x\n\n\n  5  0  0  0  0  0  0  0  0  0999 V2000\nM  END\n";
        assert_eq!(parse_sdf_record(truncated).unwrap_err().code(), ErrorCode::InvalidSdf);
    }

    #[test]
    fn bad_bond_references_fail() {
        let text = "x\n\n\n  1  1  0  0  0  0  0  0  0  0999 V2000\n    0.0000    0.0000    0.0000 C   0  0\n  1  2  1  0\nM  END\n";
        let err = parse_molblock(text).unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn blocks_split_lazily_and_skip_blank_records() {
        let sdf = format!("{}\n$$$$\n\n$$$$\n{}\n$$$$\n", minimal_mol(), ethanol_record());
        let blocks: Vec<_> = SdfBlocks::new(sdf.as_bytes()).map(|b| b.unwrap()).collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].index, 0);
        assert_eq!(blocks[0].first_line, 1);
        assert_eq!(blocks[1].index, 1);
        assert_eq!(blocks[1].first_line, 10);
        assert!(blocks[1].text.starts_with("Ethanol"));
    }

    #[test]
    fn trailing_record_without_terminator() {
        let blocks: Vec<_> = SdfBlocks::new(minimal_mol().as_bytes()).collect();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn one_bad_record_does_not_poison_the_rest() {
        let sdf = format!(
            "{}\n$$$$\nbroken\n\n\n  x  y\nM  END\n$$$$\n{}\n$$$$\n",
            minimal_mol(),
            minimal_mol()
        );
        let results = parse_sdf(&sdf);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().code(), ErrorCode::InvalidSdf);
        assert!(results[2].is_ok());
    }

    fn minimal_v3000_methane() -> &'static str {
        "\
Methane
     RDKit          3D

  0  0  0  0  0  0  0  0  0  0  0 V3000
M  V30 BEGIN CTAB
M  V30 COUNTS 1 0 0 0 0
M  V30 BEGIN ATOM
M  V30 1 C 0.0000 0.0000 0.0000 0
M  V30 END ATOM
M  V30 END CTAB
M  END"
    }

    #[test]
    fn parse_v3000_minimal_methane() {
        assert!(is_v3000(minimal_v3000_methane()));
        let mol = parse_molblock(minimal_v3000_methane()).unwrap();
        assert_eq!(mol.name(), "Methane");
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);
    }

    #[test]
    fn parse_v3000_with_charges_and_continuation() {
        let mol_str = "\
ChargedMol
     RDKit          3D

  0  0  0  0  0  0  0  0  0  0  0 V3000
M  V30 BEGIN CTAB
M  V30 COUNTS 2 1 0 0 0
M  V30 BEGIN ATOM
M  V30 1 N 0.0000 0.0000 0.0000 0 -
M  V30 CHG=1
M  V30 2 O 1.0000 0.0000 0.0000 0 CHG=-1
M  V30 END ATOM
M  V30 BEGIN BOND
M  V30 1 1 1 2
M  V30 END BOND
M  V30 END CTAB
M  END";
        let mol = parse_molblock(mol_str).unwrap();
        assert_eq!(mol.atoms[0].formal_charge, 1);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 3);
        assert_eq!(mol.atoms[1].formal_charge, -1);
        assert_eq!(mol.bonds[0], Bond::new(0, 1, BondOrder::Single));
    }

    #[test]
    fn malformed_v3000_error() {
        let missing_atoms = "\
Bad
     RDKit          3D

  0  0  0  0  0  0  0  0  0  0  0 V3000
M  V30 BEGIN CTAB
M  V30 COUNTS 1 0 0 0 0
M  V30 END CTAB
M  END";
        assert!(parse_molblock(missing_atoms).is_err());

        let mismatch = "\
Mismatch
     RDKit          3D

  0  0  0  0  0  0  0  0  0  0  0 V3000
M  V30 BEGIN CTAB
M  V30 COUNTS 2 0 0 0 0
M  V30 BEGIN ATOM
M  V30 1 C 0.0000 0.0000 0.0000 0
M  V30 END ATOM
M  V30 END CTAB
M  END";
        assert_eq!(parse_molblock(mismatch).unwrap_err().code(), ErrorCode::InvalidMolfile);
    }

    fn v3000_block(counts: &str, atoms: &[&str], bonds: &[&str]) -> String {
        let mut text = String::from("Counts\n     RDKit          3D\n\n  0  0  0  0  0  0  0  0  0  0  0 V3000\n");
        text.push_str("M  V30 BEGIN CTAB\n");
        text.push_str(&format!("M  V30 COUNTS {counts}\n"));
        text.push_str("M  V30 BEGIN ATOM\n");
        for a in atoms {
            text.push_str(&format!("M  V30 {a}\n"));
        }
        text.push_str("M  V30 END ATOM\n");
        if !bonds.is_empty() {
            text.push_str("M  V30 BEGIN BOND\n");
            for b in bonds {
                text.push_str(&format!("M  V30 {b}\n"));
            }
            text.push_str("M  V30 END BOND\n");
        }
        text.push_str("M  V30 END CTAB\nM  END\n");
        text
    }

    const ETHANE_ATOMS: [&str; 2] = ["1 C 0.0 0.0 0.0 0", "2 C 1.5 0.0 0.0 0"];

    #[test]
    fn v3000_counts_must_match_block() {
        let ok = v3000_block("2 1 0 0 0", &ETHANE_ATOMS, &["1 1 1 2"]);
        assert_eq!(parse_molblock(&ok).unwrap().bond_count(), 1);

        let cases = [
            v3000_block("3000000000000000000 0 0 0 0", &ETHANE_ATOMS, &[]),
            v3000_block("18446744073709551615 1 0 0 0", &ETHANE_ATOMS, &["1 1 1 2"]),
            v3000_block("2 4000000000000000000 0 0 0", &ETHANE_ATOMS, &["1 1 1 2"]),
            v3000_block("3 1 0 0 0", &ETHANE_ATOMS, &["1 1 1 2"]),
            v3000_block("1 1 0 0 0", &ETHANE_ATOMS, &["1 1 1 2"]),
            v3000_block("2 2 0 0 0", &ETHANE_ATOMS, &["1 1 1 2"]),
            v3000_block("2 0 0 0 0", &ETHANE_ATOMS, &["1 1 1 2"]),
            v3000_block("99999999999999999999999 0 0 0 0", &ETHANE_ATOMS, &[]),
        ];
        for text in &cases {
            let err = parse_molblock(text).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidMolfile, "{text}");
        }
    }

    #[test]
    fn huge_v3000_count_fails_only_its_record() {
        let bad = v3000_block("3000000000000000000 0 0 0 0", &ETHANE_ATOMS, &[]);
        let sdf = format!("{}\n$$$$\n{bad}$$$$\n{}\n$$$$\n", minimal_mol(), minimal_mol());
        let results = parse_sdf(&sdf);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().code(), ErrorCode::InvalidSdf);
        assert!(results[2].is_ok());
    }
}
