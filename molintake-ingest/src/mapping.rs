//! Column mapping for tabular uploads.

use serde::{Deserialize, Serialize};

use molintake_core::{IntakeError, Result};

/// Header names recognised as the structure column, in priority order.
pub const STRUCTURE_COLUMNS: [&str; 9] = [
    "smiles",
    "canonical_smiles",
    "isomeric_smiles",
    "structure",
    "molecule",
    "mol",
    "compound",
    "smi",
    "input_smiles",
];

pub const NAME_COLUMNS: [&str; 8] = [
    "name",
    "compound_name",
    "molecule_name",
    "mol_name",
    "title",
    "common_name",
    "preferred_name",
    "generic_name",
];

pub const ID_COLUMNS: [&str; 11] = [
    "id",
    "compound_id",
    "molecule_id",
    "mol_id",
    "external_id",
    "ext_id",
    "cas",
    "cas_number",
    "chembl_id",
    "pubchem_cid",
    "registry_number",
];

/// Which columns of a CSV/TSV upload hold what.
///
/// Unset columns are auto-detected from the header. With an empty
/// `property_columns`, every column not otherwise mapped becomes a record
/// property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub structure_column: Option<String>,
    pub name_column: Option<String>,
    pub id_column: Option<String>,
    pub property_columns: Vec<String>,
}

/// A mapping resolved to column positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub structure: usize,
    pub name: Option<usize>,
    pub id: Option<usize>,
    /// (header, position) pairs copied into record properties.
    pub properties: Vec<(String, usize)>,
}

impl ColumnMapping {
    pub fn structure(column: impl Into<String>) -> Self {
        ColumnMapping { structure_column: Some(column.into()), ..Default::default() }
    }

    pub fn with_name(mut self, column: impl Into<String>) -> Self {
        self.name_column = Some(column.into());
        self
    }

    pub fn with_id(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    /// Resolve against a header row.
    ///
    /// A named column missing from the header, or no detectable structure
    /// column, is an `InvalidInput` error.
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedColumns> {
        let structure = match &self.structure_column {
            Some(col) => find_named(headers, col, "structure")?,
            None => detect(headers, &STRUCTURE_COLUMNS).ok_or_else(|| {
                IntakeError::InvalidInput(format!(
                    "no structure column found among [{}]; map one explicitly",
                    headers.join(", ")
                ))
            })?,
        };
        let name = match &self.name_column {
            Some(col) => Some(find_named(headers, col, "name")?),
            None => detect(headers, &NAME_COLUMNS).filter(|&i| i != structure),
        };
        let id = match &self.id_column {
            Some(col) => Some(find_named(headers, col, "id")?),
            None => detect(headers, &ID_COLUMNS).filter(|&i| i != structure && Some(i) != name),
        };

        let mapped = |i: usize| i == structure || Some(i) == name || Some(i) == id;
        let properties = if self.property_columns.is_empty() {
            headers
                .iter()
                .enumerate()
                .filter(|&(i, h)| !mapped(i) && !h.trim().is_empty())
                .map(|(i, h)| (h.clone(), i))
                .collect()
        } else {
            self.property_columns
                .iter()
                .map(|col| find_named(headers, col, "property").map(|i| (headers[i].clone(), i)))
                .collect::<Result<Vec<_>>>()?
        };
        Ok(ResolvedColumns { structure, name, id, properties })
    }
}

fn normalize_header(h: &str) -> String {
    h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn find_named(headers: &[String], column: &str, role: &str) -> Result<usize> {
    let wanted = normalize_header(column);
    headers
        .iter()
        .position(|h| normalize_header(h) == wanted)
        .ok_or_else(|| {
            IntakeError::InvalidInput(format!(
                "{role} column '{column}' not found among [{}]",
                headers.join(", ")
            ))
        })
}

fn detect(headers: &[String], candidates: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    candidates
        .iter()
        .find_map(|c| normalized.iter().position(|h| h == c))
}
