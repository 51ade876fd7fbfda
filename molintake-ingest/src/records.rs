//! Lazy per-record readers over an upload.
//!
//! Each reader yields one item per input record: the outer `Result` carries
//! batch-fatal stream failures, the inner one separates a parsed structure
//! from a row-level [`RowError`]. A bad record never stops iteration.

use std::collections::BTreeMap;
use std::io::{BufRead, Read};

use serde::{Deserialize, Serialize};

use molintake_chem::{parse_molblock, parse_sdf_record, parse_smiles_named, Molecule, SdfBlocks};
use molintake_core::{Annotated, ErrorCode, IntakeError, Result};

use crate::format::InputFormat;
use crate::mapping::{ColumnMapping, ResolvedColumns};

/// Longest raw excerpt kept on a row error, in characters.
pub const EXCERPT_CHARS: usize = 200;

/// One parsed input record with its source metadata.
#[derive(Debug, Clone)]
pub struct ParsedStructure {
    /// 0-based record position in the upload.
    pub row_index: usize,
    /// 1-based line where the record starts, for line-oriented formats.
    pub source_line: Option<usize>,
    /// The record text as submitted (the structure cell for tabular input).
    pub raw: String,
    pub name: Option<String>,
    pub external_id: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub molecule: Molecule,
}

impl Annotated for ParsedStructure {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    fn description(&self) -> Option<&str> {
        self.external_id.as_deref()
    }
}

/// A failure confined to one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row_index: usize,
    /// The offending input, cut to [`EXCERPT_CHARS`] characters.
    pub excerpt: String,
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl RowError {
    pub fn new(row_index: usize, raw: &str, code: ErrorCode, message: impl Into<String>) -> Self {
        RowError {
            row_index,
            excerpt: excerpt(raw),
            code,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Capture an error raised while handling one row.
    pub fn from_error(row_index: usize, raw: &str, err: &IntakeError) -> Self {
        match err.failure() {
            Some(f) => RowError {
                details: f.details.clone(),
                ..RowError::new(row_index, raw, f.code, f.message.clone())
            },
            None => RowError::new(row_index, raw, err.code(), err.to_string()),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }

    pub fn is_user_error(&self) -> bool {
        self.code.is_user_error()
    }
}

/// Cut `raw` to [`EXCERPT_CHARS`] characters, never splitting a character.
pub fn excerpt(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(EXCERPT_CHARS) {
        Some((byte, _)) => trimmed[..byte].to_string(),
        None => trimmed.to_string(),
    }
}

/// Parsed-or-failed record; the outer error is batch-fatal.
pub type RecordItem = Result<std::result::Result<ParsedStructure, RowError>>;

/// A boxed lazy record stream.
pub type RecordStream<'a> = Box<dyn Iterator<Item = RecordItem> + 'a>;

/// Open a record stream of `format` over `reader`.
///
/// For tabular input the header is read and `mapping` resolved here, so a bad
/// mapping fails before any row is produced.
pub fn open_records<'a, R: BufRead + 'a>(
    reader: R,
    format: InputFormat,
    mapping: &ColumnMapping,
) -> Result<RecordStream<'a>> {
    Ok(match format {
        InputFormat::Smiles => Box::new(SmilesRecords::new(reader)),
        InputFormat::Sdf => Box::new(SdfRecords::new(reader)),
        InputFormat::Mol => Box::new(MolRecord::new(reader)),
        InputFormat::Csv | InputFormat::Tsv => {
            let delimiter = format.delimiter().unwrap_or(b',');
            Box::new(TabularRecords::new(reader, delimiter, mapping)?)
        }
    })
}

/// SMILES list: one record per non-blank, non-`#` line.
pub struct SmilesRecords<R> {
    reader: R,
    line_no: usize,
    next_row: usize,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> SmilesRecords<R> {
    pub fn new(reader: R) -> Self {
        SmilesRecords { reader, line_no: 0, next_row: 0, buf: Vec::new(), done: false }
    }
}

impl<R: BufRead> Iterator for SmilesRecords<R> {
    type Item = RecordItem;

    fn next(&mut self) -> Option<RecordItem> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
            self.line_no += 1;
            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    let row_index = self.next_row;
                    self.next_row += 1;
                    let raw = String::from_utf8_lossy(&self.buf);
                    let err = RowError::new(row_index, &raw, ErrorCode::UnsupportedFormat, format!("invalid UTF-8: {e}"))
                        .with_detail("line", self.line_no);
                    return Some(Ok(Err(err)));
                }
            };
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let row_index = self.next_row;
            self.next_row += 1;
            return Some(Ok(parse_smiles_line(line, row_index, self.line_no)));
        }
    }
}

fn parse_smiles_line(line: &str, row_index: usize, line_no: usize) -> std::result::Result<ParsedStructure, RowError> {
    let (smiles, name) = match line.split_once(char::is_whitespace) {
        Some((s, rest)) => (s, Some(rest.trim()).filter(|n| !n.is_empty())),
        None => (line, None),
    };
    match parse_smiles_named(smiles, name.unwrap_or("")) {
        Ok(molecule) => Ok(ParsedStructure {
            row_index,
            source_line: Some(line_no),
            raw: line.to_string(),
            name: name.map(str::to_string),
            external_id: None,
            properties: BTreeMap::new(),
            molecule,
        }),
        Err(e) => Err(RowError::from_error(row_index, line, &e).with_detail("line", line_no)),
    }
}

/// SDF: one record per `$$$$`-terminated block.
pub struct SdfRecords<R> {
    blocks: SdfBlocks<R>,
}

impl<R: BufRead> SdfRecords<R> {
    pub fn new(reader: R) -> Self {
        SdfRecords { blocks: SdfBlocks::new(reader) }
    }
}

impl<R: BufRead> Iterator for SdfRecords<R> {
    type Item = RecordItem;

    fn next(&mut self) -> Option<RecordItem> {
        let block = match self.blocks.next()? {
            Ok(block) => block,
            Err(e) => return Some(Err(e.into())),
        };
        let parsed = match parse_sdf_record(&block.text) {
            Ok(record) => Ok(ParsedStructure {
                row_index: block.index,
                source_line: Some(block.first_line),
                name: record.display_name().map(str::to_string),
                external_id: record.external_id().map(str::to_string),
                raw: block.text,
                properties: record.properties,
                molecule: record.molecule,
            }),
            Err(e) => Err(RowError::from_error(block.index, &block.text, &e).with_detail("line", block.first_line)),
        };
        Some(Ok(parsed))
    }
}

/// A standalone MOL block: the whole stream is one record.
pub struct MolRecord<R> {
    reader: Option<R>,
}

impl<R: Read> MolRecord<R> {
    pub fn new(reader: R) -> Self {
        MolRecord { reader: Some(reader) }
    }
}

impl<R: Read> Iterator for MolRecord<R> {
    type Item = RecordItem;

    fn next(&mut self) -> Option<RecordItem> {
        let mut reader = self.reader.take()?;
        let mut text = String::new();
        if let Err(e) = reader.read_to_string(&mut text) {
            return Some(Err(e.into()));
        }
        if text.trim().is_empty() {
            return Some(Ok(Err(RowError::new(0, "", ErrorCode::EmptyInput, "empty MOL file"))));
        }
        let parsed = match parse_molblock(&text) {
            Ok(molecule) => Ok(ParsedStructure {
                row_index: 0,
                source_line: Some(1),
                name: Some(molecule.name.trim().to_string()).filter(|n| !n.is_empty()),
                external_id: None,
                properties: BTreeMap::new(),
                raw: text,
                molecule,
            }),
            Err(e) => Err(RowError::from_error(0, &text, &e)),
        };
        Some(Ok(parsed))
    }
}

/// CSV or TSV with a header row, mapped through a [`ColumnMapping`].
pub struct TabularRecords<R> {
    records: csv::StringRecordsIntoIter<R>,
    columns: ResolvedColumns,
    next_row: usize,
}

impl<R: Read> TabularRecords<R> {
    pub fn new(reader: R, delimiter: u8, mapping: &ColumnMapping) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(csv_stream_error)?
            .iter()
            .map(str::to_string)
            .collect();
        let columns = mapping.resolve(&headers)?;
        Ok(TabularRecords { records: csv_reader.into_records(), columns, next_row: 0 })
    }

    fn row(&self, row_index: usize, record: &csv::StringRecord) -> std::result::Result<ParsedStructure, RowError> {
        let cell = |i: usize| record.get(i).map(str::trim).filter(|v| !v.is_empty());
        let line = record.position().map(|p| p.line() as usize);
        let Some(structure) = cell(self.columns.structure) else {
            let err = RowError::new(row_index, &join_record(record), ErrorCode::EmptyInput, "structure cell is empty");
            return Err(match line {
                Some(l) => err.with_detail("line", l),
                None => err,
            });
        };
        let parsed = if structure.contains("M  END") {
            parse_molblock(structure)
        } else {
            parse_smiles_named(structure, self.columns.name.and_then(cell).unwrap_or(""))
        };
        match parsed {
            Ok(molecule) => Ok(ParsedStructure {
                row_index,
                source_line: line,
                raw: structure.to_string(),
                name: self.columns.name.and_then(cell).map(str::to_string),
                external_id: self.columns.id.and_then(cell).map(str::to_string),
                properties: self
                    .columns
                    .properties
                    .iter()
                    .filter_map(|(h, i)| cell(*i).map(|v| (h.clone(), v.to_string())))
                    .collect(),
                molecule,
            }),
            Err(e) => {
                let err = RowError::from_error(row_index, structure, &e);
                Err(match line {
                    Some(l) => err.with_detail("line", l),
                    None => err,
                })
            }
        }
    }
}

fn join_record(record: &csv::StringRecord) -> String {
    record.iter().collect::<Vec<_>>().join(",")
}

fn csv_stream_error(err: csv::Error) -> IntakeError {
    if err.is_io_error() {
        match err.into_kind() {
            csv::ErrorKind::Io(io) => IntakeError::Io(io),
            other => IntakeError::InvalidInput(format!("{other:?}")),
        }
    } else {
        IntakeError::parsing(ErrorCode::UnsupportedFormat, format!("unreadable header row: {err}"))
    }
}

impl<R: Read> Iterator for TabularRecords<R> {
    type Item = RecordItem;

    fn next(&mut self) -> Option<RecordItem> {
        let result = self.records.next()?;
        let row_index = self.next_row;
        self.next_row += 1;
        Some(match result {
            Ok(record) => Ok(self.row(row_index, &record)),
            Err(e) if e.is_io_error() => Err(csv_stream_error(e)),
            Err(e) => Ok(Err(RowError::new(
                row_index,
                "",
                ErrorCode::UnsupportedFormat,
                format!("malformed row: {e}"),
            ))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(stream: RecordStream<'_>) -> Vec<std::result::Result<ParsedStructure, RowError>> {
        stream.map(|item| item.unwrap()).collect()
    }

    #[test]
    fn invalid_utf8_fails_only_its_line() {
        let mut input = b"CCO ethanol\n".to_vec();
        input.extend_from_slice(b"CC\xff\xfeO broken\n");
        input.extend_from_slice(b"c1ccccc1 benzene\n");
        let rows = collect(open_records(&input[..], InputFormat::Smiles, &ColumnMapping::default()).unwrap());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().name.as_deref(), Some("ethanol"));

        let err = rows[1].as_ref().unwrap_err();
        assert_eq!(err.row_index, 1);
        assert_eq!(err.code, ErrorCode::UnsupportedFormat);
        assert!(err.message.contains("UTF-8"));
        assert_eq!(err.details.get("line").map(String::as_str), Some("2"));
        assert!(err.excerpt.starts_with("CC"));

        let last = rows[2].as_ref().unwrap();
        assert_eq!(last.row_index, 2);
        assert_eq!(last.source_line, Some(3));
    }

    #[test]
    fn smiles_list_skips_blanks_and_comments() {
        let input = "# header\nCCO ethanol\n\nc1ccccc1\n  # another\nnot_a_smiles\nCC(=O)O  acetic acid \n";
        let rows = collect(open_records(input.as_bytes(), InputFormat::Smiles, &ColumnMapping::default()).unwrap());
        assert_eq!(rows.len(), 4);
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.row_index, 0);
        assert_eq!(first.name.as_deref(), Some("ethanol"));
        assert_eq!(first.source_line, Some(2));
        assert_eq!(rows[1].as_ref().unwrap().row_index, 1);
        assert!(rows[1].as_ref().unwrap().name.is_none());
        let err = rows[2].as_ref().unwrap_err();
        assert_eq!(err.row_index, 2);
        assert_eq!(err.code, ErrorCode::InvalidSmiles);
        assert_eq!(err.details.get("line").map(String::as_str), Some("6"));
        assert_eq!(err.excerpt, "not_a_smiles");
        assert_eq!(rows[3].as_ref().unwrap().name.as_deref(), Some("acetic acid"));
    }

    #[test]
    fn sdf_records_continue_after_a_bad_block() {
        let good = "Water\n  test\n\n  1  0  0  0  0  0  0  0  0  0999 V2000\n    0.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0\nM  END\n> <ID>\nW-1\n\n$$$$\n";
        let bad = "Broken\n  test\n\n  X  Y\nM  END\n$$$$\n";
        let input = format!("{good}{bad}{good}");
        let rows = collect(open_records(input.as_bytes(), InputFormat::Sdf, &ColumnMapping::default()).unwrap());
        assert_eq!(rows.len(), 3);
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.name.as_deref(), Some("Water"));
        assert_eq!(first.external_id.as_deref(), Some("W-1"));
        let err = rows[1].as_ref().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSdf);
        assert_eq!(err.row_index, 1);
        assert_eq!(rows[2].as_ref().unwrap().row_index, 2);
    }

    #[test]
    fn mol_file_is_one_record() {
        let text = "Water\n  test\n\n  1  0  0  0  0  0  0  0  0  0999 V2000\n    0.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0\nM  END\n";
        let rows = collect(open_records(text.as_bytes(), InputFormat::Mol, &ColumnMapping::default()).unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].as_ref().unwrap().molecule.atom_count(), 1);

        let rows = collect(open_records("garbage\n".as_bytes(), InputFormat::Mol, &ColumnMapping::default()).unwrap());
        assert_eq!(rows[0].as_ref().unwrap_err().code, ErrorCode::InvalidMolfile);

        let rows = collect(open_records("  \n".as_bytes(), InputFormat::Mol, &ColumnMapping::default()).unwrap());
        assert_eq!(rows[0].as_ref().unwrap_err().code, ErrorCode::EmptyInput);
    }

    #[test]
    fn csv_rows_use_the_mapping() {
        let input = "id,smiles,name,ic50\nM1,CCO,ethanol,1.5\nM2,,empty,\nM3,C1CC,broken,2\n";
        let rows = collect(open_records(input.as_bytes(), InputFormat::Csv, &ColumnMapping::default()).unwrap());
        assert_eq!(rows.len(), 3);
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.external_id.as_deref(), Some("M1"));
        assert_eq!(first.name.as_deref(), Some("ethanol"));
        assert_eq!(first.properties.get("ic50").map(String::as_str), Some("1.5"));
        assert_eq!(rows[1].as_ref().unwrap_err().code, ErrorCode::EmptyInput);
        let err = rows[2].as_ref().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSmiles);
        assert_eq!(err.row_index, 2);
    }

    #[test]
    fn tsv_with_explicit_mapping() {
        let input = "label\tstruct\nphenol\tOc1ccccc1\n";
        let mapping = ColumnMapping::structure("struct").with_name("label");
        let rows = collect(open_records(input.as_bytes(), InputFormat::Tsv, &mapping).unwrap());
        assert_eq!(rows[0].as_ref().unwrap().name.as_deref(), Some("phenol"));
    }

    #[test]
    fn bad_mapping_is_fatal_before_rows() {
        let input = "a,b\n1,2\n";
        let result = open_records(input.as_bytes(), InputFormat::Csv, &ColumnMapping::default());
        assert!(matches!(result.err(), Some(IntakeError::InvalidInput(_))));
    }

    #[test]
    fn excerpts_are_bounded_on_char_boundaries() {
        let long = "é".repeat(300);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS);
        assert_eq!(excerpt("  CCO  "), "CCO");
    }

    #[test]
    fn row_error_keeps_failure_details() {
        let err = IntakeError::parsing(ErrorCode::InvalidSmiles, "unclosed ring").with_detail("position", 4);
        let row = RowError::from_error(7, "C1CC", &err);
        assert_eq!(row.row_index, 7);
        assert_eq!(row.code, ErrorCode::InvalidSmiles);
        assert_eq!(row.details.get("position").map(String::as_str), Some("4"));
        assert!(row.is_user_error());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn excerpt_is_a_bounded_prefix(raw in "\\PC{0,400}") {
            let cut = excerpt(&raw);
            prop_assert!(cut.chars().count() <= EXCERPT_CHARS);
            prop_assert!(raw.trim().starts_with(&cut));
        }

        #[test]
        fn smiles_rows_are_numbered_densely(lines in proptest::collection::vec("(CCO|c1ccccc1|#note|bad\\(|)", 0..30)) {
            let input = lines.join("\n");
            let rows: Vec<_> = SmilesRecords::new(input.as_bytes()).map(|item| item.unwrap()).collect();
            let expected = lines.iter().filter(|l| !l.is_empty() && !l.starts_with('#')).count();
            prop_assert_eq!(rows.len(), expected);
            for (i, row) in rows.iter().enumerate() {
                let index = match row {
                    Ok(parsed) => parsed.row_index,
                    Err(err) => err.row_index,
                };
                prop_assert_eq!(index, i);
            }
        }
    }
}
