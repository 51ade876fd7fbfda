//! Upload format detection.
//!
//! The file name decides first; content sniffing is the fallback. Compression
//! suffixes (`.gz`, `.zst`) are looked through, so `library.sdf.gz` is SDF.

use std::fmt;

use serde::{Deserialize, Serialize};

use molintake_chem::looks_like_smiles;
use molintake_core::{ErrorCode, IntakeError, Result};

/// Record layout of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// One SMILES per line, optionally followed by a name.
    Smiles,
    /// `$$$$`-terminated MOL blocks with data items.
    Sdf,
    /// A single MOL block.
    Mol,
    Csv,
    Tsv,
}

impl InputFormat {
    pub fn name(self) -> &'static str {
        match self {
            InputFormat::Smiles => "smiles",
            InputFormat::Sdf => "sdf",
            InputFormat::Mol => "mol",
            InputFormat::Csv => "csv",
            InputFormat::Tsv => "tsv",
        }
    }

    pub fn is_tabular(self) -> bool {
        matches!(self, InputFormat::Csv | InputFormat::Tsv)
    }

    /// Field delimiter for tabular formats.
    pub fn delimiter(self) -> Option<u8> {
        match self {
            InputFormat::Csv => Some(b','),
            InputFormat::Tsv => Some(b'\t'),
            _ => None,
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the caller knows about an upload's format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatHint {
    /// Declared format; skips detection when set.
    pub format: Option<InputFormat>,
    /// Original file name, used for extension-based detection.
    pub file_name: Option<String>,
}

impl FormatHint {
    /// Detect from content alone.
    pub fn auto() -> Self {
        Self::default()
    }

    pub fn format(format: InputFormat) -> Self {
        FormatHint { format: Some(format), file_name: None }
    }

    pub fn file_name(name: impl Into<String>) -> Self {
        FormatHint { format: None, file_name: Some(name.into()) }
    }

    /// Resolve the format from the hint and the first bytes of the
    /// (decompressed) stream.
    pub fn resolve(&self, head: &[u8]) -> Result<InputFormat> {
        match self.format {
            Some(format) => Ok(format),
            None => detect_format(self.file_name.as_deref(), head),
        }
    }
}

const SNIFF_BYTES: usize = 4096;

const SDF_MARKERS: [&[u8]; 4] = [b"$$$$", b"M  END", b"V2000", b"V3000"];

/// Zip container (xlsx) and OLE compound document (xls).
const SPREADSHEET_MAGIC: [&[u8]; 2] = [b"PK\x03\x04", b"\xD0\xCF\x11\xE0"];

/// Header words that mark a structure column.
const STRUCTURE_HEADER_WORDS: [&str; 4] = ["smiles", "structure", "molecule", "mol"];

/// Detect the format of an upload.
///
/// Undetectable input and spreadsheets fail with `UNSUPPORTED_FORMAT`.
pub fn detect_format(file_name: Option<&str>, head: &[u8]) -> Result<InputFormat> {
    if let Some(name) = file_name {
        if let Some(format) = format_from_extension(name)? {
            return Ok(format);
        }
    }
    format_from_content(head).ok_or_else(|| {
        IntakeError::parsing(ErrorCode::UnsupportedFormat, "could not detect the upload format")
            .with_detail("file_name", file_name.unwrap_or(""))
    })
}

fn format_from_extension(name: &str) -> Result<Option<InputFormat>> {
    let lower = name.to_ascii_lowercase();
    let stem = lower
        .strip_suffix(".gz")
        .or_else(|| lower.strip_suffix(".zst"))
        .unwrap_or(&lower);
    let Some((_, ext)) = stem.rsplit_once('.') else {
        return Ok(None);
    };
    Ok(match ext {
        "sdf" | "sd" => Some(InputFormat::Sdf),
        "mol" => Some(InputFormat::Mol),
        "csv" => Some(InputFormat::Csv),
        "tsv" | "tab" => Some(InputFormat::Tsv),
        "smi" | "smiles" | "txt" => Some(InputFormat::Smiles),
        "xlsx" | "xls" => return Err(spreadsheet_error(name)),
        _ => None,
    })
}

fn spreadsheet_error(name: &str) -> IntakeError {
    IntakeError::parsing(
        ErrorCode::UnsupportedFormat,
        "spreadsheet uploads are not supported; export the sheet as CSV",
    )
    .with_detail("file_name", name)
}

fn format_from_content(head: &[u8]) -> Option<InputFormat> {
    let sample = &head[..head.len().min(SNIFF_BYTES)];
    if SPREADSHEET_MAGIC.iter().any(|m| sample.starts_with(m)) {
        return None;
    }
    if SDF_MARKERS.iter().any(|m| contains(sample, m)) {
        return Some(InputFormat::Sdf);
    }

    let text = String::from_utf8_lossy(sample);
    let mut lines = text.lines();
    let header = lines.next().unwrap_or("").to_ascii_lowercase();
    let names_structure = STRUCTURE_HEADER_WORDS.iter().any(|w| header.contains(w));
    if names_structure && header.contains('\t') {
        return Some(InputFormat::Tsv);
    }
    if names_structure && header.contains(',') {
        return Some(InputFormat::Csv);
    }

    let smiles_lines = text
        .lines()
        .take(10)
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter(|l| looks_like_smiles(l))
        .count();
    (smiles_lines >= 3).then_some(InputFormat::Smiles)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
