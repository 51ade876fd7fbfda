//! Batch orchestration: bytes in, normalized records and a report out.
//!
//! [`Pipeline::records`] is the lazy per-record path: parse, normalize and
//! featurize one record at a time. [`Pipeline::run_batch`] drains that path,
//! then hands every successful record to the duplicate resolver in one call,
//! since within-batch detection needs the whole batch.

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, Read};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use molintake_chem::{compute_features, normalize, CanonicalMolecule, FeatureSet};
use molintake_core::compress::{corrupt_stream, decoding_reader, Algorithm};
use molintake_core::hash::HashingReader;
use molintake_core::{Annotated, ContentAddressable, ErrorCode, IntakeError, Result, Summarizable};

use crate::config::{Capabilities, PipelineConfig};
use crate::format::{FormatHint, InputFormat};
use crate::mapping::ColumnMapping;
use crate::records::{open_records, ParsedStructure, RecordStream, RowError};
use crate::resolver::{self, BatchEntry, ExistingLookup, Verdict};

/// A record that made it through parsing, normalization and featurization.
#[derive(Debug, Clone)]
pub struct ProcessedRow {
    pub row_index: usize,
    pub source_line: Option<usize>,
    pub name: Option<String>,
    pub external_id: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub molecule: CanonicalMolecule,
    pub features: FeatureSet,
}

impl Annotated for ProcessedRow {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    fn description(&self) -> Option<&str> {
        self.external_id.as_deref()
    }
}

impl ContentAddressable for ProcessedRow {
    fn content_hash(&self) -> String {
        self.molecule.content_hash.clone()
    }
}

/// What happened to one input record.
#[derive(Debug, Clone)]
pub enum RowOutcome {
    Processed(ProcessedRow),
    Failed(RowError),
}

impl RowOutcome {
    pub fn row_index(&self) -> usize {
        match self {
            RowOutcome::Processed(row) => row.row_index,
            RowOutcome::Failed(err) => err.row_index,
        }
    }
}

/// The ingestion pipeline, configured once and reusable across uploads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    capabilities: Capabilities,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline { config: PipelineConfig::default(), capabilities: Capabilities::detect() }
    }
}

impl Pipeline {
    /// Validate `config` and resolve the build's capabilities.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_capabilities(config, Capabilities::detect())
    }

    /// Like [`new`](Self::new), with capabilities narrowed by the caller.
    /// Capabilities the build lacks stay off.
    pub fn with_capabilities(config: PipelineConfig, requested: Capabilities) -> Result<Self> {
        config.validate()?;
        let built = Capabilities::detect();
        let capabilities = Capabilities {
            compression: requested.compression && built.compression,
            parallel: requested.parallel && built.parallel,
        };
        Ok(Pipeline { config, capabilities })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Lazily parse, normalize and featurize every record of an upload.
    ///
    /// Row-level failures are yielded as [`RowOutcome::Failed`]. A batch-fatal
    /// failure (unreadable or corrupt stream, undetectable format, bad column
    /// mapping) is yielded once as `Err`, after which the iterator ends.
    #[doc(alias = "parse_and_normalize_batch")]
    pub fn records<'a, R: Read + 'a>(
        &'a self,
        reader: R,
        hint: &FormatHint,
        mapping: &ColumnMapping,
    ) -> Records<'a> {
        match self.open(reader, hint, mapping) {
            Ok(source) => Records {
                pipeline: self,
                format: Some(source.format),
                compression: source.compression,
                stream: Some(source.stream),
                fatal: None,
            },
            Err(e) => Records {
                pipeline: self,
                format: None,
                compression: None,
                stream: None,
                fatal: Some(e),
            },
        }
    }

    /// Classify processed rows against the batch and the existing store.
    /// Verdicts align with `rows`; within-batch indices point into `rows`.
    pub fn resolve_duplicates(
        &self,
        rows: &[ProcessedRow],
        lookup: &dyn ExistingLookup,
    ) -> Result<Vec<Verdict>> {
        let entries: Vec<BatchEntry<'_>> = rows
            .iter()
            .map(|r| BatchEntry { molecule: &r.molecule, features: &r.features })
            .collect();
        resolver::resolve_duplicates(&entries, lookup, &self.config.dedup)
    }

    /// Process a whole upload and resolve its duplicates.
    ///
    /// Records are parsed in order, processed (in parallel when enabled) and
    /// then resolved in a single resolver call. Only batch-fatal conditions
    /// and lookup failures are returned as `Err`.
    pub fn run_batch<R: Read>(
        &self,
        reader: R,
        hint: &FormatHint,
        mapping: &ColumnMapping,
        lookup: &dyn ExistingLookup,
    ) -> Result<BatchResult> {
        let mut source = HashingReader::new(reader);
        let (parsed, format, compression) = {
            let opened = self.open(&mut source, hint, mapping).map_err(|e| {
                warn!("batch rejected: {e}");
                e
            })?;
            let compression = opened.compression;
            let mut parsed = Vec::new();
            for item in opened.stream {
                match item {
                    Ok(record) => parsed.push(record),
                    Err(e) => {
                        let e = stream_failure(e, compression);
                        warn!("batch aborted after {} records: {e}", parsed.len());
                        return Err(e);
                    }
                }
            }
            (parsed, opened.format, compression)
        };
        let source_sha256 = source.digest();
        let source_bytes = source.bytes_read();

        let outcomes = self.process_all(parsed);
        let mut rows = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                RowOutcome::Processed(row) => rows.push(row),
                RowOutcome::Failed(err) => errors.push(err),
            }
        }

        let verdicts = self.resolve_duplicates(&rows, lookup)?;
        let row_indices: Vec<usize> = rows.iter().map(|r| r.row_index).collect();
        let records: Vec<ResolvedRow> = rows
            .into_iter()
            .zip(verdicts)
            .map(|(row, verdict)| {
                let verdict = match verdict {
                    // point at the upload row, not the position among successes
                    Verdict::WithinBatchDuplicate { batch_index } => Verdict::WithinBatchDuplicate {
                        batch_index: row_indices[batch_index],
                    },
                    other => other,
                };
                ResolvedRow { row, verdict }
            })
            .collect();

        let result = BatchResult::new(format, compression, source_sha256, source_bytes, records, errors);
        info!("{}", result.summary());
        Ok(result)
    }

    fn open<'a, R: Read + 'a>(
        &self,
        reader: R,
        hint: &FormatHint,
        mapping: &ColumnMapping,
    ) -> Result<OpenedSource<'a>> {
        let (mut reader, compression) = decoding_reader(reader)?;
        if let Some(algorithm) = compression {
            if !self.capabilities.compression {
                return Err(IntakeError::parsing(
                    ErrorCode::UnsupportedFormat,
                    format!("{} compressed input is disabled for this pipeline", algorithm.name()),
                ));
            }
        }
        let head = reader
            .fill_buf()
            .map_err(|e| stream_failure(e.into(), compression))?
            .to_vec();
        let format = hint.resolve(&head)?;
        let stream = open_records(reader, format, mapping).map_err(|e| stream_failure(e, compression))?;
        Ok(OpenedSource { stream, format, compression })
    }

    fn process(&self, parsed: ParsedStructure) -> RowOutcome {
        let result = normalize(&parsed.molecule, &self.config.normalization)
            .and_then(|molecule| {
                compute_features(&molecule, &self.config.features).map(|features| (molecule, features))
            });
        match result {
            Ok((molecule, features)) => RowOutcome::Processed(ProcessedRow {
                row_index: parsed.row_index,
                source_line: parsed.source_line,
                name: parsed.name,
                external_id: parsed.external_id,
                properties: parsed.properties,
                molecule,
                features,
            }),
            Err(e) => {
                let mut err = RowError::from_error(parsed.row_index, &parsed.raw, &e);
                if let Some(line) = parsed.source_line {
                    err = err.with_detail("line", line);
                }
                RowOutcome::Failed(err)
            }
        }
    }

    fn settle(&self, item: std::result::Result<ParsedStructure, RowError>) -> RowOutcome {
        match item {
            Ok(parsed) => self.process(parsed),
            Err(err) => RowOutcome::Failed(err),
        }
    }

    fn process_all(&self, items: Vec<std::result::Result<ParsedStructure, RowError>>) -> Vec<RowOutcome> {
        #[cfg(feature = "parallel")]
        if self.capabilities.parallel {
            use rayon::prelude::*;
            return items.into_par_iter().map(|item| self.settle(item)).collect();
        }
        items.into_iter().map(|item| self.settle(item)).collect()
    }
}

struct OpenedSource<'a> {
    stream: RecordStream<'a>,
    format: InputFormat,
    compression: Option<Algorithm>,
}

/// Decoder I/O failures surface as a corrupt upload rather than a bare I/O
/// error.
fn stream_failure(err: IntakeError, compression: Option<Algorithm>) -> IntakeError {
    match (err, compression) {
        (IntakeError::Io(io), Some(algorithm)) => corrupt_stream(algorithm, io),
        (err, _) => err,
    }
}

/// Lazy record iterator returned by [`Pipeline::records`].
pub struct Records<'a> {
    pipeline: &'a Pipeline,
    format: Option<InputFormat>,
    compression: Option<Algorithm>,
    stream: Option<RecordStream<'a>>,
    fatal: Option<IntakeError>,
}

impl Records<'_> {
    /// The resolved upload format, unless opening the upload failed.
    pub fn format(&self) -> Option<InputFormat> {
        self.format
    }

    pub fn compression(&self) -> Option<Algorithm> {
        self.compression
    }
}

impl Iterator for Records<'_> {
    type Item = Result<RowOutcome>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.fatal.take() {
            return Some(Err(e));
        }
        let stream = self.stream.as_mut()?;
        match stream.next()? {
            Ok(item) => Some(Ok(self.pipeline.settle(item))),
            Err(e) => {
                self.stream = None;
                Some(Err(stream_failure(e, self.compression)))
            }
        }
    }
}

/// A processed record with its duplicate verdict.
#[derive(Debug, Clone)]
pub struct ResolvedRow {
    pub row: ProcessedRow,
    /// `WithinBatchDuplicate::batch_index` is the upload row index of the
    /// first occurrence.
    pub verdict: Verdict,
}

/// One row of a finished batch, processed or failed.
#[derive(Debug, Clone, Copy)]
pub enum BatchRow<'a> {
    Processed(&'a ResolvedRow),
    Failed(&'a RowError),
}

impl BatchRow<'_> {
    pub fn row_index(&self) -> usize {
        match self {
            BatchRow::Processed(r) => r.row.row_index,
            BatchRow::Failed(e) => e.row_index,
        }
    }
}

/// Everything [`Pipeline::run_batch`] learned about an upload.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub format: InputFormat,
    pub compression: Option<Algorithm>,
    /// SHA-256 of the upload bytes as received.
    pub source_sha256: String,
    pub source_bytes: u64,
    /// Successful records in upload order.
    pub records: Vec<ResolvedRow>,
    /// Row-level failures in upload order.
    pub errors: Vec<RowError>,
    pub total_count: usize,
    pub successful_count: usize,
    pub failed_count: usize,
    pub new_count: usize,
    pub exact_duplicate_count: usize,
    pub similar_duplicate_count: usize,
    pub within_batch_duplicate_count: usize,
}

impl BatchResult {
    fn new(
        format: InputFormat,
        compression: Option<Algorithm>,
        source_sha256: String,
        source_bytes: u64,
        records: Vec<ResolvedRow>,
        errors: Vec<RowError>,
    ) -> Self {
        let count = |f: fn(&Verdict) -> bool| records.iter().filter(|r| f(&r.verdict)).count();
        let new_count = count(|v| matches!(v, Verdict::New));
        let exact_duplicate_count = count(|v| matches!(v, Verdict::ExactDuplicate { .. }));
        let similar_duplicate_count = count(|v| matches!(v, Verdict::SimilarDuplicate { .. }));
        let within_batch_duplicate_count = count(|v| matches!(v, Verdict::WithinBatchDuplicate { .. }));
        BatchResult {
            format,
            compression,
            source_sha256,
            source_bytes,
            total_count: records.len() + errors.len(),
            successful_count: records.len(),
            failed_count: errors.len(),
            new_count,
            exact_duplicate_count,
            similar_duplicate_count,
            within_batch_duplicate_count,
            records,
            errors,
        }
    }

    /// Fraction of records processed successfully; 0 for an empty upload.
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.successful_count as f64 / self.total_count as f64
        }
    }

    pub fn has_errors(&self) -> bool {
        self.failed_count > 0
    }

    /// Every row of the upload, processed and failed interleaved in
    /// `row_index` order.
    pub fn outcomes(&self) -> impl Iterator<Item = BatchRow<'_>> {
        let mut records = self.records.iter().peekable();
        let mut errors = self.errors.iter().peekable();
        std::iter::from_fn(move || match (records.peek(), errors.peek()) {
            (Some(r), Some(e)) if e.row_index < r.row.row_index => errors.next().map(BatchRow::Failed),
            (Some(_), _) => records.next().map(BatchRow::Processed),
            (None, _) => errors.next().map(BatchRow::Failed),
        })
    }

    /// Records a caller would persist: everything classified as new.
    pub fn new_records(&self) -> impl Iterator<Item = &ProcessedRow> {
        self.records.iter().filter(|r| r.verdict.is_new()).map(|r| &r.row)
    }

    /// Row error counts by code.
    pub fn error_counts(&self) -> BTreeMap<ErrorCode, usize> {
        let mut counts = BTreeMap::new();
        for err in &self.errors {
            *counts.entry(err.code).or_insert(0) += 1;
        }
        counts
    }

    /// The caller-facing report.
    pub fn report(&self) -> BatchReport {
        let duplicates = self
            .records
            .iter()
            .filter(|r| r.verdict.is_duplicate())
            .map(|r| DuplicateEntry {
                row_index: r.row.row_index,
                canonical_smiles: r.row.molecule.canonical_smiles.clone(),
                content_hash: r.row.molecule.content_hash.clone(),
                verdict: r.verdict.clone(),
            })
            .collect();
        BatchReport {
            format: self.format,
            compression: self.compression.map(|a| a.name().to_string()),
            source_sha256: self.source_sha256.clone(),
            source_bytes: self.source_bytes,
            total_count: self.total_count,
            successful_count: self.successful_count,
            failed_count: self.failed_count,
            new_count: self.new_count,
            exact_duplicate_count: self.exact_duplicate_count,
            similar_duplicate_count: self.similar_duplicate_count,
            within_batch_duplicate_count: self.within_batch_duplicate_count,
            success_rate: self.success_rate(),
            errors: self.errors.clone(),
            duplicates,
        }
    }
}

impl Summarizable for BatchResult {
    fn summary(&self) -> String {
        format!(
            "{} upload: {} records, {} ok, {} failed; {} new, {} exact, {} similar, {} within batch",
            self.format,
            self.total_count,
            self.successful_count,
            self.failed_count,
            self.new_count,
            self.exact_duplicate_count,
            self.similar_duplicate_count,
            self.within_batch_duplicate_count,
        )
    }
}

/// One duplicate in a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateEntry {
    pub row_index: usize,
    pub canonical_smiles: String,
    pub content_hash: String,
    #[serde(flatten)]
    pub verdict: Verdict,
}

/// Serializable batch summary: counts, row errors and duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub format: InputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    pub source_sha256: String,
    pub source_bytes: u64,
    pub total_count: usize,
    pub successful_count: usize,
    pub failed_count: usize,
    pub new_count: usize,
    pub exact_duplicate_count: usize,
    pub similar_duplicate_count: usize,
    pub within_batch_duplicate_count: usize,
    pub success_rate: f64,
    pub errors: Vec<RowError>,
    pub duplicates: Vec<DuplicateEntry>,
}

impl BatchReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| IntakeError::InvalidInput(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| IntakeError::InvalidInput(e.to_string()))
    }

    /// Row errors grouped by row index, for annotating the original upload.
    pub fn errors_by_row(&self) -> HashMap<usize, &RowError> {
        self.errors.iter().map(|e| (e.row_index, e)).collect()
    }
}
