//! Batch ingestion of chemical structure uploads.
//!
//! Takes an uploaded byte stream (SMILES list, SDF/MOL, CSV/TSV, optionally
//! gzip or zstd compressed), turns every record into a canonical molecule with
//! descriptors and fingerprints, and classifies each one as new, an exact or
//! similar duplicate of a stored molecule, or a repeat within the upload.
//! Bad records become row errors; they never abort the batch.
//!
//! # Example
//!
//! ```
//! use molintake_ingest::{ColumnMapping, FormatHint, InMemoryLookup, Pipeline, Verdict};
//!
//! let upload = "smiles,name\nCCO,ethanol\nOCC,ethanol again\nnot_a_smiles,oops\n";
//! let pipeline = Pipeline::default();
//! let result = pipeline
//!     .run_batch(upload.as_bytes(), &FormatHint::file_name("hits.csv"), &ColumnMapping::default(), &InMemoryLookup::new())
//!     .unwrap();
//!
//! assert_eq!(result.successful_count, 2);
//! assert_eq!(result.failed_count, 1);
//! assert_eq!(result.records[1].verdict, Verdict::WithinBatchDuplicate { batch_index: 0 });
//! ```

pub mod config;
pub mod format;
pub mod mapping;
pub mod pipeline;
pub mod records;
pub mod resolver;

pub use config::{Capabilities, IngestSettings, PipelineConfig};
pub use format::{detect_format, FormatHint, InputFormat};
pub use mapping::{ColumnMapping, ResolvedColumns};
pub use pipeline::{BatchReport, BatchResult, BatchRow, DuplicateEntry, Pipeline, ProcessedRow, Records, ResolvedRow, RowOutcome};
pub use records::{open_records, ParsedStructure, RecordItem, RecordStream, RowError};
pub use resolver::{resolve_duplicates, BatchEntry, ExistingId, ExistingLookup, InMemoryLookup, ResolverConfig, Verdict};
