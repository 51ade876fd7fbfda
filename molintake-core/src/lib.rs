//! Shared primitives for the molintake chemical ingestion pipeline.
//!
//! `molintake-core` provides the foundation the other molintake crates build on:
//!
//! - **Error types**: [`IntakeError`], [`ErrorCode`] and [`Result`] for coded, structured failures
//! - **Traits**: [`ContentAddressable`], [`Annotated`], [`Summarizable`], [`Scored`]
//! - **Hashing**: SHA-256 content identity and streaming digests
//! - **Compression**: lazy gzip/zstd decoding of uploads (`compression` feature)

pub mod compress;
pub mod error;
pub mod hash;
pub mod traits;

pub use error::{ErrorCode, ErrorKind, Failure, IntakeError, Result};
pub use traits::*;
