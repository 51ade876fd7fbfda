//! Transparent decompression of uploaded byte streams.
//!
//! Uploads are sniffed for zstd or gzip magic bytes and wrapped in a lazy
//! decoder, so compressed SDF or CSV files stream through the pipeline
//! without being inflated in memory first.

use std::io::{BufRead, BufReader, Cursor, Read};

use crate::{ErrorCode, IntakeError, Result};

/// Compression formats recognised on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Zstd,
    Gzip,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Zstd => "zstd",
            Algorithm::Gzip => "gzip",
        }
    }
}

const MAGIC_LEN: usize = 4;

/// Detect the compression algorithm from the magic bytes of `data`.
///
/// Returns `None` if the data does not match a known format.
pub fn detect_algorithm(data: &[u8]) -> Option<Algorithm> {
    if data.len() >= 4 && data[..4] == [0x28, 0xB5, 0x2F, 0xFD] {
        Some(Algorithm::Zstd)
    } else if data.len() >= 2 && data[..2] == [0x1F, 0x8B] {
        Some(Algorithm::Gzip)
    } else {
        None
    }
}

/// Whether this build can decode compressed input.
pub fn decompression_available() -> bool {
    cfg!(feature = "compression")
}

/// Wrap `reader` in a decoder if its first bytes announce a compressed stream.
///
/// Returns the (possibly decoding) reader and the detected algorithm. Plain
/// input passes through untouched. Compressed input in a build without the
/// `compression` feature fails with `UNSUPPORTED_FORMAT`.
pub fn decoding_reader<'a, R: Read + 'a>(
    mut reader: R,
) -> Result<(Box<dyn BufRead + 'a>, Option<Algorithm>)> {
    let mut magic = Vec::with_capacity(MAGIC_LEN);
    (&mut reader)
        .take(MAGIC_LEN as u64)
        .read_to_end(&mut magic)?;
    let algorithm = detect_algorithm(&magic);
    let rejoined = Cursor::new(magic).chain(reader);

    match algorithm {
        None => Ok((Box::new(BufReader::new(rejoined)), None)),
        Some(algo) => wrap_decoder(rejoined, algo).map(|r| (r, Some(algo))),
    }
}

#[cfg(feature = "compression")]
fn wrap_decoder<'a, R: Read + 'a>(reader: R, algorithm: Algorithm) -> Result<Box<dyn BufRead + 'a>> {
    match algorithm {
        Algorithm::Gzip => Ok(Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(
            reader,
        )))),
        Algorithm::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(reader)?;
            Ok(Box::new(BufReader::new(decoder)))
        }
    }
}

#[cfg(not(feature = "compression"))]
fn wrap_decoder<'a, R: Read + 'a>(_reader: R, algorithm: Algorithm) -> Result<Box<dyn BufRead + 'a>> {
    Err(IntakeError::parsing(
        ErrorCode::UnsupportedFormat,
        format!("{} compressed input is not supported by this build", algorithm.name()),
    ))
}

/// Map a decoder failure to a parsing error on the whole stream.
pub fn corrupt_stream(algorithm: Algorithm, err: std::io::Error) -> IntakeError {
    IntakeError::parsing(
        ErrorCode::UnsupportedFormat,
        format!("corrupt {} stream: {}", algorithm.name(), err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(mut r: Box<dyn BufRead + '_>) -> Vec<u8> {
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_algorithm(b"not compressed"), None);
        assert_eq!(detect_algorithm(b"\x1f"), None);
    }

    #[test]
    fn plain_input_passes_through() {
        let data = b"CCO\nc1ccccc1\n";
        let (reader, algo) = decoding_reader(&data[..]).unwrap();
        assert_eq!(algo, None);
        assert_eq!(read_all(reader), data.to_vec());
    }

    #[test]
    fn short_input_passes_through() {
        let (reader, algo) = decoding_reader(&b"C"[..]).unwrap();
        assert_eq!(algo, None);
        assert_eq!(read_all(reader), b"C".to_vec());
    }

    #[test]
    fn empty_input_passes_through() {
        let (reader, algo) = decoding_reader(&b""[..]).unwrap();
        assert_eq!(algo, None);
        assert!(read_all(reader).is_empty());
    }

    #[cfg(feature = "compression")]
    #[test]
    fn gzip_is_decoded_lazily() {
        use std::io::Write;
        let original = b"CCO ethanol\nOCC\n";
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(6));
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(detect_algorithm(&compressed), Some(Algorithm::Gzip));

        let (reader, algo) = decoding_reader(&compressed[..]).unwrap();
        assert_eq!(algo, Some(Algorithm::Gzip));
        assert_eq!(read_all(reader), original.to_vec());
    }

    #[cfg(feature = "compression")]
    #[test]
    fn zstd_is_decoded_lazily() {
        let original = b"$$$$\n";
        let compressed = zstd::encode_all(&original[..], 3).unwrap();
        assert_eq!(detect_algorithm(&compressed), Some(Algorithm::Zstd));

        let (reader, algo) = decoding_reader(&compressed[..]).unwrap();
        assert_eq!(algo, Some(Algorithm::Zstd));
        assert_eq!(read_all(reader), original.to_vec());
    }

    #[cfg(not(feature = "compression"))]
    #[test]
    fn compressed_input_rejected_without_feature() {
        let err = decoding_reader(&[0x1Fu8, 0x8B, 0x08, 0x00][..]).err().unwrap();
        assert_eq!(err.code(), ErrorCode::UnsupportedFormat);
    }
}
