//! Signature functions: deterministic `path -> key` comparisons.
//!
//! # Overview
//!
//! Each [`Signature`] maps a file path to a short string [`Key`]. Files whose
//! keys differ cannot be duplicates. Signatures are ordered by cost: `size`
//! reads metadata only, `partial-md5` reads a bounded window from the start of
//! the file, the full hashes stream the whole file, and `bytes` compares file
//! contents byte-for-byte.
//!
//! All content readers stream the file in [`CHUNK_SIZE`] chunks, so memory use
//! is bounded regardless of file size.
//!
//! # Example
//!
//! ```no_run
//! use dupechain::scanner::Signature;
//! use std::path::Path;
//!
//! let key = Signature::Md5.probe(Path::new("photo.jpg")).unwrap();
//! println!("md5 = {}", key);
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::Digest as _;

use super::SignatureError;

/// Read granularity for every content signature (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Number of chunks hashed by the `partial-md5` signature.
pub const PARTIAL_CHUNKS: usize = 200;

/// Comparison key produced by a signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Wrap a string as a key.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key carries information.
    ///
    /// Empty or whitespace-only keys neither confirm nor deny duplication.
    #[must_use]
    pub fn has_signal(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of comparing a file against a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The file matches the reference.
    Same,
    /// The file differs; carries the file's own key.
    Different(Key),
    /// The file produced no usable key.
    NoSignal,
}

/// A signature function selectable in a filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Signature {
    /// File size in bytes.
    Size,
    /// MD5 over the first `PARTIAL_CHUNKS * CHUNK_SIZE` bytes.
    PartialMd5,
    /// MD5 over the whole file.
    Md5,
    /// SHA-256 over the whole file.
    Sha256,
    /// BLAKE3 over the whole file.
    Blake3,
    /// Exhaustive byte-for-byte comparison.
    Bytes,
    /// File name without directory.
    Name,
    /// Modification time.
    Mtime,
}

impl Signature {
    /// Every available signature, cheapest content readers first.
    pub const ALL: [Signature; 8] = [
        Signature::Size,
        Signature::PartialMd5,
        Signature::Md5,
        Signature::Sha256,
        Signature::Blake3,
        Signature::Bytes,
        Signature::Name,
        Signature::Mtime,
    ];

    /// Identifier used on the command line and in config files.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::PartialMd5 => "partial-md5",
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
            Self::Bytes => "bytes",
            Self::Name => "name",
            Self::Mtime => "mtime",
        }
    }

    /// One-line description for `--list-filters`.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Size => "file size in bytes (metadata only)",
            Self::PartialMd5 => "MD5 of the first 200 x 64 KiB chunks",
            Self::Md5 => "MD5 of the whole file",
            Self::Sha256 => "SHA-256 of the whole file",
            Self::Blake3 => "BLAKE3 of the whole file",
            Self::Bytes => "exact byte-for-byte comparison",
            Self::Name => "file name",
            Self::Mtime => "modification time",
        }
    }

    /// Look up a signature by identifier. Accepts `_` in place of `-`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|s| s.name() == normalized)
    }

    /// Whether matches under this signature are authoritative.
    #[must_use]
    pub fn is_exact(self) -> bool {
        matches!(self, Self::Bytes)
    }

    /// Compute the key for a single file.
    ///
    /// For [`Signature::Bytes`] the key is a BLAKE3 fingerprint of the content,
    /// or an empty key when the content is empty or whitespace only.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] if the file cannot be read.
    pub fn probe(self, path: &Path) -> Result<Key, SignatureError> {
        match self {
            Self::Size => {
                let metadata =
                    std::fs::metadata(path).map_err(|e| SignatureError::from_io(path, e))?;
                Ok(Key::new(metadata.len().to_string()))
            }
            Self::PartialMd5 => {
                let mut context = md5::Context::new();
                read_stream(path, Some((CHUNK_SIZE * PARTIAL_CHUNKS) as u64), |chunk| {
                    context.consume(chunk);
                })?;
                Ok(Key::new(format!("{:x}", context.compute())))
            }
            Self::Md5 => {
                let mut context = md5::Context::new();
                read_stream(path, None, |chunk| context.consume(chunk))?;
                Ok(Key::new(format!("{:x}", context.compute())))
            }
            Self::Sha256 => {
                let mut hasher = sha2::Sha256::new();
                read_stream(path, None, |chunk| hasher.update(chunk))?;
                Ok(Key::new(to_hex(&hasher.finalize())))
            }
            Self::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                read_stream(path, None, |chunk| {
                    hasher.update(chunk);
                })?;
                Ok(Key::new(hasher.finalize().to_hex().to_string()))
            }
            Self::Bytes => {
                let mut hasher = blake3::Hasher::new();
                let mut blank = true;
                read_stream(path, None, |chunk| {
                    hasher.update(chunk);
                    blank = blank && chunk.iter().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'));
                })?;
                if blank {
                    Ok(Key::new(String::new()))
                } else {
                    Ok(Key::new(hasher.finalize().to_hex().to_string()))
                }
            }
            Self::Name => Ok(Key::new(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )),
            Self::Mtime => {
                let metadata =
                    std::fs::metadata(path).map_err(|e| SignatureError::from_io(path, e))?;
                let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
                Ok(Key::new(format_mtime(modified)))
            }
        }
    }

    /// Compare `other` against a reference file whose key is already known.
    ///
    /// Keyed signatures compare keys. [`Signature::Bytes`] streams both files
    /// and compares them byte-for-byte, computing the other file's key only when
    /// they differ.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] if either file cannot be read.
    pub fn matches(
        self,
        reference: &Path,
        reference_key: &Key,
        other: &Path,
    ) -> Result<Verdict, SignatureError> {
        if self.is_exact() && files_equal(reference, other)? {
            return Ok(Verdict::Same);
        }

        let key = self.probe(other)?;
        if !key.has_signal() {
            Ok(Verdict::NoSignal)
        } else if !self.is_exact() && key == *reference_key {
            Ok(Verdict::Same)
        } else {
            Ok(Verdict::Different(key))
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Signature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown filter '{s}'"))
    }
}

impl TryFrom<String> for Signature {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Signature> for String {
    fn from(value: Signature) -> Self {
        value.name().to_string()
    }
}

/// Stream a file through `consume` in [`CHUNK_SIZE`] pieces, optionally
/// stopping after `limit` bytes.
fn read_stream(
    path: &Path,
    limit: Option<u64>,
    mut consume: impl FnMut(&[u8]),
) -> Result<(), SignatureError> {
    let file = File::open(path).map_err(|e| SignatureError::from_io(path, e))?;
    let mut reader: Box<dyn Read> = match limit {
        Some(limit) => Box::new(file.take(limit)),
        None => Box::new(file),
    };

    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = read_full(&mut reader, &mut buffer).map_err(|e| SignatureError::from_io(path, e))?;
        if read == 0 {
            break;
        }
        consume(&buffer[..read]);
        if read < buffer.len() {
            break;
        }
    }
    Ok(())
}

/// Fill `buffer` as far as possible; returns bytes read (< len only at EOF).
fn read_full(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Byte-for-byte comparison of two files.
///
/// # Errors
///
/// Returns [`SignatureError`] if either file cannot be read.
pub fn files_equal(a: &Path, b: &Path) -> Result<bool, SignatureError> {
    let mut file_a = File::open(a).map_err(|e| SignatureError::from_io(a, e))?;
    let mut file_b = File::open(b).map_err(|e| SignatureError::from_io(b, e))?;

    let len_a = file_a
        .metadata()
        .map_err(|e| SignatureError::from_io(a, e))?
        .len();
    let len_b = file_b
        .metadata()
        .map_err(|e| SignatureError::from_io(b, e))?
        .len();
    if len_a != len_b {
        return Ok(false);
    }

    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];
    loop {
        let read_a = read_full(&mut file_a, &mut buf_a).map_err(|e| SignatureError::from_io(a, e))?;
        let read_b = read_full(&mut file_b, &mut buf_b).map_err(|e| SignatureError::from_io(b, e))?;
        if read_a != read_b || buf_a[..read_a] != buf_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
    }
}

fn format_mtime(modified: SystemTime) -> String {
    match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => format!("{}.{:09}", d.as_secs(), d.subsec_nanos()),
        Err(e) => format!("-{:.9}", e.duration().as_secs_f64()),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
