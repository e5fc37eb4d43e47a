//! Checksum sets describing a retrieved file.
//!
//! A method reports the hashes it computed while fetching a file in its
//! `201 URI Done` block. Those values are collected into a [`ChecksumSet`]
//! and handed to the caller's callback. Computing or verifying hashes is
//! not done here; this is a plain value type.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Hash algorithms a method may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashKind {
    Md5,
    Sha1,
    Sha256,
}

impl HashKind {
    /// All supported algorithms, weakest first.
    pub const ALL: [HashKind; 3] = [HashKind::Md5, HashKind::Sha1, HashKind::Sha256];

    /// Name of the protocol field carrying this hash.
    pub fn field_name(&self) -> &'static str {
        match self {
            HashKind::Md5 => "MD5-Hash",
            HashKind::Sha1 => "SHA1-Hash",
            HashKind::Sha256 => "SHA256-Hash",
        }
    }

    /// Field names accepted for this hash, including legacy aliases.
    pub fn accepted_fields(&self) -> &'static [&'static str] {
        match self {
            HashKind::Md5 => &["MD5-Hash", "MD5Sum-Hash"],
            HashKind::Sha1 => &["SHA1-Hash"],
            HashKind::Sha256 => &["SHA256-Hash"],
        }
    }

    /// Length of the hex digest in characters.
    pub fn hex_len(&self) -> usize {
        match self {
            HashKind::Md5 => 32,
            HashKind::Sha1 => 40,
            HashKind::Sha256 => 64,
        }
    }

    /// Short lowercase label used in display output.
    pub fn label(&self) -> &'static str {
        match self {
            HashKind::Md5 => "md5",
            HashKind::Sha1 => "sha1",
            HashKind::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors raised while building a checksum set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    /// The digest is not a hex string of the expected length.
    #[error("invalid {kind} digest '{value}': expected {expected} hex characters")]
    InvalidDigest {
        kind: HashKind,
        value: String,
        expected: usize,
    },

    /// The size is not a decimal integer.
    #[error("invalid size '{0}'")]
    InvalidSize(String),
}

/// Per-algorithm digests plus the file size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumSet {
    hashes: BTreeMap<HashKind, String>,
    size: Option<u64>,
}

impl ChecksumSet {
    /// Create an empty checksum set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a digest, normalized to lowercase.
    pub fn set_hash(&mut self, kind: HashKind, digest: &str) -> Result<(), ChecksumError> {
        let digest = digest.trim();
        if digest.len() != kind.hex_len() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ChecksumError::InvalidDigest {
                kind,
                value: digest.to_string(),
                expected: kind.hex_len(),
            });
        }
        self.hashes.insert(kind, digest.to_ascii_lowercase());
        Ok(())
    }

    /// Record the size from its decimal text form.
    pub fn set_size_str(&mut self, size: &str) -> Result<(), ChecksumError> {
        let parsed = size
            .trim()
            .parse::<u64>()
            .map_err(|_| ChecksumError::InvalidSize(size.to_string()))?;
        self.size = Some(parsed);
        Ok(())
    }

    /// Record the size.
    pub fn set_size(&mut self, size: u64) {
        self.size = Some(size);
    }

    /// Builder variant of [`set_hash`](Self::set_hash).
    pub fn with_hash(mut self, kind: HashKind, digest: &str) -> Result<Self, ChecksumError> {
        self.set_hash(kind, digest)?;
        Ok(self)
    }

    /// Builder variant of [`set_size`](Self::set_size).
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Digest for the given algorithm, if reported.
    pub fn hash(&self, kind: HashKind) -> Option<&str> {
        self.hashes.get(&kind).map(String::as_str)
    }

    /// Reported file size.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// True when neither a digest nor a size was reported.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty() && self.size.is_none()
    }

    /// Iterate over the reported digests, weakest algorithm first.
    pub fn iter(&self) -> impl Iterator<Item = (HashKind, &str)> {
        self.hashes.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Check whether two sets agree on every value both of them carry.
    ///
    /// Returns false if they share nothing to compare.
    pub fn agrees_with(&self, other: &ChecksumSet) -> bool {
        let mut compared = false;
        for (kind, digest) in self.iter() {
            if let Some(theirs) = other.hash(kind) {
                if theirs != digest {
                    return false;
                }
                compared = true;
            }
        }
        if let (Some(a), Some(b)) = (self.size, other.size) {
            if a != b {
                return false;
            }
            compared = true;
        }
        compared
    }
}

impl fmt::Display for ChecksumSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (kind, digest) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}", kind, digest)?;
            first = false;
        }
        if let Some(size) = self.size {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "size:{}", size)?;
        }
        Ok(())
    }
}
