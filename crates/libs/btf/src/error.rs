//! Error types of the archive readers.

use crate::angle::AngleCondition;
use std::{
    fmt::{Display, Formatter},
    path::Path,
};

/// Error raised while opening or indexing a BTF archive.
///
/// All variants are fatal: construction fails and no reader is produced.
#[derive(Debug)]
pub struct ArchiveError {
    /// Path of the archive that caused the error.
    pub path: Box<Path>,
    /// Kind of error that occurred.
    pub kind: ArchiveErrorKind,
}

/// Kind of error that occurred while opening an archive.
#[derive(Debug)]
pub enum ArchiveErrorKind {
    /// The archive file cannot be opened or read.
    Open(std::io::Error),
    /// The archive container is corrupt.
    Container(zip::result::ZipError),
    /// A required named array is absent from a packed archive.
    MissingArray(&'static str),
    /// A named array of a packed archive has an unusable dtype or shape.
    InvalidArray {
        /// Name of the offending array.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// An entry name does not carry four parseable angle fields.
    ParseAngles {
        /// Name of the offending entry.
        entry: String,
    },
    /// Two or more entries quantize to the same angle condition.
    DuplicatedConditions {
        /// Number of distinct duplicated conditions.
        count: usize,
    },
}

impl ArchiveError {
    pub(crate) fn new(path: impl AsRef<Path>, kind: ArchiveErrorKind) -> Self {
        Self {
            path: path.as_ref().to_path_buf().into_boxed_path(),
            kind,
        }
    }
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "archive '{}': ", self.path.display())?;
        match &self.kind {
            ArchiveErrorKind::Open(err) => write!(f, "cannot open: {err}"),
            ArchiveErrorKind::Container(err) => write!(f, "invalid container: {err}"),
            ArchiveErrorKind::MissingArray(name) => {
                write!(f, "missing required array '{name}'")
            }
            ArchiveErrorKind::InvalidArray { name, reason } => {
                write!(f, "array '{name}' is malformed: {reason}")
            }
            ArchiveErrorKind::ParseAngles { entry } => write!(
                f,
                "cannot parse angles from entry '{entry}', expected \
                 'tl<deg><sep>pl<deg><sep>tv<deg><sep>pv<deg>.<ext>'"
            ),
            ArchiveErrorKind::DuplicatedConditions { count } => {
                write!(f, "has {count} duplicated angle conditions")
            }
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ArchiveErrorKind::Open(err) => Some(err),
            ArchiveErrorKind::Container(err) => Some(err),
            _ => None,
        }
    }
}

/// Error raised by an angle lookup.
///
/// Lookup errors are recoverable: the reader stays usable after any of them.
#[derive(Debug)]
pub struct LookupError {
    /// Path of the archive the lookup ran against.
    pub path: Box<Path>,
    /// Kind of error that occurred.
    pub kind: LookupErrorKind,
}

/// Kind of error that occurred during a lookup.
#[derive(Debug)]
pub enum LookupErrorKind {
    /// No stored angle tuple matches the queried values.
    NotFound([f32; 4]),
    /// No entry is indexed under the quantized key.
    NotFoundQuantized(AngleCondition),
    /// The matched entry cannot be opened in the container.
    Entry(zip::result::ZipError),
    /// The matched entry's bytes cannot be read.
    Read(std::io::Error),
    /// The matched entry's bytes cannot be decoded into an image.
    Decode(DecodeError),
}

impl LookupError {
    pub(crate) fn new(path: impl AsRef<Path>, kind: LookupErrorKind) -> Self {
        Self {
            path: path.as_ref().to_path_buf().into_boxed_path(),
            kind,
        }
    }

    /// Returns true if the queried condition is simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind,
            LookupErrorKind::NotFound(_) | LookupErrorKind::NotFoundQuantized(_)
        )
    }
}

impl Display for LookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            LookupErrorKind::NotFound([tl, pl, tv, pv]) => write!(
                f,
                "condition ({tl}, {pl}, {tv}, {pv}) does not exist in '{}'",
                self.path.display()
            ),
            LookupErrorKind::NotFoundQuantized(condition) => write!(
                f,
                "condition {condition} does not exist in '{}'",
                self.path.display()
            ),
            LookupErrorKind::Entry(err) => write!(
                f,
                "cannot open entry in '{}': {err}",
                self.path.display()
            ),
            LookupErrorKind::Read(err) => write!(
                f,
                "cannot read entry in '{}': {err}",
                self.path.display()
            ),
            LookupErrorKind::Decode(err) => write!(
                f,
                "cannot decode entry in '{}': {err}",
                self.path.display()
            ),
        }
    }
}

impl std::error::Error for LookupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            LookupErrorKind::Entry(err) => Some(err),
            LookupErrorKind::Read(err) => Some(err),
            LookupErrorKind::Decode(err) => Some(err),
            _ => None,
        }
    }
}

/// Error raised by the underlying image codecs.
#[derive(Debug)]
pub enum DecodeError {
    /// The specialized JPEG decoder failed.
    Jpeg(zune_jpeg::errors::DecodeErrors),
    /// The general-purpose codec failed.
    Image(image::ImageError),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Jpeg(err) => write!(f, "jpeg: {err}"),
            DecodeError::Image(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Jpeg(err) => Some(err),
            DecodeError::Image(err) => Some(err),
        }
    }
}

impl From<zune_jpeg::errors::DecodeErrors> for DecodeError {
    fn from(value: zune_jpeg::errors::DecodeErrors) -> Self { Self::Jpeg(value) }
}

impl From<image::ImageError> for DecodeError {
    fn from(value: image::ImageError) -> Self { Self::Image(value) }
}
