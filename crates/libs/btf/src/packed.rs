//! Reader for packed BTF archives.
//!
//! A packed archive is a NumPy-style array archive holding two co-indexed
//! members: an image stack under the name `images` with shape
//! `(count, height, width, channels)` and an angle table under the name
//! `angles` with shape `(count, 4)`. Both are loaded fully into memory at
//! construction; lookups hand out borrowed views into the stack.

use crate::{
    angle::angles_close,
    error::{ArchiveError, ArchiveErrorKind, LookupError, LookupErrorKind},
    texture::{ImageView, SampleSlice, Samples},
};
use ordered_float::OrderedFloat;
use std::{collections::HashSet, path::Path};

/// Member name of the image stack.
const IMAGES_ARRAY: &str = "images";
/// Member name of the angle table.
const ANGLES_ARRAY: &str = "angles";

/// An angle tuple in the bit-exact form stored in [`PackedBtf::angles_set`].
pub type AngleTuple = [OrderedFloat<f32>; 4];

/// Reader for a packed BTF archive.
///
/// Angle tables of packed archives are produced by numeric computation, so
/// [`lookup`](Self::lookup) compares the query against the stored tuples
/// with a small absolute/relative tolerance rather than bit equality. The
/// table order is preserved and the first matching entry wins; archives are
/// trusted to hold unique angle tuples and nothing verifies that here.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let btf = btf::PackedBtf::load("material.btf.npz")?;
/// println!("{:?}", btf.image_shape());
/// let image = btf.lookup(45.0, 255.0, 0.0, 0.0)?;
/// assert_eq!(image.shape(), btf.image_shape());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PackedBtf {
    path: Box<Path>,
    image_shape: [usize; 3],
    angles: Vec<[f32; 4]>,
    angles_set: HashSet<AngleTuple>,
    samples: Samples,
}

impl PackedBtf {
    /// Loads a packed archive, reading both members fully into memory.
    ///
    /// Image samples may be stored as `u8`, `u16` or `f32`; angles as `f32`
    /// or `f64` (normalized to `f32`). Fails if either member is absent,
    /// has an unsupported dtype, or the two member lengths disagree.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let mut npz = npyz::npz::NpzArchive::open(path)
            .map_err(|err| ArchiveError::new(path, ArchiveErrorKind::Open(err)))?;

        let (count, image_shape, samples) = {
            let images = npz
                .by_name(IMAGES_ARRAY)
                .map_err(|err| ArchiveError::new(path, ArchiveErrorKind::Open(err)))?
                .ok_or_else(|| {
                    ArchiveError::new(path, ArchiveErrorKind::MissingArray(IMAGES_ARRAY))
                })?;
            let shape = images.shape().to_vec();
            if shape.len() != 4 {
                return Err(invalid_array(
                    path,
                    IMAGES_ARRAY,
                    format!(
                        "expected a (count, height, width, channels) stack, got {} dimensions",
                        shape.len()
                    ),
                ));
            }
            let dtype = plain_dtype(path, IMAGES_ARRAY, images.dtype())?;
            let samples = match scalar_kind(&dtype) {
                Some("u1") => Samples::U8(read_member_data(path, images)?.into_boxed_slice()),
                Some("u2") => Samples::U16(read_member_data(path, images)?.into_boxed_slice()),
                Some("f4") => Samples::F32(read_member_data(path, images)?.into_boxed_slice()),
                _ => {
                    return Err(invalid_array(
                        path,
                        IMAGES_ARRAY,
                        format!("unsupported dtype '{dtype}'"),
                    ))
                }
            };
            let image_shape = [shape[1] as usize, shape[2] as usize, shape[3] as usize];
            (shape[0] as usize, image_shape, samples)
        };

        let angles = {
            let table = npz
                .by_name(ANGLES_ARRAY)
                .map_err(|err| ArchiveError::new(path, ArchiveErrorKind::Open(err)))?
                .ok_or_else(|| {
                    ArchiveError::new(path, ArchiveErrorKind::MissingArray(ANGLES_ARRAY))
                })?;
            let shape = table.shape().to_vec();
            if shape.len() != 2 || shape[1] != 4 {
                return Err(invalid_array(
                    path,
                    ANGLES_ARRAY,
                    format!("expected a (count, 4) table, got {shape:?}"),
                ));
            }
            let dtype = plain_dtype(path, ANGLES_ARRAY, table.dtype())?;
            let raw: Vec<f32> = match scalar_kind(&dtype) {
                Some("f4") => read_member_data(path, table)?,
                Some("f8") => read_member_data::<f64, _>(path, table)?
                    .into_iter()
                    .map(|v| v as f32)
                    .collect(),
                _ => {
                    return Err(invalid_array(
                        path,
                        ANGLES_ARRAY,
                        format!("unsupported dtype '{dtype}'"),
                    ))
                }
            };
            raw.chunks_exact(4)
                .map(|row| [row[0], row[1], row[2], row[3]])
                .collect::<Vec<_>>()
        };

        if angles.len() != count {
            return Err(invalid_array(
                path,
                ANGLES_ARRAY,
                format!(
                    "angle table holds {} conditions but the image stack holds {count}",
                    angles.len()
                ),
            ));
        }

        let angles_set = angles.iter().map(|a| a.map(OrderedFloat)).collect();
        log::debug!(
            "loaded packed BTF archive '{}': {count} conditions, image shape {image_shape:?}",
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf().into_boxed_path(),
            image_shape,
            angles,
            angles_set,
            samples,
        })
    }

    /// Path of the backing archive.
    pub fn path(&self) -> &Path { &self.path }

    /// The `(height, width, channels)` shape shared by all stored images.
    pub fn image_shape(&self) -> [usize; 3] { self.image_shape }

    /// Number of stored angle conditions.
    pub fn len(&self) -> usize { self.angles.len() }

    /// Returns true if the archive holds no images.
    pub fn is_empty(&self) -> bool { self.angles.is_empty() }

    /// The angle table in storage order.
    pub fn angles(&self) -> &[[f32; 4]] { &self.angles }

    /// The stored angle tuples as an unordered set.
    ///
    /// Membership here is bit-exact; the tolerant comparison lives only in
    /// [`lookup`](Self::lookup). Iteration order is unspecified.
    pub fn angles_set(&self) -> &HashSet<AngleTuple> { &self.angles_set }

    /// The full image stack as flat samples, `channels` varying fastest.
    pub fn samples(&self) -> SampleSlice<'_> { self.samples.as_slice() }

    /// Borrows the image stored at `index` of the table order.
    pub fn image(&self, index: usize) -> Option<ImageView<'_>> {
        let stride = self.image_shape.iter().product::<usize>();
        (index < self.angles.len()).then(|| {
            ImageView::new(
                self.image_shape,
                self.samples.slice(index * stride..(index + 1) * stride),
            )
        })
    }

    /// Returns the image recorded for the queried angles.
    ///
    /// The angle table is scanned from index 0 and each stored tuple is
    /// compared element-wise with a tolerance sized for floating-point
    /// round-trip error; the first match wins. Fails with a not-found error
    /// carrying the queried values if nothing matches.
    pub fn lookup(&self, tl: f32, pl: f32, tv: f32, pv: f32) -> Result<ImageView<'_>, LookupError> {
        let query = [tl, pl, tv, pv];
        self.angles
            .iter()
            .position(|stored| angles_close(stored, &query))
            .and_then(|index| self.image(index))
            .ok_or_else(|| LookupError::new(&*self.path, LookupErrorKind::NotFound(query)))
    }
}

fn invalid_array(path: &Path, name: &'static str, reason: String) -> ArchiveError {
    ArchiveError::new(path, ArchiveErrorKind::InvalidArray { name, reason })
}

/// Extracts the scalar type-string of an array, rejecting structured dtypes.
fn plain_dtype(path: &Path, name: &'static str, dtype: npyz::DType) -> Result<String, ArchiveError> {
    match dtype {
        npyz::DType::Plain(type_str) => Ok(type_str.to_string()),
        other => Err(invalid_array(path, name, format!("unsupported dtype '{other:?}'"))),
    }
}

/// The endianness-independent kind of a type-string such as `<f4` or `|u1`.
fn scalar_kind(type_str: &str) -> Option<&str> {
    (type_str.len() >= 2).then(|| &type_str[type_str.len() - 2..])
}

fn read_member_data<T: npyz::Deserialize, R: std::io::Read>(
    path: &Path,
    member: npyz::NpyFile<R>,
) -> Result<Vec<T>, ArchiveError> {
    member
        .into_vec()
        .map_err(|err| ArchiveError::new(path, ArchiveErrorKind::Open(err)))
}
