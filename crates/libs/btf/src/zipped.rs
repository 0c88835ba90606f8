//! Reader for directory BTF archives.
//!
//! A directory archive is a ZIP container holding one image file per angle
//! condition, the angles authored as decimal text in the entry name:
//! `tl<deg><sep>pl<deg><sep>tv<deg><sep>pv<deg>.<ext>`, for example
//! `tl20.25 pl10 tv11.5 pv0.exr`. Names are parsed and indexed once at
//! construction; images are decoded on demand, one entry per lookup.

use crate::{
    angle::{AngleCondition, Millidegrees},
    codec::Codec,
    error::{ArchiveError, ArchiveErrorKind, LookupError, LookupErrorKind},
    texture::Image,
};
use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{BufReader, Read},
    path::Path,
};
use zip::ZipArchive;

/// Default entry extension filter.
pub const DEFAULT_EXTENSION: &str = ".exr";

/// Default separator between the angle fields of an entry name.
pub const DEFAULT_SEPARATOR: &str = " ";

/// Reader for a directory BTF archive.
///
/// Angles in entry names are exact decimal text, quantized to the 0.001°
/// stage resolution and compared exactly: [`lookup`](Self::lookup) is an
/// O(1) map access on the quantized key, never a tolerance scan. Archives
/// holding two entries that quantize to the same condition are rejected at
/// construction, after logging every duplicated condition.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut btf = btf::ZippedBtf::open("colorchecker.zip")?;
/// let image = btf.lookup(45.0, 255.0, 0.0, 0.0)?;
/// println!("{:?}", image.shape());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ZippedBtf {
    path: Box<Path>,
    archive: ZipArchive<BufReader<File>>,
    entries: HashMap<AngleCondition, String>,
    angles_set: HashSet<AngleCondition>,
    codec: Codec,
}

impl ZippedBtf {
    /// Opens a directory archive with the default extension filter
    /// ([`DEFAULT_EXTENSION`]) and field separator ([`DEFAULT_SEPARATOR`]).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        Self::open_with(path, DEFAULT_EXTENSION, DEFAULT_SEPARATOR)
    }

    /// Opens a directory archive, indexing every entry whose name ends with
    /// `extension`; other entries are ignored. Angle fields inside matching
    /// names are split on `separator`.
    ///
    /// Fails if the container cannot be opened, if a matching entry name
    /// does not parse into four tagged angle fields, or if two entries
    /// quantize to the same angle condition.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        extension: &str,
        separator: &str,
    ) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|err| ArchiveError::new(path, ArchiveErrorKind::Open(err)))?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|err| ArchiveError::new(path, ArchiveErrorKind::Container(err)))?;

        // Entry names are unique within a container, so this is a set.
        let names: Vec<String> = archive
            .file_names()
            .filter(|name| name.ends_with(extension))
            .map(str::to_owned)
            .collect();

        let mut entries = HashMap::with_capacity(names.len());
        for name in &names {
            let condition = parse_entry_angles(name, extension, separator).ok_or_else(|| {
                ArchiveError::new(path, ArchiveErrorKind::ParseAngles { entry: name.clone() })
            })?;
            entries.insert(condition, name.clone());
        }

        if entries.len() != names.len() {
            return Err(report_duplicates(path, &names, extension, separator));
        }

        let angles_set = entries.keys().copied().collect();
        log::debug!(
            "opened directory BTF archive '{}': {} conditions ({extension} entries)",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path: path.to_path_buf().into_boxed_path(),
            archive,
            entries,
            angles_set,
            codec: Codec::for_extension(extension),
        })
    }

    /// Path of the backing archive.
    pub fn path(&self) -> &Path { &self.path }

    /// Number of indexed angle conditions.
    pub fn len(&self) -> usize { self.entries.len() }

    /// Returns true if no entry matched the extension filter.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// The indexed angle conditions as an unordered set.
    pub fn angles_set(&self) -> &HashSet<AngleCondition> { &self.angles_set }

    /// The entry name indexed under a condition, if any.
    pub fn entry_name(&self, condition: &AngleCondition) -> Option<&str> {
        self.entries.get(condition).map(String::as_str)
    }

    /// Decodes and returns the image recorded for the queried angles.
    ///
    /// The query is quantized to the stage resolution and looked up
    /// exactly; an absent key is a not-found error carrying the quantized
    /// condition. Every call re-reads and re-decodes the entry, nothing is
    /// cached. Takes `&mut self` because the shared container handle seeks;
    /// concurrent lookups need one reader per thread.
    pub fn lookup(&mut self, tl: f32, pl: f32, tv: f32, pv: f32) -> Result<Image, LookupError> {
        let key = AngleCondition::from_degrees(tl, pl, tv, pv);
        let name = self
            .entries
            .get(&key)
            .ok_or_else(|| LookupError::new(&*self.path, LookupErrorKind::NotFoundQuantized(key)))?;
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|err| LookupError::new(&*self.path, LookupErrorKind::Entry(err)))?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|err| LookupError::new(&*self.path, LookupErrorKind::Read(err)))?;
        drop(entry);
        self.codec
            .decode(&bytes)
            .map_err(|err| LookupError::new(&*self.path, LookupErrorKind::Decode(err)))
    }
}

/// Parses `tl<deg><sep>pl<deg><sep>tv<deg><sep>pv<deg>.<ext>` out of an
/// entry name, directory components stripped. Exactly four fields with the
/// expected tags are required.
fn parse_entry_angles(name: &str, extension: &str, separator: &str) -> Option<AngleCondition> {
    let base = name.rsplit('/').next().unwrap_or(name);
    let base = base.strip_suffix(extension)?;
    let mut fields = base.split(separator);
    let tl: Millidegrees = fields.next()?.strip_prefix("tl")?.parse().ok()?;
    let pl: Millidegrees = fields.next()?.strip_prefix("pl")?.parse().ok()?;
    let tv: Millidegrees = fields.next()?.strip_prefix("tv")?.parse().ok()?;
    let pv: Millidegrees = fields.next()?.strip_prefix("pv")?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(AngleCondition::new(tl, pl, tv, pv))
}

/// Recounts per-condition occurrences, logs every duplicated condition and
/// builds the duplicate-condition error.
fn report_duplicates(
    path: &Path,
    names: &[String],
    extension: &str,
    separator: &str,
) -> ArchiveError {
    let mut occurrences: HashMap<AngleCondition, usize> = HashMap::with_capacity(names.len());
    for name in names {
        if let Some(condition) = parse_entry_angles(name, extension, separator) {
            *occurrences.entry(condition).or_insert(0) += 1;
        }
    }
    let mut count = 0;
    for (condition, occurrence) in &occurrences {
        if *occurrence > 1 {
            count += 1;
            log::error!(
                "'{}' has {occurrence} entries with condition {condition}",
                path.display()
            );
        }
    }
    ArchiveError::new(path, ArchiveErrorKind::DuplicatedConditions { count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn png_bytes(color: [u8; 3]) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(4, 4, image::Rgb(color));
        let mut cursor = Cursor::new(Vec::new());
        image.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    fn jpeg_bytes(color: [u8; 3]) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(8, 8, image::Rgb(color));
        let mut cursor = Cursor::new(Vec::new());
        image.write_to(&mut cursor, image::ImageFormat::Jpeg).unwrap();
        cursor.into_inner()
    }

    fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut archive = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, bytes) in entries {
            archive.start_file(name.to_string(), options).unwrap();
            archive.write_all(bytes).unwrap();
        }
        archive.finish().unwrap();
    }

    fn condition(tl: f32, pl: f32, tv: f32, pv: f32) -> AngleCondition {
        AngleCondition::from_degrees(tl, pl, tv, pv)
    }

    #[test]
    fn open_indexes_matching_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("material.zip");
        write_archive(
            &path,
            &[
                ("tl0 pl0 tv0 pv0.png", &png_bytes([1, 2, 3])),
                ("tl45 pl255 tv0 pv0.png", &png_bytes([10, 20, 30])),
                ("notes.txt", b"not an image"),
            ],
        );

        let btf = ZippedBtf::open_with(&path, ".png", " ").unwrap();
        assert_eq!(btf.len(), 2);
        let expected: HashSet<_> = [condition(0.0, 0.0, 0.0, 0.0), condition(45.0, 255.0, 0.0, 0.0)]
            .into_iter()
            .collect();
        assert_eq!(btf.angles_set(), &expected);
        assert_eq!(
            btf.entry_name(&condition(45.0, 255.0, 0.0, 0.0)),
            Some("tl45 pl255 tv0 pv0.png")
        );
    }

    #[test]
    fn lookup_decodes_the_matching_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("material.zip");
        write_archive(
            &path,
            &[
                ("tl0 pl0 tv0 pv0.png", &png_bytes([1, 2, 3])),
                ("tl45 pl255 tv0 pv0.png", &png_bytes([10, 20, 30])),
            ],
        );

        let mut btf = ZippedBtf::open_with(&path, ".png", " ").unwrap();
        let image = btf.lookup(45.0, 255.0, 0.0, 0.0).unwrap();
        assert_eq!(image.shape(), [4, 4, 3]);
        // Blue-green-red order, reversed from the authored RGB.
        assert_eq!(&image.samples().as_u8().unwrap()[..3], &[30, 20, 10]);
    }

    #[test]
    fn lookup_key_is_quantized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("material.zip");
        write_archive(&path, &[("tl45 pl255 tv0 pv0.png", &png_bytes([10, 20, 30]))]);

        let mut btf = ZippedBtf::open_with(&path, ".png", " ").unwrap();
        // Differences beyond the third decimal collapse onto the stored key.
        assert!(btf.lookup(45.0002, 255.0, 0.0, 0.0).is_ok());
        // Differences at the resolution do not.
        let err = btf.lookup(45.001, 255.0, 0.0, 0.0).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            err.kind,
            LookupErrorKind::NotFoundQuantized(key) if key == condition(45.001, 255.0, 0.0, 0.0)
        ));
    }

    #[test]
    fn lookup_of_absent_condition_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("material.zip");
        write_archive(&path, &[("tl0 pl0 tv0 pv0.png", &png_bytes([1, 2, 3]))]);

        let mut btf = ZippedBtf::open_with(&path, ".png", " ").unwrap();
        let err = btf.lookup(999.0, 999.0, 999.0, 999.0).unwrap_err();
        assert!(err.is_not_found());
        // The reader stays usable after a miss.
        assert!(btf.lookup(0.0, 0.0, 0.0, 0.0).is_ok());
    }

    #[test]
    fn duplicated_conditions_fail_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.zip");
        // Same quantized condition, different content.
        write_archive(
            &path,
            &[
                ("tl0 pl0 tv0 pv0.png", &png_bytes([1, 2, 3])),
                ("tl0.0001 pl0 tv0 pv0.png", &png_bytes([4, 5, 6])),
            ],
        );

        let err = ZippedBtf::open_with(&path, ".png", " ").unwrap_err();
        assert!(matches!(
            err.kind,
            ArchiveErrorKind::DuplicatedConditions { count: 1 }
        ));
    }

    #[test]
    fn malformed_entry_names_fail_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        write_archive(&path, &[("tlx pl0 tv0 pv0.png", &png_bytes([1, 2, 3]))]);
        let err = ZippedBtf::open_with(&path, ".png", " ").unwrap_err();
        assert!(matches!(
            err.kind,
            ArchiveErrorKind::ParseAngles { ref entry } if entry == "tlx pl0 tv0 pv0.png"
        ));

        let path = dir.path().join("fields.zip");
        write_archive(&path, &[("preview.png", &png_bytes([1, 2, 3]))]);
        let err = ZippedBtf::open_with(&path, ".png", " ").unwrap_err();
        assert!(matches!(err.kind, ArchiveErrorKind::ParseAngles { .. }));
    }

    #[test]
    fn separator_and_subdirectories_are_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("underscore.zip");
        write_archive(
            &path,
            &[("scans/tl20.25_pl10_tv11.5_pv0.png", &png_bytes([7, 8, 9]))],
        );

        let mut btf = ZippedBtf::open_with(&path, ".png", "_").unwrap();
        assert_eq!(btf.len(), 1);
        let image = btf.lookup(20.25, 10.0, 11.5, 0.0).unwrap();
        assert_eq!(image.shape(), [4, 4, 3]);
    }

    #[test]
    fn jpeg_archives_use_the_specialized_decoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos.zip");
        write_archive(&path, &[("tl0 pl0 tv0 pv0.jpg", &jpeg_bytes([200, 100, 50]))]);

        let mut btf = ZippedBtf::open_with(&path, ".jpg", " ").unwrap();
        let image = btf.lookup(0.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(image.shape(), [8, 8, 3]);
        let samples = image.samples().as_u8().unwrap();
        assert!((samples[0] as i32 - 50).abs() <= 4, "blue: {}", samples[0]);
        assert!((samples[2] as i32 - 200).abs() <= 4, "red: {}", samples[2]);
    }

    #[test]
    fn missing_file_fails_open() {
        let err = ZippedBtf::open("no-such-archive.zip").unwrap_err();
        assert!(matches!(err.kind, ArchiveErrorKind::Open(_)));
    }
}
