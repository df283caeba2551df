//! On-disk front-coded lists.
//!
//! A stored list is three files sharing a basename:
//!
//! - `<basename>.properties`: `key=value` metadata (format version, count,
//!   ratio, UTF-8 flag, directory length, data length)
//! - `<basename>.bytearray`: the encoded records
//! - `<basename>.pointers`: the directory, one little-endian `u64` per full
//!   copy
//!
//! [`build`] streams its input straight to these files, holding only the
//! previous string in memory. [`load`] maps the records and reads the (small)
//! directory, checking every file against the properties before returning.
//!
//! Writers stage the files under `<basename>.tmp.*` and rename them into
//! place once all three are complete, properties last. A failed write
//! removes what it staged and leaves any list already at the basename as it
//! was.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::front_coded::{DirectorySink, FrontCodedBuilder, FrontCodedList};
use crate::source::{not_found_or_io, ByteSource, MappedBytes};
use crate::Config;

/// Version written to and expected in the properties file.
pub const FORMAT_VERSION: u32 = 1;

/// Extension of the metadata file.
pub const PROPERTIES_EXTENSION: &str = "properties";
/// Extension of the encoded records file.
pub const DATA_EXTENSION: &str = "bytearray";
/// Extension of the directory file.
pub const POINTERS_EXTENSION: &str = "pointers";

/// Suffix added to the basename while files are being written.
const STAGING_SUFFIX: &str = "tmp";

const EXTENSIONS: [&str; 3] = [DATA_EXTENSION, POINTERS_EXTENSION, PROPERTIES_EXTENSION];

/// A front-coded list whose records are memory-mapped.
pub type MappedFrontCodedList = FrontCodedList<MappedBytes>;

/// The contents of a `.properties` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreProperties {
    /// Format version.
    pub version: u32,
    /// Number of strings.
    pub count: u64,
    /// Distance between full copies.
    pub ratio: u32,
    /// Whether strings are UTF-8 text.
    pub utf8: bool,
    /// Number of directory entries.
    pub pointers: u64,
    /// Length of the records file in bytes.
    pub bytes: u64,
}

impl StoreProperties {
    /// The list configuration these properties describe.
    pub fn config(&self) -> Config {
        Config::new(self.ratio).utf8(self.utf8)
    }

    /// Write as `key=value` lines.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "# front-coded string list")?;
        writeln!(out, "version={}", self.version)?;
        writeln!(out, "count={}", self.count)?;
        writeln!(out, "ratio={}", self.ratio)?;
        writeln!(out, "utf8={}", self.utf8)?;
        writeln!(out, "pointers={}", self.pointers)?;
        writeln!(out, "bytes={}", self.bytes)?;
        out.flush()?;
        Ok(())
    }

    /// Parse `key=value` lines; blank lines, `#` comments and unknown keys
    /// are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut version = None;
        let mut count = None;
        let mut ratio = None;
        let mut utf8 = None;
        let mut pointers = None;
        let mut bytes = None;

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| Error::corrupt(format!("malformed property line {line:?}")))?;
            let (key, value) = (key.trim(), value.trim());
            match key {
                "version" => version = Some(parse_value(key, value)?),
                "count" => count = Some(parse_value(key, value)?),
                "ratio" => ratio = Some(parse_value(key, value)?),
                "utf8" => utf8 = Some(parse_value(key, value)?),
                "pointers" => pointers = Some(parse_value(key, value)?),
                "bytes" => bytes = Some(parse_value(key, value)?),
                _ => {}
            }
        }

        let props = Self {
            version: require("version", version)?,
            count: require("count", count)?,
            ratio: require("ratio", ratio)?,
            utf8: require("utf8", utf8)?,
            pointers: require("pointers", pointers)?,
            bytes: require("bytes", bytes)?,
        };
        if props.version != FORMAT_VERSION {
            return Err(Error::corrupt(format!(
                "unsupported format version {}",
                props.version
            )));
        }
        if props.ratio == 0 {
            return Err(Error::corrupt("ratio is zero"));
        }
        Ok(props)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::corrupt(format!("bad value {value:?} for property {key}")))
}

fn require<T>(key: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| Error::corrupt(format!("missing property {key}")))
}

/// Path of the file with extension `ext` for `basename`.
///
/// The extension is appended, so dots already in the basename are kept.
pub fn file_path(basename: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(basename.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Streams directory entries to a file as little-endian `u64`s.
struct PointerFileWriter<W: Write> {
    out: W,
    count: u64,
}

impl<W: Write> DirectorySink for PointerFileWriter<W> {
    fn push_pointer(&mut self, offset: u64) -> Result<()> {
        self.out.write_all(&offset.to_le_bytes())?;
        self.count += 1;
        Ok(())
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

fn close(writer: BufWriter<File>) -> Result<()> {
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn write_properties(basename: &Path, props: &StoreProperties) -> Result<()> {
    let mut out = create(&file_path(basename, PROPERTIES_EXTENSION))?;
    props.write_to(&mut out)?;
    close(out)
}

/// Run `write` against the staging basename of `basename`, then move the
/// staged files into place; on failure remove them instead.
fn commit<F>(basename: &Path, write: F) -> Result<StoreProperties>
where
    F: FnOnce(&Path) -> Result<StoreProperties>,
{
    let stage = file_path(basename, STAGING_SUFFIX);
    match write(&stage) {
        Ok(props) => {
            for ext in EXTENSIONS {
                fs::rename(file_path(&stage, ext), file_path(basename, ext))?;
            }
            Ok(props)
        }
        Err(e) => {
            for ext in EXTENSIONS {
                let path = file_path(&stage, ext);
                if let Err(err) = fs::remove_file(&path) {
                    if err.kind() != io::ErrorKind::NotFound {
                        warn!(path = %path.display(), %err, "could not remove staged file");
                    }
                }
            }
            Err(e)
        }
    }
}

/// Encode `strings` straight to the files of `basename`.
///
/// Nothing at `basename` changes unless every string is encoded.
pub fn build<P, I>(basename: P, config: Config, strings: I) -> Result<StoreProperties>
where
    P: AsRef<Path>,
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let basename = basename.as_ref();
    config.validate()?;

    let props = commit(basename, |stage| {
        let data = create(&file_path(stage, DATA_EXTENSION))?;
        let pointers = PointerFileWriter {
            out: create(&file_path(stage, POINTERS_EXTENSION))?,
            count: 0,
        };
        let mut builder = FrontCodedBuilder::with_sinks(config, data, pointers)?;
        builder.extend(strings)?;
        let out = builder.finish()?;
        close(out.data)?;
        let pointer_count = out.directory.count;
        close(out.directory.out)?;

        let props = StoreProperties {
            version: FORMAT_VERSION,
            count: out.len,
            ratio: config.ratio,
            utf8: config.utf8,
            pointers: pointer_count,
            bytes: out.data_bytes,
        };
        write_properties(stage, &props)?;
        Ok(props)
    })?;
    debug!(
        basename = %basename.display(),
        count = props.count,
        bytes = props.bytes,
        pointers = props.pointers,
        "front-coded list built on disk"
    );
    Ok(props)
}

/// Write an already built list to the files of `basename`.
pub fn save<S: ByteSource, P: AsRef<Path>>(
    list: &FrontCodedList<S>,
    basename: P,
) -> Result<StoreProperties> {
    let basename = basename.as_ref();

    let props = commit(basename, |stage| {
        let mut data = create(&file_path(stage, DATA_EXTENSION))?;
        data.write_all(list.data().as_bytes())?;
        close(data)?;

        let mut pointers = create(&file_path(stage, POINTERS_EXTENSION))?;
        for &p in list.pointers() {
            pointers.write_all(&p.to_le_bytes())?;
        }
        close(pointers)?;

        let props = StoreProperties {
            version: FORMAT_VERSION,
            count: list.len(),
            ratio: list.ratio(),
            utf8: list.is_utf8(),
            pointers: list.pointers().len() as u64,
            bytes: list.data().len(),
        };
        write_properties(stage, &props)?;
        Ok(props)
    })?;
    debug!(basename = %basename.display(), count = props.count, "front-coded list saved");
    Ok(props)
}

/// Read the properties of the list stored at `basename`.
pub fn read_properties(basename: impl AsRef<Path>) -> Result<StoreProperties> {
    let path = file_path(basename.as_ref(), PROPERTIES_EXTENSION);
    let text = fs::read_to_string(&path).map_err(|e| not_found_or_io(&path, e))?;
    StoreProperties::parse(&text)
}

fn read_pointers(path: &Path, expected: u64) -> Result<Box<[u64]>> {
    let raw = fs::read(path).map_err(|e| not_found_or_io(path, e))?;
    if raw.len() % 8 != 0 || (raw.len() / 8) as u64 != expected {
        return Err(Error::corrupt(format!(
            "{} has {} bytes, expected {expected} pointers",
            path.display(),
            raw.len()
        )));
    }
    Ok(raw
        .chunks_exact(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
        .collect())
}

/// Open the list stored at `basename`, memory-mapping its records.
pub fn load(basename: impl AsRef<Path>) -> Result<MappedFrontCodedList> {
    let basename = basename.as_ref();
    let props = read_properties(basename)?;
    let pointers = read_pointers(&file_path(basename, POINTERS_EXTENSION), props.pointers)?;
    let data = MappedBytes::open(file_path(basename, DATA_EXTENSION))?;
    if data.len() != props.bytes {
        return Err(Error::corrupt(format!(
            "data file has {} bytes, properties say {}",
            data.len(),
            props.bytes
        )));
    }
    let list = FrontCodedList::from_parts(props.config(), props.count, data, pointers)?;
    debug!(
        basename = %basename.display(),
        count = props.count,
        ratio = props.ratio,
        "front-coded list mapped"
    );
    Ok(list)
}
