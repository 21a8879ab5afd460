//! Transparent decompression for input and baseline files.
//!
//! Extracts and prior-run outputs are often archived compressed. When a row
//! source is opened from a path, the codec is chosen by file extension first and
//! by magic bytes second; plain files pass through buffered.
//!
//! ## Built-in Codecs
//!
//! - **Gzip** (`.gz`) - via `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) - via `bzip2` (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - via `xz2` (feature: `compression-xz`)
//!
//! Readers returned here are `Send` so a row source can be moved onto its
//! reader thread.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Boxed byte stream that can cross into a stage thread.
pub type DynRead = Box<dyn Read + Send>;

/// A decompression codec recognised by extension or leading bytes.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g. "gzip").
    fn name(&self) -> &str;

    /// Lowercase file extensions including the leading dot.
    fn extensions(&self) -> &[&str];

    /// Leading byte signature, if the format has one.
    fn magic_bytes(&self) -> Option<&[u8]>;

    /// Wrap `reader` so that it yields decompressed bytes.
    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead>;
}

fn codecs() -> Vec<Box<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Box::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Box::new(ZstdCodec),
        #[cfg(feature = "compression-bzip2")]
        Box::new(Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Box::new(XzCodec),
    ]
}

/// Codec whose extension matches `path`, case-insensitively.
fn detect_from_extension(path: &Path) -> Option<Box<dyn CompressionCodec>> {
    let name = path.to_string_lossy().to_lowercase();
    codecs()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| name.ends_with(ext)))
}

/// Codec whose signature starts the buffered stream. The reader is not advanced.
fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<Box<dyn CompressionCodec>> {
    let buf = reader.fill_buf().ok()?;
    if buf.is_empty() {
        return None;
    }
    codecs().into_iter().find(|codec| {
        codec
            .magic_bytes()
            .is_some_and(|magic| buf.starts_with(magic))
    })
}

/// Wrap `reader` with decompression when `path_hint` or its content calls for it.
///
/// # Errors
/// Returns an error if the selected codec fails to initialise.
pub fn auto_detect_reader<R: Read + Send + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<DynRead> {
    if let Some(codec) = detect_from_extension(path_hint.as_ref()) {
        return codec
            .wrap_reader(Box::new(BufReader::new(reader)))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    let mut buffered = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buffered) {
        return codec
            .wrap_reader(Box::new(buffered))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    Ok(Box::new(buffered))
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead> {
        Ok(Box::new(flate2::read::MultiGzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as DynRead)
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &str {
        "bzip2"
    }

    fn extensions(&self) -> &[&str] {
        &[".bz2", ".bzip2"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(b"BZh")
    }

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead> {
        Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &str {
        "xz"
    }

    fn extensions(&self) -> &[&str] {
        &[".xz"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00])
    }

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead> {
        Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)))
    }
}
