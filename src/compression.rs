//! Decompression of bzip2 compressed dumps.
//!
//! Wikimedia publishes its dumps as bzip2 files, and the "multistream" variants are
//! a concatenation of independent bzip2 streams (one per block of 100 pages). A
//! plain bzip2 decoder stops after the first stream, so the reader produced here
//! always decodes every member until the underlying file ends.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use bzip2::bufread::MultiBzDecoder;

// large enough that the XML reader rarely has to refill in the middle of a page
const DECOMPRESSED_BUFFER_SIZE: usize = 256 * 1024;

#[derive(Debug, thiserror::Error)]
#[error("failed to open dump file `{}`", path.display())]
pub struct OpenDumpError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Wrap a compressed byte source so that it yields the decompressed dump.
///
/// Decompression is incremental: only the decoder state and two fixed-size
/// buffers are held in memory, independent of the dump size. Corrupt or truncated
/// input surfaces as an `std::io::Error` from the returned reader.
pub fn decompressing_reader<R: BufRead>(compressed: R) -> BufReader<MultiBzDecoder<R>> {
    BufReader::with_capacity(DECOMPRESSED_BUFFER_SIZE, MultiBzDecoder::new(compressed))
}

/// Open a `.xml.bz2` dump from disk.
pub fn open_dump(path: &Path) -> Result<BufReader<MultiBzDecoder<BufReader<File>>>, OpenDumpError> {
    let file = File::open(path).map_err(|source| OpenDumpError {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(message = "Opened dump file", path = %path.display());

    Ok(decompressing_reader(BufReader::new(file)))
}
