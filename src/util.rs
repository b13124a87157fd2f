use memmap2::Mmap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::Path;

use crate::error::{Error, Result};

/// Open a file for sequential reading, returning it with its size in bytes.
pub fn open_read(path: &Path) -> Result<(BufReader<File>, u64)> {
    let file = File::open(path).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "error opening file");
        Error::io(format!("opening {}", path.display()), e)
    })?;
    let size = file_size(&file, path)?;
    Ok((BufReader::new(file), size))
}

fn file_size(file: &File, path: &Path) -> Result<u64> {
    let meta = file.metadata().map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "error getting file stats");
        Error::io(format!("reading metadata of {}", path.display()), e)
    })?;
    Ok(meta.len())
}

/// Create `path` for writing, failing if anything already exists there.
pub fn create_exclusive(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "error creating output file");
            Error::io(format!("creating {}", path.display()), e)
        })?;
    Ok(BufWriter::new(file))
}

/// Read-only random access to a whole file.
pub struct MappedFile {
    // None for empty files, which can't be mapped on every platform
    mmap: Option<Mmap>,
}

impl MappedFile {
    /// Memory-map a file for read-only access.
    ///
    /// # Safety
    /// The mapping is read-only. Callers must not concurrently truncate or replace
    /// the underlying file while the `MappedFile` is live.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "error opening file");
            Error::io(format!("opening {}", path.display()), e)
        })?;
        if file_size(&file, path)? == 0 {
            return Ok(Self { mmap: None });
        }
        // SAFETY: We only read from this mapping; no concurrent modification of these files.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::io(format!("memory-mapping {}", path.display()), e))?;
        Ok(Self { mmap: Some(mmap) })
    }

    pub fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> u64 {
        self.bytes().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// Up to `len` bytes starting at `offset`; short (possibly empty) past the end.
    pub fn read_at(&self, offset: u64, len: usize) -> &[u8] {
        read_at(self.bytes(), offset, len)
    }
}

/// Up to `len` bytes of `data` starting at `offset`; short (possibly empty) past the end.
pub fn read_at(data: &[u8], offset: u64, len: usize) -> &[u8] {
    let start = usize::try_from(offset).map_or(data.len(), |o| o.min(data.len()));
    let end = start.saturating_add(len).min(data.len());
    &data[start..end]
}

/// Reads exactly `buf.len()` bytes or until EOF, returning the number of bytes read.
pub fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Byte-for-byte comparison of two files.
pub fn files_equal(a: &Path, b: &Path) -> Result<bool> {
    let left = MappedFile::open(a)?;
    let right = MappedFile::open(b)?;
    Ok(left.bytes() == right.bytes())
}
