//! Plain and gzip file handles shared by every format.

use kgx_core::{Compression, KgxError};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Open `path` for buffered reading, decompressing if needed.
pub fn open_reader(path: &Path, compression: Compression) -> Result<Box<dyn BufRead>, KgxError> {
    let file = File::open(path).map_err(|e| KgxError::io(path, e))?;
    match compression {
        Compression::None => Ok(Box::new(BufReader::new(file))),
        #[cfg(feature = "gzip")]
        Compression::Gzip => Ok(Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(
            BufReader::new(file),
        )))),
        #[cfg(not(feature = "gzip"))]
        Compression::Gzip => Err(KgxError::UnsupportedFormat("gzip".into())),
    }
}

enum Inner {
    Plain(BufWriter<File>),
    #[cfg(feature = "gzip")]
    Gzip(flate2::write::GzEncoder<BufWriter<File>>),
}

/// A buffered output file. Must be [`finish`](Self::finish)ed to flush
/// buffers and write the gzip trailer.
pub struct OutputFile {
    path: PathBuf,
    inner: Inner,
}

impl OutputFile {
    pub fn create(path: impl Into<PathBuf>, compression: Compression) -> Result<Self, KgxError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| KgxError::io(parent, e))?;
        }
        let file = File::create(&path).map_err(|e| KgxError::io(&path, e))?;
        let writer = BufWriter::new(file);
        let inner = match compression {
            Compression::None => Inner::Plain(writer),
            #[cfg(feature = "gzip")]
            Compression::Gzip => Inner::Gzip(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            )),
            #[cfg(not(feature = "gzip"))]
            Compression::Gzip => return Err(KgxError::UnsupportedFormat("gzip".into())),
        };
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wrap an I/O error with this file's path.
    pub fn error(&self, e: io::Error) -> KgxError {
        KgxError::io(&self.path, e)
    }

    pub fn finish(self) -> Result<(), KgxError> {
        let path = self.path;
        let result = match self.inner {
            Inner::Plain(mut w) => w.flush(),
            #[cfg(feature = "gzip")]
            Inner::Gzip(w) => w.finish().and_then(|mut inner| inner.flush()),
        };
        result.map_err(|e| KgxError::io(path, e))
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Plain(w) => w.write(buf),
            #[cfg(feature = "gzip")]
            Inner::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            Inner::Plain(w) => w.flush(),
            #[cfg(feature = "gzip")]
            Inner::Gzip(w) => w.flush(),
        }
    }
}

#[cfg(all(test, feature = "gzip"))]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_gzip_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt.gz");

        let mut out = OutputFile::create(&path, Compression::Gzip).unwrap();
        out.write_all(b"hello graph\n").unwrap();
        out.finish().unwrap();

        let mut raw = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut raw).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);

        let mut text = String::new();
        open_reader(&path, Compression::Gzip)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "hello graph\n");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = open_reader(Path::new("/nonexistent/graph.tsv"), Compression::None)
            .err()
            .unwrap();
        assert!(matches!(err, KgxError::Io { .. }));
    }
}
