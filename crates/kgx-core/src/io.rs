//! Record sources and sinks.
//!
//! Every format reads through a [`Source`] and writes through a [`Sink`].
//! Both are pull/push one record at a time, so memory stays bounded by the
//! format's own buffering, never by the size of the graph.

use crate::error::KgxError;
use crate::record::{Edge, Node, Record};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// A stream of records.
pub trait Source {
    /// Pull the next record; `Ok(None)` at end of stream.
    ///
    /// A recoverable error ([`KgxError::is_recoverable`]) drops one record;
    /// the caller may keep pulling.
    fn next_record(&mut self) -> Result<Option<Record>, KgxError>;
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn next_record(&mut self) -> Result<Option<Record>, KgxError> {
        (**self).next_record()
    }
}

/// A destination for records.
pub trait Sink {
    fn write_node(&mut self, node: &Node) -> Result<(), KgxError>;

    fn write_edge(&mut self, edge: &Edge) -> Result<(), KgxError>;

    fn write(&mut self, record: &Record) -> Result<(), KgxError> {
        match record {
            Record::Node(node) => self.write_node(node),
            Record::Edge(edge) => self.write_edge(edge),
        }
    }

    /// Flush buffers and close outputs. Called exactly once, last.
    fn finalize(&mut self) -> Result<(), KgxError>;
}

/// A source over any iterator of records.
pub struct IterSource<I> {
    records: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Record>,
{
    pub fn new(records: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            records: records.into_iter(),
        }
    }
}

impl<I> Source for IterSource<I>
where
    I: Iterator<Item = Record>,
{
    fn next_record(&mut self) -> Result<Option<Record>, KgxError> {
        Ok(self.records.next())
    }
}

type Opener = Box<dyn FnMut(&Path) -> Result<Box<dyn Source>, KgxError>>;

/// Reads several files of one format back to back, in listed order.
///
/// Each file is opened only when the previous one is exhausted.
pub struct ChainSource {
    pending: VecDeque<PathBuf>,
    current: Option<Box<dyn Source>>,
    open: Opener,
}

impl ChainSource {
    pub fn new<F>(paths: impl IntoIterator<Item = PathBuf>, open: F) -> Self
    where
        F: FnMut(&Path) -> Result<Box<dyn Source>, KgxError> + 'static,
    {
        Self {
            pending: paths.into_iter().collect(),
            current: None,
            open: Box::new(open),
        }
    }
}

impl Source for ChainSource {
    fn next_record(&mut self) -> Result<Option<Record>, KgxError> {
        loop {
            if let Some(source) = self.current.as_mut() {
                match source.next_record()? {
                    Some(record) => return Ok(Some(record)),
                    None => self.current = None,
                }
            }
            let Some(path) = self.pending.pop_front() else {
                return Ok(None);
            };
            tracing::debug!(path = %path.display(), "opening input");
            self.current = Some((self.open)(&path)?);
        }
    }
}

/// A sink that keeps everything it is given.
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<Record>,
    pub finalized: bool,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.records.iter().filter_map(Record::as_node)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.records.iter().filter_map(Record::as_edge)
    }
}

impl Sink for VecSink {
    fn write_node(&mut self, node: &Node) -> Result<(), KgxError> {
        self.records.push(Record::Node(node.clone()));
        Ok(())
    }

    fn write_edge(&mut self, edge: &Edge) -> Result<(), KgxError> {
        self.records.push(Record::Edge(edge.clone()));
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), KgxError> {
        self.finalized = true;
        Ok(())
    }
}

/// Drain a source, collecting records and counting recoverable errors.
pub fn read_all(source: &mut dyn Source) -> Result<(Vec<Record>, usize), KgxError> {
    let mut records = Vec::new();
    let mut skipped = 0;
    loop {
        match source.next_record() {
            Ok(Some(record)) => records.push(record),
            Ok(None) => return Ok((records, skipped)),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "skipping record");
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
