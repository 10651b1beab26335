use std::{fs::File, io::Read, marker::PhantomData, path::PathBuf};

use crate::{
    codec::RecordCodec,
    error::{Error, Result},
    tape::compressor::Compression,
};

use super::RunReader;

/// A run backed by a spill file on disk.
/// Records are decoded one at a time, so only the current record
/// and the read buffer are held in memory.
pub struct DiskRunReader<T, C> {
    path: PathBuf,
    codec: C,
    compression: Compression,
    /// the open file, None before `open` and after the end was reached.
    source: Option<Box<dyn Read + Send>>,
    head: Option<T>,
    phantom: PhantomData<fn() -> T>,
}

impl<T, C> DiskRunReader<T, C> {
    pub fn new(path: PathBuf, codec: C, compression: Compression) -> Self {
        Self {
            path,
            codec,
            compression,
            source: None,
            head: None,
            phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// true while the reader holds an open file handle.
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }
}

impl<T, C> RunReader<T> for DiskRunReader<T, C>
where
    C: RecordCodec<T>,
{
    fn open(&mut self) -> Result<()> {
        let file = File::open(&self.path).map_err(|source| Error::RunFile {
            path: self.path.clone(),
            source,
        })?;
        self.source = Some(self.compression.reader(file)?);
        Ok(())
    }

    fn read(&mut self) -> Result<Option<&T>> {
        self.head = match self.source.as_mut() {
            Some(source) => self.codec.decode(source)?,
            None => None,
        };
        if self.head.is_none() {
            // release the handle as soon as the run is drained
            self.source = None;
        }
        Ok(self.head.as_ref())
    }

    fn peek(&self) -> Option<&T> {
        self.head.as_ref()
    }

    fn take(&mut self) -> Option<T> {
        self.head.take()
    }

    fn close(&mut self) {
        self.head = None;
        self.source = None;
    }
}
