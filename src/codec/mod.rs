//! Record serialization for spill files.
//!
//! A run file is nothing but the records of one run, encoded back to back
//! in sort order. The sorter never looks at the bytes itself, it only asks
//! the codec to append a record to a sink or to pull the next one out of a
//! source.

use std::{
    io::{self, ErrorKind, Read, Write},
    marker::PhantomData,
};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Encodes records into a byte stream and decodes them back in the same order.
pub trait RecordCodec<T> {
    /// appends one record to the sink.
    fn encode<W: Write>(&self, record: &T, sink: &mut W) -> Result<()>;

    /// decodes the next record from the source.
    /// Returns `Ok(None)` when the source ends cleanly between two records.
    fn decode<R: Read>(&self, source: &mut R) -> Result<Option<T>>;
}

/// The default codec: every record is written as a frame of
/// `[len: u32 le][bincode payload]`.
pub struct BincodeCodec<T> {
    phantom: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    pub fn new() -> Self {
        Self {
            phantom: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BincodeCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

const LEN_PREFIX: usize = std::mem::size_of::<u32>();

impl<T> RecordCodec<T> for BincodeCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode<W: Write>(&self, record: &T, sink: &mut W) -> Result<()> {
        let payload =
            bincode::serialize(record).map_err(|e| Error::Codec(format!("bincode serialize: {e}")))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| Error::Codec(format!("record of {} bytes is too large", payload.len())))?;
        sink.write_all(&len.to_le_bytes())?;
        sink.write_all(&payload)?;
        Ok(())
    }

    fn decode<R: Read>(&self, source: &mut R) -> Result<Option<T>> {
        let mut prefix = [0u8; LEN_PREFIX];
        if read_prefix(source, &mut prefix)? == 0 {
            return Ok(None);
        }
        let len = u32::from_le_bytes(prefix) as usize;
        let mut payload = vec![0u8; len];
        source.read_exact(&mut payload).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => Error::Codec("run file ends inside a record".into()),
            _ => Error::Io(e),
        })?;
        bincode::deserialize(&payload)
            .map(Some)
            .map_err(|e| Error::Codec(format!("bincode deserialize: {e}")))
    }
}

/// fills the prefix buffer, returning 0 if the source was already at its end.
/// A prefix that is cut short is a truncated file and reported as such.
fn read_prefix(source: &mut impl Read, prefix: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < prefix.len() {
        match source.read(&mut prefix[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    match filled {
        0 => Ok(0),
        n if n == prefix.len() => Ok(n),
        _ => Err(Error::Codec("run file ends inside a length prefix".into())),
    }
}

/// Lets a shared codec be handed to every reader of a sort.
impl<T, C> RecordCodec<T> for std::sync::Arc<C>
where
    C: RecordCodec<T>,
{
    fn encode<W: Write>(&self, record: &T, sink: &mut W) -> Result<()> {
        (**self).encode(record, sink)
    }

    fn decode<R: Read>(&self, source: &mut R) -> Result<Option<T>> {
        (**self).decode(source)
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Keyed {
        key: String,
        value: u64,
    }

    #[test]
    fn decodes_records_in_write_order() {
        let codec = BincodeCodec::new();
        let records = vec![
            Keyed { key: "efc".into(), value: 2 },
            Keyed { key: "abc".into(), value: 1 },
            Keyed { key: String::new(), value: 0 },
        ];
        let mut sink = Vec::new();
        for record in &records {
            codec.encode(record, &mut sink).unwrap();
        }

        let mut source = Cursor::new(sink);
        let decoded: Vec<Keyed> = std::iter::from_fn(|| codec.decode(&mut source).unwrap()).collect();
        assert_eq!(records, decoded);
        assert!(codec.decode(&mut source).unwrap().is_none());
    }

    #[test]
    fn empty_source_is_end_of_stream() {
        let codec: BincodeCodec<u32> = BincodeCodec::new();
        assert!(codec.decode(&mut io::empty()).unwrap().is_none());
    }

    #[test]
    fn truncated_record_is_an_error() {
        let codec = BincodeCodec::new();
        let mut sink = Vec::new();
        codec.encode(&0xdead_beef_u64, &mut sink).unwrap();
        sink.truncate(sink.len() - 3);

        let err = codec.decode(&mut Cursor::new(sink)).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn truncated_prefix_is_an_error() {
        let codec: BincodeCodec<u8> = BincodeCodec::new();
        let err = codec.decode(&mut Cursor::new(vec![1u8, 0])).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }
}
