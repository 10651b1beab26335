use std::io::{self, BufReader, BufWriter, Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How run files are compressed on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    None,
    /// lz4 frame compression, requires the `compression_lz4_flex` feature.
    Lz4,
}

/// The write side of one run file.
pub enum RunWriter<W: Write> {
    Plain(BufWriter<W>),
    #[cfg(feature = "compression_lz4_flex")]
    Lz4(lz4_flex::frame::FrameEncoder<BufWriter<W>>),
}

impl Compression {
    /// fails when the codec was compiled out of this build.
    pub fn ensure_available(self) -> Result<()> {
        match self {
            Compression::None => Ok(()),
            #[cfg(feature = "compression_lz4_flex")]
            Compression::Lz4 => Ok(()),
            #[cfg(not(feature = "compression_lz4_flex"))]
            Compression::Lz4 => Err(Error::InvalidConfig(
                "lz4 compression requires the `compression_lz4_flex` feature".into(),
            )),
        }
    }

    pub fn writer<W: Write>(self, inner: W) -> Result<RunWriter<W>> {
        self.ensure_available()?;
        let buffered = BufWriter::new(inner);
        Ok(match self {
            #[cfg(feature = "compression_lz4_flex")]
            Compression::Lz4 => RunWriter::Lz4(lz4_flex::frame::FrameEncoder::new(buffered)),
            _ => RunWriter::Plain(buffered),
        })
    }

    pub fn reader<R: Read + Send + 'static>(self, inner: R) -> Result<Box<dyn Read + Send>> {
        self.ensure_available()?;
        let buffered = BufReader::new(inner);
        Ok(match self {
            #[cfg(feature = "compression_lz4_flex")]
            Compression::Lz4 => Box::new(lz4_flex::frame::FrameDecoder::new(buffered)),
            _ => Box::new(buffered),
        })
    }
}

impl<W: Write> RunWriter<W> {
    /// flushes every buffered byte down to the underlying sink.
    pub fn finish(self) -> Result<W> {
        let buffered = match self {
            RunWriter::Plain(buffered) => buffered,
            #[cfg(feature = "compression_lz4_flex")]
            RunWriter::Lz4(encoder) => encoder
                .finish()
                .map_err(|e| Error::Codec(format!("lz4: {e}")))?,
        };
        buffered.into_inner().map_err(|e| Error::Io(e.into_error()))
    }
}

impl<W: Write> Write for RunWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            RunWriter::Plain(w) => w.write(buf),
            #[cfg(feature = "compression_lz4_flex")]
            RunWriter::Lz4(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            RunWriter::Plain(w) => w.flush(),
            #[cfg(feature = "compression_lz4_flex")]
            RunWriter::Lz4(w) => w.flush(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    fn write_then_read(compression: Compression) -> Vec<u8> {
        let mut writer = compression.writer(Vec::new()).unwrap();
        writer.write_all(b"spilled run contents").unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = compression.reader(Cursor::new(bytes)).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn plain_passthrough() {
        assert_eq!(b"spilled run contents".to_vec(), write_then_read(Compression::None));
    }

    #[cfg(feature = "compression_lz4_flex")]
    #[test]
    fn lz4_frames() {
        assert_eq!(b"spilled run contents".to_vec(), write_then_read(Compression::Lz4));
    }

    #[cfg(not(feature = "compression_lz4_flex"))]
    #[test]
    fn lz4_unavailable_without_feature() {
        assert!(matches!(
            Compression::Lz4.ensure_available(),
            Err(Error::InvalidConfig(_))
        ));
    }
}
