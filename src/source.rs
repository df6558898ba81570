use bytes::{Buf, Bytes, BytesMut};
use std::{fmt, io, io::Read};

/// Byte source of a file part.
///
/// A source is either live, reading from a caller supplied reader, or buffered
/// in memory. Closing drops the underlying reader and may be done any number
/// of times, by any owner; only the first close has an effect.
pub struct FileSource {
    state: State,
}

enum State {
    Live(Box<dyn Read + Send>),
    Buffered(Bytes),
    Closed,
}

impl FileSource {
    pub fn new<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        FileSource {
            state: State::Live(Box::new(reader)),
        }
    }

    pub fn from_bytes<B: Into<Bytes>>(bs: B) -> Self {
        FileSource {
            state: State::Buffered(bs.into()),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self.state, State::Buffered(_))
    }

    /// Releases the underlying reader. Closing a closed source is a no-op.
    pub fn close(&mut self) {
        if let State::Closed = self.state {
            return;
        }

        log::trace!("Closing file source");
        self.state = State::Closed;
    }

    /// Pulls whatever is left of a live source into memory, closing the live
    /// reader, and returns the unread bytes. The source keeps serving them.
    pub fn buffer(&mut self) -> io::Result<Bytes> {
        match self.state {
            State::Buffered(ref bs) => Ok(bs.clone()),
            State::Closed => Err(closed_error()),
            State::Live(ref mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;

                log::trace!("Buffered {} bytes of a live file source", buf.len());

                let bs = Bytes::from(buf);
                self.state = State::Buffered(bs.clone());
                Ok(bs)
            }
        }
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.state {
            State::Live(ref mut reader) => reader.read(buf),
            State::Buffered(ref mut bs) => {
                let n = bs.len().min(buf.len());
                buf[..n].copy_from_slice(&bs[..n]);
                bs.advance(n);
                Ok(n)
            }
            State::Closed => Err(closed_error()),
        }
    }
}

impl From<Bytes> for FileSource {
    fn from(bs: Bytes) -> Self {
        FileSource::from_bytes(bs)
    }
}

impl From<BytesMut> for FileSource {
    fn from(bs: BytesMut) -> Self {
        FileSource::from_bytes(bs.freeze())
    }
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.state {
            State::Live(_) => f.write_str("FileSource(live)"),
            State::Buffered(ref bs) => write!(f, "FileSource(buffered, {} bytes)", bs.len()),
            State::Closed => f.write_str("FileSource(closed)"),
        }
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "read from a closed file source")
}
