use bytes::{Buf, Bytes, BytesMut};
use mime::Mime;
use std::{io, io::Read, mem, str};

use crate::{
    part::{parse_header_line, Disposition},
    Boundary, Error, FormFile, Part,
};

/// Default initial buffer capacity
pub const DEFAULT_BUFFER_CAP: usize = 35000;

const READ_CHUNK: usize = 8192;

const CRLF: &[u8] = &[13, 10]; // "\r\n"
const BOUNDARY_LAST_PART_SENTINEL: &[u8] = &[45, 45]; // "--"

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    SeekBoundary,
    ReadHeaders,
    ReadBody,
    Done,
}

#[derive(Debug, PartialEq)]
enum Scan {
    /// A delimiter starts at `at`. `last` when it is the closing one.
    Found { at: usize, last: bool },
    /// No delimiter in the buffer yet, or one whose suffix is still unread.
    Pending,
}

#[derive(Debug, Default)]
struct PartHeaders {
    disposition: Option<Disposition>,
    content_type: Option<Mime>,
}

impl PartHeaders {
    fn apply(&mut self, line: &str) -> Result<(), Error> {
        let (name, value) = parse_header_line(line)?;

        if name.eq_ignore_ascii_case("content-disposition") {
            self.disposition = Some(Disposition::parse(value)?);
        } else if name.eq_ignore_ascii_case("content-type") {
            match value.parse::<Mime>() {
                Ok(ct) => self.content_type = Some(ct),
                Err(e) => log::debug!("Unparseable part Content-Type {:?}: {}", value, e),
            }
        } else {
            log::trace!("Ignoring part header {:?}", name);
        }

        Ok(())
    }

    fn into_part(self, payload: Bytes) -> Result<Part, Error> {
        let disposition = self.disposition.unwrap_or_default();
        let name = disposition.name.ok_or(Error::MissingFieldName)?;

        let part = match disposition.filename {
            Some(filename) => {
                let ct = self
                    .content_type
                    .unwrap_or(mime::APPLICATION_OCTET_STREAM);
                Part::file(name, FormFile::from_bytes(filename, ct, payload))
            }
            None => Part::field(name, String::from_utf8_lossy(&payload).into_owned()),
        };

        Ok(part)
    }
}

/// Streaming multipart/form-data parser.
///
/// Reads the source in chunks and walks `SeekBoundary -> ReadHeaders ->
/// ReadBody -> (ReadHeaders | Done)`, yielding one part per body. The
/// trailing bytes of the buffer are always kept across reads, so a delimiter
/// split over two reads is still found. Whether the source is live or already
/// in memory makes no difference to the result.
///
/// The source is dropped, and with that closed, as soon as the closing
/// delimiter has been read and the epilogue drained, or on the first error.
pub struct Parser<R> {
    reader: Option<R>,
    buffer: BytesMut,
    // "\r\n--boundary", the CRLF belongs to the delimiter, not the payload.
    delimiter: Vec<u8>,
    state: State,
    headers: PartHeaders,
    eof: bool,
    failed: bool,
}

impl<R: Read> Parser<R> {
    pub fn new(reader: R, boundary: &Boundary) -> Self {
        Self::with_capacity(reader, boundary, DEFAULT_BUFFER_CAP)
    }

    pub fn with_capacity(reader: R, boundary: &Boundary, capacity: usize) -> Self {
        let mut delimiter = CRLF.to_vec();
        delimiter.extend_from_slice(&boundary.delimiter());

        log::debug!("Creating parser with boundary: {:?}", boundary.as_str());

        // The first delimiter may open the input without a preceding line
        // break; seeding one keeps it anchored to the start of a line.
        let mut buffer = BytesMut::with_capacity(capacity.max(CRLF.len()));
        buffer.extend_from_slice(CRLF);

        Parser {
            reader: Some(reader),
            buffer,
            delimiter,
            state: State::SeekBoundary,
            headers: PartHeaders::default(),
            eof: false,
            failed: false,
        }
    }

    /// Parses every part, consuming and closing the source.
    pub fn parse(mut self) -> Result<Vec<Part>, Error> {
        let parts = self.by_ref().collect::<Result<Vec<_>, _>>()?;
        log::debug!("Parsed {} parts", parts.len());
        Ok(parts)
    }

    fn next_part(&mut self) -> Result<Option<Part>, Error> {
        loop {
            match self.state {
                State::SeekBoundary => self.seek_boundary()?,
                State::ReadHeaders => self.read_headers()?,
                State::ReadBody => return self.read_body().map(Some),
                State::Done => {
                    self.finish()?;
                    return Ok(None);
                }
            }
        }
    }

    fn seek_boundary(&mut self) -> Result<(), Error> {
        loop {
            match scan(&self.buffer, &self.delimiter) {
                Scan::Found { at, last } => {
                    log::debug!("Found first delimiter at index: {}", at);
                    self.buffer.advance(at + self.delimiter.len() + 2);
                    self.state = if last { State::Done } else { State::ReadHeaders };
                    return Ok(());
                }

                Scan::Pending => {
                    if self.eof {
                        return Err(Error::UnterminatedBody);
                    }

                    // Preamble, discard all but the window a delimiter may start in.
                    let keep = self.delimiter.len() + 1;
                    if self.buffer.len() > keep {
                        let n = self.buffer.len() - keep;
                        self.buffer.advance(n);
                    }

                    self.fill()?;
                }
            }
        }
    }

    fn read_headers(&mut self) -> Result<(), Error> {
        loop {
            match twoway::find_bytes(&self.buffer, CRLF) {
                Some(0) => {
                    self.buffer.advance(CRLF.len());

                    if self.headers.disposition.is_none() {
                        return Err(Error::MissingFieldName);
                    }

                    self.state = State::ReadBody;
                    return Ok(());
                }

                Some(i) => {
                    let line = self.buffer.split_to(i);
                    self.buffer.advance(CRLF.len());

                    let line = str::from_utf8(&line)
                        .map_err(|_| Error::malformed("header line is not valid UTF-8"))?;
                    self.headers.apply(line)?;
                }

                None => {
                    if self.eof {
                        return Err(Error::UnterminatedBody);
                    }
                    self.fill()?;
                }
            }
        }
    }

    fn read_body(&mut self) -> Result<Part, Error> {
        let mut payload = BytesMut::new();

        loop {
            match scan(&self.buffer, &self.delimiter) {
                Scan::Found { at, last } => {
                    payload.extend_from_slice(&self.buffer[..at]);
                    self.buffer.advance(at + self.delimiter.len() + 2);

                    if last {
                        log::debug!("Found stop sentinel");
                        self.state = State::Done;
                    } else {
                        self.state = State::ReadHeaders;
                    }
                    break;
                }

                Scan::Pending => {
                    if self.eof {
                        return Err(Error::UnterminatedBody);
                    }

                    let keep = self.delimiter.len() + 1;
                    if self.buffer.len() > keep {
                        let n = self.buffer.len() - keep;
                        payload.extend_from_slice(&self.buffer.split_to(n));
                    }

                    self.fill()?;
                }
            }
        }

        log::trace!("Part complete, payload of {} bytes", payload.len());
        mem::take(&mut self.headers).into_part(payload.freeze())
    }

    /// Drains the epilogue and closes the source.
    fn finish(&mut self) -> Result<(), Error> {
        self.buffer.clear();
        while self.fill()? > 0 {
            self.buffer.clear();
        }
        self.close();
        Ok(())
    }

    fn fill(&mut self) -> Result<usize, Error> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => {
                self.eof = true;
                return Ok(0);
            }
        };

        let mut chunk = [0u8; READ_CHUNK];
        let n = loop {
            match reader.read(&mut chunk) {
                Ok(n) => break n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from(e)),
            }
        };

        if n == 0 {
            self.eof = true;
        } else {
            log::trace!("Read chunk of {} bytes", n);
            self.buffer.extend_from_slice(&chunk[..n]);
        }

        Ok(n)
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            log::trace!("Closing input source");
        }
    }
}

impl<R: Read> Iterator for Parser<R> {
    type Item = Result<Part, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.next_part() {
            Ok(Some(part)) => Some(Ok(part)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                self.close();
                Some(Err(e))
            }
        }
    }
}

/// Finds the first delimiter in `buf` followed by either CRLF or `--`.
/// Occurrences followed by anything else are payload.
fn scan(buf: &[u8], delimiter: &[u8]) -> Scan {
    let mut from = 0;

    while let Some(i) = twoway::find_bytes(&buf[from..], delimiter) {
        let at = from + i;
        let end = at + delimiter.len();

        match buf.get(end..end + 2) {
            Some(CRLF) => return Scan::Found { at, last: false },
            Some(BOUNDARY_LAST_PART_SENTINEL) => return Scan::Found { at, last: true },
            Some(_) => from = at + 1,
            None => return Scan::Pending,
        }
    }

    Scan::Pending
}
