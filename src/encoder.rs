use bytes::{Buf, Bytes, BytesMut};
use std::{collections::VecDeque, io, io::Read};

use crate::{part::quote, Boundary, FormFile, Part};

const CRLF: &[u8] = b"\r\n";

/// Serializes the parts of a form lazily, as it is read.
///
/// Headers and field values are rendered one part at a time, file payloads
/// are forwarded from their sources as they are read, so an attachment is
/// never held in memory as a whole. Each file source is closed once it has
/// been drained.
///
/// Per part the output is:
///
/// ```text
/// --<boundary>\r\n
/// Content-Disposition: form-data; name="<name>"[; filename="<filename>"]\r\n
/// [Content-Type: <type>\r\n]
/// \r\n
/// <payload>\r\n
/// ```
///
/// followed by `--<boundary>--\r\n` after the last part.
#[derive(Debug)]
pub struct Encoder {
    boundary: Boundary,
    parts: VecDeque<Part>,
    pending: VecDeque<Segment>,
    current: Option<Segment>,
    finished: bool,
}

#[derive(Debug)]
enum Segment {
    Bytes(Bytes),
    File(FormFile),
}

impl Encoder {
    pub(crate) fn new(boundary: Boundary, parts: Vec<Part>) -> Self {
        Encoder {
            boundary,
            parts: parts.into(),
            pending: VecDeque::new(),
            current: None,
            finished: false,
        }
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// `multipart/form-data; boundary=<boundary>`
    pub fn content_type(&self) -> String {
        content_type(&self.boundary)
    }

    /// Closes the sources of every file not yet drained. Safe to call more
    /// than once.
    pub fn close(&mut self) {
        let segments = self.current.iter_mut().chain(self.pending.iter_mut());
        for segment in segments {
            if let Segment::File(ref mut file) = *segment {
                file.close();
            }
        }

        self.parts.iter_mut().for_each(Part::close);
    }

    /// Moves the next segment into `current`. Returns false once everything,
    /// including the closing delimiter, has been handed out.
    fn advance(&mut self) -> bool {
        if let Some(segment) = self.pending.pop_front() {
            self.current = Some(segment);
            return true;
        }

        match self.parts.pop_front() {
            Some(Part::Field { name, value }) => {
                let mut buf = self.head(&name, None);
                buf.extend_from_slice(value.as_bytes());
                buf.extend_from_slice(CRLF);
                self.current = Some(Segment::Bytes(buf.freeze()));
            }

            Some(Part::File { name, file }) => {
                let head = self.head(&name, Some(&file));
                self.current = Some(Segment::Bytes(head.freeze()));
                self.pending.push_back(Segment::File(file));
                self.pending.push_back(Segment::Bytes(Bytes::from_static(CRLF)));
            }

            None if !self.finished => {
                log::trace!("Writing closing delimiter for boundary {}", self.boundary);

                let mut buf = BytesMut::with_capacity(self.boundary.as_str().len() + 6);
                buf.extend_from_slice(&self.boundary.delimiter());
                buf.extend_from_slice(b"--");
                buf.extend_from_slice(CRLF);
                self.current = Some(Segment::Bytes(buf.freeze()));
                self.finished = true;
            }

            None => return false,
        }

        true
    }

    fn head(&self, name: &str, file: Option<&FormFile>) -> BytesMut {
        let mut buf = BytesMut::with_capacity(128);

        buf.extend_from_slice(&self.boundary.delimiter());
        buf.extend_from_slice(CRLF);
        buf.extend_from_slice(b"Content-Disposition: form-data; name=");
        buf.extend_from_slice(quote(name).as_bytes());

        if let Some(file) = file {
            buf.extend_from_slice(b"; filename=");
            buf.extend_from_slice(quote(file.filename()).as_bytes());
            buf.extend_from_slice(CRLF);
            buf.extend_from_slice(b"Content-Type: ");
            buf.extend_from_slice(file.content_type().as_ref().as_bytes());
        }

        buf.extend_from_slice(CRLF);
        buf.extend_from_slice(CRLF);
        buf
    }
}

impl Read for Encoder {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let n = match self.current {
                Some(Segment::Bytes(ref mut bs)) => {
                    let n = bs.len().min(buf.len());
                    buf[..n].copy_from_slice(&bs[..n]);
                    bs.advance(n);
                    n
                }
                Some(Segment::File(ref mut file)) => file.read(buf)?,
                None => {
                    if self.advance() {
                        continue;
                    }
                    return Ok(0);
                }
            };

            if n > 0 {
                return Ok(n);
            }

            // Segment drained.
            if let Some(Segment::File(mut file)) = self.current.take() {
                log::trace!("Forwarded file {:?}", file.filename());
                file.close();
            }
        }
    }
}

pub(crate) fn content_type(boundary: &Boundary) -> String {
    format!("multipart/form-data; boundary={}", boundary.param_value())
}
