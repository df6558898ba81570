use std::io::{self, Read, Write};

use crate::{
    encoder, header_map::boundary_from_headers, parser::DEFAULT_BUFFER_CAP, Boundary, Encoder,
    Error, FormFile, HeaderMap, Parser, Part,
};

/// A multipart/form-data body: an ordered list of fields and files,
/// delimited by a boundary.
///
/// Names are not unique. Parts keep the order they were appended or parsed
/// in, and are encoded in that order.
///
/// The body owns the source of every file in it, whether handed in by a
/// builder or created while parsing, and closes them all on `close` (or when
/// dropped). Sources may also be closed directly through `file_mut`; closing
/// twice is harmless.
#[derive(Debug)]
pub struct FormBody {
    boundary: Boundary,
    parts: Vec<Part>,
    closed: bool,
}

impl FormBody {
    /// An empty form with a generated boundary.
    pub fn new() -> Self {
        Self::with_boundary(Boundary::generate())
    }

    pub fn with_boundary(boundary: Boundary) -> Self {
        FormBody {
            boundary,
            parts: Vec::new(),
            closed: false,
        }
    }

    pub fn with_field<N: Into<String>, V: Into<String>>(self, name: N, value: V) -> Self {
        self.with_part(Part::field(name, value))
    }

    pub fn with_file<N: Into<String>>(self, name: N, file: FormFile) -> Self {
        self.with_part(Part::file(name, file))
    }

    pub fn with_part(mut self, part: Part) -> Self {
        if let Part::File { .. } = part {
            self.closed = false;
        }

        self.parts.push(part);
        self
    }

    /// Parses a form from `reader`. The reader is consumed and closed whether
    /// or not parsing succeeds.
    pub fn from_reader<R: Read>(reader: R, boundary: Boundary) -> Result<Self, Error> {
        Self::from_reader_with_capacity(reader, boundary, DEFAULT_BUFFER_CAP)
    }

    pub fn from_reader_with_capacity<R: Read>(
        reader: R,
        boundary: Boundary,
        buf_cap: usize,
    ) -> Result<Self, Error> {
        let parts = Parser::with_capacity(reader, &boundary, buf_cap).parse()?;

        Ok(FormBody {
            boundary,
            parts,
            closed: false,
        })
    }

    /// Parses the body of a message, taking the boundary from its
    /// Content-Type header.
    pub fn from_message<R: Read>(headers: &impl HeaderMap, body: R) -> Result<Self, Error> {
        Self::from_message_with_capacity(headers, body, DEFAULT_BUFFER_CAP)
    }

    pub fn from_message_with_capacity<R: Read>(
        headers: &impl HeaderMap,
        body: R,
        buf_cap: usize,
    ) -> Result<Self, Error> {
        let boundary = boundary_from_headers(headers)?;
        Self::from_reader_with_capacity(body, boundary, buf_cap)
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// `multipart/form-data; boundary=<boundary>`
    pub fn content_type(&self) -> String {
        encoder::content_type(&self.boundary)
    }

    /// The first value of the field `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields(name).into_iter().next()
    }

    /// Every value of the field `name`, in order.
    pub fn fields(&self, name: &str) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match *part {
                Part::Field {
                    name: ref n,
                    ref value,
                } if n == name => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The first file named `name`.
    pub fn file(&self, name: &str) -> Option<&FormFile> {
        self.files(name).into_iter().next()
    }

    /// Every file named `name`, in order.
    pub fn files(&self, name: &str) -> Vec<&FormFile> {
        self.parts
            .iter()
            .filter_map(|part| match *part {
                Part::File {
                    name: ref n,
                    ref file,
                } if n == name => Some(file),
                _ => None,
            })
            .collect()
    }

    pub fn file_mut(&mut self, name: &str) -> Option<&mut FormFile> {
        self.files_mut(name).into_iter().next()
    }

    pub fn files_mut(&mut self, name: &str) -> Vec<&mut FormFile> {
        self.parts
            .iter_mut()
            .filter_map(|part| match *part {
                Part::File {
                    name: ref n,
                    ref mut file,
                } if n == name => Some(file),
                _ => None,
            })
            .collect()
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [Part] {
        &mut self.parts
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Closes the source of every file in the form. Sources already closed
    /// are skipped, so parts swapped in through `parts_mut` are covered too.
    pub fn close(&mut self) {
        log::debug!("Closing form with boundary {}", self.boundary);
        self.parts.iter_mut().for_each(Part::close);
        self.closed = true;
    }

    /// True once `close` has run and no open source has been added since.
    pub fn is_closed(&self) -> bool {
        self.closed
            && self.parts.iter().all(|part| match *part {
                Part::File { ref file, .. } => file.is_closed(),
                Part::Field { .. } => true,
            })
    }

    /// Turns the form into a reader producing its encoded bytes. Nothing is
    /// serialized until the reader is read.
    pub fn into_encoder(self) -> Encoder {
        Encoder::new(self.boundary, self.parts)
    }

    /// Encodes the whole form into `w`.
    pub fn write_to<W: Write>(self, w: &mut W) -> io::Result<u64> {
        let mut encoder = self.into_encoder();
        io::copy(&mut encoder, w)
    }
}

impl Default for FormBody {
    fn default() -> Self {
        Self::new()
    }
}

impl From<FormBody> for Encoder {
    fn from(form: FormBody) -> Self {
        form.into_encoder()
    }
}

/// Decoding the body of an inbound message as a form.
pub trait MultipartMessage
where
    Self: Sized,
{
    fn into_form_body_with_capacity(self, buf_cap: usize) -> Result<FormBody, Error>;

    fn into_form_body(self) -> Result<FormBody, Error> {
        self.into_form_body_with_capacity(DEFAULT_BUFFER_CAP)
    }
}

impl<R: Read> MultipartMessage for http::Request<R> {
    fn into_form_body_with_capacity(self, buf_cap: usize) -> Result<FormBody, Error> {
        let (parts, body) = self.into_parts();
        FormBody::from_message_with_capacity(&parts.headers, body, buf_cap)
    }
}

impl<R: Read> MultipartMessage for http::Response<R> {
    fn into_form_body_with_capacity(self, buf_cap: usize) -> Result<FormBody, Error> {
        let (parts, body) = self.into_parts();
        FormBody::from_message_with_capacity(&parts.headers, body, buf_cap)
    }
}

/// Attaching a form as the body of an outbound message. The Content-Type
/// header is set from the form's boundary, the body is the lazy `Encoder`.
pub trait MultipartBuilder {
    type Message;

    fn form_body(self, form: FormBody) -> http::Result<Self::Message>;
}

impl MultipartBuilder for http::request::Builder {
    type Message = http::Request<Encoder>;

    fn form_body(self, form: FormBody) -> http::Result<Self::Message> {
        self.header(http::header::CONTENT_TYPE, form.content_type())
            .body(form.into_encoder())
    }
}

impl MultipartBuilder for http::response::Builder {
    type Message = http::Response<Encoder>;

    fn form_body(self, form: FormBody) -> http::Result<Self::Message> {
        self.header(http::header::CONTENT_TYPE, form.content_type())
            .body(form.into_encoder())
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use bytes::Bytes;

    fn bob() -> FormBody {
        FormBody::with_boundary(Boundary::new("bob").unwrap())
    }

    fn text_file(filename: &str, content: &'static str) -> FormFile {
        FormFile::from_bytes(filename, mime::TEXT_PLAIN, content)
    }

    #[test]
    fn retrieving_files_and_fields() {
        let mut form = bob()
            .with_field("field", "foo")
            .with_field("field", "bar")
            .with_file("file", text_file("foo.txt", "content"))
            .with_file("file", text_file("foo2.txt", "content2"));

        assert_eq!(Some("foo"), form.field("field"));
        assert_eq!(vec!["foo", "bar"], form.fields("field"));

        assert_eq!(Some("foo.txt"), form.file("file").map(FormFile::filename));
        assert_eq!(
            vec!["foo.txt", "foo2.txt"],
            form.files("file")
                .into_iter()
                .map(FormFile::filename)
                .collect::<Vec<_>>()
        );

        let contents = form
            .files_mut("file")
            .into_iter()
            .map(|f| f.content().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            vec![Bytes::from_static(b"content"), Bytes::from_static(b"content2")],
            contents
        );
    }

    #[test]
    fn absent_names() {
        let form = bob().with_field("field", "foo");

        assert_eq!(None, form.field("nope"));
        assert!(form.fields("nope").is_empty());
        assert!(form.file("field").is_none());
        assert!(form.files("field").is_empty());
    }

    #[test]
    fn close_reaches_every_file_and_is_repeatable() {
        let mut form = bob()
            .with_field("field", "foo")
            .with_file("a", text_file("a.txt", "a"))
            .with_file("b", text_file("b.txt", "b"));

        form.file_mut("a").unwrap().close();
        assert!(!form.is_closed());

        form.close();
        form.close();

        assert!(form.is_closed());
        assert!(form.files("a").iter().chain(form.files("b").iter()).all(|f| f.is_closed()));
    }

    #[test]
    fn close_reaches_files_swapped_in_after_closing() {
        let mut form = bob().with_file("a", text_file("a.txt", "a"));
        form.close();

        form.parts_mut()[0] = Part::file("b", text_file("b.txt", "b"));
        assert!(!form.file("b").unwrap().is_closed());
        assert!(!form.is_closed());

        form.close();

        assert!(form.is_closed());
        assert!(form.file("b").unwrap().is_closed());
    }

    #[test]
    fn appending_a_file_reopens() {
        let mut form = bob();
        form.close();

        let form = form.with_file("a", text_file("a.txt", "a"));
        assert!(!form.is_closed());
    }

    #[test]
    fn write_to_encodes() {
        let mut out = Vec::new();
        bob().with_field("field", "bar").write_to(&mut out).unwrap();

        assert_eq!(
            &b"--bob\r\nContent-Disposition: form-data; name=\"field\"\r\n\r\nbar\r\n--bob--\r\n"[..],
            &out[..]
        );
    }

    #[test]
    fn generated_boundaries_differ() {
        assert_ne!(FormBody::new().boundary(), FormBody::new().boundary());
    }

    #[test]
    fn builder_sets_content_type() {
        let req = http::Request::post("/upload").form_body(bob()).unwrap();

        assert_eq!(
            "multipart/form-data; boundary=bob",
            req.headers()[http::header::CONTENT_TYPE]
        );
    }
}
