use bytes::Bytes;
use mime::Mime;
use std::{io, io::Read};

use crate::{Error, FileSource};

/// One unit of a form: a text field or a file attachment.
#[derive(Debug)]
pub enum Part {
    Field { name: String, value: String },
    File { name: String, file: FormFile },
}

impl Part {
    pub fn field<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Part::Field {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file<N: Into<String>>(name: N, file: FormFile) -> Self {
        Part::File {
            name: name.into(),
            file,
        }
    }

    pub fn name(&self) -> &str {
        match *self {
            Part::Field { ref name, .. } => name,
            Part::File { ref name, .. } => name,
        }
    }

    pub(crate) fn close(&mut self) {
        if let Part::File { ref mut file, .. } = *self {
            file.close();
        }
    }
}

/// A file attachment: its original filename, its content type and the
/// source its payload is read from.
#[derive(Debug)]
pub struct FormFile {
    filename: String,
    content_type: Mime,
    source: FileSource,
}

impl FormFile {
    pub fn new<F, R>(filename: F, content_type: Mime, reader: R) -> Self
    where
        F: Into<String>,
        R: Read + Send + 'static,
    {
        Self::with_source(filename, content_type, FileSource::new(reader))
    }

    pub fn from_bytes<F, B>(filename: F, content_type: Mime, bs: B) -> Self
    where
        F: Into<String>,
        B: Into<Bytes>,
    {
        Self::with_source(filename, content_type, FileSource::from_bytes(bs))
    }

    pub fn with_source<F: Into<String>>(
        filename: F,
        content_type: Mime,
        source: FileSource,
    ) -> Self {
        FormFile {
            filename: filename.into(),
            content_type,
            source,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut FileSource {
        &mut self.source
    }

    /// The unread payload, pulled into memory if the source is still live.
    pub fn content(&mut self) -> io::Result<Bytes> {
        self.source.buffer()
    }

    pub fn close(&mut self) {
        self.source.close()
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_closed()
    }
}

impl Read for FormFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.source.read(buf)
    }
}

/// The parameters of a `Content-Disposition: form-data` header that a form
/// cares about.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Disposition {
    pub(crate) name: Option<String>,
    pub(crate) filename: Option<String>,
}

impl Disposition {
    pub(crate) fn parse(value: &str) -> Result<Self, Error> {
        let mut res = Disposition::default();
        let mut params = split_params(value).into_iter();

        // The disposition type itself, `form-data`.
        if params.next().map_or(true, |t| t.trim().is_empty()) {
            return Err(Error::malformed("Content-Disposition without a type"));
        }

        for param in params {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }

            let (key, value) = param.split_once('=').ok_or_else(|| {
                Error::malformed(format!("Content-Disposition parameter {:?}", param))
            })?;

            let value = unquote(value.trim());

            if key.trim().eq_ignore_ascii_case("name") {
                res.name = Some(value);
            } else if key.trim().eq_ignore_ascii_case("filename") {
                res.filename = Some(value);
            }
        }

        Ok(res)
    }
}

/// Splits a header line into its trimmed name and value.
pub(crate) fn parse_header_line(s: &str) -> Result<(&str, &str), Error> {
    match s.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => Err(Error::malformed(format!("header line {:?}", s))),
    }
}

/// Renders a header parameter value as a quoted string. Quotes and line
/// breaks are percent-encoded the way browsers send them, backslashes are
/// left alone.
pub(crate) fn quote(s: &str) -> String {
    let mut res = String::with_capacity(s.len() + 2);
    res.push('"');

    for c in s.chars() {
        match c {
            '"' => res.push_str("%22"),
            '\r' => res.push_str("%0D"),
            '\n' => res.push_str("%0A"),
            c => res.push(c),
        }
    }

    res.push('"');
    res
}

fn unquote(s: &str) -> String {
    let s = if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    };

    s.replace("%22", "\"").replace("%0D", "\r").replace("%0A", "\n")
}

/// Splits on `;`, ignoring the ones inside quoted strings.
fn split_params(s: &str) -> Vec<&str> {
    let mut res = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                res.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    res.push(&s[start..]);
    res
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_parse_header_lines() {
        let tests = [
            (
                "Content-Disposition: form-data; name=\"field\"",
                "Content-Disposition",
                "form-data; name=\"field\"",
            ),
            ("Content-Type: text/plain", "Content-Type", "text/plain"),
            ("content-type:image/jpeg", "content-type", "image/jpeg"),
            ("X-Empty:", "X-Empty", ""),
        ];

        for (header, exp_name, exp_val) in &tests {
            let (name, val) = parse_header_line(header).expect("Parse header line");

            assert_eq!(exp_name, &name);
            assert_eq!(exp_val, &val);
        }
    }

    #[test]
    fn header_lines_need_a_name_and_a_colon() {
        assert!(parse_header_line("no colon here").is_err());
        assert!(parse_header_line(": no name").is_err());
    }

    #[test]
    fn parses_disposition() {
        let d = Disposition::parse("form-data; name=\"file\"; filename=\"foo.txt\"").unwrap();

        assert_eq!(Some("file".to_string()), d.name);
        assert_eq!(Some("foo.txt".to_string()), d.filename);
    }

    #[test]
    fn disposition_quoted_values_keep_separators() {
        let d = Disposition::parse(r#"form-data; NAME="a;b"; filename="say %22hi%22.txt""#).unwrap();

        assert_eq!(Some("a;b".to_string()), d.name);
        assert_eq!(Some("say \"hi\".txt".to_string()), d.filename);
    }

    #[test]
    fn disposition_without_name() {
        let d = Disposition::parse("form-data; filename=x").unwrap();

        assert_eq!(None, d.name);
        assert_eq!(Some("x".to_string()), d.filename);
    }

    #[test]
    fn disposition_keeps_backslashes() {
        let d = Disposition::parse(r#"form-data; name="f"; filename="C:\dir\a.txt""#).unwrap();

        assert_eq!(Some("C:\\dir\\a.txt".to_string()), d.filename);
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(r#""plain""#, quote("plain"));
        assert_eq!(r#""a%22b\c""#, quote("a\"b\\c"));
        assert_eq!("\"a%0D%0Ab\"", quote("a\r\nb"));
        assert_eq!("a\"b\\c\r\n", unquote(&quote("a\"b\\c\r\n")));
    }

    #[test]
    fn part_names() {
        let file = FormFile::from_bytes("foo.txt", mime::TEXT_PLAIN, "content");

        assert_eq!("field", Part::field("field", "foo").name());
        assert_eq!("file", Part::file("file", file).name());
    }
}
