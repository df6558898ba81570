use crate::{Boundary, Error};

/// A header source, implemented for http::HeaderMap.
/// Other message types only need to hand out header values as `&str`
/// to be decoded as forms.
pub trait HeaderMap {
    fn get_value<K>(&self, header_key: K) -> Option<&str>
    where
        K: AsRef<str>;
}

impl HeaderMap for http::header::HeaderMap {
    fn get_value<K>(&self, header_key: K) -> Option<&str>
    where
        K: AsRef<str>,
    {
        self.get(header_key.as_ref())
            .and_then(|hv| hv.to_str().ok())
    }
}

/// Reads the boundary parameter of a `multipart/form-data` Content-Type.
pub fn boundary_from_headers(headers: &impl HeaderMap) -> Result<Boundary, Error> {
    let content_type = headers
        .get_value(http::header::CONTENT_TYPE)
        .ok_or(Error::ContentTypeMissing)?;

    let mime_type = content_type.parse::<mime::Mime>()?;

    if mime_type.type_() != mime::MULTIPART || mime_type.subtype() != mime::FORM_DATA {
        return Err(Error::NotMultipart);
    }

    match mime_type.get_param(mime::BOUNDARY) {
        Some(boundary) => Boundary::new(boundary.as_str().trim_matches('"')),
        None => Err(Error::BoundaryMissing),
    }
}
