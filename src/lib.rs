//! Blocking multipart/form-data bodies for `http` messages.
//!
//! A [`FormBody`] is built from fields and files, or parsed from an inbound
//! message, and encoded lazily when attached to an outbound one.
//!
//! ```
//! use form_multipart::{FormBody, FormFile, MultipartBuilder, MultipartMessage};
//!
//! let form = FormBody::new()
//!     .with_field("field", "foo")
//!     .with_file("file", FormFile::from_bytes("foo.txt", mime::TEXT_PLAIN, "content"));
//!
//! let req = http::Request::post("/upload").form_body(form).unwrap();
//! let parsed = req.into_form_body().unwrap();
//!
//! assert_eq!(Some("foo"), parsed.field("field"));
//! assert_eq!(Some("foo.txt"), parsed.file("file").map(|f| f.filename()));
//! ```

mod error;
pub use error::Error;

mod boundary;
pub use boundary::Boundary;

mod source;
pub use source::FileSource;

mod part;
pub use part::{FormFile, Part};

mod encoder;
pub use encoder::Encoder;

pub mod parser;
pub use parser::Parser;

mod header_map;
pub use header_map::{boundary_from_headers, HeaderMap};

mod multipart;
pub use multipart::{FormBody, MultipartBuilder, MultipartMessage};
