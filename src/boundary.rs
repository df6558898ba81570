use std::fmt;

use crate::Error;

/// RFC 2046 caps a boundary at 70 characters.
const MAX_BOUNDARY_LEN: usize = 70;

/// The delimiter token separating the parts of a form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Boundary(String);

impl Boundary {
    /// Validates a caller chosen boundary.
    pub fn new<S: Into<String>>(token: S) -> Result<Self, Error> {
        let token = token.into();

        if token.is_empty() || token.len() > MAX_BOUNDARY_LEN {
            return Err(Error::invalid_boundary(format!(
                "length must be between 1 and {}, got {}",
                MAX_BOUNDARY_LEN,
                token.len()
            )));
        }

        if let Some(c) = token.chars().find(|c| !is_bchar(*c)) {
            return Err(Error::invalid_boundary(format!(
                "character {:?} is not allowed",
                c
            )));
        }

        if token.ends_with(' ') {
            return Err(Error::invalid_boundary("must not end with a space"));
        }

        Ok(Boundary(token))
    }

    /// A fresh random boundary, built from a v4 UUID.
    pub fn generate() -> Self {
        Boundary(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The opening delimiter, `--<boundary>`.
    pub(crate) fn delimiter(&self) -> Vec<u8> {
        let mut d = Vec::with_capacity(self.0.len() + 2);
        d.extend_from_slice(b"--");
        d.extend_from_slice(self.0.as_bytes());
        d
    }

    /// The boundary as a Content-Type parameter value, quoted when it holds
    /// characters a bare token cannot carry.
    pub(crate) fn param_value(&self) -> String {
        if self.0.chars().all(is_token_char) {
            self.0.clone()
        } else {
            format!("\"{}\"", self.0)
        }
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Boundary {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_bchar(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '\'' | '(' | ')' | '+' | '_' | ',' | '-' | '.' | '/' | ':' | '=' | '?' | ' '
        )
}

fn is_token_char(c: char) -> bool {
    is_bchar(c) && !matches!(c, '(' | ')' | ',' | '/' | ':' | '=' | '?' | ' ')
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn generated_boundaries_are_valid_and_unique() {
        let a = Boundary::generate();
        let b = Boundary::generate();

        assert_ne!(a, b);
        assert!(Boundary::new(a.as_str()).is_ok());
    }

    #[test]
    fn rejects_bad_tokens() {
        let too_long = "x".repeat(71);
        let tests = ["", "ends with space ", "quote\"d", "semi;colon", too_long.as_str()];

        for token in &tests {
            assert!(Boundary::new(*token).is_err(), "accepted {:?}", token);
        }
    }

    #[test]
    fn quotes_param_only_when_needed() {
        assert_eq!("bob", Boundary::new("bob").unwrap().param_value());
        assert_eq!(
            "\"simple boundary\"",
            Boundary::new("simple boundary").unwrap().param_value()
        );
    }

    #[test]
    fn delimiter_is_prefixed() {
        assert_eq!(b"--bob".to_vec(), Boundary::new("bob").unwrap().delimiter());
    }
}
