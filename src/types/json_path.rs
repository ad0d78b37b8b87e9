use crate::{ENCODED_SLASH, ENCODED_TILDE, PATH_SEPARATOR, TILDE};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// A JSON-pointer path into the specification document, built segment by
/// segment. Segments containing `~` or `/` are escaped per RFC 6901 when
/// pushed, so `pointer()` is always a valid pointer body.
#[derive(Debug, Clone, Serialize, Default)]
pub struct JsonPath(Vec<String>);

impl JsonPath {
    pub fn new() -> Self {
        JsonPath(Vec::new())
    }

    pub fn push(&mut self, segment: impl AsRef<str>) -> &mut Self {
        let segment = segment.as_ref();
        if segment.contains(TILDE) || segment.contains(PATH_SEPARATOR) {
            self.0.push(
                segment
                    .replace(TILDE, ENCODED_TILDE)
                    .replace(PATH_SEPARATOR, ENCODED_SLASH),
            );
        } else {
            self.0.push(segment.to_owned());
        }
        self
    }

    /// The escaped pointer body, without a leading `/`.
    pub fn pointer(&self) -> String {
        self.0.join(PATH_SEPARATOR)
    }
}

impl Display for JsonPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pointer())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_plain_segments() {
        let mut path = JsonPath::new();
        path.push("components").push("schemas").push("Pet");
        assert_eq!(path.pointer(), "components/schemas/Pet");
    }

    #[test]
    fn test_escapes_slash_and_tilde() {
        let mut path = JsonPath::new();
        path.push("paths").push("/pets/{petId}").push("get");
        assert_eq!(path.pointer(), "paths/~1pets~1{petId}/get");

        let mut path = JsonPath::new();
        path.push("a~b/c");
        assert_eq!(path.pointer(), "a~0b~1c");
    }

    #[test]
    fn test_empty_path() {
        assert_eq!(JsonPath::new().pointer(), "");
    }
}
