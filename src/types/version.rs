use crate::error::ValidationError;
use jsonschema::Draft;
use std::str::FromStr;

/// The OpenAPI minor line the document declares. It decides which JSON Schema
/// draft the engine compiles against and how nullability is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenApiVersion {
    V30x,
    V31x,
}

impl FromStr for OpenApiVersion {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("3.1") {
            Ok(OpenApiVersion::V31x)
        } else if s.starts_with("3.0") {
            Ok(OpenApiVersion::V30x)
        } else {
            Err(ValidationError::document_unsupported_version(s))
        }
    }
}

impl OpenApiVersion {
    pub(crate) fn draft(&self) -> Draft {
        match self {
            OpenApiVersion::V30x => Draft::Draft4,
            OpenApiVersion::V31x => Draft::Draft202012,
        }
    }

    /// 3.0.x expresses nullability with the `nullable` keyword; 3.1.x folds it
    /// into the `type` list. Rendering normalizes 3.0 schemas to the 3.1 form.
    pub(crate) fn uses_nullable_keyword(&self) -> bool {
        matches!(self, OpenApiVersion::V30x)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!("3.0.2".parse::<OpenApiVersion>().unwrap(), OpenApiVersion::V30x);
        assert_eq!("3.1.0".parse::<OpenApiVersion>().unwrap(), OpenApiVersion::V31x);
        assert!("2.0".parse::<OpenApiVersion>().is_err());
        assert!("3.2.0".parse::<OpenApiVersion>().is_err());
    }

    #[test]
    fn test_draft_selection() {
        assert_eq!(OpenApiVersion::V30x.draft(), Draft::Draft4);
        assert_eq!(OpenApiVersion::V31x.draft(), Draft::Draft202012);
    }
}
