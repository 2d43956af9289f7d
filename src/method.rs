//! HTTP verbs a service file can be named after.
//!
//! The vocabulary is fixed: `get`, `post`, `put`, `patch`, `delete`. A file
//! stem is matched exactly and case-sensitively, so `GET.js` and `gets.js`
//! are plain files, not verb files.

use std::fmt;
use std::str::FromStr;

use http::Method;

/// A verb recognised from a file stem.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Verb {
    Delete,
    Get,
    Patch,
    Post,
    Put,
}

impl Verb {
    pub const ALL: [Verb; 5] = [Self::Delete, Self::Get, Self::Patch, Self::Post, Self::Put];

    /// Returns the file-stem spelling (e.g. `"get"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Get    => "get",
            Self::Patch  => "patch",
            Self::Post   => "post",
            Self::Put    => "put",
        }
    }

    /// The wire method this verb is served under.
    pub fn method(self) -> Method {
        match self {
            Self::Delete => Method::DELETE,
            Self::Get    => Method::GET,
            Self::Patch  => Method::PATCH,
            Self::Post   => Method::POST,
            Self::Put    => Method::PUT,
        }
    }
}

/// Parses a lowercase file stem (e.g. `"get"`).
impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delete" => Ok(Self::Delete),
            "get"    => Ok(Self::Get),
            "patch"  => Ok(Self::Patch),
            "post"   => Ok(Self::Post),
            "put"    => Ok(Self::Put),
            _        => Err(()),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_lowercase_stems_only() {
        assert_eq!("get".parse::<Verb>(), Ok(Verb::Get));
        assert_eq!("delete".parse::<Verb>(), Ok(Verb::Delete));
        assert!("GET".parse::<Verb>().is_err());
        assert!("head".parse::<Verb>().is_err());
    }

    #[test]
    fn maps_onto_wire_methods() {
        for verb in Verb::ALL {
            assert_eq!(verb.method().as_str().to_ascii_lowercase(), verb.as_str());
        }
    }
}
