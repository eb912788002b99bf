//! HTTP methods that can carry a route.
//!
//! Only `GET` and `POST` are routable. Any other method string simply finds
//! no route and is answered with `404 Route not found`, never with an error.

use std::fmt;
use std::str::FromStr;

/// A routable HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get  => "GET",
            Self::Post => "POST",
        }
    }
}

/// Parses an uppercase method string. Case-sensitive per RFC 9110 §9.1, so
/// `"get"` is not a routable method.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET"  => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            _      => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_routable_methods_only() {
        assert_eq!("GET".parse(), Ok(Method::Get));
        assert_eq!("POST".parse(), Ok(Method::Post));
        assert_eq!("get".parse::<Method>(), Err(()));
        assert_eq!("DELETE".parse::<Method>(), Err(()));
    }
}
