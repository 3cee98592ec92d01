//! RFC addresses.
//!
//! An address names an RFC by number plus an optional fragment:
//!
//! ```text
//! rfc:2223
//! rfc:2223#section-3.2
//! rfc://2223/page-4
//! rfc://2223#L10-L12
//! ```
//!
//! Parsing never fails loudly. An address that does not name a positive RFC
//! number yields `None`, so callers can let another handler claim the input.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// The URI scheme claimed by this crate.
pub const SCHEME: &str = "rfc";

static FREE_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:rfc\s*:?\s*)?([0-9]+)\s*(?:#(.*))?$").expect("valid address pattern")
});

/// An RFC number with an optional fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RfcAddress {
    pub number: u32,
    pub fragment: Option<String>,
}

impl RfcAddress {
    /// Create an address. Empty fragments are dropped.
    pub fn new(number: u32, fragment: Option<&str>) -> Self {
        Self {
            number,
            fragment: fragment
                .map(|f| f.strip_prefix('#').unwrap_or(f))
                .filter(|f| !f.is_empty())
                .map(ToOwned::to_owned),
        }
    }

    /// Parse an `rfc:` URI.
    ///
    /// Accepts `rfc:<N>` with the fragment as a URL fragment or a trailing
    /// path segment, and `rfc://<N>/<fragment>` with the number as the host.
    pub fn parse_uri(uri: &str) -> Option<Self> {
        let url = Url::parse(uri.trim()).ok()?;
        if url.scheme() != SCHEME {
            return None;
        }

        let path = url.path().trim_matches('/');
        let (number, rest) = match url.host_str().filter(|h| !h.is_empty()) {
            Some(host) => (host, path),
            None => path.split_once('/').unwrap_or((path, "")),
        };
        let number = parse_number(number)?;
        let fragment = url.fragment().filter(|f| !f.is_empty()).unwrap_or(rest);
        Some(Self::new(number, Some(fragment)))
    }

    /// Parse user input: an `rfc:` URI, or a number optionally prefixed with
    /// `rfc` / `RFC ` and followed by `#fragment`.
    pub fn parse_input(input: &str) -> Option<Self> {
        if input.contains("://") {
            return Self::parse_uri(input);
        }
        let caps = FREE_FORM.captures(input)?;
        let number = parse_number(&caps[1])?;
        Some(Self::new(number, caps.get(2).map(|m| m.as_str().trim())))
    }

    /// Name of the cached file for this RFC.
    pub fn file_name(&self) -> String {
        file_name(self.number)
    }
}

impl fmt::Display for RfcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}:{}", self.number)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// `rfc<N>.txt`.
pub fn file_name(number: u32) -> String {
    format!("rfc{number}.txt")
}

/// A positive decimal RFC number.
pub fn parse_number(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|&n| n > 0)
}
