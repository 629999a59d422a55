use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConstructionError;

// RFC 3986, appendix B.
static URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([^:/?#]+):)?(?://([^/?#]*))?([^?#]*)(?:\?([^#]*))?(?:#(.*))?$")
        .expect("uri regex")
});

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("scheme regex"));

// Host and path are stored percent-decoded, the query raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    raw: String,
    scheme: String,
    userinfo: Option<String>,
    authority: bool,
    host: String,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Location {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn userinfo(&self) -> Option<&str> {
        self.userinfo.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw_query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let Some(query) = self.query.as_deref() else {
            return Vec::new();
        };
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_query_component(key), decode_query_component(value))
            })
            .collect()
    }

    pub fn query_value(&self, key: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn redacted(&self) -> String {
        let mut out = String::new();
        if !self.scheme.is_empty() {
            out.push_str(&self.scheme);
            out.push(':');
        }
        if self.authority {
            out.push_str("//");
            if self.userinfo.is_some() {
                out.push_str("***@");
            }
            out.push_str(&self.host);
        }
        out.push_str(&self.path);
        if let Some(query) = self.query.as_deref() {
            out.push('?');
            let masked = query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((key, _)) => format!("{key}=***"),
                    None => pair.to_string(),
                })
                .collect::<Vec<_>>()
                .join("&");
            out.push_str(&masked);
        }
        out
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for Location {
    type Err = ConstructionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(ConstructionError::Empty);
        }
        if value.chars().any(|ch| ch.is_ascii_control()) {
            return Err(ConstructionError::ControlCharacter(value.to_string()));
        }
        if value.starts_with(':') {
            return Err(ConstructionError::MissingScheme(value.to_string()));
        }

        let captures = URI
            .captures(value)
            .ok_or_else(|| ConstructionError::MissingScheme(value.to_string()))?;
        let group = |index: usize| captures.get(index).map(|m| m.as_str());

        let (scheme, authority, path) = match group(1) {
            Some(scheme) if SCHEME.is_match(scheme) => (scheme, group(2), group(3)),
            // Not a scheme: the colon belongs to the first path segment.
            Some(_) => return Err(ConstructionError::ColonInFirstSegment(value.to_string())),
            None => ("", group(2), group(3)),
        };

        let (userinfo, host) = match authority {
            Some(authority) => match authority.rsplit_once('@') {
                Some((userinfo, host)) => (Some(userinfo.to_string()), host),
                None => (None, authority),
            },
            None => (None, ""),
        };

        Ok(Self {
            raw: value.to_string(),
            scheme: scheme.to_ascii_lowercase(),
            userinfo,
            authority: authority.is_some(),
            host: percent_decode(value, host)?,
            path: percent_decode(value, path.unwrap_or_default())?,
            query: group(4).map(str::to_string),
            fragment: group(5).map(str::to_string),
        })
    }
}

fn percent_decode(identifier: &str, component: &str) -> Result<String, ConstructionError> {
    let bytes = component.as_bytes();
    for (index, byte) in bytes.iter().enumerate() {
        if *byte != b'%' {
            continue;
        }
        let escape = bytes.get(index + 1..index + 3);
        let valid = escape
            .map(|hex| hex.iter().all(u8::is_ascii_hexdigit))
            .unwrap_or(false);
        if !valid {
            let end = (index + 3).min(component.len());
            return Err(ConstructionError::InvalidEscape {
                identifier: identifier.to_string(),
                escape: String::from_utf8_lossy(&bytes[index..end]).into_owned(),
            });
        }
    }
    urlencoding::decode(component)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ConstructionError::InvalidEncoding(identifier.to_string()))
}

fn decode_query_component(component: &str) -> String {
    let spaced = component.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}
