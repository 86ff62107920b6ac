//! Parsing of user-supplied `Name: value` header lines.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeaderParseError {
    #[error("malformed header line {0:?}: expected \"Name: value\"")]
    MissingColon(String),
    #[error("invalid header name in {line:?}: {source}")]
    Name {
        line: String,
        source: InvalidHeaderName,
    },
    #[error("invalid header value for {name}: {source}")]
    Value {
        name: String,
        source: InvalidHeaderValue,
    },
}

/// Parse header lines such as `X-Tenant: acme` into a header map.
///
/// Names are case-insensitive; repeating a name adds another value rather than
/// replacing the first. Surrounding whitespace of the value is trimmed.
pub fn parse_headers<I, S>(lines: I) -> Result<HeaderMap, HeaderParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut headers = HeaderMap::new();
    for line in lines {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HeaderParseError::MissingColon(line.to_string()))?;

        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|source| {
            HeaderParseError::Name {
                line: line.to_string(),
                source,
            }
        })?;
        let value =
            HeaderValue::from_str(value.trim()).map_err(|source| HeaderParseError::Value {
                name: name.to_string(),
                source,
            })?;
        headers.append(name, value);
    }
    Ok(headers)
}
