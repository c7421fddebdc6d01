//! Location helpers
//!
//! Page rules are evaluated against two forms of the current location:
//! the request path (path plus query, the way a server sees `REQUEST_URI`)
//! and the fully-qualified URL. These helpers derive one from the other
//! without pulling in a full URL parser.

// =============================================================================
// Scheme / Authority
// =============================================================================

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    let colon_pos = bytes.iter().position(|&b| b == b':')?;

    // A '/' before the colon means this is a path, not a scheme
    if bytes[..colon_pos].contains(&b'/') {
        return None;
    }

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

/// Get the start and end positions of the authority (host and port) in a URL.
#[inline]
pub fn get_authority_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    let mut end = bytes.len();
    for (i, &b) in bytes[scheme_end..].iter().enumerate() {
        if b == b'/' || b == b'?' || b == b'#' {
            end = scheme_end + i;
            break;
        }
    }

    Some((scheme_end, end))
}

// =============================================================================
// Request URI
// =============================================================================

/// Extract the request URI (path plus query, no fragment) of a URL.
///
/// A string without a scheme is treated as already being a path.
pub fn extract_request_uri(url: &str) -> &str {
    let without_fragment = match url.find('#') {
        Some(pos) => &url[..pos],
        None => url,
    };

    let (_, authority_end) = match get_authority_position(without_fragment) {
        Some(pos) => pos,
        None => return without_fragment,
    };

    let rest = &without_fragment[authority_end..];
    if rest.is_empty() || rest.starts_with('?') {
        // "https://example.com" and "https://example.com?x" both request "/"
        return "/";
    }
    rest
}

// =============================================================================
// Location
// =============================================================================

/// The current page, in both forms the page-rule matcher checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Path plus query, e.g. `/nl/product/furever/?ref=home`
    pub path: String,
    /// Fully-qualified URL, e.g. `https://example.com/nl/product/furever/?ref=home`
    pub full_url: String,
}

impl Location {
    pub fn new(path: impl Into<String>, full_url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            full_url: full_url.into(),
        }
    }

    /// Build both forms from a browser `href`. The fragment is dropped since
    /// it never reaches the server.
    pub fn from_url(href: &str) -> Self {
        let full_url = match href.find('#') {
            Some(pos) => &href[..pos],
            None => href,
        };
        Self {
            path: extract_request_uri(full_url).to_string(),
            full_url: full_url.to_string(),
        }
    }
}
