//! Request destination classification.
//!
//! The offline fallback depends on what the page expects back. The `Accept`
//! header wins when it names something concrete; otherwise the URL path
//! extension is consulted.

use http::header;

use crate::{Request, RequestMode};

/// Kind of resource a request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDestination {
    /// An HTML document.
    Document,
    /// An image.
    Image,
    /// Anything else (scripts, JSON, downloads).
    Other,
}

impl RequestDestination {
    /// Classify a request.
    pub fn classify(request: &Request) -> Self {
        if request.mode == RequestMode::Navigate {
            return Self::Document;
        }

        let accept = request
            .headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok());

        if let Some(destination) = accept.and_then(Self::from_accept) {
            return destination;
        }

        Self::from_path(request.url.path())
    }

    /// Classify from an `Accept` header. Returns `None` for wildcard-only
    /// headers.
    pub fn from_accept(accept: &str) -> Option<Self> {
        let media_types: Vec<&str> = accept
            .split(',')
            .map(|part| part.split(';').next().unwrap_or("").trim())
            .filter(|part| !part.is_empty() && *part != "*/*")
            .collect();

        let first = media_types.first()?;

        if media_types.iter().any(|m| m.eq_ignore_ascii_case("text/html")) {
            Some(Self::Document)
        } else if first.to_ascii_lowercase().starts_with("image/") {
            Some(Self::Image)
        } else {
            Some(Self::Other)
        }
    }

    /// Classify from the URL path.
    pub fn from_path(path: &str) -> Self {
        if path.is_empty() || path.ends_with('/') {
            return Self::Document;
        }

        match mime_guess::from_path(path).first() {
            Some(m) if m.type_() == mime::IMAGE => Self::Image,
            Some(m) if m.type_() == mime::TEXT && m.subtype() == mime::HTML => Self::Document,
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_accept_html_is_document() {
        let req = request("https://example.com/page")
            .accept("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8");
        assert_eq!(req.destination(), RequestDestination::Document);
    }

    #[test]
    fn test_accept_image() {
        let req = request("https://example.com/avatar").accept("image/avif,image/webp,*/*");
        assert_eq!(req.destination(), RequestDestination::Image);
    }

    #[test]
    fn test_accept_json_beats_extension() {
        let req = request("https://example.com/report.pdf").accept("application/json");
        assert_eq!(req.destination(), RequestDestination::Other);
    }

    #[test]
    fn test_wildcard_falls_back_to_path() {
        let req = request("https://example.com/icons/icon-192.png").accept("*/*");
        assert_eq!(req.destination(), RequestDestination::Image);

        let req = request("https://example.com/index.html");
        assert_eq!(req.destination(), RequestDestination::Document);

        let req = request("https://example.com/");
        assert_eq!(req.destination(), RequestDestination::Document);

        let req = request("https://example.com/app.js");
        assert_eq!(req.destination(), RequestDestination::Other);
    }
}
