// src/utils/url.rs

//! URL helpers for target keys and PDF detection.

use url::Url;

/// Domain key for a URL: the lowercased host, with the port when present.
///
/// # Examples
/// ```
/// use tos_radar::utils::url::domain_key;
///
/// assert_eq!(
///     domain_key("https://Example.COM/terms"),
///     Some("example.com".to_string())
/// );
/// ```
pub fn domain_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// Whether the URL path ends in `.pdf`.
pub fn looks_like_pdf(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase().ends_with(".pdf"),
        Err(_) => url.to_lowercase().ends_with(".pdf"),
    }
}

/// Whether a `Content-Type` value denotes a PDF document.
pub fn is_pdf_content_type(content_type: &str) -> bool {
    content_type.to_lowercase().contains("application/pdf")
}
