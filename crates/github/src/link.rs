//! `Link` response header parsing.

/// Extracts the `rel="next"` URL from a GitHub `Link` header.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/organizations/123/repos?per_page=100&page=2>; rel="next", <...&page=3>; rel="last"`
pub fn parse_next_link(link_header: &str) -> Option<String> {
    for part in link_header.split(',') {
        let mut url = None;
        let mut is_next = false;

        for segment in part.split(';') {
            let segment = segment.trim();
            if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                url = Some(inner);
            } else if let Some(rel) = segment.strip_prefix("rel=") {
                is_next = rel.trim_matches('"') == "next";
            }
        }

        if let (Some(url), true) = (url, is_next) {
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
    }
    None
}
