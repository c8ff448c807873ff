//! Header helpers: raw curl header lines into pairs, and case folding.

use std::collections::HashMap;

/// Parse collected header lines into `(name, value)` pairs.
///
/// A status line (`HTTP/...`) starts a new response, so only the headers of
/// the last response in a redirect chain are kept. Lines without a colon are
/// ignored.
pub fn parse_header_lines(lines: &[String]) -> Vec<(String, String)> {
    let mut headers = Vec::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            headers.clear();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            headers.push((name.to_string(), value.trim().to_string()));
        }
    }

    headers
}

/// Lower-case every header name. On duplicate names the last value wins.
pub fn lowercase_headers<'a, I>(headers: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    headers
        .into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header_lines_keeps_name_and_value() {
        let lines = [
            "HTTP/1.1 429 Too Many Requests".to_string(),
            "Retry-After: 5".to_string(),
            "X-RateLimit-Limit: 3".to_string(),
        ];
        let h = parse_header_lines(&lines);
        assert_eq!(
            h,
            vec![
                ("Retry-After".to_string(), "5".to_string()),
                ("X-RateLimit-Limit".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn parse_header_lines_resets_on_redirect() {
        let lines = [
            "HTTP/1.1 301 Moved Permanently".to_string(),
            "Location: /next".to_string(),
            "".to_string(),
            "HTTP/1.1 200 OK".to_string(),
            "Content-Type: application/json".to_string(),
        ];
        let h = parse_header_lines(&lines);
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].0, "Content-Type");
    }

    #[test]
    fn parse_header_lines_value_may_contain_colon() {
        let lines = ["Date: Wed, 21 Oct 2015 07:28:00 GMT".to_string()];
        let h = parse_header_lines(&lines);
        assert_eq!(h[0].1, "Wed, 21 Oct 2015 07:28:00 GMT");
    }

    #[test]
    fn lowercase_headers_folds_names_only() {
        let raw = vec![("Retry-After".to_string(), "Soon".to_string())];
        let h = lowercase_headers(raw.iter().map(|(k, v)| (k, v)));
        assert_eq!(h.get("retry-after").map(String::as_str), Some("Soon"));
        assert!(h.get("Retry-After").is_none());
    }
}
