//! Join a client's base URL and request path.

/// Compose the effective URL from a base URL and a (possibly relative) path.
///
/// - A path that already parses as an absolute URL is returned untouched.
/// - A trailing slash on the base and a leading slash on the path collapse to one.
/// - An empty base yields the path; an empty path yields the base.
pub fn join_url(base: Option<&str>, path: Option<&str>) -> String {
    let base = base.map(str::trim).unwrap_or("");
    let path = path.map(str::trim).unwrap_or("");

    if is_absolute(path) {
        return path.to_string();
    }
    if base.is_empty() {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}

// `host:port/x` parses as a URL with scheme `host`; require a real host.
fn is_absolute(path: &str) -> bool {
    ::url::Url::parse(path)
        .map(|u| u.has_host())
        .unwrap_or(false)
}
