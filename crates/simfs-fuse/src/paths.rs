//! Absolute-path helpers.
//!
//! Every path handed to the front-end is absolute and slash-separated.
//! These helpers keep the normalization rules in one place: leading slash,
//! no trailing slash (except the root itself).

/// Normalize to a leading slash and no trailing slash.
pub fn normalize(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }

    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    normalized
}

/// Parent directory of a path, `/` for top-level entries and the root.
pub fn parent(path: &str) -> String {
    let normalized = normalize(path);
    if normalized == "/" {
        return "/".to_string();
    }

    match normalized.rfind('/') {
        Some(0) => "/".to_string(),
        Some(pos) => normalized[..pos].to_string(),
        None => "/".to_string(),
    }
}

/// Final component of a path, empty for the root.
pub fn basename(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Whether the final component carries a dot, the lazy-file eligibility rule.
pub fn dotted_basename(path: &str) -> bool {
    basename(path).contains('.')
}

/// Join a directory and a child name.
pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}
