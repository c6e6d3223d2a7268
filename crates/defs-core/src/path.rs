//! Helpers for manager-relative paths ("DePaths").
//!
//! A DePath is relative to the target address, uses `/` separators, and is
//! empty for the root. The backend sees absolute paths: `<address>/<depath>`.

/// Normalize a DePath: drop leading/trailing slashes and empty components.
pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a parent DePath and a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Parent DePath (the root's parent is the root).
pub fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent,
        None => "",
    }
}

/// Last component of a DePath.
pub fn file_name(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((_, name)) => name,
        None => path,
    }
}

/// Number of components in a DePath (0 for the root).
pub fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.split('/').count()
    }
}

/// Absolute backend path for a DePath.
pub fn to_absolute(address: &str, path: &str) -> String {
    if path.is_empty() {
        address.to_string()
    } else {
        format!("{}/{}", address, path)
    }
}

/// DePath for an absolute backend path, if it lies under `address`.
pub fn to_relative(address: &str, absolute: &str) -> Option<String> {
    let absolute = absolute.trim_matches('/');
    if absolute == address {
        return Some(String::new());
    }
    absolute
        .strip_prefix(address)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(normalize)
}

/// True if `path` is `ancestor` or lies below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// A name usable as a single path component.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

/// Media type derived from a file name's extension.
pub fn media_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
