//! Slash-separated path helpers for archive and view paths.
//!
//! Paths handed to a view are relative, use `/` as separator and are
//! already clean; [`ROOT`] names the top of the tree.

/// The canonical name of a view's root directory
pub const ROOT: &str = ".";

/// Reports whether `name` is acceptable as a path argument.
///
/// Valid paths are unrooted slash-separated sequences of non-empty
/// elements, none of which is `.` or `..`. The single exception is
/// [`ROOT`] itself. The empty string is not valid.
pub fn valid_path(name: &str) -> bool {
    if name == ROOT {
        return true;
    }
    !name.is_empty()
        && name
            .split('/')
            .all(|elem| !elem.is_empty() && elem != "." && elem != "..")
}

/// Lexically normalize a slash-separated path.
///
/// Empty and `.` elements are dropped, `..` removes the preceding element.
/// A rooted input stays rooted and `..` cannot climb above `/`; an
/// unrooted input keeps leading `..` elements. The empty result is `.`.
pub fn clean(name: &str) -> String {
    let rooted = name.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for elem in name.split('/') {
        match elem {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            _ => parts.push(elem),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ROOT.to_string(),
        (false, false) => joined,
    }
}

/// Join a clean directory path and a clean relative path.
pub fn join(dir: &str, name: &str) -> String {
    match (dir, name) {
        (ROOT, _) => name.to_string(),
        (_, ROOT) => dir.to_string(),
        _ => format!("{dir}/{name}"),
    }
}

/// Everything but the last element; [`ROOT`] for top-level names.
pub fn parent(name: &str) -> &str {
    match name.rfind('/') {
        Some(idx) => &name[..idx],
        None => ROOT,
    }
}

/// The last element of a clean path.
pub fn base(name: &str) -> &str {
    match name.rfind('/') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Express `name` relative to `prefix`.
///
/// `prefix` itself maps to [`ROOT`]; paths outside `prefix` are returned
/// unchanged.
pub fn strip_prefix(name: &str, prefix: &str) -> String {
    if name == prefix {
        return ROOT.to_string();
    }
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(name)
        .to_string()
}
