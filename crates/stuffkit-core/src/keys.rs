//! Composite key helpers used for cache and counter keys.

/// Join `parts` with `|`.
pub fn join_key_parts<S: AsRef<str>>(parts: &[S]) -> String {
    string_join(parts, "|")
}

pub fn string_join<S: AsRef<str>>(parts: &[S], sep: &str) -> String {
    let mut iter = parts.iter();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let mut out = first.as_ref().to_string();
    for part in iter {
        out.push_str(sep);
        out.push_str(part.as_ref());
    }
    out
}
