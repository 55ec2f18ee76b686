//! SQL literal helpers for the legacy query builders that still interpolate
//! values into statement text. Prefer bound parameters for new code.

/// Backslash-escape `'`, `"`, `\` and NUL, the same set MySQL's string
/// literal parser treats as special.
pub fn add_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\'' | '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out
}

/// Quote `s` as a single SQL string literal.
pub fn wrap_str_value(s: &str) -> String {
    wrap_value(&add_slashes(s))
}

/// `('a','b')` for use in an `IN` clause.
pub fn wrap_str_arr_value<S: AsRef<str>>(items: &[S]) -> String {
    let values: Vec<String> = items.iter().map(|s| wrap_str_value(s.as_ref())).collect();
    format!("({})", values.join(","))
}

/// `(1,2,3)` for use in an `IN` clause.
pub fn wrap_int_arr_value(items: &[i64]) -> String {
    let values: Vec<String> = items.iter().map(|v| v.to_string()).collect();
    format!("({})", values.join(","))
}

fn wrap_value(s: &str) -> String {
    format!("'{}'", s)
}
