//! Toolchain selection for `cargo`-style invocations.

/// Format an optional toolchain identifier as a `+toolchain` argument.
///
/// Returns an empty string when no toolchain (or an empty one) is given, in
/// which case the default toolchain is used. Already-prefixed identifiers are
/// returned unchanged, so the function is idempotent.
#[must_use]
pub fn toolchain_arg(toolchain: Option<&str>) -> String {
    match toolchain {
        None | Some("") => String::new(),
        Some(tc) if tc.starts_with('+') => tc.to_string(),
        Some(tc) => format!("+{tc}"),
    }
}
