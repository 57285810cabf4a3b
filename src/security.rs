use subtle::ConstantTimeEq;

/// Constant-time string comparison for secrets.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Check a caller-supplied shared secret against the configured one.
///
/// An unconfigured secret rejects everyone, as does a missing or blank
/// header value.
pub fn verify_shared_secret(expected: Option<&str>, provided: Option<&str>) -> bool {
    match (expected, provided.map(str::trim)) {
        (Some(expected), Some(provided)) if !provided.is_empty() => {
            constant_time_compare(expected, provided)
        }
        _ => false,
    }
}
