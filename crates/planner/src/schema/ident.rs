use crate::error::PlanError;

/// PostgreSQL's `NAMEDATALEN - 1`.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Lowercase snake-case form used for every target table and column name.
///
/// Runs of characters outside `[A-Za-z0-9]` become a single `_`, leading and
/// trailing `_` are dropped, and the result is cut to
/// [`MAX_IDENTIFIER_LEN`]. Applying it twice gives the same result as once.
pub fn normalize_identifier(name: &str) -> Result<String, PlanError> {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;

    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    out.truncate(MAX_IDENTIFIER_LEN);
    // A cut can land right after a separator.
    let out = out.trim_end_matches('_').to_string();

    if out.is_empty() {
        return Err(PlanError::EmptyIdentifier(name.to_string()));
    }
    Ok(out)
}
