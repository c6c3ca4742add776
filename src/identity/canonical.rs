/// Converts a numeric identity string to its canonical form
///
/// When a decimal point is present, trailing fractional zeros are removed and
/// then a trailing decimal point is removed. Strings without a decimal point
/// are returned unchanged.
///
/// # Examples
///
/// ```
/// use catalog_harvest::identity::canonicalize;
///
/// assert_eq!(canonicalize("12.000"), "12");
/// assert_eq!(canonicalize("64.1000"), "64.1");
/// assert_eq!(canonicalize("9.3000"), "9.3");
/// assert_eq!(canonicalize("3529"), "3529");
/// ```
pub fn canonicalize(raw: &str) -> String {
    if !raw.contains('.') {
        return raw.to_string();
    }

    raw.trim_end_matches('0').trim_end_matches('.').to_string()
}
