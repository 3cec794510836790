//! ISO-8601 duration parsing for `contentDetails.duration` values.

/// Parse an ISO-8601 duration such as `PT4M13S` or `P1DT2H` into whole seconds.
///
/// Supports week, day, hour, minute and second designators; fractional
/// seconds are truncated. Year and month designators have no fixed length and
/// are rejected, as is any malformed input.
#[must_use]
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut number = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for ch in rest.chars() {
        match ch {
            '0'..='9' | '.' => number.push(ch),
            'T' if !in_time && number.is_empty() => in_time = true,
            'W' | 'D' | 'H' | 'M' | 'S' => {
                let multiplier = match (ch, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                let whole = number.split('.').next().unwrap_or_default();
                if whole.is_empty() || (ch != 'S' && number.contains('.')) {
                    return None;
                }
                let amount: u64 = whole.parse().ok()?;
                total = total.checked_add(amount.checked_mul(multiplier)?)?;
                number.clear();
                saw_component = true;
            }
            _ => return None,
        }
    }

    if !number.is_empty() || !saw_component {
        return None;
    }
    Some(total)
}
