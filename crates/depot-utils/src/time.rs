use std::time::Duration;

/// Parses a duration string such as `90s`, `5m` or `1h30m`.
///
/// Units are `s`, `m`, `h` and `d`. Returns `None` for malformed input, a bare number
/// without unit, or on overflow.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use depot_utils::time::parse_duration;
///
/// assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
/// assert_eq!(parse_duration("30"), None);
/// ```
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut chars = input.chars().peekable();

    while chars.peek().is_some() {
        let mut number: u64 = 0;
        let mut digits = 0;
        while let Some(c) = chars.next_if(char::is_ascii_digit) {
            number = number
                .checked_mul(10)?
                .checked_add(c.to_digit(10)? as u64)?;
            digits += 1;
        }

        if digits == 0 {
            return None;
        }

        let multiplier = match chars.next()? {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return None,
        };

        total = total.checked_add(number.checked_mul(multiplier)?)?;
    }

    Some(Duration::from_secs(total))
}
