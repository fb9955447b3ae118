/// Formats a byte count with binary units.
///
/// # Example
///
/// ```
/// use depot_utils::bytes::format_bytes;
///
/// assert_eq!(format_bytes(1024_u64.pow(2), 2), "1.00 MiB");
/// assert_eq!(format_bytes(0, 1), "0.0 B");
/// ```
pub fn format_bytes(bytes: u64, precision: usize) -> String {
    const UNIT: f64 = 1024.0;
    const SIZES: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

    let mut value = bytes as f64;
    let mut idx = 0;
    while value >= UNIT && idx < SIZES.len() - 1 {
        value /= UNIT;
        idx += 1;
    }

    format!("{:.*} {}", precision, value, SIZES[idx])
}
