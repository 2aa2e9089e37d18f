pub mod panels;
pub mod plot;
pub mod table;

/// Two decimals with comma thousands separators: `1234567.5` → `1,234,567.50`.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let text = format!("{:.2}", value.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((&text, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && text.bytes().any(|b| b != b'0' && b != b'.') {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{frac_part}")
}
