/// Lower cases and trims a stop name
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Renders a number the way a spreadsheet shows it: whole numbers without a fraction.
pub fn render_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}
