use time::macros::format_description;
use time::OffsetDateTime;

/// Escape HTML special characters
pub fn escape_html(text: &str) -> String {
    text.replace("&", "&amp;")
        .replace("<", "&lt;")
        .replace(">", "&gt;")
        .replace("\"", "&quot;")
        .replace("'", "&#39;")
}

/// Escape HTML attribute values
pub fn escape_attr(text: &str) -> String {
    escape_html(text)
}

/// Dates shown under a page, e.g. `March 04, 2024`
pub fn format_display_date(ts: OffsetDateTime) -> String {
    ts.format(format_description!("[month repr:long] [day], [year]"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href=\"x\">'&'</a>"), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn display_date_uses_long_month_and_padded_day() {
        assert_eq!(format_display_date(datetime!(2024-03-04 10:00 UTC)), "March 04, 2024");
    }
}
