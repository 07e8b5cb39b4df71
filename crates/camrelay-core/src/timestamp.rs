//! Timestamp labels stamped onto images.

use chrono::NaiveDateTime;
use chrono_tz::Tz;

/// Display format of the stamped label, e.g. `3:05PM Jul. 04, 2024`
pub const LABEL_FORMAT: &str = "%-I:%M%p %b. %d, %Y";

/// Format a server modification time (UTC) as a label in the given zone.
pub fn format_label(modified_utc: NaiveDateTime, zone: Tz) -> String {
    modified_utc
        .and_utc()
        .with_timezone(&zone)
        .format(LABEL_FORMAT)
        .to_string()
}

/// Label for an optional modification time; empty when the server gave none.
pub fn label_or_empty(modified_utc: Option<NaiveDateTime>, zone: Tz) -> String {
    modified_utc
        .map(|m| format_label(m, zone))
        .unwrap_or_default()
}
