/// Minutes in one day.
const MINUTES_PER_DAY: i64 = 1440;

/// Format an age in minutes for display ("just now", "5m ago", "2h ago", "3d ago").
pub fn format_age(minutes: i64) -> String {
    if minutes < 1 {
        // Also covers negative ages from clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < MINUTES_PER_DAY {
        let hours = minutes / 60;
        let remaining_mins = minutes % 60;
        if remaining_mins >= 30 {
            // Round up: 1h 30m+ becomes 2h
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / MINUTES_PER_DAY;
        let remaining_hours = (minutes % MINUTES_PER_DAY) / 60;
        if remaining_hours >= 12 {
            // Round up: 1d 12h+ becomes 2d
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Format a coordinate pair the way cache keys print them.
pub fn format_coordinates(lat: f64, lng: f64) -> String {
    format!("{:.2},{:.2}", lat, lng)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
