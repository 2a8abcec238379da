//! Time formatting for media tool arguments

/// Format seconds for an ffmpeg argument or filter expression.
///
/// Millisecond precision; more digits buys nothing at 30 fps and clutters
/// command lines in logs.
pub fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds.max(0.0))
}

/// Human-readable HH:MM:SS.ms for logs and reports
pub fn format_clock(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let hours = (seconds / 3600.0) as u32;
    let minutes = ((seconds % 3600.0) / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    let millis = ((seconds % 1.0) * 1000.0).round() as u32;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
    } else {
        format!("{:02}:{:02}.{:03}", minutes, secs, millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(1.5), "1.500");
        assert_eq!(format_seconds(0.3333333), "0.333");
        assert_eq!(format_seconds(-2.0), "0.000");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(90.5), "01:30.500");
        assert_eq!(format_clock(3723.456), "01:02:03.456");
    }
}
