// crates/vidfx-core/src/helpers/time.rs
//
// Shared time-formatting utilities used by the host application's
// transport display.

/// Format a millisecond position as `MM:SS` for the `position / length`
/// transport readout. Negative values (unknown position) render as 00:00.
///
/// ```
/// use vidfx_core::helpers::time::format_clock;
/// assert_eq!(format_clock(0),      "00:00");
/// assert_eq!(format_clock(-1),    "00:00");
/// assert_eq!(format_clock(61_500), "01:01");
/// assert_eq!(format_clock(3_599_000), "59:59");
/// ```
pub fn format_clock(ms: i64) -> String {
    let total = (ms.max(0)) / 1000;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Format a clip duration in seconds for the probe report: `H:MM:SS`
/// above an hour, `M:SS` above a minute, fractional seconds below.
///
/// ```
/// use vidfx_core::helpers::time::format_duration;
/// assert_eq!(format_duration(4.2),    "4.2s");
/// assert_eq!(format_duration(187.0),  "3:07");
/// assert_eq!(format_duration(3875.0), "1:04:35");
/// ```
pub fn format_duration(secs: f64) -> String {
    let whole = secs as u64;
    if whole >= 3600 {
        format!("{}:{:02}:{:02}", whole / 3600, (whole % 3600) / 60, whole % 60)
    } else if whole >= 60 {
        format!("{}:{:02}", whole / 60, whole % 60)
    } else {
        format!("{secs:.1}s")
    }
}
