//! # Utility Functions
//!
//! Formatters for human-readable session output and validation helpers for
//! command-line options.
//!
//! ## Usage Examples
//!
//! ```rust
//! use smpp_stress::utils::*;
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
//! assert_eq!(format_message_rate(15500.0), "15.50K msg/s");
//!
//! validate_msg_count(10_000)?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::time::Duration;

use crate::smpp::limits;

/// Format a duration in a human-readable way
///
/// Picks the unit from the magnitude:
///
/// - **Nanoseconds**: < 1,000 ns (e.g., "500ns")
/// - **Microseconds**: < 1,000,000 ns (e.g., "1.50μs")
/// - **Milliseconds**: < 1,000,000,000 ns (e.g., "25.75ms")
/// - **Seconds**: < 60 seconds (e.g., "5.25s")
/// - **Minutes and Hours**: for longer durations (e.g., "5m 30s", "2h 15m 30s")
///
/// ## Examples
///
/// ```rust
/// # use smpp_stress::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format a message rate for display
///
/// ```rust
/// # use smpp_stress::utils::format_message_rate;
/// assert_eq!(format_message_rate(750.0), "750 msg/s");
/// assert_eq!(format_message_rate(2300000.0), "2.30M msg/s");
/// ```
pub fn format_message_rate(messages_per_second: f64) -> String {
    if messages_per_second < 1000.0 {
        format!("{:.0} msg/s", messages_per_second)
    } else if messages_per_second < 1_000_000.0 {
        format!("{:.2}K msg/s", messages_per_second / 1000.0)
    } else {
        format!("{:.2}M msg/s", messages_per_second / 1_000_000.0)
    }
}

/// Messages per second over `elapsed`; zero when no time has passed
pub fn messages_per_second(count: u32, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Validate that a port number is usable
///
/// Ports below 1024 need elevated privileges to bind, so they are rejected.
pub fn validate_port(port: u16) -> Result<()> {
    if port < 1024 {
        anyhow::bail!("Port number {} is too low (below 1024)", port);
    }
    Ok(())
}

/// Validate the number of deliveries to send
pub fn validate_msg_count(count: u32) -> Result<()> {
    if count == 0 {
        anyhow::bail!("Bad message count: must be at least 1");
    }
    Ok(())
}

/// Validate a system id against the bind field limit
///
/// Longer values would be silently truncated on the wire.
pub fn validate_system_id(system_id: &str) -> Result<()> {
    if system_id.len() > limits::SYSTEM_ID {
        anyhow::bail!(
            "System id '{}' is too long ({} bytes, maximum {})",
            system_id,
            system_id.len(),
            limits::SYSTEM_ID
        );
    }
    if system_id.as_bytes().contains(&0) {
        anyhow::bail!("System id cannot contain NUL bytes");
    }
    Ok(())
}
