use std::time::{Duration, Instant};

/// Logs when a named section starts and, on drop, how long it took.
pub struct Stopwatch {
    section: &'static str,
    started: Instant,
}

impl Stopwatch {
    pub fn start(section: &'static str) -> Self {
        log::info!("entering {section}");
        Stopwatch {
            section,
            started: Instant::now(),
        }
    }
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        log::info!(
            "leaving {} ({} elapsed)",
            self.section,
            format_elapsed(self.started.elapsed())
        );
    }
}

/// Renders a duration as `1h 2m 3s 4ms`, dropping zero components.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let parts = [
        (total_ms / 3_600_000, "h"),
        (total_ms / 60_000 % 60, "m"),
        (total_ms / 1_000 % 60, "s"),
        (total_ms % 1_000, "ms"),
    ];
    let rendered: Vec<String> = parts
        .iter()
        .filter(|(count, _)| *count != 0)
        .map(|(count, suffix)| format!("{count}{suffix}"))
        .collect();
    if rendered.is_empty() {
        "0ms".to_string()
    } else {
        rendered.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_micros(300)), "0ms");
        assert_eq!(format_elapsed(Duration::from_millis(1_250)), "1s 250ms");
        assert_eq!(
            format_elapsed(Duration::from_millis(3_600_000 + 120_000 + 5)),
            "1h 2m 5ms"
        );
    }
}
