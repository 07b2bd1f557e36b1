//! Scoped processing-time measurement for metric groups.

use std::time::Instant;
use tracing::{debug, warn};

use crate::family::Family;

/// Records the time spent in a metric group into the processing-time family.
///
/// The sample is written when the timer is dropped, so it is recorded on every
/// exit path of the enclosing block, including early returns. Panics are
/// covered only when they unwind; release builds abort on panic.
pub struct ProcessingTimer<'a> {
    group: &'static str,
    start: Instant,
    sink: &'a mut Family,
}

impl<'a> ProcessingTimer<'a> {
    /// Starts timing `group`; `sink` must have exactly one label (the group name).
    pub fn start(group: &'static str, sink: &'a mut Family) -> Self {
        Self {
            group,
            start: Instant::now(),
            sink,
        }
    }
}

impl Drop for ProcessingTimer<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        debug!("Processing {} took {:.3} milliseconds", self.group, elapsed_ms);
        if let Err(e) = self.sink.add_sample(&[self.group], elapsed_ms) {
            warn!("Failed to record processing time for {}: {}", self.group, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::time::Duration;

    fn processing_time() -> Family {
        Family::gauge("processing_time_ms", "Time taken to collect metrics", &["method"])
    }

    #[test]
    fn test_records_on_scope_exit() {
        let mut family = processing_time();
        {
            let _timer = ProcessingTimer::start("domains", &mut family);
            std::thread::sleep(Duration::from_millis(5));
        }
        let value = family.value(&["domains"]).unwrap();
        assert!(value >= 5.0, "expected at least 5ms, got {value}");
    }

    #[test]
    fn test_records_on_early_error_return() {
        fn failing_group(family: &mut Family, total_size: Option<u64>) -> Result<u64, String> {
            let _timer = ProcessingTimer::start("users", family);
            let total = total_size.ok_or("upstream payload missing total_size")?;
            Ok(total)
        }

        let mut family = processing_time();
        assert!(failing_group(&mut family, None).is_err());
        assert!(family.value(&["users"]).is_some());
    }

    #[test]
    fn test_records_on_unwinding_panic() {
        let mut family = processing_time();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _timer = ProcessingTimer::start("queue", &mut family);
            panic!("mapping failed");
        }));
        assert!(result.is_err());
        assert!(family.value(&["queue"]).is_some());
    }

    #[test]
    fn test_one_sample_per_group() {
        let mut family = processing_time();
        for group in ["domains", "lists", "up"] {
            let _timer = ProcessingTimer::start(group, &mut family);
        }
        let groups: Vec<_> = family
            .samples()
            .iter()
            .map(|s| s.label_values[0].as_str())
            .collect();
        assert_eq!(groups, vec!["domains", "lists", "up"]);
    }
}
