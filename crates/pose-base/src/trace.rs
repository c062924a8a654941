use std::time::{Duration, Instant};

/// Timing span that logs its elapsed time at `trace` level when dropped.
///
/// ```
/// let _scope = pose_base::TraceScope::new("copy input from host");
/// // ... work ...
/// ```
pub struct TraceScope {
    name: &'static str,
    start: Instant,
}

impl TraceScope {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TraceScope {
    fn drop(&mut self) {
        log::trace!(
            "{} took {:.3}ms",
            self.name,
            self.start.elapsed().as_secs_f64() * 1000.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_measures_elapsed_time() {
        let scope = TraceScope::new("sleep");
        std::thread::sleep(Duration::from_millis(2));
        assert!(scope.elapsed() >= Duration::from_millis(2));
        assert_eq!(scope.name(), "sleep");
    }
}
