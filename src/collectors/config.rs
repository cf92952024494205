use std::collections::HashSet;
use std::time::Duration;

/// Deadline used when the scraper does not announce its own timeout.
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct CollectorConfig {
    pub enabled_collectors: HashSet<String>,
    /// Subtracted from the scraper supplied timeout so the response is sent in time.
    pub timeout_offset: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled_collectors: HashSet::new(),
            timeout_offset: Duration::from_millis(250),
        }
    }
}

impl CollectorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_enabled(mut self, collectors: &[String]) -> Self {
        self.enabled_collectors = collectors.iter().cloned().collect();
        self
    }

    #[must_use]
    pub fn with_timeout_offset(mut self, offset: Duration) -> Self {
        self.timeout_offset = offset;
        self
    }

    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled_collectors.contains(name)
    }

    /// Time budget for one scrape.
    ///
    /// `scrape_timeout` is the value of the `X-Prometheus-Scrape-Timeout-Seconds`
    /// header. Missing, unparsable or non-positive values fall back to
    /// [`DEFAULT_SCRAPE_TIMEOUT`]; an offset larger than the timeout is ignored.
    #[must_use]
    pub fn scrape_deadline(&self, scrape_timeout: Option<&str>) -> Duration {
        let Some(timeout) = scrape_timeout
            .and_then(|v| v.trim().parse::<f64>().ok())
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
            .filter(|d| !d.is_zero())
        else {
            return DEFAULT_SCRAPE_TIMEOUT;
        };

        match timeout.checked_sub(self.timeout_offset) {
            Some(d) if !d.is_zero() => d,
            _ => timeout,
        }
    }
}
