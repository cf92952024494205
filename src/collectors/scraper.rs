//! Cumulative self-monitoring of the collectors, kept across scrapes.

use anyhow::Result;
use prometheus::{CounterVec, GaugeVec, HistogramVec, IntCounter, IntGauge, Opts, Registry};
use std::time::Instant;

#[derive(Clone)]
pub struct ScraperCollector {
    scrape_duration_seconds: HistogramVec,
    scrape_errors_total: CounterVec,
    last_scrape_timestamp: GaugeVec,

    metrics_total: IntGauge,
    scrapes_total: IntCounter,
}

impl Default for ScraperCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ScraperCollector {
    #[must_use]
    #[allow(clippy::expect_used)]
    ///
    /// # Panics
    ///
    /// Panics if metric creation fails.
    pub fn new() -> Self {
        let scrape_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "mysql_exporter_collector_scrape_duration_seconds",
                "Time spent scraping each collector in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["collector"],
        )
        .expect("mysql_exporter_collector_scrape_duration_seconds");

        let scrape_errors_total = CounterVec::new(
            Opts::new(
                "mysql_exporter_collector_scrape_errors_total",
                "Total number of scrape errors per collector",
            ),
            &["collector"],
        )
        .expect("mysql_exporter_collector_scrape_errors_total");

        let last_scrape_timestamp = GaugeVec::new(
            Opts::new(
                "mysql_exporter_collector_last_scrape_timestamp_seconds",
                "Unix timestamp of the last scrape attempt per collector",
            ),
            &["collector"],
        )
        .expect("mysql_exporter_collector_last_scrape_timestamp_seconds");

        let metrics_total = IntGauge::with_opts(Opts::new(
            "mysql_exporter_metrics_total",
            "Number of samples exported by the last scrape",
        ))
        .expect("mysql_exporter_metrics_total");

        let scrapes_total = IntCounter::with_opts(Opts::new(
            "mysql_exporter_scrapes_total",
            "Total number of scrapes performed since start",
        ))
        .expect("mysql_exporter_scrapes_total");

        Self {
            scrape_duration_seconds,
            scrape_errors_total,
            last_scrape_timestamp,
            metrics_total,
            scrapes_total,
        }
    }

    #[must_use]
    pub fn start_scrape(&self, collector_name: &str) -> ScrapeTimer {
        ScrapeTimer {
            collector_name: collector_name.to_string(),
            start: Instant::now(),
            scraper: self.clone(),
            done: false,
        }
    }

    pub fn update_metrics_count(&self, count: i64) {
        self.metrics_total.set(count);
    }

    #[must_use]
    pub fn metrics_count(&self) -> i64 {
        self.metrics_total.get()
    }

    pub fn increment_scrapes(&self) {
        self.scrapes_total.inc();
    }

    fn record(&self, collector_name: &str, duration: f64, success: bool) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        self.scrape_duration_seconds
            .with_label_values(&[collector_name])
            .observe(duration);

        self.last_scrape_timestamp
            .with_label_values(&[collector_name])
            .set(timestamp);

        if !success {
            self.scrape_errors_total
                .with_label_values(&[collector_name])
                .inc();
        }
    }

    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.scrape_duration_seconds.clone()))?;
        registry.register(Box::new(self.scrape_errors_total.clone()))?;
        registry.register(Box::new(self.last_scrape_timestamp.clone()))?;
        registry.register(Box::new(self.metrics_total.clone()))?;
        registry.register(Box::new(self.scrapes_total.clone()))?;
        Ok(())
    }
}

/// Measures one collector run. Dropping it without calling
/// [`ScrapeTimer::success`] or [`ScrapeTimer::error`] counts as an error, which
/// covers collectors cancelled by the scrape deadline.
pub struct ScrapeTimer {
    collector_name: String,
    start: Instant,
    scraper: ScraperCollector,
    done: bool,
}

impl ScrapeTimer {
    /// Elapsed time since the timer started, in seconds.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn success(mut self) {
        self.finish(true);
    }

    pub fn error(mut self) {
        self.finish(false);
    }

    fn finish(&mut self, success: bool) {
        if self.done {
            return;
        }
        self.done = true;
        let duration = self.elapsed();
        self.scraper.record(&self.collector_name, duration, success);
    }
}

impl Drop for ScrapeTimer {
    fn drop(&mut self) {
        self.finish(false);
    }
}
