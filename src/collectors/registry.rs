//! Runs the enabled collectors once per scrape and assembles the response.

use crate::collectors::config::{CollectorConfig, DEFAULT_SCRAPE_TIMEOUT};
use crate::collectors::query::QueryExecutor;
use crate::collectors::sample::{MetricDesc, SampleSink, ValueType, into_metric_families};
use crate::collectors::scraper::ScraperCollector;
use crate::collectors::util::parse_server_version;
use crate::collectors::{COLLECTOR_NAMES, Collector, CollectorType, all_factories};
use anyhow::{Result, anyhow};
use futures::stream::{FuturesUnordered, StreamExt};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, info_span, instrument, warn};
use tracing_futures::Instrument as _;

const VERSION_QUERY: &str = "SELECT VERSION()";

#[derive(Clone)]
pub struct CollectorRegistry {
    collectors: Vec<CollectorType>,
    registry: Registry,
    scraper: ScraperCollector,
    up: Arc<MetricDesc>,
    collector_success: Arc<MetricDesc>,
    collector_duration: Arc<MetricDesc>,
}

impl CollectorRegistry {
    /// Instantiate the collectors enabled in `config`, in registration order.
    #[must_use]
    pub fn new(config: &CollectorConfig) -> Self {
        let factories = all_factories();

        for name in &config.enabled_collectors {
            if !factories.contains_key(name.as_str()) {
                warn!(collector = %name, "unknown collector, ignoring");
            }
        }

        let collectors: Vec<CollectorType> = COLLECTOR_NAMES
            .iter()
            .filter(|name| config.is_enabled(name))
            .filter_map(|name| factories.get(name).map(|factory| factory()))
            .collect();

        info!(
            collectors = ?collectors.iter().map(Collector::name).collect::<Vec<_>>(),
            "collectors enabled"
        );

        let registry = Registry::new();
        let scraper = ScraperCollector::new();
        if let Err(e) = scraper.register(&registry) {
            warn!(error = %e, "failed to register exporter metrics");
        }

        Self {
            collectors,
            registry,
            scraper,
            up: Arc::new(MetricDesc::new(
                "",
                "up",
                "Whether the MySQL server is up.",
                &[],
            )),
            collector_success: Arc::new(MetricDesc::new(
                "exporter",
                "collector_success",
                "mysqld_exporter: Whether a collector succeeded.",
                &["collector"],
            )),
            collector_duration: Arc::new(MetricDesc::new(
                "exporter",
                "collector_duration_seconds",
                "Collector time duration.",
                &["collector"],
            )),
        }
    }

    /// Names of the collectors that run on every scrape.
    #[must_use]
    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(Collector::name).collect()
    }

    /// Run one scrape cycle.
    ///
    /// Never fails: an unreachable server yields `mysql_up 0`, a failing or
    /// slow collector yields `mysql_exporter_collector_success 0` for that
    /// collector while the others still report.
    #[instrument(skip(self, db), level = "info", fields(otel.kind = "internal"))]
    pub async fn scrape(&self, db: &dyn QueryExecutor, deadline: Duration) -> Vec<MetricFamily> {
        let now = Instant::now();
        let deadline_at = now
            .checked_add(deadline)
            .unwrap_or_else(|| now + DEFAULT_SCRAPE_TIMEOUT);
        let (sink, stream) = SampleSink::channel();

        self.scraper.increment_scrapes();

        match timeout_at(deadline_at, probe_version(db)).await {
            Ok(Ok(version)) => {
                sink.emit(&self.up, ValueType::Gauge, 1.0, &[]);
                self.run_collectors(db, &sink, version, deadline_at).await;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "database unreachable, skipping collectors");
                sink.emit(&self.up, ValueType::Gauge, 0.0, &[]);
            }
            Err(_) => {
                warn!(?deadline, "timed out probing the database, skipping collectors");
                sink.emit(&self.up, ValueType::Gauge, 0.0, &[]);
            }
        }

        drop(sink);
        let mut families = into_metric_families(stream.collect().await);

        let exported: usize = families.iter().map(|f| f.get_metric().len()).sum();
        self.scraper
            .update_metrics_count(i64::try_from(exported).unwrap_or(i64::MAX));

        families.extend(self.registry.gather());
        families
    }

    /// Run one scrape cycle and encode it in the text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub async fn collect_all(&self, db: &dyn QueryExecutor, deadline: Duration) -> Result<String> {
        let families = self.scrape(db, deadline).await;

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }

    async fn run_collectors(
        &self,
        db: &dyn QueryExecutor,
        sink: &SampleSink,
        version: Option<i32>,
        deadline_at: Instant,
    ) {
        let mut tasks = FuturesUnordered::new();

        for collector in &self.collectors {
            if let Some(version) = version
                && collector.min_version() > version
            {
                debug!(
                    collector = collector.name(),
                    min_version = collector.min_version(),
                    version,
                    "server too old for collector, skipping"
                );
                continue;
            }

            let span = info_span!("collector.collect", collector = %collector.name(), otel.kind = "internal");
            let timer = self.scraper.start_scrape(collector.name());

            tasks.push(
                async move {
                    let result = timeout_at(deadline_at, collector.collect(db, sink)).await;
                    (collector.name(), timer, result)
                }
                .instrument(span),
            );
        }

        while let Some((name, timer, result)) = tasks.next().await {
            let elapsed = timer.elapsed();

            let success = match result {
                Ok(Ok(())) => {
                    debug!(collector = name, elapsed, "collector finished");
                    timer.success();
                    1.0
                }
                Ok(Err(e)) => {
                    warn!(collector = name, error = %e, "collector failed");
                    timer.error();
                    0.0
                }
                Err(_) => {
                    warn!(collector = name, elapsed, "collector timed out");
                    timer.error();
                    0.0
                }
            };

            sink.emit(&self.collector_success, ValueType::Gauge, success, &[name]);
            sink.emit(&self.collector_duration, ValueType::Gauge, elapsed, &[name]);
        }
    }
}

/// Check connectivity and read the server version. `None` when the version
/// string is not recognised, in which case every collector runs.
async fn probe_version(db: &dyn QueryExecutor) -> Result<Option<i32>> {
    let rows = db.query(VERSION_QUERY).await?;

    let version = rows
        .rows()
        .first()
        .and_then(|row| row.iter().next())
        .and_then(|(_, value)| value)
        .ok_or_else(|| anyhow!("{VERSION_QUERY} returned no value"))?;

    let parsed = parse_server_version(version);
    debug!(version, parsed, "server version");

    Ok((parsed > 0).then_some(parsed))
}
