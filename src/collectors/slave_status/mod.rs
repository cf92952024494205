use crate::collectors::Collector;
use crate::collectors::gtid::parse_gtid_set;
use crate::collectors::parse::{log_file_number, metric_name_part, parse_status};
use crate::collectors::query::{QueryExecutor, RawRow, query_with_fallback};
use crate::collectors::sample::{MetricDesc, SampleSink, ValueType};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, instrument};

const SUBSYSTEM: &str = "slave_status";

/// Command names differ between `MariaDB` (multi-source), `MySQL` < 8.0.22 and
/// `MySQL` >= 8.0.22.
const SLAVE_STATUS_QUERIES: &[&str] = &["SHOW ALL SLAVES STATUS", "SHOW SLAVE STATUS", "SHOW REPLICA STATUS"];

/// Lock avoidance hints, Percona and older `MySQL` forks only accept one of them.
const SLAVE_STATUS_SUFFIXES: &[&str] = &[" NONBLOCKING", " NOLOCK", ""];

const ROW_LABELS: &[&str] = &["master_host", "master_uuid", "channel_name", "connection_name"];

const GTID_LABELS: &[&str] = &[
    "master_host",
    "master_uuid",
    "channel_name",
    "connection_name",
    "executed_server_id",
];

const LOG_FILE_COLUMNS: &[&str] = &[
    "Master_Log_File",
    "Relay_Master_Log_File",
    "Source_Log_File",
    "Relay_Source_Log_File",
];

const EXECUTED_GTID_SET: &str = "Executed_Gtid_Set";

/// Columns already exported as labels on every sample of the row.
const LABEL_COLUMNS: &[&str] = &[
    "Master_Host",
    "Source_Host",
    "Master_UUID",
    "Source_UUID",
    "Channel_Name",
    "Connection_name",
];

/// Replication state of every configured replication source.
#[derive(Clone)]
pub struct SlaveStatusCollector {
    executed_gtid_start: Arc<MetricDesc>,
    executed_gtid_end: Arc<MetricDesc>,
}

impl SlaveStatusCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            executed_gtid_start: Arc::new(MetricDesc::new(
                SUBSYSTEM,
                "executed_gtid_set_start",
                "Executed GTID from SHOW SLAVE STATUS.",
                GTID_LABELS,
            )),
            executed_gtid_end: Arc::new(MetricDesc::new(
                SUBSYSTEM,
                "executed_gtid_set_end",
                "Executed GTID from SHOW SLAVE STATUS.",
                GTID_LABELS,
            )),
        }
    }

    fn collect_row(&self, row: &RawRow, sink: &SampleSink) -> Result<()> {
        let master_host = row.get_or_empty(&["Master_Host", "Source_Host"]);
        let master_uuid = row.get_or_empty(&["Master_UUID", "Source_UUID"]);
        let channel_name = row.get_or_empty(&["Channel_Name"]);
        let connection_name = row.get_or_empty(&["Connection_name"]);
        let labels = [master_host, master_uuid, channel_name, connection_name];

        for (column, value) in row.iter() {
            if LABEL_COLUMNS.contains(&column) {
                continue;
            }

            let value = value.unwrap_or_default();

            if column == EXECUTED_GTID_SET {
                self.collect_gtid_set(value, &labels, sink)?;
            } else if LOG_FILE_COLUMNS.contains(&column) {
                collect_log_file(column, value, &labels, sink)?;
            } else if let Some(v) = parse_status(value) {
                let desc = Arc::new(MetricDesc::new(
                    SUBSYSTEM,
                    &metric_name_part(column),
                    "Generic metric from SHOW SLAVE STATUS.",
                    ROW_LABELS,
                ));
                sink.emit(&desc, ValueType::Untyped, v, &labels);
            }
        }

        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn collect_gtid_set(&self, value: &str, labels: &[&str; 4], sink: &SampleSink) -> Result<()> {
        // Replicas without GTID mode report an empty set.
        if value.trim().is_empty() {
            return Ok(());
        }

        let sets = parse_gtid_set(value).context("invalid Executed_Gtid_Set in SHOW SLAVE STATUS")?;

        for set in &sets {
            let [host, uuid, channel, connection] = *labels;
            let gtid_labels = [host, uuid, channel, connection, set.server_id.as_str()];

            sink.emit(
                &self.executed_gtid_start,
                ValueType::Gauge,
                set.first_transaction as f64,
                &gtid_labels,
            );
            sink.emit(
                &self.executed_gtid_end,
                ValueType::Gauge,
                set.last_transaction as f64,
                &gtid_labels,
            );
        }

        Ok(())
    }
}

fn collect_log_file(column: &str, value: &str, labels: &[&str; 4], sink: &SampleSink) -> Result<()> {
    // No file yet, e.g. a replica that never connected.
    if value.is_empty() {
        debug!(column, "empty log file name, skipping");
        return Ok(());
    }

    let num = log_file_number(value)?;
    let desc = Arc::new(MetricDesc::new(
        SUBSYSTEM,
        &format!("{}_num", metric_name_part(column)),
        "Receive master log file num from SHOW SLAVE STATUS.",
        ROW_LABELS,
    ));
    sink.emit(&desc, ValueType::Untyped, num, labels);

    Ok(())
}

impl Default for SlaveStatusCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for SlaveStatusCollector {
    fn name(&self) -> &'static str {
        "slave_status"
    }

    fn help(&self) -> &'static str {
        "Collect from SHOW SLAVE STATUS"
    }

    fn min_version(&self) -> i32 {
        50_100
    }

    #[instrument(skip(self, db, sink), level = "info", err, fields(collector = "slave_status", otel.kind = "internal"))]
    fn collect<'a>(&'a self, db: &'a dyn QueryExecutor, sink: &'a SampleSink) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let rows = query_with_fallback(db, SLAVE_STATUS_QUERIES, SLAVE_STATUS_SUFFIXES).await?;

            if rows.is_empty() {
                debug!("no replication configured");
            }

            for row in rows.rows() {
                self.collect_row(row, sink)?;
            }

            Ok(())
        })
    }

    fn enabled_by_default(&self) -> bool {
        true
    }
}
