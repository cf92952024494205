use crate::collectors::Collector;
use crate::collectors::gtid::parse_gtid_set;
use crate::collectors::parse::log_file_number;
use crate::collectors::query::{QueryExecutor, query_with_fallback};
use crate::collectors::sample::{MetricDesc, SampleSink, ValueType};
use anyhow::{Context, Result, bail};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, instrument};

const SUBSYSTEM: &str = "master_status";

/// `MySQL` 8.4 removed `SHOW MASTER STATUS`.
const MASTER_STATUS_QUERIES: &[&str] = &["SHOW MASTER STATUS", "SHOW BINARY LOG STATUS"];

/// Binary log coordinates of this server.
#[derive(Clone)]
pub struct MasterStatusCollector {
    binlog_file_num: Arc<MetricDesc>,
    binlog_pos: Arc<MetricDesc>,
    executed_gtid_start: Arc<MetricDesc>,
    executed_gtid_end: Arc<MetricDesc>,
}

/// Values of the last row returned by the status command.
#[derive(Debug, Default, PartialEq, Eq)]
struct MasterStatus {
    file: String,
    position: String,
    executed_gtid_set: String,
}

impl MasterStatusCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            binlog_file_num: Arc::new(MetricDesc::new(
                SUBSYSTEM,
                "binlog_file_num",
                "Sequence number of the binlog file in use.",
                &[],
            )),
            binlog_pos: Arc::new(MetricDesc::new(
                SUBSYSTEM,
                "binlog_pos",
                "Position in the binlog file in use.",
                &[],
            )),
            executed_gtid_start: Arc::new(MetricDesc::new(
                SUBSYSTEM,
                "executed_gtid_start",
                "First executed transaction per originating server.",
                &["executed_server_id"],
            )),
            executed_gtid_end: Arc::new(MetricDesc::new(
                SUBSYSTEM,
                "executed_gtid_end",
                "Last executed transaction per originating server.",
                &["executed_server_id"],
            )),
        }
    }

    fn emit_binlog(&self, status: &MasterStatus, sink: &SampleSink) -> Result<()> {
        // Binary logging disabled.
        if status.file.is_empty() {
            debug!("no binlog file reported");
            return Ok(());
        }

        let file_num = log_file_number(&status.file)?;
        let position: u64 = status
            .position
            .parse()
            .with_context(|| format!("invalid binlog position {:?}", status.position))?;

        sink.emit(&self.binlog_file_num, ValueType::Gauge, file_num, &[]);
        #[allow(clippy::cast_precision_loss)]
        let position = position as f64;
        sink.emit(&self.binlog_pos, ValueType::Gauge, position, &[]);

        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn emit_gtid(&self, status: &MasterStatus, sink: &SampleSink) -> Result<()> {
        if status.executed_gtid_set.trim().is_empty() {
            return Ok(());
        }

        let sets = parse_gtid_set(&status.executed_gtid_set)
            .context("invalid Executed_Gtid_Set in SHOW MASTER STATUS")?;

        for set in &sets {
            let labels = [set.server_id.as_str()];
            sink.emit(
                &self.executed_gtid_start,
                ValueType::Gauge,
                set.first_transaction as f64,
                &labels,
            );
            sink.emit(
                &self.executed_gtid_end,
                ValueType::Gauge,
                set.last_transaction as f64,
                &labels,
            );
        }

        Ok(())
    }
}

impl Default for MasterStatusCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for MasterStatusCollector {
    fn name(&self) -> &'static str {
        "master_status"
    }

    fn help(&self) -> &'static str {
        "Collect the master status"
    }

    fn min_version(&self) -> i32 {
        50_100
    }

    #[instrument(skip(self, db, sink), level = "info", err, fields(collector = "master_status", otel.kind = "internal"))]
    fn collect<'a>(&'a self, db: &'a dyn QueryExecutor, sink: &'a SampleSink) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let rows = query_with_fallback(db, MASTER_STATUS_QUERIES, &[]).await?;

            // File, Position, Binlog_Do_DB, Binlog_Ignore_DB[, Executed_Gtid_Set]
            let columns = rows.columns().len();
            if !rows.is_empty() && !(4..=5).contains(&columns) {
                bail!("invalid number of columns: {columns}");
            }

            let status = rows
                .rows()
                .last()
                .map(|row| MasterStatus {
                    file: row.get("File").unwrap_or_default().to_string(),
                    position: row.get("Position").unwrap_or_default().to_string(),
                    executed_gtid_set: row.get("Executed_Gtid_Set").unwrap_or_default().to_string(),
                })
                .unwrap_or_default();

            self.emit_binlog(&status, sink)?;
            self.emit_gtid(&status, sink)?;

            Ok(())
        })
    }

    fn enabled_by_default(&self) -> bool {
        true
    }
}
