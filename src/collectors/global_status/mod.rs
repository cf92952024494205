use crate::collectors::Collector;
use crate::collectors::parse::{metric_name_part, parse_status};
use crate::collectors::query::QueryExecutor;
use crate::collectors::sample::{MetricDesc, SampleSink, ValueType};
use anyhow::{Result, bail};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, instrument};

const SUBSYSTEM: &str = "global_status";

const GLOBAL_STATUS_QUERY: &str = "SHOW GLOBAL STATUS";

/// Every server status counter, one untyped sample per variable.
#[derive(Clone, Default)]
pub struct GlobalStatusCollector;

impl GlobalStatusCollector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Collector for GlobalStatusCollector {
    fn name(&self) -> &'static str {
        "global_status"
    }

    fn help(&self) -> &'static str {
        "Collect from SHOW GLOBAL STATUS"
    }

    fn min_version(&self) -> i32 {
        50_100
    }

    #[instrument(skip(self, db, sink), level = "info", err, fields(collector = "global_status", otel.kind = "internal"))]
    fn collect<'a>(&'a self, db: &'a dyn QueryExecutor, sink: &'a SampleSink) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let rows = db.query(GLOBAL_STATUS_QUERY).await?;

            let columns = rows.columns();
            if !rows.is_empty()
                && !(columns.iter().any(|c| c == "Variable_name") && columns.iter().any(|c| c == "Value"))
            {
                bail!("unexpected columns from {GLOBAL_STATUS_QUERY}: {columns:?}");
            }

            let mut skipped = 0_usize;
            for row in rows.rows() {
                let (Some(name), Some(value)) = (row.get("Variable_name"), row.get("Value")) else {
                    skipped += 1;
                    continue;
                };

                let Some(v) = parse_status(value) else {
                    skipped += 1;
                    continue;
                };

                let desc = Arc::new(MetricDesc::new(
                    SUBSYSTEM,
                    &metric_name_part(name),
                    "Generic metric from SHOW GLOBAL STATUS.",
                    &[],
                ));
                sink.emit(&desc, ValueType::Untyped, v, &[]);
            }

            debug!(skipped, "non-numeric status variables skipped");

            Ok(())
        })
    }

    fn enabled_by_default(&self) -> bool {
        true
    }
}
