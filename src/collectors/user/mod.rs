use crate::collectors::Collector;
use crate::collectors::parse::{metric_name_part, parse_privilege, parse_status};
use crate::collectors::query::QueryExecutor;
use crate::collectors::sample::{MetricDesc, SampleSink, ValueType};
use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, instrument};

const SUBSYSTEM: &str = "user";

const USER_QUERY: &str = "SELECT * FROM mysql.user";

const USER_LABELS: &[&str] = &["user", "host"];

const RESOURCE_LIMIT_COLUMNS: &[&str] = &[
    "max_questions",
    "max_updates",
    "max_connections",
    "max_user_connections",
];

/// Per account privilege flags and resource limits (opt-in; needs SELECT on mysql.user).
#[derive(Clone, Default)]
pub struct UserCollector;

impl UserCollector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Collector for UserCollector {
    fn name(&self) -> &'static str {
        "user"
    }

    fn help(&self) -> &'static str {
        "Collect data from mysql.user"
    }

    fn min_version(&self) -> i32 {
        50_100
    }

    #[instrument(skip(self, db, sink), level = "info", err, fields(collector = "user", otel.kind = "internal"))]
    fn collect<'a>(&'a self, db: &'a dyn QueryExecutor, sink: &'a SampleSink) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let rows = db.query(USER_QUERY).await?;

            for row in rows.rows() {
                let user = row.get_or_empty(&["User"]);
                let host = row.get_or_empty(&["Host"]);
                let labels = [user, host];

                for (column, value) in row.iter() {
                    let column = column.to_ascii_lowercase();
                    let value = value.unwrap_or_default();

                    let parsed = if column.ends_with("_priv") {
                        parse_privilege(value)
                    } else if RESOURCE_LIMIT_COLUMNS.contains(&column.as_str()) {
                        parse_status(value)
                    } else {
                        continue;
                    };

                    let Some(v) = parsed else {
                        debug!(column = %column, value, "unrecognised value in mysql.user");
                        continue;
                    };

                    let desc = Arc::new(MetricDesc::new(
                        SUBSYSTEM,
                        &metric_name_part(&column),
                        "Privilege or resource limit from mysql.user.",
                        USER_LABELS,
                    ));
                    sink.emit(&desc, ValueType::Gauge, v, &labels);
                }
            }

            Ok(())
        })
    }
}
