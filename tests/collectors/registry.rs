use super::common::StaticExecutor;
use mysqld_exporter::collectors::config::CollectorConfig;
use mysqld_exporter::collectors::query::RowSet;
use mysqld_exporter::collectors::registry::CollectorRegistry;
use mysqld_exporter::collectors::{COLLECTOR_NAMES, Collector, all_factories};
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(5);

fn default_collectors() -> CollectorConfig {
    let factories = all_factories();
    let enabled: Vec<String> = COLLECTOR_NAMES
        .iter()
        .filter(|name| factories.get(*name).is_some_and(|f| f().enabled_by_default()))
        .map(ToString::to_string)
        .collect();

    CollectorConfig::new().with_enabled(&enabled)
}

/// A `MySQL` 8.0 primary with binary logging and GTID, not replicating.
fn mysql80_primary() -> StaticExecutor {
    StaticExecutor::server("8.0.36-0ubuntu0.22.04.1")
        .with(
            "SHOW GLOBAL STATUS",
            RowSet::new(["Variable_name", "Value"])
                .with_row([Some("Uptime"), Some("3600")])
                .with_row([Some("Questions"), Some("1234")]),
        )
        .with(
            "SHOW MASTER STATUS",
            RowSet::new(["File", "Position", "Binlog_Do_DB", "Binlog_Ignore_DB", "Executed_Gtid_Set"]).with_row([
                Some("binlog.000006"),
                Some("49066"),
                Some(""),
                Some(""),
                Some("3E11FA47-71CA-11E1-9E33-C80AA9429562:1-261530"),
            ]),
        )
        .with("SHOW SLAVE STATUS", RowSet::default())
}

#[tokio::test]
async fn test_full_scrape_of_primary() {
    let db = mysql80_primary();
    let registry = CollectorRegistry::new(&default_collectors());

    let text = registry.collect_all(&db, DEADLINE).await.unwrap();

    assert!(text.contains("mysql_up 1"));
    assert!(text.contains("mysql_global_status_uptime 3600"));
    assert!(text.contains("mysql_global_status_questions 1234"));
    assert!(text.contains("mysql_master_status_binlog_file_num 6"));
    assert!(text.contains("mysql_master_status_binlog_pos 49066"));
    assert!(text.contains(
        "mysql_master_status_executed_gtid_end{executed_server_id=\"3E11FA47-71CA-11E1-9E33-C80AA9429562\"} 261530"
    ));

    for collector in ["global_status", "master_status", "slave_status"] {
        assert!(
            text.contains(&format!("mysql_exporter_collector_success{{collector=\"{collector}\"}} 1")),
            "{collector} should succeed:\n{text}"
        );
    }

    assert!(!text.contains("mysql_slave_status_"));
    assert!(!text.contains("mysql_user_"));
}

#[tokio::test]
async fn test_repeated_scrapes_are_independent() {
    let db = mysql80_primary();
    let registry = CollectorRegistry::new(&default_collectors());

    let first = registry.collect_all(&db, DEADLINE).await.unwrap();
    let second = registry.collect_all(&db, DEADLINE).await.unwrap();

    assert_eq!(first.matches("mysql_global_status_uptime 3600").count(), 1);
    assert_eq!(second.matches("mysql_global_status_uptime 3600").count(), 1);
    assert!(second.contains("mysql_exporter_scrapes_total 2"));
}

#[tokio::test]
async fn test_scrape_without_server() {
    let registry = CollectorRegistry::new(&default_collectors());

    let text = registry.collect_all(&StaticExecutor::new(), DEADLINE).await.unwrap();

    assert!(text.contains("mysql_up 0"));
    assert!(!text.contains("mysql_global_status_"));
}
