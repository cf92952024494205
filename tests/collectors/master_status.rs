use super::common::{self, StaticExecutor};
use mysqld_exporter::collectors::MasterStatusCollector;
use mysqld_exporter::collectors::query::RowSet;
use mysqld_exporter::collectors::sample::ValueType;

const MYSQL_COLUMNS: [&str; 5] = ["File", "Position", "Binlog_Do_DB", "Binlog_Ignore_DB", "Executed_Gtid_Set"];
const MARIADB_COLUMNS: [&str; 4] = ["File", "Position", "Binlog_Do_DB", "Binlog_Ignore_DB"];

#[tokio::test]
async fn test_master_status_mysql84_binary_log_status() {
    let rows = RowSet::new(MYSQL_COLUMNS).with_row([
        Some("binlog.000017"),
        Some("2291"),
        Some(""),
        Some(""),
        Some("6b5e1a1c-0f1d-11ef-b3b0-0242ac110002:1-93,\nf2a8e2d4-0f1d-11ef-9d12-0242ac110003:1-7"),
    ]);
    // SHOW MASTER STATUS is gone on 8.4
    let db = StaticExecutor::new().with("SHOW BINARY LOG STATUS", rows);

    let (result, samples) = common::run_collector(&MasterStatusCollector::new(), &db).await;
    assert!(result.is_ok(), "collect failed: {result:?}");

    assert_eq!(common::value(&samples, "mysql_master_status_binlog_file_num"), Some(17.0));
    assert_eq!(common::value(&samples, "mysql_master_status_binlog_pos"), Some(2291.0));

    let ends = common::samples(&samples, "mysql_master_status_executed_gtid_end");
    assert_eq!(ends.len(), 2);
    assert!(ends.iter().all(|s| s.value_type() == ValueType::Gauge));

    let second = ends
        .iter()
        .find(|s| s.label("executed_server_id") == Some("f2a8e2d4-0f1d-11ef-9d12-0242ac110003"))
        .unwrap();
    assert_eq!(second.value(), 7.0);

    assert_eq!(db.executed(), vec!["SHOW MASTER STATUS", "SHOW BINARY LOG STATUS"]);
}

#[tokio::test]
async fn test_master_status_mariadb_without_gtid_column() {
    let rows = RowSet::new(MARIADB_COLUMNS).with_row([Some("mariadb-bin.000321"), Some("385"), Some(""), Some("")]);
    let db = StaticExecutor::new().with("SHOW MASTER STATUS", rows);

    let (result, samples) = common::run_collector(&MasterStatusCollector::new(), &db).await;

    assert!(result.is_ok());
    assert_eq!(common::value(&samples, "mysql_master_status_binlog_file_num"), Some(321.0));
    assert_eq!(common::value(&samples, "mysql_master_status_binlog_pos"), Some(385.0));
    assert!(common::samples(&samples, "mysql_master_status_executed_gtid_start").is_empty());
}

#[tokio::test]
async fn test_master_status_binlog_disabled() {
    let db = StaticExecutor::new().with("SHOW MASTER STATUS", RowSet::new(MYSQL_COLUMNS));

    let (result, samples) = common::run_collector(&MasterStatusCollector::new(), &db).await;

    assert!(result.is_ok());
    assert!(samples.is_empty());
}

#[tokio::test]
async fn test_master_status_unexpected_shape() {
    let rows = RowSet::new(["File", "Position"]).with_row([Some("binlog.000001"), Some("4")]);
    let db = StaticExecutor::new().with("SHOW MASTER STATUS", rows);

    let (result, samples) = common::run_collector(&MasterStatusCollector::new(), &db).await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("invalid number of columns: 2"));
    assert!(samples.is_empty());
}

#[tokio::test]
async fn test_master_status_no_privilege() {
    let db = StaticExecutor::new();

    let (result, _) = common::run_collector(&MasterStatusCollector::new(), &db).await;

    assert!(result.is_err());
    assert_eq!(db.executed().len(), 2);
}
