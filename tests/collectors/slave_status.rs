use super::common::{self, StaticExecutor};
use mysqld_exporter::collectors::SlaveStatusCollector;
use mysqld_exporter::collectors::query::RowSet;
use mysqld_exporter::collectors::sample::ValueType;

/// Trimmed `SHOW REPLICA STATUS` from `MySQL` 8.0.35 replicating from two channels.
fn mysql8_replica_status() -> RowSet {
    RowSet::new([
        "Replica_IO_State",
        "Source_Host",
        "Source_User",
        "Source_Port",
        "Source_Log_File",
        "Read_Source_Log_Pos",
        "Relay_Log_File",
        "Relay_Source_Log_File",
        "Replica_IO_Running",
        "Replica_SQL_Running",
        "Seconds_Behind_Source",
        "Last_IO_Error",
        "Source_UUID",
        "Executed_Gtid_Set",
        "Channel_Name",
    ])
    .with_row([
        Some("Waiting for source to send event"),
        Some("db-a.internal"),
        Some("repl"),
        Some("3306"),
        Some("binlog.000042"),
        Some("157"),
        Some("relay-bin-a.000003"),
        Some("binlog.000041"),
        Some("Yes"),
        Some("Yes"),
        Some("0"),
        Some(""),
        Some("3e11fa47-71ca-11e1-9e33-c80aa9429562"),
        Some("3e11fa47-71ca-11e1-9e33-c80aa9429562:1-5:11-18,\n8bc3b1f4-0a65-11ee-9c27-0242ac120002:1-27"),
        Some("a"),
    ])
    .with_row([
        Some("Connecting to source"),
        Some("db-b.internal"),
        Some("repl"),
        Some("3306"),
        Some(""),
        Some("4"),
        Some("relay-bin-b.000001"),
        Some(""),
        Some("Connecting"),
        Some("Yes"),
        None,
        Some("error connecting to source"),
        Some(""),
        Some(""),
        Some("b"),
    ])
}

fn mysql8_server() -> StaticExecutor {
    StaticExecutor::new()
        .with("SHOW REPLICA STATUS NONBLOCKING", mysql8_replica_status())
}

#[tokio::test]
async fn test_slave_status_mysql8_multi_channel() {
    let db = mysql8_server();

    let (result, samples) = common::run_collector(&SlaveStatusCollector::new(), &db).await;
    assert!(result.is_ok(), "collect failed: {result:?}");

    let io_running = common::samples(&samples, "mysql_slave_status_replica_io_running");
    assert_eq!(io_running.len(), 2);

    let channel_a = io_running
        .iter()
        .find(|s| s.label("channel_name") == Some("a"))
        .unwrap();
    assert_eq!(channel_a.value(), 1.0);
    assert_eq!(channel_a.label("master_host"), Some("db-a.internal"));
    assert_eq!(channel_a.label("master_uuid"), Some("3e11fa47-71ca-11e1-9e33-c80aa9429562"));
    assert_eq!(channel_a.label("connection_name"), Some(""));
    assert_eq!(channel_a.value_type(), ValueType::Untyped);

    let channel_b = io_running
        .iter()
        .find(|s| s.label("channel_name") == Some("b"))
        .unwrap();
    assert_eq!(channel_b.value(), 0.0);
}

#[tokio::test]
async fn test_slave_status_log_file_numbers() {
    let db = mysql8_server();

    let (_, samples) = common::run_collector(&SlaveStatusCollector::new(), &db).await;

    let source_log = common::samples(&samples, "mysql_slave_status_source_log_file_num");
    assert_eq!(source_log.len(), 1, "empty file names are skipped");
    assert_eq!(source_log[0].value(), 42.0);

    let relay_source = common::samples(&samples, "mysql_slave_status_relay_source_log_file_num");
    assert_eq!(relay_source.len(), 1);
    assert_eq!(relay_source[0].value(), 41.0);

    // relay-bin-a.000003 is not a source log column, it is read as a generic value
    let relay_log = common::samples(&samples, "mysql_slave_status_relay_log_file");
    assert!(relay_log.iter().any(|s| s.value() == 3.0));
}

#[tokio::test]
async fn test_slave_status_gtid_per_originating_server() {
    let db = mysql8_server();

    let (_, samples) = common::run_collector(&SlaveStatusCollector::new(), &db).await;

    let starts = common::samples(&samples, "mysql_slave_status_executed_gtid_set_start");
    let ends = common::samples(&samples, "mysql_slave_status_executed_gtid_set_end");
    assert_eq!(starts.len(), 2);
    assert_eq!(ends.len(), 2);

    let own = ends
        .iter()
        .find(|s| s.label("executed_server_id") == Some("3e11fa47-71ca-11e1-9e33-c80aa9429562"))
        .unwrap();
    assert_eq!(own.value(), 18.0);
    assert_eq!(own.label("channel_name"), Some("a"));

    let upstream = ends
        .iter()
        .find(|s| s.label("executed_server_id") == Some("8bc3b1f4-0a65-11ee-9c27-0242ac120002"))
        .unwrap();
    assert_eq!(upstream.value(), 27.0);
}

#[tokio::test]
async fn test_slave_status_skips_text_and_null_columns() {
    let db = mysql8_server();

    let (_, samples) = common::run_collector(&SlaveStatusCollector::new(), &db).await;

    assert!(common::samples(&samples, "mysql_slave_status_replica_io_state").is_empty());
    assert!(common::samples(&samples, "mysql_slave_status_source_user").is_empty());
    assert!(common::samples(&samples, "mysql_slave_status_last_io_error").is_empty());

    // NULL Seconds_Behind_Source on the disconnected channel
    let lag = common::samples(&samples, "mysql_slave_status_seconds_behind_source");
    assert_eq!(lag.len(), 1);
    assert_eq!(lag[0].label("channel_name"), Some("a"));
}

#[tokio::test]
async fn test_slave_status_mariadb_multi_source() {
    let rows = RowSet::new([
        "Connection_name",
        "Master_Host",
        "Master_Log_File",
        "Slave_IO_Running",
        "Slave_SQL_Running",
        "Seconds_Behind_Master",
        "Gtid_IO_Pos",
    ])
    .with_row([
        Some("east"),
        Some("10.0.0.5"),
        Some("mariadb-bin.000123"),
        Some("Yes"),
        Some("No"),
        Some("12"),
        Some("0-1-100"),
    ]);

    let db = StaticExecutor::new().with("SHOW ALL SLAVES STATUS", rows);

    let (result, samples) = common::run_collector(&SlaveStatusCollector::new(), &db).await;
    assert!(result.is_ok());

    assert_eq!(common::value(&samples, "mysql_slave_status_master_log_file_num"), Some(123.0));
    assert_eq!(common::value(&samples, "mysql_slave_status_slave_sql_running"), Some(0.0));
    assert_eq!(common::value(&samples, "mysql_slave_status_seconds_behind_master"), Some(12.0));

    let io_running = common::samples(&samples, "mysql_slave_status_slave_io_running");
    let sample = io_running[0];
    assert_eq!(sample.label("connection_name"), Some("east"));
    assert_eq!(sample.label("channel_name"), Some(""));
    assert_eq!(sample.label("master_host"), Some("10.0.0.5"));

    // An IPv4 host is a label, never a value.
    assert!(common::samples(&samples, "mysql_slave_status_master_host").is_empty());
    assert!(common::samples(&samples, "mysql_slave_status_connection_name").is_empty());

    assert_eq!(db.executed(), vec!["SHOW ALL SLAVES STATUS".to_string()]);
}

#[tokio::test]
async fn test_slave_status_not_a_replica() {
    let db = StaticExecutor::new().with("SHOW ALL SLAVES STATUS NONBLOCKING", RowSet::default());

    let (result, samples) = common::run_collector(&SlaveStatusCollector::new(), &db).await;

    assert!(result.is_ok());
    assert!(samples.is_empty());
}

#[tokio::test]
async fn test_slave_status_falls_back_to_single_source_command() {
    let rows = RowSet::new(["Master_Host", "Slave_IO_Running"]).with_row([Some("primary"), Some("Yes")]);
    let db = StaticExecutor::new().with("SHOW SLAVE STATUS", rows);

    let (result, samples) = common::run_collector(&SlaveStatusCollector::new(), &db).await;

    assert!(result.is_ok());
    assert_eq!(common::value(&samples, "mysql_slave_status_slave_io_running"), Some(1.0));
    assert_eq!(
        db.executed(),
        vec![
            "SHOW ALL SLAVES STATUS",
            "SHOW ALL SLAVES STATUS NONBLOCKING",
            "SHOW ALL SLAVES STATUS NOLOCK",
            "SHOW ALL SLAVES STATUS",
            "SHOW SLAVE STATUS",
        ]
    );
}

#[tokio::test]
async fn test_slave_status_malformed_gtid_fails() {
    let rows = RowSet::new(["Master_Host", "Executed_Gtid_Set"]).with_row([Some("primary"), Some("not-a-gtid-set")]);
    let db = StaticExecutor::new().with("SHOW SLAVE STATUS NONBLOCKING", rows);

    let (result, _) = common::run_collector(&SlaveStatusCollector::new(), &db).await;

    assert!(result.is_err());
}
