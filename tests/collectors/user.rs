use super::common::{self, StaticExecutor};
use mysqld_exporter::collectors::UserCollector;
use mysqld_exporter::collectors::query::RowSet;

fn mysql_user() -> RowSet {
    RowSet::new([
        "Host",
        "User",
        "Select_priv",
        "Super_priv",
        "ssl_type",
        "max_questions",
        "max_user_connections",
        "plugin",
        "password_expired",
    ])
    .with_row([
        Some("localhost"),
        Some("root"),
        Some("Y"),
        Some("Y"),
        Some(""),
        Some("0"),
        Some("0"),
        Some("caching_sha2_password"),
        Some("N"),
    ])
    .with_row([
        Some("%"),
        Some("exporter"),
        Some("N"),
        Some("N"),
        Some("ANY"),
        Some("100"),
        Some("3"),
        Some("caching_sha2_password"),
        Some("N"),
    ])
}

#[tokio::test]
async fn test_user_privileges_and_limits() {
    let db = StaticExecutor::new().with("SELECT * FROM mysql.user", mysql_user());

    let (result, samples) = common::run_collector(&UserCollector::new(), &db).await;
    assert!(result.is_ok());

    let select = common::samples(&samples, "mysql_user_select_priv");
    assert_eq!(select.len(), 2);

    let exporter = select.iter().find(|s| s.label("user") == Some("exporter")).unwrap();
    assert_eq!(exporter.label("host"), Some("%"));
    assert_eq!(exporter.value(), 0.0);

    let limits = common::samples(&samples, "mysql_user_max_user_connections");
    assert!(limits.iter().any(|s| s.label("user") == Some("exporter") && s.value() == 3.0));

    assert!(common::samples(&samples, "mysql_user_plugin").is_empty());
    assert!(common::samples(&samples, "mysql_user_ssl_type").is_empty());
    assert!(common::samples(&samples, "mysql_user_password_expired").is_empty());
}

#[tokio::test]
async fn test_user_without_access() {
    let (result, samples) = common::run_collector(&UserCollector::new(), &StaticExecutor::new()).await;

    assert!(result.is_err());
    assert!(samples.is_empty());
}
