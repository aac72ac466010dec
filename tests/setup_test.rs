//! End-to-end runs against a real PostgreSQL. The connecting role must be a
//! superuser and the server must already run with `wal_level = logical`.
//!
//! Run with: cargo test --test setup_test -- --ignored

mod common;

use common::{admin_client, cleanup, get_test_config};
use exoquic_pg_setup::postgres::{tables, Database, RetryPolicy, TARGET_SCHEMA};
use exoquic_pg_setup::Setup;
use std::time::Duration;

fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(100),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("exoquic_pg_setup=debug")
        .try_init()
        .ok();
}

#[tokio::test]
#[ignore]
async fn test_second_run_is_idempotent_except_publication() {
    init_tracing();
    let config = get_test_config();
    let client = admin_client(&config).await;
    cleanup(&client, &config).await;

    let setup = Setup::new(config.clone()).with_retry_policy(quick_retry());

    let first = setup.run().await.unwrap();
    let body = |report: &exoquic_pg_setup::Report, title: &str| {
        report.find(title).map(|s| s.body.clone()).unwrap_or_default()
    };
    assert!(body(&first, "Replication User").contains("Created replication user"));
    assert!(body(&first, "Replication Slot").contains("Created logical replication slot"));
    assert!(body(&first, "Publication").contains("Created publication"));

    let second = setup.run().await.unwrap();
    assert!(body(&second, "Replication User").contains("already exists"));
    assert!(!body(&second, "Replication User").contains("Created"));
    assert!(body(&second, "Replication Slot").contains("already exists"));
    assert!(!body(&second, "Replication Slot").contains("Created"));
    assert!(!body(&second, "Helper Schema").contains("Created schema"));

    let publication = body(&second, "Publication");
    assert!(publication.contains("already exists"));
    assert!(publication.contains("Dropped existing publication"));
    assert!(publication.contains("Created publication"));

    cleanup(&client, &config).await;
}

#[tokio::test]
#[ignore]
async fn test_wal_settings_already_satisfied() {
    init_tracing();
    let config = get_test_config();
    let client = admin_client(&config).await;
    cleanup(&client, &config).await;

    let report = Setup::new(config.clone())
        .with_retry_policy(quick_retry())
        .run()
        .await
        .unwrap();

    let wal = &report.find("WAL Configuration").unwrap().body;
    assert!(wal.lines().all(|line| line.starts_with("INFO:")), "{}", wal);

    cleanup(&client, &config).await;
}

#[tokio::test]
#[ignore]
async fn test_publication_restricted_to_configured_tables() {
    init_tracing();
    let mut config = get_test_config();
    let id = std::process::id();
    let (t1, t2) = (format!("pub_t1_{}", id), format!("pub_t2_{}", id));
    config.replication.tables = vec![t2.clone(), t1.clone()];

    let client = admin_client(&config).await;
    cleanup(&client, &config).await;
    client
        .batch_execute(&format!(
            "CREATE TABLE {t1} (id int PRIMARY KEY); CREATE TABLE {t2} (id int PRIMARY KEY);"
        ))
        .await
        .unwrap();

    Setup::new(config.clone())
        .with_retry_policy(quick_retry())
        .run()
        .await
        .unwrap();

    let rows = client
        .query(
            "SELECT tablename::text FROM pg_publication_tables WHERE pubname = $1 ORDER BY 1",
            &[&config.replication.publication],
        )
        .await
        .unwrap();
    let published: Vec<String> = rows.iter().map(|r| r.get(0)).collect();
    assert_eq!(published, vec![t1.clone(), t2.clone()]);

    cleanup(&client, &config).await;
    client
        .batch_execute(&format!("DROP TABLE {t1}; DROP TABLE {t2};"))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn test_tables_without_primary_key_get_full_identity() {
    init_tracing();
    let config = get_test_config();
    let id = std::process::id();
    let (keyless, keyed) = (format!("keyless_{}", id), format!("keyed_{}", id));

    let client = admin_client(&config).await;
    client
        .batch_execute(&format!(
            "CREATE TABLE {keyless} (payload text); CREATE TABLE {keyed} (id int PRIMARY KEY);"
        ))
        .await
        .unwrap();

    let db = Database::connect_with_retry(&config, quick_retry()).await.unwrap();
    let candidates = tables::tables_without_primary_key(&db, TARGET_SCHEMA).await.unwrap();
    assert!(candidates.iter().any(|t| t.name == keyless));
    assert!(!candidates.iter().any(|t| t.name == keyed));

    let normalization = tables::normalize_replica_identity(&db, TARGET_SCHEMA).await.unwrap();
    assert!(normalization
        .action_report()
        .contains(&format!("Set REPLICA IDENTITY FULL for public.{}", keyless)));
    assert!(normalization
        .advisory_report()
        .contains(&format!("- public.{} (REPLICA IDENTITY FULL has been set)", keyless)));
    db.close().await.unwrap();

    let identity = |table: String| {
        let client = &client;
        async move {
            let row = client
                .query_one(
                    "SELECT relreplident::text FROM pg_class WHERE oid = $1::text::regclass",
                    &[&table],
                )
                .await
                .unwrap();
            row.get::<_, String>(0)
        }
    };
    assert_eq!(identity(keyless.clone()).await, "f");
    assert_eq!(identity(keyed.clone()).await, "d");

    client
        .batch_execute(&format!("DROP TABLE {keyless}; DROP TABLE {keyed};"))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn test_non_superuser_is_rejected() {
    init_tracing();
    let config = get_test_config();
    let client = admin_client(&config).await;
    let role = format!("plain_{}", std::process::id());
    client
        .batch_execute(&format!("CREATE ROLE {role} WITH LOGIN PASSWORD 'plain'"))
        .await
        .unwrap();

    let mut plain = config.clone();
    plain.postgres.user = role.clone();
    plain.postgres.password = "plain".to_string();

    let err = Setup::new(plain)
        .with_retry_policy(quick_retry())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, exoquic_pg_setup::Error::Authorization(_)));

    client
        .batch_execute(&format!("DROP ROLE {role}"))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore]
async fn test_failed_step_warning_carries_server_message() {
    init_tracing();
    let mut config = get_test_config();
    let missing = format!("missing_table_{}", std::process::id());
    config.replication.tables = vec![missing.clone()];

    let client = admin_client(&config).await;
    cleanup(&client, &config).await;

    let report = Setup::new(config.clone())
        .with_retry_policy(quick_retry())
        .run()
        .await
        .unwrap();

    let expected = format!("relation \"{}\" does not exist", missing);
    let warning = report
        .warnings()
        .iter()
        .find(|w| w.starts_with("Error creating publication"))
        .unwrap_or_else(|| panic!("no publication warning in {:?}", report.warnings()));
    assert!(warning.contains(&expected), "{}", warning);
    assert!(report.find("Publication").is_none());

    let err = exoquic_pg_setup::Error::from(
        client
            .batch_execute(&format!("SELECT * FROM {}", missing))
            .await
            .unwrap_err(),
    );
    assert!(err.to_string().contains(&expected), "{}", err);

    cleanup(&client, &config).await;
}
