#![allow(dead_code)]

use exoquic_pg_setup::Config;
use std::env;
use tokio_postgres::{Client, NoTls};

/// Builds a configuration for a throwaway run against the `TEST_PG_*` database.
pub fn get_test_config() -> Config {
    let var = |key: &str, default: &str| env::var(key).unwrap_or_else(|_| default.to_string());
    let id = std::process::id();

    let source = [
        ("PGHOST", var("TEST_PG_HOST", "localhost")),
        ("PGPORT", var("TEST_PG_PORT", "5432")),
        ("PGUSER", var("TEST_PG_USERNAME", "postgres")),
        ("PGPASSWORD", var("TEST_PG_PASSWORD", "postgres")),
        ("PGDATABASE", var("TEST_PG_DATABASE", "postgres")),
        ("EXOQUIC_REPLICATION_USER", format!("test_replication_{}", id)),
        ("EXOQUIC_REPLICATION_PASSWORD", "test_replication_password".to_string()),
        ("EXOQUIC_PUBLICATION_NAME", format!("test_publication_{}", id)),
        ("EXOQUIC_SLOT_NAME", format!("test_slot_{}", id)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    Config::from_source(source).expect("test configuration should load")
}

/// Opens a plain admin connection for arranging and inspecting test state.
pub async fn admin_client(config: &Config) -> Client {
    let (client, connection) = config
        .pg_config()
        .connect(NoTls)
        .await
        .expect("test database should be reachable");

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("Connection error: {}", e);
        }
    });

    client
}

/// Removes the objects a run creates for `config`.
pub async fn cleanup(client: &Client, config: &Config) {
    client
        .execute(
            "SELECT pg_drop_replication_slot(slot_name) FROM pg_replication_slots WHERE slot_name = $1",
            &[&config.replication.slot_name],
        )
        .await
        .ok();

    let publication = &config.replication.publication;
    let user = &config.replication.user;
    client
        .batch_execute(&format!(
            "DROP PUBLICATION IF EXISTS \"{publication}\";
             DROP OWNED BY \"{user}\";
             DROP ROLE IF EXISTS \"{user}\";"
        ))
        .await
        .ok();
}
