//! Existence-gated provisioning of the replication role, publication,
//! replication slot and helper schema.

use tracing::{info, warn};

use super::{sql, Database};
use crate::error::postgres_message;
use crate::{Error, Result};

/// Schema whose tables the replication role may read and the table
/// normalizer inspects.
pub const TARGET_SCHEMA: &str = "public";

/// Namespace holding the helper objects.
pub const HELPER_SCHEMA: &str = "exoquic";

/// Logical decoding plugin used for the replication slot.
pub const OUTPUT_PLUGIN: &str = "pgoutput";

const ROLE_STEP: &str = "replication user";

async fn exists(db: &Database, query: &str, name: &str) -> Result<bool> {
    let row = db.client().query_one(query, &[&name]).await?;
    Ok(row.get(0))
}

/// Creates the replication role if it is missing and (re)applies its grants.
///
/// Every failure here is returned as [`Error::Provisioning`], which stops the
/// run: the publication and slot are useless without a working role.
pub async fn ensure_replication_user(db: &Database, user: &str, password: &str) -> Result<String> {
    let mut result = String::new();

    let user_exists = exists(
        db,
        "SELECT EXISTS(SELECT 1 FROM pg_roles WHERE rolname = $1)",
        user,
    )
    .await
    .map_err(|e| Error::provisioning(ROLE_STEP, format!("failed to check if user exists: {}", e)))?;

    if user_exists {
        info!(user, "Replication user already exists");
        result.push_str(&format!("Replication user {} already exists.\n", user));
    } else {
        db.client()
            .batch_execute(&sql::create_role(user, password))
            .await
            .map_err(|e| {
                let message = format!("failed to create replication user: {}", postgres_message(&e));
                Error::provisioning(ROLE_STEP, message)
            })?;
        info!(user, "Created replication user");
        result.push_str(&format!("Created replication user {}.\n", user));
    }

    for grant in sql::role_grants(TARGET_SCHEMA, user) {
        db.client().batch_execute(&grant).await.map_err(|e| {
            let message = format!("failed to apply '{}': {}", grant, postgres_message(&e));
            Error::provisioning(ROLE_STEP, message)
        })?;
    }

    result.push_str(&format!(
        "Granted SELECT permissions to {} on all tables.\n",
        user
    ));
    Ok(result)
}

/// Drops the publication if it exists, then creates it for the configured
/// tables (or all tables when the list is empty).
pub async fn recreate_publication(db: &Database, name: &str, tables: &[String]) -> Result<String> {
    let mut result = String::new();

    let publication_exists = exists(
        db,
        "SELECT EXISTS(SELECT 1 FROM pg_publication WHERE pubname = $1)",
        name,
    )
    .await?;

    if publication_exists {
        result.push_str(&format!("Publication {} already exists.\n", name));
        warn!(publication = name, "Dropping existing publication to recreate it");
        db.client().batch_execute(&sql::drop_publication(name)).await?;
        result.push_str("Dropped existing publication to recreate it.\n");
    }

    db.client()
        .batch_execute(&sql::create_publication(name, tables))
        .await?;

    if tables.is_empty() {
        info!(publication = name, "Created publication for all tables");
        result.push_str(&format!("Created publication {} for all tables.\n", name));
    } else {
        info!(publication = name, tables = ?tables, "Created publication");
        result.push_str(&format!(
            "Created publication {} for tables: {}.\n",
            name,
            tables.join(", ")
        ));
    }

    Ok(result)
}

/// Creates the logical replication slot if it is missing. An existing slot
/// is never dropped.
pub async fn ensure_replication_slot(db: &Database, slot_name: &str) -> Result<String> {
    let slot_exists = exists(
        db,
        "SELECT EXISTS(SELECT 1 FROM pg_replication_slots WHERE slot_name = $1)",
        slot_name,
    )
    .await?;

    if slot_exists {
        info!(slot = slot_name, "Replication slot already exists");
        return Ok(format!("Replication slot {} already exists.\n", slot_name));
    }

    let row = db
        .client()
        .query_one(
            "SELECT lsn::text FROM pg_create_logical_replication_slot($1, $2)",
            &[&slot_name, &OUTPUT_PLUGIN],
        )
        .await?;
    let lsn: Option<String> = row.get(0);
    info!(slot = slot_name, lsn = ?lsn, "Created logical replication slot");

    Ok(format!(
        "Created logical replication slot {}.\n",
        slot_name
    ))
}

/// Ensures the helper schema exists and (re)creates its `status` view.
pub async fn ensure_helper_schema(db: &Database) -> Result<String> {
    let mut result = String::new();

    let schema_exists = exists(
        db,
        "SELECT EXISTS(SELECT 1 FROM pg_namespace WHERE nspname = $1)",
        HELPER_SCHEMA,
    )
    .await?;

    if schema_exists {
        result.push_str(&format!("Schema {} already exists.\n", HELPER_SCHEMA));
    } else {
        db.client()
            .batch_execute(&sql::create_schema(HELPER_SCHEMA))
            .await?;
        info!(schema = HELPER_SCHEMA, "Created helper schema");
        result.push_str(&format!("Created schema {}.\n", HELPER_SCHEMA));
    }

    db.client()
        .batch_execute(&sql::create_status_view(HELPER_SCHEMA))
        .await?;
    result.push_str(&format!("Refreshed status view {}.status.\n", HELPER_SCHEMA));

    Ok(result)
}
