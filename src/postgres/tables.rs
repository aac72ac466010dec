use std::fmt;
use tracing::{info, warn};

use super::{sql, Database};
use crate::error::postgres_message;
use crate::Result;

const TABLES_WITHOUT_PRIMARY_KEY: &str = "
    SELECT n.nspname, c.relname
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE c.relkind = 'r'
        AND n.nspname = $1
        AND NOT EXISTS (
            SELECT 1 FROM pg_constraint
            WHERE conrelid = c.oid AND contype = 'p'
        )
    ORDER BY n.nspname, c.relname";

/// An ordinary table identified by schema and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityOutcome {
    Applied,
    Failed(String),
}

/// Per-table results of one normalization pass. Both the action report and
/// the advisory are rendered from the same list.
#[derive(Debug, Clone, Default)]
pub struct Normalization {
    pub tables: Vec<(TableRef, IdentityOutcome)>,
}

impl Normalization {
    pub fn action_report(&self) -> String {
        let mut out = String::new();

        for (table, outcome) in &self.tables {
            match outcome {
                IdentityOutcome::Applied => {
                    out.push_str(&format!("Set REPLICA IDENTITY FULL for {}\n", table));
                }
                IdentityOutcome::Failed(e) => {
                    out.push_str(&format!(
                        "Failed to set REPLICA IDENTITY FULL for {}: {}\n",
                        table, e
                    ));
                }
            }
        }

        if !self
            .tables
            .iter()
            .any(|(_, outcome)| *outcome == IdentityOutcome::Applied)
        {
            out.push_str("No tables required REPLICA IDENTITY FULL setting.\n");
        }

        out
    }

    pub fn advisory_report(&self) -> String {
        if self.tables.is_empty() {
            return "No tables without primary keys found.\n".to_string();
        }

        let mut out = String::new();
        for (table, outcome) in &self.tables {
            match outcome {
                IdentityOutcome::Applied => {
                    out.push_str(&format!("- {} (REPLICA IDENTITY FULL has been set)\n", table));
                }
                IdentityOutcome::Failed(_) => {
                    out.push_str(&format!(
                        "- {} (REPLICA IDENTITY FULL could not be set)\n",
                        table
                    ));
                }
            }
        }

        let failed = self
            .tables
            .iter()
            .filter(|(_, outcome)| matches!(outcome, IdentityOutcome::Failed(_)))
            .count();

        if failed == 0 {
            out.push_str("\nNote: For tables without primary keys, REPLICA IDENTITY FULL has been set\n");
            out.push_str("to ensure all column values are included in change events. For better\n");
            out.push_str("performance, consider adding primary keys to these tables.\n");
        } else {
            out.push_str(&format!(
                "\nNote: REPLICA IDENTITY FULL could not be set on {} of {} tables without\n",
                failed,
                self.tables.len()
            ));
            out.push_str("primary keys. Update and delete events for those tables will not carry\n");
            out.push_str("their old column values. Add primary keys to these tables, or set\n");
            out.push_str("REPLICA IDENTITY FULL on them manually.\n");
        }
        out
    }
}

pub async fn tables_without_primary_key(db: &Database, schema: &str) -> Result<Vec<TableRef>> {
    let rows = db
        .client()
        .query(TABLES_WITHOUT_PRIMARY_KEY, &[&schema])
        .await?;

    Ok(rows
        .iter()
        .map(|row| TableRef {
            schema: row.get(0),
            name: row.get(1),
        })
        .collect())
}

/// Sets `REPLICA IDENTITY FULL` on every table in `schema` that has no
/// primary key. A failure on one table does not stop the others.
pub async fn normalize_replica_identity(db: &Database, schema: &str) -> Result<Normalization> {
    let tables = tables_without_primary_key(db, schema).await?;
    let mut normalization = Normalization::default();

    for table in tables {
        let statement = sql::replica_identity_full(&table.schema, &table.name);
        let outcome = match db.client().batch_execute(&statement).await {
            Ok(()) => {
                info!(table = %table, "Set REPLICA IDENTITY FULL");
                IdentityOutcome::Applied
            }
            Err(e) => {
                let message = postgres_message(&e);
                warn!(table = %table, "Failed to set REPLICA IDENTITY FULL: {}", message);
                IdentityOutcome::Failed(message)
            }
        };
        normalization.tables.push((table, outcome));
    }

    Ok(normalization)
}
