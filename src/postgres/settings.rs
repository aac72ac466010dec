use tracing::{info, warn};

use super::{sql, Database};
use crate::error::postgres_message;
use crate::{Error, Result};

pub const REQUIRED_WAL_LEVEL: &str = "logical";
pub const MIN_REPLICATION_SLOTS: i64 = 5;
pub const MIN_WAL_SENDERS: i64 = 5;

/// Current values of the WAL-related server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalSnapshot {
    pub wal_level: String,
    pub max_replication_slots: i64,
    pub max_wal_senders: i64,
}

/// Outcome of comparing one setting against its threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalCheck {
    Satisfied(String),
    Change {
        parameter: &'static str,
        from: String,
        to: String,
    },
}

impl WalCheck {
    pub fn is_change(&self) -> bool {
        matches!(self, WalCheck::Change { .. })
    }
}

impl WalSnapshot {
    pub async fn read(db: &Database) -> Result<Self> {
        let wal_level = db.setting("wal_level").await?;
        let max_replication_slots = parse_count(
            "max_replication_slots",
            &db.setting("max_replication_slots").await?,
        )?;
        let max_wal_senders = parse_count("max_wal_senders", &db.setting("max_wal_senders").await?)?;

        Ok(Self {
            wal_level,
            max_replication_slots,
            max_wal_senders,
        })
    }

    pub fn plan(&self) -> Vec<WalCheck> {
        let mut checks = Vec::with_capacity(3);

        if self.wal_level == REQUIRED_WAL_LEVEL {
            checks.push(WalCheck::Satisfied(format!(
                "wal_level is correctly set to {}.",
                REQUIRED_WAL_LEVEL
            )));
        } else {
            checks.push(WalCheck::Change {
                parameter: "wal_level",
                from: format!("'{}'", self.wal_level),
                to: REQUIRED_WAL_LEVEL.to_string(),
            });
        }

        for (parameter, current, minimum) in [
            ("max_replication_slots", self.max_replication_slots, MIN_REPLICATION_SLOTS),
            ("max_wal_senders", self.max_wal_senders, MIN_WAL_SENDERS),
        ] {
            if current < minimum {
                checks.push(WalCheck::Change {
                    parameter,
                    from: current.to_string(),
                    to: minimum.to_string(),
                });
            } else {
                checks.push(WalCheck::Satisfied(format!(
                    "{} is sufficient: {}.",
                    parameter, current
                )));
            }
        }

        checks
    }
}

fn parse_count(parameter: &str, value: &str) -> Result<i64> {
    value.trim().parse::<i64>().map_err(|_| Error::InvalidSetting {
        parameter: parameter.to_string(),
        value: value.to_string(),
    })
}

/// Accumulates the WAL section of the report.
#[derive(Debug, Default)]
pub struct WalReport {
    lines: Vec<String>,
    changed: bool,
}

impl WalReport {
    pub fn satisfied(&mut self, message: &str) {
        self.lines.push(format!("INFO: {}", message));
    }

    pub fn changed(&mut self, parameter: &str, from: &str, to: &str) {
        self.lines.push(format!("CHANGED: {} from {} to {}.", parameter, from, to));
        self.changed = true;
    }

    pub fn failed(&mut self, parameter: &str, to: &str, error: &str) {
        self.lines.push(format!("ERROR: Failed to set {} to {}: {}", parameter, to, error));
    }

    pub fn needs_reload(&self) -> bool {
        self.changed
    }

    /// Renders the section. `reload` is the outcome of the configuration
    /// reload, present only when a change was applied.
    pub fn finish(self, reload: Option<std::result::Result<(), String>>) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }

        if let Some(reload) = reload {
            match reload {
                Ok(()) => out.push_str("\nINFO: PostgreSQL configuration reloaded.\n"),
                Err(e) => out.push_str(&format!(
                    "ERROR: Failed to reload PostgreSQL configuration: {}\n",
                    e
                )),
            }
            out.push_str("\nWARNING: Some changes require a server restart to take effect.\n");
            out.push_str("To restart PostgreSQL, you may need to run:\n");
            out.push_str("  - For systemd: sudo systemctl restart postgresql\n");
            out.push_str("  - For Docker: docker restart <container_name>\n");
            out.push_str("  - For Railway.app: Redeploy the PostgreSQL service\n");
        }

        out
    }
}

/// Brings `wal_level`, `max_replication_slots` and `max_wal_senders` up to
/// the values logical replication needs.
///
/// A failing `ALTER SYSTEM` is recorded as an `ERROR` line and the other
/// settings are still checked. Reading the settings is the only failure
/// that fails the whole step.
pub async fn reconcile_wal(db: &Database) -> Result<String> {
    let snapshot = WalSnapshot::read(db).await?;
    info!(
        wal_level = %snapshot.wal_level,
        max_replication_slots = snapshot.max_replication_slots,
        max_wal_senders = snapshot.max_wal_senders,
        "Current WAL settings"
    );

    let mut report = WalReport::default();
    for check in snapshot.plan() {
        match check {
            WalCheck::Satisfied(message) => report.satisfied(&message),
            WalCheck::Change { parameter, from, to } => {
                match db.client().batch_execute(&sql::alter_system(parameter, &to)).await {
                    Ok(()) => {
                        info!("Changed {} from {} to {}", parameter, from, to);
                        report.changed(parameter, &from, &to);
                    }
                    Err(e) => {
                        let message = postgres_message(&e);
                        warn!("Failed to set {} to {}: {}", parameter, to, message);
                        report.failed(parameter, &to, &message);
                    }
                }
            }
        }
    }

    let reload = if report.needs_reload() {
        let result = db
            .client()
            .simple_query("SELECT pg_reload_conf()")
            .await
            .map(|_| ())
            .map_err(|e| postgres_message(&e));
        warn!("WAL settings changed; a server restart is required for them to take effect");
        Some(result)
    } else {
        None
    };

    Ok(report.finish(reload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(level: &str, slots: i64, senders: i64) -> WalSnapshot {
        WalSnapshot {
            wal_level: level.to_string(),
            max_replication_slots: slots,
            max_wal_senders: senders,
        }
    }

    #[test]
    fn test_settings_at_thresholds_need_no_changes() {
        let plan = snapshot("logical", 5, 5).plan();
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|c| !c.is_change()));

        let mut report = WalReport::default();
        for check in plan {
            if let WalCheck::Satisfied(message) = check {
                report.satisfied(&message);
            }
        }
        assert!(!report.needs_reload());

        let text = report.finish(None);
        assert_eq!(
            text,
            "INFO: wal_level is correctly set to logical.\n\
             INFO: max_replication_slots is sufficient: 5.\n\
             INFO: max_wal_senders is sufficient: 5.\n"
        );
    }

    #[test]
    fn test_settings_above_thresholds() {
        let plan = snapshot("logical", 10, 20).plan();
        assert!(plan.iter().all(|c| !c.is_change()));
        assert_eq!(
            plan[2],
            WalCheck::Satisfied("max_wal_senders is sufficient: 20.".to_string())
        );
    }

    #[test]
    fn test_settings_below_thresholds() {
        let plan = snapshot("replica", 4, 0).plan();
        assert!(plan.iter().all(WalCheck::is_change));
        assert_eq!(
            plan[0],
            WalCheck::Change {
                parameter: "wal_level",
                from: "'replica'".to_string(),
                to: "logical".to_string(),
            }
        );
        assert_eq!(
            plan[1],
            WalCheck::Change {
                parameter: "max_replication_slots",
                from: "4".to_string(),
                to: "5".to_string(),
            }
        );
    }

    #[test]
    fn test_report_with_partial_failure() {
        let mut report = WalReport::default();
        report.changed("wal_level", "'replica'", "logical");
        report.failed("max_replication_slots", "5", "permission denied");
        report.satisfied("max_wal_senders is sufficient: 10.");
        assert!(report.needs_reload());

        let text = report.finish(Some(Ok(())));
        assert!(text.starts_with("CHANGED: wal_level from 'replica' to logical.\n"));
        assert!(text.contains("ERROR: Failed to set max_replication_slots to 5: permission denied\n"));
        assert!(text.contains("INFO: max_wal_senders is sufficient: 10.\n"));
        assert!(text.contains("INFO: PostgreSQL configuration reloaded."));
        assert!(text.contains("WARNING: Some changes require a server restart"));
    }

    #[test]
    fn test_report_with_failed_reload() {
        let mut report = WalReport::default();
        report.changed("max_wal_senders", "2", "5");
        let text = report.finish(Some(Err("boom".to_string())));

        assert!(text.contains("ERROR: Failed to reload PostgreSQL configuration: boom"));
        assert!(!text.contains("configuration reloaded"));
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("max_wal_senders", "10").unwrap(), 10);
        assert!(parse_count("max_wal_senders", "ten").is_err());
    }
}
