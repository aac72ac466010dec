use tracing::{error, info, warn};

use crate::postgres::{
    provision, settings, tables, ConnectionInfo, Database, RetryPolicy, TARGET_SCHEMA,
};
use crate::registration;
use crate::report::Report;
use crate::{Config, Result};

/// One pass over the server: reconcile settings, provision, normalize,
/// register. Fatal errors are returned; everything else lands in the report.
pub struct Setup {
    config: Config,
    retry: RetryPolicy,
}

impl Setup {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn run(&self) -> Result<Report> {
        self.config.validate()?;

        let db = Database::connect_with_retry(&self.config, self.retry).await?;
        let result = self.provision(&db).await;
        db.close().await?;
        result
    }

    async fn provision(&self, db: &Database) -> Result<Report> {
        db.ensure_superuser().await?;

        let config = &self.config;
        let mut report = Report::new();

        let wal = settings::reconcile_wal(db).await;
        record(&mut report, "WAL Configuration", "configuring WAL settings", wal)?;

        let schema = provision::ensure_helper_schema(db).await;
        record(&mut report, "Helper Schema", "creating Exoquic schema", schema)?;

        let user = provision::ensure_replication_user(
            db,
            &config.replication.user,
            &config.replication.password,
        )
        .await;
        record(&mut report, "Replication User", "creating replication user", user)?;

        let publication = provision::recreate_publication(
            db,
            &config.replication.publication,
            &config.replication.tables,
        )
        .await;
        record(&mut report, "Publication", "creating publication", publication)?;

        let slot = provision::ensure_replication_slot(db, &config.replication.slot_name).await;
        record(&mut report, "Replication Slot", "creating replication slot", slot)?;

        match tables::normalize_replica_identity(db, TARGET_SCHEMA).await {
            Ok(normalization) => {
                report.section("Replica Identity", normalization.action_report());
                report.section("Tables without primary keys", normalization.advisory_report());
            }
            Err(e) => record(&mut report, "Replica Identity", "setting REPLICA IDENTITY", Err(e))?,
        }

        let info = ConnectionInfo::gather(db, config).await.map(|info| info.render());
        record(
            &mut report,
            "Exoquic Connection Information",
            "generating connection info",
            info,
        )?;

        let cloud = registration::register_with_cloud(config).await;
        record(
            &mut report,
            "Exoquic Cloud Registration",
            "registering with Exoquic cloud",
            cloud,
        )?;

        info!(
            sections = report.sections().len(),
            warnings = report.warnings().len(),
            "Configuration complete"
        );
        Ok(report)
    }
}

/// Adds a step's outcome to the report. Fatal errors are handed back to the
/// caller; any other error becomes a warning and the run continues.
fn record(report: &mut Report, title: &str, action: &str, outcome: Result<String>) -> Result<()> {
    match outcome {
        Ok(body) => {
            report.section(title, body);
            Ok(())
        }
        Err(e) if e.is_fatal() => {
            error!("Error {}: {}", action, e);
            Err(e)
        }
        Err(e) => {
            warn!("Error {}: {}", action, e);
            report.warn(format!("Error {}: {}", action, e));
            Ok(())
        }
    }
}
