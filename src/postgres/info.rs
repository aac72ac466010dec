use super::Database;
use crate::{Config, Result};

/// Connection details a CDC consumer needs to attach to this server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub slot_name: String,
    pub publication: String,
}

impl ConnectionInfo {
    pub async fn gather(db: &Database, config: &Config) -> Result<Self> {
        let listen_addresses = db.setting("listen_addresses").await?;
        let port = db.setting("port").await?;
        Ok(Self::new(config, &listen_addresses, port))
    }

    pub fn new(config: &Config, listen_addresses: &str, port: String) -> Self {
        Self {
            host: reachable_host(listen_addresses, &config.postgres.host),
            port,
            database: config.postgres.database.clone(),
            username: config.replication.user.clone(),
            slot_name: config.replication.slot_name.clone(),
            publication: config.replication.publication.clone(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Host: {}\n\
             Port: {}\n\
             Database: {}\n\
             Username: {}\n\
             Replication Slot: {}\n\
             Publication: {}\n\
             \n\
             Use these details to configure your Exoquic agent.\n",
            self.host, self.port, self.database, self.username, self.slot_name, self.publication
        )
    }
}

/// A wildcard bind address or a list of addresses says nothing about how
/// clients reach the server, so the host we connected to is used instead.
fn reachable_host(listen_addresses: &str, connect_host: &str) -> String {
    let listen = listen_addresses.trim();
    let unusable = listen.is_empty()
        || listen.contains(',')
        || matches!(listen, "*" | "0.0.0.0" | "::");
    if unusable {
        connect_host.to_string()
    } else {
        listen.to_string()
    }
}
