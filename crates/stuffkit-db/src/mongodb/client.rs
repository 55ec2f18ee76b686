use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::options::{
    ClientOptions, Credential, ReadPreference, SelectionCriteria, ServerAddress,
};
use mongodb::{Client, Database};
use serde::Deserialize;
use stuffkit_core::config::{env_list, env_opt, env_or};

use crate::error::{DbError, DbResult};

/// Connection settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub auth_source: String,
    pub username: String,
    pub password: String,
    /// Replica set name; empty means standalone
    pub opts: String,
    pub database: String,
    pub hosts: Vec<String>,
    /// `"secondary"` routes reads to secondaries, anything else uses the driver default
    pub read_pref: String,
}

impl MongoConfig {
    /// Read `MONGODB_*` variables; `MONGODB_HOSTS` is comma-separated.
    pub fn from_env() -> Self {
        Self {
            auth_source: env_or("MONGODB_AUTH_SOURCE", ""),
            username: env_or("MONGODB_USERNAME", ""),
            password: env_or("MONGODB_PASSWORD", ""),
            opts: env_or("MONGODB_REPLICA_SET", ""),
            database: env_or("MONGODB_DATABASE", ""),
            hosts: env_list("MONGODB_HOSTS"),
            read_pref: env_opt("MONGODB_READ_PREF").unwrap_or_default(),
        }
    }

    /// Translate into driver options. Does not touch the network.
    pub fn client_options(&self) -> DbResult<ClientOptions> {
        let mut options = ClientOptions::default();

        if !self.hosts.is_empty() {
            options.hosts = self
                .hosts
                .iter()
                .map(|h| ServerAddress::parse(h))
                .collect::<Result<Vec<_>, _>>()?;
        }

        if !self.opts.is_empty() {
            options.repl_set_name = Some(self.opts.clone());
        }

        if !self.username.is_empty() && !self.password.is_empty() {
            let mut credential = Credential::default();
            credential.username = Some(self.username.clone());
            credential.password = Some(self.password.clone());
            if !self.auth_source.is_empty() {
                credential.source = Some(self.auth_source.clone());
            }
            options.credential = Some(credential);
        }

        if self.read_pref == "secondary" {
            options.selection_criteria = Some(SelectionCriteria::ReadPreference(
                ReadPreference::Secondary { options: None },
            ));
        }

        Ok(options)
    }
}

/// Driver client plus the configured database
#[derive(Clone, Debug)]
pub struct MongoClient {
    client: Client,
    db: Database,
}

impl MongoClient {
    /// Build the client. The driver connects lazily, so an unreachable
    /// cluster surfaces on the first operation (or [`MongoClient::ping`]).
    pub fn new(conf: &MongoConfig) -> DbResult<Self> {
        if conf.database.is_empty() {
            return Err(DbError::Config("MongoDB database name must be set".to_string()));
        }
        let client = Client::with_options(conf.client_options()?)?;
        let db = client.database(&conf.database);

        tracing::debug!(
            hosts = ?conf.hosts,
            database = %conf.database,
            replica_set = %conf.opts,
            "MongoDB client created"
        );

        Ok(Self { client, db })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn ping(&self) -> DbResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    pub fn generate_id(&self) -> ObjectId {
        ObjectId::new()
    }

    /// Close all pooled connections. Consumes the client; clones sharing
    /// the same pool stop working too.
    pub async fn disconnect(self) -> DbResult<()> {
        self.client.shutdown().await;
        tracing::info!("MongoDB disconnected successfully");
        Ok(())
    }
}
