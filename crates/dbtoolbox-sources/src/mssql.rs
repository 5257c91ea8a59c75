//! SQL Server connection pool.
//!
//! tiberius hands out single connections, so pooling is done with a
//! `deadpool` managed pool. Each connection runs over a tokio TCP stream
//! adapted to the `futures` I/O traits tiberius expects.

use std::time::Duration;

use dbtoolbox_core::config::{ConnectionPoolConfig, MsSqlConfig};
use deadpool::Runtime;
use deadpool::managed::{self, Metrics, PoolError, RecycleResult};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::{Result, SourceError};

pub type MsSqlClient = Client<Compat<TcpStream>>;
pub type MsSqlPool = managed::Pool<ConnectionManager>;

#[derive(Debug)]
pub struct ConnectionManager {
    config: Config,
}

impl ConnectionManager {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl managed::Manager for ConnectionManager {
    type Type = MsSqlClient;
    type Error = tiberius::error::Error;

    async fn create(&self) -> std::result::Result<MsSqlClient, tiberius::error::Error> {
        let tcp = TcpStream::connect(self.config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Client::connect(self.config.clone(), tcp.compat_write()).await
    }

    async fn recycle(&self, _conn: &mut MsSqlClient, _: &Metrics) -> RecycleResult<Self::Error> {
        // Broken connections surface as query errors on their next use.
        Ok(())
    }
}

/// tiberius connection settings for `config`.
pub fn client_config(config: &MsSqlConfig, port: u16) -> Config {
    let mut client = Config::new();
    client.host(&config.host);
    client.port(port);
    client.database(&config.database);
    client.application_name("dbtoolbox");
    client.authentication(AuthMethod::sql_server(
        &config.user,
        config.password.as_deref().unwrap_or_default(),
    ));
    client.encryption(if config.encrypt {
        EncryptionLevel::Required
    } else {
        EncryptionLevel::Off
    });
    if config.trust_server_certificate {
        client.trust_cert();
    }
    client
}

pub fn create_pool(name: &str, config: Config, settings: &ConnectionPoolConfig) -> Result<MsSqlPool> {
    let wait = Duration::from_secs(settings.acquire_timeout_seconds);
    MsSqlPool::builder(ConnectionManager::new(config))
        .max_size(settings.max_connections as usize)
        .wait_timeout(Some(wait))
        .create_timeout(Some(wait))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| SourceError::Config {
            name: name.to_string(),
            message: e.to_string(),
        })
}

pub fn acquire_error(error: PoolError<tiberius::error::Error>) -> SourceError {
    match error {
        PoolError::Backend(e) => SourceError::MsSql(e),
        other => SourceError::Acquire(other.to_string()),
    }
}
