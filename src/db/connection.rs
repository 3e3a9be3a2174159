use anyhow::{Context, Result};
use postgres_native_tls::MakeTlsConnector;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::config::{Host, SslMode};
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{Client, Config, NoTls, Socket};

/// Database the workloads are usually run against.
pub const DEFAULT_DATABASE: &str = "imdb";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// libpq-style `key=value` connect string
    pub connect_string: String,
    /// Accept invalid/self-signed certificates when TLS is used.
    pub accept_invalid_certs: bool,
    /// Optional path to a custom CA certificate file (PEM format).
    pub ca_cert_path: Option<PathBuf>,
}

impl ConnectionConfig {
    pub fn new(connect_string: impl Into<String>) -> Self {
        Self {
            connect_string: connect_string.into(),
            accept_invalid_certs: false,
            ca_cert_path: None,
        }
    }

    /// The local IMDB database, connecting as the current login user.
    pub fn local_default() -> Self {
        Self::new(default_connect_string(&login_user()))
    }

    pub fn parse(&self) -> Result<Config> {
        Config::from_str(&self.connect_string)
            .with_context(|| format!("Invalid connect string: {:?}", self.connect_string))
    }

    pub fn display_string(&self) -> String {
        match self.parse() {
            Ok(config) => {
                let host = config
                    .get_hosts()
                    .first()
                    .map(|h| match h {
                        Host::Tcp(name) => name.clone(),
                        #[allow(unreachable_patterns)]
                        _ => String::from("localhost"),
                    })
                    .unwrap_or_else(|| String::from("localhost"));
                format!(
                    "{}@{}/{}",
                    config.get_user().unwrap_or("postgres"),
                    host,
                    config.get_dbname().unwrap_or(DEFAULT_DATABASE)
                )
            }
            Err(_) => self.connect_string.clone(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::local_default()
    }
}

pub fn default_connect_string(user: &str) -> String {
    format!("dbname={} user={} host=localhost", DEFAULT_DATABASE, user)
}

fn login_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| String::from("postgres"))
}

/// Open a client and spawn its connection driver onto the runtime.
pub async fn create_client(config: &ConnectionConfig) -> Result<Client> {
    let mut pg_config = config.parse()?;
    if pg_config.get_password().is_none() {
        if let Ok(pw) = std::env::var("PGPASSWORD") {
            pg_config.password(pw);
        }
    }

    let client = match pg_config.get_ssl_mode() {
        SslMode::Disable => connect_with(&pg_config, NoTls).await?,
        _ => connect_with(&pg_config, build_tls_connector(config)?).await?,
    };

    tracing::info!("Connected to {}", config.display_string());
    Ok(client)
}

async fn connect_with<T>(pg_config: &Config, tls: T) -> Result<Client>
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
{
    let (client, connection) = tokio::time::timeout(CONNECT_TIMEOUT, pg_config.connect(tls))
        .await
        .map_err(|_| anyhow::anyhow!("Connection timed out after {}s", CONNECT_TIMEOUT.as_secs()))?
        .context("Failed to connect to PostgreSQL")?;

    // The driver owns the socket; the run ends if it does.
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });
    Ok(client)
}

fn build_tls_connector(config: &ConnectionConfig) -> Result<MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();

    if config.accept_invalid_certs {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    } else if let Some(ca_path) = &config.ca_cert_path {
        let pem = std::fs::read(ca_path)
            .with_context(|| format!("Failed to read CA certificate file: {}", ca_path.display()))?;
        let cert = native_tls::Certificate::from_pem(&pem)
            .context("Failed to parse CA certificate")?;
        builder.add_root_certificate(cert);
    }

    let connector = builder.build().context("Failed to build TLS connector")?;
    Ok(MakeTlsConnector::new(connector))
}
