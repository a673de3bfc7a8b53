//! Failures while bringing the service up: settings, database, media root,
//! listener and log subscriber.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database url is not configured; set `database.url` or pass --database-url")]
    MissingDatabaseUrl,
    #[error("failed to connect to the database")]
    Connect(#[source] sqlx::Error),
    #[error("failed to apply database migrations")]
    Migrate(#[source] sqlx::migrate::MigrateError),
    #[error("media directory `{}` is not usable", .path.display())]
    MediaRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to listen on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to install the tracing subscriber: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn media_root(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::MediaRoot {
            path: path.into(),
            source,
        }
    }

    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::io;

    use super::*;

    #[test]
    fn media_root_names_the_directory_and_keeps_the_cause() {
        let error = InfraError::media_root(
            "/srv/yatube/media",
            io::Error::new(io::ErrorKind::PermissionDenied, "read-only file system"),
        );
        assert_eq!(
            error.to_string(),
            "media directory `/srv/yatube/media` is not usable"
        );
        let cause = error.source().expect("io cause");
        assert_eq!(cause.to_string(), "read-only file system");
    }

    #[test]
    fn bind_failures_report_the_address() {
        let addr: SocketAddr = "127.0.0.1:8000".parse().expect("addr");
        let error = InfraError::bind(addr, io::Error::from(io::ErrorKind::AddrInUse));
        assert_eq!(error.to_string(), "failed to listen on 127.0.0.1:8000");
    }
}
