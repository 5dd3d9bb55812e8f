//! SFTP delivery backend.

use async_trait::async_trait;
use ssh2::{ErrorCode, RenameFlags, Session, Sftp};
use std::fs::File;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::{DeliveryClient, DeliveryError, DeliveryReceipt};
use crate::config::SftpConfig;

/// `LIBSSH2_FX_NO_SUCH_FILE`
const SFTP_NO_SUCH_FILE: i32 = 2;

/// Suffix of uploads in progress; renamed away once the copy is complete.
const STAGING_SUFFIX: &str = ".part";

/// Uploads archives with password-authenticated SFTP.
///
/// ssh2 is blocking; every operation opens its own session on a blocking
/// thread and closes it when done.
pub struct SftpDelivery {
    config: SftpConfig,
}

impl SftpDelivery {
    pub fn new(config: SftpConfig) -> Self {
        Self { config }
    }

    fn remote_path(config: &SftpConfig, file_name: &str) -> String {
        format!("{}/{}", config.remote_dir.trim_end_matches('/'), file_name)
    }

    fn staging_path(remote: &str) -> String {
        format!("{}{}", remote, STAGING_SUFFIX)
    }

    fn open_session(config: &SftpConfig) -> Result<Session, DeliveryError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| DeliveryError::Unreachable(format!("{}: {}", config.host, e)))?
            .next()
            .ok_or_else(|| {
                DeliveryError::Unreachable(format!("{} did not resolve", config.host))
            })?;

        let tcp = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| DeliveryError::Unreachable(format!("{}: {}", addr, e)))?;

        let mut session =
            Session::new().map_err(|e| DeliveryError::Unreachable(e.to_string()))?;
        session.set_timeout(timeout.as_millis() as u32);
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| DeliveryError::Unreachable(format!("SSH handshake failed: {}", e)))?;
        session
            .userauth_password(&config.user, &config.password)
            .map_err(|e| DeliveryError::Authentication(e.to_string()))?;
        if !session.authenticated() {
            return Err(DeliveryError::Authentication(format!(
                "server rejected user {}",
                config.user
            )));
        }
        Ok(session)
    }

    fn upload(config: &SftpConfig, archive: &Path) -> Result<DeliveryReceipt, DeliveryError> {
        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DeliveryError::ArchiveMissing {
                path: archive.to_path_buf(),
            })?;
        let mut local = File::open(archive).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DeliveryError::ArchiveMissing {
                path: archive.to_path_buf(),
            },
            _ => DeliveryError::Io(e),
        })?;

        let remote = Self::remote_path(config, file_name);
        let transfer_failed = |reason: String| DeliveryError::Transfer {
            path: archive.to_path_buf(),
            reason,
        };

        let session = Self::open_session(config)?;
        let sftp = session.sftp().map_err(|e| transfer_failed(e.to_string()))?;
        let staging = Self::staging_path(&remote);

        let copied = Self::copy_to(&sftp, &mut local, &staging)
            .and_then(|bytes| Self::publish(&sftp, &staging, &remote).map(|()| bytes));
        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(reason) => {
                if let Err(e) = sftp.unlink(Path::new(&staging)) {
                    debug!(staging = %staging, error = %e, "Could not remove staged upload");
                }
                return Err(transfer_failed(reason));
            }
        };

        Ok(DeliveryReceipt {
            remote_path: remote,
            bytes,
        })
    }

    /// Copies into `staging`; the remote handle is closed before returning.
    fn copy_to(sftp: &Sftp, local: &mut File, staging: &str) -> Result<u64, String> {
        let mut remote_file = sftp
            .create(Path::new(staging))
            .map_err(|e| format!("cannot create {}: {}", staging, e))?;
        io::copy(local, &mut remote_file).map_err(|e| e.to_string())
    }

    /// Moves a finished upload to its final name, replacing an older copy.
    fn publish(sftp: &Sftp, staging: &str, remote: &str) -> Result<(), String> {
        let flags = Some(RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE);
        if sftp
            .rename(Path::new(staging), Path::new(remote), flags)
            .is_ok()
        {
            return Ok(());
        }
        // SFTPv3 servers ignore the flags and refuse to replace an existing file.
        match sftp.unlink(Path::new(remote)) {
            Ok(()) => {}
            Err(e) if matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) => {}
            Err(e) => return Err(format!("cannot replace {}: {}", remote, e)),
        }
        sftp.rename(Path::new(staging), Path::new(remote), flags)
            .map_err(|e| format!("cannot rename {} to {}: {}", staging, remote, e))
    }

    fn stat(config: &SftpConfig, file_name: &str) -> Result<bool, DeliveryError> {
        let session = Self::open_session(config)?;
        let sftp = session
            .sftp()
            .map_err(|e| DeliveryError::Unreachable(e.to_string()))?;
        let remote = PathBuf::from(Self::remote_path(config, file_name));
        match sftp.stat(&remote) {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) => Ok(false),
            Err(e) => Err(DeliveryError::Transfer {
                path: remote,
                reason: e.to_string(),
            }),
        }
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, DeliveryError>
    where
        T: Send + 'static,
        F: FnOnce(SftpConfig) -> Result<T, DeliveryError> + Send + 'static,
    {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || op(config))
            .await
            .map_err(|e| DeliveryError::Unreachable(format!("SFTP task failed: {}", e)))?
    }
}

#[async_trait]
impl DeliveryClient for SftpDelivery {
    fn name(&self) -> &str {
        "sftp"
    }

    async fn probe(&self) -> Result<(), DeliveryError> {
        debug!(host = %self.config.host, port = self.config.port, "Probing SFTP server");
        self.blocking(|config| Self::open_session(&config).map(|_| ()))
            .await
    }

    async fn deliver(&self, archive: &Path) -> Result<DeliveryReceipt, DeliveryError> {
        let archive = archive.to_path_buf();
        let receipt = self
            .blocking(move |config| Self::upload(&config, &archive))
            .await?;
        info!(remote = %receipt.remote_path, bytes = receipt.bytes, "Archive uploaded");
        Ok(receipt)
    }

    async fn exists(&self, archive_name: &str) -> Result<bool, DeliveryError> {
        let name = archive_name.to_string();
        self.blocking(move |config| Self::stat(&config, &name)).await
    }
}
