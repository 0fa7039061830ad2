use crate::client::{ftp::FtpClient, sftp::SftpClient, RemoteClient};
use crate::config::Config;
use crate::target::{ConnectionTarget, Scheme};
use log::debug;

/// Pick the backend for a target's scheme.
///
/// Nothing is dialed here; every operation on the returned client opens and
/// closes its own connection.
pub fn client_for(target: &ConnectionTarget, config: &Config) -> Box<dyn RemoteClient> {
    debug!("using {} backend for {}", target.scheme, target.address());
    match target.scheme {
        Scheme::Ftp => Box::new(FtpClient::new(target, config)),
        Scheme::Sftp => Box::new(SftpClient::new(target, config)),
    }
}
