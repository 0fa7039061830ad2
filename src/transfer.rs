//! URI-in, encoded-outcome-out entry points for host applications.
//!
//! Binary payloads cross this boundary as base64, text payloads as UTF-8 with
//! LF line endings. The backend is picked from the URI scheme and every call
//! runs on its own connection.

use log::info;

use crate::client::{Fetched, RemoteClient, Status, TransferMode};
use crate::codec;
use crate::config::Config;
use crate::connection::client_for;
use crate::error::{Result, TransferError};
use crate::target::ConnectionTarget;

/// Download a file and return its contents base64-encoded.
pub async fn fetch_file(uri: &str, config: &Config) -> Result<Fetched<String>> {
    let target = ConnectionTarget::parse(uri)?;
    let client = client_for(&target, config);
    fetch_file_with(client.as_ref(), &target.remote_path).await
}

/// Download a text file, with CRLF folded to LF and surrounding whitespace trimmed.
pub async fn fetch_text(uri: &str, config: &Config) -> Result<Fetched<String>> {
    let target = ConnectionTarget::parse(uri)?;
    let client = client_for(&target, config);
    fetch_text_with(client.as_ref(), &target.remote_path).await
}

/// Upload base64-encoded content.
pub async fn store_file(uri: &str, encoded: &str, config: &Config) -> Result<Status> {
    let target = ConnectionTarget::parse(uri)?;
    let client = client_for(&target, config);
    store_file_with(client.as_ref(), &target.remote_path, encoded).await
}

/// Upload text, sending CRLF line endings.
pub async fn store_text(uri: &str, text: &str, config: &Config) -> Result<Status> {
    let target = ConnectionTarget::parse(uri)?;
    let client = client_for(&target, config);
    store_text_with(client.as_ref(), &target.remote_path, text).await
}

pub async fn make_directory(uri: &str, config: &Config) -> Result<Status> {
    let target = ConnectionTarget::parse(uri)?;
    let client = client_for(&target, config);
    make_directory_with(client.as_ref(), &target.remote_path).await
}

/// Names in a remote directory, in server order. An empty vector means no entries.
pub async fn list_directory(uri: &str, config: &Config) -> Result<Vec<String>> {
    let target = ConnectionTarget::parse(uri)?;
    let client = client_for(&target, config);
    client.list(&target.remote_path).await
}

pub(crate) async fn make_directory_with(client: &dyn RemoteClient, path: &str) -> Result<Status> {
    require_directory(path)?;
    let status = client.make_directory(path).await?;
    info!("mkdir {path}: {status:?}");
    Ok(status)
}

pub(crate) async fn fetch_file_with(
    client: &dyn RemoteClient,
    path: &str,
) -> Result<Fetched<String>> {
    require_path(path)?;
    let fetched = client.download(path, TransferMode::Binary).await?;
    Ok(fetched.map(|raw| codec::encode_binary(&raw)))
}

pub(crate) async fn fetch_text_with(
    client: &dyn RemoteClient,
    path: &str,
) -> Result<Fetched<String>> {
    require_path(path)?;
    let fetched = client.download(path, TransferMode::Text).await?;
    Ok(match fetched.map(|raw| codec::text_from_wire(&raw)) {
        Fetched::Content(text) if text.is_empty() => Fetched::Empty,
        other => other,
    })
}

pub(crate) async fn store_file_with(
    client: &dyn RemoteClient,
    path: &str,
    encoded: &str,
) -> Result<Status> {
    require_path(path)?;
    let payload = codec::decode_binary(encoded)?;
    if payload.is_empty() {
        return Err(TransferError::InputInvalid("upload payload is empty".to_string()));
    }
    let status = client.upload(path, &payload, TransferMode::Binary).await?;
    info!("stored {} bytes at {path}", payload.len());
    Ok(status)
}

pub(crate) async fn store_text_with(
    client: &dyn RemoteClient,
    path: &str,
    text: &str,
) -> Result<Status> {
    require_path(path)?;
    if text.is_empty() {
        return Err(TransferError::InputInvalid("upload payload is empty".to_string()));
    }
    let payload = codec::text_to_wire(text);
    let status = client.upload(path, &payload, TransferMode::Text).await?;
    info!("stored {} bytes of text at {path}", payload.len());
    Ok(status)
}

/// Only one leading separator is dropped, so `//` still names a directory.
fn require_directory(path: &str) -> Result<()> {
    if path.strip_prefix('/').unwrap_or(path).is_empty() {
        return Err(TransferError::InputInvalid(
            "directory path is empty".to_string(),
        ));
    }
    Ok(())
}

fn require_path(path: &str) -> Result<()> {
    if path.trim_matches('/').is_empty() {
        return Err(TransferError::InputInvalid(
            "URI does not name a remote file".to_string(),
        ));
    }
    Ok(())
}
