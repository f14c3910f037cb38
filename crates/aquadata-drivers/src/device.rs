//! Host device identity.
//!
//! The broker client id is derived from a hardware id. On a real probe
//! that is the chip's unique id; on a host we use the first bytes of
//! `/etc/machine-id`, unless the operator pins one in config.

use std::path::Path;

use aquadata_core::DriverError;
use tracing::debug;

/// Bytes of hardware id kept, matching a MAC-sized chip id.
pub const HARDWARE_ID_LEN: usize = 6;

const MACHINE_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Parse an operator-supplied hex id (`"240ac4123456"`, colons allowed).
pub fn parse_hardware_id(text: &str) -> Result<Vec<u8>, DriverError> {
    let cleaned: String = text.chars().filter(|c| *c != ':' && *c != '-').collect();
    let bytes = hex::decode(cleaned.trim())
        .map_err(|e| DriverError::Protocol(format!("invalid hardware id '{text}': {e}")))?;
    if bytes.is_empty() {
        return Err(DriverError::Protocol("hardware id is empty".into()));
    }
    Ok(bytes)
}

/// Read the first [`HARDWARE_ID_LEN`] bytes of a machine-id file.
pub async fn read_machine_id(path: &Path) -> Result<Vec<u8>, DriverError> {
    let text = tokio::fs::read_to_string(path).await?;
    let mut bytes = parse_hardware_id(text.trim())?;
    bytes.truncate(HARDWARE_ID_LEN);
    Ok(bytes)
}

/// Resolve the hardware id: explicit override, then the host machine id,
/// then all zeros.
pub async fn hardware_id(override_hex: Option<&str>) -> Result<Vec<u8>, DriverError> {
    if let Some(text) = override_hex {
        return parse_hardware_id(text);
    }
    for path in MACHINE_ID_PATHS {
        match read_machine_id(Path::new(path)).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => debug!(path, error = %e, "machine id unavailable"),
        }
    }
    Ok(vec![0; HARDWARE_ID_LEN])
}
