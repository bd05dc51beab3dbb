//! Shared secret loading.

use std::fmt;
use std::path::Path;

use crate::error::{AuthErrorKind, RelayError};

/// Opaque key material for one trust relationship.
///
/// Immutable after load. `Debug` never prints the bytes.
#[derive(Clone)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Wrap raw key bytes. Empty secrets are rejected.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, RelayError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(secret_error("Shared secret is empty".to_string()));
        }
        Ok(Self(bytes))
    }

    /// Load a secret from a file.
    ///
    /// Security: Verifies the file has restrictive permissions (0600 or 0400)
    /// before loading. A single trailing newline is stripped so that secrets
    /// written with `echo` match the inline form.
    pub fn from_file(path: &Path) -> Result<Self, RelayError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            secret_error(format!(
                "Failed to read secret metadata from {}: {}",
                path.display(),
                e
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(secret_error(format!(
                    "Secret file {} has insecure permissions {:04o}, expected 0600 or 0400",
                    path.display(),
                    mode & 0o777
                )));
            }
        }
        #[cfg(not(unix))]
        let _ = metadata;

        let mut bytes = std::fs::read(path).map_err(|e| {
            secret_error(format!(
                "Failed to read secret from {}: {}",
                path.display(),
                e
            ))
        })?;
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }

        Self::new(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret(<{} bytes redacted>)", self.0.len())
    }
}

fn secret_error(message: String) -> RelayError {
    RelayError::Auth {
        kind: AuthErrorKind::SecretError { message },
    }
}
