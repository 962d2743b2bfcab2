//! Credential handling for the sync site.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Hash a sync site password for storage and transmission.
///
/// Only the hash ever leaves the device or touches the settings table.
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Check the user-supplied connection details before any network traffic.
pub fn validate_credentials(server_url: &str, site_name: &str, password: &str) -> Result<()> {
    if server_url.trim().is_empty() {
        return Err(Error::InvalidInput("enter a server URL".to_string()));
    }
    if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
        return Err(Error::InvalidInput(
            "the server URL must start with http:// or https://".to_string(),
        ));
    }
    if site_name.trim().is_empty() {
        return Err(Error::InvalidCredentials(
            "enter the sync site name".to_string(),
        ));
    }
    if password.is_empty() {
        return Err(Error::InvalidCredentials(
            "enter the sync site password".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hashes_are_stable_lowercase_hex() {
        let hash = hash_password("correct horse battery staple");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_password("correct horse battery staple"));
        assert_ne!(hash, hash_password("correct horse battery stapl"));
    }

    #[test]
    fn credentials_are_validated_before_any_network_use() {
        assert!(validate_credentials("https://sync.example.com", "site", "pw").is_ok());
        assert!(matches!(
            validate_credentials("", "site", "pw"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            validate_credentials("ftp://sync.example.com", "site", "pw"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            validate_credentials("https://sync.example.com", "", "pw"),
            Err(Error::InvalidCredentials(_))
        ));
        assert!(matches!(
            validate_credentials("https://sync.example.com", "site", ""),
            Err(Error::InvalidCredentials(_))
        ));
    }
}
