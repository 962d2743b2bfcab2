//! Persisted sync configuration.

use crate::error::Result;

use super::store::Store;

pub const SYNC_URL: &str = "sync_url";
pub const SYNC_SITE_NAME: &str = "sync_site_name";
pub const SYNC_SITE_PASSWORD_HASH: &str = "sync_site_password_hash";
pub const SYNC_SITE_ID: &str = "sync_site_id";
pub const SYNC_SERVER_ID: &str = "sync_server_id";
pub const THIS_STORE_ID: &str = "this_store_id";
pub const SYNC_SITE_UUID: &str = "sync_site_uuid";
pub const SYNC_IS_INITIALISED: &str = "sync_is_initialised";
pub const SYNC_PRIOR_FAILED: &str = "sync_prior_failed";

/// Typed view over the sync-related settings rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSettings {
    pub url: Option<String>,
    pub site_name: Option<String>,
    pub password_hash: Option<String>,
    pub site_id: Option<String>,
    pub server_id: Option<String>,
    pub store_id: Option<String>,
    pub site_uuid: Option<String>,
    pub is_initialised: bool,
    pub prior_failed: bool,
}

impl SyncSettings {
    pub fn load(store: &Store) -> Result<Self> {
        Ok(Self {
            url: store.get_setting(SYNC_URL)?,
            site_name: store.get_setting(SYNC_SITE_NAME)?,
            password_hash: store.get_setting(SYNC_SITE_PASSWORD_HASH)?,
            site_id: store.get_setting(SYNC_SITE_ID)?,
            server_id: store.get_setting(SYNC_SERVER_ID)?,
            store_id: store.get_setting(THIS_STORE_ID)?,
            site_uuid: store.get_setting(SYNC_SITE_UUID)?,
            is_initialised: store.get_setting(SYNC_IS_INITIALISED)?.as_deref() == Some("true"),
            prior_failed: store.get_setting(SYNC_PRIOR_FAILED)?.as_deref() == Some("true"),
        })
    }

    pub fn save(&self, store: &Store) -> Result<()> {
        let strings = [
            (SYNC_URL, &self.url),
            (SYNC_SITE_NAME, &self.site_name),
            (SYNC_SITE_PASSWORD_HASH, &self.password_hash),
            (SYNC_SITE_ID, &self.site_id),
            (SYNC_SERVER_ID, &self.server_id),
            (THIS_STORE_ID, &self.store_id),
            (SYNC_SITE_UUID, &self.site_uuid),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                store.set_setting(key, value)?;
            }
        }
        store.set_setting(SYNC_IS_INITIALISED, bool_str(self.is_initialised))?;
        store.set_setting(SYNC_PRIOR_FAILED, bool_str(self.prior_failed))?;
        Ok(())
    }
}

const fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn save_and_load_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let settings = SyncSettings {
            url: Some("https://sync.example.com".to_string()),
            site_name: Some("clinic-a".to_string()),
            password_hash: Some("abc123".to_string()),
            site_id: Some("17".to_string()),
            server_id: Some("1".to_string()),
            store_id: Some("store-1".to_string()),
            site_uuid: Some("uuid-1".to_string()),
            is_initialised: true,
            prior_failed: false,
        };
        settings.save(&store).unwrap();
        assert_eq!(SyncSettings::load(&store).unwrap(), settings);
    }

    #[test]
    fn load_defaults_when_unset() {
        let store = Store::open_in_memory().unwrap();
        let settings = SyncSettings::load(&store).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert!(!settings.is_initialised);
    }
}
