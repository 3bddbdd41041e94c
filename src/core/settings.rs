//! Venue settings - Display strings behind a fixed allow-list of keys.
//!
//! Values are plain overwrites. Keys outside [`SettingKey`] are rejected, so the
//! table can never grow entries the display does not know about.

use crate::{
    config::app::VenueConfig,
    entities::{Setting, setting},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{info, instrument};

/// The settings a venue may change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SettingKey {
    /// Venue name shown to customers
    VenueName,
    /// Greeting on the ticket page
    WelcomeMessage,
    /// Heading of the public call display
    DisplayHeader,
}

impl SettingKey {
    /// Every allowed key
    pub const ALL: [Self; 3] = [Self::VenueName, Self::WelcomeMessage, Self::DisplayHeader];

    /// Stored key text
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VenueName => "venue_name",
            Self::WelcomeMessage => "welcome_message",
            Self::DisplayHeader => "display_header",
        }
    }

    fn default_from(self, venue: &VenueConfig) -> &str {
        match self {
            Self::VenueName => &venue.name,
            Self::WelcomeMessage => &venue.welcome_message,
            Self::DisplayHeader => &venue.display_header,
        }
    }
}

impl FromStr for SettingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::UnknownSetting { key: s.to_string() })
    }
}

/// All venue settings, as served to the display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VenueSettings {
    /// Venue name shown to customers
    pub venue_name: String,
    /// Greeting on the ticket page
    pub welcome_message: String,
    /// Heading of the public call display
    pub display_header: String,
}

/// Writes the configured venue strings for keys that have no stored value yet.
///
/// Values changed through the admin API are never overwritten by a restart.
#[instrument(skip_all)]
pub async fn seed_default_settings(db: &DatabaseConnection, venue: &VenueConfig) -> Result<()> {
    let mut seeded = 0;
    for key in SettingKey::ALL {
        if Setting::find_by_id(key.as_str()).one(db).await?.is_none() {
            setting::ActiveModel {
                key: Set(key.as_str().to_string()),
                value: Set(key.default_from(venue).to_string()),
                updated_at: Set(Utc::now()),
            }
            .insert(db)
            .await?;
            seeded += 1;
        }
    }
    info!("Seeded {} venue settings", seeded);
    Ok(())
}

/// Reads one setting.
pub async fn get_setting(db: &DatabaseConnection, key: SettingKey) -> Result<Option<String>> {
    Ok(Setting::find_by_id(key.as_str())
        .one(db)
        .await?
        .map(|s| s.value))
}

/// Reads all settings; keys never stored come back empty.
pub async fn get_all_settings(db: &DatabaseConnection) -> Result<VenueSettings> {
    let stored: BTreeMap<String, String> = Setting::find()
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.key, s.value))
        .collect();
    let value_of = |key: SettingKey| stored.get(key.as_str()).cloned().unwrap_or_default();

    Ok(VenueSettings {
        venue_name: value_of(SettingKey::VenueName),
        welcome_message: value_of(SettingKey::WelcomeMessage),
        display_header: value_of(SettingKey::DisplayHeader),
    })
}

/// Overwrites the given settings in one transaction.
///
/// # Errors
/// [`Error::UnknownSetting`] if any key is outside the allow-list; in that case
/// nothing is written.
#[instrument(skip(db))]
pub async fn update_settings(
    db: &DatabaseConnection,
    updates: &BTreeMap<String, String>,
) -> Result<usize> {
    let parsed = updates
        .iter()
        .map(|(key, value)| key.parse::<SettingKey>().map(|k| (k, value.as_str())))
        .collect::<Result<Vec<_>>>()?;

    let txn = db.begin().await?;
    let now = Utc::now();
    for (key, value) in &parsed {
        let row = setting::ActiveModel {
            key: Set(key.as_str().to_string()),
            value: Set((*value).to_string()),
            updated_at: Set(now),
        };
        if Setting::find_by_id(key.as_str()).one(&txn).await?.is_some() {
            row.update(&txn).await?;
        } else {
            row.insert(&txn).await?;
        }
    }
    txn.commit().await?;

    info!("Updated {} venue settings", parsed.len());
    Ok(parsed.len())
}
