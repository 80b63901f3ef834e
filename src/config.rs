use std::collections::HashSet;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use serenity::model::id::UserId;
use serenity::prelude::TypeMapKey;
use thiserror::Error;

use crate::feed::FeedOptions;

pub const DEFAULT_PREFIX: &str = "l!";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Expected {0} in the environment")]
    Missing(&'static str),
    #[error("{key} contains an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub shutdown_users: HashSet<UserId>,
    pub command_prefix: String,
    pub feed: FeedOptions,
}

pub struct SettingsKey;

impl TypeMapKey for SettingsKey {
    type Value = Arc<Settings>;
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let shutdown_users = lookup("SHUTDOWN_USERS")
            .map(|users| parse_user_ids(&users))
            .transpose()?
            .unwrap_or_default();

        let command_prefix = lookup("COMMAND_PREFIX")
            .filter(|prefix| !prefix.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let defaults = FeedOptions::default();
        let feed = FeedOptions {
            attempts: parse_number(&lookup, "FEED_ATTEMPTS")?.unwrap_or(defaults.attempts),
            interval: parse_number(&lookup, "FEED_RETRY_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
        };

        Ok(Self {
            token,
            shutdown_users,
            command_prefix,
            feed,
        })
    }
}

fn parse_user_ids(users: &str) -> Result<HashSet<UserId>, ConfigError> {
    users
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u64>().map(UserId).map_err(|_| ConfigError::Invalid {
                key: "SHUTDOWN_USERS",
                value: id.to_string(),
            })
        })
        .collect()
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}
