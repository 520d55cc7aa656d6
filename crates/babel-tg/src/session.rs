//! Redis-backed per-chat session records.

use crate::prelude::*;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use teloxide::dispatching::dialogue::serializer::Json;
use teloxide::dispatching::dialogue::{Dialogue, RedisStorage, RedisStorageError};
use teloxide::types::MessageId;
use thiserror::Error;

pub(crate) type SessionStorage = RedisStorage<Json>;

/// Handle to the current chat's session record.
pub(crate) type Session = Dialogue<MenuState, SessionStorage>;

type StorageError = RedisStorageError<serde_json::Error>;

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    // `RedisStorage::open` reports its failures with an `Infallible` serde
    // slot, unlike the live storage calls.
    #[error("Failed to connect to the session storage")]
    Connect {
        source: RedisStorageError<Infallible>,
    },

    #[error("Failed to load the session record")]
    Load { source: StorageError },

    #[error("Failed to store the session record")]
    Store { source: StorageError },

    #[error("Failed to clear the session record")]
    Clear { source: StorageError },
}

#[derive(Deserialize)]
pub(crate) struct Config {
    pub(crate) host: String,

    #[serde(default = "default_redis_port")]
    pub(crate) port: u16,

    /// Redis logical database index
    #[serde(default)]
    pub(crate) db: u8,

    #[serde(default)]
    pub(crate) password: Option<String>,
}

fn default_redis_port() -> u16 {
    6379
}

impl Config {
    pub(crate) fn url(&self) -> url::Url {
        let Self {
            host,
            port,
            db,
            password,
        } = self;

        let mut url: url::Url = format!("redis://{host}:{port}/{db}")
            .parse()
            .unwrap_or_else(|err| panic!("Bad redis host in config: {err}"));

        if let Some(password) = password {
            url.set_password(Some(password))
                .expect("BUG: redis URL is a valid base for a password");
        }

        url
    }
}

pub(crate) async fn open(cfg: Config) -> Result<Arc<SessionStorage>> {
    info!(
        host = cfg.host.as_str(),
        port = cfg.port,
        db = cfg.db,
        "Connecting to the session storage..."
    );

    RedisStorage::open(cfg.url().as_str(), Json)
        .await
        .map_err(err_ctx!(SessionError::Connect))
}

/// Dialogue state of a chat. Almost always [`MenuState::Idle`]; the chat
/// enters [`MenuState::LangMenu`] for the duration of the `/lang` flow.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) enum MenuState {
    #[default]
    Idle,
    LangMenu(LangMenu),
}

/// Scratch data of an open language picker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LangMenu {
    /// Pending, not yet saved, language selection.
    pub(crate) pending: Option<String>,

    /// Message carrying the picker keyboard. A replacement picker uses it
    /// to detach the superseded keyboard.
    pub(crate) picker_msg_id: Option<MessageId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use expect_test::expect;

    #[test]
    fn stored_records_keep_parsing() {
        // Records written by previous deployments sit in redis for a while,
        // so the stored shape is a compatibility surface.
        let record = r#"{"LangMenu":{"pending":"en","picker_msg_id":null}}"#;
        let state: MenuState = serde_json::from_str(record).unwrap();

        let menu = assert_matches!(state, MenuState::LangMenu(menu) => menu);
        assert_eq!(menu.pending.as_deref(), Some("en"));
        assert_eq!(menu.picker_msg_id, None);
    }

    #[test]
    fn connect_error_carries_the_open_failure() {
        // The source type is pinned to what `RedisStorage::open` actually
        // returns; the serializer never runs during connection setup.
        let source: RedisStorageError<Infallible> = RedisStorageError::DialogueNotFound;
        let err = SessionError::Connect { source };

        assert_eq!(err.to_string(), "Failed to connect to the session storage");

        let cause = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("row not found"));
    }

    #[test]
    fn url_carries_the_password_when_present() {
        let cfg = Config {
            host: "cache.example.org".to_owned(),
            port: 6379,
            db: 1,
            password: Some("hunter@2".to_owned()),
        };

        expect!["redis://:hunter%402@cache.example.org:6379/1"].assert_eq(cfg.url().as_str());
    }

    #[test]
    fn url_without_credentials() {
        let cfg = Config {
            host: "localhost".to_owned(),
            port: 6379,
            db: 0,
            password: None,
        };

        expect!["redis://localhost:6379/0"].assert_eq(cfg.url().as_str());
    }
}
