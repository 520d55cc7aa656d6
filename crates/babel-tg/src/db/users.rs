//! All the queries against the `users` table. Every function takes a bare
//! connection, so the callers decide whether a query runs inside the
//! update's transaction or on its own.

use super::DbError;
use crate::prelude::*;
use sqlx::PgConnection;
use std::fmt;
use teloxide::types::UserId;

/// Role stored in the `users.role` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum UserRole {
    User,
    Admin,
}

/// Lookup key for the operations that accept either an id or a username.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum UserKey {
    Id(UserId),
    Username(String),
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKey::Id(id) => write!(f, "{}", id.0),
            UserKey::Username(username) => write!(f, "@{username}"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct NewUser {
    pub(crate) id: UserId,
    pub(crate) username: Option<String>,
    pub(crate) language: String,
    pub(crate) role: UserRole,
}

/// One row of the `/statistics` report. The label is a lexicon key.
#[derive(Debug)]
pub(crate) struct StatEntry {
    pub(crate) label: String,
    pub(crate) count: i64,
}

/// Telegram ids are unsigned on the wire, while the `user_id` column is
/// an `int8`.
fn db_id(id: UserId) -> Result<i64> {
    i64::try_from(id.0).map_err(|_| fatal!("User id {} does not fit into the id column", id.0))
}

/// Registers a user. Registering an already known user is a no-op, the
/// existing row is left untouched.
#[instrument(skip(conn))]
pub(crate) async fn add_user(conn: &mut PgConnection, user: &NewUser) -> Result {
    let result = sqlx::query(
        "INSERT INTO users (user_id, username, language, role, is_alive, banned) \
         VALUES ($1, $2, $3, $4, true, false) \
         ON CONFLICT DO NOTHING",
    )
    .bind(db_id(user.id)?)
    .bind(user.username.as_deref())
    .bind(&user.language)
    .bind(user.role.to_string())
    .execute(conn)
    .await
    .map_err(err_ctx!(DbError::Query))?;

    if result.rows_affected() == 0 {
        debug!("The user is already registered");
    } else {
        info!("Registered a new user");
    }

    Ok(())
}

#[instrument(skip(conn))]
pub(crate) async fn language(conn: &mut PgConnection, id: UserId) -> Result<Option<String>> {
    sqlx::query_scalar("SELECT language FROM users WHERE user_id = $1")
        .bind(db_id(id)?)
        .fetch_optional(conn)
        .await
        .map_err(err_ctx!(DbError::Query))
}

#[instrument(skip(conn))]
pub(crate) async fn set_language(conn: &mut PgConnection, id: UserId, language: &str) -> Result {
    let result = sqlx::query("UPDATE users SET language = $2 WHERE user_id = $1")
        .bind(db_id(id)?)
        .bind(language)
        .execute(conn)
        .await
        .map_err(err_ctx!(DbError::Query))?;

    if result.rows_affected() == 0 {
        warn!("Tried to set the language of an unknown user");
    }

    Ok(())
}

#[instrument(skip(conn))]
pub(crate) async fn role(conn: &mut PgConnection, id: UserId) -> Result<Option<UserRole>> {
    let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE user_id = $1")
        .bind(db_id(id)?)
        .fetch_optional(conn)
        .await
        .map_err(err_ctx!(DbError::Query))?;

    role.map(|role| {
        role.parse()
            .map_err(|_| err!(DbError::UnknownRole { role }))
    })
    .transpose()
}

/// `None` means there is no such user at all.
#[instrument(skip(conn))]
pub(crate) async fn banned_status(conn: &mut PgConnection, key: &UserKey) -> Result<Option<bool>> {
    let query = match key {
        UserKey::Id(id) => {
            sqlx::query_scalar("SELECT banned FROM users WHERE user_id = $1").bind(db_id(*id)?)
        }
        UserKey::Username(username) => {
            sqlx::query_scalar("SELECT banned FROM users WHERE username = $1")
                .bind(username.as_str())
        }
    };

    query
        .fetch_optional(conn)
        .await
        .map_err(err_ctx!(DbError::Query))
}

#[instrument(skip(conn))]
pub(crate) async fn set_banned_status(
    conn: &mut PgConnection,
    key: &UserKey,
    banned: bool,
) -> Result {
    let query = match key {
        UserKey::Id(id) => {
            sqlx::query("UPDATE users SET banned = $2 WHERE user_id = $1").bind(db_id(*id)?)
        }
        UserKey::Username(username) => {
            sqlx::query("UPDATE users SET banned = $2 WHERE username = $1")
                .bind(username.as_str())
        }
    };

    let result = query
        .bind(banned)
        .execute(conn)
        .await
        .map_err(err_ctx!(DbError::Query))?;

    if result.rows_affected() == 0 {
        warn!("Tried to change the banned status of an unknown user");
    }

    Ok(())
}

/// Aggregate counters over the whole table, in the order they are reported.
#[instrument(skip(conn))]
pub(crate) async fn statistics(conn: &mut PgConnection) -> Result<Vec<StatEntry>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT label, count FROM ( \
             SELECT 1 AS ord, 'users_total' AS label, count(*) AS count FROM users \
             UNION ALL \
             SELECT 2, 'users_alive', count(*) FROM users WHERE is_alive \
             UNION ALL \
             SELECT 3, 'users_banned', count(*) FROM users WHERE banned \
         ) stats ORDER BY ord",
    )
    .fetch_all(conn)
    .await
    .map_err(err_ctx!(DbError::Query))?;

    Ok(rows.map_collect(|(label, count)| StatEntry { label, count }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip_through_their_column_form() {
        assert_eq!(UserRole::User.to_string(), "user");
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("overlord".parse::<UserRole>().is_err());
    }

    #[test]
    fn user_key_display() {
        assert_eq!(UserKey::Id(UserId(42)).to_string(), "42");
        assert_eq!(UserKey::Username("fox".to_owned()).to_string(), "@fox");
    }
}
