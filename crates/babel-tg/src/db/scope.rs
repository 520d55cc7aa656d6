use super::DbError;
use crate::prelude::*;
use sqlx::{PgConnection, Postgres, Transaction};
use tokio::sync::{Mutex, MutexGuard};

/// The single database transaction shared by everything that processes
/// one telegram update. Opened before the first query of the update and
/// sealed by [`UpdateScope::commit`] when the matched handler succeeds,
/// or by [`UpdateScope::rollback`] when it fails.
///
/// The mutex is never contended across updates. It only serializes the
/// sequential borrows within one update's processing task.
pub(crate) struct UpdateScope {
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl UpdateScope {
    pub(crate) async fn begin(pool: &super::Pool) -> Result<Self> {
        let tx = pool.begin().await.map_err(err_ctx!(DbError::Begin))?;

        Ok(Self {
            tx: Mutex::new(Some(tx)),
        })
    }

    /// Borrows the scope's connection for a sequence of queries.
    /// The guard must be released before the scope is sealed.
    pub(crate) async fn conn(&self) -> ScopedConn<'_> {
        ScopedConn {
            guard: self.tx.lock().await,
        }
    }

    pub(crate) async fn commit(&self) -> Result {
        match self.tx.lock().await.take() {
            Some(tx) => tx.commit().await.map_err(err_ctx!(DbError::Commit)),
            None => Ok(()),
        }
    }

    pub(crate) async fn rollback(&self) -> Result {
        match self.tx.lock().await.take() {
            Some(tx) => tx.rollback().await.map_err(err_ctx!(DbError::Rollback)),
            None => Ok(()),
        }
    }
}

pub(crate) struct ScopedConn<'a> {
    guard: MutexGuard<'a, Option<Transaction<'static, Postgres>>>,
}

impl std::ops::Deref for ScopedConn<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        self.guard
            .as_deref()
            .expect("BUG: the update scope is already sealed")
    }
}

impl std::ops::DerefMut for ScopedConn<'_> {
    fn deref_mut(&mut self) -> &mut PgConnection {
        self.guard
            .as_deref_mut()
            .expect("BUG: the update scope is already sealed")
    }
}
