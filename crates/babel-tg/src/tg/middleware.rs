//! The fixed pre-handler pipeline every update passes through, in order:
//! sender extraction, database scope, shadow-ban gate, activity counter,
//! language-menu staging, lexicon resolution. The ordering is load-bearing:
//! the ban gate must face a live database scope, and the staged language
//! selection must land in the session before the lexicon is resolved.

use super::keyboards;
use crate::db::users::UserKey;
use crate::db::{self, UpdateScope};
use crate::i18n::Lexicon;
use crate::observability::metrics::{
    TG_UPDATES_SHADOW_BANNED_TOTAL, TG_UPDATES_SKIPPED_TOTAL, TG_UPDATES_TOTAL,
    USER_ACTIVITY_TOTAL,
};
use crate::prelude::*;
use crate::session::{LangMenu, MenuState, Session, SessionError, SessionStorage};
use crate::tg;
use metrics::increment_counter;
use std::sync::Arc;
use teloxide::dispatching::dialogue::Storage;
use teloxide::prelude::*;
use teloxide::types::{UpdateKind, User};

/// Everything the handlers get to know about one update, assembled by the
/// pipeline. Cheap to clone.
#[derive(Clone)]
pub(crate) struct RequestCtx {
    pub(crate) user: User,
    pub(crate) scope: Arc<UpdateScope>,
    pub(crate) lexicon: Lexicon,
    pub(crate) session: Session,
}

pub(crate) fn observe_update(update: Update) {
    let kind = update.kind.discriminator();
    increment_counter!(TG_UPDATES_TOTAL, "kind" => kind);
    trace!(target: "tg_update", update_id = update.id, kind, "Received an update");
}

pub(crate) fn observe_skipped_update(update: Update) {
    let kind = update.kind.discriminator();
    increment_counter!(TG_UPDATES_SKIPPED_TOTAL, "kind" => kind);
}

/// Everything downstream is about the sender, so updates without one
/// (channel posts, poll state changes) end right here.
pub(crate) fn filter_has_sender(update: Update) -> Option<User> {
    let user = update.user().cloned();

    if user.is_none() {
        trace!(update_id = update.id, "Update without a sender, skipping");
    }

    user
}

/// Stage 1: one database transaction for everything this update does.
pub(crate) async fn begin_update_scope(ctx: Arc<tg::Ctx>) -> Option<Arc<UpdateScope>> {
    match UpdateScope::begin(&ctx.db).await {
        Ok(scope) => Some(Arc::new(scope)),
        Err(err) => {
            error!(
                err = tracing_err(&err),
                id = err.id(),
                "Failed to open the update's database scope, dropping the update"
            );
            None
        }
    }
}

/// Stage 2: shadow-banned senders are dropped silently, with no reply of
/// any kind. A failed lookup also drops the update: processing it without
/// knowing the ban status would let banned traffic through.
pub(crate) async fn filter_not_shadow_banned(user: User, scope: Arc<UpdateScope>) -> bool {
    let key = UserKey::Id(user.id);

    let banned = db::users::banned_status(&mut *scope.conn().await, &key).await;

    match &banned {
        Ok(Some(true)) => {
            increment_counter!(TG_UPDATES_SHADOW_BANNED_TOTAL);
            info!(sender = %user.debug_id(), "Ignoring an update from a banned user");
        }
        Err(err) => {
            error!(
                err = tracing_err(err),
                id = err.id(),
                "Failed to check the shadow ban status, dropping the update"
            );
        }
        Ok(_) => {}
    }

    passes_shadow_ban(&banned)
}

/// The update passes only on a successful lookup that did not say "banned".
fn passes_shadow_ban(banned: &Result<Option<bool>>) -> bool {
    matches!(banned, Ok(None | Some(false)))
}

/// Stage 3: process-local activity accounting. Not a database write, so
/// it neither blocks the update nor disappears with a rolled back
/// transaction, and it keeps counting across dropped updates' neighbors.
pub(crate) fn count_activity(user: User) {
    increment_counter!(USER_ACTIVITY_TOTAL);
    debug!(sender_id = user.id.0, "Counted sender activity");
}

/// Stage 4: applies a language-menu button press to the stored menu
/// before the dialogue is loaded, so the downstream lexicon resolution
/// already sees the new selection. Presses outside the menu or outside
/// a private chat, unknown payloads and the save button pass through
/// untouched.
pub(crate) async fn stage_lang_settings(
    update: Update,
    storage: Arc<SessionStorage>,
    ctx: Arc<tg::Ctx>,
) -> bool {
    let UpdateKind::CallbackQuery(query) = &update.kind else {
        return true;
    };

    let Some(data) = query.data.as_deref() else {
        return true;
    };

    // The menu lives in private chats only. A press on a stale group
    // picker stages nothing.
    let Some(chat) = update.chat().filter(|chat| chat.is_private()) else {
        return true;
    };
    let chat_id = chat.id;

    let state = Arc::clone(&storage)
        .get_dialogue(chat_id)
        .await
        .map_err(err_ctx!(SessionError::Load));

    let menu = match state {
        Ok(Some(MenuState::LangMenu(menu))) => menu,
        Ok(_) => return true,
        Err(err) => {
            error!(
                err = tracing_err(&err),
                id = err.id(),
                "Failed to load the chat session, dropping the update"
            );
            return false;
        }
    };

    let pending = if data == keyboards::CANCEL_LANG_DATA {
        None
    } else if ctx.translations.supports(data) && menu.pending.as_deref() != Some(data) {
        Some(data.to_owned())
    } else {
        return true;
    };

    let updated = MenuState::LangMenu(LangMenu { pending, ..menu });

    let stored = Arc::clone(&storage)
        .update_dialogue(chat_id, updated)
        .await
        .map_err(err_ctx!(SessionError::Store));

    if let Err(err) = stored {
        error!(
            err = tracing_err(&err),
            id = err.id(),
            "Failed to stage the language selection, dropping the update"
        );
        return false;
    }

    true
}

/// Stage 5: assembles the typed per-update context injected into every
/// handler.
pub(crate) async fn inject_request_ctx(
    state: MenuState,
    session: Session,
    user: User,
    scope: Arc<UpdateScope>,
    ctx: Arc<tg::Ctx>,
) -> Option<RequestCtx> {
    let pending = match &state {
        MenuState::LangMenu(menu) => menu.pending.as_deref(),
        MenuState::Idle => None,
    };

    let stored = match db::users::language(&mut *scope.conn().await, user.id).await {
        Ok(stored) => stored,
        Err(err) => {
            error!(
                err = tracing_err(&err),
                id = err.id(),
                "Failed to look up the sender's language, dropping the update"
            );
            return None;
        }
    };

    let lexicon =
        ctx.translations
            .resolve(pending, stored.as_deref(), user.language_code.as_deref());

    Some(RequestCtx {
        user,
        scope,
        lexicon,
        session,
    })
}

/// Seals the update's database scope: commits when the matched handler
/// succeeded, rolls back when it failed. Either way the handler's result
/// is passed through to the dispatcher.
pub(crate) async fn finish_update(scope: &UpdateScope, result: Result) -> Result {
    match result {
        Ok(()) => {
            scope.commit().await?;
            Ok(())
        }
        Err(err) => {
            if let Err(rollback_err) = scope.rollback().await {
                warn!(
                    err = tracing_err(&rollback_err),
                    id = rollback_err.id(),
                    "Failed to roll back the update's database scope"
                );
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ban_gate_passes_only_clean_lookups() {
        let table = [
            (Ok(Some(true)), false),
            (Ok(Some(false)), true),
            (Ok(None), true),
            (Err(fatal!("the users table is unreachable")), false),
        ];

        for (banned, pass) in table {
            assert_eq!(passes_shadow_ban(&banned), pass, "{banned:?}");
        }
    }
}
