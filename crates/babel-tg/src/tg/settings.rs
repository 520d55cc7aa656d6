//! The language menu: the picker message lives in the chat, the staged
//! selection lives in the dialogue, and nothing touches the `users` row
//! until the save button is pressed.

use crate::db;
use crate::prelude::*;
use crate::session::{LangMenu, MenuState, SessionError};
use crate::tg;
use crate::tg::keyboards::{self, CANCEL_LANG_DATA, SAVE_LANG_DATA};
use crate::tg::middleware::{self, RequestCtx};
use crate::util::DynResult;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId, Message, MessageId};

/// The language menu is a private chat feature: the dialogue record is
/// keyed by chat, which coincides with the sender only in a private chat.
pub(crate) fn filter_pm_with_bot(msg: Message) -> bool {
    msg.chat.is_private()
}

/// Same gate for button presses, which carry the chat inside the picker
/// message.
pub(crate) fn filter_pm_callback(query: CallbackQuery) -> bool {
    query.message.map_or(false, |msg| msg.chat.is_private())
}

/// `/start` is the one command that escapes an open menu, so that the
/// bot can always be reset to a sane state.
pub(crate) fn filter_not_start_command(msg: Message) -> bool {
    not_start_command(msg.text())
}

fn not_start_command(text: Option<&str>) -> bool {
    let Some(rest) = text.and_then(|text| text.strip_prefix("/start")) else {
        return true;
    };

    // Only the exact command token: "/startled" is a regular message,
    // while "/start@some_bot" and "/start payload" are still the command.
    match rest.chars().next() {
        None | Some('@') => false,
        Some(next) => !next.is_whitespace(),
    }
}

/// Any message sent while the menu is open moves the picker below it:
/// the old picker loses its keyboard and a fresh one is sent, keeping
/// the staged selection checked.
#[instrument(skip_all, fields(sender = %req.user.debug_id(), chat = %msg.chat.debug_id()))]
pub(crate) async fn redraw_picker(
    ctx: Arc<tg::Ctx>,
    req: RequestCtx,
    menu: LangMenu,
    msg: Message,
) -> DynResult {
    let result = redraw_picker_imp(&ctx, &req, menu, &msg).await;
    let result = middleware::finish_update(&req.scope, result).await;

    if let Err(err) = &result {
        warn!(
            err = tracing_err(err),
            id = err.id(),
            "Language menu handler returned an error"
        );
    }

    result.map_err(Into::into)
}

async fn redraw_picker_imp(
    ctx: &tg::Ctx,
    req: &RequestCtx,
    menu: LangMenu,
    msg: &Message,
) -> Result {
    debug!("Redrawing the language picker");

    if let Some(old_picker) = menu.picker_msg_id {
        detach_keyboard(ctx, msg.chat.id, old_picker).await;
    }

    let Some(text) = req.lexicon.text("/lang") else {
        return Ok(());
    };

    let keyboard = keyboards::lang_menu(
        &req.lexicon,
        ctx.translations.locales(),
        menu.pending.as_deref(),
    );

    let picker = ctx
        .bot
        .send_message(msg.chat.id, text)
        .reply_markup(keyboard)
        .await?;

    let menu = LangMenu {
        picker_msg_id: Some(picker.id),
        ..menu
    };

    req.session
        .update(MenuState::LangMenu(menu))
        .await
        .map_err(err_ctx!(SessionError::Store))?;

    Ok(())
}

#[instrument(skip_all, fields(sender = %req.user.debug_id(), data = query.data.as_deref()))]
pub(crate) async fn handle_callback(
    ctx: Arc<tg::Ctx>,
    req: RequestCtx,
    menu: LangMenu,
    query: CallbackQuery,
) -> DynResult {
    let result = handle_callback_imp(&ctx, &req, menu, &query).await;
    let result = middleware::finish_update(&req.scope, result).await;

    if let Err(err) = &result {
        warn!(
            err = tracing_err(err),
            id = err.id(),
            "Language menu handler returned an error"
        );
    }

    result.map_err(Into::into)
}

async fn handle_callback_imp(
    ctx: &tg::Ctx,
    req: &RequestCtx,
    menu: LangMenu,
    query: &CallbackQuery,
) -> Result {
    debug!("Processing a language menu button");

    match query.data.as_deref() {
        Some(SAVE_LANG_DATA) => save_selection(ctx, req, menu, query).await,
        Some(CANCEL_LANG_DATA) => cancel_selection(ctx, req, query).await,
        _ => refresh_picker(ctx, req, menu, query).await,
    }
}

/// The selection staged by the pipeline becomes the stored language.
/// The confirmation is resolved through the freshly staged lexicon, so
/// it already speaks the saved language. Saving with nothing staged
/// just closes the menu.
async fn save_selection(
    ctx: &tg::Ctx,
    req: &RequestCtx,
    menu: LangMenu,
    query: &CallbackQuery,
) -> Result {
    if let Some(locale) = &menu.pending {
        db::users::set_language(&mut *req.scope.conn().await, req.user.id, locale).await?;
        info!(locale = locale.as_str(), "Saved the language selection");
    }

    close_menu(ctx, req, query).await?;

    if menu.pending.is_some() {
        reply_in_chat(ctx, req, query, "lang_saved").await?;
    }

    Ok(())
}

async fn cancel_selection(ctx: &tg::Ctx, req: &RequestCtx, query: &CallbackQuery) -> Result {
    close_menu(ctx, req, query).await?;
    reply_in_chat(ctx, req, query, "lang_cancelled").await
}

/// Exits the dialogue, detaches the picker keyboard and acks the
/// callback, in that order.
async fn close_menu(ctx: &tg::Ctx, req: &RequestCtx, query: &CallbackQuery) -> Result {
    req.session
        .exit()
        .await
        .map_err(err_ctx!(SessionError::Clear))?;

    if let Some(message) = &query.message {
        detach_keyboard(ctx, message.chat.id, message.id).await;
    }

    ctx.bot.answer_callback_query(query.id.clone()).await?;

    Ok(())
}

/// Redraws the picker keyboard in place after a locale button press.
/// Re-pressing the checked locale produces an identical keyboard, which
/// telegram reports as "not modified".
async fn refresh_picker(
    ctx: &tg::Ctx,
    req: &RequestCtx,
    menu: LangMenu,
    query: &CallbackQuery,
) -> Result {
    if let Some(message) = &query.message {
        let keyboard = keyboards::lang_menu(
            &req.lexicon,
            ctx.translations.locales(),
            menu.pending.as_deref(),
        );

        let result = ctx
            .bot
            .edit_message_reply_markup(message.chat.id, message.id)
            .reply_markup(keyboard)
            .await;

        if let Err(err) = result {
            match &err {
                teloxide::RequestError::Api(teloxide::ApiError::MessageNotModified) => {
                    debug!("Picker keyboard unchanged, nothing to refresh");
                }
                _ => return Err(err.into()),
            }
        }
    }

    ctx.bot.answer_callback_query(query.id.clone()).await?;

    Ok(())
}

/// Removes the inline keyboard from a picker message. Stale pickers may
/// already be deleted or edited over, so failures only get a debug line.
async fn detach_keyboard(ctx: &tg::Ctx, chat_id: ChatId, msg_id: MessageId) {
    let result = ctx.bot.edit_message_reply_markup(chat_id, msg_id).await;

    if let Err(err) = result {
        debug!(
            err = tracing_err(&err),
            msg_id = msg_id.0,
            "Couldn't detach the picker keyboard"
        );
    }
}

/// Sends a lexicon text to the chat the menu lives in, without replying
/// to any particular message.
async fn reply_in_chat(
    ctx: &tg::Ctx,
    req: &RequestCtx,
    query: &CallbackQuery,
    key: &str,
) -> Result {
    let Some(message) = &query.message else {
        return Ok(());
    };

    let Some(text) = req.lexicon.text(key) else {
        return Ok(());
    };

    ctx.bot.send_message(message.chat.id, text).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_escapes_the_menu() {
        assert!(not_start_command(Some("hello")));
        assert!(not_start_command(Some("/lang")));
        assert!(not_start_command(Some("/startled")));
        assert!(not_start_command(None));
        assert!(!not_start_command(Some("/start")));
        assert!(!not_start_command(Some("/start again")));
        assert!(!not_start_command(Some("/start@babel_tg_bot")));
    }
}
