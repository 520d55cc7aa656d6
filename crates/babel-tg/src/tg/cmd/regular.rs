use super::{reply_key, Command};
use crate::db::users::{NewUser, UserRole};
use crate::prelude::*;
use crate::session::{LangMenu, MenuState, SessionError};
use crate::tg::keyboards;
use crate::tg::middleware::RequestCtx;
use crate::{db, tg};
use async_trait::async_trait;
use teloxide::macros::BotCommands;
use teloxide::prelude::*;
use teloxide::types::{BotCommandScope, Message, Recipient};

/// Commands available to everyone.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase")]
pub(crate) enum Cmd {
    Start,
    Help,
    Lang,
}

#[async_trait]
impl Command for Cmd {
    async fn handle(self, ctx: &tg::Ctx, req: &RequestCtx, msg: &Message) -> Result {
        match self {
            Cmd::Start => handle_start(ctx, req, msg).await,
            Cmd::Help => reply_key(ctx, req, msg, "/help").await,
            Cmd::Lang => handle_lang(ctx, req, msg).await,
        }
    }
}

/// `/lang` drives the chat-keyed menu dialogue, so it is a private chat
/// command. Elsewhere it stays an ordinary message for the echo handler.
pub(crate) fn filter_pm_only_commands(cmd: Cmd, msg: Message) -> bool {
    pm_only_commands_pass(&cmd, msg.chat.is_private())
}

fn pm_only_commands_pass(cmd: &Cmd, is_private: bool) -> bool {
    !matches!(cmd, Cmd::Lang) || is_private
}

/// Registers the sender and narrows this chat's command menu to their
/// role. The role is assigned once at registration time, from the
/// configured admin list.
async fn handle_start(ctx: &tg::Ctx, req: &RequestCtx, msg: &Message) -> Result {
    let role = if ctx.cfg.admin_ids.contains(&req.user.id) {
        UserRole::Admin
    } else {
        UserRole::User
    };

    let user = NewUser {
        id: req.user.id,
        username: req.user.username.clone(),
        language: req.lexicon.locale().to_owned(),
        role,
    };

    db::users::add_user(&mut *req.scope.conn().await, &user).await?;

    ctx.bot
        .set_my_commands(keyboards::menu_commands(&req.lexicon, role))
        .scope(BotCommandScope::Chat {
            chat_id: Recipient::Id(msg.chat.id),
        })
        .await?;

    reply_key(ctx, req, msg, "/start").await
}

/// Opens the language menu: sends the picker keyboard and stores the
/// menu session with the current stored language preselected.
async fn handle_lang(ctx: &tg::Ctx, req: &RequestCtx, msg: &Message) -> Result {
    let stored = db::users::language(&mut *req.scope.conn().await, req.user.id).await?;

    let Some(text) = req.lexicon.text("/lang") else {
        return Ok(());
    };

    let keyboard = keyboards::lang_menu(
        &req.lexicon,
        ctx.translations.locales(),
        stored.as_deref(),
    );

    let picker = ctx
        .bot
        .send_message(msg.chat.id, text)
        .reply_markup(keyboard)
        .await?;

    let menu = LangMenu {
        pending: stored,
        picker_msg_id: Some(picker.id),
    };

    req.session
        .update(MenuState::LangMenu(menu))
        .await
        .map_err(err_ctx!(SessionError::Store))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lang_stays_in_private_chats() {
        assert!(pm_only_commands_pass(&Cmd::Lang, true));
        assert!(!pm_only_commands_pass(&Cmd::Lang, false));

        assert!(pm_only_commands_pass(&Cmd::Start, false));
        assert!(pm_only_commands_pass(&Cmd::Help, false));
    }
}
