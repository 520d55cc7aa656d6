use super::{reply_key, Command};
use crate::db::users::{StatEntry, UserKey, UserRole};
use crate::i18n::Lexicon;
use crate::prelude::*;
use crate::tg::middleware::RequestCtx;
use crate::{db, tg};
use async_trait::async_trait;
use itertools::Itertools;
use teloxide::macros::BotCommands;
use teloxide::prelude::*;
use teloxide::types::{Message, UserId};

/// Commands gated behind the stored `admin` role. Note that `/help` is
/// also a regular command. Admins match this branch first and get the
/// extended help text instead of the regular one.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase")]
pub(crate) enum Cmd {
    Help,
    Statistics,
    Ban(String),
    Unban(String),
}

#[async_trait]
impl Command for Cmd {
    async fn handle(self, ctx: &tg::Ctx, req: &RequestCtx, msg: &Message) -> Result {
        match self {
            Cmd::Help => reply_key(ctx, req, msg, "/help_admin").await,
            Cmd::Statistics => handle_statistics(ctx, req, msg).await,
            Cmd::Ban(input) => handle_ban(ctx, req, msg, &input).await,
            Cmd::Unban(input) => handle_unban(ctx, req, msg, &input).await,
        }
    }
}

/// Gate for the admin command branch. Anything but a positive role match
/// is a denial, including lookup failures. Denied commands fall through
/// to the regular branches as if this one didn't exist.
pub(crate) async fn is_admin(req: RequestCtx) -> bool {
    match db::users::role(&mut *req.scope.conn().await, req.user.id).await {
        Ok(Some(UserRole::Admin)) => true,
        Ok(_) => false,
        Err(err) => {
            error!(
                err = tracing_err(&err),
                id = err.id(),
                "Failed to look up the sender's role, denying the admin command"
            );
            false
        }
    }
}

/// What an admin passed to `/ban` or `/unban` after the command itself.
#[derive(Debug, PartialEq, Eq)]
enum BanTarget {
    Empty,
    Unrecognized,
    Key(UserKey),
}

fn parse_ban_target(input: &str) -> BanTarget {
    let input = input.trim();

    if input.is_empty() {
        return BanTarget::Empty;
    }

    if let Some(username) = input.strip_prefix('@') {
        if username.is_empty() {
            return BanTarget::Unrecognized;
        }
        return BanTarget::Key(UserKey::Username(username.to_owned()));
    }

    if !input.chars().all(|c| c.is_ascii_digit()) {
        return BanTarget::Unrecognized;
    }

    match input.parse::<u64>() {
        Ok(id) => BanTarget::Key(UserKey::Id(UserId(id))),
        Err(_) => BanTarget::Unrecognized,
    }
}

/// The decision made by a moderation command: the status write to apply,
/// if any, and the reply keys to send, in order.
#[derive(Debug, PartialEq, Eq)]
struct ModerationPlan {
    set_banned_to: Option<bool>,
    replies: &'static [&'static str],
}

fn ban_plan(current: Option<bool>) -> ModerationPlan {
    match current {
        None => ModerationPlan {
            set_banned_to: None,
            replies: &["no_such_user"],
        },
        Some(true) => ModerationPlan {
            set_banned_to: None,
            replies: &["already_banned"],
        },
        Some(false) => ModerationPlan {
            set_banned_to: Some(true),
            replies: &["user_banned"],
        },
    }
}

/// A banned target gets both the success notice and the "not banned"
/// notice. The trailing notice has shipped this way for long enough that
/// admins treat it as a confirmation echo, so it stays.
fn unban_plan(current: Option<bool>) -> ModerationPlan {
    match current {
        None => ModerationPlan {
            set_banned_to: None,
            replies: &["no_such_user"],
        },
        Some(true) => ModerationPlan {
            set_banned_to: Some(false),
            replies: &["user_unbanned", "not_banned"],
        },
        Some(false) => ModerationPlan {
            set_banned_to: None,
            replies: &["not_banned"],
        },
    }
}

async fn handle_ban(ctx: &tg::Ctx, req: &RequestCtx, msg: &Message, input: &str) -> Result {
    let key = match parse_ban_target(input) {
        BanTarget::Empty => return reply_key(ctx, req, msg, "empty_ban_answer").await,
        BanTarget::Unrecognized => return reply_key(ctx, req, msg, "incorrect_ban_answer").await,
        BanTarget::Key(key) => key,
    };

    let current = db::users::banned_status(&mut *req.scope.conn().await, &key).await?;

    apply_plan(ctx, req, msg, &key, ban_plan(current)).await
}

async fn handle_unban(ctx: &tg::Ctx, req: &RequestCtx, msg: &Message, input: &str) -> Result {
    let key = match parse_ban_target(input) {
        BanTarget::Empty => return reply_key(ctx, req, msg, "empty_unban_answer").await,
        BanTarget::Unrecognized => {
            return reply_key(ctx, req, msg, "incorrect_unban_answer").await
        }
        BanTarget::Key(key) => key,
    };

    let current = db::users::banned_status(&mut *req.scope.conn().await, &key).await?;

    apply_plan(ctx, req, msg, &key, unban_plan(current)).await
}

async fn apply_plan(
    ctx: &tg::Ctx,
    req: &RequestCtx,
    msg: &Message,
    key: &UserKey,
    plan: ModerationPlan,
) -> Result {
    if let Some(banned) = plan.set_banned_to {
        db::users::set_banned_status(&mut *req.scope.conn().await, key, banned).await?;
        info!(target_user = %key, banned, "Changed the banned status of a user");
    }

    for reply in plan.replies {
        reply_key(ctx, req, msg, reply).await?;
    }

    Ok(())
}

async fn handle_statistics(ctx: &tg::Ctx, req: &RequestCtx, msg: &Message) -> Result {
    let entries = db::users::statistics(&mut *req.scope.conn().await).await?;

    let Some(header) = req.lexicon.text("/statistics") else {
        return Ok(());
    };

    let report = format_statistics(&req.lexicon, header, &entries);

    ctx.bot
        .send_message(msg.chat.id, report)
        .reply_to_message_id(msg.id)
        .await?;

    Ok(())
}

fn format_statistics(lexicon: &Lexicon, header: &str, entries: &[StatEntry]) -> String {
    let lines = entries
        .iter()
        .enumerate()
        .format_with("\n", |(index, entry), f| {
            let label = lexicon.text(&entry.label).unwrap_or(entry.label.as_str());
            f(&format_args!("{}. {label}: <b>{}</b>", index + 1, entry.count))
        });

    format!("{header}\n{lines}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Translations;
    use expect_test::expect;

    #[test]
    fn ban_targets_are_parsed_leniently() {
        let cases = [
            ("", BanTarget::Empty),
            ("   ", BanTarget::Empty),
            ("@fox", BanTarget::Key(UserKey::Username("fox".to_owned()))),
            (" @fox ", BanTarget::Key(UserKey::Username("fox".to_owned()))),
            ("@", BanTarget::Unrecognized),
            ("12345", BanTarget::Key(UserKey::Id(UserId(12345)))),
            ("+5", BanTarget::Unrecognized),
            ("-5", BanTarget::Unrecognized),
            ("12b", BanTarget::Unrecognized),
            ("fox", BanTarget::Unrecognized),
        ];

        for (input, expected) in cases {
            assert_eq!(parse_ban_target(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn ban_plans() {
        assert_eq!(
            ban_plan(None),
            ModerationPlan {
                set_banned_to: None,
                replies: &["no_such_user"],
            }
        );
        assert_eq!(
            ban_plan(Some(true)),
            ModerationPlan {
                set_banned_to: None,
                replies: &["already_banned"],
            }
        );
        assert_eq!(
            ban_plan(Some(false)),
            ModerationPlan {
                set_banned_to: Some(true),
                replies: &["user_banned"],
            }
        );
    }

    #[test]
    fn unban_of_a_banned_user_sends_both_notices() {
        assert_eq!(
            unban_plan(Some(true)),
            ModerationPlan {
                set_banned_to: Some(false),
                replies: &["user_unbanned", "not_banned"],
            }
        );
    }

    #[test]
    fn unban_plans_for_missing_and_unbanned_targets() {
        assert_eq!(
            unban_plan(None),
            ModerationPlan {
                set_banned_to: None,
                replies: &["no_such_user"],
            }
        );
        assert_eq!(
            unban_plan(Some(false)),
            ModerationPlan {
                set_banned_to: None,
                replies: &["not_banned"],
            }
        );
    }

    #[test_log::test]
    fn statistics_report_formatting() {
        let translations = Translations::load().unwrap();
        let lexicon = translations.lexicon("en").unwrap();

        let entries = [
            StatEntry {
                label: "users_total".to_owned(),
                count: 3,
            },
            StatEntry {
                label: "users_alive".to_owned(),
                count: 2,
            },
            StatEntry {
                label: "users_banned".to_owned(),
                count: 1,
            },
        ];

        let header = lexicon.text("/statistics").unwrap();

        expect![[r#"
            <b>Bot statistics</b>
            1. Total users: <b>3</b>
            2. Active users: <b>2</b>
            3. Banned users: <b>1</b>"#]]
        .assert_eq(&format_statistics(&lexicon, header, &entries));
    }
}
