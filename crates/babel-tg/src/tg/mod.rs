//! Telegram bot root module: the adaptor stack, the shared bot context
//! and the update dispatch tree.

mod cmd;
mod echo;
mod settings;

pub(crate) mod config;
pub(crate) mod keyboards;
pub(crate) mod middleware;

use crate::db;
use crate::db::users::UserRole;
use crate::i18n::Translations;
use crate::prelude::*;
use crate::session::{MenuState, SessionStorage};
use dptree::di::DependencyMap;
use std::sync::Arc;
use teloxide::adaptors::{CacheMe, DefaultParseMode, Throttle, Trace};
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

pub(crate) use config::Config;

pub(crate) type Bot = Trace<CacheMe<DefaultParseMode<Throttle<teloxide::Bot>>>>;

/// The long-lived bot context shared by all handlers.
pub(crate) struct Ctx {
    pub(crate) bot: Bot,
    pub(crate) db: db::Pool,
    pub(crate) cfg: Arc<Config>,
    pub(crate) translations: Translations,
}

pub(crate) struct RunBotOptions {
    pub(crate) cfg: Config,
    pub(crate) db: db::Pool,
    pub(crate) storage: Arc<SessionStorage>,
    pub(crate) translations: Translations,
}

pub(crate) async fn run_bot(opts: RunBotOptions) -> Result {
    let RunBotOptions {
        cfg,
        db,
        storage,
        translations,
    } = opts;

    let bot: Bot = teloxide::Bot::new(cfg.token.clone())
        .throttle(Default::default())
        .parse_mode(ParseMode::Html)
        .cache_me()
        .trace(teloxide::adaptors::trace::Settings::all());

    let ctx = Arc::new(Ctx {
        bot: bot.clone(),
        db,
        cfg: Arc::new(cfg),
        translations,
    });

    let mut di = DependencyMap::new();
    di.insert(Arc::clone(&ctx));
    di.insert(Arc::clone(&storage));

    info!("Setting the default command menu...");

    bot.set_my_commands(keyboards::menu_commands(
        &ctx.translations.default_lexicon(),
        UserRole::User,
    ))
    .await?;

    let handler = dptree::entry()
        .inspect(middleware::observe_update)
        .branch(
            dptree::entry()
                .filter_map(middleware::filter_has_sender)
                .filter_map_async(middleware::begin_update_scope)
                .filter_async(middleware::filter_not_shadow_banned)
                .inspect(middleware::count_activity)
                .filter_async(middleware::stage_lang_settings)
                .enter_dialogue::<Update, SessionStorage, MenuState>()
                .filter_map_async(middleware::inject_request_ctx)
                .branch(
                    Update::filter_message()
                        .chain(dptree::filter(settings::filter_pm_with_bot))
                        .chain(dptree::case![MenuState::LangMenu(menu)])
                        .chain(dptree::filter(settings::filter_not_start_command))
                        .endpoint(settings::redraw_picker),
                )
                .branch(
                    Update::filter_message()
                        .filter_command::<cmd::admin::Cmd>()
                        .chain(dptree::filter_async(cmd::admin::is_admin))
                        .endpoint(cmd::handle::<cmd::admin::Cmd>()),
                )
                .branch(
                    Update::filter_message()
                        .filter_command::<cmd::regular::Cmd>()
                        .chain(dptree::filter(cmd::regular::filter_pm_only_commands))
                        .endpoint(cmd::handle::<cmd::regular::Cmd>()),
                )
                .branch(
                    Update::filter_callback_query()
                        .chain(dptree::filter(settings::filter_pm_callback))
                        .chain(dptree::case![MenuState::LangMenu(menu)])
                        .endpoint(settings::handle_callback),
                )
                .branch(Update::filter_message().endpoint(echo::handle)),
        )
        .inspect(middleware::observe_skipped_update);

    info!("Starting the bot...");

    Dispatcher::builder(bot, handler)
        .dependencies(di)
        // Lots of update kinds have no handler on purpose. The skip
        // counter accounts for them, so the unhandled-update warning
        // is muted with a noop default handler.
        .default_handler(|_| std::future::ready(()))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");

    Ok(())
}
