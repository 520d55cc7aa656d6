mod config;
mod db;
mod error;
mod i18n;
mod observability;
mod session;
mod tg;

pub mod util;

pub use crate::error::*;
pub use config::*;
pub use observability::*;

#[allow(unused_imports)]
mod prelude {
    pub(crate) use crate::error::prelude::*;
    pub(crate) use crate::observability::logging::prelude::*;
    pub(crate) use crate::util::prelude::*;
}

/// Run the telegram bot processing loop
pub async fn run(config: Config) -> Result<()> {
    let translations = i18n::Translations::load()?;

    let db = db::init(config.db).await?;

    let storage = session::open(config.session).await?;

    let opts = tg::RunBotOptions {
        cfg: config.tg,
        db: db.clone(),
        storage,
        translations,
    };

    let result = tg::run_bot(opts).await;

    db::close(db).await;

    result
}
