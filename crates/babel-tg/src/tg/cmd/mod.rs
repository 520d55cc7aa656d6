pub(crate) mod admin;
pub(crate) mod regular;

use crate::prelude::*;
use crate::tg;
use crate::tg::middleware::{self, RequestCtx};
use crate::util::DynResult;
use crate::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::Message;

#[async_trait]
pub(crate) trait Command: fmt::Debug + Send + Sync + 'static {
    async fn handle(self, ctx: &tg::Ctx, req: &RequestCtx, msg: &Message) -> Result;
}

/// Returns a dispatcher endpoint that runs the command handler and then
/// seals the update's database scope according to the outcome.
pub(crate) fn handle<'a, C: Command>(
) -> impl Fn(Arc<tg::Ctx>, RequestCtx, Message, C) -> BoxFuture<'a, DynResult> {
    move |ctx, req, msg, cmd| {
        let span = info_span!(
            "handle_command",
            sender = %req.user.debug_id(),
            chat = %msg.chat.debug_id(),
            cmd = format_args!("{cmd:?}")
        );

        let fut = async move {
            debug!("Processing command");

            let result = cmd.handle(&ctx, &req, &msg).await;
            let result = middleware::finish_update(&req.scope, result).await;

            if let Err(err) = &result {
                warn!(
                    err = tracing_err(err),
                    id = err.id(),
                    "Command handler returned an error"
                );
            }

            result.map_err(Into::into)
        };

        Box::pin(fut.instrument(span))
    }
}

/// Replies in the message's chat with the lexicon text stored under `key`.
/// A missing key is already logged by the lexicon, so the reply is just
/// skipped in that case.
pub(crate) async fn reply_key(
    ctx: &tg::Ctx,
    req: &RequestCtx,
    msg: &Message,
    key: &str,
) -> Result {
    let Some(text) = req.lexicon.text(key) else {
        return Ok(());
    };

    ctx.bot
        .send_message(msg.chat.id, text)
        .reply_to_message_id(msg.id)
        .await?;

    Ok(())
}
