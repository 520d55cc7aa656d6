use crate::prelude::*;
use crate::tg;
use crate::tg::cmd::reply_key;
use crate::tg::middleware::{self, RequestCtx};
use crate::util::DynResult;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::Message;

/// Fallback for messages no other branch claimed: copy the message back
/// to its own chat, whatever the content type.
#[instrument(skip_all, fields(sender = %req.user.debug_id(), chat = %msg.chat.debug_id()))]
pub(crate) async fn handle(ctx: Arc<tg::Ctx>, req: RequestCtx, msg: Message) -> DynResult {
    let result = handle_imp(&ctx, &req, &msg).await;
    let result = middleware::finish_update(&req.scope, result).await;

    if let Err(err) = &result {
        warn!(
            err = tracing_err(err),
            id = err.id(),
            "Echo handler returned an error"
        );
    }

    result.map_err(Into::into)
}

async fn handle_imp(ctx: &tg::Ctx, req: &RequestCtx, msg: &Message) -> Result {
    debug!("Echoing the message back");

    let result = ctx
        .bot
        .copy_message(msg.chat.id, msg.chat.id, msg.id)
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(teloxide::RequestError::Api(err)) => {
            debug!(
                err = tracing_err(&err),
                "Couldn't copy the message, replying with a notice"
            );
            reply_key(ctx, req, msg, "no_echo").await
        }
        Err(err) => Err(err.into()),
    }
}
