use easy_ext::ext;
use teloxide::types::{Chat, UpdateKind, User};

pub(crate) mod prelude {
    pub(crate) use super::{ChatExt as _, UpdateKindExt as _, UserExt as _};
}

#[ext(UserExt)]
pub(crate) impl User {
    /// Identifies the user in logs. Usernames are not always set,
    /// so the numeric id is always included.
    fn debug_id(&self) -> String {
        let name = self
            .username
            .as_deref()
            .map(|username| format!("@{username}"))
            .unwrap_or_else(|| self.full_name());

        format!("{name} ({})", self.id.0)
    }
}

#[ext(ChatExt)]
pub(crate) impl Chat {
    fn debug_id(&self) -> String {
        match self.username() {
            Some(username) => format!("@{username} ({})", self.id.0),
            None => format!("{} ({})", self.title().unwrap_or("<private>"), self.id.0),
        }
    }
}

#[ext(UpdateKindExt)]
pub(crate) impl UpdateKind {
    /// Static name of the update kind, used as a metric label.
    fn discriminator(&self) -> &'static str {
        match self {
            UpdateKind::Message(_) => "Message",
            UpdateKind::EditedMessage(_) => "EditedMessage",
            UpdateKind::ChannelPost(_) => "ChannelPost",
            UpdateKind::EditedChannelPost(_) => "EditedChannelPost",
            UpdateKind::InlineQuery(_) => "InlineQuery",
            UpdateKind::ChosenInlineResult(_) => "ChosenInlineResult",
            UpdateKind::CallbackQuery(_) => "CallbackQuery",
            UpdateKind::ShippingQuery(_) => "ShippingQuery",
            UpdateKind::PreCheckoutQuery(_) => "PreCheckoutQuery",
            UpdateKind::Poll(_) => "Poll",
            UpdateKind::PollAnswer(_) => "PollAnswer",
            UpdateKind::MyChatMember(_) => "MyChatMember",
            UpdateKind::ChatMember(_) => "ChatMember",
            UpdateKind::ChatJoinRequest(_) => "ChatJoinRequest",
            UpdateKind::Error(_) => "Error",
        }
    }
}
