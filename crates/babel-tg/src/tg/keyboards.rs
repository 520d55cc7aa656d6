//! Inline keyboards and command menus.

use crate::db::users::UserRole;
use crate::i18n::Lexicon;
use crate::prelude::*;
use teloxide::types::{BotCommand, InlineKeyboardButton, InlineKeyboardMarkup};

/// Callback payloads of the picker's service buttons. The locale buttons
/// carry the locale code itself as the payload.
pub(crate) const SAVE_LANG_DATA: &str = "save_lang_button_data";
pub(crate) const CANCEL_LANG_DATA: &str = "cancel_lang_button_data";

const CHECK_MARK: &str = "✅";

/// The language picker: one row per locale with the current selection
/// check-marked, then a save/cancel row.
pub(crate) fn lang_menu(
    lexicon: &Lexicon,
    locales: &[String],
    checked: Option<&str>,
) -> InlineKeyboardMarkup {
    let locale_rows = locales.iter().map(|locale| {
        let name = lexicon.text(locale).unwrap_or(locale.as_str());

        let text = if checked == Some(locale.as_str()) {
            format!("{name} {CHECK_MARK}")
        } else {
            name.to_owned()
        };

        vec![InlineKeyboardButton::callback(text, locale.clone())]
    });

    let service_row = vec![
        InlineKeyboardButton::callback(
            lexicon.text("save_lang_button").unwrap_or("Save").to_owned(),
            SAVE_LANG_DATA,
        ),
        InlineKeyboardButton::callback(
            lexicon
                .text("cancel_lang_button")
                .unwrap_or("Cancel")
                .to_owned(),
            CANCEL_LANG_DATA,
        ),
    ];

    InlineKeyboardMarkup::new(locale_rows.chain([service_row]))
}

/// The `set_my_commands` menu for a chat, localized and trimmed by role.
pub(crate) fn menu_commands(lexicon: &Lexicon, role: UserRole) -> Vec<BotCommand> {
    let mut commands = vec![
        ("start", "/start_description"),
        ("help", "/help_description"),
        ("lang", "/lang_description"),
    ];

    if role == UserRole::Admin {
        commands.extend([
            ("statistics", "/statistics_description"),
            ("ban", "/ban_description"),
            ("unban", "/unban_description"),
        ]);
    }

    commands.map_collect(|(command, description)| {
        BotCommand::new(command, lexicon.text(description).unwrap_or(command))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Translations;
    use expect_test::expect;
    use itertools::Itertools;

    fn render_keyboard(keyboard: &InlineKeyboardMarkup) -> String {
        use teloxide::types::InlineKeyboardButtonKind;

        keyboard
            .inline_keyboard
            .iter()
            .map(|row| {
                row.iter()
                    .map(|button| {
                        let data = match &button.kind {
                            InlineKeyboardButtonKind::CallbackData(data) => data.as_str(),
                            other => panic!("unexpected button kind: {other:?}"),
                        };
                        format!("[{}]({data})", button.text)
                    })
                    .join(" ")
            })
            .join("\n")
    }

    #[test_log::test]
    fn lang_menu_marks_the_checked_locale() {
        let translations = Translations::load().unwrap();
        let lexicon = translations.lexicon("ru").unwrap();

        let keyboard = lang_menu(&lexicon, translations.locales(), Some("ru"));

        expect![[r#"
            [English](en)
            [Русский ✅](ru)
            [Сохранить](save_lang_button_data) [Отменить](cancel_lang_button_data)"#]]
        .assert_eq(&render_keyboard(&keyboard));
    }

    #[test_log::test]
    fn lang_menu_without_a_selection() {
        let translations = Translations::load().unwrap();
        let lexicon = translations.lexicon("en").unwrap();

        let keyboard = lang_menu(&lexicon, translations.locales(), None);

        expect![[r#"
            [English](en)
            [Русский](ru)
            [Save](save_lang_button_data) [Cancel](cancel_lang_button_data)"#]]
        .assert_eq(&render_keyboard(&keyboard));
    }

    #[test_log::test]
    fn menu_commands_are_trimmed_by_role() {
        let translations = Translations::load().unwrap();
        let lexicon = translations.lexicon("en").unwrap();

        let user_menu = menu_commands(&lexicon, UserRole::User);
        assert_eq!(
            user_menu.iter().map(|cmd| cmd.command.as_str()).collect::<Vec<_>>(),
            ["start", "help", "lang"]
        );

        let admin_menu = menu_commands(&lexicon, UserRole::Admin);
        assert_eq!(
            admin_menu.iter().map(|cmd| cmd.command.as_str()).collect::<Vec<_>>(),
            ["start", "help", "lang", "statistics", "ban", "unban"]
        );

        // Descriptions come from the lexicon
        assert_eq!(admin_menu[2].description, "interface language");
    }
}
