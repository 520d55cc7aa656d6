//! The translation registry. Built once at startup from the YAML tables
//! compiled into the binary, immutable afterwards.

use crate::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub(crate) const DEFAULT_LOCALE: &str = "ru";

/// Localization tables compiled into the binary.
const LOCALES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en.yaml")),
    ("ru", include_str!("../locales/ru.yaml")),
];

#[derive(Debug, Error)]
pub(crate) enum I18nError {
    #[error("Failed to parse the `{locale}` localization table")]
    ParseTable {
        locale: &'static str,
        source: serde_yaml::Error,
    },

    #[error("The default locale `{locale}` has no localization table")]
    NoDefaultTable { locale: &'static str },
}

/// One locale's key to message template map. Cheap to clone.
#[derive(Clone)]
pub(crate) struct Lexicon {
    locale: Arc<str>,
    messages: Arc<HashMap<String, String>>,
}

impl Lexicon {
    pub(crate) fn locale(&self) -> &str {
        &self.locale
    }

    /// A missing key is tolerated: the caller is expected to skip the
    /// reply it wanted to send.
    pub(crate) fn text(&self, key: &str) -> Option<&str> {
        let text = self.messages.get(key).map(String::as_str);

        if text.is_none() {
            warn!(key, locale = self.locale(), "Missing localization key");
        }

        text
    }

    #[cfg(test)]
    pub(crate) fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.messages.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// Registry of all localization tables, keyed by locale code.
#[derive(Clone)]
pub(crate) struct Translations {
    tables: Arc<HashMap<String, Lexicon>>,
    /// Locale codes in sorted order, for stable keyboard layouts.
    locales: Arc<[String]>,
}

impl Translations {
    pub(crate) fn load() -> Result<Self> {
        let tables: HashMap<String, Lexicon> = LOCALES
            .iter()
            .map(|(locale, table)| {
                let messages: HashMap<String, String> = serde_yaml::from_str(table)
                    .map_err(err_ctx!(I18nError::ParseTable { locale: *locale }))?;

                let lexicon = Lexicon {
                    locale: Arc::from(*locale),
                    messages: Arc::new(messages),
                };

                Ok(((*locale).to_owned(), lexicon))
            })
            .collect::<Result<_>>()?;

        if !tables.contains_key(DEFAULT_LOCALE) {
            return Err(err!(I18nError::NoDefaultTable {
                locale: DEFAULT_LOCALE
            }));
        }

        let mut locales: Vec<String> = tables.keys().cloned().collect();
        locales.sort_unstable();

        Ok(Self {
            tables: Arc::new(tables),
            locales: locales.into(),
        })
    }

    pub(crate) fn locales(&self) -> &[String] {
        &self.locales
    }

    pub(crate) fn supports(&self, locale: &str) -> bool {
        self.tables.contains_key(locale)
    }

    pub(crate) fn lexicon(&self, locale: &str) -> Option<Lexicon> {
        self.tables.get(locale).cloned()
    }

    pub(crate) fn default_lexicon(&self) -> Lexicon {
        self.lexicon(DEFAULT_LOCALE)
            .expect("BUG: the default locale always has a table")
    }

    /// Picks the lexicon for one update. The first locale present wins:
    /// the menu's pending selection, then the stored user language, then
    /// the locale hinted by the client. An unsupported winner falls
    /// through to the default table rather than to the next candidate.
    pub(crate) fn resolve(
        &self,
        pending: Option<&str>,
        stored: Option<&str>,
        hint: Option<&str>,
    ) -> Lexicon {
        [pending, stored, hint]
            .into_iter()
            .flatten()
            .next()
            .and_then(|locale| self.lexicon(locale))
            .unwrap_or_else(|| self.default_lexicon())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn tables_load_and_the_default_is_present() {
        let translations = Translations::load().unwrap();

        assert!(translations.supports(DEFAULT_LOCALE));
        assert_eq!(translations.locales(), ["en", "ru"]);
    }

    #[test_log::test]
    fn locale_tables_are_in_sync() {
        let translations = Translations::load().unwrap();

        let en = translations.lexicon("en").unwrap();
        let ru = translations.lexicon("ru").unwrap();

        assert_eq!(en.keys(), ru.keys());
    }

    #[test_log::test]
    fn resolution_prefers_the_first_present_locale() {
        let translations = Translations::load().unwrap();

        let resolved = translations.resolve(Some("en"), Some("ru"), Some("ru"));
        assert_eq!(resolved.locale(), "en");

        let resolved = translations.resolve(None, Some("en"), Some("ru"));
        assert_eq!(resolved.locale(), "en");

        let resolved = translations.resolve(None, None, Some("en"));
        assert_eq!(resolved.locale(), "en");

        let resolved = translations.resolve(None, None, None);
        assert_eq!(resolved.locale(), DEFAULT_LOCALE);
    }

    #[test_log::test]
    fn unsupported_winner_falls_back_to_the_default() {
        let translations = Translations::load().unwrap();

        let resolved = translations.resolve(None, Some("de"), Some("en"));
        assert_eq!(resolved.locale(), DEFAULT_LOCALE);
    }
}
