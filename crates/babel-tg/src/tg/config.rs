use serde::Deserialize;
use teloxide::types::UserId;

#[derive(Deserialize, Clone)]
pub(crate) struct Config {
    pub(crate) token: String,

    /// Users granted the admin role when they first talk to the bot
    #[serde(default)]
    pub(crate) admin_ids: Vec<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_ids_parse_from_a_comma_separated_list() {
        let cfg: Config = envy::prefixed("TEST_TG_")
            .from_iter([
                ("TEST_TG_TOKEN".to_owned(), "123456:secret".to_owned()),
                ("TEST_TG_ADMIN_IDS".to_owned(), "343536,565758".to_owned()),
            ])
            .unwrap();

        assert_eq!(cfg.admin_ids, [UserId(343536), UserId(565758)]);
    }

    #[test]
    fn admin_ids_default_to_empty() {
        let cfg: Config = envy::prefixed("TEST_TG_EMPTY_")
            .from_iter([("TEST_TG_EMPTY_TOKEN".to_owned(), "123456:secret".to_owned())])
            .unwrap();

        assert!(cfg.admin_ids.is_empty());
    }
}
