#[cfg(test)]
mod tests {
    use super::super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.data.root, PathBuf::from("data"));
        assert_eq!(config.clinicaltrials.condition, "Pulmonary Arterial Hypertension");
        assert_eq!(config.clinicaltrials.limit, 5);
        assert_eq!(config.filings.forms, vec!["10-K", "8-K"]);
        assert!(config.literature.use_default);
        assert!(config.database.url.is_none());
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [clinicaltrials]
            limit = 20

            [literature]
            use_default = false
            path = "refs/literature.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.clinicaltrials.limit, 20);
        assert_eq!(config.clinicaltrials.start_window_months, 120);
        assert!(!config.literature.use_default);
        assert_eq!(config.literature.path, Some(PathBuf::from("refs/literature.json")));
    }

    #[test]
    fn test_env_fills_unset_secrets_only() {
        let mut config = Config::from_toml(
            r#"
            [filings]
            api_key = "from-file"
            "#,
        )
        .unwrap();
        let vars = env(&[
            ("FMP_API_KEY", "from-env"),
            ("GOOGLE_SEARCH_API_KEY", "gkey"),
            ("GOOGLE_SEARCH_ENGINE_ID", "  "),
            ("DATABASE_URL", "postgres://localhost/pah"),
            ("TRIALSCOPE_BIND", "127.0.0.1:9000"),
        ]);
        config.apply_env(|k| vars.get(k).cloned());

        assert_eq!(config.filings.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.publications.api_key.as_deref(), Some("gkey"));
        assert_eq!(config.publications.engine_id, None);
        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/pah"));
        assert_eq!(config.server.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_bind_env_overrides_file() {
        let mut config = Config::from_toml("[server]\nbind = \"127.0.0.1:8080\"").unwrap();
        config.apply_env(|_| None);
        assert_eq!(config.server.bind, "127.0.0.1:8080");

        let vars = env(&[("TRIALSCOPE_BIND", "0.0.0.0:9100")]);
        config.apply_env(|k| vars.get(k).cloned());
        assert_eq!(config.server.bind, "0.0.0.0:9100");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml("[server]\nbind = 8000").is_err());
    }
}
