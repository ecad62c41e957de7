use std::collections::HashMap;

use anyhow::bail;
use serde::Deserialize;

use dbshift_core::{ColumnFilter, ReplacementBuilder, ReplacementSet, RunSettings};
use dbshift_store::ConnectInfo;

/// The JSON parameter file driving one run.
///
/// The three replacement categories are JSON objects mapping old value
/// to new value; their entry order is preserved and becomes the
/// registration order within each category.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Params {
    pub db: ConnectInfo,

    /// Literal text pairs, highest priority.
    #[serde(default)]
    pub text: serde_json::Map<String, serde_json::Value>,
    /// Filesystem path pairs.
    #[serde(default)]
    pub dirs: serde_json::Map<String, serde_json::Value>,
    /// Site URL pairs, lowest priority.
    #[serde(default)]
    pub urls: serde_json::Map<String, serde_json::Value>,

    /// Rows per page. Anything that is not a positive integer (absent,
    /// negative, fractional, non-numeric) selects the built-in default.
    #[serde(default, deserialize_with = "lenient_page_size")]
    pub page_size: u64,
    #[serde(default)]
    pub include_blob: bool,
    #[serde(default = "default_true")]
    pub protect_email: bool,
    /// Only process tables carrying this name prefix.
    #[serde(default)]
    pub table_prefix: Option<String>,
    /// Per-table column exclusions; `true` excludes the whole table.
    #[serde(default)]
    pub exclude: HashMap<String, ColumnFilter>,
    /// When non-empty, only listed tables/columns are processed.
    #[serde(default)]
    pub include: HashMap<String, ColumnFilter>,

    /// Optional table-prefix rename run after the replacement pass.
    #[serde(default)]
    pub rename_prefix: Option<RenamePrefix>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenamePrefix {
    pub from: String,
    pub to: String,
}

fn default_true() -> bool {
    true
}

/// A malformed page size must not reject the whole file; 0 stands for
/// "use the default" downstream.
fn lenient_page_size<'de, D: serde::Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(value.as_u64().unwrap_or(0))
}

impl Params {
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            page_size: self.page_size,
            include_blob: self.include_blob,
            table_prefix: self.table_prefix.clone(),
            protect_email: self.protect_email,
            exclude: self.exclude.clone(),
            include: self.include.clone(),
        }
    }

    /// Derive the resolved replacement set and probe patterns.
    /// Categories register in priority order: text, then dirs, then
    /// urls, so on a key collision the higher category wins.
    pub fn build_replacements(&self) -> anyhow::Result<(ReplacementSet, Vec<String>)> {
        let mut builder = ReplacementBuilder::new(self.protect_email);
        for (search, replace) in entries("text", &self.text)? {
            builder.text(search, replace);
        }
        for (search, replace) in entries("dirs", &self.dirs)? {
            builder.dir(search, replace);
        }
        for (search, replace) in entries("urls", &self.urls)? {
            builder.url(search, replace);
        }
        Ok(builder.finish())
    }
}

fn entries<'a>(
    category: &str,
    map: &'a serde_json::Map<String, serde_json::Value>,
) -> anyhow::Result<Vec<(&'a str, &'a str)>> {
    let mut out = Vec::with_capacity(map.len());
    for (search, replace) in map {
        let Some(replace) = replace.as_str() else {
            bail!("{category}.{search}: replacement must be a string");
        };
        out.push((search.as_str(), replace));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Params {
        serde_json::from_str(json).unwrap()
    }

    const MINIMAL: &str = r#"{
        "db": { "host": "localhost", "user": "root", "database": "site" }
    }"#;

    #[test]
    fn minimal_file_uses_defaults() {
        let params = parse(MINIMAL);
        assert_eq!(params.db.port, 3306);
        assert!(params.protect_email);
        assert!(!params.include_blob);
        assert_eq!(params.settings().effective_page_size(), 10_000);
        let (set, probes) = params.build_replacements().unwrap();
        assert!(set.is_empty());
        assert!(probes.is_empty());
    }

    #[test]
    fn full_file_round_trips_into_settings() {
        let params = parse(
            r#"{
                "db": { "host": "db.internal", "port": 3307, "user": "app",
                        "password": "secret", "database": "site", "ssl": true },
                "urls": { "http://old.test": "https://new.test" },
                "dirs": { "/var/www/old": "/srv/new" },
                "text": { "Old Brand": "New Brand" },
                "page_size": 500,
                "include_blob": true,
                "protect_email": false,
                "table_prefix": "wp_",
                "exclude": { "wp_logs": true, "wp_posts": ["guid"] },
                "rename_prefix": { "from": "wp_", "to": "site_" }
            }"#,
        );

        let settings = params.settings();
        assert_eq!(settings.page_size, 500);
        assert!(settings.include_blob);
        assert_eq!(settings.table_prefix.as_deref(), Some("wp_"));
        assert_eq!(settings.exclude["wp_logs"], ColumnFilter::AllColumns);
        assert!(!settings.column_allowed("wp_posts", "guid"));

        let rename = params.rename_prefix.as_ref().unwrap();
        assert_eq!((rename.from.as_str(), rename.to.as_str()), ("wp_", "site_"));

        let (set, probes) = params.build_replacements().unwrap();
        assert!(set.iter().any(|(s, r)| s == "Old Brand" && r == "New Brand"));
        assert!(set.iter().any(|(s, _)| s == "old.test/"));
        assert!(probes.iter().any(|p| p == "%old.test%"));
    }

    #[test]
    fn category_priority_is_text_dirs_urls() {
        let params = parse(
            r#"{
                "db": { "host": "h", "user": "u", "database": "d" },
                "urls": { "http://old.test": "http://from-url.test" },
                "text": { "old.test": "from-text.test" }
            }"#,
        );
        let (set, _) = params.build_replacements().unwrap();
        let (_, r) = set.iter().find(|(s, _)| *s == "old.test").unwrap();
        assert_eq!(r, "from-text.test");
    }

    #[test]
    fn malformed_page_size_falls_back_to_default() {
        for bad in ["-5", "2.5", "\"lots\"", "null"] {
            let params = parse(&format!(
                r#"{{ "db": {{ "host": "h", "user": "u", "database": "d" }},
                     "page_size": {bad} }}"#,
            ));
            assert_eq!(params.settings().effective_page_size(), 10_000, "page_size {bad}");
        }

        let params = parse(
            r#"{ "db": { "host": "h", "user": "u", "database": "d" }, "page_size": 250 }"#,
        );
        assert_eq!(params.settings().effective_page_size(), 250);
    }

    #[test]
    fn non_string_replacement_is_an_error() {
        let params = parse(
            r#"{
                "db": { "host": "h", "user": "u", "database": "d" },
                "text": { "old": 5 }
            }"#,
        );
        let err = params.build_replacements().unwrap_err();
        assert!(err.to_string().contains("text.old"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<Params, _> = serde_json::from_str(
            r#"{
                "db": { "host": "h", "user": "u", "database": "d" },
                "tyop": true
            }"#,
        );
        assert!(result.is_err());
    }
}
