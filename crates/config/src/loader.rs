use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    Error, Result, env_subst::substitute_env, schema::CourierConfig,
    template::default_config_template,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "courier.toml",
    "courier.yaml",
    "courier.yml",
    "courier.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<CourierConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./courier.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/courier/courier.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `CourierConfig::default()` when nothing is found or the file
/// fails to parse.
pub fn discover_and_load() -> CourierConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                CourierConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            CourierConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Apply `COURIER_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut CourierConfig) {
    apply_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_overrides_with(config: &mut CourierConfig, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    if let Some(url) = lookup("COURIER_DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(token) = lookup("COURIER_API_TOKEN") {
        config.server.api_token = Some(token);
    }
    if let Some(port) = lookup("COURIER_PORT").and_then(|p| p.parse().ok()) {
        config.server.port = port;
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/courier/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "courier").map(|d| d.config_dir().to_path_buf())
}

/// Write the documented default template to `path`, refusing to overwrite.
pub fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, default_config_template())?;
    debug!(path = %path.display(), "wrote default config");
    Ok(())
}

pub(crate) fn parse_config(raw: &str, path: &Path) -> Result<CourierConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::EmailProviderKind};

    #[test]
    fn loads_partial_toml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.toml");
        std::fs::write(
            &path,
            r#"
[queue]
batch_size = 25

[email]
provider = "smtp"

[email.smtp]
host = "smtp.example.com"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.queue.batch_size, 25);
        assert_eq!(config.queue.concurrency, 10);
        assert_eq!(config.email.provider, EmailProviderKind::Smtp);
        assert_eq!(config.email.smtp.host.as_deref(), Some("smtp.example.com"));
        assert_eq!(config.inbound.debounce_secs, 7);
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("courier.yaml");
        std::fs::write(&yaml, "inbound:\n  debounce_secs: 3\n").unwrap();
        assert_eq!(load_config(&yaml).unwrap().inbound.debounce_secs, 3);

        let json = dir.path().join("courier.json");
        std::fs::write(&json, r#"{"triggers": {"timezone": "America/Mendoza"}}"#).unwrap();
        assert_eq!(
            load_config(&json).unwrap().triggers.timezone,
            "America/Mendoza"
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn env_overrides_replace_values() {
        let mut config = CourierConfig::default();
        apply_overrides_with(&mut config, |name| match name {
            "COURIER_DATABASE_URL" => Some("sqlite::memory:".into()),
            "COURIER_API_TOKEN" => Some("tok".into()),
            "COURIER_PORT" => Some("not-a-port".into()),
            _ => None,
        });
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.server.api_token.as_deref(), Some("tok"));
        assert_eq!(config.server.port, 8787);
    }

    #[test]
    fn default_template_parses_and_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("courier.toml");
        write_default_config(&path).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.queue.batch_size, 100);
        assert!(write_default_config(&path).is_err());
    }
}
