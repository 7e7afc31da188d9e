use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> anyhow::Result<Self> {
        let base = BaseDirs::new().ok_or_else(|| anyhow!("failed to resolve base directories"))?;
        let config_dir = base.home_dir().join(".config/proxysub");
        Ok(Self { config_dir })
    }

    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.config_dir.join("templates")
    }

    pub fn default_template_path(&self) -> PathBuf {
        self.templates_dir().join("ryan.yaml")
    }

    pub fn subscription_file(&self) -> PathBuf {
        self.config_dir.join("subs.yaml")
    }

    pub fn app_config_path(&self) -> PathBuf {
        self.config_dir.join("app.yaml")
    }

    pub fn output_profile_path(&self) -> PathBuf {
        self.config_dir.join("output/sub.yaml")
    }

    pub async fn ensure_runtime_dirs(&self) -> anyhow::Result<()> {
        fs::create_dir_all(self.config_dir()).await?;
        fs::create_dir_all(self.templates_dir()).await?;
        if let Some(parent) = self.output_profile_path().parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Relative template names resolve inside the templates directory when present there.
    pub fn resolve_template(&self, provided: &Path) -> PathBuf {
        if provided.is_absolute() {
            return provided.to_path_buf();
        }
        let candidate = self.templates_dir().join(provided);
        if candidate.exists() {
            candidate
        } else {
            provided.to_path_buf()
        }
    }
}

/// Defaults for the `build` command, read from `app.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl AppConfig {
    pub fn template_path(&self, paths: &AppPaths) -> PathBuf {
        self.template
            .as_deref()
            .map(|path| paths.resolve_template(path))
            .unwrap_or_else(|| paths.default_template_path())
    }

    pub fn subscription_path(&self, paths: &AppPaths) -> PathBuf {
        self.subscription
            .clone()
            .unwrap_or_else(|| paths.subscription_file())
    }

    pub fn output_path(&self, paths: &AppPaths) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| paths.output_profile_path())
    }
}

pub async fn load_app_config(paths: &AppPaths) -> anyhow::Result<AppConfig> {
    match fs::read_to_string(paths.app_config_path()).await {
        Ok(raw) if raw.trim().is_empty() => Ok(AppConfig::default()),
        Ok(raw) => Ok(serde_yaml::from_str(&raw)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(err) => Err(err.into()),
    }
}

pub async fn save_app_config(paths: &AppPaths, cfg: &AppConfig) -> anyhow::Result<()> {
    if let Some(parent) = paths.app_config_path().parent() {
        fs::create_dir_all(parent).await?;
    }
    let yaml = serde_yaml::to_string(cfg)?;
    fs::write(paths.app_config_path(), yaml).await?;
    Ok(())
}

/// Writes a default `app.yaml` pointing at the standard paths.
///
/// Returns `false` without touching anything when the file already exists.
pub async fn init_app_config(paths: &AppPaths) -> anyhow::Result<bool> {
    paths.ensure_runtime_dirs().await?;

    let config_path = paths.app_config_path();
    let exists = fs::try_exists(&config_path)
        .await
        .with_context(|| format!("failed to check {}", config_path.display()))?;
    if exists {
        return Ok(false);
    }

    let defaults = AppConfig {
        template: Some(paths.default_template_path()),
        subscription: Some(paths.subscription_file()),
        output: Some(paths.output_profile_path()),
    };
    save_app_config(paths, &defaults).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_paths(temp_dir: &TempDir) -> AppPaths {
        AppPaths::with_config_dir(temp_dir.path().join("config"))
    }

    #[tokio::test]
    async fn test_app_paths_layout() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_test_paths(&temp_dir);

        assert_eq!(
            paths.default_template_path(),
            temp_dir.path().join("config/templates/ryan.yaml")
        );
        assert_eq!(
            paths.subscription_file(),
            temp_dir.path().join("config/subs.yaml")
        );
        assert_eq!(
            paths.app_config_path(),
            temp_dir.path().join("config/app.yaml")
        );
        assert_eq!(
            paths.output_profile_path(),
            temp_dir.path().join("config/output/sub.yaml")
        );
    }

    #[tokio::test]
    async fn test_ensure_runtime_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_test_paths(&temp_dir);

        paths.ensure_runtime_dirs().await.unwrap();

        assert!(paths.config_dir().exists());
        assert!(paths.templates_dir().exists());
        assert!(paths.output_profile_path().parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_resolve_template_prefers_templates_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_test_paths(&temp_dir);
        paths.ensure_runtime_dirs().await.unwrap();
        fs::write(paths.templates_dir().join("custom.yaml"), "mode: rule\n")
            .await
            .unwrap();

        assert_eq!(
            paths.resolve_template(Path::new("custom.yaml")),
            paths.templates_dir().join("custom.yaml")
        );
        assert_eq!(
            paths.resolve_template(Path::new("elsewhere.yaml")),
            PathBuf::from("elsewhere.yaml")
        );
    }

    #[tokio::test]
    async fn test_load_save_app_config() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_test_paths(&temp_dir);

        // Missing file yields defaults
        let config = load_app_config(&paths).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.output_path(&paths), paths.output_profile_path());

        let new_config = AppConfig {
            template: None,
            subscription: Some(PathBuf::from("/srv/subs.yaml")),
            output: Some(PathBuf::from("/srv/out/sub.yaml")),
        };
        save_app_config(&paths, &new_config).await.unwrap();

        let loaded = load_app_config(&paths).await.unwrap();
        assert_eq!(loaded, new_config);
        assert_eq!(loaded.template_path(&paths), paths.default_template_path());
        assert_eq!(
            loaded.subscription_path(&paths),
            PathBuf::from("/srv/subs.yaml")
        );
    }

    #[tokio::test]
    async fn test_empty_app_config_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_test_paths(&temp_dir);
        paths.ensure_runtime_dirs().await.unwrap();
        fs::write(paths.app_config_path(), "\n").await.unwrap();

        assert_eq!(load_app_config(&paths).await.unwrap(), AppConfig::default());
    }

    #[tokio::test]
    async fn test_init_app_config_keeps_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let paths = create_test_paths(&temp_dir);

        assert!(init_app_config(&paths).await.unwrap());
        let written = load_app_config(&paths).await.unwrap();
        assert_eq!(written.template, Some(paths.default_template_path()));
        assert_eq!(written.output, Some(paths.output_profile_path()));

        fs::write(paths.app_config_path(), "subscription: /srv/subs.yaml\n")
            .await
            .unwrap();
        assert!(!init_app_config(&paths).await.unwrap());
        assert_eq!(
            fs::read_to_string(paths.app_config_path()).await.unwrap(),
            "subscription: /srv/subs.yaml\n"
        );
    }
}
