use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tokio::fs;

#[async_trait]
pub trait ConfigDeployer {
    async fn deploy(&self, yaml: &str) -> anyhow::Result<()>;
}

/// Writes the rendered profile to a file, replacing it atomically.
pub struct FileDeployer {
    pub path: PathBuf,
}

#[async_trait]
impl ConfigDeployer for FileDeployer {
    async fn deploy(&self, yaml: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("profile.yaml");
        let tmp_path = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        fs::write(&tmp_path, yaml)
            .await
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        if let Err(err) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err).with_context(|| format!("failed to replace {}", self.path.display()));
        }

        tracing::debug!(path = %self.path.display(), bytes = yaml.len(), "profile deployed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn deploy_creates_parents_and_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("output/nested/sub.yaml");
        let deployer = FileDeployer { path: path.clone() };

        deployer.deploy("first: 1\n").await.unwrap();
        deployer.deploy("second: 2\n").await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "second: 2\n");

        let mut entries = fs::read_dir(path.parent().unwrap()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["sub.yaml"]);
    }
}
