//! 影像文件存储管理

use clinic_core::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// 存储管理器
///
/// 以相对路径组织文件（每个患者一个目录），根目录由配置决定。
#[derive(Clone)]
pub struct StorageManager {
    base_path: PathBuf,
}

impl StorageManager {
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: PathBuf::from(base_path),
        }
    }

    /// 存储文件，必要时创建患者目录，返回完整落盘路径
    pub async fn store_file(&self, data: &[u8], path: &str) -> Result<String> {
        let full_path = self.base_path.join(path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full_path, data).await?;
        info!("Stored file {} ({} bytes)", full_path.display(), data.len());

        Ok(full_path.to_string_lossy().to_string())
    }

    /// 读取文件内容
    pub async fn get_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    /// 检查文件是否存在
    pub async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(self.base_path.join(path))
            .await
            .unwrap_or(false)
    }

    /// 删除文件
    pub async fn delete_file(&self, path: &str) -> Result<()> {
        tokio::fs::remove_file(self.base_path.join(path)).await?;
        Ok(())
    }

    pub fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_storage() -> StorageManager {
        let dir = std::env::temp_dir().join(format!("clinic-storage-test-{}", Uuid::new_v4()));
        StorageManager::new(&dir.to_string_lossy())
    }

    #[tokio::test]
    async fn test_store_and_read_round_trip() {
        let storage = temp_storage();
        let patient_dir = format!("{}/20250101_120000.png", Uuid::new_v4());

        storage.store_file(b"image-bytes", &patient_dir).await.unwrap();
        assert!(storage.exists(&patient_dir).await);

        let data = storage.get_file(&patient_dir).await.unwrap();
        assert_eq!(data, b"image-bytes");
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let storage = temp_storage();
        assert!(!storage.exists("missing/file.png").await);
        assert!(storage.get_file("missing/file.png").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_file() {
        let storage = temp_storage();
        let path = format!("{}/20250101_120000.jpg", Uuid::new_v4());

        storage.store_file(b"x", &path).await.unwrap();
        storage.delete_file(&path).await.unwrap();
        assert!(!storage.exists(&path).await);
    }
}
