use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::sanitize::sanitize_filename;
use crate::error::{RetrievalError, StorageError};
use crate::models::file::{FileRef, UploadType};

/// 文件获取协作方：签名 URL 下载或直接读存储，调用方视为同步黑盒
pub trait Retriever: Send + Sync {
    fn retrieve(&self, path: &str) -> Result<Vec<u8>, RetrievalError>;
}

/// 本地目录充当对象存储，路径布局为 {user_id}/{upload_type}/{file_name}
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn store(
        &self,
        user_id: Uuid,
        upload_type: UploadType,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<FileRef, StorageError> {
        let sanitized = sanitize_filename(file_name)
            .ok_or_else(|| StorageError::InvalidFileName(file_name.to_string()))?;
        let full_path = format!("{}/{}/{}", user_id, upload_type, sanitized);
        let target = self.root.join(&full_path);

        if target.exists() {
            return Err(StorageError::AlreadyExists(sanitized));
        }
        let io_err = |source| StorageError::Io {
            path: full_path.clone(),
            source,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&target, bytes).map_err(io_err)?;
        info!("文件已上传: {} ({} 字节)", full_path, bytes.len());

        Ok(FileRef {
            file_name: sanitized,
            full_path,
            upload_type,
        })
    }

    /// 目录不存在视为空列表
    pub fn list(&self, user_id: Uuid, upload_type: UploadType) -> Result<Vec<FileRef>, StorageError> {
        let prefix = format!("{}/{}", user_id, upload_type);
        let dir = self.root.join(&prefix);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Io { path: prefix, source }),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: prefix.clone(),
                source,
            })?;
            if !entry.path().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            files.push(FileRef {
                full_path: format!("{}/{}", prefix, file_name),
                file_name,
                upload_type,
            });
        }
        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(files)
    }

    pub fn find(
        &self,
        user_id: Uuid,
        upload_type: UploadType,
        file_name: &str,
    ) -> Result<Option<FileRef>, StorageError> {
        Ok(self
            .list(user_id, upload_type)?
            .into_iter()
            .find(|f| f.file_name == file_name))
    }

    /// 只接受单段文件名，路径分隔符或 `..` 一律拒绝
    pub fn delete(
        &self,
        user_id: Uuid,
        upload_type: UploadType,
        file_name: &str,
    ) -> Result<FileRef, StorageError> {
        let mut parts = Path::new(file_name).components();
        let single = matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None));
        if !single || file_name.contains(['/', '\\']) {
            return Err(StorageError::InvalidFileName(file_name.to_string()));
        }
        let full_path = format!("{}/{}/{}", user_id, upload_type, file_name);
        let target = self
            .resolve(&full_path)
            .map_err(|_| StorageError::InvalidFileName(file_name.to_string()))?;

        fs::remove_file(&target).map_err(|source| match source.kind() {
            ErrorKind::NotFound => StorageError::NotFound(full_path.clone()),
            _ => StorageError::Io {
                path: full_path.clone(),
                source,
            },
        })?;
        info!("文件已删除: {}", full_path);

        Ok(FileRef {
            file_name: file_name.to_string(),
            full_path,
            upload_type,
        })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, RetrievalError> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !safe {
            return Err(RetrievalError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl Retriever for LocalStore {
    fn retrieve(&self, path: &str) -> Result<Vec<u8>, RetrievalError> {
        let target = self.resolve(path)?;
        debug!("读取存储文件: {}", target.display());
        fs::read(&target).map_err(|source| match source.kind() {
            ErrorKind::NotFound => RetrievalError::NotFound(path.to_string()),
            _ => RetrievalError::Io {
                path: path.to_string(),
                source,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_list_and_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let user = Uuid::new_v4();

        let stored = store
            .store(user, UploadType::Pc, "Sales Q1.CSV", b"a,b\n1,2\n")
            .unwrap();
        assert_eq!(stored.file_name, "sales_q1.csv");
        assert_eq!(stored.full_path, format!("{}/pc/sales_q1.csv", user));

        let listed = store.list(user, UploadType::Pc).unwrap();
        assert_eq!(listed, vec![stored.clone()]);
        assert!(store.list(user, UploadType::Scheduled).unwrap().is_empty());

        assert_eq!(store.retrieve(&stored.full_path).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_duplicate_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let user = Uuid::new_v4();
        store.store(user, UploadType::Pc, "a.csv", b"x\n").unwrap();
        assert!(matches!(
            store.store(user, UploadType::Pc, "a.csv", b"y\n"),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_delete_removes_only_the_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let user = Uuid::new_v4();
        let kept = store.store(user, UploadType::Pc, "keep.csv", b"a\n1\n").unwrap();
        let gone = store.store(user, UploadType::Pc, "drop.csv", b"a\n2\n").unwrap();

        let deleted = store.delete(user, UploadType::Pc, "drop.csv").unwrap();
        assert_eq!(deleted, gone);
        assert_eq!(store.list(user, UploadType::Pc).unwrap(), vec![kept]);
        assert!(matches!(
            store.retrieve(&gone.full_path),
            Err(RetrievalError::NotFound(_))
        ));

        // 同名文件可再次上传
        store.store(user, UploadType::Pc, "drop.csv", b"a\n3\n").unwrap();
    }

    #[test]
    fn test_delete_rejects_traversal_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.store(other, UploadType::Pc, "secret.csv", b"x\n").unwrap();

        for name in [
            "..",
            ".",
            "",
            "../secret.csv",
            "..\\secret.csv",
            &format!("../../{}/pc/secret.csv", other),
        ] {
            assert!(
                matches!(
                    store.delete(user, UploadType::Pc, name),
                    Err(StorageError::InvalidFileName(_))
                ),
                "{name:?}"
            );
        }
        assert_eq!(store.list(other, UploadType::Pc).unwrap().len(), 1);

        assert!(matches!(
            store.delete(user, UploadType::Pc, "none.csv"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_retrieve_rejects_traversal_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(matches!(
            store.retrieve("../secret.csv"),
            Err(RetrievalError::InvalidPath(_))
        ));
        assert!(matches!(
            store.retrieve("/etc/passwd"),
            Err(RetrievalError::InvalidPath(_))
        ));
        assert!(matches!(
            store.retrieve("u/pc/none.csv"),
            Err(RetrievalError::NotFound(_))
        ));
    }
}
