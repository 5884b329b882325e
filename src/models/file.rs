use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UploadType {
    Pc,
    GoogleDrive,
    Scheduled,
}

impl UploadType {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadType::Pc => "pc",
            UploadType::GoogleDrive => "google_drive",
            UploadType::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for UploadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已上传文件的元数据，full_path 为存储内相对路径
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub file_name: String,
    pub full_path: String,
    pub upload_type: UploadType,
}
