use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Video,
    Document,
    Image,
    Other,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Video => "video",
            FileType::Document => "document",
            FileType::Image => "image",
            FileType::Other => "other",
        }
    }

    /// Classifies a file by the extension at the end of its url or path
    pub fn from_url(url: &str) -> Self {
        let name = url.rsplit('/').next().unwrap_or(url);
        let Some((_, ext)) = name.rsplit_once('.') else {
            return FileType::Other;
        };

        match ext.to_ascii_lowercase().as_str() {
            "pdf" => FileType::Pdf,
            "mp4" | "avi" | "mov" | "wmv" => FileType::Video,
            "doc" | "docx" | "txt" | "rtf" => FileType::Document,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" => FileType::Image,
            _ => FileType::Other,
        }
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(FileType::Pdf),
            "video" => Ok(FileType::Video),
            "document" => Ok(FileType::Document),
            "image" => Ok(FileType::Image),
            "other" => Ok(FileType::Other),
            other => Err(format!("Unknown file type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub course_id: i32,
    pub file_url: String,
    pub file_type: FileType,
    pub upload_date: DateTime<Utc>,
    pub created_by: i32,
}
