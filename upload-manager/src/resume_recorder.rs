use super::multipart_uploader::CompletedPart;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Result as IoResult,
    path::{Path, PathBuf},
    time::SystemTime,
};

/// 断点续传记录
///
/// 以单个 JSON 文档保存在源文件旁边的隐藏文件中，
/// 每上传完成若干个分片重写一次，上传成功后删除。
/// 源文件的修改时间与记录不一致时记录作废
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct ResumeRecord {
    /// 分片上传任务的 uploadId
    pub(crate) upload_id: String,

    /// 已经上传完成的分片
    pub(crate) parts: Vec<CompletedPart>,

    /// 源文件的最后修改时间
    pub(crate) last_modification: DateTime<Utc>,
}

impl Default for ResumeRecord {
    fn default() -> Self {
        Self {
            upload_id: String::new(),
            parts: Vec::new(),
            last_modification: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }
}

impl ResumeRecord {
    /// 把记录写入指定的文件，整个文档一次写入
    pub(crate) fn store(&self, path: &Path) -> IoResult<()> {
        let encoded = serde_json::to_vec(self)?;
        fs::write(path, encoded)
    }

    /// 从指定的文件读取记录
    pub(crate) fn recover(path: &Path) -> IoResult<Self> {
        let content = fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// 删除记录文件
    pub(crate) fn remove(path: &Path) -> IoResult<()> {
        fs::remove_file(path)
    }
}

/// 返回源文件对应的断点续传记录路径：`<目录>/.<文件名>.up`
pub(crate) fn resume_file_path(filename: &str) -> PathBuf {
    let path = Path::new(filename);
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!(".{}.up", name))
}

/// 返回文件的最后修改时间
pub(crate) fn last_modification(filename: &str) -> Option<DateTime<Utc>> {
    fs::metadata(filename)
        .and_then(|metadata| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// 把系统时间转成记录使用的时间表示
pub(crate) fn to_record_time(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resume_file_path() {
        assert_eq!(resume_file_path("/data/video.bin"), PathBuf::from("/data/.video.bin.up"));
        assert_eq!(resume_file_path("video.bin"), PathBuf::from(".video.bin.up"));
    }

    #[test]
    fn test_record_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".source.bin.up");

        let record = ResumeRecord {
            upload_id: "upload-1".to_owned(),
            parts: vec![
                CompletedPart {
                    part_number: 1,
                    etag: "etag-1".to_owned(),
                    size: 0,
                },
                CompletedPart {
                    part_number: 2,
                    etag: "etag-2".to_owned(),
                    size: 0,
                },
            ],
            last_modification: Utc.timestamp_opt(1_234_567_890, 0).unwrap(),
        };
        record.store(&path).unwrap();

        // 落盘的是约定格式的单个 JSON 文档
        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["upload_id"], "upload-1");
        assert_eq!(raw["parts"][0]["partNumber"], 1);
        assert_eq!(raw["parts"][0]["etag"], "etag-1");
        assert!(raw["parts"][0].get("size").is_none());
        assert!(raw["last_modification"].is_string());

        let recovered = ResumeRecord::recover(&path).unwrap();
        assert_eq!(recovered, record);

        ResumeRecord::remove(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_last_modification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.bin");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"data").unwrap();
        drop(file);

        let recorded = last_modification(path.to_str().unwrap()).unwrap();
        let expected = to_record_time(fs::metadata(&path).unwrap().modified().unwrap());
        assert_eq!(recorded, expected);
    }
}
