//! 从 INI 格式的配置文件读取 SDK 配置

use super::error::Error;
use std::{collections::HashMap, fs, io::ErrorKind as IoErrorKind, path::Path};

/// 共享配置错误的错误码
pub(crate) const SHARED_CONFIG_ERR: &str = "SharedConfigErr";

const ACCESS_KEY_ID_KEY: &str = "qiniu_access_key_id";
const SECRET_ACCESS_KEY_KEY: &str = "qiniu_secret_access_key";

const RS_HOST_KEY: &str = "qiniu_rs_host";
const RSF_HOST_KEY: &str = "qiniu_rsf_host";
const API_HOST_KEY: &str = "qiniu_api_host";
const UC_HOST_KEY: &str = "qiniu_uc_host";

/// 密钥所在的小节，`credentials` 和 `profile` 都被接受
const CREDENTIAL_SECTIONS: &[&str] = &["credentials", "profile"];
const HOST_SECTION: &str = "host";

/// 配置文件中读到的配置
///
/// 密钥要求 AccessKey 和 SecretKey 在同一个文件中成组出现，
/// 残缺的一对被忽略
#[derive(Debug, Default)]
pub(crate) struct SharedConfig {
    pub(crate) creds: Option<(String, String)>,
    pub(crate) rs_host: Option<String>,
    pub(crate) rsf_host: Option<String>,
    pub(crate) api_host: Option<String>,
    pub(crate) uc_host: Option<String>,
}

impl SharedConfig {
    /// 依次加载多个配置文件，后加载的文件覆盖先加载的值
    ///
    /// 不存在的文件被静默跳过，解析失败按共享配置错误返回
    pub(crate) fn load(files: &[impl AsRef<Path>]) -> Result<Self, Error> {
        let mut config = Self::default();
        for file in files {
            let content = match fs::read_to_string(file.as_ref()) {
                Ok(content) => content,
                Err(err) if err.kind() == IoErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(Error::new(
                        SHARED_CONFIG_ERR,
                        format!("failed to read shared config file `{}`", file.as_ref().display()),
                    )
                    .cause(err));
                }
            };
            let sections = parse_ini(&content).map_err(|err| {
                Error::new(
                    SHARED_CONFIG_ERR,
                    format!("failed to parse shared config file `{}`", file.as_ref().display()),
                )
                .cause(err)
            })?;
            config.merge_sections(&sections);
        }
        Ok(config)
    }

    fn merge_sections(&mut self, sections: &HashMap<String, HashMap<String, String>>) {
        for section in CREDENTIAL_SECTIONS {
            if let Some(values) = sections.get(*section) {
                if let (Some(access_key), Some(secret_key)) =
                    (values.get(ACCESS_KEY_ID_KEY), values.get(SECRET_ACCESS_KEY_KEY))
                {
                    if !access_key.is_empty() && !secret_key.is_empty() {
                        self.creds = Some((access_key.clone(), secret_key.clone()));
                    }
                }
            }
        }
        if let Some(values) = sections.get(HOST_SECTION) {
            for (key, target) in [
                (RS_HOST_KEY, &mut self.rs_host),
                (RSF_HOST_KEY, &mut self.rsf_host),
                (API_HOST_KEY, &mut self.api_host),
                (UC_HOST_KEY, &mut self.uc_host),
            ] {
                if let Some(value) = values.get(key).filter(|value| !value.is_empty()) {
                    *target = Some(value.clone());
                }
            }
        }
    }
}

/// 行式 INI 读取
///
/// 支持 `[section]` 小节、`key = value` 键值对和 `#` / `;` 注释，
/// 值两侧的引号被剥除，小节名和键统一为小写。
/// 无法识别的行按解析错误返回
fn parse_ini(content: &str) -> Result<HashMap<String, HashMap<String, String>>, IniParseError> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current_section = String::new();

    for (line_number, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[') {
            match section.strip_suffix(']') {
                Some(name) => {
                    current_section = name.trim().to_lowercase();
                    sections.entry(current_section.clone()).or_default();
                }
                None => return Err(IniParseError::new(line_number + 1, raw_line)),
            }
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => {
                let key = key.trim().to_lowercase();
                let value = value.trim().trim_matches('"').trim_matches('\'').to_owned();
                if key.is_empty() {
                    return Err(IniParseError::new(line_number + 1, raw_line));
                }
                sections.entry(current_section.clone()).or_default().insert(key, value);
            }
            None => return Err(IniParseError::new(line_number + 1, raw_line)),
        }
    }
    Ok(sections)
}

#[derive(Debug)]
struct IniParseError {
    line_number: usize,
    line: String,
}

impl IniParseError {
    fn new(line_number: usize, line: &str) -> Self {
        Self {
            line_number,
            line: line.to_owned(),
        }
    }
}

impl std::fmt::Display for IniParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "invalid ini line {}: `{}`", self.line_number, self.line)
    }
}

impl std::error::Error for IniParseError {}
