//! 从环境变量读取 SDK 配置

use std::{env, path::PathBuf};

/// 访问密钥的环境变量，按顺序取第一个非空值
const CRED_ACCESS_ENV_KEYS: &[&str] = &["QINIU_ACCESS_KEY_ID", "QINIU_ACCESS_KEY"];
const CRED_SECRET_ENV_KEYS: &[&str] = &["QINIU_SECRET_ACCESS_KEY", "QINIU_SECRET_KEY"];

const RS_HOST_ENV_KEYS: &[&str] = &["QINIU_RS_HOST"];
const RSF_HOST_ENV_KEYS: &[&str] = &["QINIU_RSF_HOST"];
const API_HOST_ENV_KEYS: &[&str] = &["QINIU_API_HOST"];
const UC_HOST_ENV_KEYS: &[&str] = &["QINIU_UC_HOST"];

const SHARED_CREDENTIALS_FILE_ENV_KEYS: &[&str] = &["QINIU_SHARED_CREDENTIALS_FILE"];
const SHARED_CONFIG_FILE_ENV_KEYS: &[&str] = &["QINIU_CONFIG_FILE"];

/// 环境变量中读到的配置
///
/// 所有值都是可选项。
/// 访问密钥要求 AccessKey 和 SecretKey 成组出现，残缺的一对被丢弃
#[derive(Debug, Default)]
pub(crate) struct EnvConfig {
    pub(crate) creds: Option<(String, String)>,
    pub(crate) rs_host: Option<String>,
    pub(crate) rsf_host: Option<String>,
    pub(crate) api_host: Option<String>,
    pub(crate) uc_host: Option<String>,
    pub(crate) shared_credentials_file: PathBuf,
    pub(crate) shared_config_file: PathBuf,
}

fn first_env_value(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
}

impl EnvConfig {
    pub(crate) fn load() -> Self {
        let access_key = first_env_value(CRED_ACCESS_ENV_KEYS);
        let secret_key = first_env_value(CRED_SECRET_ENV_KEYS);
        let creds = match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => Some((access_key, secret_key)),
            _ => None,
        };

        let shared_credentials_file = first_env_value(SHARED_CREDENTIALS_FILE_ENV_KEYS)
            .map(PathBuf::from)
            .unwrap_or_else(default_shared_credentials_file);
        let shared_config_file = first_env_value(SHARED_CONFIG_FILE_ENV_KEYS)
            .map(PathBuf::from)
            .unwrap_or_else(default_shared_config_file);

        Self {
            creds,
            rs_host: first_env_value(RS_HOST_ENV_KEYS),
            rsf_host: first_env_value(RSF_HOST_ENV_KEYS),
            api_host: first_env_value(API_HOST_ENV_KEYS),
            uc_host: first_env_value(UC_HOST_ENV_KEYS),
            shared_credentials_file,
            shared_config_file,
        }
    }
}

fn qiniu_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".qiniu")
}

/// 默认的共享密钥文件位置 `~/.qiniu/credentials`
fn default_shared_credentials_file() -> PathBuf {
    qiniu_dir().join("credentials")
}

/// 默认的共享配置文件位置 `~/.qiniu/config`
fn default_shared_config_file() -> PathBuf {
    qiniu_dir().join("config")
}

#[cfg(test)]
mod tests {
    use super::*;

    // 进程级环境变量会相互影响，放在一个用例里串行验证
    #[test]
    fn test_load_env_config() {
        let _guard = crate::test_env::lock();
        env::remove_var("QINIU_ACCESS_KEY_ID");
        env::set_var("QINIU_ACCESS_KEY", "ak-from-env");
        env::set_var("QINIU_SECRET_ACCESS_KEY", "sk-from-env");
        env::set_var("QINIU_RS_HOST", "rs.example.com");
        let cfg = EnvConfig::load();
        assert_eq!(cfg.creds, Some(("ak-from-env".to_owned(), "sk-from-env".to_owned())));
        assert_eq!(cfg.rs_host.as_deref(), Some("rs.example.com"));

        // 主名字的优先级更高
        env::set_var("QINIU_ACCESS_KEY_ID", "ak-primary");
        let cfg = EnvConfig::load();
        assert_eq!(cfg.creds.unwrap().0, "ak-primary");

        // 密钥残缺的一对被丢弃
        env::remove_var("QINIU_SECRET_ACCESS_KEY");
        env::remove_var("QINIU_SECRET_KEY");
        let cfg = EnvConfig::load();
        assert!(cfg.creds.is_none());

        env::remove_var("QINIU_ACCESS_KEY_ID");
        env::remove_var("QINIU_ACCESS_KEY");
        env::remove_var("QINIU_RS_HOST");
    }
}
