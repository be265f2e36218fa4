use super::{
    config::Config,
    corehandlers, defaults,
    env_config::EnvConfig,
    error::Error,
    handlers::Handlers,
    shared_config::SharedConfig,
};
use qiniu_credential::{ChainCredentialsProvider, Credentials, EnvCredentialProvider};
use std::path::PathBuf;

/// 会话创建选项
#[derive(Debug, Default)]
pub struct SessionOptions {
    /// 用户提供的配置，优先级最高
    pub config: Config,

    /// 按顺序加载的配置文件列表。
    /// 设置后覆盖 `QINIU_SHARED_CREDENTIALS_FILE` 和 `QINIU_CONFIG_FILE`
    pub shared_config_files: Option<Vec<PathBuf>>,

    /// 会话使用的处理函数集合，必须是完整的一套。
    /// 未设置时使用默认的处理函数集合
    pub handlers: Option<Handlers>,
}

/// 会话
///
/// 从 SDK 默认值、配置文件、环境变量和用户配置出发，
/// 合并出一份完整的配置和处理函数集合，
/// 作为创建各个服务客户端的统一入口。
/// 合并的优先级从高到低：用户配置、环境变量、配置文件、默认值
#[derive(Clone, Debug)]
pub struct Session {
    config: Config,
    handlers: Handlers,
}

impl Session {
    /// 创建会话
    pub fn new() -> Result<Self, Error> {
        Self::with_options(Default::default())
    }

    /// 以用户配置创建会话
    pub fn with_config(config: Config) -> Result<Self, Error> {
        Self::with_options(SessionOptions {
            config,
            ..Default::default()
        })
    }

    /// 以指定的选项创建会话
    pub fn with_options(options: SessionOptions) -> Result<Self, Error> {
        let env_config = EnvConfig::load();

        let shared_files = options.shared_config_files.unwrap_or_else(|| {
            vec![
                env_config.shared_config_file.clone(),
                env_config.shared_credentials_file.clone(),
            ]
        });
        let shared_config = SharedConfig::load(&shared_files)?;

        let mut config = defaults::config();
        let user_config = options.config;
        config.merge_in(&user_config);

        if config.credentials().is_none() {
            let credentials = resolve_credentials(&config, &env_config, &shared_config);
            config = config.with_credentials(credentials);
        }
        merge_host_config(&mut config, &user_config, &env_config, &shared_config);

        let handlers = options.handlers.unwrap_or_else(defaults::handlers);
        let mut session = Self { config, handlers };
        session.init_handlers();
        Ok(session)
    }

    /// 获取会话的配置
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 获取会话的处理函数集合
    #[inline]
    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// 为服务客户端生成配置和处理函数集合
    ///
    /// 追加的配置合并在会话配置之上
    pub fn client_config(&self, extra_configs: &[&Config]) -> (Config, Handlers) {
        let mut config = self.config.clone();
        for extra in extra_configs {
            config.merge_in(extra);
        }
        (config, self.handlers.clone())
    }

    /// 按配置装卸参数校验处理函数
    fn init_handlers(&mut self) {
        self.handlers
            .validate
            .remove_by_name(corehandlers::VALIDATE_PARAMETERS_HANDLER_NAME);
        if !self.config.disable_param_validation() {
            self.handlers
                .validate
                .push_back_named(corehandlers::validate_parameters_handler());
        }
    }
}

/// 解析认证信息
///
/// 环境变量中的密钥优先，其次是配置文件中的密钥，
/// 都没有时回落到默认的提供者串联，在使用时才报告失败
fn resolve_credentials(config: &Config, env_config: &EnvConfig, shared_config: &SharedConfig) -> Credentials {
    if let Some((access_key, secret_key)) = &env_config.creds {
        return Credentials::with_key(access_key.clone(), secret_key.clone());
    }
    if let Some((access_key, secret_key)) = &shared_config.creds {
        return Credentials::with_key(access_key.clone(), secret_key.clone());
    }
    Credentials::new(
        ChainCredentialsProvider::new(vec![Box::new(EnvCredentialProvider)])
            .verbose_errors(config.credentials_chain_verbose_errors()),
    )
}

/// 合并各个来源的域名配置
///
/// 优先级从高到低：用户配置、环境变量、配置文件、默认配置
fn merge_host_config(config: &mut Config, user: &Config, env_config: &EnvConfig, shared: &SharedConfig) {
    let merged = merge_value(&[
        user.rs_host(),
        env_config.rs_host.as_deref(),
        shared.rs_host.as_deref(),
        Some(defaults::DEFAULT_RS_HOST),
    ]);
    if let Some(host) = merged {
        *config = std::mem::take(config).with_rs_host(host);
    }
    let merged = merge_value(&[
        user.rsf_host(),
        env_config.rsf_host.as_deref(),
        shared.rsf_host.as_deref(),
        Some(defaults::DEFAULT_RSF_HOST),
    ]);
    if let Some(host) = merged {
        *config = std::mem::take(config).with_rsf_host(host);
    }
    let merged = merge_value(&[
        user.api_host(),
        env_config.api_host.as_deref(),
        shared.api_host.as_deref(),
        Some(defaults::DEFAULT_API_HOST),
    ]);
    if let Some(host) = merged {
        *config = std::mem::take(config).with_api_host(host);
    }
    let merged = merge_value(&[
        user.uc_host(),
        env_config.uc_host.as_deref(),
        shared.uc_host.as_deref(),
        Some(defaults::DEFAULT_UC_HOST),
    ]);
    if let Some(host) = merged {
        *config = std::mem::take(config).with_uc_host(host);
    }
}

fn merge_value(candidates: &[Option<&str>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find(|value| !value.is_empty())
        .map(|value| (*value).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn clear_qiniu_env() {
        for key in [
            "QINIU_ACCESS_KEY_ID",
            "QINIU_ACCESS_KEY",
            "QINIU_SECRET_ACCESS_KEY",
            "QINIU_SECRET_KEY",
            "QINIU_RS_HOST",
            "QINIU_RSF_HOST",
            "QINIU_API_HOST",
            "QINIU_UC_HOST",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults_fill_unset_hosts() {
        let _guard = crate::test_env::lock();
        clear_qiniu_env();
        let session = Session::with_options(SessionOptions {
            shared_config_files: Some(Vec::new()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(session.config().rs_host(), Some(defaults::DEFAULT_RS_HOST));
        assert_eq!(session.config().uc_host(), Some(defaults::DEFAULT_UC_HOST));
        assert!(session.config().credentials().is_some());
        assert!(!session.handlers().validate.is_empty());
    }

    #[test]
    fn test_user_config_wins_over_file() {
        let _guard = crate::test_env::lock();
        clear_qiniu_env();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "[credentials]\n\
             qiniu_access_key_id = file-ak\n\
             qiniu_secret_access_key = file-sk\n\
             [host]\n\
             qiniu_rs_host = rs.from-file.com\n\
             qiniu_api_host = api.from-file.com\n"
        )
        .unwrap();

        let session = Session::with_options(SessionOptions {
            config: Config::new().with_rs_host("rs.from-user.com".to_owned()),
            shared_config_files: Some(vec![file.path().to_owned()]),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(session.config().rs_host(), Some("rs.from-user.com"));
        assert_eq!(session.config().api_host(), Some("api.from-file.com"));
        let credential = session.config().credentials().unwrap().get().unwrap();
        assert_eq!(credential.access_key(), "file-ak");
    }

    #[test]
    fn test_param_validation_can_be_disabled() {
        let _guard = crate::test_env::lock();
        clear_qiniu_env();
        let session = Session::with_options(SessionOptions {
            config: Config::new().with_disable_param_validation(true),
            shared_config_files: Some(Vec::new()),
            ..Default::default()
        })
        .unwrap();
        assert!(session.handlers().validate.is_empty());
    }
}
