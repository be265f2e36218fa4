//! SDK 的默认配置和默认处理函数集合

use super::{config::Config, corehandlers, handlers::Handlers, stop_on_error};
use std::time::Duration;

/// 默认的对象元信息服务域名
pub const DEFAULT_RS_HOST: &str = "rs.qiniu.com";

/// 默认的对象列举服务域名
pub const DEFAULT_RSF_HOST: &str = "rsf.qiniu.com";

/// 默认的 API 服务域名
pub const DEFAULT_API_HOST: &str = "api.qiniu.com";

/// 默认的存储空间查询服务域名
pub const DEFAULT_UC_HOST: &str = "uc.qbox.me";

/// 默认的最大重试次数
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// 没有 Retry-After 响应头时默认的重试间隔
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// 返回不含认证信息的默认配置
pub fn config() -> Config {
    Config::new()
        .with_rs_host(DEFAULT_RS_HOST.to_owned())
        .with_rsf_host(DEFAULT_RSF_HOST.to_owned())
        .with_api_host(DEFAULT_API_HOST.to_owned())
        .with_uc_host(DEFAULT_UC_HOST.to_owned())
}

/// 返回默认的处理函数集合
///
/// Build 阶段组装 User-Agent，Sign 阶段计算内容长度，
/// Send、ValidateResponse、UnmarshalMeta、AfterRetry、Complete
/// 阶段装入各自的标准处理函数。
/// 请求体编码和响应反序列化由具体的服务客户端按需装入
pub fn handlers() -> Handlers {
    let mut handlers = Handlers::default();
    handlers
        .build
        .push_back_named(corehandlers::sdk_version_user_agent_handler());
    handlers
        .build
        .push_back_named(corehandlers::add_host_exec_env_user_agent_handler());
    handlers.build.set_after_each(stop_on_error);
    handlers
        .sign
        .push_back_named(corehandlers::build_content_length_handler());
    handlers.sign.set_after_each(stop_on_error);
    handlers.send.push_back_named(corehandlers::send_handler());
    handlers
        .unmarshal_meta
        .push_back_named(corehandlers::unmarshal_meta_handler());
    handlers
        .validate_response
        .push_back_named(corehandlers::validate_response_handler());
    handlers
        .after_retry
        .push_back_named(corehandlers::after_retry_handler());
    handlers.complete.push_back_named(corehandlers::complete_handler());
    handlers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_handlers_are_wired() {
        let handlers = handlers();
        assert!(!handlers.is_empty());
        assert_eq!(handlers.build.len(), 2);
        assert_eq!(handlers.sign.len(), 1);
        assert_eq!(handlers.send.len(), 1);
        assert_eq!(handlers.validate_response.len(), 1);
        assert_eq!(handlers.after_retry.len(), 1);
        assert_eq!(handlers.complete.len(), 1);
        assert!(handlers.unmarshal.is_empty());
    }
}
