use super::{
    config::{Config, LogLevel},
    corehandlers,
    defaults::DEFAULT_MAX_RETRIES,
    handlers::Handlers,
    request::{Api, Params, Request},
    retryer::{DefaultRetryer, Retryer},
};
use qiniu_credential::TokenType;
use std::sync::Arc;

/// 服务客户端的公共基座
///
/// 持有配置快照和处理函数集合，负责构建请求。
/// 所有具体的服务客户端都建立在这个基座之上
#[derive(Clone, Debug)]
pub struct BaseClient {
    config: Config,
    handlers: Handlers,
    retryer: Arc<dyn Retryer>,
}

impl BaseClient {
    /// 创建服务客户端基座
    ///
    /// 配置指定了重试器时优先使用，
    /// 否则按配置的最大重试次数构建默认重试器，
    /// 最大重试次数未配置时使用服务默认值
    pub fn new(config: Config, handlers: Handlers) -> Self {
        let retryer = config.retryer().unwrap_or_else(|| {
            let num_max_retries = config.max_retries().unwrap_or(DEFAULT_MAX_RETRIES);
            Arc::new(DefaultRetryer { num_max_retries })
        });
        let mut client = Self {
            config,
            handlers,
            retryer,
        };
        client.add_debug_handlers();
        client
    }

    /// 获取客户端的配置
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 获取客户端的处理函数集合
    #[inline]
    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// 修改客户端的处理函数集合
    ///
    /// 每个请求持有处理函数集合的拷贝，
    /// 修改不影响已经在途的请求
    #[inline]
    pub fn handlers_mut(&mut self) -> &mut Handlers {
        &mut self.handlers
    }

    /// 获取客户端的重试器
    #[inline]
    pub fn retryer(&self) -> Arc<dyn Retryer> {
        self.retryer.clone()
    }

    /// 为指定的 API 接口构建请求
    ///
    /// 按接口要求的签名算法类型装入对应的签名处理函数
    pub fn new_request(&self, api: Api, params: Params) -> Request {
        let token_type = api.token_type;
        let mut request = Request::new(
            self.config.clone(),
            self.handlers.clone(),
            self.retryer.clone(),
            api,
            params,
        );
        match token_type {
            TokenType::QBox => request
                .handlers
                .sign
                .push_back_named(corehandlers::qbox_token_request_handler()),
            TokenType::Qiniu => request
                .handlers
                .sign
                .push_back_named(corehandlers::qiniu_token_request_handler()),
            TokenType::None => {}
        }
        request
    }

    /// 日志级别开启调试时装入请求与响应的日志处理函数
    fn add_debug_handlers(&mut self) {
        if !self.config.log_level().at_least(LogLevel::DEBUG) {
            return;
        }
        self.handlers
            .send
            .push_front_named(corehandlers::log_http_request_handler());
        self.handlers
            .send
            .push_back_named(corehandlers::log_http_response_handler());
    }
}
