use super::{
    body::{OffsetReader, ReaderSeekerCloser},
    cancel::CancelToken,
    codes,
    config::{Config, LogLevel},
    error::Error,
    handlers::{HandlerList, Handlers},
    http_caller::{HttpRequest, HttpResponse},
    retryer::{should_retry_cancel, Retryer},
};
use http::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Method,
};
use qiniu_credential::TokenType;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    fmt::{self, Debug},
    io::Read,
    sync::Arc,
    time::{Duration, Instant},
};
use url::Url;

/// API 接口的描述信息
///
/// 封装一次 API 请求的地址、请求方式、内容类型和签名算法类型
#[derive(Clone, Debug, Default)]
pub struct Api {
    /// 请求协议，空字符串表示 http
    pub scheme: String,

    /// 请求方式，未指定时为 POST
    pub method: Option<Method>,

    /// 接口域名
    pub host: String,

    /// 接口路径，可以携带查询参数
    pub path: String,

    /// 请求体的内容类型，空字符串表示 application/json
    pub content_type: String,

    /// 接口要求的签名算法类型
    pub token_type: TokenType,

    /// 接口名字
    pub api_name: String,

    /// 服务名字
    pub service_name: String,
}

impl Api {
    fn url_string(&self) -> String {
        let scheme = if self.scheme.is_empty() { "http" } else { &self.scheme };
        format!(
            "{}://{}/{}",
            scheme,
            self.host.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

/// 请求的输入参数
///
/// Build 阶段的编码处理函数按请求的 Content-Type
/// 选择合适的编码方式序列化到请求体中
#[derive(Debug, Default)]
pub enum Params {
    /// 没有输入参数
    #[default]
    None,

    /// 以 JSON 内容编码的参数
    Json(Value),

    /// 以表单内容编码的扁平键值对参数
    Form(Vec<(String, String)>),

    /// 字节缓冲区参数，原样作为请求体
    Bytes(Vec<u8>),

    /// 可读数据流参数，原样作为请求体
    Stream(ReaderSeekerCloser),
}

impl Params {
    /// 是否设置了输入参数
    pub fn is_filled(&self) -> bool {
        !matches!(self, Params::None)
    }
}

/// 请求参数的校验函数
pub type ParamsValidator = Arc<dyn Fn(&Params) -> Result<(), Error> + Send + Sync>;

const NOT_RETRYING: &str = "not retrying";

/// 一次在途的 API 请求
///
/// 请求在自己的 `send` 过程中是可变的，不能在并发的发送之间共享。
/// 一个请求至多被构建一次；
/// 重试时请求体回绕到记录的起始偏移，响应体在尝试之间关闭
pub struct Request {
    config: Config,
    /// 处理函数集合，构建请求时从客户端拷贝而来，
    /// 对客户端模板的后续修改不影响在途请求
    pub handlers: Handlers,
    api: Api,
    http_request: HttpRequest,
    http_response: Option<HttpResponse>,
    body: OffsetReader,
    params: Params,
    validator: Option<ParamsValidator>,
    data: Option<Value>,
    error: Option<Error>,
    request_id: Option<String>,
    retry_count: usize,
    retryable: Option<bool>,
    retry_delay: Duration,
    attempt_time: Instant,
    disable_follow_redirects: bool,
    cancel: CancelToken,
    retryer: Arc<dyn Retryer>,
    built: bool,
}

impl Request {
    /// 创建 API 请求
    ///
    /// 处理函数集合应当传入一份拷贝，
    /// 接口地址非法时错误记入请求，发送时立即返回
    pub fn new(config: Config, handlers: Handlers, retryer: Arc<dyn Retryer>, api: Api, params: Params) -> Self {
        let method = api.method.clone().unwrap_or(Method::POST);
        let content_type = if api.content_type.is_empty() {
            mime::APPLICATION_JSON.to_string()
        } else {
            api.content_type.clone()
        };
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            headers.insert(CONTENT_TYPE, value);
        }

        let mut error = None;
        let url = match Url::parse(&api.url_string()) {
            Ok(url) => url,
            Err(err) => {
                error = Some(Error::new(codes::INVALID_ENDPOINT_URL, "invalid endpoint uri").cause(err));
                Url::parse("http://invalid.endpoint/").expect("placeholder url is valid")
            }
        };
        let host = sanitize_host(&url);
        let disable_follow_redirects = config.disable_follow_redirects();

        let mut request = Self {
            config,
            handlers,
            api,
            http_request: HttpRequest {
                method,
                url,
                headers,
                host,
            },
            http_response: None,
            body: OffsetReader::default(),
            params,
            validator: None,
            data: None,
            error,
            request_id: None,
            retry_count: 0,
            retryable: None,
            retry_delay: Duration::ZERO,
            attempt_time: Instant::now(),
            disable_follow_redirects,
            cancel: CancelToken::new(),
            retryer,
            built: false,
        };
        request.set_buffer_body(Vec::new());
        request
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(api: Api) -> Self {
        use super::retryer::DefaultRetryer;
        Self::new(
            Config::new(),
            Handlers::default(),
            Arc::new(DefaultRetryer { num_max_retries: 3 }),
            api,
            Params::None,
        )
    }

    /// 获取请求的配置快照
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 获取接口描述信息
    #[inline]
    pub fn api(&self) -> &Api {
        &self.api
    }

    /// 获取 HTTP 请求部件
    #[inline]
    pub fn http_request(&self) -> &HttpRequest {
        &self.http_request
    }

    /// 修改 HTTP 请求部件
    #[inline]
    pub fn http_request_mut(&mut self) -> &mut HttpRequest {
        &mut self.http_request
    }

    /// 同时借出请求部件和请求体，供发送阶段使用
    pub fn http_request_and_body_mut(&mut self) -> (&HttpRequest, &mut OffsetReader) {
        (&self.http_request, &mut self.body)
    }

    /// 获取 HTTP 响应
    #[inline]
    pub fn http_response(&self) -> Option<&HttpResponse> {
        self.http_response.as_ref()
    }

    /// 修改 HTTP 响应
    #[inline]
    pub fn http_response_mut(&mut self) -> Option<&mut HttpResponse> {
        self.http_response.as_mut()
    }

    /// 设置 HTTP 响应
    #[inline]
    pub fn set_http_response(&mut self, response: HttpResponse) {
        self.http_response = Some(response);
    }

    /// 获取响应状态码，尚未收到响应时返回 0
    pub fn response_status(&self) -> u16 {
        self.http_response.as_ref().map_or(0, |response| response.status_code)
    }

    /// 获取响应头的值
    pub fn response_header(&self, name: &str) -> Option<String> {
        self.http_response
            .as_ref()
            .and_then(|response| response.header(name))
            .map(str::to_owned)
    }

    /// 获取请求的输入参数
    #[inline]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// 取出请求的输入参数，原位置留下空参数
    #[inline]
    pub fn take_params(&mut self) -> Params {
        std::mem::take(&mut self.params)
    }

    /// 替换请求的输入参数
    #[inline]
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// 设置参数校验函数
    pub fn set_params_validator(&mut self, validator: ParamsValidator) {
        self.validator = Some(validator);
    }

    /// 获取参数校验函数
    #[inline]
    pub fn params_validator(&self) -> Option<ParamsValidator> {
        self.validator.clone()
    }

    /// 存入反序列化后的响应数据
    #[inline]
    pub fn set_data(&mut self, data: Value) {
        self.data = Some(data);
    }

    /// 查看反序列化后的响应数据
    #[inline]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// 取出响应数据并反序列化成指定类型
    pub fn parse_data<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let value = self.data.take().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|err| Error::new(codes::DESERIALIZATION_ERROR, "failed to decode response data").cause(err))
    }

    /// 获取请求当前的错误
    #[inline]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// 设置请求的错误
    #[inline]
    pub fn set_error(&mut self, error: Error) {
        self.error = Some(error);
    }

    /// 取出请求的错误
    #[inline]
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// 清除请求的错误
    #[inline]
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// 获取服务端返回的请求 ID
    #[inline]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// 记录服务端返回的请求 ID
    #[inline]
    pub fn set_request_id(&mut self, request_id: String) {
        self.request_id = Some(request_id);
    }

    /// 获取已经重试的次数
    #[inline]
    pub fn retry_count(&self) -> usize {
        self.retry_count
    }

    /// 重试次数加一
    #[inline]
    pub fn increment_retry_count(&mut self) {
        self.retry_count += 1;
    }

    /// 获取重试标记，`None` 表示还没有处理函数做出判断
    #[inline]
    pub fn retryable(&self) -> Option<bool> {
        self.retryable
    }

    /// 设置重试标记
    #[inline]
    pub fn set_retryable(&mut self, retryable: Option<bool>) {
        self.retryable = retryable;
    }

    /// 获取重试前的等待时长
    #[inline]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// 设置重试前的等待时长
    #[inline]
    pub fn set_retry_delay(&mut self, delay: Duration) {
        self.retry_delay = delay;
    }

    /// 获取本次尝试的开始时间
    #[inline]
    pub fn attempt_time(&self) -> Instant {
        self.attempt_time
    }

    /// 是否禁止自动跟随重定向
    #[inline]
    pub fn disable_follow_redirects(&self) -> bool {
        self.disable_follow_redirects
    }

    /// 设置是否禁止自动跟随重定向
    #[inline]
    pub fn set_disable_follow_redirects(&mut self, disable: bool) {
        self.disable_follow_redirects = disable;
    }

    /// 获取请求的取消令牌
    #[inline]
    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    /// 替换请求的取消令牌，用于把多个请求挂到同一个令牌上
    #[inline]
    pub fn set_cancel_token(&mut self, cancel: CancelToken) {
        self.cancel = cancel;
    }

    /// 获取重试器
    #[inline]
    pub fn retryer(&self) -> Arc<dyn Retryer> {
        self.retryer.clone()
    }

    /// 获取最大重试次数
    #[inline]
    pub fn max_retries(&self) -> usize {
        self.retryer.max_retries()
    }

    /// 设置请求体为可读数据流，记录其当前偏移作为回绕位置
    pub fn set_reader_body(&mut self, reader: ReaderSeekerCloser) {
        self.body = OffsetReader::new(reader);
    }

    /// 设置请求体为一段内存数据
    pub fn set_buffer_body(&mut self, buf: Vec<u8>) {
        self.set_reader_body(ReaderSeekerCloser::from_bytes(buf));
    }

    /// 把请求体回绕到记录的起始偏移
    ///
    /// 回绕失败按序列化错误记入请求
    pub fn reset_body(&mut self) {
        if let Err(err) = self.body.reset() {
            self.error = Some(Error::new(codes::SERIALIZATION_ERROR, "failed to rewind request body").cause(err));
        }
    }

    /// 返回请求体自起始偏移起的大小，未知时返回 -1
    pub fn body_len(&mut self) -> std::io::Result<i64> {
        self.body.len()
    }

    /// 请求体是否可定位
    #[inline]
    pub fn body_is_seeker(&self) -> bool {
        self.body.is_seeker()
    }

    /// 读出完整的请求体用于签名，并把请求体恢复原位
    ///
    /// 可定位的数据源读取后回绕到起始偏移，
    /// 不可定位的数据源以读到的内容重新封装
    pub fn collect_body_for_signing(&mut self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        if let Err(err) = self.body.read_to_end(&mut buf) {
            return Err(Error::new(codes::READ_ERROR, "failed to read request body").cause(err));
        }
        if self.body.is_seeker() {
            if let Err(err) = self.body.reset() {
                return Err(Error::new(codes::SERIALIZATION_ERROR, "failed to rewind request body").cause(err));
            }
        } else {
            self.body = OffsetReader::new(ReaderSeekerCloser::from_bytes(buf.clone()));
        }
        Ok(buf)
    }

    /// 请求是否还会被重试
    ///
    /// 重试要求请求体可定位或者为空，
    /// 且重试标记为真、重试次数未达上限
    pub fn will_retry(&mut self) -> bool {
        let body_empty = matches!(self.body.len(), Ok(0));
        if !self.body.is_seeker() && !body_empty {
            return false;
        }
        self.error.is_some() && self.retryable.unwrap_or(false) && self.retry_count < self.max_retries()
    }

    fn run_stage(&mut self, pick: fn(&Handlers) -> &HandlerList) {
        let list = pick(&self.handlers).clone();
        list.run(self);
    }

    fn attempt_count(&self) -> String {
        format!("attempt {}/{}", self.retry_count, self.max_retries())
    }

    fn debug_log_req_error(&self, stage: &str, retry: &str) {
        if !self.config.log_level().matches(LogLevel::DEBUG_WITH_REQUEST_ERRORS) {
            return;
        }
        log::debug!(
            "{} {}/{} failed, {}, error {}",
            stage,
            self.api.service_name,
            self.api.api_name,
            retry,
            self.error.as_ref().map(|err| err.to_string()).unwrap_or_default(),
        );
    }

    /// 构建请求
    ///
    /// 依次执行 Validate 和 Build 阶段，一个请求至多被构建一次，
    /// 重复调用没有效果
    pub fn build(&mut self) {
        if !self.built {
            self.run_stage(|h| &h.validate);
            if self.error.is_some() {
                self.debug_log_req_error("Validate Request", NOT_RETRYING);
                return;
            }
            self.run_stage(|h| &h.build);
            if self.error.is_some() {
                self.debug_log_req_error("Build Request", NOT_RETRYING);
                return;
            }
            self.built = true;
        }
    }

    /// 构建并签名请求
    pub fn sign_request(&mut self) {
        self.build();
        if self.error.is_some() {
            return;
        }
        self.run_stage(|h| &h.sign);
    }

    /// 发送请求
    ///
    /// 驱动整条处理管道，出错且可以重试时休眠后重新发送，
    /// 无论成功失败最后都会执行 Complete 阶段
    pub fn send(&mut self) -> Result<(), Error> {
        self.send_without_complete();
        self.run_stage(|h| &h.complete);
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn send_without_complete(&mut self) {
        if self.error.is_some() {
            return;
        }
        loop {
            self.error = None;
            self.attempt_time = Instant::now();

            self.sign_request();
            if self.error.is_some() {
                self.debug_log_req_error("Sign Request", NOT_RETRYING);
                return;
            }

            if self.send_attempt() {
                return;
            }
            if !should_retry_cancel(self.error.as_ref()) {
                return;
            }

            self.run_stage(|h| &h.retry);
            self.run_stage(|h| &h.after_retry);
            if self.error.is_some() || !self.retryable.unwrap_or(false) {
                return;
            }

            self.prepare_retry();
        }
    }

    /// 执行一次发送尝试，返回是否成功
    fn send_attempt(&mut self) -> bool {
        self.retryable = None;

        self.run_stage(|h| &h.send);
        if self.error.is_some() {
            let retry = self.attempt_count();
            self.debug_log_req_error("Send Request", &retry);
            self.run_stage(|h| &h.complete_attempt);
            return false;
        }

        self.run_stage(|h| &h.unmarshal_meta);
        self.run_stage(|h| &h.validate_response);
        if self.error.is_some() {
            self.run_stage(|h| &h.unmarshal_error);
            let retry = self.attempt_count();
            self.debug_log_req_error("Validate Response", &retry);
            self.run_stage(|h| &h.complete_attempt);
            return false;
        }

        self.run_stage(|h| &h.unmarshal);
        if self.error.is_some() {
            let retry = self.attempt_count();
            self.debug_log_req_error("Unmarshal Response", &retry);
            self.run_stage(|h| &h.complete_attempt);
            return false;
        }

        self.run_stage(|h| &h.complete_attempt);
        self.error.is_none()
    }

    fn prepare_retry(&mut self) {
        if self.config.log_level().matches(LogLevel::DEBUG_WITH_REQUEST_RETRIES) {
            log::debug!(
                "Retrying Request {}/{}, attempt {}",
                self.api.service_name,
                self.api.api_name,
                self.retry_count,
            );
        }

        // 上一次尝试的响应体在重试之间关闭，避免泄漏连接
        drop(self.http_response.take());
        self.reset_body();
    }

    /// 把字符串追加到请求的 User-Agent 头尾部，以空格分隔
    pub fn add_to_user_agent(&mut self, value: &str) {
        let current = self
            .http_request
            .headers
            .get(http::header::USER_AGENT)
            .and_then(|ua| ua.to_str().ok())
            .unwrap_or_default();
        let combined = if current.is_empty() {
            value.to_owned()
        } else {
            format!("{} {}", current, value)
        };
        if let Ok(header_value) = HeaderValue::from_str(&combined) {
            self.http_request.headers.insert(http::header::USER_AGENT, header_value);
        }
    }
}

impl Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Request")
            .field("api", &self.api)
            .field("http_request", &self.http_request)
            .field("retry_count", &self.retry_count)
            .field("retryable", &self.retryable)
            .field("error", &self.error)
            .field("built", &self.built)
            .finish()
    }
}

/// 生成 Host 头的值，http 的 `:80` 和 https 的 `:443` 被剥除
fn sanitize_host(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_owned(),
        (None, _) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{
        client::BaseClient, corehandlers, defaults, http_caller::HttpCaller, BoxedError, DefaultRetryer,
    };
    use super::*;
    use serde::Deserialize;
    use std::{
        io::{Cursor, Error as IoError, ErrorKind as IoErrorKind},
        sync::{
            atomic::{AtomicUsize, Ordering::Relaxed},
            Arc, Mutex,
        },
    };

    #[derive(Debug)]
    struct ZeroDelayRetryer(DefaultRetryer);

    impl Retryer for ZeroDelayRetryer {
        fn retry_rules(&self, _request: &Request) -> Duration {
            Duration::ZERO
        }

        fn should_retry(&self, request: &Request) -> bool {
            self.0.should_retry(request)
        }

        fn max_retries(&self) -> usize {
            self.0.max_retries()
        }
    }

    /// 每次调用记录请求体内容，按脚本依次返回传输错误或固定响应
    #[derive(Debug)]
    struct ScriptedCaller {
        // (状态码, 响应头, 响应体)，None 表示传输错误
        script: Mutex<Vec<Option<(u16, Vec<(String, String)>, Vec<u8>)>>>,
        calls: AtomicUsize,
        seen_bodies: Mutex<Vec<Vec<u8>>>,
        cancel_on_call: Option<CancelToken>,
    }

    impl ScriptedCaller {
        fn new(script: Vec<Option<(u16, Vec<(String, String)>, Vec<u8>)>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
                seen_bodies: Mutex::new(Vec::new()),
                cancel_on_call: None,
            }
        }

        fn json_response(status: u16, body: &str) -> Option<(u16, Vec<(String, String)>, Vec<u8>)> {
            Some((
                status,
                vec![
                    ("Content-Type".to_owned(), "application/json".to_owned()),
                    ("Content-Length".to_owned(), body.len().to_string()),
                    ("X-Reqid".to_owned(), "test-reqid".to_owned()),
                ],
                body.as_bytes().to_vec(),
            ))
        }

        fn calls(&self) -> usize {
            self.calls.load(Relaxed)
        }
    }

    impl HttpCaller for ScriptedCaller {
        fn call(
            &self,
            _request: &HttpRequest,
            body: &mut dyn Read,
            _follow_redirects: bool,
        ) -> Result<HttpResponse, BoxedError> {
            self.calls.fetch_add(1, Relaxed);
            let mut seen = Vec::new();
            body.read_to_end(&mut seen).unwrap();
            self.seen_bodies.lock().unwrap().push(seen);
            if let Some(token) = &self.cancel_on_call {
                token.cancel();
            }

            let mut script = self.script.lock().unwrap();
            let step = if script.is_empty() { None } else { Some(script.remove(0)) };
            match step.flatten() {
                Some((status_code, headers, response_body)) => {
                    let mut header_map = HeaderMap::new();
                    for (name, value) in headers {
                        header_map.insert(
                            http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                            HeaderValue::from_str(&value).unwrap(),
                        );
                    }
                    Ok(HttpResponse {
                        status_code,
                        headers: header_map,
                        body: Box::new(Cursor::new(response_body)),
                    })
                }
                None => Err(Box::new(IoError::new(IoErrorKind::ConnectionRefused, "connection refused"))),
            }
        }
    }

    fn test_client(caller: Arc<dyn HttpCaller>, max_retries: usize) -> BaseClient {
        let config = Config::new()
            .with_http_caller(caller)
            .with_retryer(Arc::new(ZeroDelayRetryer(DefaultRetryer {
                num_max_retries: max_retries,
            })))
            .with_credentials(super::super::Credentials::with_key("ak", "sk"));
        let mut client = BaseClient::new(config, defaults::handlers());
        client
            .handlers_mut()
            .build
            .push_back_named(corehandlers::body_handler());
        client
            .handlers_mut()
            .unmarshal
            .push_back_named(corehandlers::unmarshal_handler());
        client
    }

    fn stat_api() -> Api {
        Api {
            host: "rs.qiniu.com".into(),
            path: "/stat/entry".into(),
            api_name: "stat".into(),
            service_name: "KODO".into(),
            ..Default::default()
        }
    }

    #[derive(Debug, Deserialize)]
    struct FileInfo {
        hash: String,
        fsize: i64,
    }

    #[test]
    fn test_successful_unmarshal() {
        env_logger::builder().is_test(true).try_init().ok();
        let caller = Arc::new(ScriptedCaller::new(vec![ScriptedCaller::json_response(
            200,
            "{\"hash\":\"h\",\"fsize\":11,\"putTime\":0,\"mimeType\":\"text/plain\",\"type\":0}",
        )]));
        let client = test_client(caller.clone(), 3);
        let mut request = client.new_request(stat_api(), Params::None);
        request.send().unwrap();

        let info: FileInfo = request.parse_data().unwrap();
        assert_eq!(info.hash, "h");
        assert_eq!(info.fsize, 11);
        assert_eq!(caller.calls(), 1);
        assert_eq!(request.request_id(), Some("test-reqid"));
    }

    #[test]
    fn test_empty_body_yields_unknown_error() {
        let caller = Arc::new(ScriptedCaller::new(vec![ScriptedCaller::json_response(200, "")]));
        let client = test_client(caller, 3);
        let mut request = client.new_request(stat_api(), Params::None);
        let err = request.send().unwrap_err();
        assert_eq!(err.code(), codes::UNKNOWN_ERROR);
    }

    #[test]
    fn test_malformed_json_yields_deserialization_error() {
        let caller = Arc::new(ScriptedCaller::new(vec![ScriptedCaller::json_response(
            200,
            "{\"Key\": \"test.txt\"",
        )]));
        let client = test_client(caller, 3);
        let mut request = client.new_request(stat_api(), Params::None);
        let err = request.send().unwrap_err();
        assert_eq!(err.code(), codes::DESERIALIZATION_ERROR);
    }

    #[test]
    fn test_transport_error_retries_up_to_cap() {
        let caller = Arc::new(ScriptedCaller::new(vec![None, None, None, None, None]));
        let client = test_client(caller.clone(), 2);
        let mut request = client.new_request(stat_api(), Params::None);
        let err = request.send().unwrap_err();
        assert_eq!(err.code(), codes::REQUEST_ERROR);
        // 初次尝试 + 两次重试
        assert_eq!(caller.calls(), 3);
        assert_eq!(request.retry_count(), 2);
    }

    #[test]
    fn test_transport_error_then_success_rewinds_body() {
        let caller = Arc::new(ScriptedCaller::new(vec![
            None,
            ScriptedCaller::json_response(200, "{\"ok\":1}"),
        ]));
        let client = test_client(caller.clone(), 3);
        let api = Api {
            content_type: mime::APPLICATION_OCTET_STREAM.to_string(),
            ..stat_api()
        };
        let mut source = ReaderSeekerCloser::from_bytes(b"xxxhello".to_vec());
        source.seek(std::io::SeekFrom::Start(3)).unwrap();
        let mut request = client.new_request(api, Params::Stream(source));
        request.send().unwrap();

        let seen = caller.seen_bodies.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], b"hello");
        // 重试时请求体回绕到记录的起始偏移
        assert_eq!(seen[1], b"hello");
    }

    #[test]
    fn test_unseekable_body_is_not_retried() {
        let caller = Arc::new(ScriptedCaller::new(vec![None, None]));
        let client = test_client(caller.clone(), 3);
        let api = Api {
            content_type: mime::APPLICATION_OCTET_STREAM.to_string(),
            ..stat_api()
        };
        let source = ReaderSeekerCloser::from_reader(Cursor::new(b"streamed".to_vec()));
        let mut request = client.new_request(api, Params::Stream(source));
        let err = request.send().unwrap_err();
        assert_eq!(err.code(), codes::REQUEST_ERROR);
        assert_eq!(caller.calls(), 1);
    }

    #[test]
    fn test_cancelled_request_is_not_retried() {
        let mut caller = ScriptedCaller::new(vec![None, None, None]);
        let token = CancelToken::new();
        caller.cancel_on_call = Some(token.clone());
        let caller = Arc::new(caller);
        let client = test_client(caller.clone(), 3);
        let mut request = client.new_request(stat_api(), Params::None);
        request.set_cancel_token(token);
        let err = request.send().unwrap_err();
        assert_eq!(err.code(), codes::REQUEST_CANCELED);
        assert_eq!(caller.calls(), 1);
    }

    #[test]
    fn test_status_mapping_and_error_lift() {
        let caller = Arc::new(ScriptedCaller::new(vec![ScriptedCaller::json_response(
            404,
            "{\"error\":\"no such file\"}",
        )]));
        let client = test_client(caller, 0);
        let mut request = client.new_request(stat_api(), Params::None);
        let err = request.send().unwrap_err();
        assert_eq!(err.code(), codes::NOT_FOUND_ERROR);
        assert_eq!(err.message(), "404 Not Found: no such file");
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.request_id(), Some("test-reqid"));
    }

    #[test]
    fn test_status_406_is_retried() {
        let caller = Arc::new(ScriptedCaller::new(vec![
            ScriptedCaller::json_response(406, "{\"error\":\"crc32 mismatch\"}"),
            ScriptedCaller::json_response(406, "{\"error\":\"crc32 mismatch\"}"),
        ]));
        let client = test_client(caller.clone(), 1);
        let mut request = client.new_request(stat_api(), Params::None);
        let err = request.send().unwrap_err();
        assert_eq!(err.code(), codes::CRC32_VERIFICATION_ERROR);
        assert_eq!(caller.calls(), 2);
    }

    #[test]
    fn test_non_retryable_status_stops_immediately() {
        for status in [501, 429, 503] {
            let caller = Arc::new(ScriptedCaller::new(vec![
                ScriptedCaller::json_response(status, "{}"),
                ScriptedCaller::json_response(status, "{}"),
            ]));
            let client = test_client(caller.clone(), 3);
            let mut request = client.new_request(stat_api(), Params::None);
            request.send().unwrap_err();
            assert_eq!(caller.calls(), 1, "status {} must not be retried", status);
        }
    }

    #[test]
    fn test_error_body_can_still_be_read_after_validation() {
        let caller = Arc::new(ScriptedCaller::new(vec![ScriptedCaller::json_response(
            612,
            "{\"error\":\"no such entry\"}",
        )]));
        let client = test_client(caller, 0);
        let mut request = client.new_request(stat_api(), Params::None);
        let err = request.send().unwrap_err();
        assert_eq!(err.code(), codes::RESOURCE_NOT_EXIST_ERROR);

        let mut body = Vec::new();
        request
            .http_response_mut()
            .unwrap()
            .body
            .read_to_end(&mut body)
            .unwrap();
        assert_eq!(body, b"{\"error\":\"no such entry\"}");
    }
}
