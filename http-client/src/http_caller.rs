use super::BoxedError;
use http::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH},
    Method, StatusCode,
};
use std::{
    fmt::{self, Debug},
    io::{empty, Read},
    str::FromStr,
};
use ureq::{Agent, AgentBuilder, Error as UreqError};
use url::Url;

/// 发出 HTTP 请求所需要的请求部件
///
/// 请求体不在部件中，由管道单独持有并在重试之间回绕
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// 请求方式
    pub method: Method,

    /// 请求地址
    pub url: Url,

    /// 请求头
    pub headers: HeaderMap,

    /// Host 头的值，http 的 `:80` 和 https 的 `:443` 已被剥除
    pub host: String,
}

/// HTTP 响应
pub struct HttpResponse {
    /// 响应状态码，0 表示没有收到响应
    pub status_code: u16,

    /// 响应头
    pub headers: HeaderMap,

    /// 响应体数据流
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    /// 构建一个指定状态码的空响应
    pub fn empty_with_status(status_code: u16) -> Self {
        Self {
            status_code,
            headers: HeaderMap::new(),
            body: Box::new(empty()),
        }
    }

    /// 获取指定响应头的值
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

impl Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status_code", &self.status_code)
            .field("headers", &self.headers)
            .finish()
    }
}

/// 返回状态行文本，如 `404 Not Found`，没有标准短语时仅返回状态码
pub fn status_line(status_code: u16) -> String {
    StatusCode::from_u16(status_code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .map(|reason| format!("{} {}", status_code, reason))
        .unwrap_or_else(|| status_code.to_string())
}

/// HTTP 客户端接口
///
/// 发送阶段通过该接口发出请求，
/// 传输层错误以原始错误返回，状态码错误不算传输层错误
pub trait HttpCaller: Debug + Send + Sync {
    /// 发出 HTTP 请求并等待响应
    fn call(
        &self,
        request: &HttpRequest,
        body: &mut dyn Read,
        follow_redirects: bool,
    ) -> Result<HttpResponse, BoxedError>;
}

/// 基于 ureq 的默认 HTTP 客户端
pub struct UreqCaller {
    follow: Agent,
    no_follow: Agent,
}

impl UreqCaller {
    /// 创建默认的 ureq 客户端
    pub fn new() -> Self {
        Self {
            follow: AgentBuilder::new().build(),
            no_follow: AgentBuilder::new().redirects(0).build(),
        }
    }
}

impl Default for UreqCaller {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for UreqCaller {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UreqCaller")
    }
}

impl HttpCaller for UreqCaller {
    fn call(
        &self,
        request: &HttpRequest,
        body: &mut dyn Read,
        follow_redirects: bool,
    ) -> Result<HttpResponse, BoxedError> {
        let agent = if follow_redirects { &self.follow } else { &self.no_follow };
        let mut ureq_request = agent.request(request.method.as_str(), request.url.as_str());
        for (name, value) in request.headers.iter() {
            if let Ok(value) = value.to_str() {
                ureq_request = ureq_request.set(name.as_str(), value);
            }
        }
        if !request.host.is_empty() {
            ureq_request = ureq_request.set("Host", &request.host);
        }

        let has_body = request
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map_or(false, |length| length > 0);
        let result = if has_body {
            ureq_request.send(body)
        } else {
            ureq_request.call()
        };

        match result {
            Ok(response) => Ok(make_response(response)),
            // 状态码错误按普通响应交还给管道归类
            Err(UreqError::Status(_, response)) => Ok(make_response(response)),
            Err(UreqError::Transport(transport)) => Err(Box::new(transport)),
        }
    }
}

fn make_response(response: ureq::Response) -> HttpResponse {
    let status_code = response.status();
    let mut headers = HeaderMap::new();
    for name in response.headers_names() {
        if let (Ok(header_name), Some(value)) = (HeaderName::from_str(&name), response.header(&name)) {
            if let Ok(header_value) = HeaderValue::from_str(value) {
                headers.insert(header_name, header_value);
            }
        }
    }
    HttpResponse {
        status_code,
        headers,
        body: Box::new(response.into_reader()),
    }
}
