use super::{codes, defaults::DEFAULT_RETRY_DELAY, error::Error, request::Request};
use std::{
    error::Error as StdError,
    fmt::Debug,
    io::{Error as IoError, ErrorKind as IoErrorKind},
    time::Duration,
};

/// 重试器接口，控制请求重试的逻辑
///
/// 默认逻辑由 [`DefaultRetryer`] 实现
pub trait Retryer: Debug + Send + Sync {
    /// 返回重试之前的等待时长
    fn retry_rules(&self, request: &Request) -> Duration;

    /// 判断请求是否可以重试
    fn should_retry(&self, request: &Request) -> bool;

    /// 返回最大的重试次数
    fn max_retries(&self) -> usize;
}

/// 默认的重试器
///
/// 501、429、503 不重试，406 重试；
/// 重试间隔遵循 Retry-After 响应头的整数秒数，没有时默认 3 秒
#[derive(Copy, Clone, Debug)]
pub struct DefaultRetryer {
    /// 最大的重试次数
    pub num_max_retries: usize,
}

impl Retryer for DefaultRetryer {
    fn retry_rules(&self, request: &Request) -> Duration {
        request
            .response_header("Retry-After")
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_DELAY)
    }

    fn should_retry(&self, request: &Request) -> bool {
        if let Some(retryable) = request.retryable() {
            return retryable;
        }
        match request.response_status() {
            // 501 - 功能不支持，429 - 请求过多，503 - 服务不可用
            501 | 429 | 503 => false,
            // 406 - 上传内容 CRC32 校验失败，重新上传
            406 => true,
            _ => is_error_retryable(request.error()),
        }
    }

    fn max_retries(&self) -> usize {
        self.num_max_retries
    }
}

/// 可以重试的错误码
const RETRYABLE_CODES: &[&str] = &[
    codes::CRC32_VERIFICATION_ERROR,
    codes::REQUEST_ERROR,
    codes::REQUEST_TIMEOUT,
    codes::RESPONSE_TIMEOUT,
];

/// 原始错误可以重试的包装错误码
const RETRYABLE_PARENT_CODES: &[&str] = &[codes::SERIALIZATION_ERROR, codes::READ_ERROR];

/// 为兼容保留的取消错误描述，命中则不再重试
const REQUEST_CANCELED_SUBSTRINGS: &[&str] = &[
    "net/http: request canceled",
    "net/http: request canceled while waiting for connection",
];

fn is_code_retryable(code: &str) -> bool {
    RETRYABLE_CODES.contains(&code)
}

fn is_io_error_temporary(err: &IoError) -> bool {
    matches!(
        err.kind(),
        IoErrorKind::TimedOut | IoErrorKind::Interrupted | IoErrorKind::WouldBlock
    )
}

fn is_io_error_connection_reset(err: &IoError) -> bool {
    matches!(err.kind(), IoErrorKind::ConnectionReset | IoErrorKind::ConnectionAborted)
}

fn is_nested_error_retryable(err: &Error) -> bool {
    if !RETRYABLE_PARENT_CODES.contains(&err.code()) {
        return false;
    }
    match err.orig_err() {
        None => false,
        Some(cause) => {
            if let Some(nested) = cause.downcast_ref::<Error>() {
                is_code_retryable(nested.code())
            } else if let Some(io_err) = cause.downcast_ref::<IoError>() {
                is_io_error_temporary(io_err) || is_io_error_connection_reset(io_err)
            } else {
                false
            }
        }
    }
}

/// 判断错误是否可以重试
///
/// 错误码在可重试集合中，或者包装错误的原始错误可以重试
pub fn is_error_retryable(err: Option<&Error>) -> bool {
    match err {
        Some(err) => is_code_retryable(err.code()) || is_nested_error_retryable(err),
        None => false,
    }
}

/// 判断错误是否允许进入重试流程
///
/// 请求取消永远不重试，
/// 已知的取消描述命中时也不重试，未知的错误允许重试
pub fn should_retry_cancel(err: Option<&Error>) -> bool {
    match err {
        None => true,
        Some(err) => {
            if err.code() == codes::REQUEST_CANCELED {
                return false;
            }
            match err.orig_err() {
                // 原始错误缺失时错误原因未知，允许重试
                None => true,
                Some(cause) => should_retry_cancel_cause(cause),
            }
        }
    }
}

fn should_retry_cancel_cause(cause: &(dyn StdError + Send + Sync + 'static)) -> bool {
    if let Some(nested) = cause.downcast_ref::<Error>() {
        return should_retry_cancel(Some(nested));
    }
    if let Some(io_err) = cause.downcast_ref::<IoError>() {
        if io_err.to_string().contains("connection refused") {
            // 服务可能还没有就绪，拒绝连接允许重试
            return true;
        }
        if is_io_error_temporary(io_err) || is_io_error_connection_reset(io_err) {
            return true;
        }
    }
    let message = cause.to_string();
    !REQUEST_CANCELED_SUBSTRINGS
        .iter()
        .any(|substring| message.contains(substring))
}

#[cfg(test)]
mod tests {
    use super::super::{Api, HttpResponse};
    use super::*;
    use http::{HeaderMap, HeaderValue};
    use std::io::empty;

    fn request_with_retry_after(header: Option<&str>) -> Request {
        let mut request = Request::new_for_test(Api {
            host: "rs.qiniu.com".into(),
            path: "/".into(),
            ..Default::default()
        });
        let mut headers = HeaderMap::new();
        if let Some(value) = header {
            headers.insert("Retry-After", HeaderValue::from_str(value).unwrap());
        }
        request.set_http_response(HttpResponse {
            status_code: 503,
            headers,
            body: Box::new(empty()),
        });
        request
    }

    #[test]
    fn test_retry_rules_honors_retry_after() {
        let retryer = DefaultRetryer { num_max_retries: 3 };
        let request = request_with_retry_after(Some("7"));
        assert_eq!(retryer.retry_rules(&request), Duration::from_secs(7));

        let request = request_with_retry_after(None);
        assert_eq!(retryer.retry_rules(&request), DEFAULT_RETRY_DELAY);

        let request = request_with_retry_after(Some("not-a-number"));
        assert_eq!(retryer.retry_rules(&request), DEFAULT_RETRY_DELAY);
    }

    #[test]
    fn test_should_retry_status_rules() {
        let retryer = DefaultRetryer { num_max_retries: 3 };
        for status in [501u16, 429, 503] {
            let mut request = request_with_retry_after(None);
            request.set_http_response(HttpResponse::empty_with_status(status));
            assert!(!retryer.should_retry(&request), "status {}", status);
        }

        let mut request = request_with_retry_after(None);
        request.set_http_response(HttpResponse::empty_with_status(406));
        assert!(retryer.should_retry(&request));

        // 处理函数已经做出的判断优先
        let mut request = request_with_retry_after(None);
        request.set_retryable(Some(true));
        assert!(retryer.should_retry(&request));
    }

    #[test]
    fn test_retryable_codes() {
        for code in [
            codes::CRC32_VERIFICATION_ERROR,
            codes::REQUEST_ERROR,
            codes::REQUEST_TIMEOUT,
            codes::RESPONSE_TIMEOUT,
        ] {
            assert!(is_error_retryable(Some(&Error::new(code, "x"))), "{}", code);
        }
        for code in [codes::PARAMS_ERROR, codes::NOT_FOUND_ERROR, codes::REQUEST_CANCELED] {
            assert!(!is_error_retryable(Some(&Error::new(code, "x"))), "{}", code);
        }
        assert!(!is_error_retryable(None));
    }

    #[test]
    fn test_nested_retryable_cause() {
        let inner = Error::new(codes::RESPONSE_TIMEOUT, "timed out");
        let wrapped = Error::new(codes::SERIALIZATION_ERROR, "failed to read body").cause(inner);
        assert!(is_error_retryable(Some(&wrapped)));

        let inner = Error::new(codes::PARAMS_ERROR, "bad params");
        let wrapped = Error::new(codes::SERIALIZATION_ERROR, "failed to read body").cause(inner);
        assert!(!is_error_retryable(Some(&wrapped)));

        let io_err = IoError::new(IoErrorKind::ConnectionReset, "reset by peer");
        let wrapped = Error::new(codes::READ_ERROR, "failed to read body").cause(io_err);
        assert!(is_error_retryable(Some(&wrapped)));
    }

    #[test]
    fn test_cancellation_is_never_retried() {
        assert!(!should_retry_cancel(Some(&Error::new(
            codes::REQUEST_CANCELED,
            "request context canceled"
        ))));
        assert!(should_retry_cancel(None));
        assert!(should_retry_cancel(Some(&Error::new(codes::REQUEST_ERROR, "send failed"))));
    }

    #[test]
    fn test_known_cancel_substrings() {
        let cause = IoError::new(IoErrorKind::Other, "net/http: request canceled");
        let err = Error::new(codes::REQUEST_ERROR, "send failed").cause(cause);
        assert!(!should_retry_cancel(Some(&err)));

        let cause = IoError::new(
            IoErrorKind::Other,
            "net/http: request canceled while waiting for connection",
        );
        let err = Error::new(codes::REQUEST_ERROR, "send failed").cause(cause);
        assert!(!should_retry_cancel(Some(&err)));

        let cause = IoError::new(IoErrorKind::Other, "connection refused");
        let err = Error::new(codes::REQUEST_ERROR, "send failed").cause(cause);
        assert!(should_retry_cancel(Some(&err)));
    }
}
