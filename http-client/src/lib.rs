#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

//! Qiniu HTTP 请求管道
//!
//! 每个 API 请求都会经过一条由十三个阶段组成的处理函数管道：
//! Validate, Build, Sign, Send, ValidateResponse, Unmarshal,
//! UnmarshalStream, UnmarshalMeta, UnmarshalError, Retry, AfterRetry,
//! CompleteAttempt, Complete。
//! 管道封装了重试退避、请求取消、重试时的请求体回绕、
//! 签名计算以及结构化的错误归类。

mod body;
mod cancel;
mod client;
mod config;
pub mod corehandlers;
pub mod defaults;
mod env_config;
mod error;
mod handlers;
mod http_caller;
mod request;
mod retryer;
mod session;
mod shared_config;

pub use body::{OffsetReader, ReaderSeekerCloser};
pub use cancel::CancelToken;
pub use client::BaseClient;
pub use config::{Config, LogLevel, ProgressRecorder};
pub use defaults::{
    DEFAULT_API_HOST, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_RS_HOST, DEFAULT_RSF_HOST, DEFAULT_UC_HOST,
};
pub use error::{codes, BoxedError, Error};
pub use handlers::{
    log_item, stop_on_error, AfterEachFn, HandlerFn, HandlerList, HandlerListRunItem, Handlers, NamedHandler,
    ANONYMOUS_HANDLER_NAME,
};
pub use http_caller::{status_line, HttpCaller, HttpRequest, HttpResponse, UreqCaller};
pub use request::{Api, Params, ParamsValidator, Request};
pub use retryer::{is_error_retryable, should_retry_cancel, DefaultRetryer, Retryer};
pub use session::{Session, SessionOptions};

pub use qiniu_credential::{Credential, Credentials, TokenType};

pub mod prelude {
    //! 将本库的 trait 一并引入作用域
    pub use super::{HttpCaller, ProgressRecorder, Retryer};
    pub use qiniu_credential::prelude::*;
}

#[cfg(test)]
pub(crate) mod test_env {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// 串行化读写进程环境变量的测试
    pub(crate) fn lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
