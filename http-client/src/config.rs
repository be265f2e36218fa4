use super::{http_caller::HttpCaller, retryer::Retryer, UreqCaller};
use qiniu_credential::Credentials;
use std::{fmt::Debug, ops::BitOr, sync::Arc};

/// 日志输出级别，位掩码
///
/// `OFF` 关闭所有调试日志输出，是默认状态。
/// 调试日志通过 `log` 门面输出，
/// 本级别只决定 SDK 内部哪些调试路径会发声
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LogLevel(u32);

impl LogLevel {
    /// 关闭所有调试日志
    pub const OFF: LogLevel = LogLevel(0);

    /// 输出请求的调试日志
    pub const DEBUG: LogLevel = LogLevel(0x1000);

    /// 额外输出请求体和响应体
    pub const DEBUG_WITH_HTTP_BODY: LogLevel = LogLevel(0x1000 | 1);

    /// 请求重试时输出日志
    pub const DEBUG_WITH_REQUEST_RETRIES: LogLevel = LogLevel(0x1000 | 2);

    /// 请求在各个阶段失败时输出日志
    pub const DEBUG_WITH_REQUEST_ERRORS: LogLevel = LogLevel(0x1000 | 4);

    /// 输出分片上传的调试日志
    pub const DEBUG_MULTIPART_UPLOAD: LogLevel = LogLevel(0x1000 | 8);

    /// 指定级别的各个位是否都被开启
    #[inline]
    pub fn matches(self, other: LogLevel) -> bool {
        self.0 & other.0 == other.0
    }

    /// 当前级别是否不低于指定级别
    #[inline]
    pub fn at_least(self, other: LogLevel) -> bool {
        self.0 >= other.0
    }
}

impl BitOr for LogLevel {
    type Output = LogLevel;

    #[inline]
    fn bitor(self, rhs: LogLevel) -> LogLevel {
        LogLevel(self.0 | rhs.0)
    }
}

/// 上传进度接口
///
/// 每上传完成一个分片调用一次。
/// 数据源不可定位时总大小未知，`total_size` 为 -1；
/// 数据并非来自文件时 `filename` 为空字符串
pub trait ProgressRecorder: Debug + Send + Sync {
    /// 报告上传进度
    ///
    /// `key` 是对象在存储空间中的名字，
    /// `filename` 是本地文件名，`bucket` 是存储空间名字
    fn progress(&self, bucket: &str, filename: &str, key: &str, total_size: i64, uploaded_size: i64);
}

/// 客户端配置
///
/// 所有选项都是可选项，未设置的选项在使用时回落到默认值。
/// 客户端构建之后配置快照不再变化
#[derive(Clone, Debug, Default)]
pub struct Config {
    credentials: Option<Credentials>,
    credentials_chain_verbose_errors: Option<bool>,
    enforce_should_retry_check: Option<bool>,
    http_caller: Option<Arc<dyn HttpCaller>>,
    disable_follow_redirects: Option<bool>,
    log_level: Option<LogLevel>,
    max_retries: Option<usize>,
    retryer: Option<Arc<dyn Retryer>>,
    disable_param_validation: Option<bool>,
    rs_host: Option<String>,
    rsf_host: Option<String>,
    api_host: Option<String>,
    uc_host: Option<String>,
    region: Option<String>,
    upload_concurrency: Option<usize>,
    upload_part_size: Option<u64>,
    store_number: Option<usize>,
    disable_resume: Option<bool>,
    disable_progress: Option<bool>,
    progress_recorder: Option<Arc<dyn ProgressRecorder>>,
}

macro_rules! with_setter {
    ($(#[$doc:meta])* $with_name:ident, $field:ident, $ty:ty) => {
        $(#[$doc])*
        #[must_use]
        pub fn $with_name(mut self, $field: $ty) -> Self {
            self.$field = Some($field);
            self
        }
    };
}

impl Config {
    /// 创建空白配置
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    with_setter!(
        /// 设置认证信息
        with_credentials, credentials, Credentials);
    with_setter!(
        /// 获取认证信息失败时是否返回详细的错误链
        with_credentials_chain_verbose_errors, credentials_chain_verbose_errors, bool);
    with_setter!(
        /// 是否总是询问重试器，忽略处理函数设置的重试标记
        with_enforce_should_retry_check, enforce_should_retry_check, bool);
    with_setter!(
        /// 设置发出请求使用的 HTTP 客户端
        with_http_caller, http_caller, Arc<dyn HttpCaller>);
    with_setter!(
        /// 是否禁止自动跟随重定向
        with_disable_follow_redirects, disable_follow_redirects, bool);
    with_setter!(
        /// 设置日志输出级别
        with_log_level, log_level, LogLevel);
    with_setter!(
        /// 设置请求出错后的最大重试次数，0 表示不重试
        with_max_retries, max_retries, usize);
    with_setter!(
        /// 设置自定义的重试器，优先于最大重试次数配置
        with_retryer, retryer, Arc<dyn Retryer>);
    with_setter!(
        /// 是否禁用请求参数校验
        with_disable_param_validation, disable_param_validation, bool);
    with_setter!(
        /// 设置对象元信息服务的域名
        with_rs_host, rs_host, String);
    with_setter!(
        /// 设置对象列举服务的域名
        with_rsf_host, rsf_host, String);
    with_setter!(
        /// 设置 API 服务的域名
        with_api_host, api_host, String);
    with_setter!(
        /// 设置存储空间查询服务的域名
        with_uc_host, uc_host, String);
    with_setter!(
        /// 设置存储空间所在的区域名称
        with_region, region, String);
    with_setter!(
        /// 设置分片上传的最大并发数
        with_upload_concurrency, upload_concurrency, usize);
    with_setter!(
        /// 设置分片上传每个分片的大小
        with_upload_part_size, upload_part_size, u64);
    with_setter!(
        /// 每上传完成多少个分片保存一次断点续传记录
        with_store_number, store_number, usize);
    with_setter!(
        /// 是否禁用断点续传
        with_disable_resume, disable_resume, bool);
    with_setter!(
        /// 是否禁用上传进度报告
        with_disable_progress, disable_progress, bool);
    with_setter!(
        /// 设置上传进度接口的实现
        with_progress_recorder, progress_recorder, Arc<dyn ProgressRecorder>);

    /// 获取认证信息
    #[inline]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// 获取认证信息失败时是否返回详细的错误链
    #[inline]
    pub fn credentials_chain_verbose_errors(&self) -> bool {
        self.credentials_chain_verbose_errors.unwrap_or(false)
    }

    /// 是否总是询问重试器
    #[inline]
    pub fn enforce_should_retry_check(&self) -> bool {
        self.enforce_should_retry_check.unwrap_or(false)
    }

    /// 获取 HTTP 客户端，未设置时使用默认的 ureq 客户端
    pub fn http_caller(&self) -> Arc<dyn HttpCaller> {
        use once_cell::sync::Lazy;
        static DEFAULT_CALLER: Lazy<Arc<UreqCaller>> = Lazy::new(|| Arc::new(UreqCaller::new()));
        self.http_caller
            .clone()
            .unwrap_or_else(|| DEFAULT_CALLER.clone())
    }

    /// 是否禁止自动跟随重定向
    #[inline]
    pub fn disable_follow_redirects(&self) -> bool {
        self.disable_follow_redirects.unwrap_or(false)
    }

    /// 获取日志输出级别
    #[inline]
    pub fn log_level(&self) -> LogLevel {
        self.log_level.unwrap_or(LogLevel::OFF)
    }

    /// 获取最大重试次数，未设置时返回 `None` 表示使用服务默认值
    #[inline]
    pub fn max_retries(&self) -> Option<usize> {
        self.max_retries
    }

    /// 获取自定义重试器
    #[inline]
    pub fn retryer(&self) -> Option<Arc<dyn Retryer>> {
        self.retryer.clone()
    }

    /// 是否禁用请求参数校验
    #[inline]
    pub fn disable_param_validation(&self) -> bool {
        self.disable_param_validation.unwrap_or(false)
    }

    /// 获取对象元信息服务的域名
    #[inline]
    pub fn rs_host(&self) -> Option<&str> {
        self.rs_host.as_deref()
    }

    /// 获取对象列举服务的域名
    #[inline]
    pub fn rsf_host(&self) -> Option<&str> {
        self.rsf_host.as_deref()
    }

    /// 获取 API 服务的域名
    #[inline]
    pub fn api_host(&self) -> Option<&str> {
        self.api_host.as_deref()
    }

    /// 获取存储空间查询服务的域名
    #[inline]
    pub fn uc_host(&self) -> Option<&str> {
        self.uc_host.as_deref()
    }

    /// 获取存储空间所在的区域名称
    #[inline]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// 获取分片上传的最大并发数
    #[inline]
    pub fn upload_concurrency(&self) -> Option<usize> {
        self.upload_concurrency
    }

    /// 获取分片上传每个分片的大小
    #[inline]
    pub fn upload_part_size(&self) -> Option<u64> {
        self.upload_part_size
    }

    /// 获取断点续传记录的保存间隔
    #[inline]
    pub fn store_number(&self) -> Option<usize> {
        self.store_number
    }

    /// 是否禁用断点续传
    #[inline]
    pub fn disable_resume(&self) -> bool {
        self.disable_resume.unwrap_or(false)
    }

    /// 是否禁用上传进度报告
    #[inline]
    pub fn disable_progress(&self) -> bool {
        self.disable_progress.unwrap_or(false)
    }

    /// 获取上传进度接口的实现
    #[inline]
    pub fn progress_recorder(&self) -> Option<Arc<dyn ProgressRecorder>> {
        self.progress_recorder.clone()
    }

    /// 合并另一份配置，other 中已设置的选项覆盖本配置
    pub fn merge_in(&mut self, other: &Config) {
        macro_rules! merge_field {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field.clone();
                }
            };
        }
        merge_field!(credentials);
        merge_field!(credentials_chain_verbose_errors);
        merge_field!(enforce_should_retry_check);
        merge_field!(http_caller);
        merge_field!(disable_follow_redirects);
        merge_field!(log_level);
        merge_field!(max_retries);
        merge_field!(retryer);
        merge_field!(disable_param_validation);
        merge_field!(rs_host);
        merge_field!(rsf_host);
        merge_field!(api_host);
        merge_field!(uc_host);
        merge_field!(region);
        merge_field!(upload_concurrency);
        merge_field!(upload_part_size);
        merge_field!(store_number);
        merge_field!(disable_resume);
        merge_field!(disable_progress);
        merge_field!(progress_recorder);
    }

}
