#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

//! Qiniu 对象上传
//!
//! 在数据大小已知的前提下按大小选择上传方式：
//! 不超过 [`DEFAULT_FORM_SIZE`] 的数据使用表单上传，
//! 更大的数据和大小未知的数据流使用分片上传。
//! 分片上传以有界的并发上传分片，支持断点续传和上传进度报告。

mod error;
mod form_uploader;
mod host_selector;
mod multipart_uploader;
mod progress;
mod region;
mod resume_recorder;
mod upload_input;

pub use error::{MultiUploadFailure, UploadError};
pub use host_selector::{ErrorFrequencySelector, FixedSelector, HostsSelector, RoundRobinSelector};
pub use multipart_uploader::CompletedPart;
pub use progress::LogProgressRecorder;
pub use region::{get_default_region, DomainGroup, Region, RegionDomain, RegionDomains, UpDomainGroup};
pub use upload_input::{UploadInput, UploadOutput};

use multipart_uploader::MultipartUploader;
use qiniu_http_client::{
    codes, corehandlers, Api, BaseClient, CancelToken, Config, Error, Params, Session, TokenType,
    DEFAULT_UC_HOST,
};
use serde::de::DeserializeOwned;

/// 1 KB
pub const KB: u64 = 1024;
/// 1 MB
pub const MB: u64 = 1024 * KB;

/// 分片上传每个分片的默认大小
pub const DEFAULT_UPLOAD_PART_SIZE: u64 = 4 * MB;

/// 分片上传的默认并发数
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 5;

/// 可以使用表单上传的数据大小上限
pub const DEFAULT_FORM_SIZE: u64 = 10 * MB;

/// 默认每上传完成多少个分片保存一次断点续传记录
pub const DEFAULT_STORE_NUMBER: usize = 10;

/// 存储服务的名字
pub const SERVICE_NAME: &str = "KODO";

/// 上传客户端
///
/// 所有上传接口的统一入口
#[derive(Clone, Debug)]
pub struct UploadManager {
    client: BaseClient,
}

impl UploadManager {
    /// 从会话创建上传客户端
    pub fn new(session: &Session) -> Self {
        Self::with_configs(session, &[])
    }

    /// 从会话创建上传客户端，追加的配置合并在会话配置之上
    pub fn with_configs(session: &Session, extra_configs: &[&Config]) -> Self {
        let (config, mut handlers) = session.client_config(extra_configs);
        handlers.build.push_back_named(corehandlers::body_handler());
        handlers.unmarshal.push_back_named(corehandlers::unmarshal_handler());
        Self {
            client: BaseClient::new(config, handlers),
        }
    }

    /// 获取底层的客户端基座
    #[inline]
    pub fn client(&self) -> &BaseClient {
        &self.client
    }

    /// 上传数据到存储空间
    ///
    /// 数据大小已知且不超过 [`DEFAULT_FORM_SIZE`] 时使用表单上传，
    /// 否则使用分片上传。
    /// 上传期间不要修改 input 的值，未设置的字段会按配置补全
    pub fn upload<T: DeserializeOwned>(&self, input: &mut UploadInput) -> Result<T, UploadError> {
        self.upload_with_cancel(input, CancelToken::new())
    }

    /// 上传数据到存储空间，取消令牌可以用来中断上传
    pub fn upload_with_cancel<T: DeserializeOwned>(
        &self,
        input: &mut UploadInput,
        cancel: CancelToken,
    ) -> Result<T, UploadError> {
        let total_size = input.init(self)?;
        if total_size == -1 || total_size as u64 > DEFAULT_FORM_SIZE {
            self.upload_multipart_with_cancel(input, cancel)
        } else {
            self.upload_form_with_cancel(input, cancel)
        }
    }

    /// 使用表单上传的方式上传数据
    ///
    /// 数据会被完整读入内存，过大的数据建议使用分片上传
    pub fn upload_form<T: DeserializeOwned>(&self, input: &mut UploadInput) -> Result<T, UploadError> {
        self.upload_form_with_cancel(input, CancelToken::new())
    }

    /// 使用表单上传的方式上传数据，取消令牌可以用来中断上传
    pub fn upload_form_with_cancel<T: DeserializeOwned>(
        &self,
        input: &mut UploadInput,
        cancel: CancelToken,
    ) -> Result<T, UploadError> {
        input.init(self)?;
        form_uploader::upload_form(self, input, cancel)
    }

    /// 使用分片上传的方式上传数据
    ///
    /// 分片上传的过程：
    /// 1. 调用 init 接口在服务端创建上传任务，返回 uploadId
    /// 2. 把数据切成分片，并发地调用 uploadPart 接口上传每个分片
    /// 3. 调用 complete 接口按分片序号提交清单，完成上传
    pub fn upload_multipart<T: DeserializeOwned>(&self, input: &mut UploadInput) -> Result<T, UploadError> {
        self.upload_multipart_with_cancel(input, CancelToken::new())
    }

    /// 使用分片上传的方式上传数据，取消令牌可以用来中断上传
    pub fn upload_multipart_with_cancel<T: DeserializeOwned>(
        &self,
        input: &mut UploadInput,
        cancel: CancelToken,
    ) -> Result<T, UploadError> {
        let total_size = input.init(self)?;
        MultipartUploader::new(self, input, total_size, cancel)?.upload()
    }

    /// 查询存储空间所在区域的上传和下载入口域名组
    pub fn query_region_domains(&self, bucket: &str) -> Result<RegionDomains, Error> {
        let credentials = self.client.config().credentials().cloned().ok_or_else(|| {
            Error::new(codes::NO_CREDENTIAL_PROVIDERS, "no credentials configured for domains query")
        })?;
        let credential = credentials
            .get()
            .map_err(|err| Error::new(codes::CREDENTIALS_RETRIEVE_ERROR, "failed to get credentials value").cause(err))?;

        let api = Api {
            method: Some(http::Method::GET),
            path: format!("/v3/query?ak={}&bucket={}", credential.access_key(), bucket),
            host: self
                .client
                .config()
                .uc_host()
                .unwrap_or(DEFAULT_UC_HOST)
                .to_owned(),
            content_type: mime::APPLICATION_WWW_FORM_URLENCODED.to_string(),
            token_type: TokenType::None,
            api_name: "v3query".into(),
            service_name: SERVICE_NAME.into(),
            ..Default::default()
        };
        let mut request = self.client.new_request(api, Params::None);
        request.send()?;
        request.parse_data()
    }
}
