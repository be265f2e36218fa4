use qiniu_http_client::Error;
use std::{
    error::Error as StdError,
    fmt::{self, Debug, Display},
};

/// 分片上传失败
///
/// 在请求失败信息之外额外携带 uploadId，
/// 调用方可以据此判断失败是否可以断点续传
#[derive(Debug)]
pub struct MultiUploadFailure {
    failure: Error,
    upload_id: String,
}

impl MultiUploadFailure {
    pub(crate) fn new(failure: Error, upload_id: impl Into<String>) -> Self {
        Self {
            failure,
            upload_id: upload_id.into(),
        }
    }

    /// 获取错误码
    #[inline]
    pub fn code(&self) -> &str {
        self.failure.code()
    }

    /// 获取具体的错误信息
    #[inline]
    pub fn message(&self) -> &str {
        self.failure.message()
    }

    /// 获取 HTTP 状态码
    #[inline]
    pub fn status_code(&self) -> Option<u16> {
        self.failure.status_code()
    }

    /// 获取服务端请求 ID
    #[inline]
    pub fn request_id(&self) -> Option<&str> {
        self.failure.request_id()
    }

    /// 获取分片上传的 uploadId
    #[inline]
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// 取出内部的请求错误
    pub fn into_inner(self) -> Error {
        self.failure
    }
}

impl Display for MultiUploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}\n\tupload id: {}", self.failure, self.upload_id)
    }
}

impl StdError for MultiUploadFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.failure)
    }
}

/// 上传失败
///
/// 表单上传失败是普通的请求错误，
/// 分片上传失败额外携带 uploadId
#[derive(Debug)]
pub enum UploadError {
    /// 请求错误
    Request(Error),

    /// 分片上传错误
    MultiUpload(MultiUploadFailure),
}

impl UploadError {
    /// 获取错误码
    pub fn code(&self) -> &str {
        match self {
            UploadError::Request(err) => err.code(),
            UploadError::MultiUpload(err) => err.code(),
        }
    }

    /// 获取具体的错误信息
    pub fn message(&self) -> &str {
        match self {
            UploadError::Request(err) => err.message(),
            UploadError::MultiUpload(err) => err.message(),
        }
    }

    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UploadError::Request(err) => err.status_code(),
            UploadError::MultiUpload(err) => err.status_code(),
        }
    }

    /// 获取服务端请求 ID
    pub fn request_id(&self) -> Option<&str> {
        match self {
            UploadError::Request(err) => err.request_id(),
            UploadError::MultiUpload(err) => err.request_id(),
        }
    }
}

impl Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UploadError::Request(err) => Display::fmt(err, f),
            UploadError::MultiUpload(err) => Display::fmt(err, f),
        }
    }
}

impl StdError for UploadError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            UploadError::Request(err) => Some(err),
            UploadError::MultiUpload(err) => Some(err),
        }
    }
}

impl From<Error> for UploadError {
    #[inline]
    fn from(err: Error) -> Self {
        UploadError::Request(err)
    }
}

/// 包装分片上传过程中的错误
///
/// 请求已经到达服务端（有状态码）时以分片上传失败包装，
/// 携带出错请求的 uploadId，否则原样返回
pub(crate) fn err_upload(err: Error, upload_id: &str) -> UploadError {
    if err.status_code().is_some() && !upload_id.is_empty() {
        UploadError::MultiUpload(MultiUploadFailure::new(err, upload_id))
    } else {
        UploadError::Request(err)
    }
}
