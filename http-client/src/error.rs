use std::{
    borrow::Cow,
    error::Error as StdError,
    fmt::{self, Debug, Display},
};

/// 错误原因的统一装箱类型
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// SDK 标准错误码
///
/// 错误码是字符串标识而非整数，
/// 响应校验阶段负责把 HTTP 状态码翻译成这里的错误码
pub mod codes {
    /// 请求序列化出错
    pub const SERIALIZATION_ERROR: &str = "SerializationError";
    /// 响应反序列化出错
    pub const DESERIALIZATION_ERROR: &str = "DeserializationError";
    /// 读取数据出错
    pub const READ_ERROR: &str = "ReadError";
    /// 读取响应体超时
    pub const RESPONSE_TIMEOUT: &str = "ResponseTimeout";
    /// 请求超时
    pub const REQUEST_TIMEOUT: &str = "RequestTimeout";
    /// 请求被取消
    pub const REQUEST_CANCELED: &str = "RequestCanceled";
    /// 传输层请求失败
    pub const REQUEST_ERROR: &str = "RequestError";
    /// 非法的接口地址
    pub const INVALID_ENDPOINT_URL: &str = "InvalidEndpointURL";
    /// 401 鉴权失败
    pub const AUTHORIZATION_ERROR: &str = "AuthorizationError";
    /// 400 请求参数错误
    pub const PARAMS_ERROR: &str = "ParamsError";
    /// 403 访问被拒绝
    pub const ACCESS_DENIED_ERROR: &str = "AccessDeniedError";
    /// 404 资源不存在
    pub const NOT_FOUND_ERROR: &str = "NotFoundError";
    /// 405 非预期的请求方式
    pub const UNEXPECTED_REQUEST_ERROR: &str = "UnexpectedRequestError";
    /// 406 上传的数据 CRC32 校验错误
    pub const CRC32_VERIFICATION_ERROR: &str = "Crc32VerificationError";
    /// 419 账户被冻结
    pub const ACCOUNT_FROZEN_ERROR: &str = "AccountFrozenError";
    /// 478 镜像回源失败
    pub const MIRROR_SOURCE_ERROR: &str = "MirrorSourceError";
    /// 298 部分操作执行成功
    pub const PART_ERROR: &str = "PartError";
    /// 503 服务不可用
    pub const SERVICE_UNAVAILABLE_ERROR: &str = "ServiceUnavailableError";
    /// 504 服务超时
    pub const SERVICE_TIMEOUT_ERROR: &str = "ServiceTimeoutError";
    /// 573 请求限流
    pub const REQUEST_RATE_ERROR: &str = "RequestRateError";
    /// 579 上传回调失败
    pub const UPLOAD_CALLBACK_ERROR: &str = "UploadCallbackError";
    /// 599 服务端操作失败
    pub const SERVICE_OPERATION_ERROR: &str = "ServiceOperationError";
    /// 608 资源内容被修改
    pub const CONTENT_CHANGED_ERROR: &str = "ContentChangedError";
    /// 612 待操作的资源不存在
    pub const RESOURCE_NOT_EXIST_ERROR: &str = "ResourceNotExistError";
    /// 614 目标资源已存在
    pub const RESOURCE_EXIST_ERROR: &str = "ResourceExistError";
    /// 630 存储空间数量达到上限
    pub const STORAGE_NUMBER_LIMIT_ERROR: &str = "StorageNumberLimitError";
    /// 631 存储空间不存在
    pub const STORAGE_NOT_EXIST: &str = "StorageNotExist";
    /// 640 列举资源的 marker 非法
    pub const INVALID_MARKER_ERROR: &str = "InvalidMarkerError";
    /// 701 上传数据块校验出错
    pub const INVALID_CTX_ERROR: &str = "InvalidCtxError";
    /// 数据转换出错
    pub const CONVERT_ERROR: &str = "ConvertError";
    /// 未知错误
    pub const UNKNOWN_ERROR: &str = "UnknownError";
    /// 打开文件出错
    pub const OPEN_FILE_ERROR: &str = "OpenFileError";
    /// 输入结构体字段校验出错
    pub const STRUCT_FIELD_ERROR: &str = "StructFieldError";
    /// 获取认证信息出错
    pub const CREDENTIALS_RETRIEVE_ERROR: &str = "CredentialsRetrieveError";
    /// 请求签名出错
    pub const SIGN_REQUEST_ERROR: &str = "SignRequestError";
    /// 没有可用的认证信息提供者
    pub const NO_CREDENTIAL_PROVIDERS: &str = "NoCredentialProviders";
    /// 分片上传出错
    pub const MULTIPART_UPLOAD_ERROR: &str = "MultipartUploadError";
}

/// 归类错误
///
/// 以错误码、错误信息、原始错误对 SDK 中的错误进行归类，
/// 请求失败时还会携带 HTTP 状态码和服务端请求 ID。
/// 渲染格式为 `code: message`，
/// 存在原始错误时追加 `caused by: …`
pub struct Error {
    code: Cow<'static, str>,
    message: String,
    errs: Vec<BoxedError>,
    status_code: Option<u16>,
    request_id: Option<String>,
}

impl Error {
    /// 创建归类错误
    pub fn new(code: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            errs: Vec::new(),
            status_code: None,
            request_id: None,
        }
    }

    /// 创建携带多个原始错误的归类错误
    pub fn batched(
        code: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
        errs: Vec<BoxedError>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            errs,
            status_code: None,
            request_id: None,
        }
    }

    /// 追加原始错误
    #[must_use]
    pub fn cause(mut self, err: impl Into<BoxedError>) -> Self {
        self.errs.push(err.into());
        self
    }

    /// 设置请求失败信息，携带 HTTP 状态码和服务端请求 ID
    #[must_use]
    pub fn request_failure(mut self, status_code: u16, request_id: impl Into<String>) -> Self {
        self.status_code = Some(status_code);
        self.request_id = Some(request_id.into());
        self
    }

    /// 获取错误码
    #[inline]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// 获取具体的错误信息
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取第一个原始错误，未设置时返回 `None`
    pub fn orig_err(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.errs.first().map(AsRef::as_ref)
    }

    /// 获取所有的原始错误
    #[inline]
    pub fn orig_errs(&self) -> &[BoxedError] {
        &self.errs
    }

    /// 获取 HTTP 状态码，只有请求失败类错误才会设置
    #[inline]
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// 获取服务端请求 ID，只有请求失败类错误才会设置
    #[inline]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(status_code) = self.status_code {
            write!(
                f,
                "\n\tstatus code: {}, request id: {}",
                status_code,
                self.request_id.as_deref().unwrap_or_default()
            )?;
        }
        if !self.errs.is_empty() {
            write!(f, "\ncaused by: ")?;
            for (i, err) in self.errs.iter().enumerate() {
                if i > 0 {
                    write!(f, "\n")?;
                }
                write!(f, "{}", err)?;
            }
        }
        Ok(())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Error")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("errs", &self.errs)
            .field("status_code", &self.status_code)
            .field("request_id", &self.request_id)
            .finish()
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.errs.first().map(|err| {
            let err: &(dyn StdError + 'static) = err.as_ref();
            err
        })
    }
}
