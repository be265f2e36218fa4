#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

//! Qiniu 认证信息及请求签名库
//!
//! 提供七牛认证信息（AccessKey / SecretKey）以及三种签名算法：
//! 数据签名、上传凭证签名、HTTP 请求签名（V1 / V2）。
//! 同时提供认证信息获取方式的抽象（静态、环境变量、串联）。

use hmac::{Hmac, Mac};
use http::Method;
use mime::{APPLICATION_JSON, APPLICATION_WWW_FORM_URLENCODED};
use qiniu_utils::base64;
use sha1::Sha1;
use std::{
    env,
    fmt::{self, Debug},
    io::{Error as IoError, ErrorKind as IoErrorKind, Result as IoResult},
    sync::{Arc, RwLock},
};
pub use url::Url;

pub mod prelude {
    //! 将本库的 trait 一并引入作用域
    pub use super::CredentialProvider;
}

/// 签名算法的类型
///
/// 不同的 API 接口要求不同的签名算法，
/// 由各个接口的描述信息指定
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenType {
    /// 接口不需要鉴权
    None,

    /// QBox 签名（V1，路径签名），Authorization 前缀为 `QBox `
    QBox,

    /// Qiniu 签名（V2，请求签名），Authorization 前缀为 `Qiniu `
    Qiniu,
}

impl Default for TokenType {
    #[inline]
    fn default() -> Self {
        TokenType::None
    }
}

/// 认证信息
///
/// 包含七牛账户的 AccessKey 和 SecretKey
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_key: String,
    secret_key: Box<[u8]>,
    provider_name: &'static str,
}

impl Credential {
    /// 创建认证信息
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<Vec<u8>>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into().into_boxed_slice(),
            provider_name: "",
        }
    }

    fn with_provider_name(mut self, provider_name: &'static str) -> Self {
        self.provider_name = provider_name;
        self
    }

    /// 获取认证信息的 AccessKey
    #[inline]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// 获取认证信息的 SecretKey
    #[inline]
    pub fn secret_key(&self) -> &[u8] {
        &self.secret_key
    }

    /// 返回提供该认证信息的提供者名称，未知时为空字符串
    #[inline]
    pub fn provider_name(&self) -> &str {
        self.provider_name
    }

    /// 认证信息是否为空
    ///
    /// AccessKey 和 SecretKey 任意一个为空均视为空
    pub fn is_empty(&self) -> bool {
        self.access_key.is_empty() || self.secret_key.is_empty()
    }

    /// 使用七牛签名算法对数据进行签名
    ///
    /// 返回 `accessKey:base64url(HMAC_SHA1(secretKey, data))`
    pub fn sign(&self, data: &[u8]) -> String {
        self.access_key.clone() + ":" + &base64ed_hmac_digest(&self.secret_key, data)
    }

    /// 对数据进行签名，并同时携带原数据
    ///
    /// 一般用于上传凭证的生成，
    /// 返回 `accessKey:sign:base64url(data)`
    pub fn sign_with_data(&self, data: &[u8]) -> String {
        let encoded = base64::urlsafe(data);
        self.sign(encoded.as_bytes()) + ":" + &encoded
    }

    /// 使用 V1 签名算法对 HTTP 请求进行签名，返回 Authorization 的值
    pub fn authorization_v1_for_request(&self, url: &Url, content_type: Option<&str>, body: &[u8]) -> String {
        "QBox ".to_owned() + &self.sign(&canonical_request_v1(url, content_type, body))
    }

    /// 使用 V2 签名算法对 HTTP 请求进行签名，返回 Authorization 的值
    pub fn authorization_v2_for_request(
        &self,
        method: &Method,
        url: &Url,
        host: &str,
        content_type: Option<&str>,
        body: &[u8],
    ) -> String {
        "Qiniu ".to_owned() + &self.sign(&canonical_request_v2(method, url, host, content_type, body))
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_fmt(format_args!(
            "Credential {{ access_key: {:?}, secret_key: CENSORED }}",
            self.access_key,
        ))
    }
}

/// V1 签名的规范化字符串：`path[?query]\n`，
/// 仅当 Content-Type 为表单时附加请求体
fn canonical_request_v1(url: &Url, content_type: Option<&str>, body: &[u8]) -> Vec<u8> {
    let mut data_to_sign = Vec::with_capacity(1024);
    data_to_sign.extend_from_slice(url.path().as_bytes());
    if let Some(query) = url.query() {
        if !query.is_empty() {
            data_to_sign.extend_from_slice(b"?");
            data_to_sign.extend_from_slice(query.as_bytes());
        }
    }
    data_to_sign.extend_from_slice(b"\n");
    if !body.is_empty() && will_push_body_v1(content_type) {
        data_to_sign.extend_from_slice(body);
    }
    data_to_sign
}

/// V2 签名的规范化字符串：
/// `METHOD path[?query]\nHost: <host>\n[Content-Type: <ct>\n]\n`，
/// 仅当 Content-Type 为表单或 JSON 时附加请求体
fn canonical_request_v2(method: &Method, url: &Url, host: &str, content_type: Option<&str>, body: &[u8]) -> Vec<u8> {
    let mut data_to_sign = Vec::with_capacity(1024);
    data_to_sign.extend_from_slice(method.as_str().as_bytes());
    data_to_sign.extend_from_slice(b" ");
    data_to_sign.extend_from_slice(url.path().as_bytes());
    if let Some(query) = url.query() {
        if !query.is_empty() {
            data_to_sign.extend_from_slice(b"?");
            data_to_sign.extend_from_slice(query.as_bytes());
        }
    }
    data_to_sign.extend_from_slice(b"\nHost: ");
    data_to_sign.extend_from_slice(host.as_bytes());
    if let Some(content_type) = content_type.filter(|ct| !ct.is_empty()) {
        data_to_sign.extend_from_slice(b"\nContent-Type: ");
        data_to_sign.extend_from_slice(content_type.as_bytes());
    }
    data_to_sign.extend_from_slice(b"\n\n");
    if !body.is_empty() && will_push_body_v2(content_type) {
        data_to_sign.extend_from_slice(body);
    }
    data_to_sign
}

fn base64ed_hmac_digest(secret_key: &[u8], data: &[u8]) -> String {
    let mut hmac = Hmac::<Sha1>::new_from_slice(secret_key).expect("HMAC accepts any key length");
    hmac.update(data);
    base64::urlsafe(&hmac.finalize().into_bytes())
}

#[inline]
fn will_push_body_v1(content_type: Option<&str>) -> bool {
    content_type == Some(APPLICATION_WWW_FORM_URLENCODED.as_ref())
}

#[inline]
fn will_push_body_v2(content_type: Option<&str>) -> bool {
    matches!(content_type, Some(ct) if ct == APPLICATION_WWW_FORM_URLENCODED.as_ref() || ct == APPLICATION_JSON.as_ref())
}

/// 认证信息提供者
///
/// 为认证信息的获取方式提供接口支持
pub trait CredentialProvider: Debug + Send + Sync {
    /// 获取七牛认证信息
    fn retrieve(&self) -> IoResult<Credential>;
}

/// 静态认证信息提供者，一旦创建则不可修改
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

/// 静态认证信息提供者的名称
pub const STATIC_PROVIDER_NAME: &str = "StaticProvider";

impl StaticCredentialProvider {
    /// 构建静态认证信息提供者
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<Vec<u8>>) -> Self {
        Self {
            credential: Credential::new(access_key, secret_key).with_provider_name(STATIC_PROVIDER_NAME),
        }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    #[inline]
    fn retrieve(&self) -> IoResult<Credential> {
        Ok(self.credential.clone())
    }
}

impl Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_fmt(format_args!(
            "StaticCredentialProvider {{ access_key: {:?}, secret_key: CENSORED }}",
            self.credential.access_key,
        ))
    }
}

/// 设置七牛 AccessKey 的环境变量，按顺序取第一个非空值
pub const QINIU_ACCESS_KEY_ENV_KEYS: &[&str] = &["QINIU_ACCESS_KEY_ID", "QINIU_ACCESS_KEY"];
/// 设置七牛 SecretKey 的环境变量，按顺序取第一个非空值
pub const QINIU_SECRET_KEY_ENV_KEYS: &[&str] = &["QINIU_SECRET_ACCESS_KEY", "QINIU_SECRET_KEY"];

/// 环境变量认证信息提供者的名称
pub const ENV_PROVIDER_NAME: &str = "EnvProvider";

/// 环境变量认证信息提供者
///
/// 读取 `QINIU_ACCESS_KEY_ID` / `QINIU_ACCESS_KEY` 与
/// `QINIU_SECRET_ACCESS_KEY` / `QINIU_SECRET_KEY`，
/// 两者必须同时存在，缺一不可
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvCredentialProvider;

fn first_env_value(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.is_empty())
}

impl CredentialProvider for EnvCredentialProvider {
    fn retrieve(&self) -> IoResult<Credential> {
        let access_key = first_env_value(QINIU_ACCESS_KEY_ENV_KEYS).ok_or_else(|| {
            IoError::new(
                IoErrorKind::Other,
                "QINIU_ACCESS_KEY_ID or QINIU_ACCESS_KEY not found in environment",
            )
        })?;
        let secret_key = first_env_value(QINIU_SECRET_KEY_ENV_KEYS).ok_or_else(|| {
            IoError::new(
                IoErrorKind::Other,
                "QINIU_SECRET_ACCESS_KEY or QINIU_SECRET_KEY not found in environment",
            )
        })?;
        Ok(Credential::new(access_key, secret_key).with_provider_name(ENV_PROVIDER_NAME))
    }
}

/// 串联认证信息提供者
///
/// 依次遍历多个认证信息提供者，返回第一个可用的认证信息。
/// 开启 `verbose_errors` 后，失败信息中会列出每个提供者的错误
#[derive(Debug, Default)]
pub struct ChainCredentialsProvider {
    providers: Vec<Box<dyn CredentialProvider>>,
    verbose_errors: bool,
}

impl ChainCredentialsProvider {
    /// 构建串联认证信息提供者
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self {
            providers,
            verbose_errors: false,
        }
    }

    /// 开启详细错误信息
    pub fn verbose_errors(mut self, verbose: bool) -> Self {
        self.verbose_errors = verbose;
        self
    }

    /// 将认证信息提供者追加到串联末端
    pub fn append(mut self, provider: Box<dyn CredentialProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

impl CredentialProvider for ChainCredentialsProvider {
    fn retrieve(&self) -> IoResult<Credential> {
        let mut errors = Vec::with_capacity(self.providers.len());
        for provider in self.providers.iter() {
            match provider.retrieve() {
                Ok(credential) => return Ok(credential),
                Err(err) => errors.push(err),
            }
        }
        if self.verbose_errors {
            let details = errors
                .iter()
                .map(|err| err.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            Err(IoError::new(
                IoErrorKind::Other,
                format!("no valid providers in chain: {}", details),
            ))
        } else {
            Err(IoError::new(IoErrorKind::Other, "no valid providers in chain"))
        }
    }
}

/// 带缓存的认证信息
///
/// 并发安全地获取认证信息，成功的结果会被缓存，
/// 读取使用读锁，只有 `get` 在缓存失效时持有写锁
#[derive(Clone, Debug)]
pub struct Credentials {
    inner: Arc<CredentialsInner>,
}

#[derive(Debug)]
struct CredentialsInner {
    cache: RwLock<Option<Credential>>,
    provider: Box<dyn CredentialProvider>,
}

impl Credentials {
    /// 使用指定的提供者构建认证信息
    pub fn new(provider: impl CredentialProvider + 'static) -> Self {
        Self {
            inner: Arc::new(CredentialsInner {
                cache: RwLock::new(None),
                provider: Box::new(provider),
            }),
        }
    }

    /// 使用静态的 AccessKey / SecretKey 构建认证信息
    pub fn with_key(access_key: impl Into<String>, secret_key: impl Into<Vec<u8>>) -> Self {
        Self::new(StaticCredentialProvider::new(access_key, secret_key))
    }

    /// 获取认证信息，优先返回缓存值
    pub fn get(&self) -> IoResult<Credential> {
        if let Some(credential) = self.inner.cache.read().unwrap().as_ref() {
            return Ok(credential.clone());
        }

        let mut cache = self.inner.cache.write().unwrap();
        if let Some(credential) = cache.as_ref() {
            return Ok(credential.clone());
        }
        let credential = self.inner.provider.retrieve()?;
        *cache = Some(credential.clone());
        Ok(credential)
    }

    /// 使缓存的认证信息失效，下次 `get` 将重新获取
    pub fn expire(&self) {
        *self.inner.cache.write().unwrap() = None;
    }
}
