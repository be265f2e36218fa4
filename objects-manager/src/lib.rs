#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

//! Qiniu 对象元信息管理
//!
//! 提供对象元信息相关的接口，建立在请求管道之上

use qiniu_http_client::{
    corehandlers, Api, BaseClient, Config, Error, Params, Request, Session, TokenType, DEFAULT_RS_HOST,
};
use serde::Deserialize;
use std::fmt;

/// 存储服务的名字
pub const SERVICE_NAME: &str = "KODO";

/// 对象的基本信息
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FileInfo {
    /// 对象的哈希值
    #[serde(default)]
    pub hash: String,

    /// 对象的大小，单位字节
    #[serde(default)]
    pub fsize: i64,

    /// 对象的上传时间，单位 100 纳秒
    #[serde(default, rename = "putTime")]
    pub put_time: i64,

    /// 对象的媒体类型
    #[serde(default, rename = "mimeType")]
    pub mime_type: String,

    /// 对象的存储类型，0 为普通存储，1 为低频存储
    #[serde(default, rename = "type")]
    pub file_type: i32,
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Hash:     {}", self.hash)?;
        writeln!(f, "Fsize:    {}", self.fsize)?;
        writeln!(f, "PutTime:  {}", self.put_time)?;
        writeln!(f, "MimeType: {}", self.mime_type)?;
        writeln!(f, "Type:     {}", self.file_type)
    }
}

/// 对象管理客户端
///
/// 所有对象元信息接口的统一入口
#[derive(Clone, Debug)]
pub struct ObjectsManager {
    client: BaseClient,
}

impl ObjectsManager {
    /// 从会话创建对象管理客户端
    pub fn new(session: &Session) -> Self {
        Self::with_configs(session, &[])
    }

    /// 从会话创建对象管理客户端，追加的配置合并在会话配置之上
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

    /// 获取对象的基本信息
    pub fn stat(&self, bucket: &str, key: &str) -> Result<FileInfo, Error> {
        let mut request = self.stat_request(bucket, key);
        request.send()?;
        request.parse_data()
    }

    /// 构建 stat 接口的请求，供调用方自行定制和发送
    pub fn stat_request(&self, bucket: &str, key: &str) -> Request {
        let api = Api {
            path: format!("/stat/{}", qiniu_utils::encoded_entry(bucket, key)),
            host: self
                .client
                .config()
                .rs_host()
                .unwrap_or(DEFAULT_RS_HOST)
                .to_owned(),
            token_type: TokenType::QBox,
            api_name: "stat".into(),
            service_name: SERVICE_NAME.into(),
            ..Default::default()
        };
        self.client.new_request(api, Params::None)
    }
}
