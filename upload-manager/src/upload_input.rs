use super::{
    host_selector::{ErrorFrequencySelector, HostsSelector},
    region::get_default_region,
    UploadManager, DEFAULT_UPLOAD_CONCURRENCY,
};
use qiniu_http_client::{codes, Error, ReaderSeekerCloser};
use qiniu_upload_token::{decode_upload_token, UploadPolicy};
use serde::Deserialize;
use std::{collections::HashMap, fs::File, sync::Arc};

/// 请求 `v3/query` 接口出错的错误码
pub(crate) const ERR_QUERY_DOMAINS: &str = "QueryDomainsError";

/// 没有可用上传域名的错误码
pub(crate) const ERR_NO_UP_HOSTS: &str = "NoUpHostsError";

/// 空上传凭证的错误码
pub(crate) const ERR_EMPTY_UP_TOKEN: &str = "EmptyUptokenError";

/// 非法上传凭证的错误码
pub(crate) const ERR_INVALID_UP_TOKEN: &str = "InvalidUptokenError";

/// 上传的输入
///
/// `key` 必须设置；`up_token`、`put_policy`、`bucket_name` 三者至少设置其一；
/// `filename` 和 `data` 两者至少设置其一，同时设置时使用 `data` 的内容上传。
/// 上传期间不要修改输入的值，未设置的字段会按配置补全
#[derive(Debug, Default)]
pub struct UploadInput {
    /// 分片上传的并发数，0 表示使用默认值
    pub concurrency: usize,

    /// 用户自定义参数，名字没有 `x:` 前缀时会被自动补上
    pub custom_params: HashMap<String, String>,

    /// 对象的媒体类型，为空时服务端自动判断
    pub mime_type: String,

    /// 自定义元数据，名字没有 `x-qn-meta-` 前缀时会被自动补上
    pub meta_keys: HashMap<String, String>,

    /// 表单上传时响应的 Content-Type，用于兼容低版本浏览器
    pub accept_content_type: String,

    /// 原文件名，作为魔法变量 $(fname) 的值。
    /// 未设置时使用随机生成的纯小写字母字符串
    pub orig_filename: String,

    /// 上传使用的域名列表，域名可以携带协议前缀
    pub up_hosts: Vec<String>,

    /// 上传域名选择器
    pub selector: Option<Arc<dyn HostsSelector>>,

    /// 是否使用 https 上传
    pub use_https: bool,

    /// 对象保存在存储空间中的名字，必须是 UTF-8 编码
    pub key: String,

    /// 存储空间的名字。
    /// 与 `up_token` 或 `put_policy` 同时设置时，以凭证中的 scope 为准
    pub bucket_name: String,

    /// 存储空间所在的区域名称
    pub region: String,

    /// 表单上传时是否开启 CRC32 校验
    pub with_crc32: bool,

    /// 分片上传时是否携带每个分片的 Content-MD5
    pub check_md5: bool,

    /// 要上传的数据
    pub data: Option<ReaderSeekerCloser>,

    /// 要上传的本地文件路径
    pub filename: String,

    /// 上传策略，`up_token` 为空时以该策略计算上传凭证
    pub put_policy: Option<UploadPolicy>,

    /// 上传凭证，非空时忽略 `put_policy` 和 `bucket_name`
    pub up_token: String,
}

impl UploadInput {
    /// 初始化上传输入
    ///
    /// 依次完成字段校验、上传凭证的生成、存储空间和区域的解析、
    /// 上传域名选择器的解析以及数据源的打开。
    /// 返回探测到的数据总大小，未知时为 -1。
    /// 重复初始化没有效果
    pub(crate) fn init(&mut self, manager: &UploadManager) -> Result<i64, Error> {
        if self.concurrency == 0 {
            self.concurrency = DEFAULT_UPLOAD_CONCURRENCY;
        }
        self.validate_fields()?;
        self.setup_fields(manager)
    }

    fn validate_fields(&self) -> Result<(), Error> {
        if self.up_token.is_empty() && self.put_policy.is_none() && self.bucket_name.is_empty() {
            return Err(Error::new(
                codes::STRUCT_FIELD_ERROR,
                "UpToken, PutPolicy, BucketName field are all empty",
            ));
        }
        if self.filename.is_empty() && self.data.is_none() {
            return Err(Error::new(
                codes::STRUCT_FIELD_ERROR,
                "field Filename and Data are both empty",
            ));
        }
        if self.key.is_empty() {
            return Err(Error::new(codes::STRUCT_FIELD_ERROR, "Key field is empty"));
        }
        Ok(())
    }

    /// 设置上传凭证、存储空间、区域和域名选择器
    ///
    /// 各个步骤依赖之前步骤设置的字段，顺序不能改变
    fn setup_fields(&mut self, manager: &UploadManager) -> Result<i64, Error> {
        if self.up_token.is_empty() {
            self.up_token = self.make_up_token(manager)?;
        }

        let (_, policy) = decode_upload_token(&self.up_token)
            .map_err(|err| Error::new(ERR_INVALID_UP_TOKEN, "invalid upload token").cause(err))?;
        self.bucket_name = policy.bucket_name().to_owned();
        if self.put_policy.is_none() {
            self.put_policy = Some(policy);
        }

        if self.region.is_empty() {
            if let Some(region) = manager.client().config().region() {
                self.region = region.to_owned();
            }
        }

        if self.selector.is_none() || !self.up_hosts.is_empty() {
            self.selector = Some(self.make_selector(manager)?);
        }

        if self.data.is_none() {
            let file = File::open(&self.filename).map_err(|err| {
                Error::new(
                    codes::OPEN_FILE_ERROR,
                    format!("failed to open file `{}`", self.filename),
                )
                .cause(err)
            })?;
            self.data = Some(ReaderSeekerCloser::from_file(file));
        }

        let total_size = match self.data.as_mut() {
            Some(data) if data.is_seeker() => data
                .len()
                .map_err(|err| Error::new(codes::READ_ERROR, "failed to probe data size").cause(err))?,
            _ => -1,
        };
        Ok(total_size)
    }

    /// 生成最终的上传凭证
    ///
    /// 设置了上传策略时对该策略签名，
    /// 否则以 `bucket_name` 构造只指定 scope 的策略
    fn make_up_token(&self, manager: &UploadManager) -> Result<String, Error> {
        let policy = match (&self.put_policy, self.bucket_name.as_str()) {
            (Some(policy), _) => policy.clone(),
            (None, bucket) if !bucket.is_empty() => UploadPolicy::new_for_bucket(bucket),
            _ => {
                return Err(Error::new(
                    ERR_EMPTY_UP_TOKEN,
                    "UpToken, PutPolicy, BucketName field cannot be empty at the same time",
                ));
            }
        };
        let credentials = manager.client().config().credentials().cloned().ok_or_else(|| {
            Error::new(codes::NO_CREDENTIAL_PROVIDERS, "no credentials configured for upload token")
        })?;
        policy
            .upload_token(&credentials)
            .map_err(|err| Error::new(codes::SIGN_REQUEST_ERROR, "failed to sign upload policy").cause(err))
    }

    /// 解析上传域名选择器
    ///
    /// 优先级从高到低：显式的域名列表、显式的选择器、
    /// 内置的区域默认域名、`v3/query` 接口查询的结果
    fn make_selector(&self, manager: &UploadManager) -> Result<Arc<dyn HostsSelector>, Error> {
        if !self.up_hosts.is_empty() {
            return Ok(Arc::new(ErrorFrequencySelector::new(self.up_hosts.clone())));
        }
        if let Some(selector) = &self.selector {
            return Ok(selector.clone());
        }
        if let Some(region) = get_default_region(&self.region) {
            let hosts = if region.cdn_up_hosts.is_empty() {
                region.src_up_hosts
            } else {
                region.cdn_up_hosts
            };
            let hosts = hosts.iter().map(|host| (*host).to_owned()).collect::<Vec<_>>();
            return Ok(Arc::new(ErrorFrequencySelector::new(hosts)));
        }

        let domains = manager.query_region_domains(&self.bucket_name).map_err(|err| {
            Error::new(
                ERR_QUERY_DOMAINS,
                format!("query region domains error for bucket: {}", self.bucket_name),
            )
            .cause(err)
        })?;
        let group = domains.select_up_domain_group();
        if group.is_empty() {
            return Err(Error::new(ERR_NO_UP_HOSTS, "no upload host found"));
        }
        let hosts = if group.is_main_empty() { group.backup } else { group.main };
        Ok(Arc::new(ErrorFrequencySelector::new(hosts)))
    }

    /// 选择一个上传域名，返回域名和协议
    pub(crate) fn up_host(&self) -> Result<(String, String), Error> {
        let selector = self
            .selector
            .as_ref()
            .ok_or_else(|| Error::new(ERR_NO_UP_HOSTS, "no upload host found"))?;
        let (host, _) = normalize_host(&selector.select())?;
        let scheme = if self.use_https { "https" } else { "http" };
        Ok((host, scheme.to_owned()))
    }

    pub(crate) fn take_data(&mut self) -> Option<ReaderSeekerCloser> {
        self.data.take()
    }
}

/// 规范化域名，剥离可能携带的协议前缀
///
/// 返回 (域名, 协议)，没有协议前缀时协议为空字符串
pub(crate) fn normalize_host(host: &str) -> Result<(String, String), Error> {
    match host.split_once("://") {
        Some((scheme, host)) if host.contains("://") => Err(Error::new(
            "InvalidHostFormatError",
            format!("invalid host format: {}://{}", scheme, host),
        )),
        Some((scheme, host)) => Ok((host.to_owned(), scheme.to_owned())),
        None => Ok((host.to_owned(), String::new())),
    }
}

/// 上传接口默认的应答
///
/// 上传策略定义了 returnBody 时应答会有其他的字段，
/// 需要调用方定义相应的结构体接收
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UploadOutput {
    /// 对象的哈希值
    #[serde(default)]
    pub hash: String,

    /// 对象保存在存储空间中的名字
    #[serde(default)]
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use qiniu_http_client::{Config, Credentials, Session, SessionOptions};

    fn test_manager() -> UploadManager {
        let session = Session::with_options(SessionOptions {
            config: Config::new().with_credentials(Credentials::with_key("abcdefghklmnopq", "1234567890")),
            shared_config_files: Some(Vec::new()),
            ..Default::default()
        })
        .unwrap();
        UploadManager::new(&session)
    }

    #[test]
    fn test_validation_requires_key() {
        let manager = test_manager();
        let mut input = UploadInput {
            bucket_name: "gosdk".to_owned(),
            data: Some(ReaderSeekerCloser::from_bytes(b"data".to_vec())),
            ..Default::default()
        };
        let err = input.init(&manager).unwrap_err();
        assert_eq!(err.code(), codes::STRUCT_FIELD_ERROR);
        assert!(err.message().contains("Key"));
    }

    #[test]
    fn test_validation_requires_token_source() {
        let manager = test_manager();
        let mut input = UploadInput {
            key: "file.txt".to_owned(),
            data: Some(ReaderSeekerCloser::from_bytes(b"data".to_vec())),
            ..Default::default()
        };
        let err = input.init(&manager).unwrap_err();
        assert_eq!(err.code(), codes::STRUCT_FIELD_ERROR);
    }

    #[test]
    fn test_validation_requires_data_source() {
        let manager = test_manager();
        let mut input = UploadInput {
            key: "file.txt".to_owned(),
            bucket_name: "gosdk".to_owned(),
            ..Default::default()
        };
        let err = input.init(&manager).unwrap_err();
        assert_eq!(err.code(), codes::STRUCT_FIELD_ERROR);
    }

    #[test]
    fn test_token_materialized_from_bucket_name() {
        let manager = test_manager();
        let mut input = UploadInput {
            key: "file.txt".to_owned(),
            bucket_name: "gosdk".to_owned(),
            up_hosts: vec!["up.qiniup.com".to_owned()],
            data: Some(ReaderSeekerCloser::from_bytes(b"hello".to_vec())),
            ..Default::default()
        };
        let total_size = input.init(&manager).unwrap();

        assert!(!input.up_token.is_empty());
        let (access_key, policy) = decode_upload_token(&input.up_token).unwrap();
        assert_eq!(access_key, "abcdefghklmnopq");
        assert_eq!(policy.scope(), "gosdk");
        assert_eq!(total_size, 5);
        assert!(input.selector.is_some());
    }

    #[test]
    fn test_explicit_token_wins_over_policy() {
        let manager = test_manager();
        let credentials = Credentials::with_key("abcdefghklmnopq", "1234567890");
        let token = UploadPolicy::new_for_object("gosdk", "file.txt")
            .upload_token(&credentials)
            .unwrap();
        let mut input = UploadInput {
            key: "file.txt".to_owned(),
            up_token: token.clone(),
            bucket_name: "ignored".to_owned(),
            up_hosts: vec!["up.qiniup.com".to_owned()],
            data: Some(ReaderSeekerCloser::from_bytes(b"hello".to_vec())),
            ..Default::default()
        };
        input.init(&manager).unwrap();
        assert_eq!(input.up_token, token);
        // 存储空间名来自凭证中的 scope
        assert_eq!(input.bucket_name, "gosdk");
    }

    #[test]
    fn test_unseekable_data_has_unknown_size() {
        let manager = test_manager();
        let mut input = UploadInput {
            key: "file.txt".to_owned(),
            bucket_name: "gosdk".to_owned(),
            up_hosts: vec!["up.qiniup.com".to_owned()],
            data: Some(ReaderSeekerCloser::from_reader(std::io::empty())),
            ..Default::default()
        };
        assert_eq!(input.init(&manager).unwrap(), -1);
    }

    #[test]
    fn test_region_defaults_resolve_selector() {
        let manager = test_manager();
        let mut input = UploadInput {
            key: "file.txt".to_owned(),
            bucket_name: "gosdk".to_owned(),
            region: "z0".to_owned(),
            data: Some(ReaderSeekerCloser::from_bytes(b"hello".to_vec())),
            ..Default::default()
        };
        input.init(&manager).unwrap();
        let (host, scheme) = input.up_host().unwrap();
        assert_eq!(scheme, "http");
        assert!(host.contains("qiniup.com"));
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("https://up.qiniup.com").unwrap(),
            ("up.qiniup.com".to_owned(), "https".to_owned())
        );
        assert_eq!(
            normalize_host("up.qiniup.com").unwrap(),
            ("up.qiniup.com".to_owned(), String::new())
        );
        assert!(normalize_host("http://a://b").is_err());
    }
}
