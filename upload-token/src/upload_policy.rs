use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// 上传策略
///
/// 控制上传的目标空间、凭证有效期、回调、
/// 返回内容等行为，作为上传凭证的签名对象。
/// 详细的字段文档可以参考
/// <https://developer.qiniu.com/kodo/manual/1206/put-policy>
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadPolicy {
    scope: String,

    /// 凭证过期时间，秒级 Unix 时间戳。服务端按 uint32 解释
    deadline: u32,

    #[serde(skip_serializing_if = "is_default")]
    is_prefixal_scope: i32,

    #[serde(skip_serializing_if = "is_default")]
    insert_only: u16,

    #[serde(skip_serializing_if = "is_default")]
    force_save_key: bool,

    #[serde(skip_serializing_if = "is_default")]
    detect_mime: u8,

    #[serde(skip_serializing_if = "is_default")]
    fsize_limit: i64,

    #[serde(skip_serializing_if = "is_default")]
    fsize_min: i64,

    #[serde(skip_serializing_if = "is_default")]
    mime_limit: String,

    #[serde(skip_serializing_if = "is_default")]
    save_key: String,

    #[serde(skip_serializing_if = "is_default")]
    callback_fetch_key: u8,

    #[serde(rename = "callbackUrl", skip_serializing_if = "is_default")]
    callback_url: String,

    #[serde(skip_serializing_if = "is_default")]
    callback_host: String,

    #[serde(skip_serializing_if = "is_default")]
    callback_body: String,

    #[serde(skip_serializing_if = "is_default")]
    callback_body_type: String,

    #[serde(rename = "returnUrl", skip_serializing_if = "is_default")]
    return_url: String,

    #[serde(skip_serializing_if = "is_default")]
    return_body: String,

    #[serde(skip_serializing_if = "is_default")]
    persistent_ops: String,

    #[serde(rename = "persistentNotifyUrl", skip_serializing_if = "is_default")]
    persistent_notify_url: String,

    #[serde(skip_serializing_if = "is_default")]
    persistent_pipeline: String,

    #[serde(skip_serializing_if = "is_default")]
    end_user: String,

    #[serde(skip_serializing_if = "is_default")]
    delete_after_days: i32,

    #[serde(skip_serializing_if = "is_default")]
    file_type: i32,
}

impl UploadPolicy {
    /// 创建指定存储空间的上传策略
    pub fn new_for_bucket(bucket: impl Into<String>) -> Self {
        Self {
            scope: bucket.into(),
            ..Default::default()
        }
    }

    /// 创建指定存储空间和对象名称的上传策略
    pub fn new_for_object(bucket: impl AsRef<str>, key: impl AsRef<str>) -> Self {
        Self {
            scope: format!("{}:{}", bucket.as_ref(), key.as_ref()),
            ..Default::default()
        }
    }

    /// 获取策略的 scope 字段
    #[inline]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// 解析 scope，返回存储空间名称
    pub fn bucket_name(&self) -> &str {
        self.scope.split(':').next().unwrap_or_default()
    }

    /// 获取凭证过期时间戳，0 表示尚未设置
    #[inline]
    pub fn deadline(&self) -> u32 {
        self.deadline
    }

    /// 是否强制使用 saveKey 命名
    #[inline]
    pub fn force_save_key(&self) -> bool {
        self.force_save_key
    }

    /// 获取 saveKey 命名模板
    #[inline]
    pub fn save_key(&self) -> &str {
        &self.save_key
    }

    /// 设置凭证的过期时间
    pub fn with_deadline(mut self, deadline: SystemTime) -> Self {
        self.deadline = deadline
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs() as u32)
            .unwrap_or_default();
        self
    }

    /// 设置凭证自现在起的有效时长
    pub fn with_deadline_after_now(self, lifetime: Duration) -> Self {
        self.with_deadline(SystemTime::now() + lifetime)
    }

    /// scope 中的对象名是否为前缀
    pub fn with_prefixal_scope(mut self, is_prefixal_scope: bool) -> Self {
        self.is_prefixal_scope = i32::from(is_prefixal_scope);
        self
    }

    /// 限定为新增语意，无法覆盖已有对象
    pub fn with_insert_only(mut self, insert_only: bool) -> Self {
        self.insert_only = u16::from(insert_only);
        self
    }

    /// 强制使用 saveKey 的值作为对象名称
    ///
    /// 开启时 saveKey 不允许为空
    pub fn with_force_save_key(mut self, force_save_key: bool) -> Self {
        self.force_save_key = force_save_key;
        self
    }

    /// 服务端根据内容自动侦测 MimeType
    pub fn with_detect_mime(mut self, detect_mime: bool) -> Self {
        self.detect_mime = u8::from(detect_mime);
        self
    }

    /// 限定上传文件大小的上界，单位字节
    pub fn with_fsize_limit(mut self, fsize_limit: i64) -> Self {
        self.fsize_limit = fsize_limit;
        self
    }

    /// 限定上传文件大小的下界，单位字节
    pub fn with_fsize_min(mut self, fsize_min: i64) -> Self {
        self.fsize_min = fsize_min;
        self
    }

    /// 限定上传文件的类型，多个以分号连接，首个 `!` 表示反向限定
    pub fn with_mime_limit(mut self, mime_limits: &[&str]) -> Self {
        self.mime_limit = mime_limits.join(";");
        self
    }

    /// 设置对象名称模板
    pub fn with_save_key(mut self, save_key: impl Into<String>) -> Self {
        self.save_key = save_key.into();
        self
    }

    /// 上传回调时七牛是否向业务服务器查询对象名称
    pub fn with_callback_fetch_key(mut self, fetch_key: bool) -> Self {
        self.callback_fetch_key = u8::from(fetch_key);
        self
    }

    /// 设置上传回调地址，多个以分号连接依次重试
    pub fn with_callback_url(mut self, callback_urls: &[&str]) -> Self {
        self.callback_url = callback_urls.join(";");
        self
    }

    /// 设置上传回调请求的 Host
    pub fn with_callback_host(mut self, callback_host: impl Into<String>) -> Self {
        self.callback_host = callback_host.into();
        self
    }

    /// 设置上传回调请求体，与 callbackUrl 配合使用
    pub fn with_callback_body(mut self, callback_body: impl Into<String>) -> Self {
        self.callback_body = callback_body.into();
        self
    }

    /// 设置上传回调请求体的 Content-Type
    pub fn with_callback_body_type(mut self, callback_body_type: impl Into<String>) -> Self {
        self.callback_body_type = callback_body_type.into();
        self
    }

    /// Web 端上传成功后浏览器执行 303 跳转的地址
    pub fn with_return_url(mut self, return_url: impl Into<String>) -> Self {
        self.return_url = return_url.into();
        self
    }

    /// 上传成功后返回给上传端的内容模板
    pub fn with_return_body(mut self, return_body: impl Into<String>) -> Self {
        self.return_body = return_body.into();
        self
    }

    /// 上传成功后触发执行的预转持久化处理指令列表
    pub fn with_persistent_ops(mut self, ops: impl Into<String>) -> Self {
        self.persistent_ops = ops.into();
        self
    }

    /// 接收持久化处理结果通知的地址
    pub fn with_persistent_notify_url(mut self, notify_url: impl Into<String>) -> Self {
        self.persistent_notify_url = notify_url.into();
        self
    }

    /// 持久化处理使用的独立转码队列
    pub fn with_persistent_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.persistent_pipeline = pipeline.into();
        self
    }

    /// 设置唯一属主标识
    pub fn with_end_user(mut self, end_user: impl Into<String>) -> Self {
        self.end_user = end_user.into();
        self
    }

    /// 对象在指定天数后自动删除
    pub fn with_delete_after_days(mut self, days: i32) -> Self {
        self.delete_after_days = days;
        self
    }

    /// 对象的存储类型，0 为普通存储，1 为低频存储
    pub fn with_file_type(mut self, file_type: i32) -> Self {
        self.file_type = file_type;
        self
    }

    pub(crate) fn set_default_deadline(&mut self, lifetime: Duration) {
        if self.deadline == 0 {
            let deadline = SystemTime::now() + lifetime;
            self.deadline = deadline
                .duration_since(UNIX_EPOCH)
                .map(|duration| duration.as_secs() as u32)
                .unwrap_or_default();
        }
    }
}
