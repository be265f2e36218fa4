#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

//! Qiniu 上传策略与上传凭证库
//!
//! 上传策略描述一次上传被允许做什么，
//! 上传凭证是对 JSON 序列化后的上传策略的签名，
//! 凭证授权客户端直接向存储服务上传对象。

mod upload_policy;
mod upload_token;

pub use upload_policy::UploadPolicy;
pub use upload_token::{decode_upload_token, ParseError, ToStringError};
