#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

//! Qiniu SDK 内部实用工具库
//!
//! 提供 URL 安全的 Base64 计算，以及对象标识编码等基础工具

pub mod base64;

/// 生成 URL 安全 Base64 编码的对象标识（`<bucket>:<key>`）
pub fn encoded_entry(bucket: &str, key: &str) -> String {
    base64::urlsafe(format!("{}:{}", bucket, key).as_bytes())
}
