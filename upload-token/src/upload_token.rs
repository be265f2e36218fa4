use super::UploadPolicy;
use qiniu_credential::Credentials;
use qiniu_utils::base64;
use std::{io::Error as IoError, time::Duration};
use thiserror::Error;

/// 默认的凭证有效时长
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// 生成上传凭证时发生的错误
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ToStringError {
    /// 获取认证信息发生错误
    #[error("failed to get credential: {0}")]
    CredentialGetError(#[from] IoError),

    /// 设置了 forceSaveKey 但 saveKey 为空
    #[error("forceSaveKey is set but saveKey is empty")]
    ForceSaveKeyWithoutSaveKey,
}

/// 解析上传凭证时发生的错误
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// 上传凭证格式错误
    #[error("invalid upload token format")]
    InvalidUploadTokenFormat,

    /// 上传凭证的 Base64 解码错误
    #[error("base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    /// 上传策略的 JSON 解析错误
    #[error("json decode error: {0}")]
    JsonDecodeError(#[from] serde_json::Error),
}

impl UploadPolicy {
    /// 使用认证信息对上传策略签名，生成上传凭证
    ///
    /// 凭证格式为 `accessKey:sign:base64url(policyJSON)`。
    /// 策略未设置 deadline 时默认一小时后过期
    pub fn upload_token(&self, credentials: &Credentials) -> Result<String, ToStringError> {
        if self.force_save_key() && self.save_key().is_empty() {
            return Err(ToStringError::ForceSaveKeyWithoutSaveKey);
        }
        let credential = credentials.get()?;
        let mut policy = self.clone();
        policy.set_default_deadline(DEFAULT_TOKEN_LIFETIME);
        let policy_json = serde_json::to_vec(&policy).expect("UploadPolicy is always serializable");
        Ok(credential.sign_with_data(&policy_json))
    }
}

/// 解析上传凭证，返回 AccessKey 和其中的上传策略
pub fn decode_upload_token(token: &str) -> Result<(String, UploadPolicy), ParseError> {
    let mut splits = token.splitn(3, ':');
    let access_key = splits.next().filter(|s| !s.is_empty());
    let _sign = splits.next();
    let encoded_policy = splits.next();
    match (access_key, encoded_policy) {
        (Some(access_key), Some(encoded_policy)) => {
            let policy_json = base64::decode(encoded_policy.as_bytes())?;
            let policy = serde_json::from_slice(&policy_json)?;
            Ok((access_key.to_owned(), policy))
        }
        _ => Err(ParseError::InvalidUploadTokenFormat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn get_credentials() -> Credentials {
        Credentials::with_key("abcdefghklmnopq", "1234567890")
    }

    #[test]
    fn test_upload_token_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let policy = UploadPolicy::new_for_object("gosdk", "upload.txt")
            .with_deadline(UNIX_EPOCH + Duration::from_secs(1_234_567_890))
            .with_insert_only(true);
        let token = policy.upload_token(&get_credentials())?;

        let (access_key, decoded) = decode_upload_token(&token)?;
        assert_eq!(access_key, "abcdefghklmnopq");
        assert_eq!(decoded, policy);
        Ok(())
    }

    #[test]
    fn test_default_deadline() -> Result<(), Box<dyn std::error::Error>> {
        let policy = UploadPolicy::new_for_bucket("gosdk");
        let token = policy.upload_token(&get_credentials())?;
        let (_, decoded) = decode_upload_token(&token)?;

        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as u32;
        assert!(decoded.deadline() >= now + 3590 && decoded.deadline() <= now + 3610);
        // 原始策略不受影响
        assert_eq!(policy.deadline(), 0);
        Ok(())
    }

    #[test]
    fn test_force_save_key_requires_save_key() {
        let policy = UploadPolicy::new_for_bucket("gosdk").with_force_save_key(true);
        assert!(matches!(
            policy.upload_token(&get_credentials()),
            Err(ToStringError::ForceSaveKeyWithoutSaveKey)
        ));

        let policy = policy.with_save_key("uploads/$(fname)");
        assert!(policy.upload_token(&get_credentials()).is_ok());
    }

    #[test]
    fn test_decode_invalid_token() {
        assert!(matches!(
            decode_upload_token("not-a-token"),
            Err(ParseError::InvalidUploadTokenFormat)
        ));
        assert!(decode_upload_token("ak:sig:!!!invalid-base64!!!").is_err());
    }
}
