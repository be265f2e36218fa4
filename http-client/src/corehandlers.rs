//! 管道各个阶段的标准处理函数

use super::{
    codes,
    error::Error,
    handlers::NamedHandler,
    http_caller::{status_line, HttpResponse},
    request::{Params, Request},
};
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use mime::{APPLICATION_JSON, APPLICATION_WWW_FORM_URLENCODED};
use qiniu_credential::Credential;
use serde::Deserialize;
use std::{env, io::Cursor, io::Read};

/// SDK 名字，参与 User-Agent 组装
pub const SDK_NAME: &str = "qiniu-rust-sdk";

/// SDK 版本号，参与 User-Agent 组装
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// 内容长度处理函数的名字
pub const BUILD_CONTENT_LENGTH_HANDLER_NAME: &str = "core.BuildContentLengthHandler";
/// 请求体编码处理函数的名字
pub const BODY_HANDLER_NAME: &str = "core.BodyHandler";
/// 发送处理函数的名字
pub const SEND_HANDLER_NAME: &str = "core.SendHandler";
/// 响应校验处理函数的名字
pub const VALIDATE_RESPONSE_HANDLER_NAME: &str = "core.ValidateResponseHandler";
/// 响应元信息处理函数的名字
pub const UNMARSHAL_META_HANDLER_NAME: &str = "core.UnmarshalMetaHandler";
/// 响应反序列化处理函数的名字
pub const UNMARSHAL_HANDLER_NAME: &str = "core.UnmarshalHandler";
/// 重试执行处理函数的名字
pub const AFTER_RETRY_HANDLER_NAME: &str = "core.AfterRetryHandler";
/// 请求收尾处理函数的名字
pub const COMPLETE_HANDLER_NAME: &str = "core.CompleteHandler";
/// SDK 版本 User-Agent 处理函数的名字
pub const SDK_VERSION_USER_AGENT_HANDLER_NAME: &str = "core.SDKVersionUserAgentHandler";
/// 运行环境 User-Agent 处理函数的名字
pub const ADD_HOST_EXEC_ENV_USER_AGENT_HANDLER_NAME: &str = "core.AddHostExecEnvUserAgentHandler";
/// 参数校验处理函数的名字
pub const VALIDATE_PARAMETERS_HANDLER_NAME: &str = "core.ValidateParametersHandler";
/// QBox 签名处理函数的名字
pub const QBOX_TOKEN_REQUEST_HANDLER_NAME: &str = "qiniusdk.auth.QboxTokenRequestHandler";
/// Qiniu 签名处理函数的名字
pub const QINIU_TOKEN_REQUEST_HANDLER_NAME: &str = "qiniusdk.auth.QiniuTokenRequestHandler";

/// 追加到用户 User-Agent 的环境变量
const EXEC_ENV_VAR: &str = "QINIU_EXECUTION_ENV";
const EXEC_ENV_UA_KEY: &str = "exec-env";

/// 计算请求的内容长度
///
/// 优先使用请求体的长度，长度未知时回落到已有的 Content-Length 头，
/// 两者都没有按序列化错误处理。
/// 长度大于 0 才设置 Content-Length 头，否则剥除该头
pub fn build_content_length_handler() -> NamedHandler {
    NamedHandler::new(BUILD_CONTENT_LENGTH_HANDLER_NAME, |r| {
        let length = match r.body_len() {
            Ok(len) if len >= 0 => len,
            Ok(_) => {
                let from_header = r
                    .http_request()
                    .headers
                    .get(CONTENT_LENGTH)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<i64>().ok());
                match from_header {
                    Some(len) => len,
                    None => {
                        r.set_error(Error::new(
                            codes::SERIALIZATION_ERROR,
                            "failed to get request body's length",
                        ));
                        return;
                    }
                }
            }
            Err(err) => {
                r.set_error(
                    Error::new(codes::SERIALIZATION_ERROR, "failed to get request body's length").cause(err),
                );
                return;
            }
        };
        if length > 0 {
            r.http_request_mut()
                .headers
                .insert(CONTENT_LENGTH, http::HeaderValue::from(length as u64));
        } else {
            r.http_request_mut().headers.remove(CONTENT_LENGTH);
        }
    })
}

/// 根据请求的 Content-Type 选择编码方式，把输入参数序列化到请求体中
///
/// JSON 序列化 JSON 参数，表单编码扁平键值对参数，
/// 其余的内容类型要求参数本身是可读数据流或字节缓冲区。
/// 请求体被设置为可回绕的数据流并记录其起始偏移
pub fn body_handler() -> NamedHandler {
    NamedHandler::new(BODY_HANDLER_NAME, |r| {
        if !r.params().is_filled() {
            return;
        }
        let content_type = r
            .http_request()
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let params = r.take_params();
        if content_type == APPLICATION_JSON.as_ref() {
            match params {
                Params::Json(value) => match serde_json::to_vec(&value) {
                    Ok(data) => r.set_buffer_body(data),
                    Err(err) => r.set_error(
                        Error::new(codes::SERIALIZATION_ERROR, "failed to encode application/json data").cause(err),
                    ),
                },
                _ => r.set_error(Error::new(
                    codes::SERIALIZATION_ERROR,
                    "request params must be JSON for content-type: application/json",
                )),
            }
        } else if content_type == APPLICATION_WWW_FORM_URLENCODED.as_ref() {
            match params {
                Params::Form(pairs) => {
                    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                    for (name, value) in pairs.iter() {
                        serializer.append_pair(name, value);
                    }
                    r.set_buffer_body(serializer.finish().into_bytes());
                }
                _ => r.set_error(Error::new(
                    codes::SERIALIZATION_ERROR,
                    "request params must be a flat form for content-type: application/x-www-form-urlencoded",
                )),
            }
        } else {
            match params {
                Params::Stream(reader) => r.set_reader_body(reader),
                Params::Bytes(buf) => r.set_buffer_body(buf),
                _ => r.set_error(Error::new(
                    codes::SERIALIZATION_ERROR,
                    format!(
                        "request params must be a readable seekable or byte buffer for content-type: {}",
                        content_type
                    ),
                )),
            }
        }
    })
}

/// 通过 HTTP 客户端发出请求
///
/// 传输层失败归类为可以重试的 `RequestError`，
/// 请求被取消归类为不可重试的 `RequestCanceled`
pub fn send_handler() -> NamedHandler {
    NamedHandler::new(SEND_HANDLER_NAME, |r| {
        if r.cancel().is_cancelled() {
            r.set_http_response(HttpResponse::empty_with_status(0));
            r.set_error(Error::new(codes::REQUEST_CANCELED, "request context canceled"));
            r.set_retryable(Some(false));
            return;
        }

        let caller = r.config().http_caller();
        let follow_redirects = !r.disable_follow_redirects();
        let cancel = r.cancel().clone();
        let result = {
            let (request, body) = r.http_request_and_body_mut();
            caller.call(request, body, follow_redirects)
        };
        match result {
            Ok(response) => r.set_http_response(response),
            Err(err) => {
                // 保证响应槽位的一致性
                r.set_http_response(HttpResponse::empty_with_status(0));
                if cancel.is_cancelled() {
                    r.set_error(Error::new(codes::REQUEST_CANCELED, "request context canceled").cause(err));
                    r.set_retryable(Some(false));
                } else {
                    r.set_error(Error::new(codes::REQUEST_ERROR, "send request failed").cause(err));
                    r.set_retryable(Some(true));
                }
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct ErrMsg {
    error: Option<String>,
}

/// 校验响应并把状态码翻译成错误码
///
/// 状态码为 0 或不小于 300 视为失败。
/// JSON 响应体中的 `error` 字段会被提取进错误信息，
/// 响应体之后以内存缓冲还回，调用方仍然可以读取
pub fn validate_response_handler() -> NamedHandler {
    NamedHandler::new(VALIDATE_RESPONSE_HANDLER_NAME, |r| {
        let status = r.response_status();
        if status != 0 && status < 300 {
            return;
        }

        let mut convert_err = None;
        let mut length = 0i64;
        if let Some(value) = r.response_header("Content-Length").filter(|value| !value.is_empty()) {
            match value.parse::<i64>() {
                Ok(parsed) => length = parsed,
                Err(err) => {
                    convert_err = Some(
                        Error::new(codes::CONVERT_ERROR, format!("convert string `{}` to int error", value))
                            .cause(err),
                    );
                }
            }
        }

        let mut err_msg = String::new();
        if length > 0 && is_json_content_type(r.response_header("Content-Type").as_deref()) {
            let mut buffered = Vec::new();
            if let Some(response) = r.http_response_mut() {
                let _ = response.body.read_to_end(&mut buffered);
                if let Ok(message) = serde_json::from_slice::<ErrMsg>(&buffered) {
                    err_msg = message.error.unwrap_or_default();
                }
                response.body = Box::new(Cursor::new(buffered));
            }
        }

        let status_text = status_line(status);
        let message = if err_msg.is_empty() {
            status_text
        } else {
            format!("{}: {}", status_text, err_msg)
        };
        let request_id = r.request_id().unwrap_or_default().to_owned();
        let mut error = Error::new(map_status_code(status), message).request_failure(status, request_id);
        if let Some(convert_err) = convert_err {
            error = error.cause(convert_err);
        }
        r.set_error(error);
    })
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.map_or(false, |value| {
        value == APPLICATION_JSON.as_ref() || value.starts_with("application/json;")
    })
}

/// 状态码到错误码的翻译表
fn map_status_code(status: u16) -> &'static str {
    match status {
        298 => codes::PART_ERROR,
        400 => codes::PARAMS_ERROR,
        401 => codes::AUTHORIZATION_ERROR,
        403 => codes::ACCESS_DENIED_ERROR,
        404 => codes::NOT_FOUND_ERROR,
        405 => codes::UNEXPECTED_REQUEST_ERROR,
        406 => codes::CRC32_VERIFICATION_ERROR,
        419 => codes::ACCOUNT_FROZEN_ERROR,
        478 => codes::MIRROR_SOURCE_ERROR,
        503 => codes::SERVICE_UNAVAILABLE_ERROR,
        504 => codes::SERVICE_TIMEOUT_ERROR,
        573 => codes::REQUEST_RATE_ERROR,
        579 => codes::UPLOAD_CALLBACK_ERROR,
        599 => codes::SERVICE_OPERATION_ERROR,
        608 => codes::CONTENT_CHANGED_ERROR,
        612 => codes::RESOURCE_NOT_EXIST_ERROR,
        614 => codes::RESOURCE_EXIST_ERROR,
        _ => codes::UNKNOWN_ERROR,
    }
}

/// 提取响应的元信息，记录服务端返回的请求 ID
pub fn unmarshal_meta_handler() -> NamedHandler {
    NamedHandler::new(UNMARSHAL_META_HANDLER_NAME, |r| {
        if let Some(request_id) = r.response_header("X-Reqid") {
            r.set_request_id(request_id);
        }
    })
}

/// 反序列化 JSON 响应体到请求的数据槽位
///
/// 期望有输出却收到空响应体时按未知错误处理
pub fn unmarshal_handler() -> NamedHandler {
    NamedHandler::new(UNMARSHAL_HANDLER_NAME, |r| {
        if !is_json_content_type(r.response_header("Content-Type").as_deref()) {
            return;
        }
        let mut buffered = Vec::new();
        if let Some(response) = r.http_response_mut() {
            let _ = response.body.read_to_end(&mut buffered);
        }
        if buffered.is_empty() {
            let status = r.response_status();
            r.set_error(Error::new(codes::UNKNOWN_ERROR, status_line(status)));
            return;
        }
        match serde_json::from_slice(&buffered) {
            Ok(value) => r.set_data(value),
            Err(err) => r.set_error(
                Error::new(
                    codes::DESERIALIZATION_ERROR,
                    "failed to decode data with content-type: application/json",
                )
                .cause(err),
            ),
        }
    })
}

/// 执行重试判定和退避
///
/// 还没有处理函数对重试做出判断，或者配置要求总是询问重试器时，
/// 由重试器决定是否重试。
/// 休眠可以被取消令牌中止，中止后按请求取消处理。
/// 决定重试后清除请求的错误并增加重试计数
pub fn after_retry_handler() -> NamedHandler {
    NamedHandler::new(AFTER_RETRY_HANDLER_NAME, |r| {
        if r.retryable().is_none() || r.config().enforce_should_retry_check() {
            let retryer = r.retryer();
            let should_retry = retryer.should_retry(r);
            r.set_retryable(Some(should_retry));
        }

        if r.will_retry() {
            let retryer = r.retryer();
            let delay = retryer.retry_rules(r);
            r.set_retry_delay(delay);

            if !r.cancel().sleep(delay) {
                r.set_error(Error::new(codes::REQUEST_CANCELED, "request context canceled"));
                r.set_retryable(Some(false));
                return;
            }

            r.increment_retry_count();
            r.clear_error();
        }
    })
}

/// 请求收尾，读尽并释放响应体
///
/// 响应体以内存缓冲还回，收尾之后内容仍然可以读取
pub fn complete_handler() -> NamedHandler {
    NamedHandler::new(COMPLETE_HANDLER_NAME, |r| {
        if let Some(response) = r.http_response_mut() {
            let mut rest = Vec::new();
            let _ = response.body.read_to_end(&mut rest);
            response.body = Box::new(Cursor::new(rest));
        }
    })
}

/// 把 `name/version (extra0; extra1)` 格式的字符串追加到请求的 User-Agent 中
pub fn make_add_to_user_agent_handler(
    handler_name: &'static str,
    name: &str,
    version: &str,
    extra: &[&str],
) -> NamedHandler {
    let mut user_agent = format!("{}/{}", name, version);
    if !extra.is_empty() {
        user_agent.push_str(&format!(" ({})", extra.join("; ")));
    }
    NamedHandler::new(handler_name, move |r| r.add_to_user_agent(&user_agent))
}

/// 把 SDK 的名字、版本和运行平台追加到 User-Agent 中
pub fn sdk_version_user_agent_handler() -> NamedHandler {
    make_add_to_user_agent_handler(
        SDK_VERSION_USER_AGENT_HANDLER_NAME,
        SDK_NAME,
        SDK_VERSION,
        &[env::consts::OS, env::consts::ARCH],
    )
}

/// 把环境变量 `QINIU_EXECUTION_ENV` 描述的运行环境追加到 User-Agent 中
pub fn add_host_exec_env_user_agent_handler() -> NamedHandler {
    NamedHandler::new(ADD_HOST_EXEC_ENV_USER_AGENT_HANDLER_NAME, |r| {
        if let Ok(value) = env::var(EXEC_ENV_VAR) {
            if !value.is_empty() {
                r.add_to_user_agent(&format!("{}/{}", EXEC_ENV_UA_KEY, value));
            }
        }
    })
}

/// 校验请求的输入参数
///
/// 参数带有校验能力且校验失败时，错误记入请求
pub fn validate_parameters_handler() -> NamedHandler {
    NamedHandler::new(VALIDATE_PARAMETERS_HANDLER_NAME, |r| {
        if !r.params().is_filled() {
            return;
        }
        if let Some(validator) = r.params_validator() {
            if let Err(err) = validator(r.params()) {
                r.set_error(err);
            }
        }
    })
}

fn retrieve_credential(r: &mut Request) -> Option<Credential> {
    let credentials = r.config().credentials().cloned();
    match credentials {
        None => {
            r.set_error(Error::new(
                codes::NO_CREDENTIAL_PROVIDERS,
                "no credentials configured for signed request",
            ));
            None
        }
        Some(credentials) => match credentials.get() {
            Ok(credential) => Some(credential),
            Err(err) => {
                r.set_error(
                    Error::new(codes::CREDENTIALS_RETRIEVE_ERROR, "failed to retrieve credential value").cause(err),
                );
                None
            }
        },
    }
}

fn request_content_type(r: &Request) -> Option<String> {
    r.http_request()
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// 以 QBox 签名算法给请求加上 Authorization 头
pub fn qbox_token_request_handler() -> NamedHandler {
    NamedHandler::new(QBOX_TOKEN_REQUEST_HANDLER_NAME, |r| {
        let credential = match retrieve_credential(r) {
            Some(credential) => credential,
            None => return,
        };
        let content_type = request_content_type(r);
        let body = if content_type.as_deref() == Some(APPLICATION_WWW_FORM_URLENCODED.as_ref()) {
            match r.collect_body_for_signing() {
                Ok(body) => body,
                Err(err) => {
                    r.set_error(Error::new(codes::SIGN_REQUEST_ERROR, "sign request error").cause(err));
                    return;
                }
            }
        } else {
            Vec::new()
        };
        let url = r.http_request().url.clone();
        let authorization = credential.authorization_v1_for_request(&url, content_type.as_deref(), &body);
        if let Ok(value) = http::HeaderValue::from_str(&authorization) {
            r.http_request_mut().headers.insert(AUTHORIZATION, value);
        }
    })
}

/// 以 Qiniu 签名算法给请求加上 Authorization 头
pub fn qiniu_token_request_handler() -> NamedHandler {
    NamedHandler::new(QINIU_TOKEN_REQUEST_HANDLER_NAME, |r| {
        let credential = match retrieve_credential(r) {
            Some(credential) => credential,
            None => return,
        };
        let content_type = request_content_type(r);
        let signs_body = matches!(
            content_type.as_deref(),
            Some(ct) if ct == APPLICATION_WWW_FORM_URLENCODED.as_ref() || ct == APPLICATION_JSON.as_ref()
        );
        let body = if signs_body {
            match r.collect_body_for_signing() {
                Ok(body) => body,
                Err(err) => {
                    r.set_error(Error::new(codes::SIGN_REQUEST_ERROR, "sign request error").cause(err));
                    return;
                }
            }
        } else {
            Vec::new()
        };
        let method = r.http_request().method.clone();
        let url = r.http_request().url.clone();
        let host = r.http_request().host.clone();
        let authorization =
            credential.authorization_v2_for_request(&method, &url, &host, content_type.as_deref(), &body);
        if let Ok(value) = http::HeaderValue::from_str(&authorization) {
            r.http_request_mut().headers.insert(AUTHORIZATION, value);
        }
    })
}

/// 输出请求日志，在发送之前执行
pub fn log_http_request_handler() -> NamedHandler {
    NamedHandler::new("qiniusdk.client.LogRequest", |r| {
        log::debug!(
            "Request {}/{}: {} {} headers: {:?}",
            r.api().service_name,
            r.api().api_name,
            r.http_request().method,
            r.http_request().url,
            r.http_request().headers,
        );
    })
}

/// 输出响应日志，在发送之后执行
pub fn log_http_response_handler() -> NamedHandler {
    NamedHandler::new("qiniusdk.client.LogResponse", |r| {
        match r.http_response() {
            Some(response) => log::debug!(
                "Response {}/{}: status {} headers: {:?}",
                r.api().service_name,
                r.api().api_name,
                response.status_code,
                response.headers,
            ),
            None => log::debug!(
                "Response {}/{}: request's HTTPResponse is nil",
                r.api().service_name,
                r.api().api_name,
            ),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::{Api, ReaderSeekerCloser};
    use super::*;
    use std::io::Cursor as IoCursor;

    fn request_with_body(body: Vec<u8>) -> Request {
        let mut request = Request::new_for_test(Api {
            host: "up.qiniup.com".into(),
            path: "/".into(),
            ..Default::default()
        });
        request.set_buffer_body(body);
        request
    }

    #[test]
    fn test_content_length_set_from_body() {
        let mut request = request_with_body(b"hello world".to_vec());
        build_content_length_handler().call(&mut request);
        assert!(request.error().is_none());
        assert_eq!(
            request.http_request().headers.get(CONTENT_LENGTH).unwrap(),
            &http::HeaderValue::from(11u64)
        );
    }

    #[test]
    fn test_content_length_stripped_when_empty() {
        let mut request = request_with_body(Vec::new());
        request
            .http_request_mut()
            .headers
            .insert(CONTENT_LENGTH, http::HeaderValue::from(0u64));
        build_content_length_handler().call(&mut request);
        assert!(request.error().is_none());
        assert!(request.http_request().headers.get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_content_length_unknown_without_header_fails() {
        let mut request = request_with_body(Vec::new());
        request.set_reader_body(ReaderSeekerCloser::from_reader(IoCursor::new(b"data".to_vec())));
        build_content_length_handler().call(&mut request);
        assert_eq!(request.error().unwrap().code(), codes::SERIALIZATION_ERROR);
    }

    #[test]
    fn test_body_handler_encodes_form_params() {
        let mut request = Request::new_for_test(Api {
            host: "up.qiniup.com".into(),
            path: "/".into(),
            content_type: APPLICATION_WWW_FORM_URLENCODED.to_string(),
            ..Default::default()
        });
        request.set_params(Params::Form(vec![
            ("name".to_owned(), "test".to_owned()),
            ("language".to_owned(), "rust".to_owned()),
        ]));
        body_handler().call(&mut request);
        assert!(request.error().is_none());

        build_content_length_handler().call(&mut request);
        let length: i64 = request
            .http_request()
            .headers
            .get(CONTENT_LENGTH)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        let body = request.collect_body_for_signing().unwrap();
        assert_eq!(body, b"name=test&language=rust");
        assert_eq!(length, body.len() as i64);
    }

    #[test]
    fn test_body_handler_rejects_mismatched_params() {
        let mut request = Request::new_for_test(Api {
            host: "up.qiniup.com".into(),
            path: "/".into(),
            ..Default::default()
        });
        request.set_params(Params::Form(vec![("a".to_owned(), "b".to_owned())]));
        body_handler().call(&mut request);
        assert_eq!(request.error().unwrap().code(), codes::SERIALIZATION_ERROR);
    }

    #[test]
    fn test_user_agent_assembly() {
        let _guard = crate::test_env::lock();
        let mut request = request_with_body(Vec::new());
        sdk_version_user_agent_handler().call(&mut request);
        env::set_var(EXEC_ENV_VAR, "lambda");
        add_host_exec_env_user_agent_handler().call(&mut request);
        env::remove_var(EXEC_ENV_VAR);

        let user_agent = request
            .http_request()
            .headers
            .get(http::header::USER_AGENT)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        assert!(user_agent.starts_with(&format!("{}/{}", SDK_NAME, SDK_VERSION)));
        assert!(user_agent.ends_with("exec-env/lambda"));
    }

    #[test]
    fn test_validate_parameters_handler() {
        use std::sync::Arc;

        let mut request = Request::new_for_test(Api {
            host: "up.qiniup.com".into(),
            path: "/".into(),
            ..Default::default()
        });
        request.set_params(Params::Form(vec![("key".to_owned(), String::new())]));
        request.set_params_validator(Arc::new(|params| match params {
            Params::Form(pairs) if pairs.iter().any(|(_, value)| value.is_empty()) => Err(Error::new(
                codes::STRUCT_FIELD_ERROR,
                "Key field is empty",
            )),
            _ => Ok(()),
        }));

        validate_parameters_handler().call(&mut request);
        assert_eq!(request.error().unwrap().code(), codes::STRUCT_FIELD_ERROR);
    }

    #[test]
    fn test_map_status_code_table() {
        let table: &[(u16, &str)] = &[
            (298, codes::PART_ERROR),
            (400, codes::PARAMS_ERROR),
            (401, codes::AUTHORIZATION_ERROR),
            (403, codes::ACCESS_DENIED_ERROR),
            (404, codes::NOT_FOUND_ERROR),
            (405, codes::UNEXPECTED_REQUEST_ERROR),
            (406, codes::CRC32_VERIFICATION_ERROR),
            (419, codes::ACCOUNT_FROZEN_ERROR),
            (478, codes::MIRROR_SOURCE_ERROR),
            (503, codes::SERVICE_UNAVAILABLE_ERROR),
            (504, codes::SERVICE_TIMEOUT_ERROR),
            (573, codes::REQUEST_RATE_ERROR),
            (579, codes::UPLOAD_CALLBACK_ERROR),
            (599, codes::SERVICE_OPERATION_ERROR),
            (608, codes::CONTENT_CHANGED_ERROR),
            (612, codes::RESOURCE_NOT_EXIST_ERROR),
            (614, codes::RESOURCE_EXIST_ERROR),
            (500, codes::UNKNOWN_ERROR),
        ];
        for (status, code) in table {
            assert_eq!(map_status_code(*status), *code);
        }
    }
}
