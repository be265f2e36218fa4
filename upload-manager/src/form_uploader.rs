use super::{
    error::UploadError,
    upload_input::UploadInput,
    UploadManager, SERVICE_NAME,
};
use http::Method;
use qiniu_http_client::{codes, Api, CancelToken, Error, Params};
use rand::{distributions::Alphanumeric, Rng};
use serde::de::DeserializeOwned;
use std::io::Read;

/// 使用表单上传的方式上传数据
///
/// 表单体一次性装配进内存，
/// 开启 CRC32 校验时对文件内容计算 IEEE CRC32 并附加校验字段
pub(crate) fn upload_form<T: DeserializeOwned>(
    manager: &UploadManager,
    input: &mut UploadInput,
    cancel: CancelToken,
) -> Result<T, UploadError> {
    let (mut request, host) = form_upload_request(manager, input)?;
    request.set_cancel_token(cancel);
    match request.send() {
        Ok(()) => request.parse_data().map_err(UploadError::from),
        Err(err) => {
            if let Some(selector) = &input.selector {
                selector.update(&host, &err);
            }
            Err(UploadError::Request(err))
        }
    }
}

fn form_upload_request(
    manager: &UploadManager,
    input: &mut UploadInput,
) -> Result<(qiniu_http_client::Request, String), UploadError> {
    let mut data = input
        .take_data()
        .ok_or_else(|| Error::new(codes::STRUCT_FIELD_ERROR, "data source is not ready"))?;
    let mut file_content = Vec::new();
    data.read_to_end(&mut file_content)
        .map_err(|err| Error::new(codes::READ_ERROR, "failed to read upload data").cause(err))?;

    let crc32 = input.with_crc32.then(|| crc32fast::hash(&file_content));

    let boundary: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    let mut body = MultipartFormWriter::new(&boundary);

    for (name, value) in input.custom_params.iter() {
        body.write_field(&custom_name(name), value);
    }
    for (name, value) in input.meta_keys.iter() {
        body.write_field(&meta_name(name), value);
    }
    body.write_field("key", &input.key);
    body.write_field("token", &input.up_token);
    body.write_field("accept", &input.accept_content_type);

    let filename = if input.orig_filename.is_empty() {
        random_file_name(10)
    } else {
        input.orig_filename.clone()
    };
    body.write_file_field("file", &filename, &input.mime_type, &file_content);
    if let Some(crc32) = crc32 {
        body.write_field("crc32", &format!("{:010}", crc32));
    }
    let content_type = body.content_type();
    let body = body.finish();

    let (host, scheme) = input.up_host()?;
    let api = Api {
        scheme,
        method: Some(Method::POST),
        path: "/".into(),
        host: host.clone(),
        content_type,
        api_name: "form-upload".into(),
        service_name: SERVICE_NAME.into(),
        ..Default::default()
    };
    Ok((manager.client().new_request(api, Params::Bytes(body)), host))
}

/// multipart/form-data 表单体的装配器
///
/// 值为空的文本字段不写入表单
struct MultipartFormWriter {
    boundary: String,
    buffer: Vec<u8>,
}

impl MultipartFormWriter {
    fn new(boundary: &str) -> Self {
        Self {
            boundary: boundary.to_owned(),
            buffer: Vec::with_capacity(1024),
        }
    }

    fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn write_field(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buffer.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", escape_quotes(name)).as_bytes(),
        );
        self.buffer.extend_from_slice(value.as_bytes());
        self.buffer.extend_from_slice(b"\r\n");
    }

    fn write_file_field(&mut self, name: &str, filename: &str, content_type: &str, content: &[u8]) {
        let content_type = if content_type.is_empty() {
            mime::APPLICATION_OCTET_STREAM.as_ref()
        } else {
            content_type
        };
        self.buffer.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buffer.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                escape_quotes(name),
                escape_quotes(filename),
            )
            .as_bytes(),
        );
        self.buffer
            .extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        self.buffer.extend_from_slice(content);
        self.buffer.extend_from_slice(b"\r\n");
    }

    fn finish(mut self) -> Vec<u8> {
        self.buffer.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.buffer
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// 生成指定长度的随机纯小写字母文件名
fn random_file_name(length: usize) -> String {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}

/// 自定义参数名，没有 `x:` 前缀时补上
fn custom_name(name: &str) -> String {
    if name.starts_with("x:") {
        name.to_owned()
    } else {
        format!("x:{}", name)
    }
}

/// 自定义元数据名，没有 `x-qn-meta-` 前缀时补上
fn meta_name(name: &str) -> String {
    if name.starts_with("x-qn-meta-") {
        name.to_owned()
    } else {
        format!("x-qn-meta-{}", name)
    }
}
