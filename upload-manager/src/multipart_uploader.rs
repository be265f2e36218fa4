use super::{
    error::{err_upload, UploadError},
    host_selector::HostsSelector,
    progress::LogProgressRecorder,
    resume_recorder::{last_modification, resume_file_path, ResumeRecord},
    upload_input::{normalize_host, UploadInput, ERR_NO_UP_HOSTS},
    UploadManager, DEFAULT_STORE_NUMBER, DEFAULT_UPLOAD_PART_SIZE, SERVICE_NAME,
};
use chrono::{DateTime, Utc};
use http::{header::AUTHORIZATION, HeaderValue, Method};
use qiniu_http_client::{
    codes, Api, CancelToken, Error, LogLevel, Params, ProgressRecorder, ReaderSeekerCloser, Request,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::HashMap,
    io::{Read, Result as IoResult, Seek, SeekFrom},
    path::PathBuf,
    sync::{Arc, Mutex},
    thread,
};

/// 已经上传完成的分片
///
/// 序号从 1 开始，清单在提交之前按序号排序。
/// 分片大小只在内存中维护，不写入断点续传记录
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompletedPart {
    /// 分片的序号，从 1 开始
    #[serde(rename = "partNumber")]
    pub part_number: usize,

    /// 服务端返回的分片摘要
    pub etag: String,

    /// 分片的大小
    #[serde(skip)]
    pub size: u64,
}

#[derive(Clone, Debug, Deserialize)]
struct InitPartsOutput {
    #[serde(default, rename = "uploadId")]
    upload_id: String,

    #[serde(default, rename = "expireAt")]
    expire_at: i64,
}

#[derive(Clone, Debug, Deserialize)]
struct UploadPartOutput {
    #[serde(default)]
    etag: String,

    #[serde(default)]
    #[allow(dead_code)]
    md5: String,
}

#[derive(Debug, Serialize)]
struct CompleteParts {
    parts: Vec<CompletedPart>,

    #[serde(rename = "mimeType", skip_serializing_if = "String::is_empty")]
    mime_type: String,

    #[serde(skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, String>,

    #[serde(rename = "customVars", skip_serializing_if = "HashMap::is_empty")]
    custom_vars: HashMap<String, String>,
}

/// 在多个分片任务间共享一块只读数据的请求体
#[derive(Clone, Debug)]
struct PartBody {
    data: Arc<Vec<u8>>,
    pos: u64,
}

impl Read for PartBody {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let start = (self.pos as usize).min(self.data.len());
        let remaining = &self.data[start..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for PartBody {
    fn seek(&mut self, pos: SeekFrom) -> IoResult<u64> {
        let len = self.data.len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if target < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid seek to a negative position",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// 单个上传内复用分片缓冲区的字节池
///
/// 只回收整块大小的缓冲区，较短的末尾分片不进入池子
#[derive(Debug)]
struct BytePool {
    size: usize,
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl BytePool {
    fn new(size: usize) -> Self {
        Self {
            size,
            buffers: Mutex::new(Vec::new()),
        }
    }

    fn get(&self) -> Vec<u8> {
        self.buffers
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| vec![0u8; self.size])
    }

    fn put(&self, buf: Vec<u8>) {
        if buf.len() == self.size {
            self.buffers.lock().unwrap().push(buf);
        }
    }
}

struct Part {
    index: usize,
    data: Arc<Vec<u8>>,
}

/// 一次分片上传内被互斥锁保护的共享状态
///
/// 分片的切分、清单、第一个错误都在同一把锁下变更
#[derive(Debug)]
struct UploadState {
    data: ReaderSeekerCloser,
    read_pos: i64,
    last_index: usize,
    eof: bool,
    parts: Vec<CompletedPart>,
    error: Option<Error>,
}

/// 分片上传器
///
/// 以有界的并发上传分片，
/// 第一个失败的分片会取消所有在途分片并等待它们退出
pub(crate) struct MultipartUploader<'a> {
    manager: &'a UploadManager,
    bucket: String,
    key: String,
    base64_key: String,
    up_token: String,
    filename: String,
    mime_type: String,
    metadata: HashMap<String, String>,
    custom_vars: HashMap<String, String>,
    check_md5: bool,
    use_https: bool,
    selector: Arc<dyn HostsSelector>,
    concurrency: usize,
    part_size: u64,
    store_number: usize,
    resume_enabled: bool,
    progress_enabled: bool,
    recorder: Arc<dyn ProgressRecorder>,
    total_size: i64,
    cancel: CancelToken,
    upload_id: String,
    expire_at: i64,
    last_modification: Option<DateTime<Utc>>,
    resume_path: Option<PathBuf>,
    state: Mutex<UploadState>,
    pool: BytePool,
}

impl<'a> MultipartUploader<'a> {
    pub(crate) fn new(
        manager: &'a UploadManager,
        input: &mut UploadInput,
        total_size: i64,
        cancel: CancelToken,
    ) -> Result<Self, UploadError> {
        let config = manager.client().config();
        let part_size = config.upload_part_size().unwrap_or(DEFAULT_UPLOAD_PART_SIZE);
        let store_number = config.store_number().filter(|number| *number > 0).unwrap_or(DEFAULT_STORE_NUMBER);
        let recorder = config
            .progress_recorder()
            .unwrap_or_else(|| Arc::new(LogProgressRecorder));
        let progress_enabled = !config.disable_progress();
        let resume_enabled = !config.disable_resume() && !input.filename.is_empty();

        let selector = input
            .selector
            .clone()
            .ok_or_else(|| Error::new(ERR_NO_UP_HOSTS, "no upload host found"))?;
        let data = input
            .take_data()
            .ok_or_else(|| Error::new(codes::STRUCT_FIELD_ERROR, "data source is not ready"))?;

        let resume_path = if input.filename.is_empty() {
            None
        } else {
            Some(resume_file_path(&input.filename))
        };
        let recorded_modification = if resume_enabled {
            last_modification(&input.filename)
        } else {
            None
        };

        let mut uploader = Self {
            manager,
            bucket: input.bucket_name.clone(),
            key: input.key.clone(),
            base64_key: qiniu_utils::base64::urlsafe(input.key.as_bytes()),
            up_token: input.up_token.clone(),
            filename: input.filename.clone(),
            mime_type: input.mime_type.clone(),
            metadata: input.meta_keys.clone(),
            custom_vars: input.custom_params.clone(),
            check_md5: input.check_md5,
            use_https: input.use_https,
            selector,
            concurrency: input.concurrency.max(1),
            part_size,
            store_number,
            resume_enabled,
            progress_enabled,
            recorder,
            total_size,
            cancel,
            upload_id: String::new(),
            expire_at: 0,
            last_modification: recorded_modification,
            resume_path,
            state: Mutex::new(UploadState {
                data,
                read_pos: 0,
                last_index: 0,
                eof: false,
                parts: Vec::new(),
                error: None,
            }),
            pool: BytePool::new(part_size as usize),
        };
        if uploader.resume_enabled {
            uploader.try_resume();
        }
        Ok(uploader)
    }

    /// 执行分片上传
    ///
    /// init 创建上传任务，分片并发上传，complete 提交清单。
    /// 分片失败时保留断点续传记录供下次续传，
    /// 上传成功后删除记录
    pub(crate) fn upload<T: DeserializeOwned>(mut self) -> Result<T, UploadError> {
        if self.upload_id.is_empty() {
            if let Err(err) = self.init() {
                return Err(err_upload(err, &self.upload_id));
            }
            self.store_record();
        }

        self.run_parts();
        let first_error = self.state.lock().unwrap().error.take();
        if let Some(err) = first_error {
            return Err(err_upload(err, &self.upload_id));
        }

        match self.complete() {
            Ok(output) => {
                self.remove_record();
                Ok(output)
            }
            Err(err) => Err(err_upload(err, &self.upload_id)),
        }
    }

    /// 尝试从断点续传记录恢复
    ///
    /// 源文件的修改时间与记录不一致时从头上传。
    /// 数据源定位到已上传分片的总大小处，
    /// 分片序号从记录的分片数继续，uploadId 被复用
    fn try_resume(&mut self) {
        let path = match &self.resume_path {
            Some(path) if path.exists() => path.clone(),
            _ => return,
        };
        let record = match ResumeRecord::recover(&path) {
            Ok(record) => record,
            Err(_) => return,
        };
        if record.upload_id.is_empty()
            || record.parts.is_empty()
            || Some(record.last_modification) != self.last_modification
        {
            return;
        }

        let offset = record.parts.len() as u64 * self.part_size;
        let mut state = self.state.lock().unwrap();
        match state.data.seek(SeekFrom::Start(offset)) {
            Ok(_) => {
                state.read_pos = offset as i64;
                state.last_index = record.parts.len();
                state.parts = record.parts;
                drop(state);
                self.upload_id = record.upload_id;
                log::debug!(
                    "resume multipart upload `{}` from part {}",
                    self.upload_id,
                    self.state.lock().unwrap().last_index + 1,
                );
            }
            Err(_) => {
                // 定位失败，忽略记录从头上传
                let _ = state.data.seek(SeekFrom::Start(0));
            }
        }
    }

    fn run_parts(&self) {
        thread::scope(|scope| {
            for _ in 0..self.concurrency {
                scope.spawn(|| self.worker());
            }
            // scope 是汇合屏障，等待所有在途分片退出
        });
        if self.cancel.is_cancelled() {
            let mut state = self.state.lock().unwrap();
            if state.error.is_none() {
                state.error = Some(Error::new(codes::REQUEST_CANCELED, "request context canceled"));
            }
        }
    }

    fn worker(&self) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let part = {
                let mut state = self.state.lock().unwrap();
                if state.error.is_some() || state.eof {
                    None
                } else {
                    self.next_part(&mut state)
                }
            };
            let part = match part {
                Some(part) => part,
                None => return,
            };

            if self.manager.client().config().log_level().matches(LogLevel::DEBUG_MULTIPART_UPLOAD) {
                log::debug!("Uploading part {} with uploadID: {}", part.index, self.upload_id);
            }

            let failed = match self.upload_part(&part) {
                Ok(output) => {
                    self.finish_part(&part, output.etag);
                    false
                }
                Err(err) => {
                    {
                        let mut state = self.state.lock().unwrap();
                        if state.error.is_none() {
                            state.error = Some(err);
                        }
                    }
                    // 第一个错误取消所有在途分片
                    self.cancel.cancel();
                    true
                }
            };
            self.recycle(part);
            if failed {
                return;
            }
        }
    }

    /// 在锁内从数据源切出下一个分片
    ///
    /// 总大小已知时末尾的分片可以小于分片大小，
    /// 读取失败记入共享错误
    fn next_part(&self, state: &mut UploadState) -> Option<Part> {
        let mut buf = if self.total_size != -1 {
            let left = self.total_size - state.read_pos;
            if left <= 0 {
                state.eof = true;
                return None;
            }
            if (left as u64) < self.part_size {
                vec![0u8; left as usize]
            } else {
                self.pool.get()
            }
        } else {
            self.pool.get()
        };

        match read_full(&mut state.data, &mut buf) {
            Ok(0) => {
                state.eof = true;
                self.pool.put(buf);
                None
            }
            Ok(read) => {
                if read < buf.len() {
                    buf.truncate(read);
                    state.eof = true;
                }
                state.read_pos += read as i64;
                state.last_index += 1;
                Some(Part {
                    index: state.last_index,
                    data: Arc::new(buf),
                })
            }
            Err(err) => {
                state.error = Some(Error::new(codes::READ_ERROR, "failed to read data source").cause(err));
                None
            }
        }
    }

    fn finish_part(&self, part: &Part, etag: String) {
        let mut state = self.state.lock().unwrap();
        state.parts.push(CompletedPart {
            part_number: part.index,
            etag,
            size: part.data.len() as u64,
        });
        if self.progress_enabled {
            self.recorder
                .progress(&self.bucket, &self.filename, &self.key, self.total_size, state.read_pos);
        }
        if self.resume_enabled && state.parts.len() % self.store_number == 0 {
            self.write_record(self.make_record(&state.parts));
        }
    }

    fn recycle(&self, part: Part) {
        if let Ok(buf) = Arc::try_unwrap(part.data) {
            self.pool.put(buf);
        }
    }

    /// 调用 init 接口创建上传任务
    fn init(&mut self) -> Result<(), Error> {
        let (host, scheme) = self.up_host()?;
        let api = Api {
            scheme,
            method: Some(Method::POST),
            path: format!("/buckets/{}/objects/{}/uploads", self.bucket, self.base64_key),
            host: host.clone(),
            api_name: "part-init".into(),
            service_name: SERVICE_NAME.into(),
            ..Default::default()
        };
        let mut request = self.manager.client().new_request(api, Params::None);
        self.prepare_request(&mut request);
        match request.send() {
            Ok(()) => {
                let output: InitPartsOutput = request.parse_data()?;
                if output.upload_id.is_empty() {
                    return Err(Error::new(
                        codes::DESERIALIZATION_ERROR,
                        "missing uploadId in init response",
                    ));
                }
                self.upload_id = output.upload_id;
                self.expire_at = output.expire_at;
                log::debug!(
                    "initialized multipart upload `{}`, expire at {}",
                    self.upload_id,
                    self.expire_at,
                );
                Ok(())
            }
            Err(err) => {
                self.selector.update(&host, &err);
                Err(err)
            }
        }
    }

    /// 调用 uploadPart 接口上传一个分片
    fn upload_part(&self, part: &Part) -> Result<UploadPartOutput, Error> {
        let (host, scheme) = self.up_host()?;
        let api = Api {
            scheme,
            method: Some(Method::PUT),
            path: format!(
                "/buckets/{}/objects/{}/uploads/{}/{}",
                self.bucket, self.base64_key, self.upload_id, part.index
            ),
            host: host.clone(),
            content_type: mime::APPLICATION_OCTET_STREAM.to_string(),
            api_name: "part-upload".into(),
            service_name: SERVICE_NAME.into(),
            ..Default::default()
        };
        let body = PartBody {
            data: part.data.clone(),
            pos: 0,
        };
        let mut request = self
            .manager
            .client()
            .new_request(api, Params::Stream(ReaderSeekerCloser::from_seekable(body)));
        self.prepare_request(&mut request);
        if self.check_md5 {
            let digest = md5::compute(part.data.as_slice());
            if let Ok(value) = HeaderValue::from_str(&format!("{:x}", digest)) {
                request
                    .http_request_mut()
                    .headers
                    .insert(http::header::HeaderName::from_static("content-md5"), value);
            }
        }
        match request.send() {
            Ok(()) => request.parse_data(),
            Err(err) => {
                self.selector.update(&host, &err);
                Err(err)
            }
        }
    }

    /// 调用 complete 接口按分片序号提交清单
    fn complete<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let mut parts = std::mem::take(&mut self.state.lock().unwrap().parts);
        parts.sort_by_key(|part| part.part_number);

        let body = CompleteParts {
            parts,
            mime_type: self.mime_type.clone(),
            metadata: self.metadata.clone(),
            custom_vars: self.custom_vars.clone(),
        };
        let value = serde_json::to_value(&body)
            .map_err(|err| Error::new(codes::SERIALIZATION_ERROR, "failed to encode complete parts").cause(err))?;

        let (host, scheme) = self.up_host()?;
        let api = Api {
            scheme,
            method: Some(Method::POST),
            path: format!(
                "/buckets/{}/objects/{}/uploads/{}",
                self.bucket, self.base64_key, self.upload_id
            ),
            host: host.clone(),
            api_name: "part-complete".into(),
            service_name: SERVICE_NAME.into(),
            ..Default::default()
        };
        let mut request = self.manager.client().new_request(api, Params::Json(value));
        self.prepare_request(&mut request);
        match request.send() {
            Ok(()) => request.parse_data(),
            Err(err) => {
                self.selector.update(&host, &err);
                Err(err)
            }
        }
    }

    fn prepare_request(&self, request: &mut Request) {
        request.set_cancel_token(self.cancel.clone());
        if let Ok(value) = HeaderValue::from_str(&format!("UpToken {}", self.up_token)) {
            request.http_request_mut().headers.insert(AUTHORIZATION, value);
        }
    }

    fn up_host(&self) -> Result<(String, String), Error> {
        let selected = self.selector.select();
        if selected.is_empty() {
            return Err(Error::new(ERR_NO_UP_HOSTS, "no upload host found"));
        }
        let (host, _) = normalize_host(&selected)?;
        let scheme = if self.use_https { "https" } else { "http" };
        Ok((host, scheme.to_owned()))
    }

    fn make_record(&self, parts: &[CompletedPart]) -> ResumeRecord {
        ResumeRecord {
            upload_id: self.upload_id.clone(),
            parts: parts.to_vec(),
            last_modification: self.last_modification.unwrap_or_default(),
        }
    }

    fn store_record(&self) {
        if self.resume_enabled {
            let state = self.state.lock().unwrap();
            self.write_record(self.make_record(&state.parts));
        }
    }

    fn write_record(&self, record: ResumeRecord) {
        if let Some(path) = &self.resume_path {
            if let Err(err) = record.store(path) {
                log::warn!("failed to store resume record `{}`: {}", path.display(), err);
            }
        }
    }

    fn remove_record(&self) {
        if self.resume_enabled {
            if let Some(path) = &self.resume_path {
                let _ = ResumeRecord::remove(path);
            }
        }
    }
}

/// 反复读取直到填满缓冲区或者数据源结束
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> IoResult<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(read) => total += read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}
