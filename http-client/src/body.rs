use std::{
    fmt::{self, Debug},
    fs::File,
    io::{Cursor, Read, Result as IoResult, Seek, SeekFrom},
};

trait ReadSeekSend: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeekSend for T {}

enum Source {
    Seekable(Box<dyn ReadSeekSend>),
    Unseekable(Box<dyn Read + Send>),
}

/// 可读可定位的数据源封装
///
/// 把任意数据源封装成统一的读取、定位、长度探测界面。
/// 底层数据源不可定位时，`seek` 什么也不做并返回 0，
/// 长度未知时 `len` 返回 -1
pub struct ReaderSeekerCloser {
    source: Source,
    known_len: Option<u64>,
}

impl ReaderSeekerCloser {
    /// 封装一段内存数据
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            source: Source::Seekable(Box::new(Cursor::new(data))),
            known_len: Some(len),
        }
    }

    /// 封装一个不可定位的数据源，长度未知
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            source: Source::Unseekable(Box::new(reader)),
            known_len: None,
        }
    }

    /// 封装一个可定位的数据源
    pub fn from_seekable(reader: impl Read + Seek + Send + 'static) -> Self {
        Self {
            source: Source::Seekable(Box::new(reader)),
            known_len: None,
        }
    }

    /// 封装一个文件
    pub fn from_file(file: File) -> Self {
        Self::from_seekable(file)
    }

    /// 底层数据源是否可定位
    pub fn is_seeker(&self) -> bool {
        matches!(self.source, Source::Seekable(_))
    }

    /// 设置下次读取的位置
    ///
    /// 底层数据源不可定位时什么也不做，返回 0
    pub fn seek(&mut self, pos: SeekFrom) -> IoResult<u64> {
        match &mut self.source {
            Source::Seekable(source) => {
                // 定位之后记录的长度不再可信
                self.known_len = None;
                source.seek(pos)
            }
            Source::Unseekable(_) => Ok(0),
        }
    }

    /// 返回数据源剩余未读的数据大小，未知时返回 -1
    ///
    /// 优先使用创建时记录的长度，
    /// 否则对可定位数据源执行 当前位置 / 末尾 / 恢复 三次定位探测
    pub fn len(&mut self) -> IoResult<i64> {
        if let Some(len) = self.known_len {
            return Ok(len as i64);
        }
        match &mut self.source {
            Source::Seekable(source) => {
                let cur = source.seek(SeekFrom::Current(0))?;
                let end = source.seek(SeekFrom::End(0))?;
                source.seek(SeekFrom::Start(cur))?;
                Ok((end - cur) as i64)
            }
            Source::Unseekable(_) => Ok(-1),
        }
    }

    /// 关闭数据源
    ///
    /// 底层数据源随所有权释放关闭，本方法总是成功
    pub fn close(self) -> IoResult<()> {
        Ok(())
    }
}

impl Read for ReaderSeekerCloser {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        if self.known_len.is_some() {
            // 读取之后记录的长度不再可信
            self.known_len = None;
        }
        match &mut self.source {
            Source::Seekable(source) => source.read(buf),
            Source::Unseekable(source) => source.read(buf),
        }
    }
}

impl Default for ReaderSeekerCloser {
    #[inline]
    fn default() -> Self {
        Self::from_bytes(Vec::new())
    }
}

impl Debug for ReaderSeekerCloser {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReaderSeekerCloser")
            .field("seekable", &self.is_seeker())
            .field("known_len", &self.known_len)
            .finish()
    }
}

/// 带起始偏移记录的数据源
///
/// 记录封装时数据源的读取位置，
/// 重试时回绕到记录的位置重放同一段请求体
pub struct OffsetReader {
    source: ReaderSeekerCloser,
    start: u64,
}

impl OffsetReader {
    /// 封装数据源并记录其当前读取位置
    pub fn new(mut source: ReaderSeekerCloser) -> Self {
        let start = source.seek(SeekFrom::Current(0)).unwrap_or_default();
        Self { source, start }
    }

    /// 获取记录的起始偏移
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// 回绕到记录的起始偏移
    pub fn reset(&mut self) -> IoResult<()> {
        if self.source.is_seeker() {
            self.source.seek(SeekFrom::Start(self.start))?;
        }
        Ok(())
    }

    /// 底层数据源是否可定位
    #[inline]
    pub fn is_seeker(&self) -> bool {
        self.source.is_seeker()
    }

    /// 返回自起始偏移起的剩余数据大小，未知时返回 -1
    pub fn len(&mut self) -> IoResult<i64> {
        self.source.len()
    }

    /// 取出底层数据源
    pub fn into_inner(self) -> ReaderSeekerCloser {
        self.source
    }
}

impl Read for OffsetReader {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.source.read(buf)
    }
}

impl Default for OffsetReader {
    #[inline]
    fn default() -> Self {
        Self::new(ReaderSeekerCloser::default())
    }
}

impl Debug for OffsetReader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OffsetReader")
            .field("source", &self.source)
            .field("start", &self.start)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seekable_len_probe() {
        let mut body = ReaderSeekerCloser::from_seekable(Cursor::new(b"hello world".to_vec()));
        assert!(body.is_seeker());
        assert_eq!(body.len().unwrap(), 11);

        let mut buf = [0u8; 6];
        body.read_exact(&mut buf).unwrap();
        assert_eq!(body.len().unwrap(), 5);
    }

    #[test]
    fn test_unseekable_source() {
        let data: &[u8] = b"stream";
        let mut body = ReaderSeekerCloser::from_reader(data);
        assert!(!body.is_seeker());
        assert_eq!(body.seek(SeekFrom::Start(3)).unwrap(), 0);

        let mut content = Vec::new();
        body.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"stream");
        assert_eq!(body.len().unwrap(), -1);
    }

    #[test]
    fn test_offset_reader_resets_to_recorded_offset() {
        let mut source = ReaderSeekerCloser::from_bytes(b"0123456789".to_vec());
        source.seek(SeekFrom::Start(3)).unwrap();

        let mut reader = OffsetReader::new(source);
        assert_eq!(reader.start(), 3);

        let mut first = String::new();
        reader.read_to_string(&mut first).unwrap();
        assert_eq!(first, "3456789");

        reader.reset().unwrap();
        let mut second = String::new();
        reader.read_to_string(&mut second).unwrap();
        assert_eq!(second, first);
    }
}
