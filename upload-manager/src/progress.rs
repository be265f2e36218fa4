use qiniu_http_client::ProgressRecorder;

/// 默认的上传进度实现，通过日志输出进度信息
///
/// 数据并非来自文件或者总大小未知时保持沉默
#[derive(Copy, Clone, Debug, Default)]
pub struct LogProgressRecorder;

impl ProgressRecorder for LogProgressRecorder {
    fn progress(&self, bucket: &str, filename: &str, key: &str, total_size: i64, uploaded_size: i64) {
        if filename.is_empty() || total_size == -1 {
            return;
        }
        log::info!(
            "Uploading file `{}` => `{}:{}` [{:.2}%|{}/{}]",
            filename,
            bucket,
            key,
            uploaded_size as f64 / total_size as f64 * 100.0,
            humanize_size(uploaded_size),
            humanize_size(total_size),
        );
    }
}

/// 把字节数转成带单位的可读字符串
fn humanize_size(size: i64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}{}", size, UNITS[unit])
    } else {
        format!("{:.2}{}", value, UNITS[unit])
    }
}
