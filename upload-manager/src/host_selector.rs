use qiniu_http_client::Error;
use std::{
    collections::VecDeque,
    fmt::Debug,
    sync::Mutex,
    time::Instant,
};

/// 每个域名保留的最近错误数量
const MAX_ERRORS_PER_HOST: usize = 10;

/// 上传域名的选择策略
///
/// 选择器在一次上传的所有重试之间共享，
/// 域名组发生变化时需要重新创建选择器
pub trait HostsSelector: Debug + Send + Sync {
    /// 从一组域名中选择一个域名
    fn select(&self) -> String;

    /// 报告域名的使用错误，供选择策略参考
    fn update(&self, host: &str, error: &Error) {
        let _ = (host, error);
    }
}

/// 固定选择器，总是选择列表中的第一个域名
///
/// 域名列表为空时返回空字符串
#[derive(Debug, Clone)]
pub struct FixedSelector {
    hosts: Vec<String>,
}

impl FixedSelector {
    /// 以域名列表创建固定选择器
    pub fn new(hosts: impl Into<Vec<String>>) -> Self {
        Self { hosts: hosts.into() }
    }
}

impl HostsSelector for FixedSelector {
    fn select(&self) -> String {
        self.hosts.first().cloned().unwrap_or_default()
    }
}

/// 轮转选择器，依次选择列表中的每个域名
///
/// 列表被看成一个环，选完一轮后从头开始。
/// 选择器是线程安全的，可以被多个线程同时调用
#[derive(Debug)]
pub struct RoundRobinSelector {
    hosts: Vec<String>,
    last_index: Mutex<Option<usize>>,
}

impl RoundRobinSelector {
    /// 以域名列表创建轮转选择器
    pub fn new(hosts: impl Into<Vec<String>>) -> Self {
        Self {
            hosts: hosts.into(),
            last_index: Mutex::new(None),
        }
    }
}

impl HostsSelector for RoundRobinSelector {
    fn select(&self) -> String {
        if self.hosts.is_empty() {
            return String::new();
        }
        let mut last_index = self.last_index.lock().unwrap();
        let next = match *last_index {
            Some(index) => (index + 1) % self.hosts.len(),
            None => 0,
        };
        *last_index = Some(next);
        self.hosts[next].clone()
    }
}

#[derive(Debug)]
struct HostErrors {
    host: String,
    // 按发生时间从早到晚排列
    errors: Mutex<VecDeque<Instant>>,
}

impl HostErrors {
    fn frequency(&self) -> f64 {
        let errors = self.errors.lock().unwrap();
        match (errors.front(), errors.back()) {
            (Some(first), Some(last)) => errors.len() as f64 / last.duration_since(*first).as_secs_f64(),
            _ => 0.0,
        }
    }

    fn record(&self) {
        let mut errors = self.errors.lock().unwrap();
        errors.push_back(Instant::now());
        while errors.len() > MAX_ERRORS_PER_HOST {
            errors.pop_front();
        }
    }
}

/// 错误频率选择器，选择单位时间内发生错误最少的域名
///
/// 每个域名保留最近十次错误的时间戳，
/// 频率按 错误数 / (最晚 - 最早) 秒计算，没有错误时为零。
/// 频率相同时按列表顺序选择靠前的域名
#[derive(Debug)]
pub struct ErrorFrequencySelector {
    hosts: Vec<HostErrors>,
}

impl ErrorFrequencySelector {
    /// 以域名列表创建错误频率选择器
    pub fn new(hosts: impl Into<Vec<String>>) -> Self {
        Self {
            hosts: hosts
                .into()
                .into_iter()
                .map(|host| HostErrors {
                    host,
                    errors: Mutex::new(VecDeque::new()),
                })
                .collect(),
        }
    }
}

impl HostsSelector for ErrorFrequencySelector {
    fn select(&self) -> String {
        let mut min_frequency = f64::MAX;
        let mut selected = None;
        for host in self.hosts.iter() {
            let frequency = host.frequency();
            if frequency < min_frequency {
                min_frequency = frequency;
                selected = Some(host);
            }
        }
        selected.map(|host| host.host.clone()).unwrap_or_default()
    }

    fn update(&self, host: &str, _error: &Error) {
        if let Some(entry) = self.hosts.iter().find(|entry| entry.host == host) {
            entry.record();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qiniu_http_client::codes;
    use std::{collections::HashSet, sync::Arc, thread};

    fn hosts() -> Vec<String> {
        vec![
            "up.qiniup.com".to_owned(),
            "up-nb.qiniup.com".to_owned(),
            "up-xs.qiniup.com".to_owned(),
        ]
    }

    #[test]
    fn test_fixed_selector() {
        let selector = FixedSelector::new(hosts());
        assert_eq!(selector.select(), "up.qiniup.com");
        assert_eq!(selector.select(), "up.qiniup.com");
        assert_eq!(FixedSelector::new(Vec::new()).select(), "");
    }

    #[test]
    fn test_round_robin_selector_wraps() {
        let selector = RoundRobinSelector::new(hosts());
        assert_eq!(selector.select(), "up.qiniup.com");
        assert_eq!(selector.select(), "up-nb.qiniup.com");
        assert_eq!(selector.select(), "up-xs.qiniup.com");
        assert_eq!(selector.select(), "up.qiniup.com");
    }

    #[test]
    fn test_round_robin_selector_is_thread_safe() {
        let selector = Arc::new(RoundRobinSelector::new(hosts()));
        let handles = (0..3)
            .map(|_| {
                let selector = selector.clone();
                thread::spawn(move || (0..100).map(|_| selector.select()).collect::<Vec<_>>())
            })
            .collect::<Vec<_>>();
        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        let distinct: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(distinct.len(), 3);
        assert_eq!(all.len(), 300);
    }

    #[test]
    fn test_error_frequency_selector_prefers_quiet_host() {
        let selector = ErrorFrequencySelector::new(hosts());
        // 没有错误时按列表顺序选择
        assert_eq!(selector.select(), "up.qiniup.com");

        let err = Error::new(codes::REQUEST_ERROR, "send request failed");
        selector.update("up.qiniup.com", &err);
        selector.update("up.qiniup.com", &err);
        assert_eq!(selector.select(), "up-nb.qiniup.com");

        selector.update("up-nb.qiniup.com", &err);
        selector.update("up-nb.qiniup.com", &err);
        assert_eq!(selector.select(), "up-xs.qiniup.com");

        // 错误之间相隔越久，频率越低
        selector.update("up-xs.qiniup.com", &err);
        thread::sleep(std::time::Duration::from_millis(50));
        selector.update("up-xs.qiniup.com", &err);
        assert_eq!(selector.select(), "up-xs.qiniup.com");
    }

    #[test]
    fn test_error_frequency_selector_keeps_last_ten() {
        let selector = ErrorFrequencySelector::new(vec!["up.qiniup.com".to_owned()]);
        let err = Error::new(codes::REQUEST_ERROR, "send request failed");
        for _ in 0..25 {
            selector.update("up.qiniup.com", &err);
        }
        let errors = selector.hosts[0].errors.lock().unwrap();
        assert_eq!(errors.len(), MAX_ERRORS_PER_HOST);
    }
}
