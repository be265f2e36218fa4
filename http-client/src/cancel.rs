use std::{
    sync::{
        atomic::{AtomicBool, Ordering::SeqCst},
        Arc, Condvar, Mutex,
    },
    time::{Duration, Instant},
};

/// 取消令牌
///
/// 一个请求携带一个取消令牌，默认的令牌永不取消。
/// 触发取消后，重试休眠会立即中止，
/// 上传循环停止发出新的分片并等待在途任务退出。
/// 令牌可以被克隆并在多个任务间共享，取消对所有持有者可见
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelTokenInner>,
}

#[derive(Debug, Default)]
struct CancelTokenInner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl CancelToken {
    /// 创建永不取消的令牌
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// 触发取消，唤醒所有休眠中的持有者
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, SeqCst);
        let _guard = self.inner.lock.lock().unwrap();
        self.inner.condvar.notify_all();
    }

    /// 是否已经被取消
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(SeqCst)
    }

    /// 可取消的休眠
    ///
    /// 休眠满指定时长返回 `true`，期间被取消则立即返回 `false`
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut guard = self.inner.lock.lock().unwrap();
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (next_guard, _) = self.inner.condvar.wait_timeout(guard, deadline - now).unwrap();
            guard = next_guard;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sleep_until_deadline() {
        let token = CancelToken::new();
        let started = Instant::now();
        assert!(token.sleep(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_aborts_sleep() {
        let token = CancelToken::new();
        let handle = {
            let token = token.clone();
            thread::spawn(move || token.sleep(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(10));
        token.cancel();
        assert!(!handle.join().unwrap());
        assert!(token.is_cancelled());
    }
}
