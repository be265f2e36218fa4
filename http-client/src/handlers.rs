use super::Request;
use std::{
    borrow::Cow,
    fmt::{self, Debug},
    sync::Arc,
};

/// 处理函数的统一签名
pub type HandlerFn = Arc<dyn Fn(&mut Request) + Send + Sync>;

/// 匿名处理函数的名字
pub const ANONYMOUS_HANDLER_NAME: &str = "__anonymous";

/// 带名字的处理函数
///
/// 名字是弱键，允许重名；
/// 按名字删除和替换会作用于所有同名项
#[derive(Clone)]
pub struct NamedHandler {
    name: Cow<'static, str>,
    func: HandlerFn,
}

impl NamedHandler {
    /// 创建带名字的处理函数
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        func: impl Fn(&mut Request) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// 获取处理函数的名字
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub(crate) fn call(&self, request: &mut Request) {
        (self.func)(request)
    }
}

impl Debug for NamedHandler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NamedHandler").field("name", &self.name).finish()
    }
}

/// 处理函数列表运行到的列表项
pub struct HandlerListRunItem<'a> {
    /// 当前处理函数在列表中的序号
    pub index: usize,

    /// 当前处理函数的名字
    pub handler_name: &'a str,

    /// 正在处理的请求
    pub request: &'a Request,
}

/// 每个处理函数执行后调用的断言，
/// 返回 `false` 停止处理剩下的处理函数
pub type AfterEachFn = fn(&HandlerListRunItem<'_>) -> bool;

/// 请求出错则停止处理后续的处理函数
pub fn stop_on_error(item: &HandlerListRunItem<'_>) -> bool {
    item.request.error().is_none()
}

/// 输出处理函数的执行日志，并总是继续处理
pub fn log_item(item: &HandlerListRunItem<'_>) -> bool {
    log::debug!(
        "request handler {} {} error: {:?}",
        item.index,
        item.handler_name,
        item.request.error(),
    );
    true
}

/// 有序的处理函数列表
///
/// 列表保证确定的执行顺序，
/// 可选的 after-each 断言在每个处理函数之后执行，
/// 返回 `false` 时中断列表
#[derive(Clone, Default)]
pub struct HandlerList {
    list: Vec<NamedHandler>,
    after_each: Option<AfterEachFn>,
}

impl HandlerList {
    /// 返回列表的长度
    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// 列表是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// 清空列表
    pub fn clear(&mut self) {
        self.list.clear();
    }

    /// 设置 after-each 断言
    pub fn set_after_each(&mut self, after_each: AfterEachFn) {
        self.after_each = Some(after_each);
    }

    /// 把匿名处理函数放到列表尾部
    pub fn push_back(&mut self, func: impl Fn(&mut Request) + Send + Sync + 'static) {
        self.push_back_named(NamedHandler::new(ANONYMOUS_HANDLER_NAME, func));
    }

    /// 把处理函数放到列表尾部
    pub fn push_back_named(&mut self, handler: NamedHandler) {
        self.list.push(handler);
    }

    /// 把匿名处理函数放到列表头部
    pub fn push_front(&mut self, func: impl Fn(&mut Request) + Send + Sync + 'static) {
        self.push_front_named(NamedHandler::new(ANONYMOUS_HANDLER_NAME, func));
    }

    /// 把处理函数放到列表头部
    pub fn push_front_named(&mut self, handler: NamedHandler) {
        self.list.insert(0, handler);
    }

    /// 删除列表中所有名字为 name 的处理函数
    pub fn remove_by_name(&mut self, name: &str) {
        self.list.retain(|handler| handler.name() != name);
    }

    /// 用 handler 替换列表中所有同名的处理函数
    ///
    /// 发生了替换返回 `true`，否则返回 `false`
    pub fn swap_named(&mut self, handler: &NamedHandler) -> bool {
        let mut swapped = false;
        for item in self.list.iter_mut() {
            if item.name() == handler.name() {
                *item = handler.clone();
                swapped = true;
            }
        }
        swapped
    }

    /// 用 replace 替换列表中所有名字为 name 的处理函数
    pub fn swap(&mut self, name: &str, replace: &NamedHandler) -> bool {
        let mut swapped = false;
        for item in self.list.iter_mut() {
            if item.name() == name {
                *item = replace.clone();
                swapped = true;
            }
        }
        swapped
    }

    /// 存在同名处理函数则原地替换，否则追加到尾部
    pub fn set_back_named(&mut self, handler: NamedHandler) {
        if !self.swap_named(&handler) {
            self.push_back_named(handler);
        }
    }

    /// 存在同名处理函数则原地替换，否则插入到头部
    pub fn set_front_named(&mut self, handler: NamedHandler) {
        if !self.swap_named(&handler) {
            self.push_front_named(handler);
        }
    }

    /// 按顺序执行列表中的处理函数
    ///
    /// after-each 断言返回 `false` 时停止
    pub fn run(&self, request: &mut Request) {
        for (index, handler) in self.list.iter().enumerate() {
            handler.call(request);
            if let Some(after_each) = self.after_each {
                let item = HandlerListRunItem {
                    index,
                    handler_name: handler.name(),
                    request,
                };
                if !after_each(&item) {
                    return;
                }
            }
        }
    }
}

impl Debug for HandlerList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.list.iter().map(NamedHandler::name)).finish()
    }
}

/// 请求管道的十三个阶段的处理函数列表
#[derive(Clone, Debug, Default)]
pub struct Handlers {
    /// 参数校验阶段
    pub validate: HandlerList,
    /// 请求构建阶段
    pub build: HandlerList,
    /// 请求签名阶段
    pub sign: HandlerList,
    /// 请求发送阶段
    pub send: HandlerList,
    /// 响应校验阶段
    pub validate_response: HandlerList,
    /// 响应反序列化阶段
    pub unmarshal: HandlerList,
    /// 响应流反序列化阶段
    pub unmarshal_stream: HandlerList,
    /// 响应元信息提取阶段
    pub unmarshal_meta: HandlerList,
    /// 错误响应反序列化阶段
    pub unmarshal_error: HandlerList,
    /// 重试判定阶段
    pub retry: HandlerList,
    /// 重试执行阶段
    pub after_retry: HandlerList,
    /// 单次尝试收尾阶段
    pub complete_attempt: HandlerList,
    /// 请求收尾阶段
    pub complete: HandlerList,
}

impl Handlers {
    /// 清空所有阶段的处理函数
    pub fn clear(&mut self) {
        self.validate.clear();
        self.build.clear();
        self.sign.clear();
        self.send.clear();
        self.validate_response.clear();
        self.unmarshal.clear();
        self.unmarshal_stream.clear();
        self.unmarshal_meta.clear();
        self.unmarshal_error.clear();
        self.retry.clear();
        self.after_retry.clear();
        self.complete_attempt.clear();
        self.complete.clear();
    }

    /// 所有阶段的处理函数列表是否都为空
    pub fn is_empty(&self) -> bool {
        self.validate.is_empty()
            && self.build.is_empty()
            && self.sign.is_empty()
            && self.send.is_empty()
            && self.validate_response.is_empty()
            && self.unmarshal.is_empty()
            && self.unmarshal_stream.is_empty()
            && self.unmarshal_meta.is_empty()
            && self.unmarshal_error.is_empty()
            && self.retry.is_empty()
            && self.after_retry.is_empty()
            && self.complete_attempt.is_empty()
            && self.complete.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Api, Request};
    use super::*;
    use std::sync::Mutex;

    type RunLog = Arc<Mutex<Vec<&'static str>>>;

    fn recording(log: &RunLog, name: &'static str) -> NamedHandler {
        let log = log.clone();
        NamedHandler::new(name, move |_| log.lock().unwrap().push(name))
    }

    fn new_request() -> Request {
        Request::new_for_test(Api {
            host: "rs.qiniu.com".into(),
            path: "/test".into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_run_order_and_mutation() {
        let mut request = new_request();
        let log: RunLog = Default::default();

        let mut list = HandlerList::default();
        list.push_back_named(recording(&log, "second"));
        list.push_front_named(recording(&log, "first"));
        list.push_back_named(recording(&log, "third"));
        list.run(&mut request);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);

        // 同名项全部被删除
        list.push_back_named(recording(&log, "second"));
        list.remove_by_name("second");
        log.lock().unwrap().clear();
        list.run(&mut request);
        assert_eq!(*log.lock().unwrap(), vec!["first", "third"]);

        // set_back_named 原地替换
        assert_eq!(list.len(), 2);
        list.set_back_named(recording(&log, "third"));
        assert_eq!(list.len(), 2);
        list.set_back_named(recording(&log, "fourth"));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_stop_on_error_halts_iteration() {
        let mut request = new_request();
        let log: RunLog = Default::default();

        let mut list = HandlerList::default();
        list.set_after_each(stop_on_error);
        list.push_back_named(recording(&log, "before"));
        list.push_back(|r| {
            r.set_error(crate::Error::new(crate::codes::UNKNOWN_ERROR, "boom"));
        });
        list.push_back_named(recording(&log, "after"));

        list.run(&mut request);
        assert_eq!(*log.lock().unwrap(), vec!["before"]);
        assert!(request.error().is_some());
    }

    #[test]
    fn test_copy_is_independent() {
        let mut request = new_request();
        let log: RunLog = Default::default();

        let mut original = HandlerList::default();
        original.push_back_named(recording(&log, "kept"));

        let mut copied = original.clone();
        copied.push_back_named(recording(&log, "extra"));
        assert_eq!(original.len(), 1);
        assert_eq!(copied.len(), 2);

        original.run(&mut request);
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    }
}
