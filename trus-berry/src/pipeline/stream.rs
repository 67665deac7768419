//! 位姿流: 推送式数据源, 以 "最新值优先" 的方式投递.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::pose::Pose;

type Callback = Box<dyn FnMut(&Pose) + Send>;

/// 订阅标识, 用于取消订阅.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Inner {
    subscribers: Mutex<Vec<(u64, Arc<Mutex<Callback>>)>>,
    /// 尚未投递的最新位姿.
    pending: Mutex<Option<Pose>>,
    delivering: AtomicBool,
    next_id: AtomicU64,
}

/// 回调 panic 后锁被污染, 其中的数据仍然可用.
#[inline]
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 位姿流. 克隆得到的实例共享同一组订阅者.
///
/// # 注意
///
/// 1. 投递是 "至多一次, 最新值优先" 的: 投递进行中到达的位姿只替换待投递值, 不排队;
/// 2. 同一时刻只有一个线程在投递, 因此回调之间天然串行;
/// 3. 取消订阅后, 已经开始的那一轮投递仍可能调用该回调一次.
#[derive(Clone, Default)]
pub struct PoseStream {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PoseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseStream")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl PoseStream {
    /// 没有订阅者的位姿流.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册回调.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Pose) + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let cb: Callback = Box::new(callback);
        lock(&self.inner.subscribers).push((id, Arc::new(Mutex::new(cb))));
        SubscriptionId(id)
    }

    /// 取消订阅. 订阅不存在时返回 `false`.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = lock(&self.inner.subscribers);
        let before = subs.len();
        subs.retain(|(i, _)| *i != id.0);
        subs.len() != before
    }

    /// 当前订阅者个数.
    #[inline]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    /// 发布位姿.
    ///
    /// 如果其他调用正在投递, 本次只替换待投递值并立即返回; 否则由本次调用负责投递,
    /// 直到没有待投递值为止.
    ///
    /// # 返回值
    ///
    /// 本次调用实际投递的位姿个数.
    pub fn publish(&self, pose: Pose) -> usize {
        let inner = &self.inner;
        *lock(&inner.pending) = Some(pose);
        if inner.delivering.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let mut delivered = 0;
        loop {
            let next = lock(&inner.pending).take();
            let Some(p) = next else {
                inner.delivering.store(false, Ordering::Release);
                // 在 take 与 store 之间到达的位姿需要有人接手.
                let more = lock(&inner.pending).is_some();
                if more && !inner.delivering.swap(true, Ordering::AcqRel) {
                    continue;
                }
                break;
            };
            let subs: Vec<Arc<Mutex<Callback>>> =
                lock(&inner.subscribers).iter().map(|(_, cb)| Arc::clone(cb)).collect();
            for cb in subs {
                (lock(&cb))(&p);
            }
            delivered += 1;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn at(z: f64) -> Pose {
        Pose::from_translation([0.0, 0.0, z])
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let stream = PoseStream::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = stream.subscribe(move |p| sink.lock().unwrap().push(p.translation()[2]));
        assert_eq!(stream.subscriber_count(), 1);

        assert_eq!(stream.publish(at(1.0)), 1);
        assert_eq!(stream.publish(at(2.0)), 1);
        assert!(stream.unsubscribe(id));
        assert!(!stream.unsubscribe(id));
        stream.publish(at(3.0));
        assert_eq!(*seen.lock().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_latest_wins_while_delivering() {
        // 回调内部再发布两次: 只有最后一次会被投递, 且不会递归.
        let stream = PoseStream::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let inner = stream.clone();
        stream.subscribe(move |p| {
            let z = p.translation()[2];
            sink.lock().unwrap().push(z);
            if z == 1.0 {
                assert_eq!(inner.publish(at(2.0)), 0);
                assert_eq!(inner.publish(at(3.0)), 0);
            }
        });
        assert_eq!(stream.publish(at(1.0)), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_cross_thread_publish_is_serialized() {
        let stream = PoseStream::new();
        let (tx, rx) = mpsc::channel();
        let busy = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&busy);
        stream.subscribe(move |p| {
            assert!(!flag.swap(true, Ordering::SeqCst), "callbacks overlap");
            std::thread::sleep(std::time::Duration::from_millis(1));
            flag.store(false, Ordering::SeqCst);
            tx.send(p.translation()[2]).unwrap();
        });

        std::thread::scope(|s| {
            for t in 0..4 {
                let stream = stream.clone();
                s.spawn(move || {
                    for i in 0..10 {
                        stream.publish(at((t * 10 + i) as f64));
                    }
                });
            }
        });
        // 最后一次发布一定被投递, 而中间值可能被合并.
        let got: Vec<f64> = rx.try_iter().collect();
        assert!(!got.is_empty());
        assert!(got.len() <= 40);
    }
}
