//! 未授权信号
//! 进程级广播，会话失效时通知应用外壳（跳转登录、提示用户等）

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

/// 会话失效事件（无负载）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnauthorizedEvent;

/// 未授权通知器
///
/// 订阅与请求生命周期无关；没有订阅者时 fire 同样成功。
#[derive(Debug)]
pub struct UnauthorizedNotifier {
    sender: broadcast::Sender<UnauthorizedEvent>,
    fired: AtomicU64,
}

impl Default for UnauthorizedNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl UnauthorizedNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            fired: AtomicU64::new(0),
        }
    }

    /// 广播一次未授权信号，返回收到信号的订阅者数量
    pub fn fire(&self) -> usize {
        self.fired.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("api_unauthorized_total").increment(1);

        let receivers = self.sender.send(UnauthorizedEvent).unwrap_or(0);
        tracing::warn!(receivers, "Session unauthorized, signal broadcast");
        receivers
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UnauthorizedEvent> {
        self.sender.subscribe()
    }

    /// 累计广播次数
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_without_listeners() {
        let notifier = UnauthorizedNotifier::default();
        assert_eq!(notifier.fire(), 0);
        assert_eq!(notifier.fired_count(), 1);
    }

    #[tokio::test]
    async fn test_every_listener_receives_signal() {
        let notifier = UnauthorizedNotifier::default();
        let mut shell = notifier.subscribe();
        let mut analytics = notifier.subscribe();

        assert_eq!(notifier.fire(), 2);

        assert_eq!(shell.recv().await.unwrap(), UnauthorizedEvent);
        assert_eq!(analytics.recv().await.unwrap(), UnauthorizedEvent);
        assert!(shell.try_recv().is_err());
    }
}
