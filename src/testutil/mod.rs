use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::gateway::{ChatGateway, ChatReply, GatewayError};

/// テスト用の共通モックゲートウェイ
/// - 送信メッセージの記録
/// - 送信カウント
/// - オプションの失敗注入と応答遅延
pub struct MockGateway {
    pub messages: Mutex<Vec<String>>,
    pub send_count: AtomicUsize,
    pub should_fail: AtomicBool,
    pub delay_ms: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            send_count: AtomicUsize::new(0),
            should_fail: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
        }
    }

    /// should_fail フラグを設定する
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// 応答遅延を設定する
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// 送信されたリクエスト数を返す
    pub fn sent_count(&self) -> usize {
        self.send_count.load(Ordering::Relaxed)
    }

    /// 送信されたメッセージを返す
    pub fn sent_messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatGateway for MockGateway {
    fn send_chat<'a>(
        &'a self,
        message: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<ChatReply, GatewayError>> + Send + 'a>,
    > {
        Box::pin(async move {
            self.send_count.fetch_add(1, Ordering::Relaxed);
            self.messages.lock().unwrap().push(message.to_string());

            let delay = self.delay_ms.load(Ordering::Relaxed);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            if self.should_fail.load(Ordering::Relaxed) {
                return Err(GatewayError::Status(500));
            }
            Ok(ChatReply {
                status: 200,
                content: "mock reply".to_string(),
            })
        })
    }
}
