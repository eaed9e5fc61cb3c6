//! 拦截器集成测试：以可编程的 Mock 传输层验证端到端行为

use msgfold::interceptor::WITHDRAWN_MARKER;
use msgfold::message::text_segment;
use msgfold::prelude::*;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Delete(String),
    Forward {
        group_id: String,
        nodes: Vec<ForwardNode>,
    },
    Plain {
        group_id: String,
        text: String,
    },
}

#[derive(Default)]
struct MockTransport {
    calls: Mutex<Vec<Call>>,
    fail_delete: bool,
    fail_forward: bool,
    fail_plain: bool,
}

impl MockTransport {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn delete_attempts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Delete(_)))
            .count()
    }
}

#[async_trait]
impl GroupTransport for MockTransport {
    fn platform(&self) -> &str {
        "onebot"
    }

    async fn delete_message(&self, message_id: &str) -> FoldResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Delete(message_id.to_string()));
        if self.fail_delete {
            return Err("消息已不存在".into());
        }
        Ok(())
    }

    async fn send_forward(&self, group_id: &str, nodes: Vec<ForwardNode>) -> FoldResult<()> {
        self.calls.lock().unwrap().push(Call::Forward {
            group_id: group_id.to_string(),
            nodes,
        });
        if self.fail_forward {
            return Err("风控拦截".into());
        }
        Ok(())
    }

    async fn send_plain(&self, group_id: &str, text: &str) -> FoldResult<()> {
        self.calls.lock().unwrap().push(Call::Plain {
            group_id: group_id.to_string(),
            text: text.to_string(),
        });
        if self.fail_plain {
            return Err("发送失败".into());
        }
        Ok(())
    }
}

fn make_config(tweak: impl FnOnce(&mut FoldConfig)) -> FoldConfig {
    let mut cfg = FoldConfig::default();
    cfg.retry_delay_ms = 0;
    tweak(&mut cfg);
    cfg
}

fn long_event(group_id: &str) -> GroupMessageEvent {
    GroupMessageEvent::new(
        "onebot",
        Some(group_id.to_string()),
        Some("42".to_string()),
        Sender::new("10001", "小明").with_card("群名片"),
        vec![text_segment("啊".repeat(200))],
    )
}

fn short_event(group_id: &str) -> GroupMessageEvent {
    GroupMessageEvent::new(
        "onebot",
        Some(group_id.to_string()),
        Some("42".to_string()),
        Sender::new("10001", "小明"),
        vec![text_segment("短消息")],
    )
}

// ================= 入站折叠 =================

#[tokio::test]
async fn short_message_is_untouched() {
    let fold = LongMessageFold::new(make_config(|_| {}));
    let transport = MockTransport::default();
    let event = short_event("111");

    fold.on_group_message(&transport, &event).await;

    assert!(transport.calls().is_empty());
    assert!(!event.is_handled());
}

#[tokio::test]
async fn long_message_is_deleted_and_forwarded() {
    let fold = LongMessageFold::new(make_config(|_| {}));
    let transport = MockTransport::default();
    let event = long_event("111");

    fold.on_group_message(&transport, &event).await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], Call::Delete("42".to_string()));
    match &calls[1] {
        Call::Forward { group_id, nodes } => {
            assert_eq!(group_id, "111");
            assert_eq!(nodes.len(), 1);
            assert_eq!(nodes[0].user_id, "10001");
            // 显示名优先群名片
            assert_eq!(nodes[0].nickname, "群名片");
            // 消息段原样转发
            assert_eq!(nodes[0].content, event.segments);
        }
        other => panic!("期望合并转发，实际为 {:?}", other),
    }
    assert!(event.is_handled());
}

#[tokio::test]
async fn whitelist_is_enforced() {
    let fold = LongMessageFold::new(make_config(|cfg| {
        cfg.group_whitelist = [111, 222].into_iter().collect();
    }));
    let transport = MockTransport::default();

    fold.on_group_message(&transport, &long_event("333")).await;
    assert!(transport.calls().is_empty());

    fold.on_group_message(&transport, &long_event("111")).await;
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn handler_does_not_refire_on_handled_event() {
    let fold = LongMessageFold::new(make_config(|_| {}));
    let transport = MockTransport::default();
    let event = long_event("111");

    fold.on_group_message(&transport, &event).await;
    let count = transport.calls().len();
    fold.on_group_message(&transport, &event).await;

    assert_eq!(transport.calls().len(), count);
}

#[tokio::test]
async fn malformed_event_has_no_side_effects() {
    let fold = LongMessageFold::new(make_config(|_| {}));
    let transport = MockTransport::default();
    let mut event = long_event("111");
    event.message_id = None;

    fold.on_group_message(&transport, &event).await;

    assert!(transport.calls().is_empty());
    assert!(!event.is_handled());
}

#[tokio::test]
async fn other_platform_event_is_ignored() {
    let fold = LongMessageFold::new(make_config(|_| {}));
    let transport = MockTransport::default();
    let mut event = long_event("111");
    event.platform = "satori".to_string();

    fold.on_group_message(&transport, &event).await;

    assert!(transport.calls().is_empty());
}

// ================= 撤回重试 =================

#[tokio::test(start_paused = true)]
async fn delete_retries_with_delay_then_forwards() {
    let fold = LongMessageFold::new(make_config(|cfg| {
        cfg.retry_count = 2;
        cfg.retry_delay_ms = 500;
    }));
    let transport = MockTransport {
        fail_delete: true,
        ..Default::default()
    };
    let event = long_event("111");

    let start = tokio::time::Instant::now();
    fold.on_group_message(&transport, &event).await;

    // retry_count = 2 即总共 3 次尝试，间隔两次挂起
    assert_eq!(transport.delete_attempts(), 3);
    assert_eq!(start.elapsed(), std::time::Duration::from_millis(1000));

    // 撤回全部失败仍然转发 (默认 continue_forward 策略)
    assert!(matches!(
        transport.calls().last(),
        Some(Call::Forward { .. })
    ));
    assert!(event.is_handled());
}

#[tokio::test]
async fn cancel_policy_skips_forward_after_failed_delete() {
    let fold = LongMessageFold::new(make_config(|cfg| {
        cfg.on_revoke_failure = RevokeFailurePolicy::CancelForward;
    }));
    let transport = MockTransport {
        fail_delete: true,
        ..Default::default()
    };
    let event = long_event("111");

    fold.on_group_message(&transport, &event).await;

    assert_eq!(transport.delete_attempts(), 3);
    assert!(
        !transport
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Forward { .. }))
    );
    assert!(event.is_handled());
}

// ================= 降级通知 =================

#[tokio::test]
async fn fallback_notice_after_forward_failure() {
    let fold = LongMessageFold::new(make_config(|cfg| {
        cfg.fallback_preview_length = 5;
    }));
    let transport = MockTransport {
        fail_forward: true,
        ..Default::default()
    };
    let event = long_event("111");

    fold.on_group_message(&transport, &event).await;

    let calls = transport.calls();
    match calls.last() {
        Some(Call::Plain { group_id, text }) => {
            assert_eq!(group_id, "111");
            assert!(text.contains("群名片"));
            assert!(text.contains(WITHDRAWN_MARKER));
            // 预览恰好 5 字符 + 省略号
            assert!(text.ends_with("啊啊啊啊啊…"));
            assert!(!text.ends_with("啊啊啊啊啊啊…"));
        }
        other => panic!("期望降级通知，实际为 {:?}", other),
    }
}

#[tokio::test]
async fn short_preview_has_no_ellipsis() {
    let fold = LongMessageFold::new(make_config(|cfg| {
        // 预览长度超过原文 (200 字) 时不截断
        cfg.fallback_preview_length = 1000;
    }));
    let transport = MockTransport {
        fail_forward: true,
        ..Default::default()
    };

    fold.on_group_message(&transport, &long_event("111")).await;

    match transport.calls().last() {
        Some(Call::Plain { text, .. }) => assert!(!text.contains('…')),
        other => panic!("期望降级通知，实际为 {:?}", other),
    }
}

#[tokio::test]
async fn fallback_disabled_sends_nothing() {
    let fold = LongMessageFold::new(make_config(|cfg| {
        cfg.enable_fallback = false;
    }));
    let transport = MockTransport {
        fail_forward: true,
        ..Default::default()
    };

    fold.on_group_message(&transport, &long_event("111")).await;

    assert!(
        !transport
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Plain { .. }))
    );
}

#[tokio::test]
async fn fallback_requires_successful_delete() {
    // 撤回失败时原消息仍在聊天记录里，没有内容丢失风险，不发降级通知
    let fold = LongMessageFold::new(make_config(|_| {}));
    let transport = MockTransport {
        fail_delete: true,
        fail_forward: true,
        ..Default::default()
    };

    fold.on_group_message(&transport, &long_event("111")).await;

    assert!(
        !transport
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Plain { .. }))
    );
}

#[tokio::test]
async fn fallback_failure_does_not_panic() {
    let fold = LongMessageFold::new(make_config(|_| {}));
    let transport = MockTransport {
        fail_forward: true,
        fail_plain: true,
        ..Default::default()
    };

    fold.on_group_message(&transport, &long_event("111")).await;
}

// ================= 出站折叠 =================

#[tokio::test]
async fn long_outgoing_result_is_folded_and_cleared() {
    let fold = LongMessageFold::new(make_config(|_| {}));
    let transport = MockTransport::default();
    let mut result = OutgoingResult::new(
        "20001",
        Some("111".to_string()),
        vec![text_segment("啊".repeat(200))],
    );

    fold.on_outgoing_result(&transport, &mut result).await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        Call::Forward { group_id, nodes } => {
            assert_eq!(group_id, "111");
            assert_eq!(nodes.len(), 1);
            // 归属为机器人自身，显示名为空
            assert_eq!(nodes[0].user_id, "20001");
            assert_eq!(nodes[0].nickname, "");
        }
        other => panic!("期望合并转发，实际为 {:?}", other),
    }
    // 原结果被清空，宿主不会再原样投递
    assert!(result.is_empty());
}

#[tokio::test]
async fn short_outgoing_result_is_untouched() {
    let fold = LongMessageFold::new(make_config(|_| {}));
    let transport = MockTransport::default();
    let mut result = OutgoingResult::new("20001", Some("111".to_string()), vec![text_segment("ok")]);

    fold.on_outgoing_result(&transport, &mut result).await;

    assert!(transport.calls().is_empty());
    assert!(!result.is_empty());
}

#[tokio::test]
async fn outgoing_fold_failure_keeps_content() {
    let fold = LongMessageFold::new(make_config(|_| {}));
    let transport = MockTransport {
        fail_forward: true,
        ..Default::default()
    };
    let mut result = OutgoingResult::new(
        "20001",
        Some("111".to_string()),
        vec![text_segment("啊".repeat(200))],
    );

    fold.on_outgoing_result(&transport, &mut result).await;

    // 折叠失败宁可刷屏也不丢内容
    assert!(!result.is_empty());
}

#[tokio::test]
async fn outgoing_fold_respects_switch() {
    let fold = LongMessageFold::new(make_config(|cfg| {
        cfg.fold_self_message = false;
    }));
    let transport = MockTransport::default();
    let mut result = OutgoingResult::new(
        "20001",
        Some("111".to_string()),
        vec![text_segment("啊".repeat(200))],
    );

    fold.on_outgoing_result(&transport, &mut result).await;

    assert!(transport.calls().is_empty());
}
