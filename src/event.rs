//! 宿主事件的只读视图
//!
//! 宿主框架分发的事件在进入本组件前被收敛为两种形态：
//! [`GroupMessageEvent`] (入站消息) 与 [`OutgoingResult`] (机器人待发送的结果)。
//! 事件归宿主所有，这里只保留处理一条消息所需的字段快照。

use crate::message::{self, value_to_string};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 发送者信息
///
/// 显示名优先取群名片 (card)，为空时回退到昵称。
#[derive(Debug, Clone, Default)]
pub struct Sender {
    pub user_id: String,
    pub nickname: String,
    pub card: String,
}

impl Sender {
    pub fn new(user_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            nickname: nickname.into(),
            card: String::new(),
        }
    }

    pub fn with_card(mut self, card: impl Into<String>) -> Self {
        self.card = card.into();
        self
    }

    /// 获取显示名称 (优先名片，其次昵称，最后 ID)
    pub fn display_name(&self) -> &str {
        if !self.card.is_empty() {
            &self.card
        } else if !self.nickname.is_empty() {
            &self.nickname
        } else {
            &self.user_id
        }
    }
}

/// 入站消息事件快照
///
/// `handled` 标志在同一事件的多次分发间共享 (Clone 共享同一标志位)，
/// 宿主据此跳过默认处理，组件据此保证不重复撤回/转发。
#[derive(Debug, Clone)]
pub struct GroupMessageEvent {
    pub platform: String,
    /// 群号；私聊等非群场景为 None
    pub group_id: Option<String>,
    /// 平台消息 ID，撤回时使用；缺失视为畸形事件
    pub message_id: Option<String>,
    pub sender: Sender,
    /// 原始消息段，转发时原样使用
    pub segments: Vec<Value>,
    handled: Arc<AtomicBool>,
}

impl GroupMessageEvent {
    pub fn new(
        platform: impl Into<String>,
        group_id: Option<String>,
        message_id: Option<String>,
        sender: Sender,
        segments: Vec<Value>,
    ) -> Self {
        Self {
            platform: platform.into(),
            group_id,
            message_id,
            sender,
            segments,
            handled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 从 OneBot v11 原始事件 JSON 构造
    ///
    /// 仅接受 `post_type = "message"` 的事件。数字/字符串形式的 ID 均可，
    /// `message` 段数组缺失时回退到 `raw_message` 纯文本。
    pub fn from_onebot(event: &Value) -> Option<Self> {
        if event.get("post_type").and_then(Value::as_str) != Some("message") {
            return None;
        }

        let group_id = if event.get("message_type").and_then(Value::as_str) == Some("group") {
            event.get("group_id").map(value_to_string)
        } else {
            None
        };
        let message_id = event.get("message_id").map(value_to_string);

        let sender_obj = event.get("sender");
        let sender = Sender {
            user_id: event
                .get("user_id")
                .map(value_to_string)
                .unwrap_or_default(),
            nickname: sender_obj
                .and_then(|s| s.get("nickname"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            card: sender_obj
                .and_then(|s| s.get("card"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        };

        let segments = match event.get("message").and_then(Value::as_array) {
            Some(arr) => arr.clone(),
            None => event
                .get("raw_message")
                .and_then(Value::as_str)
                .map(|raw| vec![message::text_segment(raw)])
                .unwrap_or_default(),
        };

        Some(Self::new("onebot", group_id, message_id, sender, segments))
    }

    /// 是否为群消息
    pub fn is_group(&self) -> bool {
        self.group_id.is_some()
    }

    /// 纯文本投影
    pub fn plain_text(&self) -> String {
        message::plain_text(&self.segments)
    }

    /// 事件是否已被处理 (默认处理已被抑制)
    pub fn is_handled(&self) -> bool {
        self.handled.load(Ordering::SeqCst)
    }

    /// 标记事件已处理，抑制宿主的默认后续处理
    pub fn stop_default_handling(&self) {
        self.handled.store(true, Ordering::SeqCst);
    }
}

/// 机器人即将发送的结果 (发送前的最后一道关口)
#[derive(Debug, Clone, Default)]
pub struct OutgoingResult {
    /// 机器人自身 ID，折叠时作为转发节点的虚拟发送者
    pub self_id: String,
    pub group_id: Option<String>,
    pub segments: Vec<Value>,
}

impl OutgoingResult {
    pub fn new(
        self_id: impl Into<String>,
        group_id: Option<String>,
        segments: Vec<Value>,
    ) -> Self {
        Self {
            self_id: self_id.into(),
            group_id,
            segments,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn plain_text(&self) -> String {
        message::plain_text(&self.segments)
    }

    /// 清空结果内容，阻止宿主原样投递
    pub fn clear(&mut self) {
        self.segments.clear();
    }
}
