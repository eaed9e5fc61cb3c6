//! OneBot v11 动作封装
//!
//! 构造 `delete_msg` / `send_group_forward_msg` / `send_group_msg` 动作报文，
//! 并通过宿主提供的帧写端下发。报文发出即视为提交 (fire-and-forget)，
//! 写端错误向上传递，由拦截器决定重试或降级。

use crate::FoldResult;
use crate::message::{ForwardNode, text_segment};
use crate::transport::GroupTransport;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};

/// 本绑定对应的平台标识
pub const PLATFORM: &str = "onebot";

static ECHO_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_echo() -> String {
    let count = ECHO_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("msgfold-{}", count)
}

/// OneBot 动作报文
#[derive(Debug, Clone, Serialize)]
pub struct ActionPacket {
    pub action: &'static str,
    pub params: Value,
    pub echo: String,
}

impl ActionPacket {
    fn new(action: &'static str, params: Value) -> Self {
        Self {
            action,
            params,
            echo: next_echo(),
        }
    }

    pub fn to_json(&self) -> FoldResult<String> {
        serde_json::to_string(self).map_err(Into::into)
    }
}

/// ID 归一化：能解析为整数则以数字下发 (delete_msg 等动作要求数字 ID)，
/// 否则原样透传字符串
fn id_value(id: &str) -> Value {
    id.trim()
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id))
}

/// 撤回消息
pub fn delete_msg(message_id: &str) -> ActionPacket {
    ActionPacket::new("delete_msg", json!({ "message_id": id_value(message_id) }))
}

/// 发送群合并转发 (自定义节点)
pub fn send_group_forward_msg(group_id: &str, nodes: &[ForwardNode]) -> ActionPacket {
    let messages: Vec<Value> = nodes.iter().map(ForwardNode::to_value).collect();
    ActionPacket::new(
        "send_group_forward_msg",
        json!({ "group_id": id_value(group_id), "messages": messages }),
    )
}

/// 发送群纯文本消息
pub fn send_group_msg(group_id: &str, text: &str) -> ActionPacket {
    ActionPacket::new(
        "send_group_msg",
        json!({ "group_id": id_value(group_id), "message": [text_segment(text)] }),
    )
}

/// 帧写出抽象
///
/// 宿主持有与 OneBot 实现 (NapCat 等) 的连接，这里只需要写出一帧文本的能力。
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send_frame(&self, frame: String) -> FoldResult<()>;
}

/// 基于 [`FrameSink`] 的 OneBot 传输实现
pub struct OneBotTransport<S> {
    sink: S,
}

impl<S: FrameSink> OneBotTransport<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    async fn dispatch(&self, packet: ActionPacket) -> FoldResult<()> {
        self.sink.send_frame(packet.to_json()?).await
    }
}

#[async_trait]
impl<S: FrameSink> GroupTransport for OneBotTransport<S> {
    fn platform(&self) -> &str {
        PLATFORM
    }

    async fn delete_message(&self, message_id: &str) -> FoldResult<()> {
        self.dispatch(delete_msg(message_id)).await
    }

    async fn send_forward(&self, group_id: &str, nodes: Vec<ForwardNode>) -> FoldResult<()> {
        self.dispatch(send_group_forward_msg(group_id, &nodes)).await
    }

    async fn send_plain(&self, group_id: &str, text: &str) -> FoldResult<()> {
        self.dispatch(send_group_msg(group_id, text)).await
    }
}
