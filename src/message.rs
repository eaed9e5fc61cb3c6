//! OneBot v11 消息段工具
//!
//! 消息以段数组表示，每段形如 `{"type": "...", "data": {...}}`。
//! 本组件不重建消息模型：段原样保留为 `serde_json::Value`，
//! 转发时逐字节还原宿主收到的内容。

use serde_json::{Value, json};

/// 构造纯文本段
pub fn text_segment(text: impl Into<String>) -> Value {
    json!({ "type": "text", "data": { "text": text.into() } })
}

/// 提取段数组的纯文本投影
///
/// 文本段取原文，媒体段转为占位符，其余段忽略。
/// 该投影仅用于长度判定与预览，不参与转发。
pub fn plain_text(segments: &[Value]) -> String {
    let mut result = String::new();
    for seg in segments {
        let seg_type = seg.get("type").and_then(Value::as_str).unwrap_or("");
        let data = seg.get("data");
        match seg_type {
            "text" => {
                if let Some(t) = data.and_then(|d| d.get("text")).and_then(Value::as_str) {
                    result.push_str(t);
                }
            }
            "at" => {
                let qq = data
                    .and_then(|d| d.get("qq"))
                    .map(value_to_string)
                    .unwrap_or_default();
                result.push('@');
                if qq == "all" {
                    result.push_str("全体成员");
                } else {
                    result.push_str(&qq);
                }
            }
            "image" => result.push_str("[图片]"),
            "record" => result.push_str("[语音]"),
            "video" => result.push_str("[视频]"),
            "face" => result.push_str("[表情]"),
            "file" => {
                let name = data
                    .and_then(|d| d.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("[文件]");
                result.push_str(name);
            }
            "forward" | "node" => result.push_str("[合并转发]"),
            // reply 引用、json 卡片等不计入文本长度
            _ => {}
        }
    }
    result
}

/// 按字符数截断文本，返回 (截断结果, 是否发生截断)
///
/// 长度判定基于字符而非字节，避免多字节文本在边界处被截出非法 UTF-8。
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// 合并转发中的自定义消息节点 (伪造发送者)
///
/// 对应 OneBot 的 `node` 段：虚拟发送者 ID、昵称与一条完整消息内容。
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardNode {
    pub user_id: String,
    pub nickname: String,
    pub content: Vec<Value>,
}

impl ForwardNode {
    pub fn new(
        user_id: impl Into<String>,
        nickname: impl Into<String>,
        content: Vec<Value>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            nickname: nickname.into(),
            content,
        }
    }

    /// 转换为 OneBot node 段
    pub fn to_value(&self) -> Value {
        json!({
            "type": "node",
            "data": {
                "user_id": self.user_id,
                "nickname": self.nickname,
                "content": self.content,
            }
        })
    }
}

/// 将 JSON 标量转为字符串 (OneBot 字段数字/字符串混用的兼容处理)
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
