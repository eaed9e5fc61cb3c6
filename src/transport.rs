//! 传输层契约
//!
//! 组件只依赖一组最小的群聊传输能力，不感知具体协议。
//! 平台适配 (OneBot、控制台等) 在组件之外完成绑定。

use crate::FoldResult;
use crate::message::ForwardNode;
use async_trait::async_trait;

/// 群聊传输能力集：撤回、合并转发、普通消息
///
/// 三个操作均为挂起调用，失败以错误返回而非 panic；
/// 调用方负责重试与降级，实现方不做静默吞错。
#[async_trait]
pub trait GroupTransport: Send + Sync {
    /// 平台标识 (如 "onebot")，用于与事件来源核对
    fn platform(&self) -> &str;

    /// 撤回一条已发送的消息
    async fn delete_message(&self, message_id: &str) -> FoldResult<()>;

    /// 向群发送合并转发 (一个或多个自定义节点)
    async fn send_forward(&self, group_id: &str, nodes: Vec<ForwardNode>) -> FoldResult<()>;

    /// 向群发送纯文本消息
    async fn send_plain(&self, group_id: &str, text: &str) -> FoldResult<()>;
}
