//! 长消息拦截器
//!
//! 纯决策函数 ([`decide_incoming`] / [`decide_outgoing`]) 与挂起执行器
//! ([`LongMessageFold`]) 分离：策略可脱离传输层单测，副作用集中在执行器。
//! 执行器的任何传输失败都在内部消化，绝不向宿主的分发循环抛出。

use crate::config::{FoldConfig, RevokeFailurePolicy};
use crate::event::{GroupMessageEvent, OutgoingResult};
use crate::message::{ForwardNode, truncate_chars};
use crate::transport::GroupTransport;
use crate::{info, warn};

const LOG_TARGET: &str = "MsgFold";

/// 降级通知中的撤回标记文本
pub const WITHDRAWN_MARKER: &str = "发送的长消息已撤回";

/// 入站消息的处理决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 折叠：撤回原消息并以合并转发重发
    Fold,
    /// 不处理
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 插件或入站折叠开关关闭
    Disabled,
    /// 事件已处理过 (幂等保护)
    AlreadyHandled,
    /// 非群聊消息
    NotGroup,
    /// 事件来源平台与传输层不匹配
    WrongPlatform,
    /// 群不在非空白名单内
    NotWhitelisted,
    /// 长度未超过阈值 (最常见路径)
    WithinLimit,
    /// 事件缺少消息 ID 等必要字段
    MalformedEvent,
}

/// 入站决策：只读取事件与配置，不产生副作用
pub fn decide_incoming(
    config: &FoldConfig,
    platform: &str,
    event: &GroupMessageEvent,
) -> Decision {
    if !config.enabled || !config.fold_member_message {
        return Decision::Skip(SkipReason::Disabled);
    }
    if event.is_handled() {
        return Decision::Skip(SkipReason::AlreadyHandled);
    }
    let group_id = match event.group_id.as_deref() {
        Some(g) => g,
        None => return Decision::Skip(SkipReason::NotGroup),
    };
    if event.platform != platform {
        return Decision::Skip(SkipReason::WrongPlatform);
    }
    if !config.is_group_allowed(group_id) {
        return Decision::Skip(SkipReason::NotWhitelisted);
    }
    if event.plain_text().chars().count() <= config.max_length {
        return Decision::Skip(SkipReason::WithinLimit);
    }
    if event.message_id.is_none() {
        return Decision::Skip(SkipReason::MalformedEvent);
    }
    Decision::Fold
}

/// 出站决策：是否折叠机器人自身的回复
pub fn decide_outgoing(config: &FoldConfig, result: &OutgoingResult) -> bool {
    config.enabled
        && config.fold_self_message
        && result.group_id.is_some()
        && !result.is_empty()
        && result.plain_text().chars().count() > config.max_length
}

/// 长消息折叠执行器
///
/// 配置在构造时校验完成，处理周期内只读；除此之外没有跨事件状态，
/// 每条消息的处理相互独立，无需加锁。
pub struct LongMessageFold {
    config: FoldConfig,
}

impl LongMessageFold {
    pub fn new(config: FoldConfig) -> Self {
        Self { config }
    }

    /// 从宿主传入的配置块构造 (非法取值自动修复)
    pub fn from_value(value: &toml::Value) -> Self {
        Self::new(FoldConfig::from_value(value))
    }

    pub fn config(&self) -> &FoldConfig {
        &self.config
    }

    /// 入站群消息处理入口
    ///
    /// 撤回失败不阻断转发 (除非策略配置为 cancel_forward)：
    /// 消除刷屏是次要目标，内容送达是首要目标。
    pub async fn on_group_message(
        &self,
        transport: &dyn GroupTransport,
        event: &GroupMessageEvent,
    ) {
        match decide_incoming(&self.config, transport.platform(), event) {
            Decision::Fold => {}
            Decision::Skip(SkipReason::MalformedEvent) => {
                warn!(
                    target: LOG_TARGET,
                    "事件缺少消息 ID，放弃处理 (群 {:?})", event.group_id
                );
                return;
            }
            Decision::Skip(_) => return,
        }

        let Some(group_id) = event.group_id.as_deref() else {
            return;
        };
        let Some(message_id) = event.message_id.as_deref() else {
            return;
        };

        info!(
            target: LOG_TARGET,
            "折叠群 {} 中 {} 的长消息 ({})", group_id, event.sender.display_name(), message_id
        );

        let deleted = self.delete_with_retry(transport, message_id).await;
        if !deleted {
            warn!(
                target: LOG_TARGET,
                "消息 {} 撤回未成功，可能已被手动撤回", message_id
            );
            if self.config.on_revoke_failure == RevokeFailurePolicy::CancelForward {
                event.stop_default_handling();
                return;
            }
        }

        let node = ForwardNode::new(
            event.sender.user_id.clone(),
            event.sender.display_name(),
            event.segments.clone(),
        );
        if let Err(e) = transport.send_forward(group_id, vec![node]).await {
            warn!(target: LOG_TARGET, "合并转发失败: {}", e);
            // 原消息已撤回而转发又失败时，内容面临丢失，降级为纯文本通知
            if self.config.enable_fallback && deleted {
                let notice = self.fallback_notice(event.sender.display_name(), &event.plain_text());
                if let Err(e) = transport.send_plain(group_id, &notice).await {
                    warn!(target: LOG_TARGET, "降级通知发送失败: {}", e);
                }
            }
        }

        event.stop_default_handling();
    }

    /// 出站结果处理：投递前最后一道关口
    ///
    /// 折叠成功后清空原结果，避免宿主重复投递；
    /// 折叠失败则原样保留，宁可刷屏也不吞掉内容。
    pub async fn on_outgoing_result(
        &self,
        transport: &dyn GroupTransport,
        result: &mut OutgoingResult,
    ) {
        if !decide_outgoing(&self.config, result) {
            return;
        }
        let Some(group_id) = result.group_id.clone() else {
            return;
        };

        let node = ForwardNode::new(result.self_id.clone(), "", result.segments.clone());
        match transport.send_forward(&group_id, vec![node]).await {
            Ok(()) => result.clear(),
            Err(e) => {
                warn!(target: LOG_TARGET, "自身长回复折叠失败，按原样投递: {}", e);
            }
        }
    }

    /// 带重试的撤回：共尝试 retry_count + 1 次，间隔为协作式挂起
    async fn delete_with_retry(&self, transport: &dyn GroupTransport, message_id: &str) -> bool {
        let attempts = u64::from(self.config.retry_count) + 1;
        for attempt in 1..=attempts {
            match transport.delete_message(message_id).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(
                        target: LOG_TARGET,
                        "撤回消息 {} 失败 (第 {}/{} 次): {}", message_id, attempt, attempts, e
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                }
            }
        }
        false
    }

    /// 组合降级通知：发送者名 + 撤回标记 + 定长原文预览
    fn fallback_notice(&self, sender_name: &str, text: &str) -> String {
        let (preview, truncated) = truncate_chars(text, self.config.fallback_preview_length);
        if truncated {
            format!("{}{}，原文预览：{}…", sender_name, WITHDRAWN_MARKER, preview)
        } else {
            format!("{}{}，原文预览：{}", sender_name, WITHDRAWN_MARKER, preview)
        }
    }
}
