//! 插件配置
//!
//! 配置由宿主在构造时以 toml 表传入。所有字段逐项校验：
//! 非法取值修复为文档化的默认值并记录日志，绝不因配置错误拒绝启动。
//! 校验完成后配置在整个处理周期内只读。

use crate::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use toml::Value;
use toml::map::Map;

pub const DEFAULT_MAX_LENGTH: usize = 100;
pub const DEFAULT_PREVIEW_LENGTH: usize = 50;
pub const DEFAULT_RETRY_COUNT: u32 = 2;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// 撤回失败后的转发策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevokeFailurePolicy {
    /// 撤回失败仍继续转发 (内容送达优先于消除刷屏)
    #[default]
    ContinueForward,
    /// 撤回失败则放弃转发
    CancelForward,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldConfig {
    /// 插件总开关
    pub enabled: bool,
    /// 触发折叠的纯文本字符数阈值
    pub max_length: usize,
    /// 生效群号白名单；为空表示对所有群生效
    pub group_whitelist: HashSet<i64>,
    /// 是否折叠群成员的入站长消息
    pub fold_member_message: bool,
    /// 是否折叠机器人自身的长回复
    pub fold_self_message: bool,
    /// 转发失败时是否降级为纯文本通知
    pub enable_fallback: bool,
    /// 降级通知中的原文预览字符数
    pub fallback_preview_length: usize,
    /// 撤回失败后的额外重试次数
    pub retry_count: u32,
    /// 相邻两次撤回尝试之间的等待毫秒数
    pub retry_delay_ms: u64,
    /// 撤回失败后的转发策略
    pub on_revoke_failure: RevokeFailurePolicy,
}

impl Default for FoldConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: DEFAULT_MAX_LENGTH,
            group_whitelist: HashSet::new(),
            fold_member_message: true,
            fold_self_message: true,
            enable_fallback: true,
            fallback_preview_length: DEFAULT_PREVIEW_LENGTH,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            on_revoke_failure: RevokeFailurePolicy::default(),
        }
    }
}

impl FoldConfig {
    /// 从宿主传入的配置表构造，逐项校验并修复非法取值
    pub fn from_value(value: &Value) -> Self {
        let mut cfg = Self::default();
        let table = match value.as_table() {
            Some(t) => t,
            None => {
                warn!(target: "MsgFold/Config", "配置块不是表结构，使用默认配置");
                return cfg;
            }
        };

        cfg.enabled = bool_field(table, "enabled", cfg.enabled);
        cfg.max_length = positive_field(table, "max_length", DEFAULT_MAX_LENGTH);
        cfg.fold_member_message = bool_field(table, "fold_member_message", cfg.fold_member_message);
        cfg.fold_self_message = bool_field(table, "fold_self_message", cfg.fold_self_message);
        cfg.enable_fallback = bool_field(table, "enable_fallback", cfg.enable_fallback);
        cfg.fallback_preview_length =
            positive_field(table, "fallback_preview_length", DEFAULT_PREVIEW_LENGTH);
        cfg.retry_count = count_field(table, "retry_count", DEFAULT_RETRY_COUNT);
        cfg.retry_delay_ms = delay_field(table, "retry_delay_ms", DEFAULT_RETRY_DELAY_MS);
        cfg.group_whitelist = whitelist_field(table);

        if let Some(v) = table.get("on_revoke_failure") {
            match v.as_str() {
                Some("continue_forward") => {
                    cfg.on_revoke_failure = RevokeFailurePolicy::ContinueForward
                }
                Some("cancel_forward") => cfg.on_revoke_failure = RevokeFailurePolicy::CancelForward,
                _ => {
                    warn!(
                        target: "MsgFold/Config",
                        "on_revoke_failure 取值非法 ({})，使用默认策略 continue_forward", v
                    );
                }
            }
        }

        cfg
    }

    /// 群是否在生效范围内 (白名单为空 = 全部生效)
    ///
    /// 群号可能以数字或文本形式出现，统一归一化为 i64 比较；
    /// 无法归一化的值按不在白名单处理，不会使过滤崩溃。
    pub fn is_group_allowed(&self, group_id: &str) -> bool {
        if self.group_whitelist.is_empty() {
            return true;
        }
        match group_id.trim().parse::<i64>() {
            Ok(gid) => self.group_whitelist.contains(&gid),
            Err(_) => {
                warn!(
                    target: "MsgFold/Config",
                    "群号 {:?} 无法归一化，按未在白名单处理", group_id
                );
                false
            }
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// 构建默认配置块 (供宿主首次写入配置文件)
pub fn default_config() -> Value {
    Value::try_from(FoldConfig::default()).unwrap_or(Value::Table(Default::default()))
}

// ================= 字段校验工具 =================

fn bool_field(table: &Map<String, Value>, key: &str, default: bool) -> bool {
    match table.get(key) {
        None => default,
        Some(Value::Boolean(b)) => *b,
        Some(v) => {
            warn!(target: "MsgFold/Config", "{} 应为布尔值 (实际为 {})，使用默认值 {}", key, v, default);
            default
        }
    }
}

/// 正整数字段：接受正整数或可解析为正整数的字符串
fn positive_field(table: &Map<String, Value>, key: &str, default: usize) -> usize {
    let parsed = match table.get(key) {
        None => return default,
        Some(Value::Integer(i)) => (*i > 0).then_some(*i as usize),
        Some(Value::String(s)) => s.trim().parse::<usize>().ok().filter(|n| *n > 0),
        Some(_) => None,
    };
    match parsed {
        Some(n) => n,
        None => {
            warn!(target: "MsgFold/Config", "{} 应为正整数，使用默认值 {}", key, default);
            default
        }
    }
}

/// 非负次数字段
fn count_field(table: &Map<String, Value>, key: &str, default: u32) -> u32 {
    match table.get(key) {
        None => default,
        Some(Value::Integer(i)) if *i >= 0 && *i <= u32::MAX as i64 => *i as u32,
        Some(_) => {
            warn!(target: "MsgFold/Config", "{} 应为非负整数，使用默认值 {}", key, default);
            default
        }
    }
}

/// 非负毫秒数字段
fn delay_field(table: &Map<String, Value>, key: &str, default: u64) -> u64 {
    match table.get(key) {
        None => default,
        Some(Value::Integer(i)) if *i >= 0 => *i as u64,
        Some(_) => {
            warn!(target: "MsgFold/Config", "{} 应为非负整数，使用默认值 {}", key, default);
            default
        }
    }
}

/// 白名单字段：条目接受整数或数字字符串，其余丢弃并记录
fn whitelist_field(table: &Map<String, Value>) -> HashSet<i64> {
    let mut set = HashSet::new();
    let entries = match table.get("group_whitelist") {
        None => return set,
        Some(Value::Array(arr)) => arr,
        Some(_) => {
            warn!(target: "MsgFold/Config", "group_whitelist 应为数组，视为空白名单");
            return set;
        }
    };

    for entry in entries {
        let parsed = match entry {
            Value::Integer(i) => Some(*i),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match parsed {
            Some(gid) => {
                set.insert(gid);
            }
            None => {
                warn!(target: "MsgFold/Config", "白名单条目 {} 无法解析为群号，已丢弃", entry);
            }
        }
    }
    set
}
