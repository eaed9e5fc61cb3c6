// lib.rs
//
// ================================================================================
// msgfold - 群聊长消息折叠组件
//
// 检测超长群消息，撤回原消息并以单节点合并转发重新发送，避免长文本刷屏。
// 宿主框架负责事件分发与连接管理，本组件通过 GroupTransport 契约访问传输层。
// ================================================================================

pub mod config;
pub mod event;
pub mod interceptor;
pub mod log;
pub mod message;
pub mod onebot;
pub mod transport;

/// 组件统一错误类型
pub type FoldError = Box<dyn std::error::Error + Send + Sync>;

pub type FoldResult<T> = Result<T, FoldError>;

pub mod prelude {
    //! 常用类型的预导入模块
    //!
    //! 建议在接入宿主时使用：
    //! ```rust
    //! use msgfold::prelude::*;
    //! ```

    pub use crate::config::{FoldConfig, RevokeFailurePolicy, default_config};
    pub use crate::event::{GroupMessageEvent, OutgoingResult, Sender};
    pub use crate::interceptor::{
        Decision, LongMessageFold, SkipReason, decide_incoming, decide_outgoing,
    };
    pub use crate::message::ForwardNode;
    pub use crate::onebot::{FrameSink, OneBotTransport};
    pub use crate::transport::GroupTransport;
    pub use crate::{FoldError, FoldResult};

    pub use async_trait::async_trait;

    // 导出 toml 供宿主传递配置块使用
    pub use toml;
}
