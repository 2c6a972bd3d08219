//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为凭证子系统对外暴露的失败语义提供集中定义，调用方只需匹配一个枚举即可区分
//!   “输入形状错误”“对象状态不允许”“连接器层失败”三类问题；
//! - 每个变体都映射到 `spark.credentials.*` 命名空间下的稳定错误码，便于日志、告警与
//!   宿主绑定层做机读分流。
//!
//! ## 设计要求（What）
//! - 所有构造类操作在失败时返回 `Err`，绝不返回“半成品”对象；
//! - `ConnectorCreation` 原样携带连接器层给出的 [`ConnectorError`]，本层不改写错误码；
//! - 对端校验回调的失败不会出现在这里，而是被桥接层转换为拒绝信号。

use std::borrow::Cow;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::connector::ConnectorError;

/// 凭证子系统的结果别名。
pub type Result<T, E = CredentialError> = core::result::Result<T, E>;

/// 稳定错误码表。
///
/// 码值遵循 `<域>.<语义>` 约定，与 `CoreError` 的命名规范保持一致。
pub mod codes {
    /// 输入形状不合法，例如私钥与证书链只提供了一半。
    pub const INVALID_ARGUMENT: &str = "spark.credentials.invalid_argument";
    /// 当前对象状态不允许该操作，例如在非安全凭证上组合调用凭证。
    pub const INVALID_STATE: &str = "spark.credentials.invalid_state";
    /// 文件化配置读取或解析失败。
    pub const SETTINGS: &str = "spark.credentials.settings_invalid";
}

/// 凭证子系统错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把构造、组合与连接器创建三个阶段的失败收敛为同一枚举，调用方可以用 `?`
///   直接传播，而绑定层可以按变体映射到宿主异常类型。
/// - **契约 (What)**：
///   - 任何返回本错误的操作都保证没有产生可观察的部分状态；
///   - `InvalidArgument`/`InvalidState` 携带面向排障人员的描述，不包含任何密钥材料；
///   - `ConnectorCreation` 保留连接器层的原始错误码。
/// - **设计权衡 (Trade-offs)**：描述使用 `Cow<'static, str>`，常量文案零分配，动态文案付出一次堆分配。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialError {
    /// 输入形状不合法。
    #[error("invalid argument: {0}")]
    InvalidArgument(Cow<'static, str>),

    /// 对象状态不允许该操作。
    #[error("invalid state: {0}")]
    InvalidState(Cow<'static, str>),

    /// 连接器层报告失败，原样透传。
    #[error("security connector creation failed: {0}")]
    ConnectorCreation(#[from] ConnectorError),

    /// 文件化配置读取或解析失败。
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl CredentialError {
    /// 构造 `InvalidArgument`。
    pub fn invalid_argument(detail: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidArgument(detail.into())
    }

    /// 构造 `InvalidState`。
    pub fn invalid_state(detail: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidState(detail.into())
    }

    /// 返回稳定错误码。
    ///
    /// 连接器失败返回连接器层自己的码值，保持“原样透传”的契约。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => codes::INVALID_ARGUMENT,
            Self::InvalidState(_) => codes::INVALID_STATE,
            Self::ConnectorCreation(inner) => inner.code(),
            Self::Settings(_) => codes::SETTINGS,
        }
    }
}

/// 文件化配置阶段的错误。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    /// 读取 PEM 或配置文件失败。
    #[error("failed to read `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// TOML 解析失败；`detail` 为解析器给出的位置与原因。
    #[error("failed to parse credential settings: {detail}")]
    Parse { detail: String },

    /// 配置内容自相矛盾，例如同时声明 `insecure = true` 与证书路径。
    #[error("inconsistent credential settings: {detail}")]
    Inconsistent { detail: Cow<'static, str> },
}
