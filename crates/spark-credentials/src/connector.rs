//! 安全连接器创建契约。
//!
//! # 设计背景（Why）
//! - 真正的握手与证书校验由传输层的安全连接器完成，凭证层只负责在连接建立时把配置交出去；
//!   因此连接器创建被抽象为 [`SecurityConnectorFactory`]，由传输实现注入。
//! - 连接器本身对凭证层不透明，以关联类型表达，避免在热路径上引入 trait object。
//!
//! # 契约说明（What）
//! - 工厂失败时返回 [`ConnectorError`]，凭证层原样包装为
//!   [`CredentialError::ConnectorCreation`](crate::CredentialError::ConnectorCreation) 透传；
//! - 失败路径上凭证层不会构造增补后的通道参数。

use std::borrow::Cow;

use thiserror::Error;

use crate::args::ChannelArgs;
use crate::call::CallCredentials;
use crate::channel::ChannelCredentials;
use crate::config::SslConfig;
use crate::server::{ServerCredentials, SslServerConfig};

/// 连接器层报告的失败，携带稳定错误码。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message} ({code})")]
pub struct ConnectorError {
    code: &'static str,
    message: Cow<'static, str>,
}

impl ConnectorError {
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 创建 SSL 通道连接器所需的全部输入。
///
/// # 字段契约（What）
/// - `credentials`：发起创建的 SSL 凭证本身，连接器若需延长其生命周期可自行克隆句柄；
/// - `call_credentials`：随连接附带的调用凭证（来自组合凭证或调用方）；
/// - `target`：拨号目标；`overridden_target_name`：通道参数中的覆盖名，存在时用于证书名匹配。
#[derive(Clone, Copy, Debug)]
pub struct SslChannelConnectorRequest<'a> {
    pub credentials: &'a ChannelCredentials,
    pub call_credentials: Option<&'a CallCredentials>,
    pub config: &'a SslConfig,
    pub target: &'a str,
    pub overridden_target_name: Option<&'a str>,
}

impl SslChannelConnectorRequest<'_> {
    /// 证书名匹配应使用的名字：覆盖名优先，否则为拨号目标。
    pub fn verification_name(&self) -> &str {
        self.overridden_target_name.unwrap_or(self.target)
    }
}

/// 由传输层实现的连接器工厂。
pub trait SecurityConnectorFactory {
    /// 客户端安全连接器。
    type ChannelConnector;
    /// 服务端安全连接器。
    type ServerConnector;

    fn create_ssl_channel_connector(
        &self,
        request: SslChannelConnectorRequest<'_>,
    ) -> Result<Self::ChannelConnector, ConnectorError>;

    fn create_ssl_server_connector(
        &self,
        credentials: &ServerCredentials,
        config: &SslServerConfig,
    ) -> Result<Self::ServerConnector, ConnectorError>;
}

/// 连接器创建钩子的成功结果。
#[derive(Debug)]
pub enum ConnectorOutcome<C> {
    /// 非安全凭证：不创建连接器，不修改通道参数。
    Plaintext,
    /// 安全凭证：连接器与追加了方案标记的新参数集合。
    Secured {
        connector: C,
        channel_args: ChannelArgs,
    },
}

impl<C> ConnectorOutcome<C> {
    pub fn is_secured(&self) -> bool {
        matches!(self, Self::Secured { .. })
    }

    pub fn connector(&self) -> Option<&C> {
        match self {
            Self::Secured { connector, .. } => Some(connector),
            Self::Plaintext => None,
        }
    }

    pub fn channel_args(&self) -> Option<&ChannelArgs> {
        match self {
            Self::Secured { channel_args, .. } => Some(channel_args),
            Self::Plaintext => None,
        }
    }
}
