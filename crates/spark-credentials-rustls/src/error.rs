use std::borrow::Cow;

use spark_credentials::ConnectorError;
use thiserror::Error;

/// 稳定错误码。
pub mod codes {
    /// 需要信任根却未配置。
    pub const MISSING_ROOT_CERTS: &str = "spark.credentials.tls.missing_root_certs";
    /// PEM 内容无法解析。
    pub const PEM_INVALID: &str = "spark.credentials.tls.pem_invalid";
    /// rustls 拒绝了组装出的配置。
    pub const CONFIG_INVALID: &str = "spark.credentials.tls.config_invalid";
    /// 目标名不是合法的 DNS 名或 IP 地址。
    pub const SERVER_NAME_INVALID: &str = "spark.credentials.tls.server_name_invalid";
}

/// TLS 配置组装阶段的错误。
///
/// # 教案式说明
/// - **意图 (Why)**：rustls、PEM 解析与目标名解析各有自己的错误类型，连接器工厂需要把它们收敛为
///   带稳定错误码的 [`ConnectorError`] 交回凭证层；
/// - **契约 (What)**：每个变体对应 [`codes`] 中的一个码值，消息中不包含任何密钥材料。
#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("{role} verification requires root certificates but none were configured")]
    MissingRootCerts { role: &'static str },

    #[error("failed to parse {what}: {detail}")]
    PemInvalid {
        what: &'static str,
        detail: Cow<'static, str>,
    },

    #[error("rustls rejected the {stage} configuration: {detail}")]
    ConfigInvalid { stage: &'static str, detail: String },

    #[error("`{name}` is not a valid TLS server name")]
    ServerNameInvalid { name: String },
}

impl TlsSetupError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingRootCerts { .. } => codes::MISSING_ROOT_CERTS,
            Self::PemInvalid { .. } => codes::PEM_INVALID,
            Self::ConfigInvalid { .. } => codes::CONFIG_INVALID,
            Self::ServerNameInvalid { .. } => codes::SERVER_NAME_INVALID,
        }
    }

    pub(crate) fn pem(what: &'static str, detail: impl Into<Cow<'static, str>>) -> Self {
        Self::PemInvalid {
            what,
            detail: detail.into(),
        }
    }

    pub(crate) fn config(stage: &'static str, detail: impl std::fmt::Display) -> Self {
        Self::ConfigInvalid {
            stage,
            detail: detail.to_string(),
        }
    }
}

impl From<TlsSetupError> for ConnectorError {
    fn from(error: TlsSetupError) -> Self {
        ConnectorError::new(error.code(), error.to_string())
    }
}
