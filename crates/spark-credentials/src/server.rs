//! 服务端 SSL 凭证。
//!
//! 与通道凭证平行：持有若干完整的私钥/证书链对、可选的客户端信任根，以及客户端证书请求策略。
//! 构造同样遵循“全部校验通过再拷贝”的原则，任何一对不完整都会使整个构造失败。

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::channel::CredentialKind;
use crate::config::{KeyCertPair, PemBuffer, PemKeyCertPairRef};
use crate::connector::SecurityConnectorFactory;
use crate::error::Result;

/// 客户端证书请求策略。
///
/// # 设计依据（Why）
/// - 布尔值无法区分“请求但不强制”“强制但不校验”等中间态，因此使用从宽到严的枚举。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "settings",
    derive(serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ClientCertificateRequest {
    /// 不请求客户端证书。
    #[default]
    DontRequest,
    /// 请求证书；客户端可以不提供，提供了也不校验。
    RequestButDontVerify,
    /// 请求证书；客户端可以不提供，提供了则必须通过校验。
    RequestAndVerify,
    /// 要求提供证书，但不校验。
    RequireButDontVerify,
    /// 要求提供证书并校验。
    RequireAndVerify,
}

impl ClientCertificateRequest {
    /// 兼容旧式布尔开关：`true` 映射为最严格的 `RequireAndVerify`，`false` 为 `DontRequest`。
    pub const fn from_force_client_auth(force_client_auth: bool) -> Self {
        if force_client_auth {
            Self::RequireAndVerify
        } else {
            Self::DontRequest
        }
    }

    /// 握手时是否向客户端发出证书请求。
    pub const fn requests_certificate(self) -> bool {
        !matches!(self, Self::DontRequest)
    }

    /// 客户端未提供证书时是否拒绝握手。
    pub const fn requires_certificate(self) -> bool {
        matches!(self, Self::RequireButDontVerify | Self::RequireAndVerify)
    }

    /// 客户端提供的证书是否需要链校验。
    pub const fn verifies_certificate(self) -> bool {
        matches!(self, Self::RequestAndVerify | Self::RequireAndVerify)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DontRequest => "dont_request",
            Self::RequestButDontVerify => "request_but_dont_verify",
            Self::RequestAndVerify => "request_and_verify",
            Self::RequireButDontVerify => "require_but_dont_verify",
            Self::RequireAndVerify => "require_and_verify",
        }
    }
}

/// 服务端 SSL 配置快照。
#[derive(Debug)]
pub struct SslServerConfig {
    key_cert_pairs: Vec<KeyCertPair>,
    root_certs: Option<PemBuffer>,
    client_certificate_request: ClientCertificateRequest,
}

impl SslServerConfig {
    /// 构建服务端配置。
    ///
    /// # 执行步骤（How）
    /// 1. 逐对校验完整性，任意一对缺失任一半即返回 `InvalidArgument`，此前已拷贝的副本随之释放；
    /// 2. 拷贝根证书并记录请求策略。
    pub fn build(
        root_certs: Option<&[u8]>,
        key_cert_pairs: &[PemKeyCertPairRef<'_>],
        client_certificate_request: ClientCertificateRequest,
    ) -> Result<Self> {
        let key_cert_pairs = key_cert_pairs
            .iter()
            .copied()
            .map(KeyCertPair::from_complete)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            key_cert_pairs,
            root_certs: root_certs.map(PemBuffer::copy_from),
            client_certificate_request,
        })
    }

    pub fn key_cert_pairs(&self) -> &[KeyCertPair] {
        &self.key_cert_pairs
    }

    pub fn root_certs(&self) -> Option<&PemBuffer> {
        self.root_certs.as_ref()
    }

    pub fn client_certificate_request(&self) -> ClientCertificateRequest {
        self.client_certificate_request
    }
}

struct ServerInner {
    config: SslServerConfig,
}

impl Drop for ServerInner {
    fn drop(&mut self) {
        trace!(
            key_cert_pairs = self.config.key_cert_pairs.len(),
            "server credentials destructed"
        );
    }
}

/// 服务端凭证共享句柄，语义与 [`ChannelCredentials`](crate::ChannelCredentials) 一致。
#[derive(Clone)]
pub struct ServerCredentials {
    inner: Arc<ServerInner>,
}

impl ServerCredentials {
    /// 以旧式布尔开关构造。
    pub fn ssl(
        root_certs: Option<&[u8]>,
        key_cert_pairs: &[PemKeyCertPairRef<'_>],
        force_client_auth: bool,
    ) -> Result<Self> {
        Self::ssl_with_client_auth(
            root_certs,
            key_cert_pairs,
            ClientCertificateRequest::from_force_client_auth(force_client_auth),
        )
    }

    /// 以显式请求策略构造。
    pub fn ssl_with_client_auth(
        root_certs: Option<&[u8]>,
        key_cert_pairs: &[PemKeyCertPairRef<'_>],
        client_certificate_request: ClientCertificateRequest,
    ) -> Result<Self> {
        debug!(
            root_certs = root_certs.map(<[u8]>::len),
            key_cert_pairs = key_cert_pairs.len(),
            client_certificate_request = client_certificate_request.as_str(),
            "creating ssl server credentials"
        );
        let config =
            SslServerConfig::build(root_certs, key_cert_pairs, client_certificate_request)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: SslServerConfig) -> Self {
        Self {
            inner: Arc::new(ServerInner { config }),
        }
    }

    /// 服务端凭证目前只有 SSL 一种形态。
    pub fn kind(&self) -> CredentialKind {
        CredentialKind::Ssl
    }

    pub fn config(&self) -> &SslServerConfig {
        &self.inner.config
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &ServerCredentials) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn release(self) {
        drop(self);
    }

    /// 由传输层在监听建立时调用，把配置交给连接器工厂。失败原样透传。
    pub fn create_security_connector<F>(&self, factory: &F) -> Result<F::ServerConnector>
    where
        F: SecurityConnectorFactory + ?Sized,
    {
        Ok(factory.create_ssl_server_connector(self, &self.inner.config)?)
    }
}

impl fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCredentials")
            .field("config", &self.inner.config)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CredentialError;

    #[test]
    fn legacy_flag_maps_to_extremes() {
        assert_eq!(
            ClientCertificateRequest::from_force_client_auth(true),
            ClientCertificateRequest::RequireAndVerify
        );
        assert_eq!(
            ClientCertificateRequest::from_force_client_auth(false),
            ClientCertificateRequest::DontRequest
        );
    }

    #[test]
    fn request_modes_are_ordered_by_strictness() {
        use ClientCertificateRequest::*;
        assert!(!DontRequest.requests_certificate());
        assert!(RequestButDontVerify.requests_certificate());
        assert!(!RequestButDontVerify.verifies_certificate());
        assert!(RequestAndVerify.verifies_certificate());
        assert!(!RequestAndVerify.requires_certificate());
        assert!(RequireButDontVerify.requires_certificate());
        assert!(!RequireButDontVerify.verifies_certificate());
        assert!(RequireAndVerify.requires_certificate() && RequireAndVerify.verifies_certificate());
    }

    #[test]
    fn incomplete_pair_fails_whole_construction() {
        let pairs = [
            PemKeyCertPairRef::new(b"K1", b"C1"),
            PemKeyCertPairRef {
                private_key: Some(b"K2"),
                cert_chain: None,
            },
        ];
        let err = ServerCredentials::ssl(None, &pairs, false).expect_err("第二对不完整");
        assert!(matches!(err, CredentialError::InvalidArgument(_)));

        let empty = [PemKeyCertPairRef::default()];
        assert!(ServerCredentials::ssl(None, &empty, false).is_err());
    }

    #[test]
    fn zero_pairs_are_accepted() {
        let creds = ServerCredentials::ssl_with_client_auth(
            Some(b"ROOT"),
            &[],
            ClientCertificateRequest::RequestAndVerify,
        )
        .expect("零对证书合法");
        assert!(creds.config().key_cert_pairs().is_empty());
        assert_eq!(
            creds.config().root_certs().map(PemBuffer::as_bytes),
            Some(&b"ROOT"[..])
        );
    }
}
