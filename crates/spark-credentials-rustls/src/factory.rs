//! 基于 rustls 的连接器工厂。

use std::fmt;
use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::server::{ClientHello, ResolvesServerCert, WebPkiClientVerifier};
use rustls::server::danger::ClientCertVerifier;
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, ServerConfig};
use rustls_pki_types::ServerName;
use spark_credentials::{
    CallCredentials, ChannelCredentials, ClientCertificateRequest, ConnectorError,
    SecurityConnectorFactory, ServerCredentials, SslChannelConnectorRequest, SslServerConfig,
};
use tracing::debug;

use crate::error::TlsSetupError;
use crate::pem;
use crate::verifier::{CredentialServerVerifier, UnverifiedClientCertVerifier};

/// 通道参数中约定的 HTTP/2 方案对应的 ALPN 标识。
const ALPN_H2: &[u8] = b"h2";

/// 客户端安全连接器：握手所需的 rustls 配置与目标名。
///
/// 持有发起凭证与调用凭证的引用，连接器存活期间二者不会被销毁。
pub struct RustlsChannelConnector {
    config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
    call_credentials: Option<CallCredentials>,
    credentials: ChannelCredentials,
}

impl RustlsChannelConnector {
    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    pub fn server_name(&self) -> &ServerName<'static> {
        &self.server_name
    }

    pub fn call_credentials(&self) -> Option<&CallCredentials> {
        self.call_credentials.as_ref()
    }

    pub fn credentials(&self) -> &ChannelCredentials {
        &self.credentials
    }
}

impl fmt::Debug for RustlsChannelConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustlsChannelConnector")
            .field("server_name", &self.server_name)
            .field("call_credentials", &self.call_credentials)
            .finish_non_exhaustive()
    }
}

/// 服务端安全连接器。
pub struct RustlsServerConnector {
    config: Arc<ServerConfig>,
    credentials: ServerCredentials,
}

impl RustlsServerConnector {
    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    pub fn credentials(&self) -> &ServerCredentials {
        &self.credentials
    }
}

impl fmt::Debug for RustlsServerConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustlsServerConnector")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// rustls 连接器工厂。
///
/// # 教案式说明
/// - **意图 (Why)**：把凭证层的 PEM 快照与校验策略落地为 rustls 的 `ClientConfig`/`ServerConfig`；
/// - **契约 (What)**：
///   - 客户端必须配置信任根，缺失时返回 `missing_root_certs`；
///   - 服务端至少需要一对证书；校验客户端证书的策略同样需要信任根；
///   - 所有错误以带稳定码的 [`ConnectorError`] 返回；
/// - **执行 (How)**：密码学实现固定为注入的 [`CryptoProvider`]，默认使用 ring。
#[derive(Clone)]
pub struct RustlsConnectorFactory {
    provider: Arc<CryptoProvider>,
}

impl Default for RustlsConnectorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RustlsConnectorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustlsConnectorFactory")
            .finish_non_exhaustive()
    }
}

impl RustlsConnectorFactory {
    /// 使用 ring 提供的默认密码学实现。
    pub fn new() -> Self {
        Self::with_provider(Arc::new(rustls::crypto::ring::default_provider()))
    }

    pub fn with_provider(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }

    fn client_config(
        &self,
        request: &SslChannelConnectorRequest<'_>,
    ) -> Result<ClientConfig, TlsSetupError> {
        let config = request.config;
        let roots = config
            .root_certs()
            .ok_or(TlsSetupError::MissingRootCerts { role: "server" })?;
        let roots = Arc::new(pem::root_store(roots)?);
        let webpki = WebPkiServerVerifier::builder_with_provider(roots, Arc::clone(&self.provider))
            .build()
            .map_err(|error| TlsSetupError::config("server verifier", error))?;
        let verifier = Arc::new(CredentialServerVerifier::new(
            webpki,
            request.credentials.clone(),
        ));

        let builder = ClientConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()
            .map_err(|error| TlsSetupError::config("client protocol versions", error))?
            .dangerous()
            .with_custom_certificate_verifier(verifier);
        let mut client = match config.key_cert_pair() {
            Some(pair) => {
                let chain = pem::certificates(pair.cert_chain(), "client certificate chain")?;
                let key = pem::private_key(pair)?;
                builder
                    .with_client_auth_cert(chain, key)
                    .map_err(|error| TlsSetupError::config("client certificate", error))?
            }
            None => builder.with_no_client_auth(),
        };
        client.alpn_protocols = vec![ALPN_H2.to_vec()];
        Ok(client)
    }

    fn server_config(&self, config: &SslServerConfig) -> Result<ServerConfig, TlsSetupError> {
        let resolver = Arc::new(self.cert_resolver(config)?);
        let builder = ServerConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_safe_default_protocol_versions()
            .map_err(|error| TlsSetupError::config("server protocol versions", error))?;

        let request = config.client_certificate_request();
        let builder = if !request.requests_certificate() {
            builder.with_no_client_auth()
        } else {
            builder.with_client_cert_verifier(self.client_verifier(config, request)?)
        };
        let mut server = builder.with_cert_resolver(resolver);
        server.alpn_protocols = vec![ALPN_H2.to_vec()];
        Ok(server)
    }

    fn client_verifier(
        &self,
        config: &SslServerConfig,
        request: ClientCertificateRequest,
    ) -> Result<Arc<dyn ClientCertVerifier>, TlsSetupError> {
        if !request.verifies_certificate() {
            return Ok(Arc::new(UnverifiedClientCertVerifier::new(
                request.requires_certificate(),
                self.provider.signature_verification_algorithms,
            )));
        }
        let roots = config
            .root_certs()
            .ok_or(TlsSetupError::MissingRootCerts { role: "client" })?;
        let roots = Arc::new(pem::root_store(roots)?);
        let builder =
            WebPkiClientVerifier::builder_with_provider(roots, Arc::clone(&self.provider));
        let builder = if request.requires_certificate() {
            builder
        } else {
            builder.allow_unauthenticated()
        };
        builder
            .build()
            .map_err(|error| TlsSetupError::config("client verifier", error))
    }

    fn cert_resolver(&self, config: &SslServerConfig) -> Result<PairResolver, TlsSetupError> {
        if config.key_cert_pairs().is_empty() {
            return Err(TlsSetupError::config(
                "server certificate",
                "at least one key/cert pair is required",
            ));
        }
        let keys = config
            .key_cert_pairs()
            .iter()
            .map(|pair| {
                let chain = pem::certificates(pair.cert_chain(), "server certificate chain")?;
                let signing_key = self
                    .provider
                    .key_provider
                    .load_private_key(pem::private_key(pair)?)
                    .map_err(|error| TlsSetupError::config("server private key", error))?;
                Ok(Arc::new(CertifiedKey::new(chain, signing_key)))
            })
            .collect::<Result<Vec<_>, TlsSetupError>>()?;
        Ok(PairResolver { keys })
    }
}

/// 在多对证书之间按客户端支持的签名方案选择。
#[derive(Debug)]
struct PairResolver {
    keys: Vec<Arc<CertifiedKey>>,
}

impl ResolvesServerCert for PairResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let offered = client_hello.signature_schemes();
        self.keys
            .iter()
            .find(|key| key.key.choose_scheme(offered).is_some())
            .or_else(|| self.keys.first())
            .cloned()
    }
}

/// 从拨号目标中取出主机部分：去掉 `dns:` 方案与可选的 `//authority/` 段、端口与 IPv6 方括号。
pub(crate) fn host_from_target(target: &str) -> &str {
    let target = match target.strip_prefix("dns:") {
        Some(rest) => match rest.strip_prefix("//") {
            Some(authority_and_path) => authority_and_path
                .split_once('/')
                .map_or(authority_and_path, |(_, path)| path),
            None => rest,
        },
        None => target,
    };
    if let Some(rest) = target.strip_prefix('[') {
        return rest.split_once(']').map_or(rest, |(host, _)| host);
    }
    match target.rsplit_once(':') {
        Some((host, port))
            if !host.contains(':')
                && !port.is_empty()
                && port.bytes().all(|byte| byte.is_ascii_digit()) =>
        {
            host
        }
        _ => target,
    }
}

fn server_name(
    request: &SslChannelConnectorRequest<'_>,
) -> Result<ServerName<'static>, TlsSetupError> {
    let name = match request.overridden_target_name {
        Some(name) => name,
        None => host_from_target(request.target),
    };
    ServerName::try_from(name.to_owned()).map_err(|_| TlsSetupError::ServerNameInvalid {
        name: name.to_owned(),
    })
}

impl SecurityConnectorFactory for RustlsConnectorFactory {
    type ChannelConnector = RustlsChannelConnector;
    type ServerConnector = RustlsServerConnector;

    fn create_ssl_channel_connector(
        &self,
        request: SslChannelConnectorRequest<'_>,
    ) -> Result<Self::ChannelConnector, ConnectorError> {
        let server_name = server_name(&request)?;
        let config = self.client_config(&request)?;
        debug!(
            server_name = %server_name.to_str(),
            root_certs = ?request.config.root_certs().map(|roots| roots.fingerprint()),
            client_auth = request.config.key_cert_pair().is_some(),
            "rustls channel connector created"
        );
        Ok(RustlsChannelConnector {
            config: Arc::new(config),
            server_name,
            call_credentials: request.call_credentials.cloned(),
            credentials: request.credentials.clone(),
        })
    }

    fn create_ssl_server_connector(
        &self,
        credentials: &ServerCredentials,
        config: &SslServerConfig,
    ) -> Result<Self::ServerConnector, ConnectorError> {
        let server = self.server_config(config)?;
        debug!(
            key_cert_pairs = config.key_cert_pairs().len(),
            client_certificate_request = config.client_certificate_request().as_str(),
            "rustls server connector created"
        );
        Ok(RustlsServerConnector {
            config: Arc::new(server),
            credentials: credentials.clone(),
        })
    }
}
