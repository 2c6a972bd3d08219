//! 自定义 rustls 校验器。
//!
//! - [`CredentialServerVerifier`]（客户端侧）：先做证书链校验，按凭证策略决定是否容忍主机名不匹配，
//!   最后调用凭证上挂载的对端校验桥；
//! - [`UnverifiedClientCertVerifier`]（服务端侧）：用于“请求/要求但不校验”的客户端证书策略，
//!   只校验握手签名，不校验证书链。

use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{CertificateError, DigitallySignedStruct, DistinguishedName, Error, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use spark_credentials::ChannelCredentials;
use tracing::{debug, warn};

use crate::pem::encode_certificate;

/// 证书名不匹配的判定，覆盖带上下文与不带上下文的两种变体。
fn is_name_mismatch(error: &Error) -> bool {
    matches!(
        error,
        Error::InvalidCertificate(
            CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
        )
    )
}

/// 客户端侧服务端证书校验器。
///
/// # 教案式说明
/// - **意图 (Why)**：凭证层的校验策略包含“跳过主机名校验”与“宿主回调”两项，rustls 内置校验器
///   无法表达，因此在 webpki 校验器外层包一层；
/// - **执行 (How)**：
///   1. 交给 webpki 做链校验与主机名校验；
///   2. 若唯一的失败是主机名不匹配且策略允许跳过，则视为通过；其他失败原样返回；
///   3. 若凭证挂载了校验桥，以 `(server_name, PEM 证书)` 调用，拒绝时返回
///      `ApplicationVerificationFailure`；
/// - **契约 (What)**：持有凭证句柄的一份引用，校验器存活期间校验桥不会被拆除。
#[derive(Debug)]
pub struct CredentialServerVerifier {
    inner: Arc<WebPkiServerVerifier>,
    credentials: ChannelCredentials,
}

impl CredentialServerVerifier {
    pub(crate) fn new(inner: Arc<WebPkiServerVerifier>, credentials: ChannelCredentials) -> Self {
        Self { inner, credentials }
    }
}

impl ServerCertVerifier for CredentialServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        let Some(config) = self.credentials.ssl_config() else {
            return Err(Error::General(
                "server verifier is bound to non-ssl credentials".to_owned(),
            ));
        };
        let options = config.verify_options();

        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Ok(_) => {}
            Err(error) if options.skip_hostname_verification() && is_name_mismatch(&error) => {
                debug!(%error, "hostname mismatch tolerated by credential policy");
            }
            Err(error) => return Err(error),
        }

        if options.peer_verifier().is_some() {
            let name = server_name.to_str();
            let pem = encode_certificate(end_entity);
            if !options.verify_peer(Some(name.as_ref()), Some(&pem)).is_accept() {
                warn!(server_name = %name, "peer rejected by verification callback");
                return Err(Error::InvalidCertificate(
                    CertificateError::ApplicationVerificationFailure,
                ));
            }
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// 接受任意客户端证书的校验器，`mandatory` 决定客户端是否必须出示证书。
#[derive(Debug)]
pub struct UnverifiedClientCertVerifier {
    mandatory: bool,
    algorithms: WebPkiSupportedAlgorithms,
}

impl UnverifiedClientCertVerifier {
    pub(crate) fn new(mandatory: bool, algorithms: WebPkiSupportedAlgorithms) -> Self {
        Self {
            mandatory,
            algorithms,
        }
    }
}

impl ClientCertVerifier for UnverifiedClientCertVerifier {
    fn client_auth_mandatory(&self) -> bool {
        self.mandatory
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
