//! PEM 材料到 rustls 类型的转换。

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rustls::RootCertStore;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use spark_credentials::{KeyCertPair, PemBuffer};

use crate::error::TlsSetupError;

const PEM_LINE_WIDTH: usize = 64;

/// 解析证书链；空链视为错误。
pub(crate) fn certificates(
    pem: &PemBuffer,
    what: &'static str,
) -> Result<Vec<CertificateDer<'static>>, TlsSetupError> {
    let certs = CertificateDer::pem_slice_iter(pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| TlsSetupError::pem(what, error.to_string()))?;
    if certs.is_empty() {
        return Err(TlsSetupError::pem(what, "no CERTIFICATE block found"));
    }
    Ok(certs)
}

/// 解析私钥。错误信息只包含解析器给出的原因，不回显内容。
pub(crate) fn private_key(pair: &KeyCertPair) -> Result<PrivateKeyDer<'static>, TlsSetupError> {
    PrivateKeyDer::from_pem_slice(pair.private_key().as_bytes())
        .map_err(|error| TlsSetupError::pem("private key", error.to_string()))
}

/// 构建信任根集合；任何一张证书被 webpki 拒绝都会使构建失败。
pub(crate) fn root_store(pem: &PemBuffer) -> Result<RootCertStore, TlsSetupError> {
    let mut store = RootCertStore::empty();
    for cert in certificates(pem, "root certificates")? {
        store
            .add(cert)
            .map_err(|error| TlsSetupError::pem("root certificates", error.to_string()))?;
    }
    Ok(store)
}

/// 把 DER 证书重新编码为 PEM 文本，供对端校验回调使用。
pub(crate) fn encode_certificate(der: &CertificateDer<'_>) -> String {
    let body = STANDARD.encode(der.as_ref());
    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str("-----BEGIN CERTIFICATE-----\n");
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 输出只含 ASCII。
        pem.extend(line.iter().copied().map(char::from));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_certificate_round_trips_through_pem_parser() {
        let der = CertificateDer::from((0u8..=200).collect::<Vec<_>>());
        let pem = encode_certificate(&der);
        assert!(pem.lines().all(|line| line.len() <= PEM_LINE_WIDTH));
        let parsed = CertificateDer::from_pem_slice(pem.as_bytes()).expect("合法 PEM");
        assert_eq!(parsed.as_ref(), der.as_ref());
    }

    #[test]
    fn garbage_is_not_a_certificate_chain() {
        let err = certificates(&PemBuffer::copy_from(b"not pem at all"), "cert chain")
            .expect_err("无证书块");
        assert_eq!(err.code(), crate::error::codes::PEM_INVALID);
    }
}
