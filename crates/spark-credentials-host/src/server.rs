//! `ServerCredentials` 绑定入口。

use std::fmt;

use spark_credentials::{PemKeyCertPairRef, ServerCredentials};

use crate::value::{HostException, HostValue, arg, optional_buffer};

/// 宿主侧的服务端凭证对象。
#[derive(Clone)]
pub struct ServerCredentialsObject {
    wrapped: ServerCredentials,
}

impl ServerCredentialsObject {
    pub fn wrapped(&self) -> &ServerCredentials {
        &self.wrapped
    }
}

impl fmt::Debug for ServerCredentialsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServerCredentialsObject")
            .field(&self.wrapped)
            .finish()
    }
}

/// `ServerCredentials.createSsl(rootCerts?, keyCertPairs, checkClientCertificate?)`。
///
/// # 契约（What）
/// - `keyCertPairs` 必须是数组，每个元素是同时带有 Buffer 类型 `private_key` 与 `cert_chain`
///   属性的对象；
/// - `checkClientCertificate` 缺省为 `false`，提供时必须为布尔值。
pub fn create_ssl(args: &[HostValue]) -> Result<HostValue, HostException> {
    let root_certs = optional_buffer(
        arg(args, 0),
        "createSsl's first argument must be a Buffer if provided",
    )?;
    let HostValue::Array(entries) = arg(args, 1) else {
        return Err(HostException::type_error(
            "createSsl's second argument must be an array of key/cert pairs",
        ));
    };
    let force_client_auth = match arg(args, 2) {
        HostValue::Bool(flag) => *flag,
        other if other.is_nullish() => false,
        _ => {
            return Err(HostException::type_error(
                "createSsl's third argument must be a boolean if provided",
            ));
        }
    };

    let pairs = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| key_cert_pair(index, entry))
        .collect::<Result<Vec<_>, _>>()?;
    let wrapped = ServerCredentials::ssl(root_certs, &pairs, force_client_auth)?;
    Ok(HostValue::ServerCredentials(ServerCredentialsObject {
        wrapped,
    }))
}

fn key_cert_pair(
    index: usize,
    entry: &HostValue,
) -> Result<PemKeyCertPairRef<'_>, HostException> {
    if !matches!(entry, HostValue::Object(_)) {
        return Err(HostException::type_error(format!(
            "key/cert pair {index} must be an object"
        )));
    }
    let field = |name: &str| match entry.get(name).and_then(HostValue::as_buffer) {
        Some(bytes) => Ok(bytes),
        None => Err(HostException::type_error(format!(
            "key/cert pair {index} must have a Buffer `{name}`"
        ))),
    };
    Ok(PemKeyCertPairRef::new(field("private_key")?, field("cert_chain")?))
}
