//! 核心凭证错误到宿主异常的映射。

use spark_credentials::CredentialError;
use tracing::debug;

use crate::value::HostException;

/// - `InvalidState`（组合非安全凭证等）映射为 `TypeError`，与宿主侧的既有约定一致；
/// - 其余错误映射为普通 `Error`，消息附带稳定错误码便于排障。
impl From<CredentialError> for HostException {
    fn from(error: CredentialError) -> Self {
        debug!(code = error.code(), %error, "credential operation failed");
        match &error {
            CredentialError::InvalidState(detail) => HostException::type_error(detail.to_string()),
            _ => HostException::error(format!("{error} [{}]", error.code())),
        }
    }
}
