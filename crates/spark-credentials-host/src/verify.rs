//! 宿主 `checkServerIdentity` 回调到校验桥的适配。

use spark_credentials::{PeerVerificationError, PeerVerifier, VerifyPeerCallback};
use tracing::debug;

use crate::value::{HostFunction, HostValue};

/// 以宿主函数实现的校验回调。
///
/// # 契约（What）
/// - 以 `(server_name, cert)` 两个参数调用宿主函数，缺失的参数以 `Null` 传递；
/// - 宿主函数抛出异常即视为拒绝；返回值不参与判定。
#[derive(Debug)]
pub struct HostVerifyCallback {
    function: HostFunction,
}

impl HostVerifyCallback {
    pub fn new(function: HostFunction) -> Self {
        Self { function }
    }

    /// 包装为独占所有权的校验桥。
    pub fn into_peer_verifier(self) -> PeerVerifier {
        PeerVerifier::new(self)
    }
}

impl VerifyPeerCallback for HostVerifyCallback {
    fn verify(
        &self,
        server_name: Option<&str>,
        cert: Option<&str>,
    ) -> Result<(), PeerVerificationError> {
        let args = [HostValue::from(server_name), HostValue::from(cert)];
        match self.function.call(&args) {
            Ok(_) => Ok(()),
            Err(exception) => {
                debug!(%exception, "checkServerIdentity threw");
                Err(PeerVerificationError::new(exception.message().to_owned()))
            }
        }
    }
}
