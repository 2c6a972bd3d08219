//! `ChannelCredentials` 绑定入口：`createSsl`、`createInsecure` 与 `compose`。
//!
//! # 教案式说明
//! - **意图 (Why)**：宿主传入的参数类型不可信，必须在触碰核心凭证层之前完成形状校验，
//!   校验失败以宿主异常返回，核心层不会产生任何对象。
//! - **契约 (What)**：
//!   - Buffer 参数接受 `Buffer`、`null`、`undefined`，其他类型抛 `TypeError` 并点名参数位置；
//!   - 私钥与证书链必须同时提供或同时省略，否则抛 `Error`；
//!   - 选项对象只识别 `checkServerIdentity` 与 `insecureSkipHostnameVerify`，未知键被忽略；
//!     第四个参数不是对象时整体忽略；
//!   - 非安全凭证对象内部不持有核心凭证，组合时以 `TypeError` 拒绝。
//! - **执行 (How)**：先校验全部参数并组装 [`VerifyPeerOptions`]，再一次性调用核心构造函数；
//!   任何一步失败时已创建的校验桥随返回值一起被释放。

use std::fmt;

use spark_credentials::{ChannelCredentials, PemKeyCertPairRef, VerifyPeerOptions};
use tracing::debug;

use crate::value::{HostException, HostValue, arg, optional_buffer};
use crate::verify::HostVerifyCallback;

const CHECK_SERVER_IDENTITY: &str = "checkServerIdentity";
const INSECURE_SKIP_HOSTNAME_VERIFY: &str = "insecureSkipHostnameVerify";

/// 宿主侧的通道凭证对象。
///
/// `None` 表示非安全凭证，与宿主运行时中“包装空指针”的约定一致。
#[derive(Clone)]
pub struct ChannelCredentialsObject {
    wrapped: Option<ChannelCredentials>,
}

impl ChannelCredentialsObject {
    pub(crate) fn new(wrapped: Option<ChannelCredentials>) -> Self {
        Self { wrapped }
    }

    /// 交给传输层使用的核心凭证；非安全对象为 `None`。
    pub fn wrapped(&self) -> Option<&ChannelCredentials> {
        self.wrapped.as_ref()
    }

    pub fn is_insecure(&self) -> bool {
        self.wrapped.is_none()
    }
}

impl fmt::Debug for ChannelCredentialsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.wrapped {
            Some(credentials) => f
                .debug_tuple("ChannelCredentialsObject")
                .field(credentials)
                .finish(),
            None => f.write_str("ChannelCredentialsObject(insecure)"),
        }
    }
}

/// `ChannelCredentials.createSsl(rootCerts?, privateKey?, certChain?, verifyOptions?)`。
pub fn create_ssl(args: &[HostValue]) -> Result<HostValue, HostException> {
    let root_certs = optional_buffer(
        arg(args, 0),
        "createSsl's first argument must be a Buffer",
    )?;
    let private_key = optional_buffer(
        arg(args, 1),
        "createSsl's second argument must be a Buffer if provided",
    )?;
    let cert_chain = optional_buffer(
        arg(args, 2),
        "createSsl's third argument must be a Buffer if provided",
    )?;
    if private_key.is_some() != cert_chain.is_some() {
        return Err(HostException::error(
            "createSsl's second and third arguments must be provided or omitted together",
        ));
    }

    let verify_options = match arg(args, 3) {
        HostValue::Object(entries) => scan_verify_options(entries)?,
        _ => VerifyPeerOptions::default(),
    };

    let key_cert_pair = private_key.map(|private_key| PemKeyCertPairRef {
        private_key: Some(private_key),
        cert_chain,
    });
    let credentials = ChannelCredentials::ssl(root_certs, key_cert_pair, Some(verify_options))?;
    Ok(HostValue::ChannelCredentials(ChannelCredentialsObject::new(
        Some(credentials),
    )))
}

/// 扫描选项对象的自有属性。
///
/// 同名键以最后一次出现为准；若 `checkServerIdentity` 之后的键校验失败，已创建的校验桥随
/// `options` 一起释放。
fn scan_verify_options(
    entries: &[(String, HostValue)],
) -> Result<VerifyPeerOptions, HostException> {
    let mut options = VerifyPeerOptions::new();
    for (key, value) in entries {
        match key.as_str() {
            CHECK_SERVER_IDENTITY => {
                let HostValue::Function(function) = value else {
                    return Err(HostException::error(
                        "Value of checkServerIdentity must be a function.",
                    ));
                };
                options = options.with_peer_verifier(
                    HostVerifyCallback::new(function.clone()).into_peer_verifier(),
                );
            }
            INSECURE_SKIP_HOSTNAME_VERIFY => {
                let HostValue::Bool(skip) = value else {
                    return Err(HostException::error(
                        "Value of insecureSkipHostnameVerify must be a boolean.",
                    ));
                };
                options = options.with_skip_hostname_verification(*skip);
            }
            unknown => debug!(key = unknown, "ignoring unrecognized verify option"),
        }
    }
    Ok(options)
}

/// `ChannelCredentials.createInsecure()`。
pub fn create_insecure() -> HostValue {
    HostValue::ChannelCredentials(ChannelCredentialsObject::new(None))
}

/// `channelCredentials.compose(callCredentials)`。
///
/// 类型检查全部在核心组合之前完成。
pub fn compose(this: &HostValue, args: &[HostValue]) -> Result<HostValue, HostException> {
    let HostValue::ChannelCredentials(channel) = this else {
        return Err(HostException::type_error(
            "compose can only be called on ChannelCredentials objects",
        ));
    };
    let HostValue::CallCredentials(call) = arg(args, 0) else {
        return Err(HostException::type_error(
            "compose's first argument must be a CallCredentials object",
        ));
    };
    let Some(base) = channel.wrapped() else {
        return Err(HostException::type_error(
            "Cannot compose insecure credential",
        ));
    };
    let composite = base.compose(call.wrapped())?;
    Ok(HostValue::ChannelCredentials(ChannelCredentialsObject::new(
        Some(composite),
    )))
}
