//! 通道凭证：非安全、SSL 与组合三种形态的共享句柄。
//!
//! # 设计背景（Why）
//! - 多种凭证形态需要共享同一套释放语义：引用计数落在公共外壳上，形态差异通过对封闭枚举
//!   的匹配分派，而不是继承层次；
//! - 连接建立时传输层调用 [`ChannelCredentials::create_security_connector`]，由当前形态决定
//!   是否创建安全连接器、如何改写通道参数。
//!
//! # 生命周期契约（What）
//! - 构造成功返回的句柄引用计数为 1；克隆即共享（+1），[`ChannelCredentials::release`] 或 drop 即释放（-1）；
//! - 计数归零时先运行形态对应的销毁逻辑（SSL：释放配置缓冲区、清零私钥、拆除校验桥；
//!   组合：释放对子凭证的引用），随后释放外壳本身；销毁最多运行一次；
//! - 构造后除引用计数外不可变，因此跨线程共享无需加锁。

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::args::{ChannelArg, ChannelArgs, HTTP2_SCHEME_ARG, SSL_TARGET_NAME_OVERRIDE_ARG};
use crate::call::CallCredentials;
use crate::config::{PemKeyCertPairRef, SslConfig};
use crate::connector::{ConnectorOutcome, SecurityConnectorFactory, SslChannelConnectorRequest};
use crate::error::{CredentialError, Result};
use crate::verify::VerifyPeerOptions;

/// 凭证形态判别值。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    Insecure,
    Ssl,
    Composite,
}

impl CredentialKind {
    /// 稳定的形态名，用于日志与诊断。
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insecure => "insecure",
            Self::Ssl => "ssl",
            Self::Composite => "composite",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum CredentialBody {
    Insecure,
    Ssl(SslConfig),
    Composite {
        base: ChannelCredentials,
        call: CallCredentials,
    },
}

impl CredentialBody {
    fn kind(&self) -> CredentialKind {
        match self {
            Self::Insecure => CredentialKind::Insecure,
            Self::Ssl(_) => CredentialKind::Ssl,
            Self::Composite { .. } => CredentialKind::Composite,
        }
    }
}

struct CredentialInner {
    body: CredentialBody,
}

impl Drop for CredentialInner {
    fn drop(&mut self) {
        // 字段在此之后按声明顺序析构：SSL 配置或组合子凭证随之释放。
        trace!(kind = %self.body.kind(), "channel credentials destructed");
    }
}

/// 通道凭证共享句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：为传输层提供统一的“凭证”对象，屏蔽非安全/SSL/组合三种形态的差异。
/// - **契约 (What)**：
///   - 所有构造函数要么返回引用计数为 1 的完整对象，要么返回错误，不存在半成品；
///   - 句柄为 `Send + Sync`，引用计数为原子操作，可在任意线程释放；
///   - 组合凭证对两个子凭证各持有一个引用，其生命周期至少与组合凭证一样长。
/// - **执行逻辑 (How)**：内部为 `Arc<CredentialInner>`，销毁逻辑挂在 `CredentialInner` 的析构上。
#[derive(Clone)]
pub struct ChannelCredentials {
    inner: Arc<CredentialInner>,
}

impl ChannelCredentials {
    fn from_body(body: CredentialBody) -> Self {
        Self {
            inner: Arc::new(CredentialInner { body }),
        }
    }

    /// 非安全凭证：无配置，连接器钩子为空操作。总是成功。
    pub fn insecure() -> Self {
        Self::from_body(CredentialBody::Insecure)
    }

    /// 构造 SSL 凭证。
    ///
    /// # 契约（What）
    /// - **参数**：`root_certs` 信任根；`key_cert_pair` 可选的客户端身份，两半须同时存在或同时缺失；
    ///   `verify_options` 对端校验策略，所有权转移给凭证。
    /// - **返回值**：成功时引用计数为 1 的 SSL 凭证，所有缓冲区均为独立副本；
    /// - **错误**：密钥对只有一半时返回 `InvalidArgument`，此时 `verify_options` 中的校验桥已被拆除。
    pub fn ssl(
        root_certs: Option<&[u8]>,
        key_cert_pair: Option<PemKeyCertPairRef<'_>>,
        verify_options: Option<VerifyPeerOptions>,
    ) -> Result<Self> {
        debug!(
            root_certs = root_certs.map(<[u8]>::len),
            key_cert_pair = key_cert_pair.is_some(),
            verify_options = verify_options.is_some(),
            "creating ssl channel credentials"
        );
        let config = SslConfig::build(root_certs, key_cert_pair, verify_options)?;
        Ok(Self::from_ssl_config(config))
    }

    /// 以已构建的配置包装为 SSL 凭证。
    pub fn from_ssl_config(config: SslConfig) -> Self {
        Self::from_body(CredentialBody::Ssl(config))
    }

    /// 在当前通道凭证上组合调用凭证。
    ///
    /// # 契约（What）
    /// - 当前凭证为非安全形态时返回 `InvalidState`，不发生任何引用计数变化；
    /// - 成功时返回新的组合凭证，`self` 与 `call` 的引用计数各加一（共享而非转移）。
    pub fn compose(&self, call: &CallCredentials) -> Result<Self> {
        if self.kind() == CredentialKind::Insecure {
            return Err(CredentialError::invalid_state(
                "cannot compose insecure credential",
            ));
        }
        debug!(
            base = %self.kind(),
            call = call.credential_type(),
            "composing channel credentials"
        );
        Ok(Self::from_body(CredentialBody::Composite {
            base: self.clone(),
            call: call.clone(),
        }))
    }

    pub fn kind(&self) -> CredentialKind {
        self.inner.body.kind()
    }

    pub fn is_insecure(&self) -> bool {
        self.kind() == CredentialKind::Insecure
    }

    /// SSL 形态的配置；其他形态返回 `None`。
    pub fn ssl_config(&self) -> Option<&SslConfig> {
        match &self.inner.body {
            CredentialBody::Ssl(config) => Some(config),
            _ => None,
        }
    }

    /// 组合形态附带的调用凭证。
    pub fn call_credentials(&self) -> Option<&CallCredentials> {
        match &self.inner.body {
            CredentialBody::Composite { call, .. } => Some(call),
            _ => None,
        }
    }

    /// 去除调用凭证后的通道凭证：组合形态返回其基础凭证的新引用，其他形态返回自身的新引用。
    pub fn without_call_credentials(&self) -> ChannelCredentials {
        match &self.inner.body {
            CredentialBody::Composite { base, .. } => base.clone(),
            _ => self.clone(),
        }
    }

    /// 当前持有者数量。
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &ChannelCredentials) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 显式释放一个引用；若为最后一个引用则触发销毁。
    pub fn release(self) {
        trace!(
            kind = %self.kind(),
            remaining = self.ref_count() - 1,
            "releasing channel credentials"
        );
        drop(self);
    }

    /// 连接建立时由传输层调用的连接器创建钩子。
    ///
    /// # 执行逻辑（How）
    /// - **非安全**：返回 [`ConnectorOutcome::Plaintext`]，不触碰通道参数；
    /// - **SSL**：扫描 `args` 中的目标名覆盖项，连同 `target` 交给工厂；成功后在参数末尾追加
    ///   `HTTP2_SCHEME_ARG = "https"`；失败时原样透传工厂错误，不构造新参数；
    /// - **组合**：若调用方另带调用凭证，先与自身调用凭证组合，再委托给基础凭证。
    pub fn create_security_connector<F>(
        &self,
        factory: &F,
        call_credentials: Option<&CallCredentials>,
        target: &str,
        args: &ChannelArgs,
    ) -> Result<ConnectorOutcome<F::ChannelConnector>>
    where
        F: SecurityConnectorFactory + ?Sized,
    {
        match &self.inner.body {
            CredentialBody::Insecure => Ok(ConnectorOutcome::Plaintext),
            CredentialBody::Ssl(config) => {
                self.ssl_create_security_connector(factory, config, call_credentials, target, args)
            }
            CredentialBody::Composite { base, call } => match call_credentials {
                Some(extra) => {
                    let combined = call.compose(extra);
                    base.create_security_connector(factory, Some(&combined), target, args)
                }
                None => base.create_security_connector(factory, Some(call), target, args),
            },
        }
    }

    fn ssl_create_security_connector<F>(
        &self,
        factory: &F,
        config: &SslConfig,
        call_credentials: Option<&CallCredentials>,
        target: &str,
        args: &ChannelArgs,
    ) -> Result<ConnectorOutcome<F::ChannelConnector>>
    where
        F: SecurityConnectorFactory + ?Sized,
    {
        let overridden_target_name = args.find_string(SSL_TARGET_NAME_OVERRIDE_ARG);
        debug!(
            dial_target = target,
            ?overridden_target_name,
            call_credentials = call_credentials.map(CallCredentials::credential_type),
            "creating ssl channel security connector"
        );
        let connector = factory.create_ssl_channel_connector(SslChannelConnectorRequest {
            credentials: self,
            call_credentials,
            config,
            target,
            overridden_target_name,
        })?;
        let channel_args = args.copy_and_add([ChannelArg::string(HTTP2_SCHEME_ARG, "https")]);
        Ok(ConnectorOutcome::Secured {
            connector,
            channel_args,
        })
    }
}

impl From<SslConfig> for ChannelCredentials {
    fn from(config: SslConfig) -> Self {
        Self::from_ssl_config(config)
    }
}

impl fmt::Debug for ChannelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ChannelCredentials");
        debug
            .field("kind", &self.kind())
            .field("ref_count", &self.ref_count());
        match &self.inner.body {
            CredentialBody::Insecure => {}
            CredentialBody::Ssl(config) => {
                debug.field("config", config);
            }
            CredentialBody::Composite { base, call } => {
                debug.field("base", base).field("call", call);
            }
        }
        debug.finish()
    }
}
