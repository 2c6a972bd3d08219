#![deny(unsafe_code)]
#![doc = r#"
# spark-credentials

## 设计动机（Why）
- **统一凭证入口**：为传输层提供非安全、SSL 与组合三种通道凭证，以及服务端 SSL 凭证，
  屏蔽各形态在配置、组合与连接器创建上的差异；
- **共享生命周期**：凭证以原子引用计数句柄在通道与调用之间共享，计数归零时清零私钥、
  拆除对端校验桥，且销毁恰好发生一次；
- **宿主校验隔离**：握手期间的对端校验可委托给宿主回调，宿主侧的错误与 panic 一律转换为拒绝。

## 核心契约（What）
- [`ChannelCredentials`]：通道凭证共享句柄，[`ChannelCredentials::create_security_connector`]
  是传输层在连接建立时调用的钩子；
- [`CallCredentials`]：调用凭证句柄，可与通道凭证组合；
- [`ServerCredentials`]：服务端 SSL 凭证；
- [`SecurityConnectorFactory`]：由传输实现注入的连接器工厂；
- [`PeerVerifier`] / [`VerifyPeerOptions`]：对端校验桥与策略；
- 错误统一为 [`CredentialError`]，并暴露稳定的 `spark.credentials.*` 错误码。

## 实现策略（How）
- 构造函数先校验、后深拷贝：任何失败都不会留下半成品，调用方缓冲区在返回后可立即复用；
- 私钥副本存放在 `zeroize` 清零缓冲区中，`Debug` 输出只展示长度与摘要；
- `settings` 特性（默认开启）提供基于 TOML 的文件化配置。

## 风险与考量（Trade-offs）
- 连接器层只接收配置快照，证书内容的语法合法性在握手阶段才会暴露；
- 对端校验回调在握手线程上同步执行，耗时回调会直接拖慢握手。
"#]

pub mod args;
pub mod call;
pub mod channel;
pub mod config;
pub mod connector;
pub mod error;
pub mod server;
#[cfg(feature = "settings")]
pub mod settings;
pub mod verify;

pub use args::{
    ChannelArg, ChannelArgValue, ChannelArgs, HTTP2_SCHEME_ARG, SSL_TARGET_NAME_OVERRIDE_ARG,
};
pub use call::{
    AuthMetadataContext, CallCredentials, CallCredentialsError, CallCredentialsPlugin, Metadata,
};
pub use channel::{ChannelCredentials, CredentialKind};
pub use config::{KeyCertPair, PemBuffer, PemKeyCertPairRef, SecretPem, SslConfig};
pub use connector::{
    ConnectorError, ConnectorOutcome, SecurityConnectorFactory, SslChannelConnectorRequest,
};
pub use error::{CredentialError, Result, SettingsError, codes};
pub use server::{ClientCertificateRequest, ServerCredentials, SslServerConfig};
#[cfg(feature = "settings")]
pub use settings::{ChannelSettings, CredentialsSettings, KeyCertPairPaths, ServerSettings};
pub use verify::{
    PeerVerificationError, PeerVerifier, VerifyDecision, VerifyPeerCallback, VerifyPeerOptions,
};
