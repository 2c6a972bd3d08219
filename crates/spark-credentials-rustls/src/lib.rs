#![deny(unsafe_code)]
#![doc = r#"
# spark-credentials-rustls

## 设计动机（Why）
- `spark-credentials` 只保存 PEM 快照与校验策略，真正的握手配置由传输实现决定；本 crate 提供基于
  `rustls` 的 [`SecurityConnectorFactory`](spark_credentials::SecurityConnectorFactory) 实现，
  供 TCP/QUIC 传输直接复用。

## 核心契约（What）
- [`RustlsConnectorFactory`]：把 SSL 通道凭证转换为 [`RustlsChannelConnector`]（内含 `ClientConfig`
  与目标名），把服务端凭证转换为 [`RustlsServerConnector`]（内含 `ServerConfig`）；
- 客户端校验顺序：证书链校验 → 主机名校验（策略允许时容忍不匹配）→ 宿主校验回调；
- 失败以 [`codes`] 中的稳定错误码报告。

## 风险与考量（Trade-offs）
- 客户端不回退到系统信任根，未配置根证书即视为配置错误；
- 多对服务端证书按客户端支持的签名方案选择，不做基于 SNI 的选择。
"#]

mod error;
mod factory;
mod pem;
mod verifier;

pub use error::{TlsSetupError, codes};
pub use factory::{RustlsChannelConnector, RustlsConnectorFactory, RustlsServerConnector};
pub use verifier::{CredentialServerVerifier, UnverifiedClientCertVerifier};
