#![deny(unsafe_code)]
#![doc = r#"
# spark-credentials-host

## 设计动机（Why）
- 宿主运行时（脚本语言扩展、插件系统）以动态类型值调用凭证构造函数；本 crate 是核心凭证层
  面向这些调用方的唯一入口，负责在进入核心层之前完成全部形状校验。

## 核心契约（What）
- 宿主值统一建模为 [`HostValue`]，失败统一以 [`HostException`] 返回，类别分为 `TypeError` 与 `Error`；
- [`channel::create_ssl`] / [`channel::create_insecure`] / [`channel::compose`]：通道凭证入口；
- [`call::create_from_plugin`] / [`call::compose`]：调用凭证入口；
- [`server::create_ssl`]：服务端凭证入口；
- `checkServerIdentity` 回调经 [`HostVerifyCallback`] 桥接，抛出异常即拒绝对端。

## 风险与考量（Trade-offs）
- 选项对象中的未知键被静默忽略，拼写错误不会报错；
- 宿主函数在握手线程上同步执行，宿主适配层需自行保证其可跨线程调用。
"#]

pub mod call;
pub mod channel;
mod error;
pub mod server;
pub mod value;
pub mod verify;

pub use call::CallCredentialsObject;
pub use channel::ChannelCredentialsObject;
pub use server::ServerCredentialsObject;
pub use value::{HostException, HostExceptionKind, HostFunction, HostValue};
pub use verify::HostVerifyCallback;
