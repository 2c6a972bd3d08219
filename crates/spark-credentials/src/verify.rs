//! 对端校验桥接。
//!
//! # 模块边界（Why）
//! - 握手层在同步回调点询问“是否接受该对端”，而判定逻辑可能来自任意宿主代码；
//!   本模块把宿主回调适配为只会返回 [`VerifyDecision`] 的桥，宿主侧的失败（返回错误或 panic）
//!   一律转换为拒绝，绝不穿越回握手调用栈。
//! - 回调的生命周期由桥独占：桥不可克隆，只能被一个 [`VerifyPeerOptions`] 持有，
//!   因此拆除（释放回调）在所有路径上恰好发生一次。
//!
//! # 并发契约（What）
//! - [`PeerVerifier::invoke`] 只需 `&self`，桥为 `Send + Sync`，可由握手线程池中的任意线程调用；
//! - 拆除需要所有权，借用检查保证它不可能与进行中的 `invoke` 重叠。

use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::{trace, warn};

/// 宿主回调报告的校验失败。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("peer verification failed: {reason}")]
pub struct PeerVerificationError {
    reason: Cow<'static, str>,
}

impl PeerVerificationError {
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// 对端校验回调契约。
///
/// # 契约说明（What）
/// - `server_name` 与 `cert` 各自独立可缺失，缺失以 `None` 表达，与空字符串语义不同；
/// - 返回 `Ok(())` 表示接受，返回 `Err` 表示拒绝；
/// - 实现可以在任意线程被调用，因此要求 `Send + Sync`；
/// - 回调对象被释放即视为拆除，需要清理宿主资源的实现应在 `Drop` 中完成。
pub trait VerifyPeerCallback: Send + Sync {
    fn verify(
        &self,
        server_name: Option<&str>,
        cert: Option<&str>,
    ) -> Result<(), PeerVerificationError>;
}

impl<F> VerifyPeerCallback for F
where
    F: Fn(Option<&str>, Option<&str>) -> Result<(), PeerVerificationError> + Send + Sync,
{
    fn verify(
        &self,
        server_name: Option<&str>,
        cert: Option<&str>,
    ) -> Result<(), PeerVerificationError> {
        self(server_name, cert)
    }
}

/// 握手层可见的校验结论，只有接受与拒绝两种。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerifyDecision {
    Accept,
    Reject,
}

impl VerifyDecision {
    /// 数值视图：接受为 `0`，拒绝为非零。
    pub const fn code(self) -> i32 {
        match self {
            Self::Accept => 0,
            Self::Reject => 1,
        }
    }

    pub const fn is_accept(self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// 包装单个宿主回调的校验桥。
///
/// # 教案式说明
/// - **意图 (Why)**：让宿主逻辑同步参与握手校验，同时把宿主侧的一切失败隔离在桥内。
/// - **执行 (How)**：`invoke` 在 `catch_unwind` 中调用回调，`Err` 与 panic 都映射为
///   [`VerifyDecision::Reject`] 并记录 `warn` 日志；桥被释放时回调随之释放。
/// - **契约 (What)**：不实现 `Clone`；所有权只能转移，不能共享。
pub struct PeerVerifier {
    callback: Box<dyn VerifyPeerCallback>,
}

impl PeerVerifier {
    pub fn new(callback: impl VerifyPeerCallback + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// 同步调用宿主回调并给出结论。
    pub fn invoke(&self, server_name: Option<&str>, cert: Option<&str>) -> VerifyDecision {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.callback.verify(server_name, cert)
        }));
        match outcome {
            Ok(Ok(())) => VerifyDecision::Accept,
            Ok(Err(error)) => {
                warn!(?server_name, %error, "peer verification callback rejected the peer");
                VerifyDecision::Reject
            }
            Err(_) => {
                warn!(
                    ?server_name,
                    "peer verification callback panicked; treating the peer as rejected"
                );
                VerifyDecision::Reject
            }
        }
    }
}

impl Drop for PeerVerifier {
    fn drop(&mut self) {
        trace!("peer verifier torn down");
    }
}

impl fmt::Debug for PeerVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerVerifier").finish_non_exhaustive()
    }
}

/// 对端校验策略。
///
/// # 字段契约（What）
/// - `skip_hostname_verification`：是否跳过证书名与目标名的匹配；
/// - `peer_verifier`：可选的桥接回调。
///
/// 两者独立存储，优先级由连接器层定义，本层不做取舍。
#[derive(Debug, Default)]
pub struct VerifyPeerOptions {
    skip_hostname_verification: bool,
    peer_verifier: Option<PeerVerifier>,
}

impl VerifyPeerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip_hostname_verification(mut self, skip: bool) -> Self {
        self.skip_hostname_verification = skip;
        self
    }

    /// 挂载桥接回调，所有权转移给策略。若此前已挂载，旧桥在此处被拆除。
    pub fn with_peer_verifier(mut self, verifier: PeerVerifier) -> Self {
        self.peer_verifier = Some(verifier);
        self
    }

    pub fn skip_hostname_verification(&self) -> bool {
        self.skip_hostname_verification
    }

    pub fn peer_verifier(&self) -> Option<&PeerVerifier> {
        self.peer_verifier.as_ref()
    }

    /// 执行回调校验；未挂载回调时直接接受。
    pub fn verify_peer(&self, server_name: Option<&str>, cert: Option<&str>) -> VerifyDecision {
        match &self.peer_verifier {
            Some(verifier) => verifier.invoke(server_name, cert),
            None => VerifyDecision::Accept,
        }
    }
}
