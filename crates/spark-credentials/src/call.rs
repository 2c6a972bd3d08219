//! 调用凭证：随每次调用附带的身份断言（如令牌），可与通道凭证组合。
//!
//! # 设计背景（Why）
//! - 调用凭证的具体实现（OAuth 令牌、自定义插件）属于外部协作方，本模块只定义能力集合
//!   [`CallCredentialsPlugin`] 与共享句柄 [`CallCredentials`]；
//! - 组合调用凭证按顺序收集各子凭证的元数据，组合时嵌套的组合凭证会被展开，
//!   使得结构始终只有一层。
//!
//! # 共享语义（What）
//! - 句柄克隆即增加一次引用计数，释放即减少一次；计数归零时插件被释放；
//! - 组合操作只增加子凭证的引用计数，不转移所有权。

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

/// 请求元数据键值对。
pub type Metadata = Vec<(String, String)>;

/// 元数据获取时的调用上下文。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthMetadataContext<'a> {
    pub service_url: &'a str,
    pub method_name: &'a str,
}

/// 调用凭证获取元数据失败。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("call credentials `{credential_type}` failed: {reason}")]
pub struct CallCredentialsError {
    credential_type: &'static str,
    reason: Cow<'static, str>,
}

impl CallCredentialsError {
    pub fn new(credential_type: &'static str, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            credential_type,
            reason: reason.into(),
        }
    }

    pub fn credential_type(&self) -> &'static str {
        self.credential_type
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// 调用凭证插件契约。
///
/// # 契约说明（What）
/// - `credential_type` 返回稳定的类型名，用于日志与诊断；
/// - `request_metadata` 同步返回本次调用需要附带的元数据，失败时返回错误而非 panic。
pub trait CallCredentialsPlugin: Send + Sync + fmt::Debug {
    fn credential_type(&self) -> &'static str;

    fn request_metadata(
        &self,
        context: &AuthMetadataContext<'_>,
    ) -> Result<Metadata, CallCredentialsError>;
}

const COMPOSITE_TYPE: &str = "composite";

enum CallBody {
    Plugin(Box<dyn CallCredentialsPlugin>),
    Composite(Vec<CallCredentials>),
}

struct CallInner {
    body: CallBody,
}

impl Drop for CallInner {
    fn drop(&mut self) {
        let credential_type = match &self.body {
            CallBody::Plugin(plugin) => plugin.credential_type(),
            CallBody::Composite(_) => COMPOSITE_TYPE,
        };
        trace!(credential_type, "call credentials destructed");
    }
}

/// 调用凭证共享句柄。
#[derive(Clone)]
pub struct CallCredentials {
    inner: Arc<CallInner>,
}

impl CallCredentials {
    /// 以宿主插件构造调用凭证，引用计数为 1。
    pub fn from_plugin(plugin: impl CallCredentialsPlugin + 'static) -> Self {
        Self::from_body(CallBody::Plugin(Box::new(plugin)))
    }

    fn from_body(body: CallBody) -> Self {
        Self {
            inner: Arc::new(CallInner { body }),
        }
    }

    /// 组合两个调用凭证。
    ///
    /// # 执行逻辑（How）
    /// - 把 `self` 与 `other` 各自展开为子凭证序列（组合凭证取其子列表，插件凭证取自身），
    ///   按顺序拼接为新的组合凭证；
    /// - 每个子凭证的引用计数加一，输入句柄本身不被消费。
    pub fn compose(&self, other: &CallCredentials) -> CallCredentials {
        let mut children = Vec::new();
        self.expand_into(&mut children);
        other.expand_into(&mut children);
        trace!(children = children.len(), "call credentials composed");
        Self::from_body(CallBody::Composite(children))
    }

    fn expand_into(&self, children: &mut Vec<CallCredentials>) {
        match &self.inner.body {
            CallBody::Composite(inner) => children.extend(inner.iter().cloned()),
            CallBody::Plugin(_) => children.push(self.clone()),
        }
    }

    /// 稳定类型名；组合凭证为 `"composite"`。
    pub fn credential_type(&self) -> &'static str {
        match &self.inner.body {
            CallBody::Plugin(plugin) => plugin.credential_type(),
            CallBody::Composite(_) => COMPOSITE_TYPE,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.inner.body, CallBody::Composite(_))
    }

    /// 组合凭证的子凭证；插件凭证返回空切片。
    pub fn children(&self) -> &[CallCredentials] {
        match &self.inner.body {
            CallBody::Composite(children) => children,
            CallBody::Plugin(_) => &[],
        }
    }

    /// 收集本次调用的元数据。组合凭证按子凭证顺序拼接，遇到首个失败即返回。
    pub fn request_metadata(
        &self,
        context: &AuthMetadataContext<'_>,
    ) -> Result<Metadata, CallCredentialsError> {
        match &self.inner.body {
            CallBody::Plugin(plugin) => plugin.request_metadata(context),
            CallBody::Composite(children) => {
                let mut metadata = Metadata::new();
                for child in children {
                    metadata.extend(child.request_metadata(context)?);
                }
                Ok(metadata)
            }
        }
    }

    /// 当前持有者数量。
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &CallCredentials) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 显式释放一个引用。
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for CallCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallCredentials")
            .field("type", &self.credential_type())
            .field("children", &self.children().len())
            .field("ref_count", &self.ref_count())
            .finish()
    }
}
