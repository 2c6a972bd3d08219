//! 宿主值模型。
//!
//! ### 设计目标（Why）
//! - 绑定面接收的是动态类型的宿主值，校验逻辑需要一个与具体运行时无关的强类型表示；
//!   宿主适配层把自身的值转换为 [`HostValue`]，本 crate 只面向该枚举编写校验。
//!
//! ### 契约定义（What）
//! - `Undefined` 与 `Null` 均表示“未提供”，可选参数对两者一视同仁；
//! - `Object` 以有序键值列表表示，保持宿主侧的属性枚举顺序；
//! - `Function` 为可跨线程调用的宿主可调用对象，失败以 [`HostException`] 表达。

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::call::CallCredentialsObject;
use crate::channel::ChannelCredentialsObject;
use crate::server::ServerCredentialsObject;

/// 宿主异常类别。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostExceptionKind {
    /// 参数类型不符。
    TypeError,
    /// 其余失败。
    Error,
}

impl HostExceptionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TypeError => "TypeError",
            Self::Error => "Error",
        }
    }
}

/// 绑定面抛回宿主的异常。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{}: {message}", .kind.as_str())]
pub struct HostException {
    kind: HostExceptionKind,
    message: String,
}

impl HostException {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self {
            kind: HostExceptionKind::TypeError,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: HostExceptionKind::Error,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> HostExceptionKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

type HostCallable = dyn Fn(&[HostValue]) -> Result<HostValue, HostException> + Send + Sync;

/// 宿主可调用对象。
///
/// 克隆只增加引用，不复制底层闭包。
#[derive(Clone)]
pub struct HostFunction {
    callable: Arc<HostCallable>,
}

impl HostFunction {
    pub fn new<F>(callable: F) -> Self
    where
        F: Fn(&[HostValue]) -> Result<HostValue, HostException> + Send + Sync + 'static,
    {
        Self {
            callable: Arc::new(callable),
        }
    }

    /// 同步调用宿主函数。
    pub fn call(&self, args: &[HostValue]) -> Result<HostValue, HostException> {
        (self.callable)(args)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostFunction(..)")
    }
}

/// 宿主值。
#[derive(Clone, Debug, Default)]
pub enum HostValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Buffer(Vec<u8>),
    Function(HostFunction),
    Object(Vec<(String, HostValue)>),
    Array(Vec<HostValue>),
    ChannelCredentials(ChannelCredentialsObject),
    CallCredentials(CallCredentialsObject),
    ServerCredentials(ServerCredentialsObject),
}

impl HostValue {
    /// `Undefined` 或 `Null`。
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// 宿主侧 `typeof` 风格的类型名，用于诊断。
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Buffer(_) => "Buffer",
            Self::Function(_) => "function",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::ChannelCredentials(_) => "ChannelCredentials",
            Self::CallCredentials(_) => "CallCredentials",
            Self::ServerCredentials(_) => "ServerCredentials",
        }
    }

    /// 按属性名取对象字段；非对象或字段缺失时返回 `None`。
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            Self::Object(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&[u8]> {
        match self {
            Self::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }
}

impl From<Option<&str>> for HostValue {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Self::Null, |text| Self::String(text.to_owned()))
    }
}

/// 按位置取参数，越界视为 `Undefined`。
pub(crate) fn arg(args: &[HostValue], index: usize) -> &HostValue {
    const UNDEFINED: &HostValue = &HostValue::Undefined;
    args.get(index).unwrap_or(UNDEFINED)
}

/// 解析可选 Buffer 参数：缺省为 `None`，Buffer 为 `Some`，其他类型以 `TypeError` 拒绝。
pub(crate) fn optional_buffer<'a>(
    value: &'a HostValue,
    message: &str,
) -> Result<Option<&'a [u8]>, HostException> {
    match value {
        HostValue::Buffer(bytes) => Ok(Some(bytes.as_slice())),
        other if other.is_nullish() => Ok(None),
        _ => Err(HostException::type_error(message)),
    }
}
