//! 通道参数：有序的键值列表，支持扫描与“复制并追加”。
//!
//! 凭证层只消费其中两个键：
//! - [`SSL_TARGET_NAME_OVERRIDE_ARG`]：证书名匹配时用以替代拨号目标的名字（例如按 IP 拨号、按主机名校验）；
//! - [`HTTP2_SCHEME_ARG`]：安全连接器创建成功后追加的协议方案标记。

use std::borrow::Cow;

/// 覆盖证书校验目标名的参数键。
pub const SSL_TARGET_NAME_OVERRIDE_ARG: &str = "spark.ssl_target_name_override";

/// HTTP/2 方案标记参数键。
pub const HTTP2_SCHEME_ARG: &str = "spark.http2_scheme";

/// 参数值。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelArgValue {
    String(String),
    Integer(i64),
    Flag(bool),
}

/// 单个通道参数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelArg {
    key: Cow<'static, str>,
    value: ChannelArgValue,
}

impl ChannelArg {
    pub fn new(key: impl Into<Cow<'static, str>>, value: ChannelArgValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn string(key: impl Into<Cow<'static, str>>, value: impl Into<String>) -> Self {
        Self::new(key, ChannelArgValue::String(value.into()))
    }

    pub fn integer(key: impl Into<Cow<'static, str>>, value: i64) -> Self {
        Self::new(key, ChannelArgValue::Integer(value))
    }

    pub fn flag(key: impl Into<Cow<'static, str>>, value: bool) -> Self {
        Self::new(key, ChannelArgValue::Flag(value))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &ChannelArgValue {
        &self.value
    }

    /// 值为字符串时返回其内容。
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            ChannelArgValue::String(value) => Some(value),
            _ => None,
        }
    }
}

/// 有序通道参数集合。
///
/// # 契约（What）
/// - 键允许重复，查找返回第一个匹配项，保持与插入顺序一致的语义；
/// - [`ChannelArgs::copy_and_add`] 返回新集合，原集合不变，新条目追加在末尾而非替换同名项。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelArgs {
    args: Vec<ChannelArg>,
}

impl ChannelArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一项并返回自身，便于链式构造。
    pub fn with(mut self, arg: ChannelArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelArg> {
        self.args.iter()
    }

    /// 返回键为 `key` 的第一个字符串值；同名但非字符串的条目被跳过。
    pub fn find_string(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .filter(|arg| arg.key() == key)
            .find_map(ChannelArg::as_str)
    }

    /// 复制当前集合并在末尾追加 `extra`。
    pub fn copy_and_add(&self, extra: impl IntoIterator<Item = ChannelArg>) -> Self {
        let mut args = self.args.clone();
        args.extend(extra);
        Self { args }
    }
}

impl FromIterator<ChannelArg> for ChannelArgs {
    fn from_iter<I: IntoIterator<Item = ChannelArg>>(iter: I) -> Self {
        Self {
            args: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ChannelArgs {
    type Item = &'a ChannelArg;
    type IntoIter = std::slice::Iter<'a, ChannelArg>;

    fn into_iter(self) -> Self::IntoIter {
        self.args.iter()
    }
}
