//! `CallCredentials` 绑定入口。
//!
//! 宿主插件以函数形式提供：每次调用时以 `(serviceUrl, methodName)` 调用，
//! 返回值须为字符串值的对象，逐个属性转换为元数据。

use std::fmt;

use spark_credentials::{
    AuthMetadataContext, CallCredentials, CallCredentialsError, CallCredentialsPlugin, Metadata,
};

use crate::value::{HostException, HostFunction, HostValue, arg};

const HOST_PLUGIN_TYPE: &str = "host-plugin";

/// 宿主侧的调用凭证对象。
#[derive(Clone)]
pub struct CallCredentialsObject {
    wrapped: CallCredentials,
}

impl CallCredentialsObject {
    pub fn new(wrapped: CallCredentials) -> Self {
        Self { wrapped }
    }

    pub fn wrapped(&self) -> &CallCredentials {
        &self.wrapped
    }
}

impl fmt::Debug for CallCredentialsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallCredentialsObject")
            .field(&self.wrapped)
            .finish()
    }
}

/// 以宿主函数实现的元数据插件。
struct HostMetadataPlugin {
    function: HostFunction,
}

impl fmt::Debug for HostMetadataPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostMetadataPlugin").finish_non_exhaustive()
    }
}

impl CallCredentialsPlugin for HostMetadataPlugin {
    fn credential_type(&self) -> &'static str {
        HOST_PLUGIN_TYPE
    }

    fn request_metadata(
        &self,
        context: &AuthMetadataContext<'_>,
    ) -> Result<Metadata, CallCredentialsError> {
        let args = [
            HostValue::String(context.service_url.to_owned()),
            HostValue::String(context.method_name.to_owned()),
        ];
        let returned = self.function.call(&args).map_err(|exception| {
            CallCredentialsError::new(HOST_PLUGIN_TYPE, exception.to_string())
        })?;
        match returned {
            HostValue::Object(entries) => entries
                .into_iter()
                .map(|(key, value)| match value {
                    HostValue::String(text) => Ok((key, text)),
                    other => Err(CallCredentialsError::new(
                        HOST_PLUGIN_TYPE,
                        format!(
                            "metadata value for `{key}` must be a string, got {}",
                            other.type_name()
                        ),
                    )),
                })
                .collect(),
            other if other.is_nullish() => Ok(Metadata::new()),
            other => Err(CallCredentialsError::new(
                HOST_PLUGIN_TYPE,
                format!(
                    "metadata generator must return an object, got {}",
                    other.type_name()
                ),
            )),
        }
    }
}

/// `CallCredentials.createFromPlugin(generator)`。
pub fn create_from_plugin(args: &[HostValue]) -> Result<HostValue, HostException> {
    let HostValue::Function(function) = arg(args, 0) else {
        return Err(HostException::type_error(
            "createFromPlugin's argument must be a function",
        ));
    };
    let credentials = CallCredentials::from_plugin(HostMetadataPlugin {
        function: function.clone(),
    });
    Ok(HostValue::CallCredentials(CallCredentialsObject::new(
        credentials,
    )))
}

/// `callCredentials.compose(other)`。
pub fn compose(this: &HostValue, args: &[HostValue]) -> Result<HostValue, HostException> {
    let HostValue::CallCredentials(first) = this else {
        return Err(HostException::type_error(
            "compose can only be called on CallCredentials objects",
        ));
    };
    let HostValue::CallCredentials(second) = arg(args, 0) else {
        return Err(HostException::type_error(
            "compose's first argument must be a CallCredentials object",
        ));
    };
    Ok(HostValue::CallCredentials(CallCredentialsObject::new(
        first.wrapped().compose(second.wrapped()),
    )))
}
