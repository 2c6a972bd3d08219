//! 宿主绑定面校验测试。
//!
//! # 教案级导览
//!
//! - **Why**：绑定面是外部输入进入凭证层的边界，类型错误必须在构造任何核心对象之前被拦截，
//!   且异常类别与消息要与宿主侧既有约定一致。
//! - **How**：直接以 [`HostValue`] 组装参数调用入口函数，断言返回的对象或异常。
//! - **What**：覆盖 Buffer 参数类型、密钥对成对性、选项对象扫描、组合类型检查、
//!   `checkServerIdentity` 回调的参数编组与异常转拒绝。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use spark_credentials::{AuthMetadataContext, CredentialKind, VerifyDecision, VerifyPeerCallback};
use spark_credentials_host::{
    ChannelCredentialsObject, HostException, HostExceptionKind, HostFunction, HostValue,
    HostVerifyCallback, call, channel, server,
};
use tracing_test::traced_test;

fn buffer(bytes: &[u8]) -> HostValue {
    HostValue::Buffer(bytes.to_vec())
}

fn object(entries: Vec<(&str, HostValue)>) -> HostValue {
    HostValue::Object(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect(),
    )
}

fn expect_channel(value: HostValue) -> ChannelCredentialsObject {
    match value {
        HostValue::ChannelCredentials(object) => object,
        other => panic!("期望通道凭证对象，实际为 {}", other.type_name()),
    }
}

fn expect_exception(result: Result<HostValue, HostException>) -> HostException {
    match result {
        Ok(value) => panic!("期望异常，实际返回 {}", value.type_name()),
        Err(exception) => exception,
    }
}

fn token_plugin() -> HostValue {
    call::create_from_plugin(&[HostValue::Function(HostFunction::new(|_args| {
        Ok(object(vec![("authorization", HostValue::String("t".to_owned()))]))
    }))])
    .expect("函数参数合法")
}

#[test]
fn create_ssl_accepts_nullish_and_buffer_arguments() {
    let created = channel::create_ssl(&[
        buffer(b"R"),
        buffer(b"K"),
        buffer(b"C"),
        object(vec![("insecureSkipHostnameVerify", HostValue::Bool(true))]),
    ])
    .map(expect_channel)
    .expect("参数合法");
    let creds = created.wrapped().expect("SSL 对象持有核心凭证");
    let config = creds.ssl_config().expect("SSL 配置");
    assert_eq!(config.root_certs().map(|pem| pem.as_bytes()), Some(&b"R"[..]));
    assert!(config.verify_options().skip_hostname_verification());

    let empty = channel::create_ssl(&[HostValue::Null, HostValue::Undefined])
        .map(expect_channel)
        .expect("全部缺省合法");
    let config = empty.wrapped().and_then(|creds| creds.ssl_config()).expect("SSL 配置");
    assert!(config.root_certs().is_none());
    assert!(config.key_cert_pair().is_none());
}

#[test]
fn non_buffer_arguments_are_type_errors_naming_the_position() {
    let cases = [
        (vec![HostValue::String("R".to_owned())], "first"),
        (vec![HostValue::Null, HostValue::Number(1.0)], "second"),
        (
            vec![HostValue::Null, HostValue::Null, HostValue::Bool(true)],
            "third",
        ),
    ];
    for (args, position) in cases {
        let exception = expect_exception(channel::create_ssl(&args));
        assert_eq!(exception.kind(), HostExceptionKind::TypeError);
        assert!(
            exception.message().contains(position),
            "消息应点名参数位置: {}",
            exception.message()
        );
    }
}

#[test]
fn key_and_cert_must_be_paired() {
    let exception = expect_exception(channel::create_ssl(&[
        HostValue::Null,
        buffer(b"K"),
        HostValue::Undefined,
    ]));
    assert_eq!(exception.kind(), HostExceptionKind::Error);
    assert!(exception.message().contains("provided or omitted together"));
}

#[test]
fn option_values_are_type_checked() {
    let exception = expect_exception(channel::create_ssl(&[
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
        object(vec![("checkServerIdentity", HostValue::Bool(true))]),
    ]));
    assert_eq!(exception.kind(), HostExceptionKind::Error);
    assert_eq!(
        exception.message(),
        "Value of checkServerIdentity must be a function."
    );

    let exception = expect_exception(channel::create_ssl(&[
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
        object(vec![(
            "insecureSkipHostnameVerify",
            HostValue::String("yes".to_owned()),
        )]),
    ]));
    assert_eq!(
        exception.message(),
        "Value of insecureSkipHostnameVerify must be a boolean."
    );
}

#[test]
fn unknown_option_keys_and_non_object_options_are_ignored() {
    let with_unknown = channel::create_ssl(&[
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
        object(vec![("insecureSkipHostnameVerifyy", HostValue::Bool(true))]),
    ])
    .map(expect_channel)
    .expect("未知键不报错");
    let options = with_unknown
        .wrapped()
        .and_then(|creds| creds.ssl_config())
        .map(|config| config.verify_options().skip_hostname_verification());
    assert_eq!(options, Some(false), "拼写错误的键被忽略");

    channel::create_ssl(&[
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
        HostValue::String("not an object".to_owned()),
    ])
    .expect("非对象的第四参数被忽略");
}

#[test]
fn check_server_identity_receives_marshaled_arguments() {
    let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
    let recorder = Arc::clone(&seen);
    let function = HostFunction::new(move |args| {
        let rendered: Vec<String> = args
            .iter()
            .map(|value| match value {
                HostValue::String(text) => text.clone(),
                other => other.type_name().to_owned(),
            })
            .collect();
        recorder.lock().expect("记录锁不应中毒").push(rendered);
        Ok(HostValue::Undefined)
    });
    let created = channel::create_ssl(&[
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
        object(vec![("checkServerIdentity", HostValue::Function(function))]),
    ])
    .map(expect_channel)
    .expect("参数合法");
    let options = created
        .wrapped()
        .and_then(|creds| creds.ssl_config())
        .expect("SSL 配置")
        .verify_options();

    assert_eq!(
        options.verify_peer(Some("host"), Some("cert")),
        VerifyDecision::Accept
    );
    assert_eq!(options.verify_peer(None, None), VerifyDecision::Accept);
    assert_eq!(
        *seen.lock().expect("记录锁不应中毒"),
        [vec!["host", "cert"], vec!["null", "null"]]
    );
}

#[test]
#[traced_test]
fn throwing_check_server_identity_rejects() {
    let function = HostFunction::new(|_args| {
        Err(HostException::error("Hostname/IP does not match certificate's altnames"))
    });
    let created = channel::create_ssl(&[
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
        object(vec![("checkServerIdentity", HostValue::Function(function))]),
    ])
    .map(expect_channel)
    .expect("参数合法");
    let decision = created
        .wrapped()
        .and_then(|creds| creds.ssl_config())
        .expect("SSL 配置")
        .verify_options()
        .verify_peer(Some("evil.test"), Some("cert"));
    assert_eq!(decision, VerifyDecision::Reject);
    assert!(logs_contain("does not match"));
}

#[test]
fn returned_value_of_check_server_identity_is_ignored() {
    let function = HostFunction::new(|_args| Ok(HostValue::Bool(false)));
    let created = channel::create_ssl(&[
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
        object(vec![("checkServerIdentity", HostValue::Function(function))]),
    ])
    .map(expect_channel)
    .expect("参数合法");
    let decision = created
        .wrapped()
        .and_then(|creds| creds.ssl_config())
        .expect("SSL 配置")
        .verify_options()
        .verify_peer(Some("svc.test"), None);
    assert_eq!(decision, VerifyDecision::Accept, "只有抛出异常才视为拒绝");
}

#[test]
fn failed_option_scan_releases_the_host_callback() {
    struct DropProbe(Arc<AtomicUsize>);
    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let drops = Arc::new(AtomicUsize::new(0));
    let probe = DropProbe(Arc::clone(&drops));
    let function = HostFunction::new(move |_args| {
        let _probe = &probe;
        Ok(HostValue::Undefined)
    });
    let args = [
        HostValue::Null,
        HostValue::Null,
        HostValue::Null,
        object(vec![
            ("checkServerIdentity", HostValue::Function(function)),
            ("insecureSkipHostnameVerify", HostValue::Number(1.0)),
        ]),
    ];
    expect_exception(channel::create_ssl(&args));
    assert_eq!(drops.load(Ordering::SeqCst), 0, "参数数组仍持有宿主函数");
    drop(args);
    assert_eq!(drops.load(Ordering::SeqCst), 1, "校验桥不得泄漏宿主函数");
}

#[test]
fn create_insecure_and_compose_rules() {
    let insecure = channel::create_insecure();
    let HostValue::ChannelCredentials(object) = &insecure else {
        panic!("createInsecure 必须返回通道凭证对象");
    };
    assert!(object.is_insecure());

    let plugin = token_plugin();
    let exception = expect_exception(channel::compose(&insecure, &[plugin.clone()]));
    assert_eq!(exception.kind(), HostExceptionKind::TypeError);
    assert_eq!(exception.message(), "Cannot compose insecure credential");

    let ssl = channel::create_ssl(&[]).expect("无参数合法");
    let composite = channel::compose(&ssl, &[plugin.clone()])
        .map(expect_channel)
        .expect("SSL 可组合");
    assert_eq!(
        composite.wrapped().map(|creds| creds.kind()),
        Some(CredentialKind::Composite)
    );

    let exception = expect_exception(channel::compose(&ssl, &[buffer(b"x")]));
    assert_eq!(exception.kind(), HostExceptionKind::TypeError);
    assert!(exception.message().contains("CallCredentials"));

    let exception = expect_exception(channel::compose(&plugin, &[plugin.clone()]));
    assert!(exception.message().contains("ChannelCredentials objects"));
}

#[test]
fn server_create_ssl_validates_pairs() {
    let pair = |key: &[u8], chain: &[u8]| {
        object(vec![("private_key", buffer(key)), ("cert_chain", buffer(chain))])
    };
    let created = server::create_ssl(&[
        buffer(b"CA"),
        HostValue::Array(vec![pair(b"K1", b"C1"), pair(b"K2", b"C2")]),
        HostValue::Bool(true),
    ])
    .expect("参数合法");
    let HostValue::ServerCredentials(object) = created else {
        panic!("期望服务端凭证对象");
    };
    assert_eq!(object.wrapped().config().key_cert_pairs().len(), 2);
    assert!(
        object
            .wrapped()
            .config()
            .client_certificate_request()
            .requires_certificate()
    );

    let exception = expect_exception(server::create_ssl(&[
        HostValue::Null,
        HostValue::Array(vec![object_with_key_only()]),
    ]));
    assert_eq!(exception.kind(), HostExceptionKind::TypeError);
    assert!(exception.message().contains("cert_chain"));

    let exception = expect_exception(server::create_ssl(&[HostValue::Null, HostValue::Null]));
    assert!(exception.message().contains("array"));

    let exception = expect_exception(server::create_ssl(&[
        HostValue::Null,
        HostValue::Array(Vec::new()),
        HostValue::String("true".to_owned()),
    ]));
    assert!(exception.message().contains("boolean"));
}

fn object_with_key_only() -> HostValue {
    object(vec![("private_key", buffer(b"K"))])
}

#[test]
fn plugin_metadata_is_collected_from_host_object() {
    let HostValue::CallCredentials(plugin) = token_plugin() else {
        panic!("期望调用凭证对象");
    };
    let metadata = plugin
        .wrapped()
        .request_metadata(&AuthMetadataContext {
            service_url: "https://svc.test/pkg.Service",
            method_name: "Call",
        })
        .expect("宿主返回字符串对象");
    assert_eq!(metadata, [("authorization".to_owned(), "t".to_owned())]);
}

#[test]
fn host_exception_message_becomes_rejection_reason() {
    let callback = HostVerifyCallback::new(HostFunction::new(|_args| {
        Err(HostException::error("certificate pinned to another key"))
    }));
    let err = callback
        .verify(Some("svc.test"), Some("cert"))
        .expect_err("宿主异常即拒绝");
    assert_eq!(err.reason(), "certificate pinned to another key");
}

#[test]
fn throwing_plugin_reports_host_message() {
    let created = call::create_from_plugin(&[HostValue::Function(HostFunction::new(|_args| {
        Err(HostException::error("token endpoint unreachable"))
    }))])
    .expect("函数参数合法");
    let HostValue::CallCredentials(plugin) = created else {
        panic!("期望调用凭证对象");
    };
    let err = plugin
        .wrapped()
        .request_metadata(&AuthMetadataContext {
            service_url: "https://svc.test/pkg.Service",
            method_name: "Call",
        })
        .expect_err("宿主异常向上传播");
    assert!(err.reason().contains("token endpoint unreachable"));

    let non_object = call::create_from_plugin(&[HostValue::Function(HostFunction::new(|_args| {
        Ok(HostValue::Number(1.0))
    }))])
    .expect("函数参数合法");
    let HostValue::CallCredentials(plugin) = non_object else {
        panic!("期望调用凭证对象");
    };
    let err = plugin
        .wrapped()
        .request_metadata(&AuthMetadataContext {
            service_url: "https://svc.test/pkg.Service",
            method_name: "Call",
        })
        .expect_err("非对象返回值");
    assert!(err.reason().starts_with("metadata generator must return an object"));
}
