//! 通道凭证生命周期与连接器钩子集成测试。
//!
//! # 教案级导览
//!
//! - **Why**：凭证在构造、组合、连接建立三个阶段分别触碰调用方缓冲区、引用计数与通道参数，
//!   任何一处回归都会表现为悬垂数据、泄漏或参数污染；本文件从公开 API 出发逐一钉住这些契约。
//! - **How**：以 `RecordingFactory` 充当传输层连接器工厂，记录每次创建请求；
//!   以 proptest 生成任意证书材料验证深拷贝独立性。
//! - **What**：
//!   - 构造后改写调用方缓冲区不影响凭证内容；
//!   - 组合/释放 N 次后引用计数回到初值；
//!   - SSL 钩子读取覆盖名并追加方案参数，失败时不产生新参数；
//!   - 组合凭证把自身调用凭证与调用方带来的调用凭证合并后交给基础凭证。

use std::sync::Mutex;

use proptest::prelude::*;
use spark_credentials::{
    AuthMetadataContext, CallCredentials, CallCredentialsError, CallCredentialsPlugin,
    ChannelArg, ChannelArgValue, ChannelArgs, ChannelCredentials, ConnectorError, CredentialError,
    CredentialKind, HTTP2_SCHEME_ARG, Metadata, PemKeyCertPairRef, SSL_TARGET_NAME_OVERRIDE_ARG,
    SecurityConnectorFactory, ServerCredentials, SslChannelConnectorRequest, SslServerConfig,
    VerifyPeerOptions,
};

#[derive(Debug)]
struct StaticToken(&'static str);

impl CallCredentialsPlugin for StaticToken {
    fn credential_type(&self) -> &'static str {
        "static-token"
    }

    fn request_metadata(
        &self,
        _context: &AuthMetadataContext<'_>,
    ) -> Result<Metadata, CallCredentialsError> {
        Ok(vec![("authorization".to_owned(), self.0.to_owned())])
    }
}

/// 单次通道连接器创建请求的快照。
#[derive(Debug, Clone, PartialEq, Eq)]
struct RecordedRequest {
    target: String,
    overridden_target_name: Option<String>,
    verification_name: String,
    call_credential_tokens: Vec<String>,
}

/// 记录请求、可配置为失败的连接器工厂。
#[derive(Default)]
struct RecordingFactory {
    fail_with: Option<ConnectorError>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl RecordingFactory {
    fn failing(error: ConnectorError) -> Self {
        Self {
            fail_with: Some(error),
            requests: Mutex::default(),
        }
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("请求记录锁不应中毒").clone()
    }
}

const CONTEXT: AuthMetadataContext<'static> = AuthMetadataContext {
    service_url: "https://svc.test/pkg.Service",
    method_name: "Call",
};

impl SecurityConnectorFactory for RecordingFactory {
    type ChannelConnector = String;
    type ServerConnector = usize;

    fn create_ssl_channel_connector(
        &self,
        request: SslChannelConnectorRequest<'_>,
    ) -> Result<Self::ChannelConnector, ConnectorError> {
        let call_credential_tokens = request
            .call_credentials
            .map(|call| {
                call.request_metadata(&CONTEXT)
                    .expect("测试插件总是成功")
                    .into_iter()
                    .map(|(_, value)| value)
                    .collect()
            })
            .unwrap_or_default();
        self.requests
            .lock()
            .expect("请求记录锁不应中毒")
            .push(RecordedRequest {
                target: request.target.to_owned(),
                overridden_target_name: request.overridden_target_name.map(str::to_owned),
                verification_name: request.verification_name().to_owned(),
                call_credential_tokens,
            });
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(format!("connector-for-{}", request.verification_name())),
        }
    }

    fn create_ssl_server_connector(
        &self,
        _credentials: &ServerCredentials,
        config: &SslServerConfig,
    ) -> Result<Self::ServerConnector, ConnectorError> {
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(config.key_cert_pairs().len()),
        }
    }
}

fn ssl_credentials() -> ChannelCredentials {
    ChannelCredentials::ssl(Some(b"ROOT"), None, None).expect("SSL 凭证构造成功")
}

proptest! {
    /// 构造返回后改写调用方缓冲区，凭证内容保持构造时的快照。
    #[test]
    fn ssl_config_is_independent_of_caller_buffers(
        root in proptest::collection::vec(any::<u8>(), 1..256),
        key in proptest::collection::vec(any::<u8>(), 1..128),
        chain in proptest::collection::vec(any::<u8>(), 1..256),
    ) {
        let expected_root = root.clone();
        let expected_key = key.clone();
        let expected_chain = chain.clone();

        let mut root_buf = root;
        let mut key_buf = key;
        let mut chain_buf = chain;
        let creds = ChannelCredentials::ssl(
            Some(&root_buf),
            Some(PemKeyCertPairRef::new(&key_buf, &chain_buf)),
            None,
        )
        .expect("完整密钥对应当构造成功");

        root_buf.fill(0);
        key_buf.fill(0);
        chain_buf.fill(0);
        drop((root_buf, key_buf, chain_buf));

        let config = creds.ssl_config().expect("SSL 形态必有配置");
        prop_assert_eq!(config.root_certs().map(|pem| pem.as_bytes()), Some(&expected_root[..]));
        let pair = config.key_cert_pair().expect("密钥对已提供");
        prop_assert_eq!(pair.private_key().as_bytes(), &expected_key[..]);
        prop_assert_eq!(pair.cert_chain().as_bytes(), &expected_chain[..]);
    }

    /// 组合 N 次再逐一释放，基础凭证与调用凭证的引用计数都回到 1。
    #[test]
    fn compose_and_release_restores_ref_counts(rounds in 1usize..32) {
        let base = ssl_credentials();
        let call = CallCredentials::from_plugin(StaticToken("t"));

        let composites: Vec<_> = (0..rounds)
            .map(|_| base.compose(&call).expect("SSL 凭证可组合"))
            .collect();
        prop_assert_eq!(base.ref_count(), rounds + 1);
        prop_assert_eq!(call.ref_count(), rounds + 1);

        for composite in composites {
            composite.release();
        }
        prop_assert_eq!(base.ref_count(), 1);
        prop_assert_eq!(call.ref_count(), 1);
    }
}

#[test]
fn ssl_with_root_pair_and_skip_flag_round_trips() {
    let options = VerifyPeerOptions::new().with_skip_hostname_verification(true);
    let creds = ChannelCredentials::ssl(
        Some(b"R"),
        Some(PemKeyCertPairRef::new(b"K", b"C")),
        Some(options),
    )
    .expect("构造成功");

    assert_eq!(creds.kind(), CredentialKind::Ssl);
    assert_eq!(creds.ref_count(), 1);
    let config = creds.ssl_config().expect("SSL 配置");
    assert_eq!(config.root_certs().map(|pem| pem.as_bytes()), Some(&b"R"[..]));
    let pair = config.key_cert_pair().expect("密钥对");
    assert_eq!(pair.private_key().as_bytes(), b"K");
    assert_eq!(pair.cert_chain().as_bytes(), b"C");
    assert!(config.verify_options().skip_hostname_verification());
    assert!(config.verify_options().peer_verifier().is_none());
}

#[test]
fn ssl_without_any_material_uses_default_verification() {
    let creds = ChannelCredentials::ssl(None, None, None).expect("全部缺省也合法");
    let config = creds.ssl_config().expect("SSL 配置");
    assert!(config.root_certs().is_none());
    assert!(config.key_cert_pair().is_none());
    assert!(!config.verify_options().skip_hostname_verification());
}

#[test]
fn half_key_cert_pair_is_invalid_argument() {
    for pair in [
        PemKeyCertPairRef {
            private_key: Some(b"K"),
            cert_chain: None,
        },
        PemKeyCertPairRef {
            private_key: None,
            cert_chain: Some(b"C"),
        },
    ] {
        let err = ChannelCredentials::ssl(Some(b"R"), Some(pair), None).expect_err("半对必须被拒绝");
        assert!(matches!(err, CredentialError::InvalidArgument(_)));
        assert_eq!(err.code(), "spark.credentials.invalid_argument");
    }
}

#[test]
fn debug_output_never_contains_private_key() {
    let creds = ChannelCredentials::ssl(
        Some(b"ROOT"),
        Some(PemKeyCertPairRef::new(b"TOP-SECRET-KEY", b"CHAIN")),
        None,
    )
    .expect("构造成功");
    let rendered = format!("{creds:?}");
    assert!(!rendered.contains("TOP-SECRET-KEY"), "调试输出泄漏私钥: {rendered}");
    assert!(rendered.contains("redacted"));
}

#[test]
fn insecure_hook_is_plaintext_and_leaves_args_untouched() {
    let factory = RecordingFactory::default();
    let args = ChannelArgs::new().with(ChannelArg::integer("spark.max_frame", 4096));
    let outcome = ChannelCredentials::insecure()
        .create_security_connector(&factory, None, "svc.test:443", &args)
        .expect("非安全钩子总是成功");
    assert!(!outcome.is_secured());
    assert!(outcome.channel_args().is_none());
    assert!(factory.requests().is_empty(), "非安全凭证不得调用工厂");
    assert_eq!(args.len(), 1);
}

#[test]
fn ssl_hook_reads_override_and_appends_scheme() {
    let factory = RecordingFactory::default();
    let creds = ssl_credentials();
    let args = ChannelArgs::new()
        .with(ChannelArg::integer(SSL_TARGET_NAME_OVERRIDE_ARG, 7))
        .with(ChannelArg::string(SSL_TARGET_NAME_OVERRIDE_ARG, "override.test"))
        .with(ChannelArg::flag("spark.keepalive", true));

    let outcome = creds
        .create_security_connector(&factory, None, "svc.test:443", &args)
        .expect("工厂成功");

    assert_eq!(
        outcome.connector().map(String::as_str),
        Some("connector-for-override.test")
    );
    let new_args = outcome.channel_args().expect("安全钩子产出新参数");
    assert_eq!(new_args.len(), args.len() + 1);
    let last = new_args.iter().last().expect("至少一个参数");
    assert_eq!(last.key(), HTTP2_SCHEME_ARG);
    assert_eq!(last.value(), &ChannelArgValue::String("https".to_owned()));
    assert_eq!(args.len(), 3, "输入参数集合保持不变");

    let requests = factory.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target, "svc.test:443");
    assert_eq!(
        requests[0].overridden_target_name.as_deref(),
        Some("override.test"),
        "非字符串的同名参数应被跳过"
    );
    assert_eq!(creds.ref_count(), 1, "钩子不得保留额外引用");
}

#[test]
fn ssl_hook_without_override_verifies_target() {
    let factory = RecordingFactory::default();
    ssl_credentials()
        .create_security_connector(&factory, None, "svc.test:443", &ChannelArgs::new())
        .expect("工厂成功");
    let requests = factory.requests();
    assert_eq!(requests[0].overridden_target_name, None);
    assert_eq!(requests[0].verification_name, "svc.test:443");
}

#[test]
fn ssl_hook_failure_propagates_without_new_args() {
    let factory = RecordingFactory::failing(ConnectorError::new(
        "spark.transport.tls.config_invalid",
        "no usable root certificates",
    ));
    let creds = ssl_credentials();
    let err = creds
        .create_security_connector(&factory, None, "svc.test:443", &ChannelArgs::new())
        .expect_err("工厂失败应透传");
    match &err {
        CredentialError::ConnectorCreation(inner) => {
            assert_eq!(inner.message(), "no usable root certificates");
        }
        other => panic!("意外的错误变体: {other:?}"),
    }
    assert_eq!(err.code(), "spark.transport.tls.config_invalid");
    assert_eq!(creds.ref_count(), 1);
}

#[test]
fn composite_hook_delegates_with_own_call_credentials() {
    let factory = RecordingFactory::default();
    let base = ssl_credentials();
    let own = CallCredentials::from_plugin(StaticToken("own"));
    let composite = base.compose(&own).expect("可组合");
    assert_eq!(composite.kind(), CredentialKind::Composite);

    let outcome = composite
        .create_security_connector(&factory, None, "svc.test:443", &ChannelArgs::new())
        .expect("委托给基础 SSL 凭证");
    assert!(outcome.is_secured());
    assert_eq!(factory.requests()[0].call_credential_tokens, ["own"]);
}

#[test]
fn composite_hook_combines_caller_call_credentials() {
    let factory = RecordingFactory::default();
    let own = CallCredentials::from_plugin(StaticToken("own"));
    let extra = CallCredentials::from_plugin(StaticToken("extra"));
    let composite = ssl_credentials().compose(&own).expect("可组合");

    composite
        .create_security_connector(&factory, Some(&extra), "svc.test:443", &ChannelArgs::new())
        .expect("委托成功");
    assert_eq!(
        factory.requests()[0].call_credential_tokens,
        ["own", "extra"],
        "自身调用凭证在前，调用方调用凭证在后"
    );
    assert_eq!(own.ref_count(), 2, "临时组合在钩子返回后释放");
    assert_eq!(extra.ref_count(), 1);
}

#[test]
fn composite_keeps_children_alive_after_caller_releases() {
    let base = ssl_credentials();
    let call = CallCredentials::from_plugin(StaticToken("t"));
    let composite = base.compose(&call).expect("可组合");
    base.release();
    call.release();

    let inner = composite.without_call_credentials();
    assert_eq!(inner.kind(), CredentialKind::Ssl);
    assert_eq!(inner.ref_count(), 2, "组合凭证与返回值各持一份");
    assert_eq!(
        composite.call_credentials().map(CallCredentials::ref_count),
        Some(1)
    );
}

#[test]
fn composing_a_composite_is_allowed() {
    let first = CallCredentials::from_plugin(StaticToken("a"));
    let second = CallCredentials::from_plugin(StaticToken("b"));
    let layered = ssl_credentials()
        .compose(&first)
        .and_then(|composite| composite.compose(&second))
        .expect("组合凭证不是非安全形态");
    assert_eq!(layered.kind(), CredentialKind::Composite);
}

#[test]
fn server_hook_passes_config_to_factory() {
    let factory = RecordingFactory::default();
    let creds = ServerCredentials::ssl(
        Some(b"CA"),
        &[
            PemKeyCertPairRef::new(b"K1", b"C1"),
            PemKeyCertPairRef::new(b"K2", b"C2"),
        ],
        true,
    )
    .expect("完整证书对");
    let pairs = creds
        .create_security_connector(&factory)
        .expect("工厂成功");
    assert_eq!(pairs, 2);
}
