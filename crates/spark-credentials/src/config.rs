//! SSL 凭证配置快照。
//!
//! # 设计背景（Why）
//! - 连接建立阶段才会真正读取证书与私钥，而调用方提供的缓冲区在构造返回后即可能被释放或改写；
//!   因此配置在构造时一次性深拷贝所有材料，此后只读。
//! - 私钥属于敏感材料：独立封装为 [`SecretPem`]，释放时清零，`Debug` 输出只暴露长度。
//!
//! # 契约说明（What）
//! - [`SslConfig`] 构造成功后不可变，可被多个持有者共享；
//! - 私钥与证书链要么同时存在、要么同时缺失，违背时在分配任何副本之前返回
//!   [`CredentialError::InvalidArgument`]；
//! - 构造失败时，传入的校验策略（含桥接回调）在返回前被释放且仅释放一次。

use std::fmt;

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CredentialError, Result};
use crate::verify::VerifyPeerOptions;

/// PEM 证书材料的独占副本。
///
/// 内容按不透明字节处理，本 crate 不解析 PEM。
#[derive(Clone, PartialEq, Eq)]
pub struct PemBuffer(Box<[u8]>);

impl PemBuffer {
    /// 深拷贝调用方提供的字节。
    pub fn copy_from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 返回内容 SHA-256 的前 8 字节十六进制表示，供日志标识证书束而不泄露内容。
    pub fn fingerprint(&self) -> String {
        short_fingerprint(&self.0)
    }
}

impl fmt::Debug for PemBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemBuffer")
            .field("len", &self.0.len())
            .field("sha256", &self.fingerprint())
            .finish()
    }
}

/// 私钥材料的独占副本，释放时清零。
///
/// # 风险提示（Trade-offs）
/// - 清零只覆盖本结构持有的那份副本；调用方自己的缓冲区仍需自行处理；
/// - 刻意不实现 `Clone`，避免密钥在进程内被无意复制。
pub struct SecretPem(Zeroizing<Vec<u8>>);

impl SecretPem {
    pub fn copy_from(bytes: &[u8]) -> Self {
        Self(Zeroizing::new(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretPem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretPem(<redacted {} bytes>)", self.0.len())
    }
}

/// 调用方视角的私钥/证书链对，两半均可缺失。
///
/// 仅作为构造入参存在，经 [`KeyCertPair::from_parts`] 校验后才会转为拥有所有权的 [`KeyCertPair`]。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PemKeyCertPairRef<'a> {
    pub private_key: Option<&'a [u8]>,
    pub cert_chain: Option<&'a [u8]>,
}

impl<'a> PemKeyCertPairRef<'a> {
    /// 以两半均存在的形式构造。
    pub fn new(private_key: &'a [u8], cert_chain: &'a [u8]) -> Self {
        Self {
            private_key: Some(private_key),
            cert_chain: Some(cert_chain),
        }
    }
}

/// 拥有所有权的私钥/证书链对，两半必然同时存在。
pub struct KeyCertPair {
    private_key: SecretPem,
    cert_chain: PemBuffer,
}

impl KeyCertPair {
    /// 校验并深拷贝一对材料。
    ///
    /// # 契约（What）
    /// - 两半都存在：返回 `Ok(Some(pair))`；
    /// - 两半都缺失：返回 `Ok(None)`，等价于未提供密钥对；
    /// - 只有一半：返回 `InvalidArgument`，此时不发生任何拷贝。
    pub fn from_parts(parts: PemKeyCertPairRef<'_>) -> Result<Option<Self>> {
        match (parts.private_key, parts.cert_chain) {
            (Some(private_key), Some(cert_chain)) => Ok(Some(Self {
                private_key: SecretPem::copy_from(private_key),
                cert_chain: PemBuffer::copy_from(cert_chain),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(CredentialError::invalid_argument(
                "private key provided without a certificate chain",
            )),
            (None, Some(_)) => Err(CredentialError::invalid_argument(
                "certificate chain provided without a private key",
            )),
        }
    }

    /// 校验一对必须完整的材料，服务端证书列表使用。
    pub fn from_complete(parts: PemKeyCertPairRef<'_>) -> Result<Self> {
        Self::from_parts(parts)?.ok_or_else(|| {
            CredentialError::invalid_argument("key/cert pair is missing both halves")
        })
    }

    pub fn private_key(&self) -> &SecretPem {
        &self.private_key
    }

    pub fn cert_chain(&self) -> &PemBuffer {
        &self.cert_chain
    }
}

impl fmt::Debug for KeyCertPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCertPair")
            .field("private_key", &self.private_key)
            .field("cert_chain", &self.cert_chain)
            .finish()
    }
}

/// SSL 通道凭证的不可变配置。
///
/// # 字段契约（What）
/// - `root_certs`：可选的信任根证书束；缺失表示交由连接器层决定默认信任源；
/// - `key_cert_pair`：可选的客户端身份（用于 mTLS）；
/// - `verify_options`：对端校验策略，含可选的桥接回调。
///
/// # 生命周期
/// - 由 [`ChannelCredentials`](crate::ChannelCredentials) 独占持有，随最后一个引用释放而销毁；
///   销毁时证书缓冲区被释放、私钥被清零、桥接回调被拆除一次。
#[derive(Debug)]
pub struct SslConfig {
    root_certs: Option<PemBuffer>,
    key_cert_pair: Option<KeyCertPair>,
    verify_options: VerifyPeerOptions,
}

impl SslConfig {
    /// 构建配置快照。
    ///
    /// # 执行步骤（How）
    /// 1. 先校验密钥对形状，失败则直接返回；此时尚未分配任何副本，传入的 `verify_options`
    ///    随函数返回被释放；
    /// 2. 深拷贝密钥对与根证书；
    /// 3. 缺省的校验策略取 [`VerifyPeerOptions::default`]，即不跳过主机名校验、不挂载回调。
    pub fn build(
        root_certs: Option<&[u8]>,
        key_cert_pair: Option<PemKeyCertPairRef<'_>>,
        verify_options: Option<VerifyPeerOptions>,
    ) -> Result<Self> {
        let key_cert_pair = match key_cert_pair {
            Some(parts) => KeyCertPair::from_parts(parts)?,
            None => None,
        };
        Ok(Self {
            root_certs: root_certs.map(PemBuffer::copy_from),
            key_cert_pair,
            verify_options: verify_options.unwrap_or_default(),
        })
    }

    pub fn root_certs(&self) -> Option<&PemBuffer> {
        self.root_certs.as_ref()
    }

    pub fn key_cert_pair(&self) -> Option<&KeyCertPair> {
        self.key_cert_pair.as_ref()
    }

    pub fn verify_options(&self) -> &VerifyPeerOptions {
        &self.verify_options
    }
}

pub(crate) fn short_fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}
