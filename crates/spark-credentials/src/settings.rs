//! 文件化凭证配置。
//!
//! ### 设计目标（Why）
//! - 运维侧通常以文件路径描述证书与私钥，而不是在代码里拼装字节；本模块把 TOML 描述转换为
//!   [`ChannelCredentials`]/[`ServerCredentials`]，复用与编程接口完全相同的校验与深拷贝路径。
//!
//! ### 契约说明（What）
//! - 相对路径以配置文件所在目录为基准解析；
//! - 私钥文件读入后存放在清零缓冲区中，构造完成即释放；
//! - 未知字段被拒绝，避免拼写错误静默失效。
//!
//! ```toml
//! [channel]
//! root_certs = "certs/ca.pem"
//! private_key = "certs/client.key"
//! cert_chain = "certs/client.pem"
//! skip_hostname_verification = false
//!
//! [server]
//! root_certs = "certs/ca.pem"
//! client_certificate_request = "require_and_verify"
//!
//! [[server.key_cert_pairs]]
//! private_key = "certs/server.key"
//! cert_chain = "certs/server.pem"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use zeroize::Zeroizing;

use crate::channel::ChannelCredentials;
use crate::config::PemKeyCertPairRef;
use crate::error::{Result, SettingsError};
use crate::server::{ClientCertificateRequest, ServerCredentials};
use crate::verify::{PeerVerifier, VerifyPeerOptions};

/// 凭证配置根节点。
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CredentialsSettings {
    #[serde(default)]
    pub channel: Option<ChannelSettings>,
    #[serde(default)]
    pub server: Option<ServerSettings>,
    /// 相对路径的解析基准；由 [`CredentialsSettings::load`] 填充。
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// 客户端通道凭证描述。
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ChannelSettings {
    #[serde(default)]
    pub insecure: bool,
    pub root_certs: Option<PathBuf>,
    pub private_key: Option<PathBuf>,
    pub cert_chain: Option<PathBuf>,
    #[serde(default)]
    pub skip_hostname_verification: bool,
}

/// 服务端凭证描述。
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    pub root_certs: Option<PathBuf>,
    #[serde(default)]
    pub key_cert_pairs: Vec<KeyCertPairPaths>,
    #[serde(default)]
    pub client_certificate_request: ClientCertificateRequest,
}

/// 一对私钥/证书链文件路径。
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct KeyCertPairPaths {
    pub private_key: PathBuf,
    pub cert_chain: PathBuf,
}

impl CredentialsSettings {
    /// 解析 TOML 文本；相对路径以当前工作目录为基准。
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|error| {
            SettingsError::Parse {
                detail: error.to_string(),
            }
            .into()
        })
    }

    /// 读取并解析配置文件。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::from_toml_str(&source)?;
        settings.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        debug!(path = %path.display(), "credential settings loaded");
        Ok(settings)
    }

    /// 按 `[channel]` 段构造通道凭证；缺少该段时返回非安全凭证。
    pub fn channel_credentials(
        &self,
        peer_verifier: Option<PeerVerifier>,
    ) -> Result<ChannelCredentials> {
        match &self.channel {
            Some(channel) => channel.build(&self.base_dir, peer_verifier),
            None => Ok(ChannelCredentials::insecure()),
        }
    }

    /// 按 `[server]` 段构造服务端凭证；缺少该段时返回 `None`。
    pub fn server_credentials(&self) -> Result<Option<ServerCredentials>> {
        self.server
            .as_ref()
            .map(|server| server.build(&self.base_dir))
            .transpose()
    }
}

impl ChannelSettings {
    /// 读取文件并构造通道凭证。
    pub fn build(
        &self,
        base_dir: &Path,
        peer_verifier: Option<PeerVerifier>,
    ) -> Result<ChannelCredentials> {
        if self.insecure {
            let has_material = self.root_certs.is_some()
                || self.private_key.is_some()
                || self.cert_chain.is_some();
            if has_material || peer_verifier.is_some() {
                return Err(SettingsError::Inconsistent {
                    detail: "insecure channel must not declare certificates or a peer verifier"
                        .into(),
                }
                .into());
            }
            return Ok(ChannelCredentials::insecure());
        }

        let root_certs = self
            .root_certs
            .as_deref()
            .map(|path| read_pem(base_dir, path))
            .transpose()?;
        let private_key = self
            .private_key
            .as_deref()
            .map(|path| read_pem(base_dir, path))
            .transpose()?;
        let cert_chain = self
            .cert_chain
            .as_deref()
            .map(|path| read_pem(base_dir, path))
            .transpose()?;

        let mut verify_options = VerifyPeerOptions::new()
            .with_skip_hostname_verification(self.skip_hostname_verification);
        if let Some(verifier) = peer_verifier {
            verify_options = verify_options.with_peer_verifier(verifier);
        }

        ChannelCredentials::ssl(
            root_certs.as_deref().map(Vec::as_slice),
            Some(PemKeyCertPairRef {
                private_key: private_key.as_deref().map(Vec::as_slice),
                cert_chain: cert_chain.as_deref().map(Vec::as_slice),
            }),
            Some(verify_options),
        )
    }
}

impl ServerSettings {
    /// 读取文件并构造服务端凭证。
    pub fn build(&self, base_dir: &Path) -> Result<ServerCredentials> {
        let root_certs = self
            .root_certs
            .as_deref()
            .map(|path| read_pem(base_dir, path))
            .transpose()?;
        let materials = self
            .key_cert_pairs
            .iter()
            .map(|pair| {
                Ok((
                    read_pem(base_dir, &pair.private_key)?,
                    read_pem(base_dir, &pair.cert_chain)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let pairs: Vec<_> = materials
            .iter()
            .map(|(key, chain)| PemKeyCertPairRef::new(key, chain))
            .collect();
        ServerCredentials::ssl_with_client_auth(
            root_certs.as_deref().map(Vec::as_slice),
            &pairs,
            self.client_certificate_request,
        )
    }
}

fn read_pem(base_dir: &Path, path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    let resolved = if path.is_relative() {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    };
    fs::read(&resolved)
        .map(Zeroizing::new)
        .map_err(|source| {
            SettingsError::Io {
                path: resolved,
                source,
            }
            .into()
        })
}
