//! Template Resolver: turns the config skeleton into a datadir-scoped document.
//!
//! Resolution steps:
//!   1. Create the data directory and make its path absolute
//!   2. Replace every `${DATADIR}` occurrence in every string of the template
//!   3. Type-check the fixed section skeleton
//!   4. Inject ethereum endpoint/account, API and P2P ports
//!   5. Development mode: select the `testing` network
//!   6. Check every key-material path is rooted at the data directory
//!
//! The output carries the path the document should be persisted at:
//! `<datadir>/config_<5 lowercase letters>.yaml`. The suffix only avoids
//! collisions between nodes sharing a datadir root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use rand_core::{OsRng, RngCore};
use tracing::{debug, info, warn};

use crate::contracts::ContractLookup;
use crate::document::{ConfigDocument, DEV_NETWORK, KeyType, NetworkSection};
use crate::error::AppError;

pub const DATADIR_PLACEHOLDER: &str = "${DATADIR}";

const SUFFIX_LEN: usize = 5;

/// Parsed but unresolved configuration skeleton.
#[derive(Debug, Clone)]
pub struct Template {
    value: serde_yaml::Value,
}

impl Template {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read template {}: {e}", path.display())))?;
        Self::parse(&raw).map_err(|e| match e {
            AppError::Template(msg) => AppError::Template(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self, AppError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| AppError::Template(format!("parse error: {e}")))?;
        if !value.is_mapping() {
            return Err(AppError::Template("top level must be a mapping".into()));
        }
        Ok(Self { value })
    }
}

/// Ethereum endpoint and signing account injected into every document.
#[derive(Debug, Clone)]
pub struct EthereumDefaults {
    pub node_url: String,
    pub account_key: String,
    pub account_password: String,
}

/// Per-run inputs to [`resolve`].
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub data_dir: PathBuf,
    pub dev_mode: bool,
    pub api_port: u16,
    pub p2p_port: u16,
    /// Passed through verbatim; see [`resolve`].
    pub bootstrap_peers: Option<String>,
    pub ethereum: EthereumDefaults,
}

/// A materialized document and where it belongs.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub document: ConfigDocument,
    /// `<datadir>/config_<suffix>.yaml`
    pub path: PathBuf,
    /// Absolute data directory every key path is rooted at.
    pub data_dir: PathBuf,
}

/// Resolve `template` against `options.data_dir`.
///
/// Bootstrap peers are attached (development mode only) as a single-element
/// list holding the raw flag value. A comma-joined value stays one entry.
pub fn resolve(
    template: &Template,
    options: &ResolveOptions,
    contracts: &dyn ContractLookup,
) -> Result<ResolvedConfig, AppError> {
    validate_node_url(&options.ethereum.node_url)?;

    let data_dir = prepare_data_dir(&options.data_dir)?;
    let data_dir_str = data_dir
        .to_str()
        .ok_or_else(|| AppError::Config(format!("data directory is not valid UTF-8: {}", data_dir.display())))?;

    let mut value = template.value.clone();
    substitute(&mut value, DATADIR_PLACEHOLDER, data_dir_str);
    let mut document = ConfigDocument::from_value(value)?;

    document.ethereum.node_url = options.ethereum.node_url.clone();
    document.ethereum.accounts.main.key = options.ethereum.account_key.clone();
    document.ethereum.accounts.main.password = options.ethereum.account_password.clone();
    document.node_port = options.api_port;
    document.p2p.port = options.p2p_port;

    let peers = options.bootstrap_peers.as_deref().filter(|p| !p.is_empty());
    if options.dev_mode {
        document.centrifuge_network = Some(DEV_NETWORK.to_string());

        let mut network = NetworkSection {
            contract_addresses: contracts.contract_addresses()?,
            ..NetworkSection::default()
        };
        if let Some(peers) = peers {
            network.bootstrap_peers = Some(vec![peers.to_string()]);
        }

        let mut networks = BTreeMap::new();
        if !network.is_empty() {
            networks.insert(DEV_NETWORK.to_string(), network);
        }
        document.networks = Some(networks);
    } else if peers.is_some() {
        warn!("bootstrap peers are only applied in development mode, ignoring them");
    }

    check_paths(&document, &data_dir)?;

    let path = data_dir.join(format!("config_{}.yaml", random_suffix()));
    info!(
        config_path = %path.display(),
        dev_mode = options.dev_mode,
        node_port = options.api_port,
        p2p_port = options.p2p_port,
        "template resolved"
    );

    Ok(ResolvedConfig { document, path, data_dir })
}

/// Check the invariant the Key Provisioner relies on: every key path is
/// placeholder-free, absolute and inside `data_dir`.
pub fn check_paths(document: &ConfigDocument, data_dir: &Path) -> Result<(), AppError> {
    for key_type in KeyType::ALL {
        let paths = document.keys.get(key_type);
        for (field, value) in [("privateKey", &paths.private_key), ("publicKey", &paths.public_key)] {
            check_rooted(&format!("keys.{}.{field}", key_type.section()), value, data_dir)?;
        }
    }
    check_rooted("storage.path", &document.storage.path, data_dir)
}

fn check_rooted(field: &str, value: &str, data_dir: &Path) -> Result<(), AppError> {
    if value.contains("${") {
        return Err(AppError::Config(format!("{field} has an unresolved placeholder: {value}")));
    }
    let path = Path::new(value);
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(AppError::Config(format!("{field} must not contain '..': {value}")));
    }
    if !path.is_absolute() || !path.starts_with(data_dir) {
        return Err(AppError::Config(format!(
            "{field} must be an absolute path under {}: {value}",
            data_dir.display()
        )));
    }
    Ok(())
}

fn prepare_data_dir(data_dir: &Path) -> Result<PathBuf, AppError> {
    fs::create_dir_all(data_dir).map_err(|e| {
        AppError::Config(format!("cannot create data directory {}: {e}", data_dir.display()))
    })?;
    let cwd = std::env::current_dir()
        .map_err(|e| AppError::Config(format!("cannot resolve data directory {}: {e}", data_dir.display())))?;
    let normalized = absolute_data_dir(data_dir, &cwd);
    debug!(data_dir = %normalized.display(), "data directory ready");
    Ok(normalized)
}

/// Anchor a relative `data_dir` at `cwd`. Rebuilding from components drops
/// `.` segments along with trailing and doubled separators. Symlinks are
/// left unresolved.
fn absolute_data_dir(data_dir: &Path, cwd: &Path) -> PathBuf {
    let joined = if data_dir.is_absolute() { data_dir.to_path_buf() } else { cwd.join(data_dir) };
    joined.components().filter(|c| *c != Component::CurDir).collect()
}

fn substitute(value: &mut serde_yaml::Value, placeholder: &str, replacement: &str) {
    match value {
        serde_yaml::Value::String(s) if s.contains(placeholder) => {
            *s = s.replace(placeholder, replacement);
        }
        serde_yaml::Value::Sequence(items) => {
            for item in items {
                substitute(item, placeholder, replacement);
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for v in map.values_mut() {
                substitute(v, placeholder, replacement);
            }
        }
        serde_yaml::Value::Tagged(tagged) => substitute(&mut tagged.value, placeholder, replacement),
        _ => {}
    }
}

fn validate_node_url(raw: &str) -> Result<(), AppError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| AppError::Config(format!("invalid ethereum node URL '{raw}': {e}")))?;
    match parsed.scheme() {
        "ws" | "wss" | "http" | "https" => Ok(()),
        other => Err(AppError::Config(format!(
            "invalid ethereum node URL '{raw}': unsupported scheme '{other}'"
        ))),
    }
}

fn random_suffix() -> String {
    let mut bytes = [0u8; SUFFIX_LEN];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| char::from(b'a' + b % 26)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::NoContracts;
    use crate::document::ContractAddresses;
    use tempfile::TempDir;

    const TPL: &str = r#"
ethereum:
  nodeURL: ""
  accounts:
    main:
      key: ""
      password: ""
keys:
  ethauth:
    privateKey: ${DATADIR}/ethauth.key.pem
    publicKey: ${DATADIR}/ethauth.pub.pem
  signing:
    privateKey: ${DATADIR}/priv.key
    publicKey: ${DATADIR}/signing.pub.pem
  p2p:
    privateKey: ${DATADIR}/p2p.key.pem
    publicKey: ${DATADIR}/p2p.pub.pem
storage:
  path: ${DATADIR}/db/centrifuge_data.leveldb
nodePort: 0
p2p:
  port: 0
notifications:
  endpoint: file://${DATADIR}/hooks
"#;

    struct FixedContracts;

    impl ContractLookup for FixedContracts {
        fn contract_addresses(&self) -> Result<Option<ContractAddresses>, AppError> {
            Ok(Some(ContractAddresses {
                identity_factory: "0x01".into(),
                identity_registry: "0x02".into(),
                anchor_repository: "0x03".into(),
                ..ContractAddresses::default()
            }))
        }
    }

    fn options(data_dir: &Path) -> ResolveOptions {
        ResolveOptions {
            data_dir: data_dir.to_path_buf(),
            dev_mode: false,
            api_port: 8082,
            p2p_port: 38202,
            bootstrap_peers: None,
            ethereum: EthereumDefaults {
                node_url: "ws://127.0.0.1:9546".into(),
                account_key: "{\"address\":\"89b0\"}".into(),
                account_password: String::new(),
            },
        }
    }

    #[test]
    fn datadir_placeholder_is_replaced_everywhere() {
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("node1");
        let resolved = resolve(&Template::parse(TPL).unwrap(), &options(&node), &NoContracts).unwrap();

        let text = resolved.document.to_yaml().unwrap();
        assert!(!text.contains(DATADIR_PLACEHOLDER));
        assert_eq!(
            resolved.document.keys.signing.private_key,
            format!("{}/priv.key", node.display())
        );
        for key_type in KeyType::ALL {
            let paths = resolved.document.keys.get(key_type);
            assert!(Path::new(&paths.private_key).starts_with(&node));
            assert!(Path::new(&paths.public_key).starts_with(&node));
        }
    }

    #[test]
    fn data_dir_is_created() {
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("a").join("b");
        resolve(&Template::parse(TPL).unwrap(), &options(&node), &NoContracts).unwrap();
        assert!(node.is_dir());
    }

    #[test]
    fn config_path_has_random_lowercase_suffix() {
        let tmp = TempDir::new().unwrap();
        let resolved = resolve(&Template::parse(TPL).unwrap(), &options(tmp.path()), &NoContracts).unwrap();
        let name = resolved.path.file_name().unwrap().to_str().unwrap();
        let suffix = name.strip_prefix("config_").and_then(|s| s.strip_suffix(".yaml")).unwrap();
        assert_eq!(suffix.len(), 5);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase()));
        assert_eq!(resolved.path.parent().unwrap(), tmp.path());
    }

    #[test]
    fn resolution_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let tpl = Template::parse(TPL).unwrap();
        let a = resolve(&tpl, &options(tmp.path()), &NoContracts).unwrap();
        let b = resolve(&tpl, &options(tmp.path()), &NoContracts).unwrap();
        assert_eq!(a.document, b.document);
    }

    #[test]
    fn ports_and_ethereum_defaults_injected() {
        let tmp = TempDir::new().unwrap();
        let resolved = resolve(&Template::parse(TPL).unwrap(), &options(tmp.path()), &NoContracts).unwrap();
        let doc = resolved.document;
        assert_eq!(doc.node_port, 8082);
        assert_eq!(doc.p2p.port, 38202);
        assert_eq!(doc.ethereum.node_url, "ws://127.0.0.1:9546");
        assert!(doc.ethereum.accounts.main.key.contains("89b0"));
        assert!(doc.centrifuge_network.is_none());
        assert!(doc.networks.is_none());
        assert!(doc.identity_id.is_none());
    }

    #[test]
    fn dev_mode_without_artifact_leaves_networks_empty() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(tmp.path());
        opts.dev_mode = true;
        let doc = resolve(&Template::parse(TPL).unwrap(), &opts, &NoContracts).unwrap().document;
        assert_eq!(doc.centrifuge_network.as_deref(), Some(DEV_NETWORK));
        assert!(doc.networks.unwrap().is_empty());
    }

    #[test]
    fn dev_mode_attaches_contract_addresses() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(tmp.path());
        opts.dev_mode = true;
        let doc = resolve(&Template::parse(TPL).unwrap(), &opts, &FixedContracts).unwrap().document;
        let networks = doc.networks.unwrap();
        let testing = &networks[DEV_NETWORK];
        assert_eq!(testing.contract_addresses.as_ref().unwrap().anchor_repository, "0x03");
        assert!(testing.bootstrap_peers.is_none());
    }

    #[test]
    fn bootstrap_peers_kept_as_single_literal_entry() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(tmp.path());
        opts.dev_mode = true;
        opts.bootstrap_peers = Some("peerA,peerB".into());
        let doc = resolve(&Template::parse(TPL).unwrap(), &opts, &NoContracts).unwrap().document;
        let networks = doc.networks.unwrap();
        let testing = &networks[DEV_NETWORK];
        assert_eq!(testing.bootstrap_peers, Some(vec!["peerA,peerB".to_string()]));
    }

    #[test]
    fn empty_bootstrap_peers_ignored() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(tmp.path());
        opts.dev_mode = true;
        opts.bootstrap_peers = Some(String::new());
        let doc = resolve(&Template::parse(TPL).unwrap(), &opts, &NoContracts).unwrap().document;
        assert!(doc.networks.unwrap().is_empty());
    }

    #[test]
    fn bootstrap_peers_ignored_outside_dev_mode() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(tmp.path());
        opts.bootstrap_peers = Some("peerA".into());
        let doc = resolve(&Template::parse(TPL).unwrap(), &opts, &NoContracts).unwrap().document;
        assert!(doc.networks.is_none());
    }

    #[test]
    fn unknown_placeholder_in_key_path_rejected() {
        let tmp = TempDir::new().unwrap();
        let tpl = TPL.replace("${DATADIR}/p2p.key.pem", "${KEYDIR}/p2p.key.pem");
        let err = resolve(&Template::parse(&tpl).unwrap(), &options(tmp.path()), &NoContracts).unwrap_err();
        assert!(err.to_string().contains("keys.p2p.privateKey"));
        assert!(err.to_string().contains("unresolved placeholder"));
    }

    #[test]
    fn key_path_outside_data_dir_rejected() {
        let tmp = TempDir::new().unwrap();
        let tpl = TPL.replace("${DATADIR}/ethauth.pub.pem", "/etc/ethauth.pub.pem");
        let err = resolve(&Template::parse(&tpl).unwrap(), &options(tmp.path()), &NoContracts).unwrap_err();
        assert!(err.to_string().contains("keys.ethauth.publicKey"));
    }

    #[test]
    fn key_path_with_parent_dir_rejected() {
        let tmp = TempDir::new().unwrap();
        let tpl = TPL.replace("${DATADIR}/p2p.key.pem", "${DATADIR}/../../escaped.key.pem");
        let err = resolve(&Template::parse(&tpl).unwrap(), &options(&tmp.path().join("node1")), &NoContracts)
            .unwrap_err();
        assert!(err.to_string().contains("keys.p2p.privateKey"));
        assert!(!tmp.path().join("escaped.key.pem").exists());
    }

    #[test]
    fn storage_path_with_parent_dir_rejected() {
        let tmp = TempDir::new().unwrap();
        let tpl = TPL.replace("${DATADIR}/db/centrifuge_data.leveldb", "${DATADIR}/db/../../db");
        let err = resolve(&Template::parse(&tpl).unwrap(), &options(tmp.path()), &NoContracts).unwrap_err();
        assert!(err.to_string().contains("storage.path"));
    }

    #[test]
    fn relative_data_dir_is_anchored_at_cwd() {
        let cwd = Path::new("/srv/nodes");
        assert_eq!(absolute_data_dir(Path::new("default"), cwd), PathBuf::from("/srv/nodes/default"));
        assert_eq!(absolute_data_dir(Path::new("./node1/"), cwd), PathBuf::from("/srv/nodes/node1"));
        assert_eq!(absolute_data_dir(Path::new("/var//node2/"), cwd), PathBuf::from("/var/node2"));
    }

    #[test]
    fn key_paths_carry_the_normalized_data_dir() {
        let tmp = TempDir::new().unwrap();
        let raw = PathBuf::from(format!("{}/./node1/", tmp.path().display()));
        let resolved = resolve(&Template::parse(TPL).unwrap(), &options(&raw), &NoContracts).unwrap();

        let expected = tmp.path().join("node1");
        assert_eq!(resolved.data_dir, expected);
        let private = &resolved.document.keys.p2p.private_key;
        assert_eq!(private, &format!("{}/p2p.key.pem", expected.display()));
        assert!(Path::new(private).is_absolute());
        assert!(!private.contains("/./") && !private.contains("//"));
    }

    #[test]
    fn missing_section_is_a_template_error() {
        let tmp = TempDir::new().unwrap();
        let tpl = TPL.replace("storage:\n  path: ${DATADIR}/db/centrifuge_data.leveldb\n", "");
        let err = resolve(&Template::parse(&tpl).unwrap(), &options(tmp.path()), &NoContracts).unwrap_err();
        assert!(matches!(err, AppError::Template(_)));
    }

    #[test]
    fn malformed_template_rejected() {
        assert!(Template::parse("keys: [unclosed").is_err());
        assert!(Template::parse("- just\n- a list\n").is_err());
    }

    #[test]
    fn missing_template_file_is_a_config_error() {
        let err = Template::load(Path::new("/nonexistent/config.yaml.tpl")).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn bad_node_url_rejected_before_touching_disk() {
        let tmp = TempDir::new().unwrap();
        let node = tmp.path().join("never");
        let mut opts = options(&node);
        opts.ethereum.node_url = "not a url".into();
        assert!(resolve(&Template::parse(TPL).unwrap(), &opts, &NoContracts).is_err());
        assert!(!node.exists());
    }
}
