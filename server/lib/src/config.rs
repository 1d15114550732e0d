//! Configuration of the access control handler. This mirrors the attributes of the
//! handler's configuration entry: where it lives, which global ACIs apply to the
//! whole server, and schema extensions the engine must know about.
//!
//! ```toml
//! config_dn = "cn=Access Control Handler,cn=config"
//! global_aci = [
//!     '(targetattr="*")(version 3.0; acl "anon read"; allow (read,search,compare) userdn="ldap:///anyone";)',
//! ]
//! operational_attributes = ["ds-cfg-custom"]
//! dn_attributes = ["sponsor"]
//! log_level = "debug"
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use sketching::LogLevel;

use crate::prelude::*;

fn default_config_dn() -> String {
    DEFAULT_ACI_CONFIG_DN.to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AciHandlerConfig {
    /// The DN of the configuration entry. Changes to global ACIs are only
    /// honoured on this entry.
    #[serde(default = "default_config_dn")]
    pub config_dn: String,
    /// ACIs that apply to every entry on the server, held at the root DN.
    #[serde(default)]
    pub global_aci: Vec<String>,
    /// Additional attributes to treat as operational.
    #[serde(default)]
    pub operational_attributes: Vec<String>,
    /// Additional attributes whose values are DNs.
    #[serde(default)]
    pub dn_attributes: Vec<String>,
    pub log_level: Option<LogLevel>,
}

impl Default for AciHandlerConfig {
    fn default() -> Self {
        AciHandlerConfig {
            config_dn: default_config_dn(),
            global_aci: Vec::new(),
            operational_attributes: Vec::new(),
            dn_attributes: Vec::new(),
            log_level: None,
        }
    }
}

impl AciHandlerConfig {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Self, OperationError> {
        let mut f = File::open(config_path.as_ref()).map_err(|e| {
            admin_error!(?e, path = ?config_path.as_ref(), "Unable to open config file");
            OperationError::FsError(e.to_string())
        })?;

        let mut contents = String::new();
        f.read_to_string(&mut contents).map_err(|e| {
            admin_error!(?e, "unable to read contents");
            OperationError::FsError(e.to_string())
        })?;

        Self::from_toml_str(contents.as_str())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, OperationError> {
        toml::from_str(contents).map_err(|e| {
            admin_error!(?e, "unable to parse config");
            OperationError::InvalidConfiguration(e.to_string())
        })
    }

    pub fn config_dn(&self) -> Result<Dn, OperationError> {
        Dn::from_str(&self.config_dn).map_err(|e| {
            admin_error!(?e, config_dn = %self.config_dn, "invalid config_dn");
            OperationError::InvalidConfiguration(format!(
                "config_dn {} is not a valid dn",
                self.config_dn
            ))
        })
    }

    pub fn schema(&self) -> Schema {
        let op: Vec<AttrString> = self
            .operational_attributes
            .iter()
            .map(|a| AttrString::from(a.as_str()))
            .collect();
        let dn: Vec<AttrString> = self
            .dn_attributes
            .iter()
            .map(|a| AttrString::from(a.as_str()))
            .collect();
        Schema::new(&op, &dn)
    }
}
