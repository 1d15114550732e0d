use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to decode an access control instruction. Each variant carries the
/// offending fragment so the host can report it against the entry it came from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Error)]
#[serde(rename_all = "lowercase")]
pub enum AciError {
    #[error("the value \"{0}\" does not follow the ACI syntax")]
    InvalidSyntax(String),
    #[error("the ACI version \"{0}\" is not supported, only 3.0 is accepted")]
    InvalidVersion(String),
    #[error("\"{0}\" is not a valid target keyword")]
    InvalidTargetKeyword(String),
    #[error("the target keyword \"{0}\" appears more than once")]
    DuplicateTargetKeyword(String),
    #[error("the operator \"{operator}\" may not be used with the target keyword \"{keyword}\"")]
    InvalidTargetOperator { keyword: String, operator: String },
    #[error("the target \"{0}\" is not a valid LDAP URL naming a DN")]
    InvalidTarget(String),
    #[error("the target \"{target}\" is not a descendant of the ACI entry \"{aci_dn}\"")]
    TargetNotDescendant { target: String, aci_dn: String },
    #[error("the targetattr expression \"{0}\" is not valid")]
    InvalidTargetAttr(String),
    #[error("the targetfilter \"{0}\" is not a valid search filter")]
    InvalidTargetFilter(String),
    #[error("the targattrfilters expression \"{0}\" is not valid: {1}")]
    InvalidTargAttrFilters(String, String),
    #[error("\"{0}\" is not a valid targetscope")]
    InvalidTargetScope(String),
    #[error("\"{0}\" is not a valid OID")]
    InvalidOid(String),
    #[error("the permission \"{0}\" is not valid, expected allow or deny")]
    InvalidPermission(String),
    #[error("the rights list \"{0}\" is not valid")]
    InvalidRights(String),
    #[error("the bind rule \"{0}\" is not valid")]
    InvalidBindRule(String),
    #[error("\"{0}\" is not a valid bind rule keyword")]
    InvalidBindRuleKeyword(String),
    #[error("the operator \"{operator}\" may not be used with the bind rule keyword \"{keyword}\"")]
    InvalidBindRuleOperator { keyword: String, operator: String },
    #[error("the roledn keyword in \"{0}\" is not supported")]
    UnsupportedRoleDn(String),
    #[error("the userdn expression \"{0}\" is not valid")]
    InvalidUserDn(String),
    #[error("the groupdn expression \"{0}\" is not valid")]
    InvalidGroupDn(String),
    #[error("the ip expression \"{0}\" is not valid")]
    InvalidIp(String),
    #[error("the dns expression \"{0}\" is not valid")]
    InvalidDns(String),
    #[error("the dayofweek expression \"{0}\" is not valid")]
    InvalidDayOfWeek(String),
    #[error("the timeofday expression \"{0}\" is not valid, expected HHMM between 0000 and 2359")]
    InvalidTimeOfDay(String),
    #[error("the authmethod expression \"{0}\" is not valid")]
    InvalidAuthMethod(String),
    #[error("the ssf expression \"{0}\" is not valid, expected an integer between 0 and 1024")]
    InvalidSsf(String),
    #[error("the userattr expression \"{0}\" is not valid")]
    InvalidUserAttr(String),
}

/* ===== errors ===== */
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationError {
    InvalidDnSyntax(String),
    FilterParseError(String),
    InvalidLdapUrl(String),
    InvalidAttributeSyntax(String),
    AciDecode(AciError),
    InsufficientAccessRights,
    MissingPrivilege(String),
    NoSuchEntry(String),
    InternalSearch(String),
    GroupResolution(String),
    InvalidConfiguration(String),
    FsError(String),
}

impl From<AciError> for OperationError {
    fn from(e: AciError) -> Self {
        OperationError::AciDecode(e)
    }
}

impl Display for OperationError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let variant = format!("{:?}", self);
        let mut output = variant
            .split('(')
            .next()
            .unwrap_or_default()
            .to_string();

        if let Some(msg) = self.message() {
            output += &format!(" - {}", msg);
        };
        f.write_str(&output)
    }
}

impl std::error::Error for OperationError {}

impl OperationError {
    /// Return the message associated with the error if there is one.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::InsufficientAccessRights => None,
            Self::InvalidDnSyntax(s)
            | Self::FilterParseError(s)
            | Self::InvalidLdapUrl(s)
            | Self::InvalidAttributeSyntax(s)
            | Self::NoSuchEntry(s)
            | Self::InternalSearch(s)
            | Self::GroupResolution(s)
            | Self::InvalidConfiguration(s)
            | Self::FsError(s) => Some(s.clone()),
            Self::MissingPrivilege(p) => Some(format!("the {} privilege is required", p)),
            Self::AciDecode(e) => Some(e.to_string()),
        }
    }
}
