//! Attribute names, OIDs and defaults shared by the engine and its host.

/// The operational attribute holding access control instructions on an entry.
pub const ATTR_ACI: &str = "aci";
/// The attribute of the access control configuration entry holding global ACIs.
pub const ATTR_GLOBAL_ACI: &str = "ds-cfg-global-aci";
pub const ATTR_OBJECTCLASS: &str = "objectclass";
/// Attribute holding referral URLs on a search reference.
pub const ATTR_REF: &str = "ref";

/// geteffectiverights output attributes.
pub const ATTR_ACL_RIGHTS: &str = "aclrights";
pub const ATTR_ACL_RIGHTS_INFO: &str = "aclrightsinfo";

/// The default DN of the access control handler configuration entry.
pub const DEFAULT_ACI_CONFIG_DN: &str = "cn=Access Control Handler,cn=config";

/// The only ACI syntax version accepted.
pub const ACI_VERSION: &str = "3.0";

pub const OID_PROXIED_AUTH_V1: &str = "2.16.840.1.113730.3.4.12";
pub const OID_PROXIED_AUTH_V2: &str = "2.16.840.1.113730.3.4.18";
pub const OID_GET_EFFECTIVE_RIGHTS: &str = "1.3.6.1.4.1.42.2.27.9.5.2";
pub const OID_WHO_AM_I: &str = "1.3.6.1.4.1.4203.1.11.3";
pub const OID_PASSWORD_MODIFY: &str = "1.3.6.1.4.1.4203.1.11.1";

/// The upper bound accepted for an `ssf` bind rule.
pub const MAX_SSF: u32 = 1024;

/// The number of `parent[...]` levels a `userattr` rule may name.
pub const MAX_USERATTR_LEVELS: usize = 10;

/// Nesting limit applied when parsing search filters.
pub const FILTER_DEPTH_MAX: usize = 16;
