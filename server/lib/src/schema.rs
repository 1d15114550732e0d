//! The slice of directory schema the access control engine needs. ACI evaluation
//! only has to know which attributes are operational, which hold DN values (for
//! selfwrite and `userattr`), and how to validate attribute names and OIDs that
//! appear in ACI text. Everything else about schema belongs to the host.

use hashbrown::HashSet;
use regex::Regex;

use crate::prelude::*;

lazy_static! {
    static ref ATTR_NAME_RE: Regex = {
        #[allow(clippy::expect_used)]
        Regex::new("^([A-Za-z][A-Za-z0-9-]*|[0-9]+(\\.[0-9]+)+)$")
            .expect("Invalid attribute name regex found")
    };
    static ref ATTR_OPTION_RE: Regex = {
        #[allow(clippy::expect_used)]
        Regex::new("^[A-Za-z0-9-]+$").expect("Invalid attribute option regex found")
    };
    static ref OID_RE: Regex = {
        #[allow(clippy::expect_used)]
        Regex::new("^[0-9]+(\\.[0-9]+)*$").expect("Invalid oid regex found")
    };
}

/// Operational attributes known to every server. Configuration may add more.
const DEFAULT_OPERATIONAL: &[&str] = &[
    ATTR_ACI,
    "createtimestamp",
    "creatorsname",
    "modifytimestamp",
    "modifiersname",
    "entrydn",
    "entryuuid",
    "hassubordinates",
    "numsubordinates",
    "subschemasubentry",
    "structuralobjectclass",
    "ismemberof",
    "pwdchangedtime",
    "pwdaccountlockedtime",
    "pwdfailuretime",
    "pwdhistory",
    "ds-pwp-account-disabled",
    "ds-privilege-name",
    "ds-sync-hist",
    ATTR_ACL_RIGHTS,
    ATTR_ACL_RIGHTS_INFO,
];

/// Attributes whose values are DNs. Configuration may add more.
const DEFAULT_DN_SYNTAX: &[&str] = &[
    "member",
    "uniquemember",
    "owner",
    "manager",
    "secretary",
    "seealso",
    "roleoccupant",
    "creatorsname",
    "modifiersname",
    "entrydn",
    "ismemberof",
    "distinguishedname",
    "aliasedobjectname",
];

#[derive(Debug, Clone)]
pub struct Schema {
    operational: HashSet<AttrString>,
    dn_syntax: HashSet<AttrString>,
}

impl Default for Schema {
    fn default() -> Self {
        Schema::new(&[], &[])
    }
}

impl Schema {
    /// Build the schema view from the defaults plus any configured extensions.
    pub fn new(operational: &[AttrString], dn_syntax: &[AttrString]) -> Self {
        let operational = DEFAULT_OPERATIONAL
            .iter()
            .map(|a| AttrString::from(*a))
            .chain(operational.iter().map(|a| AttrString::from(a.to_lowercase())))
            .collect();
        let dn_syntax = DEFAULT_DN_SYNTAX
            .iter()
            .map(|a| AttrString::from(*a))
            .chain(dn_syntax.iter().map(|a| AttrString::from(a.to_lowercase())))
            .collect();
        Schema {
            operational,
            dn_syntax,
        }
    }

    pub fn is_operational(&self, attr: &str) -> bool {
        self.operational
            .contains(base_attr_type(attr).to_lowercase().as_str())
    }

    pub fn is_dn_syntax(&self, attr: &str) -> bool {
        self.dn_syntax
            .contains(base_attr_type(attr).to_lowercase().as_str())
    }
}

/// Strip any options from an attribute description, so `cn;lang-en` becomes `cn`.
pub fn base_attr_type(attr: &str) -> &str {
    attr.split(';').next().unwrap_or(attr)
}

/// An attribute type name or numeric OID, with no options.
pub fn is_valid_attr_name(attr: &str) -> bool {
    ATTR_NAME_RE.is_match(attr)
}

/// An attribute type optionally followed by `;option` segments.
pub fn is_valid_attr_description(attr: &str) -> bool {
    let mut parts = attr.split(';');
    match parts.next() {
        Some(name) if is_valid_attr_name(name) => parts.all(|o| ATTR_OPTION_RE.is_match(o)),
        _ => false,
    }
}

pub fn is_valid_oid(oid: &str) -> bool {
    OID_RE.is_match(oid)
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use crate::schema::{
        base_attr_type, is_valid_attr_description, is_valid_attr_name, is_valid_oid,
    };

    #[test]
    fn test_schema_classification() {
        let schema = Schema::new(&[AttrString::from("ds-Custom-Op")], &[]);
        assert!(schema.is_operational("aci"));
        assert!(schema.is_operational("modifyTimestamp"));
        assert!(schema.is_operational("ds-custom-op"));
        assert!(!schema.is_operational("cn"));
        assert!(schema.is_dn_syntax("uniqueMember"));
        assert!(schema.is_dn_syntax("member;binary"));
        assert!(!schema.is_dn_syntax("mail"));
    }

    #[test]
    fn test_schema_name_validation() {
        assert!(is_valid_attr_name("cn"));
        assert!(is_valid_attr_name("ds-cfg-global-aci"));
        assert!(is_valid_attr_name("2.5.4.3"));
        assert!(!is_valid_attr_name("cn;lang-en"));
        assert!(!is_valid_attr_name("1cn"));
        assert!(!is_valid_attr_name(""));
        assert!(!is_valid_attr_name("c n"));

        assert!(is_valid_attr_description("cn;lang-en"));
        assert!(!is_valid_attr_description("cn;"));
        assert_eq!(base_attr_type("cn;lang-en"), "cn");

        assert!(is_valid_oid("1.3.6.1.4.1.42.2.27.9.5.2"));
        assert!(is_valid_oid("5"));
        assert!(!is_valid_oid("1..2"));
        assert!(!is_valid_oid("abc"));
    }
}
