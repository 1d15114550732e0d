//! The rights vocabulary of an ACI permission, `allow (read, search)`.

use std::fmt;

use crate::prelude::*;

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct Rights: u32 {
        const SEARCH =       0x0001;
        const COMPARE =      0x0002;
        const READ =         0x0004;
        const WRITE =        0x0008;
        const ADD =          0x0010;
        const DELETE =       0x0020;
        const SELF_WRITE =   0x0040;
        const PROXY =        0x0080;
        const IMPORT =       0x0100;
        const EXPORT =       0x0200;
        /// Adding a value within a modify. Implies `WRITE`.
        const WRITE_ADD =    0x0400;
        /// Removing a value within a modify. Implies `WRITE`.
        const WRITE_DELETE = 0x0800;
        const EXT_OP =       0x1000;
        const CONTROL =      0x2000;
        // import, export and proxy are not part of "all".
        const ALL = Self::READ.bits()
            | Self::WRITE.bits()
            | Self::ADD.bits()
            | Self::DELETE.bits()
            | Self::SEARCH.bits()
            | Self::COMPARE.bits()
            | Self::SELF_WRITE.bits();
    }
}

impl Rights {
    /// Decode a single right keyword from a permission's rights list.
    pub fn decode(s: &str) -> Result<Rights, AciError> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(Rights::READ),
            "write" => Ok(Rights::WRITE),
            "add" => Ok(Rights::ADD),
            "delete" => Ok(Rights::DELETE),
            "search" => Ok(Rights::SEARCH),
            "compare" => Ok(Rights::COMPARE),
            "selfwrite" => Ok(Rights::SELF_WRITE),
            "all" => Ok(Rights::ALL),
            "proxy" => Ok(Rights::PROXY),
            "import" => Ok(Rights::IMPORT),
            "export" => Ok(Rights::EXPORT),
            _ => Err(AciError::InvalidRights(s.to_string())),
        }
    }

    /// Decode the comma separated list inside the rights parentheses.
    pub fn decode_list(s: &str) -> Result<Rights, AciError> {
        let mut rights = Rights::empty();
        for r in s.split(',') {
            if r.trim().is_empty() {
                return Err(AciError::InvalidRights(s.to_string()));
            }
            rights |= Rights::decode(r)?;
        }
        Ok(rights)
    }

    /// True if any of `other` is present.
    pub fn has_rights(self, other: Rights) -> bool {
        self.intersects(other)
    }

    /// Name the right being checked, for diagnostics and geteffectiverights
    /// summaries. A write that carries the selfwrite bit is reported as
    /// `selfwrite` rather than `write`.
    pub fn right_to_string(self) -> Option<&'static str> {
        if self.has_rights(Rights::SEARCH) {
            Some("search")
        } else if self.has_rights(Rights::COMPARE) {
            Some("compare")
        } else if self.has_rights(Rights::READ) {
            Some("read")
        } else if self.has_rights(Rights::DELETE) {
            Some("delete")
        } else if self.has_rights(Rights::ADD) {
            Some("add")
        } else if self.contains(Rights::WRITE | Rights::SELF_WRITE) {
            Some("selfwrite")
        } else if self.has_rights(Rights::WRITE) {
            Some("write")
        } else if self.has_rights(Rights::PROXY) {
            Some("proxy")
        } else if self.has_rights(Rights::IMPORT) {
            Some("import")
        } else if self.has_rights(Rights::EXPORT) {
            Some("export")
        } else {
            None
        }
    }
}

impl fmt::Display for Rights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = Vec::with_capacity(8);
        let mut rest = *self;
        if rest.contains(Rights::ALL) {
            names.push("all");
            rest.remove(Rights::ALL);
        }
        for (name, r) in [
            ("read", Rights::READ),
            ("write", Rights::WRITE),
            ("add", Rights::ADD),
            ("delete", Rights::DELETE),
            ("search", Rights::SEARCH),
            ("compare", Rights::COMPARE),
            ("selfwrite", Rights::SELF_WRITE),
            ("proxy", Rights::PROXY),
            ("import", Rights::IMPORT),
            ("export", Rights::EXPORT),
        ] {
            if rest.contains(r) {
                names.push(name);
            }
        }
        f.write_str(&names.join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    Allow,
    Deny,
}

impl AccessType {
    pub fn decode(s: &str) -> Result<Self, AciError> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(AccessType::Allow),
            "deny" => Ok(AccessType::Deny),
            _ => Err(AciError::InvalidPermission(s.to_string())),
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessType::Allow => f.write_str("allow"),
            AccessType::Deny => f.write_str("deny"),
        }
    }
}
