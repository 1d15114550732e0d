//! Who is asking, and how they are connected. An [`Identity`] is the authenticated
//! (or anonymous) client of an operation. [`ConnectionInfo`] carries the network
//! and security properties that `ip`, `dns`, `ssf`, `dayofweek` and `timeofday`
//! bind rules are evaluated against.

use std::fmt;
use std::net::IpAddr;

use time::OffsetDateTime;

use crate::prelude::*;

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Privilege: u32 {
        /// Skip access control evaluation entirely.
        const BYPASS_ACL =   0b0000_0001;
        /// Required to add, remove or change `aci` values.
        const MODIFY_ACL =   0b0000_0010;
        /// Required to use the proxied authorization controls.
        const PROXIED_AUTH = 0b0000_0100;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthType {
    Anonymous,
    Simple,
    /// The SASL mechanism name, held uppercased.
    Sasl(AttrString),
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthType::Anonymous => write!(f, "anonymous"),
            AuthType::Simple => write!(f, "simple"),
            AuthType::Sasl(m) => write!(f, "sasl {}", m),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Identity {
    dn: Option<Dn>,
    entry: Option<Arc<Entry>>,
    auth: AuthType,
    client_cert: bool,
    privileges: Privilege,
}

impl Identity {
    pub fn anonymous() -> Self {
        Identity {
            dn: None,
            entry: None,
            auth: AuthType::Anonymous,
            client_cert: false,
            privileges: Privilege::empty(),
        }
    }

    /// An identity bound as `entry`.
    pub fn from_entry(entry: Arc<Entry>, auth: AuthType) -> Self {
        Identity {
            dn: Some(entry.get_dn().clone()),
            entry: Some(entry),
            auth,
            client_cert: false,
            privileges: Privilege::empty(),
        }
    }

    /// An identity bound as `dn` where the host could not supply the entry, for
    /// example the root DN held in configuration.
    pub fn from_dn(dn: Dn, auth: AuthType) -> Self {
        Identity {
            dn: Some(dn),
            entry: None,
            auth,
            client_cert: false,
            privileges: Privilege::empty(),
        }
    }

    pub fn with_privileges(mut self, privileges: Privilege) -> Self {
        self.privileges = privileges;
        self
    }

    pub fn with_client_cert(mut self, client_cert: bool) -> Self {
        self.client_cert = client_cert;
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.dn.is_none()
    }

    pub fn get_dn(&self) -> Option<&Dn> {
        self.dn.as_ref()
    }

    pub fn get_entry(&self) -> Option<&Arc<Entry>> {
        self.entry.as_ref()
    }

    pub fn auth_type(&self) -> &AuthType {
        &self.auth
    }

    pub fn has_client_cert(&self) -> bool {
        self.client_cert
    }

    pub fn has_privilege(&self, p: Privilege) -> bool {
        self.privileges.contains(p)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dn {
            Some(dn) => write!(f, "{} ({})", dn, self.auth),
            None => write!(f, "anonymous"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub remote_addr: Option<IpAddr>,
    /// The resolved hostname of the client, if the host performed a lookup.
    pub hostname: Option<String>,
    /// The security strength factor of the connection.
    pub ssf: u32,
    pub now: OffsetDateTime,
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        ConnectionInfo {
            remote_addr: None,
            hostname: None,
            ssf: 0,
            now: OffsetDateTime::now_utc(),
        }
    }
}

impl ConnectionInfo {
    pub fn new(remote_addr: Option<IpAddr>, ssf: u32) -> Self {
        ConnectionInfo {
            remote_addr,
            ssf,
            ..Default::default()
        }
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = Some(hostname.to_lowercase());
        self
    }

    pub fn with_time(mut self, now: OffsetDateTime) -> Self {
        self.now = now;
        self
    }
}
