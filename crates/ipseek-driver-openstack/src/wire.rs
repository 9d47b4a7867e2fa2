//! OpenStack API JSON structures
//!
//! Only the fields the driver reads or writes are modelled; everything else
//! in a response is ignored.

use serde::{Deserialize, Serialize};

/// Identity API v3 password-grant token request
///
/// ```json
/// {"auth":{"identity":{"methods":["password"],
///   "password":{"user":{"name":"..","domain":{"name":".."},"password":".."}}}}}
/// ```
#[derive(Serialize)]
pub struct AuthRequest<'a> {
    auth: Auth<'a>,
}

#[derive(Serialize)]
struct Auth<'a> {
    identity: Identity<'a>,
}

#[derive(Serialize)]
struct Identity<'a> {
    methods: [&'static str; 1],
    password: PasswordMethod<'a>,
}

#[derive(Serialize)]
struct PasswordMethod<'a> {
    user: User<'a>,
}

#[derive(Serialize)]
struct User<'a> {
    name: &'a str,
    domain: Domain<'a>,
    password: &'a str,
}

#[derive(Serialize)]
struct Domain<'a> {
    name: &'a str,
}

impl<'a> AuthRequest<'a> {
    /// Build a password-grant request for `user` in `domain`
    pub fn password(user: &'a str, domain: &'a str, password: &'a str) -> Self {
        Self {
            auth: Auth {
                identity: Identity {
                    methods: ["password"],
                    password: PasswordMethod {
                        user: User {
                            name: user,
                            domain: Domain { name: domain },
                            password,
                        },
                    },
                },
            },
        }
    }
}

/// Networking API `ipsec_site_connection` resource body (read and write)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConnectionBody {
    pub ipsec_site_connection: SiteConnection,
}

/// Peer fields of an IPsec site connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConnection {
    #[serde(default)]
    pub peer_address: Option<String>,
    #[serde(default)]
    pub peer_id: Option<String>,
}

impl SiteConnectionBody {
    /// Write payload pointing both peer fields at `address`
    pub fn pointing_at(address: &str) -> Self {
        Self {
            ipsec_site_connection: SiteConnection {
                peer_address: Some(address.to_string()),
                peer_id: Some(address.to_string()),
            },
        }
    }

    /// Whether the connection already points at `address`
    ///
    /// Both the peer address and the peer identifier are compared against
    /// the same value, mirroring the write payload.
    pub fn points_at(&self, address: &str) -> bool {
        let connection = &self.ipsec_site_connection;
        connection.peer_address.as_deref() == Some(address)
            && connection.peer_id.as_deref() == Some(address)
    }
}
