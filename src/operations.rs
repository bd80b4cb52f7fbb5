//! # Operations
//!
//! A remote action is a namespaced verb such as `NS.GET_ZONE_MASTER`.
//! Arguments are appended with single spaces to form the command string that
//! gets signed; the remote side parses it back out of the token.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const PLESK_NAMESPACE: &str = "PLESK";
pub const NS_NAMESPACE: &str = "NS";
pub const EXECUTOR_NAMESPACE: &str = "EXECUTOR";

/// Immutable `(namespace, verb)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    namespace: String,
    verb: String,
}

impl Operation {
    pub fn new(namespace: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            verb: verb.into(),
        }
    }

    /// Parse `"NAMESPACE.VERB"`, splitting on the first dot
    pub fn parse(name: &str) -> Option<Self> {
        let (namespace, verb) = name.trim().split_once('.')?;
        if namespace.is_empty() || verb.is_empty() || verb.contains(char::is_whitespace) {
            return None;
        }
        Some(Self::new(namespace, verb))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Canonical command string: `"NAMESPACE.VERB arg1 arg2"`
    pub fn with_args<S: AsRef<str>>(&self, args: &[S]) -> String {
        let mut command = self.to_string();
        for arg in args {
            command.push(' ');
            command.push_str(arg.as_ref());
        }
        command
    }

    pub fn plesk_get_login_link() -> Self {
        Self::new(PLESK_NAMESPACE, "GET_LOGIN_LINK")
    }

    pub fn plesk_fetch_subscription_info() -> Self {
        Self::new(PLESK_NAMESPACE, "FETCH_SUBSCRIPTION_INFO")
    }

    pub fn plesk_get_testmail_credentials() -> Self {
        Self::new(PLESK_NAMESPACE, "GET_TESTMAIL_CREDENTIALS")
    }

    pub fn plesk_restart_dns_service() -> Self {
        Self::new(PLESK_NAMESPACE, "RESTART_DNS_SERVICE")
    }

    pub fn plesk_get_subscription_id_by_domain() -> Self {
        Self::new(PLESK_NAMESPACE, "GET_SUBSCRIPTION_ID_BY_DOMAIN")
    }

    pub fn ns_remove_zone() -> Self {
        Self::new(NS_NAMESPACE, "REMOVE_ZONE")
    }

    pub fn ns_get_zone_master() -> Self {
        Self::new(NS_NAMESPACE, "GET_ZONE_MASTER")
    }

    /// Cheap no-op used to keep multiplexed sessions warm
    pub fn executor_status() -> Self {
        Self::new(EXECUTOR_NAMESPACE, "STATUS")
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.verb)
    }
}
