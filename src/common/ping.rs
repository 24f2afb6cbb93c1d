use serde::{Deserialize, Serialize};

/// User name the proxy reports when access is open to everyone.
pub const OPEN_USER_NAME: &str = "openbar";

/// User type the proxy reports for an unknown or missing token.
pub const ANONYMOUS_USER_TYPE: &str = "anonymous";

/// The `/info/ping` payload.
///
/// The proxy answers this endpoint even when the token is rejected, in which case
/// `user.user_type` is `anonymous` and `config` may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PingSnapshot {
    /// Whether the proxy could reach the Ollama server behind it.
    #[serde(default)]
    pub ping: bool,
    /// Identity associated with the bearer token.
    #[serde(default)]
    pub user: UserInfo,
    /// Proxy configuration as exposed to the caller.
    #[serde(default)]
    pub config: ProxyConfig,
    #[serde(default)]
    pub proxy_version: String,
    #[serde(default)]
    pub ollama_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_name: String,
    pub user_type: String,
}

impl Default for UserInfo {
    fn default() -> Self {
        Self {
            user_name: ANONYMOUS_USER_TYPE.to_string(),
            user_type: ANONYMOUS_USER_TYPE.to_string(),
        }
    }
}

impl UserInfo {
    /// Is this the identity given to callers without a valid token?
    pub fn is_anonymous(&self) -> bool {
        self.user_type == ANONYMOUS_USER_TYPE
    }

    /// Is this the identity given when the proxy runs without token control?
    pub fn is_open(&self) -> bool {
        self.user_name == OPEN_USER_NAME
    }

    pub fn is_admin(&self) -> bool {
        self.user_type == "admin"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub lan_ip: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub cors_policy: String,
    #[serde(default)]
    pub log_level: String,
    /// Whether the proxy lets anyone in without a token.
    #[serde(default)]
    pub anonymous_access: bool,
}

impl ProxyConfig {
    /// URL other machines on the LAN can use, if the proxy listens on all interfaces.
    pub fn lan_url(&self) -> Option<String> {
        (self.host == "0.0.0.0").then(|| format!("http://{}:{}", self.lan_ip, self.port))
    }
}
