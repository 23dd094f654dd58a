//! Client identities: player client hint, user agent and proxy per attempt.

use rand::seq::SliceRandom;

use crate::config::YtdlpConfig;

/// Used when no user-agent pool is configured.
pub const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Request parameters for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Rotation override; `None` means the configured default client.
    pub player_client: Option<String>,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
}

/// User-agent and proxy pools sampled at random for every attempt.
#[derive(Debug, Clone, Default)]
pub struct IdentityPool {
    user_agents: Vec<String>,
    proxies: Vec<String>,
}

fn clean(items: impl IntoIterator<Item = String>) -> Vec<String> {
    items
        .into_iter()
        .flat_map(|s| s.split(',').map(|p| p.trim().to_string()).collect::<Vec<_>>())
        .filter(|s| !s.is_empty())
        .collect()
}

impl IdentityPool {
    /// Proxy entries may themselves be comma-separated lists. User agents
    /// are only trimmed, since real ones contain commas.
    pub fn new(user_agents: Vec<String>, proxies: Vec<String>) -> Self {
        Self {
            user_agents: user_agents
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            proxies: clean(proxies),
        }
    }

    pub fn from_config(cfg: &YtdlpConfig) -> Self {
        Self::new(cfg.user_agents.clone(), cfg.proxies.clone())
    }

    /// Build the identity for one attempt.
    pub fn identity(&self, player_client: Option<String>) -> ClientIdentity {
        let mut rng = rand::thread_rng();
        let user_agent = self
            .user_agents
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string());
        let proxy = self.proxies.choose(&mut rng).cloned();
        ClientIdentity {
            player_client,
            user_agent: Some(user_agent),
            proxy,
        }
    }
}
