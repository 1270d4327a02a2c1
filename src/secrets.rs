use std::net::{IpAddr, SocketAddr};

use ahash::AHashMap;
use anyhow::Context;
use service::SecretProvider;

/// Shared secret table built from configuration.
///
/// Keys are either "ip:port" for a single peer socket or a bare "ip"
/// covering every port of that host. Exact matches win.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    exact: AHashMap<SocketAddr, String>,
    by_ip: AHashMap<IpAddr, String>,
}

impl StaticSecrets {
    pub fn from_table<'a>(
        table: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> anyhow::Result<Self> {
        let mut secrets = Self::default();
        for (peer, secret) in table {
            secrets.insert(peer, secret.clone())?;
        }

        Ok(secrets)
    }

    pub fn insert(&mut self, peer: &str, secret: String) -> anyhow::Result<()> {
        if let Ok(addr) = peer.parse::<SocketAddr>() {
            self.exact.insert(addr, secret);
            return Ok(());
        }

        let ip = peer
            .parse::<IpAddr>()
            .with_context(|| format!("secret peer {:?} is neither ip:port nor ip", peer))?;
        self.by_ip.insert(ip, secret);
        Ok(())
    }
}

impl SecretProvider for StaticSecrets {
    async fn secret(&self, addr: &SocketAddr) -> Option<String> {
        self.exact
            .get(addr)
            .or_else(|| self.by_ip.get(&addr.ip()))
            .cloned()
    }
}
