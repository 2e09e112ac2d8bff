//! Broker - the server-wide vhost registry.

use crate::config::Config;
use crate::error::BrokerError;
use crate::state::dashmap_ext::DashMapExt;
use crate::state::{AuditEvent, Vhost, VhostOptions};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{debug, info};

/// Every vhost served by this process, keyed by request path.
pub struct Broker {
    vhosts: DashMap<String, Arc<Vhost>>,
    options: VhostOptions,
}

impl Broker {
    /// Empty broker whose vhosts use the default collaborators.
    pub fn new() -> Self {
        Self::with_options(VhostOptions::default())
    }

    /// Empty broker; every vhost it creates shares `options`.
    pub fn with_options(options: VhostOptions) -> Self {
        Self {
            vhosts: DashMap::new(),
            options,
        }
    }

    /// Build a broker with the vhosts, channels, and users of `config`.
    pub fn from_config(config: &Config) -> Result<Self, BrokerError> {
        let broker = Self::with_options(VhostOptions {
            session: config.session.clone(),
            ..VhostOptions::default()
        });

        for block in &config.vhost {
            let vhost = broker.add_vhost(&block.path)?;
            for name in &block.channels {
                vhost.create_channel(name);
            }
            for user in &block.user {
                vhost
                    .add_user(&user.name, &user.secret, user.permission)
                    .map_err(|source| BrokerError::Vhost {
                        vhost: block.path.clone(),
                        source,
                    })?;
            }
            info!(
                vhost = %block.path,
                channels = block.channels.len(),
                users = block.user.len(),
                "Vhost configured"
            );
        }
        Ok(broker)
    }

    /// Create a vhost served under `path`.
    pub fn add_vhost(&self, path: &str) -> Result<Arc<Vhost>, BrokerError> {
        if !path.starts_with('/') {
            return Err(BrokerError::InvalidPath(path.to_string()));
        }

        let vhost = match self.vhosts.entry(path.to_string()) {
            Entry::Occupied(_) => {
                debug!(vhost = %path, "Vhost already exists");
                return Err(BrokerError::AlreadyExists(path.to_string()));
            }
            Entry::Vacant(slot) => {
                let vhost = Vhost::with_options(path, self.options.clone());
                slot.insert(Arc::clone(&vhost));
                vhost
            }
        };

        self.options.audit.record(path, &AuditEvent::AddVhost);
        Ok(vhost)
    }

    pub fn get_vhost(&self, path: &str) -> Option<Arc<Vhost>> {
        self.vhosts.get_cloned(path)
    }

    /// Stop a vhost and remove it from the registry.
    pub fn delete_vhost(&self, path: &str) -> Result<(), BrokerError> {
        let Some(vhost) = self.vhosts.get_cloned(path) else {
            debug!(vhost = %path, "Vhost not found");
            return Err(BrokerError::NotFound(path.to_string()));
        };

        vhost.stop();
        self.vhosts
            .remove_if(path, |_, registered| Arc::ptr_eq(registered, &vhost));
        self.options.audit.record(path, &AuditEvent::DeleteVhost);
        Ok(())
    }

    /// Snapshot of every vhost, sorted by path.
    pub fn vhosts(&self) -> Vec<Arc<Vhost>> {
        let mut vhosts = self.vhosts.values_cloned();
        vhosts.sort_by(|a, b| a.path().cmp(b.path()));
        vhosts
    }

    /// Stop every vhost. Registered vhosts stay reachable for inspection.
    pub fn stop(&self) {
        for vhost in self.vhosts.values_cloned() {
            vhost.stop();
        }
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}
