//! Per-network settings stored in the config document.
//!
//! Every field lives under `<network>.<field>`, so switching networks keeps
//! each network's node URL, contract address and cached slot counters apart.

use super::{ConfigResult, ConfigStore};
use crate::contract::Endpoint;

pub const NETWORK_KEY: &str = "network";
pub const ETH_URL_FIELD: &str = "eth_url";
pub const CONTRACT_ADDRESS_FIELD: &str = "contract_address";
pub const MASK_FIELD: &str = "mask";
pub const MIN_DIFFICULTY_FIELD: &str = "min_difficulty";
pub const SLOTS_NUMBER_FIELD: &str = "slots_number";
pub const SLOTS_CLAIMED_FIELD: &str = "slots_claimed";

pub const DEFAULT_NETWORK: &str = "local";
pub const DEFAULT_ETH_URL: &str = "http://127.0.0.1:8545";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub network: String,
    pub eth_url: String,
    pub contract_address: String,
    pub mask: String,
    pub min_difficulty: u64,
    pub slots_number: u64,
    pub slots_claimed: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self::for_network(DEFAULT_NETWORK)
    }
}

impl NetworkSettings {
    /// Built-in defaults for `network`.
    pub fn for_network(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            eth_url: DEFAULT_ETH_URL.to_string(),
            contract_address: String::new(),
            mask: String::new(),
            min_difficulty: 0,
            slots_number: 0,
            slots_claimed: 0,
        }
    }

    /// Reads the active network (top-level `network` key) and its fields.
    pub fn load_active(store: &ConfigStore) -> Self {
        let network = store.get_string(NETWORK_KEY, DEFAULT_NETWORK);
        Self::load(store, &Self::for_network(network))
    }

    /// Reads `defaults.network`'s fields, keeping `defaults` where a field is
    /// missing or malformed.
    pub fn load(store: &ConfigStore, defaults: &Self) -> Self {
        let key = |field: &str| field_key(&defaults.network, field);
        Self {
            network: defaults.network.clone(),
            eth_url: store.get_string(&key(ETH_URL_FIELD), &defaults.eth_url),
            contract_address: store
                .get_string(&key(CONTRACT_ADDRESS_FIELD), &defaults.contract_address),
            mask: store.get_string(&key(MASK_FIELD), &defaults.mask),
            min_difficulty: store.get_u64(&key(MIN_DIFFICULTY_FIELD), defaults.min_difficulty),
            slots_number: store.get_u64(&key(SLOTS_NUMBER_FIELD), defaults.slots_number),
            slots_claimed: store.get_u64(&key(SLOTS_CLAIMED_FIELD), defaults.slots_claimed),
        }
    }

    pub fn save(&self, store: &ConfigStore) -> ConfigResult<()> {
        store.set(NETWORK_KEY, &self.network)?;
        store.set(&self.key(ETH_URL_FIELD), &self.eth_url)?;
        store.set(&self.key(CONTRACT_ADDRESS_FIELD), &self.contract_address)?;
        store.set(&self.key(MASK_FIELD), &self.mask)?;
        store.set(&self.key(MIN_DIFFICULTY_FIELD), &self.min_difficulty)?;
        self.save_slot_counters(store)
    }

    /// Writes only the cached slot counters.
    pub fn save_slot_counters(&self, store: &ConfigStore) -> ConfigResult<()> {
        store.set(&self.key(SLOTS_NUMBER_FIELD), &self.slots_number)?;
        store.set(&self.key(SLOTS_CLAIMED_FIELD), &self.slots_claimed)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            eth_url: self.eth_url.clone(),
            contract_address: self.contract_address.clone(),
        }
    }

    pub fn key(&self, field: &str) -> String {
        field_key(&self.network, field)
    }
}

fn field_key(network: &str, field: &str) -> String {
    format!("{network}.{field}")
}

#[cfg(test)]
mod tests {
    use super::{NetworkSettings, DEFAULT_ETH_URL};
    use crate::config::ConfigStore;

    #[test]
    fn fields_are_namespaced_by_network() {
        let store = ConfigStore::in_memory();
        let mut ropsten = NetworkSettings::for_network("ropsten");
        ropsten.eth_url = "http://node:8545".to_string();
        ropsten.slots_number = 12;
        ropsten.save(&store).expect("save settings");

        assert_eq!(store.get_string("ropsten.eth_url", ""), "http://node:8545");
        assert_eq!(store.get_u64("ropsten.slots_number", 0), 12);

        let other = NetworkSettings::load(&store, &NetworkSettings::for_network("mainnet"));
        assert_eq!(other.eth_url, DEFAULT_ETH_URL);
        assert_eq!(other.slots_number, 0);

        let active = NetworkSettings::load_active(&store);
        assert_eq!(active, ropsten);
    }

    #[test]
    fn malformed_fields_keep_defaults() {
        let store = ConfigStore::from_json_str(
            r#"{"local.min_difficulty": "hard", "local.eth_url": null}"#,
        )
        .expect("valid document");
        let mut defaults = NetworkSettings::default();
        defaults.min_difficulty = 3;

        let loaded = NetworkSettings::load(&store, &defaults);
        assert_eq!(loaded.min_difficulty, 3);
        assert_eq!(loaded.eth_url, DEFAULT_ETH_URL);
    }
}
