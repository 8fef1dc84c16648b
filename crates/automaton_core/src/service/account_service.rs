//! Locally managed signing accounts.
//!
//! # Responsibility
//! - Import, look up and remove accounts backing the account table.
//! - Persist the account list under the `accounts` config key.
//!
//! # Invariants
//! - Addresses are unique, compared case-insensitively.
//! - Removing an account first stops every task it owns.

use super::{ServiceError, ServiceResult};
use crate::config::ConfigStore;
use crate::model::account::Account;
use crate::model::list::ListModel;
use crate::model::notify::{NotificationDispatcher, Notify};
use crate::task::{OwnerId, TaskManager};
use log::{info, warn};
use std::sync::Arc;

pub const ACCOUNTS_KEY: &str = "accounts";

pub struct AccountService {
    accounts: Arc<ListModel<Account>>,
    config: Arc<ConfigStore>,
    tasks: TaskManager,
}

impl AccountService {
    pub fn new(
        dispatcher: &NotificationDispatcher,
        config: Arc<ConfigStore>,
        tasks: TaskManager,
    ) -> Self {
        Self {
            accounts: Arc::new(ListModel::new(dispatcher)),
            config,
            tasks,
        }
    }

    pub fn accounts(&self) -> Arc<ListModel<Account>> {
        Arc::clone(&self.accounts)
    }

    pub fn find(&self, address: &str) -> Option<Account> {
        self.accounts.find(|account| account.has_address(address))
    }

    /// Validates and appends a new account.
    ///
    /// # Errors
    /// - `Account` for malformed name, address or key.
    /// - `DuplicateAccount` when the address is already imported.
    pub fn import_account(
        &self,
        name: &str,
        address: &str,
        private_key: &str,
    ) -> ServiceResult<Account> {
        let account = Account::new(name, address, private_key)?;
        if self.find(&account.address).is_some() {
            return Err(ServiceError::DuplicateAccount(account.address));
        }
        self.accounts.add_item(account.clone(), Notify::Immediate);
        info!(
            "event=account_import module=service status=ok address={}",
            account.address
        );
        Ok(account)
    }

    /// Stops the account's tasks, then removes it.
    ///
    /// # Errors
    /// - `TaskQueue` when called from one of the account's own tasks.
    /// - `NotFound` when no account has `address`.
    pub fn remove_account(&self, address: &str) -> ServiceResult<Account> {
        let stopped = self.tasks.stop_owned_tasks(&OwnerId::for_account(address))?;
        let mut removed = self
            .accounts
            .remove_where(|account| account.has_address(address), Notify::Immediate);
        let account = removed
            .pop()
            .ok_or_else(|| ServiceError::NotFound(format!("account `{}`", address.trim())))?;
        info!(
            "event=account_remove module=service status=ok address={} stopped_tasks={}",
            account.address, stopped
        );
        Ok(account)
    }

    /// Replaces the model with the accounts stored in config.
    ///
    /// Invalid or duplicate entries are skipped. Returns how many loaded.
    pub fn load_from_config(&self) -> usize {
        let stored: Vec<Account> = self.config.get_or(ACCOUNTS_KEY, Vec::new());
        let mut loaded: Vec<Account> = Vec::with_capacity(stored.len());
        for account in stored {
            if let Err(err) = account.validate() {
                warn!(
                    "event=account_load module=service status=error address={} error={}",
                    account.address, err
                );
                continue;
            }
            if loaded.iter().any(|known| known.has_address(&account.address)) {
                continue;
            }
            loaded.push(account);
        }
        let count = loaded.len();
        self.accounts.replace_all(loaded, Notify::Deferred);
        info!(
            "event=account_load module=service status=ok count={}",
            count
        );
        count
    }

    /// Writes the current accounts into the config store (not to disk).
    pub fn save_to_config(&self) -> ServiceResult<()> {
        self.config.set(ACCOUNTS_KEY, &self.accounts.snapshot())?;
        Ok(())
    }
}
