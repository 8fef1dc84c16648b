//! Governance proposals.
//!
//! # Responsibility
//! - Mirror the contract's proposal list into the proposal table model.
//! - Create proposals and cast votes as signed contract calls.
//!
//! # Invariants
//! - A refresh replaces the whole model in one deferred notification, and
//!   only after every `getProposal` call succeeded.
//! - Votes are only accepted for proposals currently in `Started`.

use super::{fraction, require_positive, require_text, ServiceError, ServiceResult};
use crate::contract::{ContractCall, ContractContext};
use crate::model::account::Account;
use crate::model::list::ListModel;
use crate::model::notify::{NotificationDispatcher, Notify};
use crate::model::proposal::Proposal;
use crate::task::{OwnerId, Task, TaskContext, TaskManager, TaskResult};
use serde_json::json;
use std::sync::Arc;

pub const PROPOSALS_COUNT_METHOD: &str = "proposalsCount";
pub const GET_PROPOSAL_METHOD: &str = "getProposal";
pub const CREATE_PROPOSAL_METHOD: &str = "createProposal";
pub const VOTE_METHOD: &str = "vote";

pub struct ProposalService {
    proposals: Arc<ListModel<Proposal>>,
    contract: ContractContext,
    tasks: TaskManager,
}

impl ProposalService {
    pub fn new(
        dispatcher: &NotificationDispatcher,
        contract: ContractContext,
        tasks: TaskManager,
    ) -> Self {
        Self {
            proposals: Arc::new(ListModel::new(dispatcher)),
            contract,
            tasks,
        }
    }

    pub fn proposals(&self) -> Arc<ListModel<Proposal>> {
        Arc::clone(&self.proposals)
    }

    /// Reloads every proposal from the contract.
    pub fn refresh(&self, owner: impl Into<OwnerId>) -> Arc<Task> {
        let contract = self.contract.clone();
        let proposals = Arc::clone(&self.proposals);
        self.tasks.launch_task(
            "Refresh proposals",
            owner,
            move |ctx| reload_proposals(ctx, &contract, &proposals),
            |_| {},
        )
    }

    /// Submits a new proposal signed by `account`, then reloads the list.
    pub fn create_proposal(
        &self,
        account: &Account,
        title: &str,
        budget: u64,
        duration_blocks: u64,
    ) -> ServiceResult<Arc<Task>> {
        account.validate()?;
        let title = require_text("proposal title", title)?;
        let budget = require_positive("budget", budget)?;
        let duration_blocks = require_positive("voting duration", duration_blocks)?;

        let call = ContractCall::signed(
            CREATE_PROPOSAL_METHOD,
            vec![json!(title), json!(budget), json!(duration_blocks)],
            account.private_key.clone(),
        );
        let contract = self.contract.clone();
        let proposals = Arc::clone(&self.proposals);
        Ok(self.tasks.launch_task(
            format!("Create proposal \"{title}\""),
            OwnerId::for_account(&account.address),
            move |ctx| {
                ctx.set_message("Submitting proposal");
                contract.call_raw(&call)?;
                ctx.check_exit()?;
                reload_proposals(ctx, &contract, &proposals)
            },
            |_| {},
        ))
    }

    /// Casts `account`'s vote on `proposal_id`, then re-reads that proposal.
    ///
    /// # Errors
    /// - `NotFound` when the proposal is not in the model.
    /// - `Validation` when the proposal is not open for voting.
    pub fn vote(
        &self,
        account: &Account,
        proposal_id: u64,
        approve: bool,
    ) -> ServiceResult<Arc<Task>> {
        account.validate()?;
        let proposal = self
            .proposals
            .find(|proposal| proposal.id == proposal_id)
            .ok_or_else(|| ServiceError::NotFound(format!("proposal {proposal_id}")))?;
        if !proposal.status.accepts_votes() {
            return Err(ServiceError::Validation(format!(
                "proposal {proposal_id} is not open for voting"
            )));
        }

        let call = ContractCall::signed(
            VOTE_METHOD,
            vec![json!(proposal_id), json!(approve)],
            account.private_key.clone(),
        );
        let contract = self.contract.clone();
        let proposals = Arc::clone(&self.proposals);
        Ok(self.tasks.launch_task(
            format!("Vote on proposal {proposal_id}"),
            OwnerId::for_account(&account.address),
            move |ctx| {
                contract.call_raw(&call)?;
                ctx.check_exit()?;
                let updated = fetch_proposal(&contract, proposal_id)?;
                proposals.update(Notify::Deferred, |items, _| {
                    if let Some(entry) = items.iter_mut().find(|item| item.id == proposal_id) {
                        *entry = updated;
                    }
                });
                Ok(())
            },
            |_| {},
        ))
    }
}

fn fetch_proposal(contract: &ContractContext, id: u64) -> TaskResult<Proposal> {
    Ok(contract.call_json(&ContractCall::read(GET_PROPOSAL_METHOD, vec![json!(id)]))?)
}

fn reload_proposals(
    ctx: &TaskContext,
    contract: &ContractContext,
    proposals: &ListModel<Proposal>,
) -> TaskResult<()> {
    ctx.set_message("Loading proposals");
    let count: u64 = contract.call_json(&ContractCall::read(PROPOSALS_COUNT_METHOD, Vec::new()))?;
    let mut loaded = Vec::new();
    for id in 0..count {
        ctx.check_exit()?;
        loaded.push(fetch_proposal(contract, id)?);
        ctx.set_progress(fraction(id + 1, count));
    }
    proposals.replace_all(loaded, Notify::Deferred);
    ctx.set_message(format!("Loaded {count} proposals"));
    Ok(())
}
