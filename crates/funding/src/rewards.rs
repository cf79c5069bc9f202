//! Ticket holder rewards: redeemable overflow and ticket conversion.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use ledger_client::{
    provider::{EventSource, ReadEndpoint, TopicFilter},
    reader::{RefreshTrigger, StateReader, WatchedValue},
    transactor::TransactionRequest,
};
use serde::Serialize;
use shared::{
    domain::{Endpoint, ProjectId},
    protocol::CallArg,
};

use crate::{
    contracts::{events, ContractName, Contracts},
    error::ContractsError,
};

/// Bonding curve rates are expressed out of 1000.
const BONDING_CURVE_SCALE: u64 = 1000;

/// Minimum overflow returned for redeeming `amount` tickets:
/// `amount * overflow * rate / 1000 / supply`.
///
/// `None` when there is no supply or the product does not fit in 256 bits.
pub fn min_redeem_amount(
    amount: U256,
    overflow: U256,
    bonding_curve_rate: U256,
    combined_supply: U256,
) -> Option<U256> {
    if combined_supply.is_zero() {
        return None;
    }
    amount
        .checked_mul(overflow)?
        .checked_mul(bonding_curve_rate)?
        .checked_div(U256::from(BONDING_CURVE_SCALE))?
        .checked_div(combined_supply)
}

/// Whole-percent share of `supply` held by `balance`; 0 when there is no supply.
pub fn share_percent(balance: U256, supply: U256) -> U256 {
    if supply.is_zero() {
        return U256::ZERO;
    }
    balance.saturating_mul(U256::from(100u8)) / supply
}

pub fn redeem_request(
    contracts: &Contracts,
    project: ProjectId,
    amount: U256,
    min_returned: U256,
    beneficiary: Address,
) -> Result<TransactionRequest, ContractsError> {
    Ok(TransactionRequest::new(
        contracts.endpoint(ContractName::TerminalV1)?,
        "redeem",
        vec![
            CallArg::uint256(project.as_u256()),
            CallArg::uint256(amount),
            CallArg::uint256(min_returned),
            CallArg::Address(beneficiary),
        ],
    ))
}

/// Converts a holder's staked tickets into the project's ERC-20 tokens.
pub fn convert_request(
    contracts: &Contracts,
    project: ProjectId,
) -> Result<TransactionRequest, ContractsError> {
    Ok(TransactionRequest::new(
        contracts.endpoint(ContractName::TicketBooth)?,
        "convert",
        vec![CallArg::uint256(project.as_u256())],
    ))
}

/// Point-in-time view over a [`RewardsWatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewardsSnapshot {
    pub bonding_curve_rate: Option<U256>,
    pub ticket_balance: Option<U256>,
    pub ticket_supply: Option<U256>,
    pub iou_balance: U256,
    pub iou_supply: U256,
    pub overflow: Option<U256>,
}

impl RewardsSnapshot {
    pub fn total_balance(&self) -> U256 {
        self.ticket_balance
            .unwrap_or_default()
            .saturating_add(self.iou_balance)
    }

    pub fn combined_supply(&self) -> U256 {
        self.ticket_supply
            .unwrap_or_default()
            .saturating_add(self.iou_supply)
    }

    pub fn share_percent(&self) -> U256 {
        share_percent(self.total_balance(), self.combined_supply())
    }

    pub fn min_redeem_for(&self, amount: U256) -> Option<U256> {
        min_redeem_amount(
            amount,
            self.overflow?,
            self.bonding_curve_rate?,
            self.combined_supply(),
        )
    }

    pub fn redeem_disabled(&self) -> bool {
        self.overflow.map_or(true, |overflow| overflow.is_zero())
    }
}

/// Readers behind a project's rewards panel.
#[derive(Debug)]
pub struct RewardsWatch {
    pub bonding_curve_rate: WatchedValue<U256>,
    pub ticket_balance: WatchedValue<U256>,
    pub ticket_supply: WatchedValue<U256>,
    pub iou_balance: WatchedValue<U256>,
    pub iou_supply: WatchedValue<U256>,
    pub overflow: WatchedValue<U256>,
}

impl RewardsWatch {
    /// `ticket` is the project's token; until one is issued the token readers
    /// stay empty. Without a `holder` the balance readers stay empty.
    pub fn spawn(
        contracts: &Contracts,
        ticket: Option<Endpoint>,
        project: ProjectId,
        holder: Option<Address>,
        reads: Arc<dyn ReadEndpoint>,
        events: Arc<dyn EventSource>,
    ) -> Result<Self, ContractsError> {
        let terminal = contracts.endpoint(ContractName::TerminalV1)?;
        let booth = contracts.endpoint(ContractName::TicketBooth)?;
        let project_topic = TopicFilter::Exact(project.topic());

        let pay = RefreshTrigger::new(&terminal, events::PAY)
            .with_topics([TopicFilter::Any, project_topic.clone()]);
        let redeem = RefreshTrigger::new(&terminal, events::REDEEM).with_topics([
            TopicFilter::Any,
            TopicFilter::Any,
            project_topic.clone(),
        ]);
        let tap = RefreshTrigger::new(&terminal, events::TAP)
            .with_topics([TopicFilter::Any, project_topic.clone()]);
        let issue = RefreshTrigger::new(&booth, events::ISSUE).with_topics([project_topic]);
        let tickets_update_on = [pay.clone(), redeem];

        let ticket_args = |args: Vec<CallArg>| ticket.as_ref().map(|_| args);
        let ticket_endpoint = ticket
            .clone()
            .unwrap_or_else(|| Endpoint::new("Ticket", Address::ZERO));
        let holder_arg = holder.map(CallArg::Address);

        let bonding_curve_rate = StateReader::<U256>::new(terminal.clone(), "bondingCurveRate")
            .spawn(Arc::clone(&reads), Arc::clone(&events));

        let ticket_balance = StateReader::<U256>::new(ticket_endpoint.clone(), "balanceOf")
            .args(holder_arg.clone().and_then(|holder| ticket_args(vec![holder])))
            .update_on_all(tickets_update_on.clone())
            .spawn(Arc::clone(&reads), Arc::clone(&events));

        let ticket_supply = StateReader::<U256>::new(ticket_endpoint, "totalSupply")
            .args(ticket_args(Vec::new()))
            .update_on_all(tickets_update_on.clone())
            .spawn(Arc::clone(&reads), Arc::clone(&events));

        let iou_balance = StateReader::<U256>::new(booth.clone(), "iOweYous")
            .args(holder_arg.map(|holder| vec![CallArg::uint256(project.as_u256()), holder]))
            .update_on_all(tickets_update_on.clone())
            .update_on(issue)
            .spawn(Arc::clone(&reads), Arc::clone(&events));

        let iou_supply = StateReader::<U256>::new(booth, "totalIOweYous")
            .args(Some(vec![CallArg::uint256(project.as_u256())]))
            .update_on_all(tickets_update_on)
            .spawn(Arc::clone(&reads), Arc::clone(&events));

        let overflow = StateReader::<U256>::new(terminal, "getOverflow")
            .args(Some(vec![CallArg::uint256(project.as_u256())]))
            .update_on_all([pay, tap])
            .spawn(reads, events);

        Ok(Self {
            bonding_curve_rate,
            ticket_balance,
            ticket_supply,
            iou_balance,
            iou_supply,
            overflow,
        })
    }

    pub fn snapshot(&self) -> RewardsSnapshot {
        RewardsSnapshot {
            bonding_curve_rate: self.bonding_curve_rate.get(),
            ticket_balance: self.ticket_balance.get(),
            ticket_supply: self.ticket_supply.get(),
            iou_balance: self.iou_balance.get().unwrap_or_default(),
            iou_supply: self.iou_supply.get().unwrap_or_default(),
            overflow: self.overflow.get(),
        }
    }

    /// Re-reads every value, e.g. after a confirmed redeem.
    pub fn refresh_all(&self) {
        for value in self.values() {
            value.refresh();
        }
    }

    pub fn close(&mut self) {
        for value in [
            &mut self.bonding_curve_rate,
            &mut self.ticket_balance,
            &mut self.ticket_supply,
            &mut self.iou_balance,
            &mut self.iou_supply,
            &mut self.overflow,
        ] {
            value.close();
        }
    }

    fn values(&self) -> [&WatchedValue<U256>; 6] {
        [
            &self.bonding_curve_rate,
            &self.ticket_balance,
            &self.ticket_supply,
            &self.iou_balance,
            &self.iou_supply,
            &self.overflow,
        ]
    }
}

#[cfg(test)]
#[path = "tests/rewards_tests.rs"]
mod tests;
