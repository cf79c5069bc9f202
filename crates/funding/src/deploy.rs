//! Project creation: metadata upload followed by the terminal `deploy` call.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use ledger_client::{
    abi::bytes32_from_str,
    metadata::{ContentId, MetadataStore},
    transactor::{CancelReason, TransactionRequest, Transactor, TxLifecycle, TxObserver},
};
use serde::{Deserialize, Serialize};
use shared::{
    domain::ProjectId,
    protocol::{CallArg, TransactionReceipt},
};
use tracing::{info, warn};

use crate::{
    contracts::{ContractName, Contracts},
    cycle::{
        payout_mods_arg, ticket_mods_arg, FundingCycleMetadata, FundingCycleProperties, PayoutMod,
        TicketMod,
    },
    error::DeployError,
};

/// The creation event is the first log of the receipt; its fourth topic
/// holds the new project id.
const CREATE_EVENT_IDX: usize = 0;
const PROJECT_ID_TOPIC_IDX: usize = 3;

/// Off-chain project details stored in the metadata store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub handle: String,
    pub metadata: ProjectMetadata,
    pub properties: FundingCycleProperties,
    #[serde(default)]
    pub cycle_metadata: FundingCycleMetadata,
    #[serde(default)]
    pub payout_mods: Vec<PayoutMod>,
    #[serde(default)]
    pub ticket_mods: Vec<TicketMod>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeployEvent {
    /// The caller may release its control: the transaction was handed to the
    /// signer, or no signer is connected and nothing will follow.
    Pending,
    Confirmed { project_id: Option<ProjectId> },
    Cancelled(CancelReason),
}

pub fn project_id_from_receipt(receipt: &TransactionReceipt) -> Option<ProjectId> {
    let topic = receipt.topic(CREATE_EVENT_IDX, PROJECT_ID_TOPIC_IDX)?;
    let id = U256::from_be_bytes(topic.0);
    (id.bit_len() <= 64).then(|| ProjectId(id.to::<u64>()))
}

pub struct ProjectDeployer {
    contracts: Contracts,
    transactor: Transactor,
    metadata: Arc<dyn MetadataStore>,
}

impl ProjectDeployer {
    pub fn new(
        contracts: Contracts,
        transactor: Transactor,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            contracts,
            transactor,
            metadata,
        }
    }

    /// Builds the `deploy` call for an already uploaded metadata document.
    pub fn deploy_request(
        &self,
        owner: Address,
        draft: &ProjectDraft,
        metadata_cid: &ContentId,
    ) -> Result<TransactionRequest, DeployError> {
        let terminal = self.contracts.endpoint(ContractName::TerminalV1_1)?;
        let handle = bytes32_from_str(&draft.handle).map_err(DeployError::InvalidHandle)?;

        Ok(TransactionRequest::new(
            terminal,
            "deploy",
            vec![
                CallArg::Address(owner),
                CallArg::FixedBytes32(handle),
                CallArg::String(metadata_cid.to_string()),
                draft.properties.to_arg(),
                draft.cycle_metadata.to_arg(),
                payout_mods_arg(&draft.payout_mods),
                ticket_mods_arg(&draft.ticket_mods),
            ],
        ))
    }

    /// Uploads the draft's metadata and submits the deploy transaction.
    ///
    /// Returns `Ok(false)` when nothing was submitted because no signer is
    /// connected or the signer refused the call. A metadata upload failure is
    /// an error and nothing is submitted.
    pub async fn deploy(
        &self,
        draft: &ProjectDraft,
        mut on_event: impl FnMut(DeployEvent) + Send + 'static,
    ) -> Result<bool, DeployError> {
        if draft.metadata.name.trim().is_empty() {
            return Err(DeployError::MissingName);
        }
        bytes32_from_str(&draft.handle).map_err(DeployError::InvalidHandle)?;
        self.contracts.endpoint(ContractName::TerminalV1_1)?;

        let Some(owner) = self.transactor.account() else {
            info!("deploy: no provider, handle={} not deployed", draft.handle);
            on_event(DeployEvent::Pending);
            return Ok(false);
        };

        let content = serde_json::to_value(&draft.metadata)?;
        let cid = match self
            .metadata
            .pin_json(&format!("{}-metadata", draft.handle), &content)
            .await
        {
            Ok(cid) => cid,
            Err(err) => {
                warn!("deploy: metadata upload failed handle={}: {err}", draft.handle);
                return Err(err.into());
            }
        };

        let request = self.deploy_request(owner, draft, &cid)?;
        let handle = draft.handle.clone();
        let observer = TxObserver::new(move |event| match event {
            TxLifecycle::Done => on_event(DeployEvent::Pending),
            TxLifecycle::Confirmed(receipt) => {
                let project_id = project_id_from_receipt(&receipt);
                match project_id {
                    Some(id) => info!("deploy: created project={id} handle={handle}"),
                    None => warn!(
                        "deploy: no project id in receipt hash={}",
                        receipt.transaction_hash
                    ),
                }
                on_event(DeployEvent::Confirmed { project_id });
            }
            TxLifecycle::Cancelled(reason) => {
                info!("deploy: cancelled handle={handle}: {reason}");
                on_event(DeployEvent::Cancelled(reason));
            }
        });

        Ok(self.transactor.submit(request, observer).await)
    }
}

#[cfg(test)]
#[path = "tests/deploy_tests.rs"]
mod tests;
