use super::*;
use std::{collections::HashMap, sync::Mutex, time::Duration};

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use ledger_client::{
    abi::{event_topic, selector},
    error::ReadError,
    provider::LogFilter,
};
use shared::protocol::LogRecord;
use tokio::sync::broadcast;

use crate::wad::parse_wad;

fn wad(text: &str) -> U256 {
    parse_wad(text).expect("wad literal")
}

#[test]
fn min_redeem_follows_bonding_curve() {
    // 10 of 100 tickets against 100 overflow at a 38.2% curve
    assert_eq!(
        min_redeem_amount(wad("10"), wad("100"), U256::from(382u64), wad("100")),
        Some(wad("3.82"))
    );
}

#[test]
fn min_redeem_needs_supply() {
    assert_eq!(
        min_redeem_amount(wad("1"), wad("1"), U256::from(1000u64), U256::ZERO),
        None
    );
}

#[test]
fn min_redeem_overflow_is_none() {
    assert_eq!(
        min_redeem_amount(U256::MAX, U256::from(2u8), U256::from(1u8), U256::from(1u8)),
        None
    );
}

#[test]
fn share_is_whole_percent_of_supply() {
    assert_eq!(share_percent(wad("25"), wad("100")), U256::from(25u8));
    assert_eq!(share_percent(wad("1"), wad("3")), U256::from(33u8));
    assert_eq!(share_percent(wad("1"), U256::ZERO), U256::ZERO);
}

#[test]
fn redeem_and_convert_target_their_contracts() {
    let contracts = Contracts::new()
        .with(ContractName::TerminalV1, Address::repeat_byte(0x01))
        .with(ContractName::TicketBooth, Address::repeat_byte(0x02));

    let redeem = redeem_request(
        &contracts,
        ProjectId(1),
        U256::from(100u64),
        U256::from(38u64),
        Address::repeat_byte(0x0a),
    )
    .expect("redeem");
    assert_eq!(redeem.endpoint.label, "TerminalV1");
    assert_eq!(redeem.operation, "redeem");
    assert_eq!(
        redeem.args,
        vec![
            CallArg::uint256(1u64),
            CallArg::uint256(100u64),
            CallArg::uint256(38u64),
            CallArg::Address(Address::repeat_byte(0x0a)),
        ]
    );

    let convert = convert_request(&contracts, ProjectId(1)).expect("convert");
    assert_eq!(convert.endpoint.address, Address::repeat_byte(0x02));
    assert_eq!(convert.args, vec![CallArg::uint256(1u64)]);

    assert_eq!(
        convert_request(&Contracts::new(), ProjectId(1)).map(|_| ()),
        Err(ContractsError::Missing(ContractName::TicketBooth))
    );
}

#[test]
fn snapshot_derives_totals() {
    let snapshot = RewardsSnapshot {
        bonding_curve_rate: Some(U256::from(382u64)),
        ticket_balance: Some(wad("6")),
        ticket_supply: Some(wad("80")),
        iou_balance: wad("4"),
        iou_supply: wad("20"),
        overflow: Some(wad("100")),
    };

    assert_eq!(snapshot.total_balance(), wad("10"));
    assert_eq!(snapshot.combined_supply(), wad("100"));
    assert_eq!(snapshot.share_percent(), U256::from(10u8));
    assert_eq!(snapshot.min_redeem_for(wad("10")), Some(wad("3.82")));
    assert!(!snapshot.redeem_disabled());
    assert!(RewardsSnapshot::default().redeem_disabled());
    assert_eq!(RewardsSnapshot::default().min_redeem_for(wad("1")), None);
}

/// Answers each operation with a fixed value and counts calls per selector.
struct PanelEndpoint {
    values: HashMap<[u8; 4], U256>,
    calls: Mutex<HashMap<[u8; 4], usize>>,
}

impl PanelEndpoint {
    fn new() -> Arc<Self> {
        let values = [
            ("bondingCurveRate()", U256::from(382u64)),
            ("balanceOf(address)", wad("6")),
            ("totalSupply()", wad("80")),
            ("iOweYous(uint256,address)", wad("4")),
            ("totalIOweYous(uint256)", wad("20")),
            ("getOverflow(uint256)", wad("100")),
        ]
        .into_iter()
        .map(|(signature, value)| (selector(signature), value))
        .collect();
        Arc::new(Self {
            values,
            calls: Mutex::new(HashMap::new()),
        })
    }

    fn calls(&self, signature: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(&selector(signature))
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReadEndpoint for PanelEndpoint {
    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes, ReadError> {
        let mut key = [0u8; 4];
        key.copy_from_slice(&data[..4]);
        *self.calls.lock().expect("calls lock").entry(key).or_default() += 1;
        let value = self
            .values
            .get(&key)
            .ok_or_else(|| ReadError::Unavailable("unknown operation".into()))?;
        Ok(Bytes::from(value.to_be_bytes::<32>().to_vec()))
    }
}

struct EventBus {
    tx: broadcast::Sender<LogRecord>,
}

impl EventBus {
    fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(64);
        Arc::new(Self { tx })
    }

    fn emit(&self, address: Address, topics: Vec<B256>) {
        let _ = self.tx.send(LogRecord {
            address,
            topics,
            data: Bytes::new(),
            block_number: Some(1),
            transaction_hash: None,
        });
    }
}

#[async_trait]
impl EventSource for EventBus {
    async fn subscribe(&self, filter: LogFilter) -> Result<BoxStream<'static, LogRecord>, ReadError> {
        let rx = self.tx.subscribe();
        let logs = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(log) => return Some((log, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(logs
            .filter(move |log| futures::future::ready(filter.matches(log)))
            .boxed())
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition reached before timeout");
}

fn panel_contracts() -> Contracts {
    Contracts::new()
        .with(ContractName::TerminalV1, Address::repeat_byte(0x01))
        .with(ContractName::TicketBooth, Address::repeat_byte(0x02))
}

#[tokio::test]
async fn watch_fills_snapshot_for_holder() {
    let reads = PanelEndpoint::new();
    let watch = RewardsWatch::spawn(
        &panel_contracts(),
        Some(Endpoint::new("Ticket", Address::repeat_byte(0x03))),
        ProjectId(1),
        Some(Address::repeat_byte(0x0a)),
        reads.clone(),
        EventBus::new(),
    )
    .expect("watch");

    wait_until(|| {
        let snapshot = watch.snapshot();
        snapshot.bonding_curve_rate.is_some()
            && snapshot.ticket_balance.is_some()
            && snapshot.ticket_supply.is_some()
            && !snapshot.iou_balance.is_zero()
            && !snapshot.iou_supply.is_zero()
            && snapshot.overflow.is_some()
    })
    .await;

    let snapshot = watch.snapshot();
    assert_eq!(snapshot.total_balance(), wad("10"));
    assert_eq!(snapshot.combined_supply(), wad("100"));
    assert_eq!(snapshot.min_redeem_for(wad("10")), Some(wad("3.82")));
}

#[tokio::test]
async fn watch_without_token_or_holder_skips_those_reads() {
    let reads = PanelEndpoint::new();
    let watch = RewardsWatch::spawn(
        &panel_contracts(),
        None,
        ProjectId(1),
        None,
        reads.clone(),
        EventBus::new(),
    )
    .expect("watch");

    wait_until(|| watch.snapshot().overflow.is_some() && !watch.snapshot().iou_supply.is_zero())
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let snapshot = watch.snapshot();
    assert_eq!(snapshot.ticket_balance, None);
    assert_eq!(snapshot.ticket_supply, None);
    assert_eq!(snapshot.iou_balance, U256::ZERO);
    assert_eq!(reads.calls("balanceOf(address)"), 0);
    assert_eq!(reads.calls("totalSupply()"), 0);
    assert_eq!(reads.calls("iOweYous(uint256,address)"), 0);
}

#[tokio::test]
async fn project_payments_refresh_overflow() {
    let reads = PanelEndpoint::new();
    let bus = EventBus::new();
    let watch = RewardsWatch::spawn(
        &panel_contracts(),
        None,
        ProjectId(1),
        None,
        reads.clone(),
        bus.clone(),
    )
    .expect("watch");

    // overflow and iou supply subscribe to Pay; overflow also to Tap; iou supply to Redeem
    wait_until(|| watch.snapshot().overflow.is_some() && bus.tx.receiver_count() >= 4).await;
    assert_eq!(reads.calls("getOverflow(uint256)"), 1);

    let terminal = Address::repeat_byte(0x01);
    bus.emit(
        terminal,
        vec![event_topic(events::TAP), B256::ZERO, ProjectId(2).topic()],
    );
    bus.emit(
        terminal,
        vec![event_topic(events::PAY), B256::ZERO, ProjectId(1).topic()],
    );

    wait_until(|| reads.calls("getOverflow(uint256)") == 2).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(reads.calls("getOverflow(uint256)"), 2);
    assert_eq!(reads.calls("bondingCurveRate()"), 1);
}
