use super::*;
use ledger_client::{abi::encode_args, error::EncodeError};

fn properties() -> FundingCycleProperties {
    FundingCycleProperties {
        target: U256::from(10_000u64),
        currency: CurrencyOption::Usd,
        duration: 30,
        cycle_limit: 0,
        discount_rate: 10,
        ballot: Address::repeat_byte(0xba),
    }
}

fn tuple_items(arg: CallArg) -> Vec<CallArg> {
    match arg {
        CallArg::Tuple(items) => items,
        other => panic!("expected tuple, got {other:?}"),
    }
}

#[test]
fn properties_keep_currency_and_discount_when_targeted_and_timed() {
    let items = tuple_items(properties().to_arg());

    assert_eq!(items[0], CallArg::uint256(10_000u64));
    assert_eq!(items[1], CallArg::uint256(1u64));
    assert_eq!(items[2], CallArg::uint256(30u64));
    assert_eq!(items[4], CallArg::uint256(10u64));
    assert_eq!(items[5], CallArg::Address(Address::repeat_byte(0xba)));
}

#[test]
fn untargeted_cycle_sends_currency_zero() {
    let mut props = properties();
    props.target = U256::MAX;
    assert!(!props.has_funding_target());

    let items = tuple_items(props.to_arg());
    assert_eq!(items[0], CallArg::uint256(U256::MAX));
    assert_eq!(items[1], CallArg::uint256(0u64));
}

#[test]
fn zero_duration_sends_discount_rate_zero() {
    let mut props = properties();
    props.duration = 0;

    let items = tuple_items(props.to_arg());
    assert_eq!(items[4], CallArg::uint256(0u64));
}

#[test]
fn payout_mod_defaults_and_widths() {
    let arg = PayoutMod {
        percent: 2_500,
        ..Default::default()
    }
    .to_arg();
    assert_eq!(arg.abi_type(), PayoutMod::abi_type());

    let items = tuple_items(arg);
    assert_eq!(items[0], CallArg::Bool(false));
    assert_eq!(items[1], CallArg::uint(16, 2_500u64));
    assert_eq!(items[2], CallArg::uint(48, 0u64));
    assert_eq!(items[3], CallArg::Address(Address::ZERO));
    assert_eq!(items[4], CallArg::Address(Address::ZERO));
    assert_eq!(items[5], CallArg::uint(56, 0u64));
}

#[test]
fn payout_mod_to_project_carries_project_id() {
    let items = tuple_items(
        PayoutMod {
            percent: 100,
            locked_until: Some(1_700_000_000),
            beneficiary: Some(Address::repeat_byte(0x0b)),
            project_id: Some(ProjectId(42)),
        }
        .to_arg(),
    );

    assert_eq!(items[2], CallArg::uint(48, 1_700_000_000u64));
    assert_eq!(items[3], CallArg::Address(Address::repeat_byte(0x0b)));
    assert_eq!(items[5], CallArg::uint(56, 42u64));
}

#[test]
fn ticket_mods_encode_as_tuple_array() {
    let mods = [
        TicketMod {
            percent: 5_000,
            beneficiary: Some(Address::repeat_byte(0x01)),
            ..Default::default()
        },
        TicketMod {
            percent: 5_000,
            beneficiary: Some(Address::repeat_byte(0x02)),
            ..Default::default()
        },
    ];

    let encoded = encode_args(&[ticket_mods_arg(&mods)]).expect("ticket mods");
    // offset, length, then two static four-word tuples
    assert_eq!(encoded.len(), 32 * (2 + 2 * 4));
    assert_eq!(U256::from_be_slice(&encoded[32..64]), U256::from(2u8));
}

#[test]
fn oversized_percent_fails_to_encode() {
    let mods = [PayoutMod {
        percent: 70_000,
        ..Default::default()
    }];

    let err = encode_args(&[payout_mods_arg(&mods)]).expect_err("uint16 overflow");
    assert!(matches!(err, EncodeError::Overflow { bits: 16, .. }));
}

#[test]
fn risk_flags_follow_configuration() {
    let safe = risk_flags(&properties(), &FundingCycleMetadata::default());
    assert!(!safe.any());

    let mut props = properties();
    props.duration = 0;
    props.ballot = Address::ZERO;
    let metadata = FundingCycleMetadata {
        reserved_rate: 180,
        ticket_printing_is_allowed: true,
        ..Default::default()
    };

    let flags = risk_flags(&props, &metadata);
    assert_eq!(
        flags,
        FundingCycleRiskFlags {
            duration: true,
            ballot: true,
            ticket_printing_allowed: true,
            reserved_rate: true,
        }
    );
    assert_eq!(flags.count(), 4);
}

#[test]
fn reserved_rate_threshold_is_ninety_percent() {
    let below = FundingCycleMetadata {
        reserved_rate: 179,
        ..Default::default()
    };
    assert!(!risk_flags(&properties(), &below).reserved_rate);
    assert_eq!(percent_to_perbicent(90), 180);
}

#[test]
fn reserved_rate_warning_depends_on_full_reservation() {
    let flags = FundingCycleRiskFlags {
        reserved_rate: true,
        ..Default::default()
    };

    let full = FundingCycleMetadata {
        reserved_rate: PERBICENT_ONE_HUNDRED,
        ..Default::default()
    };
    assert_eq!(
        warning_text(&flags, &full),
        vec!["Contributors will not receive any tokens in exchange for paying this project."]
    );

    let most = FundingCycleMetadata {
        reserved_rate: 190,
        ..Default::default()
    };
    assert!(warning_text(&flags, &most)[0].contains("relatively small portion"));
    assert!(warning_text(&FundingCycleRiskFlags::default(), &most).is_empty());
}
