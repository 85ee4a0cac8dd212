//! # Integration Tests: Config to Payout
//!
//! Resolves a scholar from configuration, splits a balance and builds the
//! payout, using only the public API.

use proptest::prelude::*;

use slp_common::{
    compute_split, to_canonical, to_display, Address, BotConfig, Payout, PayoutError, PayoutLeg,
    SplitError,
};

const CONFIG: &str = r#"{
    "accounts": {
        "scholars": {
            "77": {
                "Name": "Dana",
                "AccountAddress": "ronin:5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
                "PrivateKey": "0xdana",
                "ScholarPayoutAddress": "ronin:fb6916095ca1df60bb79ce92ce3ea74c37c5d359",
                "ScholarPayoutPercentage": 0.55
            }
        },
        "fee_payout_percentage": 0.1,
        "fee_payout_address": "ronin:dbf03b407c01e7cd3cbea99509d93f8dddc8c6fb",
        "academy_payout_address": "ronin:d1220a0cf47c7b9be7a2e6ba89f429762e7b9adb"
    },
    "sheets_id": "ledger"
}"#;

#[test]
fn configured_scholar_to_balanced_payout() {
    let cfg = BotConfig::from_json_str(CONFIG).unwrap();
    let dana = cfg.scholar("77").unwrap();
    let parties = dana.parties(&cfg.accounts).unwrap();

    let split = compute_split(333, cfg.accounts.fee_payout_percentage, dana.payout_percentage).unwrap();
    // fee floor(33.3) = 33, scholar ceil(300 * 0.55) = 165, academy 135
    assert_eq!((split.fee_amount, split.scholar_amount, split.academy_amount), (33, 165, 135));

    let payout = Payout::new(&dana.name, dana.private_key.clone(), 5, parties, &split);
    assert!(payout.is_balanced());
    assert_eq!(payout.nonce_for(PayoutLeg::Fee), 7);
    assert_eq!(payout.transaction(PayoutLeg::Academy).to_address, parties.academy);
    assert_eq!(
        payout.scholar_transaction.from_address.to_canonical(),
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
    );
}

#[test]
fn zero_balance_is_reported_before_bad_percentages() {
    assert_eq!(compute_split(0, 7.0, -1.0), Err(SplitError::ZeroBalance));
    let err = PayoutError::from_split(compute_split(10, 0.1, f64::NAN).unwrap_err(), "Dana");
    assert!(err.is_config_defect());
}

#[test]
fn prefix_is_validated_before_conversion() {
    assert!(to_canonical("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
    assert!(to_display("ronin:5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
}

proptest! {
    #[test]
    fn split_always_sums_to_balance(
        balance in 1u64..=u64::MAX,
        fee in 0.0f64..=1.0,
        share in 0.0f64..=1.0,
    ) {
        let split = compute_split(balance, fee, share).unwrap();
        prop_assert_eq!(split.total(), u128::from(balance));
    }

    #[test]
    fn display_canonical_round_trip(bytes in proptest::array::uniform20(any::<u8>())) {
        let canonical = Address::from_bytes(bytes).to_canonical();
        let display = to_display(&canonical).unwrap();
        prop_assert_eq!(to_canonical(&display).unwrap(), canonical);
    }
}
