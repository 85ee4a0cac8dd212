//! Shared fixtures: a three-scholar config wired to in-memory collaborators.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use slp_bot::{
    BotContext, BotSettings, ConfirmationGate, IncomingMessage, LedgerLogger, MockChainClient,
    MockChatTransport, MockLedgerStore, RolePermission,
};
use slp_common::{Address, BotConfig};

pub const ALICE: &str = "1001";
pub const BOB: &str = "1002";
/// Shares Alice's account address.
pub const CAROL: &str = "1003";

pub const CHANNEL: &str = "chan-1";
pub const SHEET_ID: &str = "sheet-1";

pub fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

pub fn shared_account() -> Address {
    addr(0x11)
}

pub fn bob_account() -> Address {
    addr(0x22)
}

pub fn alice_payout() -> Address {
    addr(0x33)
}

pub fn academy() -> Address {
    addr(0x55)
}

pub fn fee_wallet() -> Address {
    addr(0x66)
}

pub fn config_json() -> String {
    format!(
        r#"{{
            "accounts": {{
                "scholars": {{
                    "{alice}": {{
                        "Name": "Alice",
                        "AccountAddress": "{shared}",
                        "PrivateKey": "0xalice",
                        "ScholarPayoutAddress": "{alice_payout}",
                        "ScholarPayoutPercentage": 0.7
                    }},
                    "{bob}": {{
                        "Name": "Bob",
                        "AccountAddress": "{bob_account}",
                        "PrivateKey": "0xbob",
                        "ScholarPayoutAddress": "{bob_payout}",
                        "ScholarPayoutPercentage": 0.5
                    }},
                    "{carol}": {{
                        "Name": "Carol",
                        "AccountAddress": "{shared}",
                        "PrivateKey": "0xalice",
                        "ScholarPayoutAddress": "{carol_payout}",
                        "ScholarPayoutPercentage": 0.6
                    }}
                }},
                "fee_payout_percentage": 0.05,
                "fee_payout_address": "{fee}",
                "academy_payout_address": "{academy}"
            }},
            "sheets_id": "{sheet}"
        }}"#,
        alice = ALICE,
        bob = BOB,
        carol = CAROL,
        shared = shared_account().to_display(),
        bob_account = bob_account().to_display(),
        alice_payout = alice_payout().to_display(),
        bob_payout = addr(0x44).to_display(),
        carol_payout = addr(0x77).to_display(),
        fee = fee_wallet().to_display(),
        academy = academy().to_display(),
        sheet = SHEET_ID,
    )
}

pub struct Harness {
    pub chain: Arc<MockChainClient>,
    pub chat: Arc<MockChatTransport>,
    pub store: Arc<MockLedgerStore>,
    pub ctx: Arc<BotContext>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(BotSettings {
            transfer_pause: Duration::ZERO,
            ..BotSettings::default()
        })
    }

    pub fn with_settings(settings: BotSettings) -> Self {
        Self::build(&config_json(), settings)
    }

    pub fn build(config: &str, settings: BotSettings) -> Self {
        let config = BotConfig::from_json_str(config).expect("test config parses");
        let chain = Arc::new(MockChainClient::new());
        let chat = Arc::new(MockChatTransport::new());
        let store = Arc::new(MockLedgerStore::new());
        let ledger = LedgerLogger::new(store.clone(), config.ledger_id.clone());
        let ctx = Arc::new(BotContext::new(
            config,
            chain.clone(),
            chat.clone(),
            ledger,
            Arc::new(RolePermission::default()),
            ConfirmationGate::detached(),
            settings,
        ));
        Self {
            chain,
            chat,
            store,
            ctx,
        }
    }

    /// Polls until `identity` has a registered confirmation wait.
    pub async fn wait_for_prompt(&self, identity: &str) {
        for _ in 0..400 {
            if self.ctx.gate.is_awaiting(identity) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no confirmation prompt for {identity}");
    }
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

pub fn message(author: &str, channel: &str, content: &str) -> IncomingMessage {
    message_with_roles(author, channel, content, &[])
}

pub fn message_with_roles(author: &str, channel: &str, content: &str, roles: &[&str]) -> IncomingMessage {
    IncomingMessage {
        id: format!("msg-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed)),
        author_id: author.to_string(),
        channel_id: channel.to_string(),
        content: content.to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}
