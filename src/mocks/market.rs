//! Fully wired marketplace over test doubles.

use std::sync::Arc;

use rust_decimal::Decimal;

use super::{FaultyLedger, ManualClock, RecordingTransport};
use crate::config::MarketConfig;
use crate::core::{LedgerStore, Marketplace};
use crate::traits::{MemoryContentStore, StaticAdmins};
use crate::types::{Command, InboundEvent, Item, MarketResult, UserId};

/// A marketplace with one admin, a recording transport and a fault-injecting
/// ledger, plus shortcuts for driving it.
pub struct TestMarket {
    pub market: Arc<Marketplace>,
    pub ledger: Arc<FaultyLedger>,
    pub content: Arc<MemoryContentStore>,
    pub transport: RecordingTransport,
    pub clock: ManualClock,
}

impl TestMarket {
    pub const ADMIN: UserId = 1;

    pub fn new() -> Self {
        Self::with_config(MarketConfig::new(
            Decimal::new(10, 2),
            vec![Self::ADMIN],
            vec!["Math".to_string(), "Physics".to_string()],
        ))
    }

    /// Panics if the marketplace cannot be built; test use only.
    pub fn with_config(config: MarketConfig) -> Self {
        let ledger = Arc::new(FaultyLedger::new());
        let content = Arc::new(MemoryContentStore::new());
        let transport = RecordingTransport::new();
        let clock = ManualClock::default();
        let admins = Arc::new(StaticAdmins::new(config.admins.clone()));

        let market = match Marketplace::new(
            ledger.clone(),
            content.clone(),
            Arc::new(transport.clone()),
            admins,
            Arc::new(clock.clone()),
            Arc::new(config),
        ) {
            Ok(market) => Arc::new(market),
            Err(e) => panic!("test marketplace failed to start: {}", e),
        };

        Self {
            market,
            ledger,
            content,
            transport,
            clock,
        }
    }

    /// Send callback data such as `buy:3`; panics on malformed data.
    pub async fn command(&self, user: UserId, data: &str) -> MarketResult<()> {
        let command = match data.parse::<Command>() {
            Ok(command) => command,
            Err(e) => panic!("bad command '{}' in test: {}", data, e),
        };
        self.market
            .handle(InboundEvent::command(user, command))
            .await
    }

    pub async fn text(&self, user: UserId, text: &str) -> MarketResult<()> {
        self.market.handle(InboundEvent::text(user, text)).await
    }

    pub fn balance(&self, user: UserId) -> Decimal {
        self.ledger.get_balance(user)
    }

    /// Put money on a user's balance directly, bypassing requests.
    pub fn fund(&self, user: UserId, amount: Decimal) {
        if let Err(e) = self.ledger.inner().adjust_balance(user, amount) {
            panic!("funding user {} failed: {}", user, e);
        }
    }

    /// Walk `author` through the submit flow with text content.
    ///
    /// Returns the newly created pending item.
    pub async fn submit_item(
        &self,
        author: UserId,
        subject: &str,
        name: &str,
        price: &str,
    ) -> MarketResult<Item> {
        self.command(author, "menu:submit").await?;
        self.command(author, &format!("subject:{}", subject)).await?;
        self.command(author, "term:1").await?;
        self.command(author, "category:formulas").await?;
        self.text(author, name).await?;
        self.text(author, &format!("{} content", name)).await?;
        self.text(author, price).await?;

        let newest = self
            .ledger
            .list_owned(author, &Default::default())
            .into_iter()
            .filter(|owned| !owned.purchased)
            .map(|owned| owned.item)
            .max_by_key(|item| item.id);

        match newest {
            Some(item) => Ok(item),
            None => panic!("submission by {} produced no item", author),
        }
    }

    /// Submit an item and approve it as the admin.
    pub async fn approved_item(
        &self,
        author: UserId,
        name: &str,
        price: &str,
    ) -> MarketResult<Item> {
        let item = self.submit_item(author, "Math", name, price).await?;
        self.command(Self::ADMIN, &format!("item:approve:{}", item.id))
            .await?;
        match self.ledger.item_record(item.id) {
            Some(item) => Ok(item),
            None => panic!("approved item {} vanished", item.id),
        }
    }
}

impl Default for TestMarket {
    fn default() -> Self {
        Self::new()
    }
}
