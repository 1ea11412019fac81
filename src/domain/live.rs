//! Live polling loop against a brokerage account.
//!
//! Each cycle: check the session, snapshot the balance, then for every
//! configured symbol fetch recent bars, reconcile with the broker's position,
//! evaluate the most recent bar and act on the decision.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::bar::normalize;
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::pair_config::{PairBook, PairConfig};
use crate::domain::portfolio::Portfolio;
use crate::domain::position::{OpenPosition, PositionState, Side};
use crate::domain::session::TradingHours;
use crate::domain::signal::ExitReason;
use crate::domain::strategy::{decide, Decision};
use crate::domain::trade::{TradeAction, TradeRecord};
use crate::ports::broker_port::{BrokerPort, BrokerPosition, OrderRequest, OrderType};
use crate::ports::clock_port::Clock;
use crate::ports::data_port::MarketDataPort;
use crate::ports::trade_log_port::TradeLogPort;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_CLOSED_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_BALANCE_CAP: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    /// Sleep after a completed cycle.
    pub poll_interval: Duration,
    /// Sleep while the market is closed.
    pub closed_interval: Duration,
    /// Upper bound on the balance figure that gets logged.
    pub balance_cap: f64,
    pub session: TradingHours,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            poll_interval: DEFAULT_POLL_INTERVAL,
            closed_interval: DEFAULT_CLOSED_INTERVAL,
            balance_cap: DEFAULT_BALANCE_CAP,
            session: TradingHours::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    MarketClosed,
    Completed { orders: usize },
}

pub fn entry_reason(side: Side) -> &'static str {
    match side {
        Side::Long => "Long Entry Signal",
        Side::Short => "Short Entry Signal",
    }
}

pub fn exit_reason(reason: ExitReason, side: Side) -> String {
    format!("{reason} (closing {side})")
}

pub struct LiveTrader<'a> {
    data: &'a dyn MarketDataPort,
    broker: &'a mut dyn BrokerPort,
    trade_log: &'a mut dyn TradeLogPort,
    clock: &'a mut dyn Clock,
    pairs: &'a PairBook,
    config: LiveConfig,
    portfolio: Portfolio,
}

impl<'a> LiveTrader<'a> {
    pub fn new(
        data: &'a dyn MarketDataPort,
        broker: &'a mut dyn BrokerPort,
        trade_log: &'a mut dyn TradeLogPort,
        clock: &'a mut dyn Clock,
        pairs: &'a PairBook,
        config: LiveConfig,
    ) -> Self {
        // The broker owns the balance and the trade log owns the history, so the
        // live portfolio only tracks position slots.
        let portfolio = Portfolio::new(pairs.symbols(), 0.0);
        LiveTrader {
            data,
            broker,
            trade_log,
            clock,
            pairs,
            config,
            portfolio,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Run cycles until `max_cycles` is reached, or forever when `None`.
    /// Returns the number of cycles run; stops early on a fatal error.
    pub fn run(&mut self, max_cycles: Option<usize>) -> Result<usize, TraderError> {
        let mut cycles = 0usize;
        while !max_cycles.is_some_and(|max| cycles >= max) {
            self.run_cycle()?;
            cycles += 1;
        }
        Ok(cycles)
    }

    pub fn run_cycle(&mut self) -> Result<CycleOutcome, TraderError> {
        let now = self.clock.now();
        if !self.config.session.is_open(now) {
            info!(
                sleep_secs = self.config.closed_interval.as_secs(),
                "market closed"
            );
            self.clock.sleep(self.config.closed_interval);
            return Ok(CycleOutcome::MarketClosed);
        }

        match self.broker.balance() {
            Ok(balance) => info!(cash = balance.min(self.config.balance_cap), "account balance"),
            Err(e) if e.is_retryable() => warn!(error = %e, "balance unavailable"),
            Err(e) => return Err(e),
        }

        let pairs = self.pairs;
        let mut orders = 0usize;
        for (symbol, pair) in pairs.iter() {
            match self.process_symbol(symbol, pair) {
                Ok(true) => orders += 1,
                Ok(false) => {}
                Err(e) if e.is_retryable() => {
                    warn!(%symbol, error = %e, "skipping symbol this cycle");
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            orders,
            sleep_secs = self.config.poll_interval.as_secs(),
            "cycle complete"
        );
        self.clock.sleep(self.config.poll_interval);
        Ok(CycleOutcome::Completed { orders })
    }

    /// Returns whether an order was placed.
    fn process_symbol(&mut self, symbol: &str, pair: &PairConfig) -> Result<bool, TraderError> {
        let bars = normalize(
            self.data
                .fetch_bars(symbol, Some(pair.lookback), &pair.granularity)?,
        );
        let Some(last) = bars.last() else {
            warn!(%symbol, "no bars received");
            return Ok(false);
        };
        let close = last.close;

        let series = IndicatorSeries::compute(&bars, pair);
        let broker_position = self.broker.position(symbol)?;
        self.reconcile(symbol, broker_position)?;

        let decision = decide(
            self.portfolio.state(symbol)?,
            &series,
            series.last_index(),
            close,
            pair,
        );

        match decision {
            Decision::Hold => {
                match self.portfolio.state(symbol)?.side() {
                    Some(side) => debug!(%symbol, %side, close, "holding"),
                    None => debug!(%symbol, close, "no entry signal"),
                }
                Ok(false)
            }
            Decision::Enter(side) => {
                let units = side.sign() * pair.position_size;
                self.place(symbol, side, units, close, TradeAction::entry(side), entry_reason(side))?;
                self.portfolio.enter(symbol, side, close, Some(self.clock.now()))?;
                Ok(true)
            }
            Decision::Exit(reason) => {
                let Some(side) = self.portfolio.state(symbol)?.side() else {
                    return Ok(false);
                };
                let quantity = broker_position.units.abs().trunc();
                if quantity == 0.0 {
                    warn!(%symbol, units = broker_position.units, "exit quantity rounds to zero");
                    return Ok(false);
                }
                let units = -side.sign() * quantity;
                let reason = exit_reason(reason, side);
                self.place(symbol, side, units, close, TradeAction::exit(side), &reason)?;
                self.portfolio.exit(symbol)?;
                Ok(true)
            }
        }
    }

    /// Submit, then log. A rejected order propagates before any state or log change.
    fn place(
        &mut self,
        symbol: &str,
        side: Side,
        units: f64,
        price: f64,
        action: TradeAction,
        reason: &str,
    ) -> Result<(), TraderError> {
        self.broker.submit_order(&OrderRequest {
            symbol: symbol.to_string(),
            units,
            order_type: OrderType::Market,
            reference_price: price,
        })?;
        info!(%symbol, %side, %action, units, price, reason, "order submitted");

        let record = TradeRecord {
            timestamp: self.clock.now(),
            symbol: symbol.to_string(),
            action,
            price,
            quantity: units,
            profit: None,
            balance: None,
            reason: reason.to_string(),
        };
        self.trade_log.append(&record)
    }

    /// The broker is the source of truth for whether a position exists.
    fn reconcile(&mut self, symbol: &str, broker: BrokerPosition) -> Result<(), TraderError> {
        let local_flat = self.portfolio.state(symbol)?.is_flat();
        match Side::from_units(broker.units) {
            Some(side) if local_flat => {
                info!(%symbol, %side, average_price = broker.average_price, "adopting broker position");
                self.portfolio.sync(
                    symbol,
                    PositionState::Open(OpenPosition {
                        side,
                        entry_price: broker.average_price,
                        entry_time: None,
                    }),
                )
            }
            None if !local_flat => {
                info!(%symbol, "broker is flat, clearing local position");
                self.portfolio.sync(symbol, PositionState::Flat)
            }
            _ => Ok(()),
        }
    }
}
