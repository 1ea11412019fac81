//! End-to-end tests over the port boundary.
//!
//! Tests cover:
//! - Backtest pipeline from a mock data port through metrics
//! - Session filtering, symbol tie-breaks and non-USD quotes in the backtest
//! - Live cycles: entry, broker reconciliation, take-profit exit
//! - Market-closed cycles and sleep intervals
//! - Failure isolation: rejected orders, fetch errors, balance errors
//! - Fatal trade log errors stop the loop
//! - Non-finite prices never reach a fill or the balance

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use pairtrader::adapters::csv_adapter::CsvAdapter;
use pairtrader::cli::load_symbol_data;
use pairtrader::domain::backtest::{run_backtest, BacktestConfig};
use pairtrader::domain::error::TraderError;
use pairtrader::domain::live::{CycleOutcome, LiveConfig, LiveTrader};
use pairtrader::domain::metrics::{Metrics, SymbolResult};
use pairtrader::domain::position::Side;
use pairtrader::domain::trade::TradeAction;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const EUR: &str = "EURUSD=X";
const GBP: &str = "GBPUSD=X";

mod backtest_pipeline {
    use super::*;

    #[test]
    fn mock_port_to_metrics() {
        let port = MockDataPort::new().with_bars(
            EUR,
            bars_at(EUR, utc(2024, 1, 2, 14, 0), &[100.0, 99.0, 101.0]),
        );
        let book = fast_book(&[EUR]);

        let data = load_symbol_data(&port, &book);
        assert_eq!(data.len(), 1);

        let result = run_backtest(&data, &book, &BacktestConfig::default()).unwrap();
        assert_eq!(result.portfolio.trades.len(), 2);
        assert_abs_diff_eq!(result.portfolio.balance, 119.95465, epsilon = 1e-9);

        let metrics = Metrics::compute(&result.portfolio);
        assert_eq!(metrics.total_trades, 1);
        assert_eq!(metrics.trades_won, 1);
        assert_abs_diff_eq!(metrics.win_rate, 1.0);
        assert_abs_diff_eq!(metrics.net_profit, 19.95465, epsilon = 1e-9);
        assert_abs_diff_eq!(metrics.max_drawdown, 0.0);
    }

    #[test]
    fn failing_and_empty_symbols_are_skipped() {
        let port = MockDataPort::new()
            .with_bars(
                EUR,
                bars_at(EUR, utc(2024, 1, 2, 14, 0), &[100.0, 99.0, 101.0]),
            )
            .with_error(GBP, "connection reset");
        let book = fast_book(&[GBP, EUR, "USDJPY=X"]);

        let data = load_symbol_data(&port, &book);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].symbol, EUR);

        let result = run_backtest(&data, &book, &BacktestConfig::default()).unwrap();
        assert_eq!(result.portfolio.trades.len(), 2);
    }

    #[test]
    fn session_filter_skips_premarket_bars() {
        // 12:00 UTC is 07:00 US/Eastern, so only the 13:00 bars trade.
        let mut bars = bars_at(EUR, utc(2024, 1, 2, 12, 50), &[100.0, 99.0]);
        bars.extend(bars_at(EUR, utc(2024, 1, 2, 13, 0), &[98.0, 97.0]));
        let port = MockDataPort::new().with_bars(EUR, bars);
        let book = fast_book(&[EUR]);

        let data = load_symbol_data(&port, &book);
        let result = run_backtest(&data, &book, &BacktestConfig::default()).unwrap();

        assert_eq!(result.bars_skipped, 2);
        assert_eq!(result.bars_processed, 2);
        let first = &result.portfolio.trades[0];
        assert_eq!(first.timestamp, utc(2024, 1, 2, 13, 0));
        assert_eq!(first.action, TradeAction::Buy);
    }

    #[test]
    fn simultaneous_bars_follow_book_order() {
        let start = utc(2024, 1, 2, 14, 0);
        let port = MockDataPort::new()
            .with_bars(EUR, bars_at(EUR, start, &[100.0, 99.0, 101.0]))
            .with_bars(GBP, bars_at(GBP, start, &[100.0, 99.0, 101.0]));
        let book = fast_book(&[GBP, EUR]);

        let data = load_symbol_data(&port, &book);
        let result = run_backtest(&data, &book, &BacktestConfig::default()).unwrap();
        let symbols: Vec<&str> = result
            .portfolio
            .trades
            .iter()
            .map(|t| t.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec![GBP, EUR, GBP, EUR]);

        let per_symbol = SymbolResult::compute_per_symbol(&result.portfolio.trades);
        assert_eq!(per_symbol.len(), 2);
        assert_eq!(per_symbol[0].symbol, GBP);
        assert_abs_diff_eq!(
            per_symbol[0].total_profit,
            per_symbol[1].total_profit,
            epsilon = 1e-12
        );
    }

    #[test]
    fn non_usd_quote_converts_profit() {
        let symbol = "USDJPY=X";
        let port = MockDataPort::new().with_bars(
            symbol,
            bars_at(symbol, utc(2024, 1, 2, 14, 0), &[100.0, 99.0, 101.0]),
        );
        let book = fast_book(&[symbol]);

        let data = load_symbol_data(&port, &book);
        let result = run_backtest(&data, &book, &BacktestConfig::default()).unwrap();

        let exit = &result.portfolio.trades[1];
        let expected = (100.999 - 99.0) * 10.0 / 100.999 - 0.000035 * 10.0 * 101.0;
        assert_abs_diff_eq!(exit.profit.unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn nan_row_in_csv_is_dropped_before_trading() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("EURUSD=X.csv"),
            "timestamp,open,high,low,close\n\
             2024-01-02 12:50:00,1.10,1.10,1.10,1.10\n\
             2024-01-02 12:55:00,1.09,1.09,1.09,1.09\n\
             2024-01-02 13:00:00,NaN,NaN,NaN,NaN\n\
             2024-01-02 13:05:00,1.05,1.05,1.05,1.05\n\
             2024-01-02 13:10:00,1.10,1.10,1.10,1.10\n\
             2024-01-02 13:15:00,1.15,1.15,1.15,1.15\n\
             2024-01-02 13:20:00,1.20,1.20,1.20,1.20\n",
        )
        .unwrap();
        let port = CsvAdapter::new(dir.path().to_path_buf());
        let book = fast_book(&[EUR]);

        let data = load_symbol_data(&port, &book);
        assert_eq!(data[0].bars.len(), 6);

        let result = run_backtest(&data, &book, &BacktestConfig::default()).unwrap();
        let trades = &result.portfolio.trades;
        assert!(!trades.is_empty());
        assert_eq!(trades[0].timestamp, utc(2024, 1, 2, 13, 5));
        assert_abs_diff_eq!(trades[0].price, 1.05);
        for trade in trades {
            assert!(trade.price.is_finite());
            assert!(trade.profit.is_none_or(f64::is_finite));
            assert!(trade.balance.is_none_or(f64::is_finite));
        }
        assert!(result.portfolio.balance.is_finite());
    }

    #[test]
    fn non_finite_bars_from_any_port_are_ignored() {
        let mut bars = bars_at(EUR, utc(2024, 1, 2, 14, 0), &[100.0, 99.0, 101.0]);
        bars.insert(2, make_bar(EUR, utc(2024, 1, 2, 14, 7), f64::NAN));
        let port = MockDataPort::new().with_bars(EUR, bars);
        let book = fast_book(&[EUR]);

        let data = load_symbol_data(&port, &book);
        let result = run_backtest(&data, &book, &BacktestConfig::default()).unwrap();
        assert_abs_diff_eq!(result.portfolio.balance, 119.95465, epsilon = 1e-9);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let start = utc(2024, 1, 2, 14, 0);
        let port = MockDataPort::new()
            .with_bars(EUR, bars_at(EUR, start, &[100.0, 99.0, 97.0, 99.0, 102.0, 101.0]))
            .with_bars(GBP, bars_at(GBP, start, &[100.0, 101.0, 103.0, 100.0, 98.0, 99.0]));
        let book = fast_book(&[EUR, GBP]);
        let data = load_symbol_data(&port, &book);

        let first = run_backtest(&data, &book, &BacktestConfig::default()).unwrap();
        let second = run_backtest(&data, &book, &BacktestConfig::default()).unwrap();
        assert_eq!(first.portfolio, second.portfolio);
    }
}

mod live_loop {
    use super::*;

    fn falling() -> Vec<Bar> {
        bars_at(EUR, utc(2024, 1, 3, 14, 45), &[100.0, 99.0, 98.0])
    }

    fn rising() -> Vec<Bar> {
        bars_at(EUR, utc(2024, 1, 3, 14, 45), &[98.0, 99.0, 100.0])
    }

    #[test]
    fn oversold_cycle_opens_long() {
        let data = MockDataPort::new().with_bars(EUR, falling());
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker::new(250.0);
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(open_market());

        let outcome = {
            let mut trader = LiveTrader::new(
                &data,
                &mut broker,
                &mut log,
                &mut clock,
                &book,
                LiveConfig::default(),
            );
            let outcome = trader.run_cycle().unwrap();
            assert_eq!(trader.portfolio().state(EUR).unwrap().side(), Some(Side::Long));
            // History lives in the trade log only.
            assert!(trader.portfolio().trades.is_empty());
            outcome
        };

        assert_eq!(outcome, CycleOutcome::Completed { orders: 1 });
        assert_eq!(broker.orders.len(), 1);
        assert_abs_diff_eq!(broker.orders[0].units, 10.0);
        assert_abs_diff_eq!(broker.orders[0].reference_price, 98.0);

        assert_eq!(log.records.len(), 1);
        let record = &log.records[0];
        assert_eq!(record.action, TradeAction::Buy);
        assert_eq!(record.reason, "Long Entry Signal");
        assert_abs_diff_eq!(record.quantity, 10.0);
        assert_eq!(record.timestamp, open_market());
        assert_eq!(record.profit, None);

        assert_eq!(clock.sleeps, vec![Duration::from_secs(300)]);
    }

    #[test]
    fn adopted_broker_position_exits_on_take_profit() {
        let data = MockDataPort::new().with_bars(EUR, rising());
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker::new(250.0).with_position(EUR, 10.0, 98.0);
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(open_market());

        {
            let mut trader = LiveTrader::new(
                &data,
                &mut broker,
                &mut log,
                &mut clock,
                &book,
                LiveConfig::default(),
            );
            assert_eq!(
                trader.run_cycle().unwrap(),
                CycleOutcome::Completed { orders: 1 }
            );
            assert!(trader.portfolio().state(EUR).unwrap().is_flat());
        }

        assert_abs_diff_eq!(broker.orders[0].units, -10.0);
        assert_abs_diff_eq!(broker.positions[EUR].units, 0.0);
        assert_eq!(log.records[0].action, TradeAction::Sell);
        assert_eq!(log.records[0].reason, "Take Profit (closing LONG)");
    }

    #[test]
    fn fractional_broker_position_is_not_closed() {
        // 97 is below the 98 stop, but half a unit truncates to nothing.
        let data = MockDataPort::new().with_bars(
            EUR,
            bars_at(EUR, utc(2024, 1, 3, 14, 45), &[100.0, 99.0, 97.0]),
        );
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker::new(250.0).with_position(EUR, 0.5, 100.0);
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(open_market());

        {
            let mut trader = LiveTrader::new(
                &data,
                &mut broker,
                &mut log,
                &mut clock,
                &book,
                LiveConfig::default(),
            );
            assert_eq!(
                trader.run_cycle().unwrap(),
                CycleOutcome::Completed { orders: 0 }
            );
            assert_eq!(trader.portfolio().state(EUR).unwrap().side(), Some(Side::Long));
        }

        assert!(broker.orders.is_empty());
        assert!(log.records.is_empty());
        assert_abs_diff_eq!(broker.positions[EUR].units, 0.5);
    }

    #[test]
    fn nan_latest_bar_falls_back_to_last_finite() {
        let mut bars = falling();
        bars.push(make_bar(EUR, utc(2024, 1, 3, 15, 0), f64::NAN));
        let data = MockDataPort::new().with_bars(EUR, bars);
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker::new(250.0);
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(open_market());

        LiveTrader::new(
            &data,
            &mut broker,
            &mut log,
            &mut clock,
            &book,
            LiveConfig::default(),
        )
        .run_cycle()
        .unwrap();

        assert_eq!(broker.orders.len(), 1);
        assert_abs_diff_eq!(broker.orders[0].reference_price, 98.0);
        assert_abs_diff_eq!(log.records[0].price, 98.0);
    }

    #[test]
    fn overbought_in_uptrend_holds() {
        let data = MockDataPort::new().with_bars(EUR, rising());
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker::new(250.0);
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(open_market());

        let mut trader = LiveTrader::new(
            &data,
            &mut broker,
            &mut log,
            &mut clock,
            &book,
            LiveConfig::default(),
        );
        assert_eq!(
            trader.run_cycle().unwrap(),
            CycleOutcome::Completed { orders: 0 }
        );
        assert!(trader.portfolio().trades.is_empty());
    }

    #[test]
    fn broker_flat_clears_local_position() {
        let data = MockDataPort::new().with_bars(EUR, falling());
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker {
            ignore_fills: true,
            ..MockBroker::new(250.0)
        };
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(open_market());

        let cycles = LiveTrader::new(
            &data,
            &mut broker,
            &mut log,
            &mut clock,
            &book,
            LiveConfig::default(),
        )
        .run(Some(2))
        .unwrap();

        // Without the reset the second cycle would hold the phantom long.
        assert_eq!(cycles, 2);
        assert_eq!(broker.orders.len(), 2);
        assert!(broker.orders.iter().all(|o| o.units > 0.0));
    }

    #[test]
    fn weekend_cycle_sleeps_without_fetching() {
        let data = MockDataPort::new().with_bars(EUR, falling());
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker::new(250.0);
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(weekend());

        let outcome = LiveTrader::new(
            &data,
            &mut broker,
            &mut log,
            &mut clock,
            &book,
            LiveConfig::default(),
        )
        .run_cycle()
        .unwrap();

        assert_eq!(outcome, CycleOutcome::MarketClosed);
        assert_eq!(data.calls.get(), 0);
        assert!(broker.orders.is_empty());
        assert_eq!(clock.sleeps, vec![Duration::from_secs(60)]);
    }

    #[test]
    fn after_hours_weekday_is_closed() {
        // 23:30 UTC is 18:30 US/Eastern.
        let data = MockDataPort::new().with_bars(EUR, falling());
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker::new(250.0);
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(utc(2024, 1, 3, 23, 30));

        let outcome = LiveTrader::new(
            &data,
            &mut broker,
            &mut log,
            &mut clock,
            &book,
            LiveConfig::default(),
        )
        .run_cycle()
        .unwrap();
        assert_eq!(outcome, CycleOutcome::MarketClosed);
    }

    #[test]
    fn rejected_order_leaves_state_untouched() {
        let data = MockDataPort::new().with_bars(EUR, falling());
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker::new(250.0).rejecting(EUR);
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(open_market());

        {
            let mut trader = LiveTrader::new(
                &data,
                &mut broker,
                &mut log,
                &mut clock,
                &book,
                LiveConfig::default(),
            );
            assert_eq!(
                trader.run_cycle().unwrap(),
                CycleOutcome::Completed { orders: 0 }
            );
            assert!(trader.portfolio().state(EUR).unwrap().is_flat());
            assert!(trader.portfolio().trades.is_empty());
        }

        assert!(log.records.is_empty());
        assert_eq!(clock.sleeps.len(), 1);
    }

    #[test]
    fn fetch_failure_skips_only_that_symbol() {
        let data = MockDataPort::new()
            .with_error(GBP, "timeout")
            .with_bars(EUR, falling());
        let book = fast_book(&[GBP, EUR]);
        let mut broker = MockBroker::new(250.0);
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(open_market());

        let outcome = LiveTrader::new(
            &data,
            &mut broker,
            &mut log,
            &mut clock,
            &book,
            LiveConfig::default(),
        )
        .run_cycle()
        .unwrap();

        assert_eq!(outcome, CycleOutcome::Completed { orders: 1 });
        assert_eq!(data.calls.get(), 2);
        assert_eq!(broker.orders[0].symbol, EUR);
    }

    #[test]
    fn balance_failure_is_not_fatal() {
        let data = MockDataPort::new().with_bars(EUR, falling());
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker {
            balance_error: true,
            ..MockBroker::new(250.0)
        };
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(open_market());

        let outcome = LiveTrader::new(
            &data,
            &mut broker,
            &mut log,
            &mut clock,
            &book,
            LiveConfig::default(),
        )
        .run_cycle()
        .unwrap();
        assert_eq!(outcome, CycleOutcome::Completed { orders: 1 });
    }

    #[test]
    fn trade_log_failure_stops_the_loop() {
        let data = MockDataPort::new().with_bars(EUR, falling());
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker::new(250.0);
        let mut log = RecordingLog {
            fail: true,
            ..Default::default()
        };
        let mut clock = FixedClock::at(open_market());

        let err = LiveTrader::new(
            &data,
            &mut broker,
            &mut log,
            &mut clock,
            &book,
            LiveConfig::default(),
        )
        .run(Some(3))
        .unwrap_err();

        assert!(matches!(err, TraderError::TradeLog { .. }));
        assert!(clock.sleeps.is_empty());
    }

    #[test]
    fn bounded_run_enters_once_then_holds() {
        let data = MockDataPort::new().with_bars(EUR, falling());
        let book = fast_book(&[EUR]);
        let mut broker = MockBroker::new(250.0);
        let mut log = RecordingLog::default();
        let mut clock = FixedClock::at(open_market());

        let cycles = LiveTrader::new(
            &data,
            &mut broker,
            &mut log,
            &mut clock,
            &book,
            LiveConfig::default(),
        )
        .run(Some(3))
        .unwrap();

        assert_eq!(cycles, 3);
        assert_eq!(broker.orders.len(), 1);
        assert_eq!(log.records.len(), 1);
        assert_eq!(clock.sleeps.len(), 3);
        assert_eq!(clock.now, open_market() + chrono::Duration::minutes(15));
    }
}
