//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_trade_log::{CsvTradeLog, TradeLogFormat};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::adapters::system_clock::SystemClock;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig};
use crate::domain::config_validation::{
    load_backtest_config, load_live_config, load_pair_book, value_or, BACKTEST_SECTION,
    LIVE_SECTION,
};
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::live::{LiveConfig, LiveTrader};
use crate::domain::metrics::{Metrics, SymbolResult};
use crate::domain::pair_config::PairBook;
use crate::domain::signal::{
    ema_crossover_signal, ema_trend, entry_signal, macd_crossover_signal, rsi_signal,
};
use crate::domain::symbol_data::SymbolData;
use crate::domain::trade::TradeRecord;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::trade_log_port::TradeLogPort;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_BACKTEST_OUTPUT: &str = "backtest_results.csv";
pub const DEFAULT_TRADE_LOG: &str = "trade_log.csv";
pub const DEFAULT_PAPER_BALANCE: f64 = 100.0;

#[derive(Parser, Debug)]
#[command(name = "pairtrader", about = "Rule-based currency pair backtester and live trader")]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over CSV bars
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the live loop against the paper broker
    Live {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show indicator values and signals at the latest bar of a symbol
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

/// Install the fmt subscriber on stderr. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            output,
            data_dir,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, output.as_deref(), data_dir.as_deref())
            }
        }
        Command::Live {
            config,
            data_dir,
            cycles,
        } => run_live(&config, data_dir.as_deref(), cycles),
        Command::Validate { config } => run_validate(&config),
        Command::Signals {
            config,
            symbol,
            data_dir,
        } => run_signals(&config, &symbol, data_dir.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| TraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// `--data-dir`, then `[backtest] data_dir`, then `./data`.
pub fn resolve_data_dir(data_dir: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    data_dir
        .map(Path::to_path_buf)
        .or_else(|| config.get_string(BACKTEST_SECTION, "data_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

pub fn run_backtest(
    config_path: &Path,
    output_path: Option<&Path>,
    data_dir: Option<&Path>,
) -> Result<ExitCode, TraderError> {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let book = load_pair_book(&adapter)?;
    let bt_config = load_backtest_config(&adapter)?;

    // Stage 2: Load bars and compute indicators
    let data_dir = resolve_data_dir(data_dir, &adapter);
    let data_port = CsvAdapter::new(data_dir.clone());
    let symbol_data = load_symbol_data(&data_port, &book);
    if symbol_data.is_empty() {
        return Err(TraderError::DataFetch {
            symbol: book.symbols().collect::<Vec<_>>().join(","),
            reason: format!("no bars in {}", data_dir.display()),
        });
    }

    // Stage 3: Run
    eprintln!(
        "Running backtest: {} symbols, initial balance {:.2}",
        symbol_data.len(),
        bt_config.initial_balance
    );
    let result = backtest_engine::run_backtest(&symbol_data, &book, &bt_config)?;
    eprintln!(
        "  Processed: {} bars ({} outside trading hours)",
        result.bars_processed, result.bars_skipped
    );

    // Stage 4: Summary
    eprint!(
        "{}",
        format_summary(&result.portfolio.trades, &Metrics::compute(&result.portfolio))
    );

    // Stage 5: Trade log
    let output = output_path
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_string(BACKTEST_SECTION, "output").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKTEST_OUTPUT));
    if result.portfolio.trades.is_empty() {
        eprintln!("\nNo trades executed.");
    }
    let mut log = CsvTradeLog::create(&output, TradeLogFormat::Backtest)?;
    for trade in &result.portfolio.trades {
        log.append(trade)?;
    }
    eprintln!("\nTrade log written to: {}", output.display());
    Ok(ExitCode::SUCCESS)
}

/// Fetch every configured symbol in book order. Symbols whose data cannot be
/// read or is empty are skipped with a warning.
pub fn load_symbol_data(data_port: &dyn MarketDataPort, book: &PairBook) -> Vec<SymbolData> {
    let mut symbol_data = Vec::with_capacity(book.len());
    for (symbol, pair) in book.iter() {
        match data_port.fetch_bars(symbol, None, &pair.granularity) {
            Ok(bars) if bars.is_empty() => {
                eprintln!("warning: skipping {symbol} (no bars)");
            }
            Ok(bars) => {
                eprintln!("  {symbol}: {} bars", bars.len());
                symbol_data.push(SymbolData::new(symbol, bars, pair));
            }
            Err(e) => eprintln!("warning: skipping {symbol} ({e})"),
        }
    }
    symbol_data
}

/// Aggregate and per-symbol results as printed after a backtest.
pub fn format_summary(trades: &[TradeRecord], metrics: &Metrics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== Aggregate Results ===");
    let _ = writeln!(out, "Initial Balance:  {:.2}", metrics.initial_balance);
    let _ = writeln!(out, "Final Balance:    {:.2}", metrics.final_balance);
    let _ = writeln!(out, "Net Profit:       {:.2}", metrics.net_profit);
    let _ = writeln!(out, "Total Return:     {:.2}%", metrics.total_return * 100.0);
    let _ = writeln!(out, "Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    let _ = writeln!(
        out,
        "Total Trades:     {} ({} won, {} lost, {} breakeven)",
        metrics.total_trades, metrics.trades_won, metrics.trades_lost, metrics.trades_breakeven
    );
    let _ = writeln!(out, "Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    let _ = writeln!(out, "Profit Factor:    {:.2}", metrics.profit_factor);
    let _ = writeln!(out, "Average Win:      {:.2}", metrics.avg_win);
    let _ = writeln!(out, "Average Loss:     {:.2}", metrics.avg_loss);
    let _ = writeln!(out, "Largest Win:      {:.2}", metrics.largest_win);
    let _ = writeln!(out, "Largest Loss:     {:.2}", metrics.largest_loss);

    let symbol_results = SymbolResult::compute_per_symbol(trades);
    if !symbol_results.is_empty() {
        let _ = writeln!(out, "\n=== Per-Symbol Summary ===");
        for sr in &symbol_results {
            let pnl_sign = if sr.total_profit >= 0.0 { "+" } else { "" };
            let _ = writeln!(
                out,
                "  {}:  {} trades, {:.1}% win rate, {}{:.2}",
                sr.symbol,
                sr.total_trades,
                sr.win_rate * 100.0,
                pnl_sign,
                sr.total_profit,
            );
        }
    }
    out
}

fn print_config(book: &PairBook, bt_config: &BacktestConfig, live_config: &LiveConfig) {
    eprintln!("\nPairs:");
    for (symbol, pair) in book.iter() {
        eprintln!(
            "  {symbol}: rsi {}/{}/{}, ema {}/{}, macd signal {}, sl {}, tp {}, size {}, quote {}",
            pair.rsi_period,
            pair.rsi_down,
            pair.rsi_up,
            pair.ema_short,
            pair.ema_long,
            pair.macd_signal,
            pair.sl_pct,
            pair.tp_pct,
            pair.position_size,
            pair.quote_currency,
        );
    }
    let session = &bt_config.session;
    eprintln!(
        "\nSession: {}-{} {}",
        session.start.format("%H:%M"),
        session.end.format("%H:%M"),
        session.timezone
    );
    eprintln!(
        "Backtest: initial balance {:.2}, slippage {}",
        bt_config.initial_balance, bt_config.execution.slippage
    );
    eprintln!(
        "Live: poll {}s, closed {}s, balance cap {:.2}",
        live_config.poll_interval.as_secs(),
        live_config.closed_interval.as_secs(),
        live_config.balance_cap
    );
}

pub fn run_dry_run(config_path: &Path) -> Result<ExitCode, TraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let book = load_pair_book(&adapter)?;
    let bt_config = load_backtest_config(&adapter)?;
    let live_config = load_live_config(&adapter)?;
    eprintln!("Config validated successfully");

    print_config(&book, &bt_config, &live_config);
    eprintln!(
        "\nData directory: {}",
        resolve_data_dir(None, &adapter).display()
    );
    eprintln!("\nDry run complete: configuration is valid");
    Ok(ExitCode::SUCCESS)
}

pub fn run_validate(config_path: &Path) -> Result<ExitCode, TraderError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = load_config(config_path)?;
    let book = load_pair_book(&adapter)?;
    let bt_config = load_backtest_config(&adapter)?;
    let live_config = load_live_config(&adapter)?;

    print_config(&book, &bt_config, &live_config);
    eprintln!("\nConfiguration is valid ({} pairs)", book.len());
    Ok(ExitCode::SUCCESS)
}

pub fn run_live(
    config_path: &Path,
    data_dir: Option<&Path>,
    cycles: Option<usize>,
) -> Result<ExitCode, TraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let book = load_pair_book(&adapter)?;
    let live_config = load_live_config(&adapter)?;
    let paper_balance: f64 =
        value_or(&adapter, LIVE_SECTION, "paper_balance", DEFAULT_PAPER_BALANCE)?;
    let trade_log_path = adapter
        .get_string(LIVE_SECTION, "trade_log")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TRADE_LOG));

    let data_port = CsvAdapter::new(resolve_data_dir(data_dir, &adapter));
    let mut broker = PaperBroker::new(paper_balance);
    let mut trade_log = CsvTradeLog::append_to(&trade_log_path, TradeLogFormat::Live);
    let mut clock = SystemClock;

    eprintln!(
        "Starting live loop: {} pairs, paper balance {:.2}, trade log {}",
        book.len(),
        paper_balance,
        trade_log_path.display()
    );
    let mut trader = LiveTrader::new(
        &data_port,
        &mut broker,
        &mut trade_log,
        &mut clock,
        &book,
        live_config,
    );
    let completed = trader.run(cycles)?;
    eprintln!("Live loop stopped after {completed} cycles");
    Ok(ExitCode::SUCCESS)
}

fn last_value(column: &[f64]) -> f64 {
    column.last().copied().unwrap_or(f64::NAN)
}

pub fn run_signals(
    config_path: &Path,
    symbol: &str,
    data_dir: Option<&Path>,
) -> Result<ExitCode, TraderError> {
    let adapter = load_config(config_path)?;
    let book = load_pair_book(&adapter)?;
    let pair = book.get(symbol)?;

    let data_port = CsvAdapter::new(resolve_data_dir(data_dir, &adapter));
    let bars = data_port.fetch_bars(symbol, Some(pair.lookback), &pair.granularity)?;
    let Some(last) = bars.last() else {
        return Err(TraderError::DataFetch {
            symbol: symbol.to_string(),
            reason: "no bars".into(),
        });
    };

    let series = IndicatorSeries::compute(&bars, pair);
    let i = series.last_index();
    let rsi = series
        .rsi
        .last()
        .copied()
        .flatten()
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| "n/a".to_string());

    println!("symbol:      {symbol}");
    println!("timestamp:   {}", last.timestamp.to_rfc3339());
    println!("close:       {}", last.close);
    println!("rsi:         {rsi}");
    println!("ema_short:   {:.6}", last_value(&series.ema_short));
    println!("ema_long:    {:.6}", last_value(&series.ema_long));
    println!("macd_hist:   {:.6}", last_value(&series.macd_hist));
    println!("trend:       {}", ema_trend(&series, i));
    println!(
        "rsi_signal:  {}",
        rsi_signal(&series, i, pair.rsi_up, pair.rsi_down)
    );
    println!("ema_cross:   {}", ema_crossover_signal(&series, i));
    println!("macd_cross:  {}", macd_crossover_signal(&series, i));
    println!("entry:       {}", entry_signal(&series, i, pair));
    Ok(ExitCode::SUCCESS)
}
