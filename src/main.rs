use analytics::{AnalyticsEngine, PerformanceReport};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use configuration::{init_tracing, load_config_from, LogFormat};
use core_types::{validate_series, BacktestResult, BacktestTrade, Bar};
use detector::{FlashCrashDetectionResult, FlashCrashDetector};
use events::AlertEvent;
use indicators::IndicatorSuite;
use risk::{GapRiskAssessment, GapRiskAssessor, GapStatistics};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;

/// The main entry point for the riskdesk application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    let mut config = load_config_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    // Held until exit so buffered file output is flushed.
    let _guard = init_tracing(&config.logging)?;

    // Execute the appropriate command
    match cli.command {
        Commands::Gap(args) => handle_gap(args, config.gap_risk, cli.json),
        Commands::Crash(args) => handle_crash(args, config.flash_crash, cli.json).await,
        Commands::Indicators(args) => handle_indicators(args, &config.indicators, cli.json),
        Commands::Backtest(args) => handle_backtest(args, config.backtest, cli.json),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Gap risk, flash crash, indicator and backtest analytics for a trading desk.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path of the TOML configuration file. A missing file means all defaults.
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    /// Print results as pretty JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    /// Overrides `logging.level`, e.g. "debug" or "risk=trace".
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess the opening gap of the latest bar against the previous close.
    Gap(GapArgs),
    /// Scan a bar series for flash crash conditions.
    Crash(CrashArgs),
    /// Compute Stochastic, ADX/DI and Williams %R for a bar series.
    Indicators(IndicatorArgs),
    /// Compute performance metrics for a list of closed trades.
    Backtest(BacktestArgs),
}

#[derive(Parser)]
struct GapArgs {
    /// The symbol being assessed (e.g., "AAPL").
    #[arg(long)]
    symbol: String,

    /// JSON array of bars, oldest first. Earlier bars seed the gap statistics.
    #[arg(long)]
    bars: PathBuf,

    /// Average True Range used to bound the stop distance.
    #[arg(long)]
    atr: Option<Decimal>,
}

#[derive(Parser)]
struct CrashArgs {
    #[arg(long)]
    symbol: String,

    /// JSON array of bars, oldest first.
    #[arg(long)]
    bars: PathBuf,

    /// Feed the bars one by one through a monitoring session instead of
    /// evaluating them as a single window.
    #[arg(long)]
    stream: bool,
}

#[derive(Parser)]
struct IndicatorArgs {
    /// JSON array of bars, oldest first.
    #[arg(long)]
    bars: PathBuf,

    /// Number of trailing rows shown in table output.
    #[arg(long, default_value_t = 10)]
    tail: usize,
}

#[derive(Parser)]
struct BacktestArgs {
    /// JSON array of closed trades.
    #[arg(long)]
    trades: PathBuf,

    /// JSON array of per-trade benchmark returns, in percent.
    #[arg(long)]
    benchmark: Option<PathBuf>,

    #[arg(long, default_value = "BACKTEST")]
    symbol: String,
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn handle_gap(args: GapArgs, config: configuration::GapRiskConfig, json: bool) -> anyhow::Result<()> {
    let bars: Vec<Bar> = read_json(&args.bars)?;
    validate_series(&bars)?;
    let [.., previous, current] = bars.as_slice() else {
        bail!("gap assessment needs at least two bars, got {}", bars.len());
    };

    let mut assessor = GapRiskAssessor::new(config)?;
    assessor.seed_from_history(&args.symbol, &bars[..bars.len() - 1]);
    let assessment = assessor.assess_gap_risk(&args.symbol, current, previous.close, args.atr);
    let statistics = assessor.gap_statistics(&args.symbol).cloned();

    if json {
        #[derive(Serialize)]
        struct GapOutput {
            assessment: GapRiskAssessment,
            statistics: Option<GapStatistics>,
        }
        return print_json(&GapOutput {
            assessment,
            statistics,
        });
    }

    let mut table = new_table(vec!["Field", "Value"]);
    table.add_row(vec!["Symbol".to_string(), assessment.symbol.clone()]);
    table.add_row(vec!["Date".to_string(), assessment.date.to_rfc3339()]);
    table.add_row(vec!["Previous close".to_string(), assessment.previous_close.to_string()]);
    table.add_row(vec!["Open".to_string(), assessment.current_open.to_string()]);
    table.add_row(vec!["Gap %".to_string(), assessment.gap_percent.round_dp(4).to_string()]);
    table.add_row(vec!["Direction".to_string(), format!("{:?}", assessment.direction)]);
    table.add_row(vec!["Risk level".to_string(), format!("{:?}", assessment.risk_level)]);
    table.add_row(vec!["Stop loss".to_string(), assessment.stop_loss.round_dp(4).to_string()]);
    table.add_row(vec!["Take profit".to_string(), assessment.take_profit.round_dp(4).to_string()]);
    table.add_row(vec![
        "Position size".to_string(),
        assessment.position_size_adjustment.to_string(),
    ]);
    table.add_row(vec!["Action".to_string(), format!("{:?}", assessment.recommended_action)]);
    table.add_row(vec![
        "Z-score".to_string(),
        assessment
            .z_score
            .map(|z| z.round_dp(3).to_string())
            .unwrap_or_else(|| "-".to_string()),
    ]);
    if let Some(stats) = &statistics {
        table.add_row(vec![
            "History".to_string(),
            format!(
                "{} gaps, avg {}%, std {}%, {} up / {} down",
                stats.sample_count,
                stats.avg_gap_percent.round_dp(3),
                stats.std_dev_gap_percent.round_dp(3),
                stats.gap_up_count,
                stats.gap_down_count
            ),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Channel capacity large enough to hold every event a file of `bars` can
/// publish: one alert per bar plus the session start and stop notices.
fn alert_capacity(configured: usize, bars: usize) -> usize {
    configured.max(bars.saturating_add(2))
}

async fn handle_crash(
    args: CrashArgs,
    mut config: configuration::FlashCrashConfig,
    json: bool,
) -> anyhow::Result<()> {
    let bars: Vec<Bar> = read_json(&args.bars)?;
    validate_series(&bars)?;
    // The listener must not lag, or alerts would be missing from the report.
    config.alert_channel_capacity = alert_capacity(config.alert_channel_capacity, bars.len());

    let mut detector = FlashCrashDetector::new(config)?;

    // Alerts are consumed on their own task, independent of detection.
    let mut alerts = detector.subscribe();
    let listener = tokio::spawn(async move {
        let mut received = Vec::new();
        loop {
            match alerts.recv().await {
                Ok(event) => received.push(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Alert listener lagged behind.");
                }
                Err(RecvError::Closed) => break,
            }
        }
        received
    });

    let result = if args.stream {
        let mut last = None;
        for bar in bars {
            last = Some(detector.add_data_point(&args.symbol, bar));
            tokio::task::yield_now().await;
        }
        detector.stop_monitoring(&args.symbol);
        last
    } else {
        Some(detector.detect(&args.symbol, &bars))
    };

    // Dropping the detector closes the channel and ends the listener.
    drop(detector);
    let events = listener.await.context("Alert listener task failed")?;

    if json {
        #[derive(Serialize)]
        struct CrashOutput {
            result: Option<FlashCrashDetectionResult>,
            events: Vec<AlertEvent>,
        }
        return print_json(&CrashOutput { result, events });
    }

    let mut alert_table = new_table(vec!["Detected at", "Type", "Severity", "Drop %", "Volume x", "Action"]);
    for event in &events {
        if let AlertEvent::FlashCrash(alert) = event {
            alert_table.add_row(vec![
                alert.detected_at.to_rfc3339(),
                format!("{:?}", alert.alert_type),
                format!("{:?}", alert.severity),
                alert.drop_percent.round_dp(2).to_string(),
                alert.metadata.volume_spike_ratio.round_dp(2).to_string(),
                format!("{:?}", alert.recommended_action),
            ]);
        }
    }
    println!("{alert_table}");

    if let Some(result) = result {
        let mut table = new_table(vec!["Symbol", "Classification", "Drop %", "Volume x", "Trend", "Action", "Bars"]);
        table.add_row(vec![
            result.symbol.clone(),
            result
                .classification
                .map(|c| format!("{:?}", c))
                .unwrap_or_else(|| "-".to_string()),
            result.max_drop_percent.round_dp(2).to_string(),
            result.volume_spike_ratio.round_dp(2).to_string(),
            format!("{:?}", result.trend),
            format!("{:?}", result.recommended_action),
            result.data_points.to_string(),
        ]);
        println!("{table}");
    }
    Ok(())
}

fn handle_indicators(
    args: IndicatorArgs,
    config: &configuration::IndicatorConfig,
    json: bool,
) -> anyhow::Result<()> {
    let bars: Vec<Bar> = read_json(&args.bars)?;
    validate_series(&bars)?;
    let suite = IndicatorSuite::compute(&bars, config)?;

    if json {
        return print_json(&suite);
    }

    let mut table = new_table(vec!["Date", "Close", "%K", "%D", "ADX", "+DI", "-DI", "%R", "Stoch", "W%R"]);
    let start = bars.len().saturating_sub(args.tail);
    for (ix, bar) in bars.iter().enumerate().skip(start) {
        table.add_row(vec![
            bar.date.format("%Y-%m-%d %H:%M").to_string(),
            bar.close.to_string(),
            fmt_opt(suite.stochastic.k[ix]),
            fmt_opt(suite.stochastic.d[ix]),
            fmt_opt(suite.adx.adx[ix]),
            fmt_opt(suite.adx.plus_di[ix]),
            fmt_opt(suite.adx.minus_di[ix]),
            fmt_opt(suite.williams_r[ix]),
            format!("{:?}", suite.stochastic_signals[ix]),
            format!("{:?}", suite.williams_signals[ix]),
        ]);
    }
    println!("{table}");

    let composite = suite.composite;
    let trend = composite
        .trend
        .map(|t| match t.direction {
            Some(direction) => format!("{:?} {:?}", t.strength, direction),
            None => format!("{:?}", t.strength),
        })
        .unwrap_or_else(|| "-".to_string());
    println!(
        "Stochastic: {:?}  Williams %R: {:?}  Trend: {}  Consensus: {:?}",
        composite.stochastic, composite.williams, trend, composite.consensus
    );
    Ok(())
}

fn handle_backtest(
    args: BacktestArgs,
    config: configuration::BacktestMetricsConfig,
    json: bool,
) -> anyhow::Result<()> {
    let trades: Vec<BacktestTrade> = read_json(&args.trades)?;
    let benchmark: Option<Vec<f64>> = args.benchmark.as_deref().map(read_json::<Vec<f64>>).transpose()?;

    let result = BacktestResult::from_trades(args.symbol, trades).context("failed to summarise backtest trades")?;
    let engine = AnalyticsEngine::new(config)?;
    let report = engine.calculate(&result, benchmark.as_deref())?;

    if json {
        return print_json(&report);
    }
    println!("{}", report_table(&report));
    Ok(())
}

fn report_table(report: &PerformanceReport) -> Table {
    let mut table = new_table(vec!["Metric", "Value"]);
    let rows: Vec<(&str, String)> = vec![
        ("Total trades", report.total_trades.to_string()),
        ("Win rate %", format!("{:.2}", report.win_rate_pct)),
        ("Total return %", report.total_return_pct.round_dp(2).to_string()),
        ("Annualized return %", fmt_opt(report.annualized_return_pct)),
        ("Max drawdown %", report.drawdown.max_drawdown_pct.round_dp(2).to_string()),
        ("Drawdown episodes", report.drawdown.episodes.len().to_string()),
        ("Sharpe", fmt_opt(report.sharpe_ratio)),
        ("Sortino", fmt_opt(report.sortino_ratio)),
        ("Calmar", fmt_opt(report.calmar_ratio)),
        ("Omega", fmt_opt(report.omega_ratio)),
        ("Pain", fmt_opt(report.pain_ratio)),
        ("Profit factor", fmt_opt(report.profit_factor)),
        ("Expectancy %", format!("{:.2}", report.expectancy_pct)),
        ("Largest win %", format!("{:.2}", report.largest_win_pct)),
        ("Largest loss %", format!("{:.2}", report.largest_loss_pct)),
        ("Max consecutive wins", report.max_consecutive_wins.to_string()),
        ("Max consecutive losses", report.max_consecutive_losses.to_string()),
        ("Avg holding days", format!("{:.2}", report.average_holding_days)),
        ("Return std dev %", format!("{:.2}", report.distribution.std_dev)),
        ("Return skewness", fmt_opt(report.distribution.skewness)),
    ];
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value]);
    }
    if let Some(benchmark) = &report.benchmark {
        table.add_row(vec!["Alpha %".to_string(), format!("{:.2}", benchmark.alpha)]);
        table.add_row(vec!["Beta".to_string(), fmt_opt(benchmark.beta)]);
        table.add_row(vec!["Correlation".to_string(), fmt_opt(benchmark.correlation)]);
        table.add_row(vec!["Information ratio".to_string(), fmt_opt(benchmark.information_ratio)]);
    }
    table
}

// ==============================================================================
// Helpers
// ==============================================================================

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_capacity_covers_every_bar() {
        assert_eq!(alert_capacity(64, 10), 64);
        assert_eq!(alert_capacity(64, 500), 502);
        assert_eq!(alert_capacity(1, usize::MAX), usize::MAX);
    }
}
