use crate::cache::CacheStats;
use crate::connectivity::ConnectivityReport;
use crate::results::{BreakoutResult, ReversalResult, ScreeningCriteriaResult};
use crate::results_store::StoredResult;
use crate::signal::StochSignal;
use chrono::{DateTime, Utc};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

/// Brightness for a row relative to the top row: 1.0 for the leader, never
/// dimmer than 0.4.
fn visibility_ratio(value: f64, top: f64) -> f64 {
    if top <= 0.0 || !value.is_finite() {
        return 0.4;
    }
    (0.4 + 0.6 * (value / top)).clamp(0.4, 1.0)
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(dt) => dt.format("%d-%m-%Y %H:%M:%S").to_string(),
        None => "Unknown Time".to_string(),
    }
}

fn opt(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{:.*}", decimals, v))
        .unwrap_or_else(|| "-".to_string())
}

fn compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e12 {
        format!("{:.2}T", value / 1e12)
    } else if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else {
        format!("{:.0}", value)
    }
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

fn signed_cell(value: f64, decimals: usize) -> Cell {
    let color = if value > 0.0 {
        Color::Green
    } else if value < 0.0 {
        Color::Red
    } else {
        Color::DarkGrey
    };
    Cell::new(format!("{:+.*}", decimals, value))
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

fn stoch_cell(signal: Option<StochSignal>) -> Cell {
    match signal {
        Some(StochSignal::Buy) => Cell::new("BUY").fg(Color::Green),
        Some(StochSignal::Sell) => Cell::new("SELL").fg(Color::Red),
        Some(StochSignal::Hold) => Cell::new("HOLD").fg(Color::Yellow),
        None => Cell::new("-").fg(Color::DarkGrey),
    }
}

pub fn momentum_table(rows: &[ScreeningCriteriaResult]) -> Table {
    let mut table = new_table(&[
        "Rank", "Symbol", "Score", "RSI mom", "SMA mom", "RSI now/prev", "Close", "Avg Vol", "Mkt Cap",
        "Stoch", "Verdict",
    ]);

    let top = rows.first().map(|r| r.composite_score).unwrap_or(1.0);
    for (i, row) in rows.iter().enumerate() {
        let ratio = visibility_ratio(row.composite_score, top);
        let cyan = (255.0 * ratio) as u8;

        let name = match &row.asset_name {
            Some(name) => format!("{} ({})", row.symbol, name),
            None => row.symbol.clone(),
        };
        let verdict = match row.verdict {
            Some(v) => format!("{} [{}]", v, v.confidence()),
            None => "-".to_string(),
        };

        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(name).fg(Color::Rgb { r: 0, g: cyan, b: cyan }),
            Cell::new(format!("{:.2}", row.composite_score)).set_alignment(CellAlignment::Right),
            signed_cell(row.rsi_momentum, 2),
            signed_cell(row.sma_momentum, 2),
            Cell::new(format!("{:.1} / {:.1}", row.rsi_current_avg, row.rsi_prev_avg)),
            Cell::new(format!("{:.2}", row.close_price)).set_alignment(CellAlignment::Right),
            Cell::new(compact(row.avg_volume)).set_alignment(CellAlignment::Right),
            Cell::new(if row.market_cap > 0.0 { compact(row.market_cap) } else { "-".to_string() })
                .set_alignment(CellAlignment::Right),
            stoch_cell(row.stoch_signal),
            Cell::new(verdict),
        ]);
    }
    table
}

pub fn breakout_table(rows: &[BreakoutResult]) -> Table {
    let mut table = new_table(&["Rank", "Symbol", "Strength (%)", "Close", "Recent High", "Vol Ratio", "RSI"]);
    for (i, row) in rows.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(&row.symbol).fg(Color::Cyan),
            signed_cell(row.breakout_strength, 2),
            Cell::new(format!("{:.2}", row.close_price)),
            Cell::new(format!("{:.2}", row.recent_high)),
            Cell::new(format!("{:.2}x", row.volume_ratio)),
            Cell::new(format!("{:.1}", row.rsi)),
        ]);
    }
    table
}

pub fn reversal_table(rows: &[ReversalResult]) -> Table {
    let mut table = new_table(&["Rank", "Symbol", "Strength (%)", "Close", "Recent Low", "RSI"]);
    for (i, row) in rows.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(&row.symbol).fg(Color::Cyan),
            signed_cell(row.reversal_strength, 2),
            Cell::new(format!("{:.2}", row.close_price)),
            Cell::new(format!("{:.2}", row.recent_low)),
            Cell::new(format!("{:.1}", row.rsi)),
        ]);
    }
    table
}

pub fn stored_results_table(rows: &[StoredResult]) -> Table {
    let mut table = new_table(&["Run", "Symbol", "Timeframe", "RSI", "RSI mom", "SMA mom", "Close", "Score"]);
    for stored in rows {
        let row = &stored.row;
        table.add_row(vec![
            Cell::new(format_timestamp(stored.run_timestamp)).fg(Color::DarkGrey),
            Cell::new(&row.symbol).fg(Color::Cyan),
            Cell::new(row.timeframe.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())),
            Cell::new(opt(row.rsi, 1)),
            signed_cell(row.rsi_momentum, 2),
            signed_cell(row.sma_momentum, 2),
            Cell::new(format!("{:.2}", row.close_price)),
            Cell::new(format!("{:.2}", row.composite_score)),
        ]);
    }
    table
}

pub fn cache_stats_table(stats: &CacheStats, limit: usize) -> Table {
    let mut table = new_table(&["Entry", "Size (KB)", "Modified (UTC)"]);
    for entry in stats.per_entry_size.iter().take(limit) {
        table.add_row(vec![
            Cell::new(&entry.name),
            Cell::new(format!("{:.1}", entry.size as f64 / 1024.0)).set_alignment(CellAlignment::Right),
            Cell::new(format_timestamp(entry.modified)),
        ]);
    }
    table
}

pub fn connectivity_table(report: &ConnectivityReport) -> Table {
    let mut table = new_table(&["Provider", "Status", "Latency (ms)", "Detail"]);
    for probe in &report.probes {
        let status = if probe.reachable {
            Cell::new("OK").fg(Color::Green)
        } else {
            Cell::new("FAILED").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(probe.name),
            status,
            Cell::new(probe.latency_ms).set_alignment(CellAlignment::Right),
            Cell::new(probe.error.as_deref().unwrap_or("")),
        ]);
    }
    for limit in &report.rate_limits {
        table.add_row(vec![
            Cell::new(format!("rate limit: {}", limit.api)).fg(Color::DarkGrey),
            Cell::new(format!("{}/{}", limit.calls, limit.limit)),
            Cell::new(""),
            Cell::new(format!(
                "window {}s, {:.0}s left",
                limit.window_secs, limit.remaining_window_secs
            )),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::MomentumVerdict;

    #[test]
    fn visibility_never_drops_below_floor() {
        assert_eq!(visibility_ratio(10.0, 10.0), 1.0);
        assert_eq!(visibility_ratio(-5.0, 10.0), 0.4);
        assert_eq!(visibility_ratio(5.0, 0.0), 0.4);
    }

    #[test]
    fn compact_numbers() {
        assert_eq!(compact(2.9e12), "2.90T");
        assert_eq!(compact(5.5e7), "55.00M");
        assert_eq!(compact(999.0), "999");
    }

    #[test]
    fn momentum_table_lists_rows_in_order() {
        let rows = vec![
            ScreeningCriteriaResult {
                symbol: "BTC".into(),
                asset_name: Some("Bitcoin".into()),
                composite_score: 4.2,
                verdict: Some(MomentumVerdict::StrongBuy),
                ..Default::default()
            },
            ScreeningCriteriaResult {
                symbol: "ETH".into(),
                composite_score: 1.0,
                ..Default::default()
            },
        ];
        let rendered = momentum_table(&rows).to_string();

        assert!(rendered.contains("BTC (Bitcoin)"));
        assert!(rendered.contains("STRONG BUY [High]"));
        let btc = rendered.find("BTC").unwrap();
        let eth = rendered.find("ETH").unwrap();
        assert!(btc < eth);
    }
}
