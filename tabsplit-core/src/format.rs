//! Formatting helpers shared by the CLI and exports.

use chrono::{DateTime, Utc};

use crate::types::PersonTotal;

/// CSV header row for settlement exports
pub const CSV_HEADER: &str = "Diner,Subtotal,Tax,Tip,Total";

/// Format an amount as dollars with two decimals (e.g., "$12.50").
pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", -amount)
    } else {
        format!("${:.2}", amount)
    }
}

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(ts);

    if duration.num_seconds() < 60 {
        "just now".to_string()
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}

/// Settlement totals as CSV, one row per diner in the given order.
pub fn totals_csv(totals: &[PersonTotal]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for p in totals {
        out.push_str(&format!(
            "{},{:.2},{:.2},{:.2},{:.2}\n",
            csv_field(&p.name),
            p.subtotal,
            p.tax,
            p.tip,
            p.total
        ));
    }
    out
}

/// Plain-text summary suitable for pasting into a message.
pub fn share_text(totals: &[PersonTotal]) -> String {
    let mut text = String::from("Bill Split Summary:\n");
    for p in totals {
        text.push_str(&format!(
            "\n- {}: {} (Sub: {}, Tax: {}, Tip: {})",
            p.name,
            format_currency(p.total),
            format_currency(p.subtotal),
            format_currency(p.tax),
            format_currency(p.tip)
        ));
    }
    text
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
