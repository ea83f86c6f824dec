//! Plain-text rendering for bills and the dashboard.

use chrono::Local;
use tabsplit_core::format::{format_currency, format_relative_time};
use tabsplit_core::{compute_totals, Bill, Dashboard, PersonTotal, ReceiptData};

pub fn print_dashboard(dashboard: &Dashboard) {
    if dashboard.unsettled.is_empty() && dashboard.settled_count == 0 {
        println!("No bills yet.");
        println!("Run 'tabsplit new <receipt-image>' to scan one.");
        return;
    }

    println!("Unsettled bills ({}):", dashboard.unsettled.len());
    for summary in &dashboard.unsettled {
        let diners = match summary.diners.len() {
            0 => "no diners".to_string(),
            1 => "1 diner".to_string(),
            n => format!("{} diners", n),
        };
        println!(
            "  {}  {:<28} {:<10} {:>9}  {:<12} {}",
            &summary.id[..8.min(summary.id.len())],
            summary.title,
            diners,
            format_currency(summary.receipt_total),
            summary.format_progress(),
            format_relative_time(summary.created_at)
        );
    }

    if dashboard.settled_count > 0 {
        println!();
        println!(
            "Settled bills: {} (run 'tabsplit clear-settled --yes' to remove)",
            dashboard.settled_count
        );
    }
}

pub fn print_bill(bill: &Bill) {
    println!("{}  [{}]", bill.title, bill.id);
    println!(
        "Created: {}   Gratuity included: {}",
        bill.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        if bill.gratuity_included { "yes" } else { "no" }
    );

    println!();
    match &bill.parsed_receipt {
        Some(receipt) => {
            println!("Items:");
            for item in &receipt.items {
                let assignees = bill
                    .assignment(item.id)
                    .filter(|a| a.is_assigned())
                    .map(|a| {
                        a.person_names
                            .iter()
                            .map(String::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_else(|| "(unassigned)".to_string());
                println!(
                    "  [{}] {:<24} x{:<3} {:>9}  -> {}",
                    item.id,
                    item.name,
                    item.quantity,
                    format_currency(item.price),
                    assignees
                );
            }
            print_receipt_totals(receipt);
        }
        None => println!("No receipt data."),
    }

    println!();
    if bill.diners.is_empty() {
        println!("Diners: none (add with 'tabsplit diner add')");
    } else {
        println!("Diners:");
        for name in &bill.diners {
            println!(
                "  {:<16} tip {:>2}%  {}",
                name,
                bill.diner_tips.get(name).get(),
                if bill.diner_settlement.get(name) {
                    "settled"
                } else {
                    "owes"
                }
            );
        }
    }

    let totals = compute_totals(bill);
    if !totals.is_empty() {
        println!();
        print_totals(&totals);
    }

    if !bill.chat_history.is_empty() {
        println!();
        println!("Chat:");
        for message in &bill.chat_history {
            println!("  {}: {}", message.sender, message.text);
        }
    }
}

pub fn print_receipt_totals(receipt: &ReceiptData) {
    println!(
        "Subtotal {}  Tax {}  Total {}",
        format_currency(receipt.subtotal),
        format_currency(receipt.tax),
        format_currency(receipt.total)
    );
}

pub fn print_totals(totals: &[PersonTotal]) {
    println!("Totals:");
    for p in totals {
        println!(
            "  {:<16} {:>9}  (sub {}, tax {}, tip {})",
            p.name,
            format_currency(p.total),
            format_currency(p.subtotal),
            format_currency(p.tax),
            format_currency(p.tip)
        );
    }
}
