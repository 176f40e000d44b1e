use crate::modules::registry::RegistryBuilder;
use crate::modules::view::{RenderContext, View};
use serde_json::{Map, Value};

const MISSING: &str = "-";
const DEFAULT_CURRENCY: &str = "USD";

pub const QUOTE_APPROVAL_CARD: &str = "quote_approval_card";
pub const QUOTE_COMPARISON_TABLE: &str = "quote_comparison_table";
pub const PURCHASE_REQUEST_SUMMARY: &str = "purchase_request_summary";
pub const VENDOR_LIST: &str = "vendor_list";
pub const PAYMENT_CONFIRMATION: &str = "payment_confirmation";

pub fn register_procurement(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .register(QUOTE_APPROVAL_CARD, quote_approval_card)
        .register(QUOTE_COMPARISON_TABLE, quote_comparison_table)
        .register(PURCHASE_REQUEST_SUMMARY, purchase_request_summary)
        .register(VENDOR_LIST, vendor_list)
        .register(PAYMENT_CONFIRMATION, payment_confirmation)
}

fn quote_approval_card(ctx: &RenderContext<'_>) -> View {
    let p = ctx.props;
    View::new(ctx.component, "Quote approval")
        .line(format!("Vendor: {}", text(p, "vendor")))
        .line(format!("Total: {}", money(p, "total_amount")))
        .line(format!("Delivery: {} days", text(p, "delivery_days")))
        .line(format!("Quote: {}", text(p, "quote_id")))
        .with_action(ctx.action(
            "Approve quote",
            "approve_quote",
            pick(p, &["quote_id", "vendor", "total_amount", "currency"]),
        ))
        .with_action(ctx.action(
            "Reject quote",
            "reject_quote",
            pick(p, &["quote_id", "vendor"]),
        ))
}

fn quote_comparison_table(ctx: &RenderContext<'_>) -> View {
    let p = ctx.props;
    let recommended = p.get("recommended").and_then(Value::as_str);
    let mut view = View::new(ctx.component, "Quote comparison");

    let quotes = list(p, "quotes");
    if quotes.is_empty() {
        view.push_line("No quotes received yet.");
    }
    for quote in quotes {
        let vendor = text(quote, "vendor");
        let flagged = quote.get("recommended").and_then(Value::as_bool) == Some(true)
            || recommended == Some(vendor.as_str());
        let marker = if flagged { "  <- recommended" } else { "" };
        view.push_line(format!(
            "{vendor}: {} ({} days){marker}",
            money(quote, "total_amount"),
            text(quote, "delivery_days"),
        ));
        view.actions.push(ctx.action(
            format!("Select {vendor}"),
            "select_quote",
            pick(quote, &["quote_id", "vendor", "total_amount"]),
        ));
    }
    view
}

fn purchase_request_summary(ctx: &RenderContext<'_>) -> View {
    let p = ctx.props;
    let mut view = View::new(ctx.component, "Purchase request")
        .line(format!("Title: {}", text(p, "title")))
        .line(format!("Requester: {}", text(p, "requester")))
        .line(format!("Status: {}", text(p, "status")));

    let mut estimate = 0.0;
    let mut priced = true;
    for item in list(p, "items") {
        view.push_line(format!(
            "{} x {} @ {}",
            text(item, "quantity"),
            text(item, "name"),
            text(item, "unit_price"),
        ));
        match (number(item, "quantity"), number(item, "unit_price")) {
            (Some(q), Some(u)) => estimate += q * u,
            _ => priced = false,
        }
    }
    if priced && !list(p, "items").is_empty() {
        view.push_line(format!("Estimated total: {estimate:.2} {}", currency(p)));
    }

    view.with_action(ctx.action(
        "Send RFQ to vendors",
        "send_rfq",
        pick(p, &["request_id"]),
    ))
}

fn vendor_list(ctx: &RenderContext<'_>) -> View {
    let mut view = View::new(ctx.component, "Vendors");
    let vendors = list(ctx.props, "vendors");
    if vendors.is_empty() {
        view.push_line("No vendors on file.");
    }
    for vendor in vendors {
        let name = text(vendor, "name");
        view.push_line(format!(
            "{name} <{}> rating {}",
            text(vendor, "email"),
            text(vendor, "rating"),
        ));
        view.actions.push(ctx.action(
            format!("Invite {name}"),
            "invite_vendor",
            pick(vendor, &["vendor_id", "name", "email"]),
        ));
    }
    view
}

fn payment_confirmation(ctx: &RenderContext<'_>) -> View {
    let p = ctx.props;
    let status = text(p, "status");
    let view = View::new(ctx.component, "Payment")
        .line(format!("Vendor: {}", text(p, "vendor")))
        .line(format!("Amount: {}", money(p, "amount")))
        .line(format!("Status: {status}"));

    if status == "paid" {
        return view;
    }
    view.with_action(ctx.action(
        "Confirm payment",
        "confirm_payment",
        pick(p, &["payment_id", "quote_id", "vendor", "amount", "currency"]),
    ))
}

/// Scalar prop as display text, `-` when absent or not a scalar.
fn text(props: &Value, key: &str) -> String {
    match props.get(key) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => MISSING.to_string(),
    }
}

fn number(props: &Value, key: &str) -> Option<f64> {
    match props.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn currency(props: &Value) -> &str {
    props
        .get("currency")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
}

fn money(props: &Value, key: &str) -> String {
    match number(props, key) {
        Some(amount) => format!("{amount:.2} {}", currency(props)),
        None => MISSING.to_string(),
    }
}

fn list<'a>(props: &'a Value, key: &str) -> &'a [Value] {
    props
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Copies the listed keys, when present, into action data.
fn pick(props: &Value, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|k| props.get(*k).map(|v| ((*k).to_string(), v.clone())))
        .collect()
}
