// beech-core/src/tools/report.rs

//! MCC performance report data and its HTML email body.

use super::google_ads::{AccountMetrics, AdsApi, DateSpan};
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::warn;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportTemplate {
    #[default]
    Daily,
    ZeroConversion,
    BestAds,
    BestKeywords,
}

impl ReportTemplate {
    pub fn subject(&self, date: NaiveDate) -> String {
        let kind = match self {
            ReportTemplate::Daily => "Daily",
            _ => "Performance",
        };
        format!("Google Ads {} Report - {}", kind, date.format("%d/%m/%Y"))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AccountReport {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub current: AccountMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<AccountMetrics>,
}

/// Current and comparison metrics for every client account.
///
/// Accounts without current data are left out; a failed comparison lookup
/// only drops the comparison.
pub async fn mcc_report_data(
    ads: &dyn AdsApi,
    current: &DateSpan,
    comparison: &DateSpan,
) -> Result<Vec<AccountReport>> {
    let accounts = ads.customer_accounts().await?;
    let mut reports = Vec::with_capacity(accounts.len());
    for account in accounts {
        let metrics = match ads.account_metrics(&account.id, current).await {
            Ok(Some(metrics)) => metrics,
            Ok(None) => continue,
            Err(e) => {
                warn!(account = %account.id, error = %e, "Skipping account in report.");
                continue;
            }
        };
        let previous = match ads.account_metrics(&account.id, comparison).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(account = %account.id, error = %e, "No comparison metrics for account.");
                None
            }
        };
        reports.push(AccountReport {
            id: account.id,
            name: account.name,
            currency: account.currency,
            current: metrics,
            comparison: previous,
        });
    }
    Ok(reports)
}

pub fn render_report_html(accounts: &[AccountReport], date: NaiveDate) -> String {
    let total_spend: f64 = accounts.iter().map(|a| a.current.cost).sum();
    let total_conversions: f64 = accounts.iter().map(|a| a.current.conversions).sum();
    let total_clicks: f64 = accounts.iter().map(|a| a.current.clicks).sum();
    let formatted_date = date.format("%A, %-d %B %Y");

    let mut rows = String::new();
    for account in accounts {
        let m = &account.current;
        let _ = write!(
            rows,
            "<tr><td><strong>{}</strong><br><small>ID: {}</small></td>\
             <td align=\"right\">{}</td><td align=\"right\">{:.0}</td>\
             <td align=\"right\">{}</td><td align=\"right\">{}</td></tr>",
            escape_html(&account.name),
            escape_html(&account.id),
            format_currency(m.cost, &account.currency),
            m.conversions,
            format_count(m.clicks),
            format_count(m.impressions),
        );
    }

    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\">\
         <title>MCC Report - {date}</title></head>\
         <body style=\"font-family: Arial, sans-serif;\">\
         <h1>Google Ads Report</h1><p>{date}</p>\
         <p>Total spend: <strong>{spend}</strong> | Conversions: <strong>{conversions:.0}</strong> | \
         Clicks: <strong>{clicks}</strong></p>\
         <table cellpadding=\"8\" style=\"border-collapse: collapse;\">\
         <tr><th align=\"left\">Account</th><th>Spend</th><th>Conv</th><th>Clicks</th><th>Impr</th></tr>\
         {rows}</table></body></html>",
        date = formatted_date,
        spend = format_currency(total_spend, ""),
        conversions = total_conversions,
        clicks = format_count(total_clicks),
        rows = rows,
    )
}

fn format_currency(amount: f64, currency: &str) -> String {
    let formatted = format!("${:.2}", amount);
    if currency.is_empty() {
        formatted
    } else {
        format!("{} {}", formatted, currency)
    }
}

/// Whole number with thousands separators.
fn format_count(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0.0 {
        out.insert(0, '-');
    }
    out
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
