//! Constituent change detection and the consolidated alert message

use crate::core::holdings::ConstituentSet;
use crate::core::model::{ChangeRecord, NamedTicker};
use crate::names::NameResolver;
use chrono::NaiveDate;
use std::collections::HashSet;

const HEADER: &str = "🚨 <b>ETF 구성 종목 편입/편출 알림</b> 🚨\n\n";
const ADDITIONS: &str = "➕ <b>편입 (Additions)</b>\n";
const DELETIONS: &str = "➖ <b>편출 (Deletions)</b>\n";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstituentDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ConstituentDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Tickers that entered and left between two observations.
///
/// A fund seen for the first time (empty `previous`) reports no change.
pub fn diff(previous: &ConstituentSet, current: &ConstituentSet) -> ConstituentDiff {
    if previous.is_empty() {
        return ConstituentDiff::default();
    }

    let before: HashSet<&str> = previous.iter().map(String::as_str).collect();
    let after: HashSet<&str> = current.iter().map(String::as_str).collect();

    ConstituentDiff {
        added: current
            .iter()
            .filter(|t| !before.contains(t.as_str()))
            .cloned()
            .collect(),
        removed: previous
            .iter()
            .filter(|t| !after.contains(t.as_str()))
            .cloned()
            .collect(),
    }
}

async fn named(tickers: &[String], names: &NameResolver) -> Vec<NamedTicker> {
    let mut out = Vec::with_capacity(tickers.len());
    for code in tickers {
        out.push(NamedTicker {
            code: code.clone(),
            name: names.name(code).await,
        });
    }
    out
}

pub async fn describe(diff: &ConstituentDiff, names: &NameResolver) -> ChangeRecord {
    ChangeRecord {
        added: named(&diff.added, names).await,
        removed: named(&diff.removed, names).await,
    }
}

/// A fund whose constituents changed in this run.
#[derive(Debug, Clone)]
pub struct FundChange {
    pub code: String,
    pub name: String,
    pub record: ChangeRecord,
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_lines(message: &mut String, title: &str, tickers: &[NamedTicker]) {
    if tickers.is_empty() {
        return;
    }
    message.push_str(title);
    for ticker in tickers {
        message.push_str(&format!(
            " - {} ({})\n",
            escape_html(&ticker.name),
            escape_html(&ticker.code)
        ));
    }
}

/// One HTML message covering every changed fund, in run order.
pub fn format_message(business_day: NaiveDate, changes: &[FundChange]) -> String {
    let mut message = String::from(HEADER);
    message.push_str(&format!("📅 {}\n\n", business_day.format("%Y-%m-%d")));

    for change in changes {
        message.push_str(&format!(
            "📊 <b>{} ({})</b>\n",
            escape_html(&change.name),
            escape_html(&change.code)
        ));
        push_lines(&mut message, ADDITIONS, &change.record.added);
        push_lines(&mut message, DELETIONS, &change.record.removed);
        message.push('\n');
    }
    message
}
