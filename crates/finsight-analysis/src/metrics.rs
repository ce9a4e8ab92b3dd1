//! Per-period financial ratios from the balance sheet and cash flow statement

use crate::record::StatementRow;
use chrono::NaiveDate;
use finsight_prompt::{PromptBuilder, format_money};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Short-term, long-term and total debt for one period
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DebtBreakdown {
    pub short_term: Option<f64>,
    pub long_term: Option<f64>,
    pub total: Option<f64>,
}

/// Ratios and levels derived for one reporting period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetrics {
    pub as_of_date: NaiveDate,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub debt: DebtBreakdown,
}

impl PeriodMetrics {
    fn from_rows(balance: &StatementRow, cash: &StatementRow) -> Self {
        let current_assets = balance.get("CurrentAssets");
        let current_liabilities = balance.get("CurrentLiabilities");
        let operating_cash_flow = cash.get("OperatingCashFlow");
        let short_term = balance.get("CurrentDebt");
        let long_term = balance.get("LongTermDebt");

        Self {
            as_of_date: balance.as_of_date,
            debt_to_equity: divide(balance.get("TotalDebt"), balance.get("StockholdersEquity")),
            current_ratio: divide(current_assets, current_liabilities),
            quick_ratio: divide(
                subtract(current_assets, balance.get("Inventory")),
                current_liabilities,
            ),
            total_assets: balance.get("TotalAssets"),
            total_liabilities: balance.get("TotalLiabilitiesNetMinorityInterest"),
            free_cash_flow: subtract(operating_cash_flow, cash.get("CapitalExpenditure")),
            operating_cash_flow,
            debt: DebtBreakdown {
                short_term,
                long_term,
                total: short_term.zip(long_term).map(|(s, l)| s + l),
            },
        }
    }

    fn fields(&self) -> [Option<f64>; 10] {
        [
            self.debt_to_equity,
            self.current_ratio,
            self.quick_ratio,
            self.total_assets,
            self.total_liabilities,
            self.free_cash_flow,
            self.operating_cash_flow,
            self.debt.short_term,
            self.debt.long_term,
            self.debt.total,
        ]
    }

    /// Number of defined computed fields
    pub fn defined_count(&self) -> usize {
        self.fields().iter().filter(|f| f.is_some()).count()
    }

    /// One-line human-readable summary, undefined values spelled out
    pub fn describe(&self) -> String {
        format!(
            "{}: debt-to-equity {}, current ratio {}, quick ratio {}, total assets {}, \
             total liabilities {}, free cash flow {}, operating cash flow {}, \
             debt (short-term {}, long-term {}, total {})",
            self.as_of_date,
            ratio(self.debt_to_equity),
            ratio(self.current_ratio),
            ratio(self.quick_ratio),
            money(self.total_assets),
            money(self.total_liabilities),
            money(self.free_cash_flow),
            money(self.operating_cash_flow),
            money(self.debt.short_term),
            money(self.debt.long_term),
            money(self.debt.total),
        )
    }
}

/// Textual placeholder for an undefined value
pub const UNDEFINED: &str = "undefined";

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| UNDEFINED.to_string(), |v| format!("{v:.2}"))
}

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| UNDEFINED.to_string(), format_money)
}

/// `a / b`, undefined when either side is missing or `b` is zero
pub fn divide(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = numerator.zip(denominator)?;
    if d == 0.0 {
        return None;
    }
    Some(n / d).filter(|v| v.is_finite())
}

fn subtract(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    a.zip(b).map(|(a, b)| a - b)
}

/// Join balance-sheet and cash-flow periods on their as-of date and derive
/// ratios
///
/// Trailing-twelve-month rows are ignored. Periods present in only one
/// statement are excluded. A period is kept only if at least
/// `min_defined_ratio` of its computed fields are defined. Output is ordered
/// oldest first.
pub fn compute_financial_metrics(
    balance_sheet: &[StatementRow],
    cash_flow: &[StatementRow],
    min_defined_ratio: f64,
) -> Vec<PeriodMetrics> {
    let cash_by_date: BTreeMap<NaiveDate, &StatementRow> = cash_flow
        .iter()
        .filter(|row| !row.is_trailing())
        .map(|row| (row.as_of_date, row))
        .collect();

    let mut periods: Vec<PeriodMetrics> = balance_sheet
        .iter()
        .filter(|row| !row.is_trailing())
        .filter_map(|balance| {
            cash_by_date
                .get(&balance.as_of_date)
                .map(|cash| PeriodMetrics::from_rows(balance, cash))
        })
        .filter(|metrics| {
            let total = metrics.fields().len() as f64;
            metrics.defined_count() as f64 >= min_defined_ratio * total
        })
        .collect();

    periods.sort_by_key(|m| m.as_of_date);
    periods.dedup_by_key(|m| m.as_of_date);
    periods
}

/// Render metric periods as a bullet list, or `undefined` when empty
pub fn describe_metrics(periods: &[PeriodMetrics]) -> String {
    if periods.is_empty() {
        return UNDEFINED.to_string();
    }
    PromptBuilder::new()
        .bullets(periods.iter().map(PeriodMetrics::describe))
        .build_trimmed()
}

/// One quarterly basic EPS observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpsPoint {
    pub as_of_date: NaiveDate,
    pub eps: f64,
}

/// Basic EPS by period, excluding trailing rows and undefined values
pub fn eps_trend(income_statement: &[StatementRow]) -> Vec<EpsPoint> {
    let mut points: Vec<EpsPoint> = income_statement
        .iter()
        .filter(|row| !row.is_trailing())
        .filter_map(|row| {
            row.get("BasicEPS").map(|eps| EpsPoint {
                as_of_date: row.as_of_date,
                eps,
            })
        })
        .collect();
    points.sort_by_key(|p| p.as_of_date);
    points
}

/// Render an EPS trend as `date: eps` pairs, or `undefined` when empty
pub fn describe_eps_trend(points: &[EpsPoint]) -> String {
    if points.is_empty() {
        return UNDEFINED.to_string();
    }
    points
        .iter()
        .map(|p| format!("{}: {:.2}", p.as_of_date, p.eps))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn balance(date: NaiveDate) -> StatementRow {
        StatementRow::new(date, "3M")
            .with("TotalDebt", 100.0)
            .with("StockholdersEquity", 50.0)
            .with("CurrentAssets", 150.0)
            .with("CurrentLiabilities", 100.0)
            .with("Inventory", 30.0)
            .with("TotalAssets", 400.0)
            .with("TotalLiabilitiesNetMinorityInterest", 350.0)
            .with("CurrentDebt", 20.0)
            .with("LongTermDebt", 80.0)
    }

    fn cash(date: NaiveDate) -> StatementRow {
        StatementRow::new(date, "3M")
            .with("OperatingCashFlow", 40.0)
            .with("CapitalExpenditure", 10.0)
    }

    #[test]
    fn test_ratios() {
        let metrics = compute_financial_metrics(&[balance(date(3, 31))], &[cash(date(3, 31))], 0.5);
        assert_eq!(metrics.len(), 1);

        let m = &metrics[0];
        assert_eq!(m.debt_to_equity, Some(2.0));
        assert_eq!(m.current_ratio, Some(1.5));
        assert_eq!(m.quick_ratio, Some(1.2));
        assert_eq!(m.free_cash_flow, Some(30.0));
        assert_eq!(m.operating_cash_flow, Some(40.0));
        assert_eq!(m.debt.total, Some(100.0));
        assert_eq!(m.defined_count(), 10);
    }

    #[test]
    fn test_join_excludes_unmatched_periods() {
        let metrics = compute_financial_metrics(
            &[balance(date(3, 31)), balance(date(6, 30))],
            &[cash(date(6, 30)), cash(date(9, 30))],
            0.5,
        );

        let dates: Vec<NaiveDate> = metrics.iter().map(|m| m.as_of_date).collect();
        assert_eq!(dates, vec![date(6, 30)]);
    }

    #[test]
    fn test_trailing_rows_ignored() {
        let trailing = StatementRow::new(date(6, 30), "TTM").with("OperatingCashFlow", 1.0);
        let metrics =
            compute_financial_metrics(&[balance(date(6, 30))], &[trailing, cash(date(6, 30))], 0.5);

        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].operating_cash_flow, Some(40.0));
    }

    #[test]
    fn test_zero_denominator_is_undefined() {
        let bal = balance(date(3, 31)).with("StockholdersEquity", 0.0);
        let metrics = compute_financial_metrics(&[bal], &[cash(date(3, 31))], 0.5);
        assert_eq!(metrics[0].debt_to_equity, None);
    }

    #[test]
    fn test_sparse_periods_dropped() {
        let sparse = StatementRow::new(date(3, 31), "3M")
            .with("TotalAssets", 1.0)
            .with("TotalLiabilitiesNetMinorityInterest", 1.0)
            .with("CurrentDebt", 1.0);
        let metrics = compute_financial_metrics(&[sparse.clone()], &[cash(date(3, 31))], 0.5);
        // defined: assets, liabilities, fcf, ocf, short-term = 5 of 10
        assert_eq!(metrics.len(), 1);

        let sparser = StatementRow::new(date(3, 31), "3M").with("TotalAssets", 1.0);
        let metrics = compute_financial_metrics(&[sparser], &[cash(date(3, 31))], 0.5);
        // defined: assets, fcf, ocf = 3 of 10
        assert!(metrics.is_empty());

        let metrics = compute_financial_metrics(&[sparse], &[cash(date(3, 31))], 0.6);
        assert!(metrics.is_empty());
    }

    #[test]
    fn test_describe_spells_out_undefined() {
        let bal = balance(date(3, 31)).with("StockholdersEquity", 0.0);
        let metrics = compute_financial_metrics(&[bal], &[cash(date(3, 31))], 0.5);
        let text = describe_metrics(&metrics);

        assert!(text.starts_with("- 2024-03-31: debt-to-equity undefined, current ratio 1.50"));
        assert_eq!(describe_metrics(&[]), "undefined");
    }

    #[test]
    fn test_eps_trend() {
        let rows = vec![
            StatementRow::new(date(6, 30), "3M").with("BasicEPS", 1.40),
            StatementRow::new(date(3, 31), "3M").with("BasicEPS", 1.53),
            StatementRow::new(date(6, 30), "TTM").with("BasicEPS", 6.08),
            StatementRow::new(date(9, 30), "3M"),
        ];

        let trend = eps_trend(&rows);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].as_of_date, date(3, 31));
        assert_eq!(describe_eps_trend(&trend), "2024-03-31: 1.53, 2024-06-30: 1.40");
        assert_eq!(describe_eps_trend(&[]), "undefined");
    }
}
