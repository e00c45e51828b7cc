//! Summaries and analytics derived from the ledger and the budget.
//!
//! Everything here is pure: callers pass the expenses, the budget and a
//! reference date. Calendar fields (month, year) are evaluated in the time
//! zone of the reference date.
use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone};

use crate::{Category, EngineError, Expense, MoneyCents};

/// How many records [`top_expenses`] returns.
pub const TOP_N: usize = 5;

/// Months shown by the trend for [`Period::Month`].
pub const MONTH_TREND_WINDOW: usize = 6;
/// Months shown by the trend for [`Period::Year`].
pub const YEAR_TREND_WINDOW: usize = 12;
/// Longest trend shown for [`Period::All`].
pub const MAX_TREND_WINDOW: usize = 24;

/// Time window used to filter records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Period {
    /// Calendar month of the reference date.
    #[default]
    Month,
    /// Calendar year of the reference date.
    Year,
    All,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            other => Err(EngineError::Validation(format!("unknown period: {other}"))),
        }
    }
}

/// Health of the remaining budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BudgetStatus {
    Ok,
    /// Less than 20% of the budget left.
    Warning,
    Over,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CategoryShare {
    pub category: Category,
    pub amount: MoneyCents,
    /// Percentage of the breakdown total, 0 when the total is 0.
    pub percent: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Breakdown {
    pub total: MoneyCents,
    /// One entry per category, in [`Category::ALL`] order.
    pub shares: Vec<CategoryShare>,
}

impl Breakdown {
    pub fn get(&self, category: Category) -> Option<&CategoryShare> {
        self.shares.get(category.index())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrendPoint {
    pub year: i32,
    /// 1-based month.
    pub month: u32,
    /// `"Oct 2026"`.
    pub label: String,
    pub total: MoneyCents,
}

/// Headline figures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Summary {
    pub budget: MoneyCents,
    pub total_spent: MoneyCents,
    pub remaining: MoneyCents,
    pub month_spent: MoneyCents,
    pub status: BudgetStatus,
}

/// Everything the charts need for one period.
#[derive(Clone, Debug, PartialEq)]
pub struct Analytics {
    pub period: Period,
    pub total: MoneyCents,
    pub breakdown: Breakdown,
    pub trend: Vec<TrendPoint>,
    pub top: Vec<Expense>,
}

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("???")
}

/// `(year, month)` of an expense, seen from the reference time zone.
fn local_month<Tz: TimeZone>(expense: &Expense, reference: &DateTime<Tz>) -> (i32, u32) {
    let local = expense.occurred_at.with_timezone(&reference.timezone());
    (local.year(), local.month())
}

fn month_index(year: i32, month: u32) -> i64 {
    i64::from(year) * 12 + i64::from(month) - 1
}

fn from_month_index(index: i64) -> (i32, u32) {
    (index.div_euclid(12) as i32, index.rem_euclid(12) as u32 + 1)
}

pub fn total_spent<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> MoneyCents {
    expenses.into_iter().map(|expense| expense.amount).sum()
}

/// `budget - spent`; negative when over budget.
pub fn remaining_budget(budget: MoneyCents, spent: MoneyCents) -> MoneyCents {
    budget - spent
}

/// Spent during the calendar month of `reference`.
pub fn month_spent<'a, Tz: TimeZone>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    reference: &DateTime<Tz>,
) -> MoneyCents {
    total_spent(filter_period(expenses, Period::Month, reference))
}

pub fn category_breakdown<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> Breakdown {
    let mut amounts = [MoneyCents::ZERO; Category::ALL.len()];
    for expense in expenses {
        amounts[expense.category().index()] += expense.amount;
    }
    let total: MoneyCents = amounts.iter().sum();
    let shares = Category::ALL
        .into_iter()
        .map(|category| {
            let amount = amounts[category.index()];
            CategoryShare {
                category,
                amount,
                percent: amount.percent_of(total),
            }
        })
        .collect();
    Breakdown { total, shares }
}

/// Records inside `period`, relative to `reference`, in input order.
pub fn filter_period<'a, Tz: TimeZone>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    period: Period,
    reference: &DateTime<Tz>,
) -> Vec<&'a Expense> {
    let (year, month) = (reference.year(), reference.month());
    expenses
        .into_iter()
        .filter(|expense| match period {
            Period::Month => local_month(expense, reference) == (year, month),
            Period::Year => local_month(expense, reference).0 == year,
            Period::All => true,
        })
        .collect()
}

/// Number of months shown by the trend for `period`.
///
/// For [`Period::All`] it spans from the earliest record to the reference
/// month, clamped to 6..=24.
pub fn trend_window<'a, Tz: TimeZone>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    period: Period,
    reference: &DateTime<Tz>,
) -> usize {
    match period {
        Period::Month => MONTH_TREND_WINDOW,
        Period::Year => YEAR_TREND_WINDOW,
        Period::All => {
            let current = month_index(reference.year(), reference.month());
            let span = expenses
                .into_iter()
                .map(|expense| {
                    let (year, month) = local_month(expense, reference);
                    month_index(year, month)
                })
                .min()
                .map_or(0, |earliest| current - earliest + 1);
            span.clamp(MONTH_TREND_WINDOW as i64, MAX_TREND_WINDOW as i64) as usize
        }
    }
}

/// Totals for the `months` calendar months ending at the reference month,
/// oldest first. Months without expenses are present with a zero total.
pub fn monthly_trend<'a, Tz: TimeZone>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    months: usize,
    reference: &DateTime<Tz>,
) -> Vec<TrendPoint> {
    let current = month_index(reference.year(), reference.month());
    let first = current - months as i64 + 1;
    let mut totals = vec![MoneyCents::ZERO; months];

    for expense in expenses {
        let (year, month) = local_month(expense, reference);
        let index = month_index(year, month);
        if (first..=current).contains(&index) {
            totals[(index - first) as usize] += expense.amount;
        }
    }

    totals
        .into_iter()
        .enumerate()
        .map(|(offset, total)| {
            let (year, month) = from_month_index(first + offset as i64);
            TrendPoint {
                year,
                month,
                label: format!("{} {year}", month_name(month)),
                total,
            }
        })
        .collect()
}

/// The [`TOP_N`] largest records, highest first; equal amounts keep their
/// input order.
pub fn top_expenses<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> Vec<&'a Expense> {
    let mut sorted: Vec<&Expense> = expenses.into_iter().collect();
    sorted.sort_by(|a, b| b.amount.cmp(&a.amount));
    sorted.truncate(TOP_N);
    sorted
}

pub fn classify(budget: MoneyCents, remaining: MoneyCents) -> BudgetStatus {
    if remaining.is_negative() {
        BudgetStatus::Over
    } else if i128::from(remaining.cents()) * 5 < i128::from(budget.cents()) {
        BudgetStatus::Warning
    } else {
        BudgetStatus::Ok
    }
}

pub fn summary<Tz: TimeZone>(
    expenses: &[Expense],
    budget: MoneyCents,
    reference: &DateTime<Tz>,
) -> Summary {
    let total_spent = total_spent(expenses);
    let remaining = remaining_budget(budget, total_spent);
    Summary {
        budget,
        total_spent,
        remaining,
        month_spent: month_spent(expenses, reference),
        status: classify(budget, remaining),
    }
}

pub fn analytics<Tz: TimeZone>(
    expenses: &[Expense],
    period: Period,
    reference: &DateTime<Tz>,
) -> Analytics {
    let filtered = filter_period(expenses, period, reference);
    let months = trend_window(expenses, period, reference);
    Analytics {
        period,
        total: total_spent(filtered.iter().copied()),
        breakdown: category_breakdown(filtered.iter().copied()),
        trend: monthly_trend(expenses, months, reference),
        top: top_expenses(filtered.iter().copied())
            .into_iter()
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{ExpenseId, SyncStatus};

    fn expense(id: &str, cents: i64, category: Category, at: DateTime<Utc>) -> Expense {
        Expense {
            id: ExpenseId::from(id),
            description: id.to_string(),
            amount: MoneyCents::new(cents),
            category_code: category.code().to_string(),
            occurred_at: at,
            updated_at: None,
            sync: SyncStatus::Synced,
        }
    }

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn status_thresholds() {
        let budget = MoneyCents::from_major(50_000);
        let status = |spent| classify(budget, remaining_budget(budget, MoneyCents::from_major(spent)));
        assert_eq!(status(55_000), BudgetStatus::Over);
        assert_eq!(status(45_000), BudgetStatus::Warning);
        assert_eq!(status(10_000), BudgetStatus::Ok);
        // exactly 20% left is fine, exactly 0 left is a warning
        assert_eq!(status(40_000), BudgetStatus::Ok);
        assert_eq!(status(50_000), BudgetStatus::Warning);
    }

    #[test]
    fn status_of_extreme_budgets() {
        let max = MoneyCents::new(i64::MAX);
        assert_eq!(classify(max, max), BudgetStatus::Ok);
        assert_eq!(classify(max, MoneyCents::new(i64::MAX / 5)), BudgetStatus::Warning);

        let far_over = vec![expense("a", i64::MAX, Category::Food, at(2026, 10, 1)); 3];
        let summary = summary(&far_over, MoneyCents::MAX_AMOUNT, &at(2026, 10, 15));
        assert_eq!(summary.total_spent, max);
        assert_eq!(summary.status, BudgetStatus::Over);
    }

    #[test]
    fn breakdown_of_single_category() {
        let now = at(2026, 10, 19);
        let expenses = vec![
            expense("a", 1_000_00, Category::Food, now),
            expense("b", 2_000_00, Category::Food, now),
            expense("c", 3_000_00, Category::Food, now),
        ];
        let breakdown = category_breakdown(&expenses);
        assert_eq!(breakdown.total, MoneyCents::from_major(6_000));
        assert_eq!(breakdown.shares.len(), 7);
        let food = breakdown.get(Category::Food).unwrap();
        assert_eq!(food.amount, MoneyCents::from_major(6_000));
        assert_eq!(food.percent, 100.0);
        for share in breakdown.shares.iter().filter(|s| s.category != Category::Food) {
            assert_eq!(share.amount, MoneyCents::ZERO);
            assert_eq!(share.percent, 0.0);
        }
    }

    #[test]
    fn breakdown_percentages_sum_to_hundred() {
        let now = at(2026, 10, 19);
        let expenses = vec![
            expense("a", 333, Category::Food, now),
            expense("b", 333, Category::Housing, now),
            expense("c", 334, Category::Academic, now),
            expense("d", 1, Category::Other, now),
        ];
        let sum: f64 = category_breakdown(&expenses).shares.iter().map(|s| s.percent).sum();
        assert!((sum - 100.0).abs() < 1e-9);

        let empty = category_breakdown(&[]);
        assert_eq!(empty.total, MoneyCents::ZERO);
        assert!(empty.shares.iter().all(|s| s.percent == 0.0));
    }

    #[test]
    fn unknown_categories_count_as_other() {
        let mut odd = expense("a", 500, Category::Food, at(2026, 1, 1));
        odd.category_code = "groceries".to_string();
        let breakdown = category_breakdown([&odd]);
        assert_eq!(breakdown.get(Category::Other).unwrap().amount, MoneyCents::new(500));
    }

    #[test]
    fn period_filter_uses_calendar_fields() {
        let now = at(2026, 10, 19);
        let expenses = vec![
            expense("this-month", 100, Category::Food, at(2026, 10, 1)),
            expense("last-month", 100, Category::Food, at(2026, 9, 30)),
            expense("last-year-same-month", 100, Category::Food, at(2025, 10, 5)),
        ];
        let ids = |period| {
            filter_period(&expenses, period, &now)
                .into_iter()
                .map(|e| e.id.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(Period::Month), vec!["this-month"]);
        assert_eq!(ids(Period::Year), vec!["this-month", "last-month"]);
        assert_eq!(ids(Period::All).len(), 3);
        assert_eq!(month_spent(&expenses, &now), MoneyCents::new(100));
    }

    #[test]
    fn period_filter_respects_reference_time_zone() {
        // 23:30 UTC on Sep 30 is already October in Lagos (UTC+1).
        let late = Utc.with_ymd_and_hms(2026, 9, 30, 23, 30, 0).unwrap();
        let expenses = vec![expense("late", 100, Category::Food, late)];
        let lagos = chrono::FixedOffset::east_opt(3600).unwrap();
        let reference = lagos.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        assert_eq!(filter_period(&expenses, Period::Month, &reference).len(), 1);
        assert_eq!(filter_period(&expenses, Period::Month, &at(2026, 10, 19)).len(), 0);
    }

    #[test]
    fn trend_has_window_entries_oldest_first() {
        let now = at(2026, 2, 10);
        let expenses = vec![
            expense("a", 100, Category::Food, at(2026, 2, 1)),
            expense("b", 250, Category::Food, at(2025, 12, 24)),
            expense("c", 50, Category::Food, at(2025, 12, 25)),
            expense("too-old", 999, Category::Food, at(2024, 1, 1)),
        ];
        let trend = monthly_trend(&expenses, 6, &now);
        let labels: Vec<_> = trend.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Sep 2025", "Oct 2025", "Nov 2025", "Dec 2025", "Jan 2026", "Feb 2026"]
        );
        let totals: Vec<_> = trend.iter().map(|p| p.total.cents()).collect();
        assert_eq!(totals, vec![0, 0, 0, 300, 0, 100]);
    }

    #[test]
    fn trend_window_per_period() {
        let now = at(2026, 10, 19);
        let recent = vec![expense("a", 1, Category::Food, at(2026, 9, 1))];
        assert_eq!(trend_window(&recent, Period::Month, &now), 6);
        assert_eq!(trend_window(&recent, Period::Year, &now), 12);
        assert_eq!(trend_window(&recent, Period::All, &now), 6);
        assert_eq!(trend_window(&[], Period::All, &now), 6);

        let ten_months = vec![expense("a", 1, Category::Food, at(2026, 1, 1))];
        assert_eq!(trend_window(&ten_months, Period::All, &now), 10);

        let ancient = vec![expense("a", 1, Category::Food, at(2019, 1, 1))];
        assert_eq!(trend_window(&ancient, Period::All, &now), 24);
    }

    #[test]
    fn top_expenses_is_stable_and_capped() {
        let now = at(2026, 10, 19);
        let expenses: Vec<Expense> = [300, 100, 500, 300, 200, 400, 50]
            .into_iter()
            .enumerate()
            .map(|(i, cents)| expense(&format!("e{i}"), cents, Category::Other, now))
            .collect();
        let top: Vec<_> = top_expenses(&expenses)
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(top, vec!["e2", "e5", "e0", "e3", "e4"]);
    }

    #[test]
    fn summary_may_go_negative() {
        let now = at(2026, 10, 19);
        let expenses = vec![expense("a", 60_000_00, Category::Housing, at(2026, 8, 1))];
        let summary = summary(&expenses, MoneyCents::from_major(50_000), &now);
        assert_eq!(summary.remaining, MoneyCents::from_major(-10_000));
        assert_eq!(summary.month_spent, MoneyCents::ZERO);
        assert_eq!(summary.status, BudgetStatus::Over);
    }

    #[test]
    fn period_parses() {
        assert_eq!("Year".parse::<Period>().unwrap(), Period::Year);
        assert!("week".parse::<Period>().is_err());
    }
}
