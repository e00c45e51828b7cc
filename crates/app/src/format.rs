use engine::{Category, MoneyCents, analytics::BudgetStatus};

const CURRENCY_SYMBOL: &str = "₦";

/// `₦1,234.56`, with a leading `-` for negative amounts.
pub fn money(amount: MoneyCents) -> String {
    let cents = amount.cents();
    let abs = cents.unsigned_abs();
    let major = (abs / 100).to_string();
    let minor = abs % 100;

    let mut grouped = String::with_capacity(major.len() + major.len() / 3);
    for (i, digit) in major.chars().enumerate() {
        if i > 0 && (major.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if cents < 0 { "-" } else { "" };
    format!("{sign}{CURRENCY_SYMBOL}{grouped}.{minor:02}")
}

pub fn category(category: Category) -> String {
    format!("{} {}", category.icon(), category.label())
}

pub fn status(status: BudgetStatus) -> &'static str {
    match status {
        BudgetStatus::Ok => "on track",
        BudgetStatus::Warning => "running low",
        BudgetStatus::Over => "over budget",
    }
}
