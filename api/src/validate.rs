//! Syntactic validation of user input. Everything the dialog machine
//! accepts passes through here before it reaches the store.

use jiff::civil::Date;
use rust_decimal::Decimal;

use crate::store::{
    MAX_CATEGORY_NAME_LEN, MAX_DESCRIPTION_LEN, MAX_NAME_LEN, Money,
};

/// Parse a user-typed amount: `,` and `$` are stripped, only digits and an
/// optional fractional part are accepted, and the result must lie in the
/// allowed range. Zero passes only with `allow_zero` (initial balance).
pub fn parse_amount(input: &str, allow_zero: bool) -> Option<Money> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '$')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    // digits with at most one decimal point; no sign, no exponent
    let mut seen_dot = false;
    for c in cleaned.chars() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => return None,
        }
    }
    if cleaned.starts_with('.') {
        return None;
    }
    let value: Decimal = cleaned.parse().ok()?;
    // bounds are checked before quantizing so 0.009 is below the minimum
    // rather than rounding up to it
    if value.is_zero() {
        return allow_zero.then_some(Money::ZERO);
    }
    if value < Money::MIN.to_decimal() || value > Money::MAX.to_decimal() {
        return None;
    }
    Money::from_decimal(value)
}

fn valid_length(input: &str, max: usize) -> Option<&str> {
    let trimmed = input.trim();
    (2..=max).contains(&trimmed.chars().count()).then_some(trimmed)
}

pub fn valid_category_name(input: &str) -> Option<&str> {
    valid_length(input, MAX_CATEGORY_NAME_LEN)
}

pub fn valid_subscription_name(input: &str) -> Option<&str> {
    valid_length(input, MAX_NAME_LEN)
}

pub fn valid_counterparty_name(input: &str) -> Option<&str> {
    valid_length(input, MAX_NAME_LEN)
}

pub fn valid_description(input: &str) -> Option<&str> {
    valid_length(input, MAX_DESCRIPTION_LEN)
}

/// `DD/MM/YYYY`, or `DD/MM` with the current year implied. Must be a real
/// calendar date.
pub fn parse_date(input: &str, current_year: i16) -> Option<Date> {
    let parts: Vec<&str> = input.trim().split('/').collect();
    let (day_str, month_str, year_str) = match parts.as_slice() {
        [d, m] => (*d, *m, None),
        [d, m, y] => (*d, *m, Some(*y)),
        _ => return None,
    };
    if !(1..=2).contains(&day_str.len())
        || !(1..=2).contains(&month_str.len())
        || year_str.is_some_and(|y| y.len() != 4)
    {
        return None;
    }
    let day: i8 = day_str.parse().ok()?;
    let month: i8 = month_str.parse().ok()?;
    let year: i16 = match year_str {
        Some(y) => y.parse().ok()?,
        None => current_year,
    };
    Date::new(year, month, day).ok()
}

/// Day-of-month for subscription charges.
pub fn parse_day(input: &str) -> Option<i32> {
    let day: i32 = input.trim().parse().ok()?;
    (1..=31).contains(&day).then_some(day)
}

/// Strip control characters and cap the length.
pub fn sanitize_text(input: &str, max_len: usize) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| {
            !matches!(u32::from(*c), 0x00..=0x1f | 0x7f..=0x9f)
        })
        .take(max_len)
        .collect();
    cleaned.trim().to_string()
}
