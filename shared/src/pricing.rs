use bigdecimal::BigDecimal;
use num_traits::{Signed, Zero};
use serde::Serializer;

use crate::OrderItem;

/// Sum of unit price times quantity, kept at two fractional digits.
pub fn compute_total<'a, I>(items: I) -> BigDecimal
where
    I: IntoIterator<Item = &'a OrderItem>,
{
    let sum = items
        .into_iter()
        .fold(BigDecimal::zero(), |acc, item| acc + item.subtotal());
    sum.round(2).with_scale(2)
}

/// Plain decimal with exactly two fractional digits, e.g. `0.00` or `-3.50`.
pub fn money_string(amount: &BigDecimal) -> String {
    let cents = (amount.round(2) * BigDecimal::from(100)).round(0);
    let (digits, _) = cents.with_scale(0).into_bigint_and_exponent();
    let sign = if digits.is_negative() { "-" } else { "" };
    let padded = format!("{:0>3}", digits.abs().to_string());
    let (whole, fraction) = padded.split_at(padded.len() - 2);
    format!("{sign}{whole}.{fraction}")
}

/// `serialize_with` target for money fields.
pub fn serialize_money<S>(amount: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&money_string(amount))
}

/// US dollar rendering, e.g. `$1,234.50`.
pub fn format_currency(amount: &BigDecimal) -> String {
    let plain = money_string(amount);
    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (whole, cents) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}${grouped}.{cents}")
}

pub fn is_valid_zip_code(zip_code: &str) -> bool {
    zip_code.len() == 5 && zip_code.bytes().all(|b| b.is_ascii_digit())
}
