//! Reply texts sent back to the chat. Prices follow the vi-VN number format.

use serde::Deserialize;
use std::str::FromStr;

use crate::config::ConfigError;
use crate::lookup::Package;
use crate::query::ParsedQuery;

pub const HELP_TEXT: &str = "Vui lòng gửi định dạng: số ngày + quốc gia (VD: 5 Nhật Bản)";
pub const CONNECTION_ERROR_TEXT: &str = "Lỗi kết nối hệ thống, vui lòng thử lại sau.";
pub const INVALID_RESPONSE_TEXT: &str = "Phản hồi không hợp lệ từ hệ thống.";
pub const CURRENCY_SUFFIX: &str = "đ";

const MAX_FRACTION_DIGITS: usize = 3;

/// Layout of the package listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStyle {
    /// One `product: price` line per package
    #[default]
    Plain,
    /// A title line naming the query, then `- product : price` lines
    Header,
}

impl FromStr for ReplyStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "header" => Ok(Self::Header),
            _ => Err(ConfigError::UnknownReplyStyle(s.to_string())),
        }
    }
}

pub fn not_found(query: &ParsedQuery) -> String {
    format!("Không tìm thấy gói phù hợp với \"{} {}\"", query.days, query.area)
}

pub fn package_list(query: &ParsedQuery, packages: &[Package], style: ReplyStyle) -> String {
    match style {
        ReplyStyle::Plain => packages
            .iter()
            .map(|p| format!("{}: {}", p.product, format_price(p.price)))
            .collect::<Vec<_>>()
            .join("\n"),
        ReplyStyle::Header => {
            let mut lines = Vec::with_capacity(packages.len() + 1);
            lines.push(format!("Các gói {} ngày cho {}:", query.days, query.area));
            lines.extend(
                packages
                    .iter()
                    .map(|p| format!("- {} : {}", p.product, format_price(p.price))),
            );
            lines.join("\n")
        }
    }
}

/// `150000.0` -> `150.000đ`, `1234.5` -> `1.234,5đ`.
pub fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return format!("{}{}", price, CURRENCY_SUFFIX);
    }

    let rounded = round_fraction(price.abs());
    let (whole, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut out = String::new();
    if price.is_sign_negative() {
        out.push('-');
    }
    out.push_str(&group_thousands(whole));
    if !fraction.is_empty() {
        out.push(',');
        out.push_str(fraction);
    }
    out.push_str(CURRENCY_SUFFIX);
    out
}

/// Decimal digits of `value` rounded to `MAX_FRACTION_DIGITS`, half away
/// from zero on the exact binary value.
///
/// `format!` already rounds the exact value but sends ties to even. A double
/// is a tie at three decimals only when it is an odd multiple of 1/16; those
/// print exactly with four decimals, so the fourth digit is dropped and the
/// third bumped by hand.
fn round_fraction(value: f64) -> String {
    let is_tie = (value * 16.0) % 2.0 == 1.0;
    if !is_tie {
        return format!("{:.*}", MAX_FRACTION_DIGITS, value);
    }
    let exact = format!("{:.*}", MAX_FRACTION_DIGITS + 1, value);
    increment_last_digit(&exact[..exact.len() - 1])
}

fn increment_last_digit(digits: &str) -> String {
    let mut chars: Vec<char> = digits.chars().collect();
    for c in chars.iter_mut().rev() {
        match *c {
            '.' => continue,
            '9' => *c = '0',
            d => {
                *c = char::from(d as u8 + 1);
                return chars.into_iter().collect();
            }
        }
    }
    std::iter::once('1').chain(chars).collect()
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(product: &str, price: f64) -> Package {
        Package {
            product: product.to_string(),
            price,
        }
    }

    fn query(text: &str) -> ParsedQuery {
        ParsedQuery::parse(text).unwrap()
    }

    #[test]
    fn test_price_grouping() {
        assert_eq!(format_price(0.0), "0đ");
        assert_eq!(format_price(999.0), "999đ");
        assert_eq!(format_price(1000.0), "1.000đ");
        assert_eq!(format_price(150000.0), "150.000đ");
        assert_eq!(format_price(1234567.0), "1.234.567đ");
    }

    #[test]
    fn test_price_fraction_digits() {
        assert_eq!(format_price(1234.5), "1.234,5đ");
        assert_eq!(format_price(0.25), "0,25đ");
        assert_eq!(format_price(10.1239), "10,124đ");
        assert_eq!(format_price(99.9999), "100đ");
    }

    #[test]
    fn test_negative_price() {
        assert_eq!(format_price(-2500.0), "-2.500đ");
        assert_eq!(format_price(-0.0001), "-0đ");
    }

    #[test]
    fn test_large_price_keeps_every_digit() {
        assert_eq!(format_price(3.0e16), "30.000.000.000.000.000đ");
        assert_eq!(format_price(1.0e21), "1.000.000.000.000.000.000.000đ");
        assert_eq!(format_price(-4.5e18), "-4.500.000.000.000.000.000đ");
    }

    #[test]
    fn test_rounding_uses_stored_value() {
        // 1.0005 is stored as 1.000499999...
        assert_eq!(format_price(1.0005), "1đ");
        assert_eq!(format_price(2.675), "2,675đ");
    }

    #[test]
    fn test_exact_ties_round_away_from_zero() {
        assert_eq!(format_price(0.0625), "0,063đ");
        assert_eq!(format_price(2.0625), "2,063đ");
        assert_eq!(format_price(9.9375), "9,938đ");
        assert_eq!(format_price(-0.1875), "-0,188đ");
    }

    #[test]
    fn test_increment_carries() {
        assert_eq!(increment_last_digit("0.999"), "1.000");
        assert_eq!(increment_last_digit("99.99"), "100.00");
        assert_eq!(increment_last_digit("1.062"), "1.063");
    }

    #[test]
    fn test_plain_listing_keeps_order() {
        let packages = vec![package("SIM B", 200000.0), package("SIM A", 150000.0)];
        assert_eq!(
            package_list(&query("5 nhật bản"), &packages, ReplyStyle::Plain),
            "SIM B: 200.000đ\nSIM A: 150.000đ"
        );
    }

    #[test]
    fn test_single_package_plain() {
        let packages = vec![package("SIM A", 150000.0)];
        assert_eq!(
            package_list(&query("5 nhật bản"), &packages, ReplyStyle::Plain),
            "SIM A: 150.000đ"
        );
    }

    #[test]
    fn test_header_listing() {
        let packages = vec![package("SIM A", 150000.0), package("eSIM 5GB", 99000.0)];
        assert_eq!(
            package_list(&query("5 Nhật Bản"), &packages, ReplyStyle::Header),
            "Các gói 5 ngày cho nhật bản:\n- SIM A : 150.000đ\n- eSIM 5GB : 99.000đ"
        );
    }

    #[test]
    fn test_not_found_names_query() {
        assert_eq!(
            not_found(&query("7 Hàn Quốc")),
            "Không tìm thấy gói phù hợp với \"7 hàn quốc\""
        );
    }

    #[test]
    fn test_style_names() {
        assert_eq!("plain".parse::<ReplyStyle>(), Ok(ReplyStyle::Plain));
        assert_eq!(" Header ".parse::<ReplyStyle>(), Ok(ReplyStyle::Header));
        assert_eq!(
            "list".parse::<ReplyStyle>(),
            Err(ConfigError::UnknownReplyStyle("list".to_string()))
        );
    }
}
