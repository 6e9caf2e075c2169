//! Transaction record types.
//!
//! A `Transaction` is the final business record a completed flow produces.
//! Amounts are integer euro-cents; periods are split into month/year
//! columns at payload-build time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// A billing period, entered by the user as `MM-YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub month: u8,
    pub year: u16,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{}", self.month, self.year)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (month_str, year_str) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid period: '{s}'"))?;
        let month: u8 = month_str
            .parse()
            .map_err(|_| format!("invalid month: '{month_str}'"))?;
        let year: u16 = year_str
            .parse()
            .map_err(|_| format!("invalid year: '{year_str}'"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range: {month}"));
        }
        if !(2000..2100).contains(&year) {
            return Err(format!("year out of range: {year}"));
        }
        Ok(Period { month, year })
    }
}

/// A registered fee transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// UUIDv7 assigned at build time.
    pub id: Uuid,
    pub family: String,
    /// Category label carried by the command flavor (e.g. "Quota Mensile").
    pub category: String,
    pub amount_cents: i64,
    pub month: u8,
    pub year: u16,
    /// Contact handle the registration notifies, normalized to `@name`.
    pub contact: String,
    pub registered_by: i64,
    pub registered_by_username: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn period(&self) -> Period {
        Period {
            month: self.month,
            year: self.year,
        }
    }
}

/// Format integer euro-cents the way the bot displays amounts: `25,50`.
pub fn format_cents(cents: i64) -> String {
    format!("{},{:02}", cents / 100, (cents % 100).abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_roundtrip() {
        let period: Period = "08-2026".parse().unwrap();
        assert_eq!(period.month, 8);
        assert_eq!(period.year, 2026);
        assert_eq!(period.to_string(), "08-2026");
    }

    #[test]
    fn test_period_rejects_bad_input() {
        assert!("2026-08".parse::<Period>().is_err());
        assert!("13-2026".parse::<Period>().is_err());
        assert!("00-2026".parse::<Period>().is_err());
        assert!("08-1999".parse::<Period>().is_err());
        assert!("agosto".parse::<Period>().is_err());
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(2550), "25,50");
        assert_eq!(format_cents(100), "1,00");
        assert_eq!(format_cents(5), "0,05");
    }
}
