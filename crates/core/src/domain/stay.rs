use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A half-open `[check_in, check_out)` stay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayDates {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayDates {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, DomainError> {
        if check_out <= check_in {
            return Err(DomainError::InvalidStayDates {
                check_in: check_in.format(DATE_FORMAT).to_string(),
                check_out: check_out.format(DATE_FORMAT).to_string(),
            });
        }
        Ok(Self { check_in, check_out })
    }

    pub fn parse(check_in: &str, check_out: &str) -> Result<Self, DomainError> {
        let parse = |raw: &str| {
            NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
                DomainError::InvalidStayDates {
                    check_in: check_in.to_string(),
                    check_out: check_out.to_string(),
                }
            })
        };
        Self::new(parse(check_in)?, parse(check_out)?)
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &StayDates) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }

    pub fn check_in_str(&self) -> String {
        self.check_in.format(DATE_FORMAT).to_string()
    }

    pub fn check_out_str(&self) -> String {
        self.check_out.format(DATE_FORMAT).to_string()
    }
}
