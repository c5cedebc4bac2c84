//! Time-of-day sample filters (e.g. business hours).

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hours `[start_hour, end_hour)` of the local day. A window with
/// `start_hour > end_hour` wraps past midnight; equal hours cover the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl HourWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start_hour <= 23 && self.end_hour <= 23
    }

    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        let h = ts.hour();
        if self.start_hour == self.end_hour {
            true
        } else if self.start_hour < self.end_hour {
            h >= self.start_hour && h < self.end_hour
        } else {
            h >= self.start_hour || h < self.end_hour
        }
    }
}

impl fmt::Display for HourWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}h", self.start_hour, self.end_hour)
    }
}

impl std::str::FromStr for HourWindow {
    type Err = String;

    /// `"9-17"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once('-')
            .ok_or_else(|| format!("expected START-END hours, got {:?}", s))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|e| format!("bad hour {:?}: {}", v, e))
        };
        let w = HourWindow::new(parse(a)?, parse(b)?);
        if !w.is_valid() {
            return Err(format!("hours must be within 0..=23, got {:?}", s));
        }
        Ok(w)
    }
}

/// Which subset of the series a baseline was computed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "window")]
pub enum BaselineScope {
    #[default]
    Full,
    Filtered(HourWindow),
}

/// `full`, or the window as `HH-HH`.
impl fmt::Display for BaselineScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaselineScope::Full => f.write_str("full"),
            BaselineScope::Filtered(w) => write!(f, "{:02}-{:02}", w.start_hour, w.end_hour),
        }
    }
}

impl std::str::FromStr for BaselineScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "full" | "" => Ok(BaselineScope::Full),
            window => window.parse().map(BaselineScope::Filtered),
        }
    }
}

impl BaselineScope {
    pub fn includes(&self, ts: &NaiveDateTime) -> bool {
        match self {
            BaselineScope::Full => true,
            BaselineScope::Filtered(w) => w.contains(ts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at_hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(h, 30, 0)
            .unwrap()
    }

    #[test]
    fn business_hours() {
        let w: HourWindow = "9-17".parse().unwrap();
        assert!(!w.contains(&at_hour(8)));
        assert!(w.contains(&at_hour(9)));
        assert!(w.contains(&at_hour(16)));
        assert!(!w.contains(&at_hour(17)));
    }

    #[test]
    fn overnight_window_wraps() {
        let w = HourWindow::new(22, 6);
        assert!(w.contains(&at_hour(23)));
        assert!(w.contains(&at_hour(3)));
        assert!(!w.contains(&at_hour(12)));
    }

    #[test]
    fn scope_text_parses_back() {
        for scope in [BaselineScope::Full, BaselineScope::Filtered(HourWindow::new(9, 17))] {
            assert_eq!(scope.to_string().parse::<BaselineScope>(), Ok(scope));
        }
        assert_eq!(BaselineScope::Filtered(HourWindow::new(9, 17)).to_string(), "09-17");
    }

    #[test]
    fn rejects_out_of_range() {
        assert!("9-24".parse::<HourWindow>().is_err());
        assert!("nine".parse::<HourWindow>().is_err());
    }
}
