//! Facet definitions and range buckets
//!
//! A facet is either a plain property name or a property with a list of named
//! ranges: `price$[{name:'cheap', resolution:'double', end:10}, ...]`.
//! Numeric ranges use absolute bounds. Date ranges count whole units relative
//! to the current time truncated to the resolution, so `{resolution:'day',
//! begin:-1, end:0}` is "yesterday". Bounds are half-open and a missing bound
//! is unbounded.

use crate::error::FacetConfigError;
use crate::facetnav::syntax::{lookup, parse_object_list};
use crate::store::PropertyValue;
use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    Long,
    Double,
    Year,
    Month,
    Week,
    Day,
    Hour,
}

impl Resolution {
    pub fn parse(text: &str) -> Result<Self, FacetConfigError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(Resolution::Long),
            "double" => Ok(Resolution::Double),
            "year" => Ok(Resolution::Year),
            "month" => Ok(Resolution::Month),
            "week" => Ok(Resolution::Week),
            "day" => Ok(Resolution::Day),
            "hour" => Ok(Resolution::Hour),
            other => Err(FacetConfigError::UnknownResolution(other.to_string())),
        }
    }

    pub fn is_date(&self) -> bool {
        !matches!(self, Resolution::Long | Resolution::Double)
    }
}

/// Source of "now" for relative date ranges
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetRange {
    pub property: String,
    pub name: String,
    pub resolution: Resolution,
    pub begin: Option<f64>,
    pub end: Option<f64>,
}

impl FacetRange {
    /// Whether any value of the property falls in the range.
    pub fn matches(&self, values: &[PropertyValue], now: DateTime<Utc>) -> bool {
        values.iter().any(|v| self.contains(v, now))
    }

    pub fn contains(&self, value: &PropertyValue, now: DateTime<Utc>) -> bool {
        if self.resolution.is_date() {
            let at = match value.as_date() {
                Some(at) => at,
                None => return false,
            };
            let start = truncate(now, self.resolution);
            let above = match self.begin {
                None => true,
                Some(b) => match shift(start, self.resolution, b as i64) {
                    Some(lower) => at >= lower,
                    // beyond the calendar: open or unreachable depending on direction
                    None => b < 0.0,
                },
            };
            let below = match self.end {
                None => true,
                Some(e) => match shift(start, self.resolution, e as i64) {
                    Some(upper) => at < upper,
                    None => e > 0.0,
                },
            };
            above && below
        } else {
            let v = match value.as_f64() {
                Some(v) => v,
                None => return false,
            };
            let v = if self.resolution == Resolution::Long { v.trunc() } else { v };
            self.begin.map_or(true, |b| v >= b) && self.end.map_or(true, |e| v < e)
        }
    }
}

fn truncate(now: DateTime<Utc>, resolution: Resolution) -> DateTime<Utc> {
    let date = now.date_naive();
    let (y, m, d, h) = match resolution {
        Resolution::Year => (date.year(), 1, 1, 0),
        Resolution::Month => (date.year(), date.month(), 1, 0),
        Resolution::Week => {
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            (monday.year(), monday.month(), monday.day(), 0)
        }
        Resolution::Day => (date.year(), date.month(), date.day(), 0),
        Resolution::Hour => (date.year(), date.month(), date.day(), now.hour()),
        Resolution::Long | Resolution::Double => return now,
    };
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().unwrap_or(now)
}

fn shift(start: DateTime<Utc>, resolution: Resolution, units: i64) -> Option<DateTime<Utc>> {
    match resolution {
        Resolution::Year => shift_months(start, units.checked_mul(12)?),
        Resolution::Month => shift_months(start, units),
        Resolution::Week => start.checked_add_signed(Duration::try_weeks(units)?),
        Resolution::Day => start.checked_add_signed(Duration::try_days(units)?),
        Resolution::Hour => start.checked_add_signed(Duration::try_hours(units)?),
        Resolution::Long | Resolution::Double => None,
    }
}

fn shift_months(start: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        start.checked_add_months(magnitude)
    } else {
        start.checked_sub_months(magnitude)
    }
}

/// A facet entry of a navigation node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFacet {
    pub property: String,
    /// Raw range list, present for range facets
    pub range_config: Option<String>,
    pub ranges: Vec<FacetRange>,
}

impl ParsedFacet {
    pub fn parse(facet: &str) -> Result<Self, FacetConfigError> {
        let malformed = |reason: &str| FacetConfigError::Malformed {
            facet: facet.to_string(),
            reason: reason.to_string(),
        };
        let (property, config) = match facet.split_once('$') {
            Some((property, config)) => (property.trim(), Some(config.trim())),
            None => (facet.trim(), None),
        };
        if property.is_empty() {
            return Err(malformed("property name is empty"));
        }
        let config = match config {
            Some(config) => config,
            None => {
                return Ok(Self {
                    property: property.to_string(),
                    range_config: None,
                    ranges: Vec::new(),
                })
            }
        };

        let objects = parse_object_list(config).map_err(|e| malformed(&e))?;
        if objects.is_empty() {
            return Err(malformed("range list is empty"));
        }
        let mut ranges = Vec::with_capacity(objects.len());
        for object in &objects {
            let name = lookup(object, "name").ok_or_else(|| malformed("range without name"))?;
            let resolution = Resolution::parse(
                lookup(object, "resolution").ok_or_else(|| malformed("range without resolution"))?,
            )?;
            let bound = |key: &str| -> Result<Option<f64>, FacetConfigError> {
                match lookup(object, key) {
                    None => Ok(None),
                    Some(text) => {
                        let v: f64 = text
                            .trim()
                            .parse()
                            .map_err(|_| malformed(&format!("{} '{}' is not a number", key, text)))?;
                        if resolution.is_date() && v.fract() != 0.0 {
                            return Err(malformed(&format!("{} must be a whole number of units", key)));
                        }
                        Ok(Some(v))
                    }
                }
            };
            ranges.push(FacetRange {
                property: property.to_string(),
                name: name.to_string(),
                resolution,
                begin: bound("begin")?,
                end: bound("end")?,
            });
        }
        Ok(Self {
            property: property.to_string(),
            range_config: Some(config.to_string()),
            ranges,
        })
    }

    pub fn is_range(&self) -> bool {
        self.range_config.is_some()
    }

    pub fn range(&self, name: &str) -> Option<&FacetRange> {
        self.ranges.iter().find(|r| r.name == name)
    }
}
