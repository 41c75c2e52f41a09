//! Date and time conversions through `chrono`.
//!
//! [`AbsoluteTime`] values count days from their epoch; `DATETIMEOFFSET`
//! values carry UTC time plus the offset the client wrote them with.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use tds_wire::{AbsoluteTime, DecodedValue, Epoch};

use crate::error::TypeError;
use crate::from_value::{FromValue, mismatch};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

fn epoch_date(epoch: Epoch) -> Option<NaiveDate> {
    match epoch {
        Epoch::Y1900 => NaiveDate::from_ymd_opt(1900, 1, 1),
        Epoch::Y0001 => NaiveDate::from_ymd_opt(1, 1, 1),
    }
}

fn to_date(t: &AbsoluteTime) -> Result<NaiveDate, TypeError> {
    epoch_date(t.epoch)
        .zip(TimeDelta::try_days(i64::from(t.days)))
        .and_then(|(epoch, days)| epoch.checked_add_signed(days))
        .ok_or_else(|| TypeError::InvalidDateTime(format!("{} days from {:?}", t.days, t.epoch)))
}

fn to_time(nanos: u64) -> Result<NaiveTime, TypeError> {
    let secs = u32::try_from(nanos / NANOS_PER_SECOND).ok();
    let frac = (nanos % NANOS_PER_SECOND) as u32;
    secs.and_then(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, frac))
        .ok_or_else(|| TypeError::InvalidDateTime(format!("{nanos}ns past midnight")))
}

fn to_naive(t: &AbsoluteTime) -> Result<NaiveDateTime, TypeError> {
    Ok(to_date(t)?.and_time(to_time(t.nanos)?))
}

impl FromValue for NaiveDate {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::AbsoluteTime(t) => to_date(t),
            other => Err(mismatch("NaiveDate", other)),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::RelativeTime(t) => to_time(t.nanos),
            DecodedValue::AbsoluteTime(t) => to_time(t.nanos),
            other => Err(mismatch("NaiveTime", other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::AbsoluteTime(t) => to_naive(t),
            other => Err(mismatch("NaiveDateTime", other)),
        }
    }
}

impl FromValue for DateTime<FixedOffset> {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::AbsoluteTime(t) => {
                let minutes = i32::from(t.offset_minutes.unwrap_or(0));
                let offset = FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
                    TypeError::InvalidDateTime(format!("offset of {minutes} minutes"))
                })?;
                Ok(DateTime::from_naive_utc_and_offset(to_naive(t)?, offset))
            }
            other => Err(mismatch("DateTime<FixedOffset>", other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &DecodedValue) -> Result<Self, TypeError> {
        match value {
            DecodedValue::AbsoluteTime(t) => Ok(to_naive(t)?.and_utc()),
            other => Err(mismatch("DateTime<Utc>", other)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tds_wire::RelativeTime;

    fn absolute(epoch: Epoch, days: i32, nanos: u64, offset: Option<i16>) -> DecodedValue {
        DecodedValue::AbsoluteTime(AbsoluteTime {
            epoch,
            days,
            nanos,
            offset_minutes: offset,
        })
    }

    #[test]
    fn test_legacy_datetime() {
        // 2000-01-01 is 36524 days after 1900-01-01
        let value = absolute(Epoch::Y1900, 36524, 12 * 3600 * NANOS_PER_SECOND, None);
        let dt = NaiveDateTime::from_value(&value).unwrap();
        assert_eq!(dt.to_string(), "2000-01-01 12:00:00");
    }

    #[test]
    fn test_date_from_year_one() {
        let value = absolute(Epoch::Y0001, 0, 0, None);
        assert_eq!(
            NaiveDate::from_value(&value).unwrap(),
            NaiveDate::from_ymd_opt(1, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_offset_keeps_utc_instant() {
        let value = absolute(Epoch::Y1900, 0, 0, Some(120));
        let dt = DateTime::<FixedOffset>::from_value(&value).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 7200);
        assert_eq!(dt.to_utc().to_string(), "1900-01-01 00:00:00 UTC");
    }

    #[test]
    fn test_time_past_midnight_rejected() {
        let value = DecodedValue::RelativeTime(RelativeTime {
            nanos: 86_400 * NANOS_PER_SECOND,
            scale: 7,
        });
        assert!(matches!(
            NaiveTime::from_value(&value),
            Err(TypeError::InvalidDateTime(_))
        ));
    }
}
