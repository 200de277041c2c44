use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use time::{Date, Month, OffsetDateTime, UtcOffset};

/// Calendar day of `instant` in `tz`.
///
/// Sponsor windows are day-granular in the tenant's local time; an instant
/// late in the UTC evening can already be tomorrow for the tenant.
pub fn localized_date(instant: OffsetDateTime, tz: Tz) -> Date {
    let utc = instant.to_offset(UtcOffset::UTC);
    let seconds = utc.unix_timestamp();
    let nanos: u32 = utc.nanosecond();
    let datetime_utc = DateTime::<Utc>::from_timestamp(seconds, nanos).unwrap_or_else(|| {
        DateTime::<Utc>::from_timestamp(seconds, 0).expect("valid UTC timestamp")
    });
    let localized = tz.from_utc_datetime(&datetime_utc.naive_utc());

    let month = Month::try_from(localized.month() as u8)
        .expect("valid month value from chrono to time conversion");
    let day =
        u8::try_from(localized.day()).expect("valid day value from chrono to time conversion");
    Date::from_calendar_date(localized.year(), month, day).expect("valid calendar date")
}
