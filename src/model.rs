use chrono::{Datelike, Days, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Every market the provider publishes a weekly chart for, in the order we
/// walk them. `GLOBAL` is a synthetic market, not an ISO country code.
#[rustfmt::skip]
pub const MARKETS: [&str; 74] = [
    "GLOBAL", "AR", "AU", "AT", "BY", "BE", "BO", "BR", "BG", "CA", "CL", "CO", "CR", "CY", "CZ", "DK",
    "DO", "EC", "EG", "SV", "EE", "FI", "FR", "DE", "GR", "GT", "HN", "HK", "HU", "IS", "IN", "ID", "IE",
    "IL", "IT", "JP", "KZ", "LV", "LT", "LU", "MY", "MX", "MA", "NL", "NZ", "NI", "NG", "NO", "PK", "PA",
    "PY", "PE", "PH", "PL", "PT", "RO", "SA", "SG", "SK", "ZA", "KR", "ES", "SE", "CH", "TW", "TH", "TR",
    "AE", "UA", "GB", "UY", "US", "VE", "VN",
];

/// One chart position for one (week, market, track). This is both the
/// in-memory fetch result and the snapshot file element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRecord {
    pub week_id: String,
    pub country: String,
    pub rank: u32,
    pub streams: u64,
    pub track_id: String,
    pub track_name: String,
    pub artist_names: Vec<String>,
}

/// Track ids arrive as URIs like `spotify:track:4cOdK2wGLETKBW3PvgPWqT`;
/// the id is the final colon-delimited segment.
pub fn track_uri_tail(uri: &str) -> &str {
    uri.rsplit(':').next().unwrap_or(uri)
}

/// Charts close on Thursdays. `today - ((weekday - 3) mod 7)` days.
pub fn latest_thursday() -> NaiveDate {
    latest_thursday_from(Local::now().date_naive())
}

pub fn latest_thursday_from(today: NaiveDate) -> NaiveDate {
    let offset = (today.weekday().num_days_from_monday() + 7 - 3) % 7;
    today - Days::new(offset.into())
}

pub fn is_thursday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Thu
}
