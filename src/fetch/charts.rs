use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use chs::{
    error::{Error, Result},
    model::{ChartRecord, MARKETS, track_uri_tail},
};

pub const API_BASE: &str = match option_env!("CHARTS_API_BASE") {
    Some(s) => s,
    None => "https://charts-spotify-com-service.spotify.com/auth/v0/charts",
};

const CHARTS_SITE: &str = "https://charts.spotify.com";
const USER_AGENT: &str = "Mozilla/5.0";

/// How a market walk ended. `Unauthorized` means the token expired mid-run
/// and the remaining markets were never requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Complete,
    Unauthorized,
}

#[derive(Deserialize)]
struct ChartResponse {
    #[serde(default)]
    entries: Vec<Value>,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(rename = "chartEntryData")]
    chart_entry_data: EntryData,
    #[serde(rename = "trackMetadata")]
    track_metadata: TrackMetadata,
}

#[derive(Deserialize)]
struct EntryData {
    #[serde(rename = "currentRank")]
    current_rank: u32,
    #[serde(rename = "rankingMetric")]
    ranking_metric: Metric,
}

#[derive(Deserialize)]
struct Metric {
    value: u64,
}

#[derive(Deserialize)]
struct TrackMetadata {
    #[serde(rename = "trackUri")]
    track_uri: String,
    #[serde(rename = "trackName")]
    track_name: String,
    artists: Vec<Artist>,
}

#[derive(Deserialize)]
struct Artist {
    name: String,
}

/// Map one market's 200 body into records, provider order preserved.
/// A body without an `entries` list is an empty market; a single bad entry
/// is dropped without taking the rest of the market with it.
pub fn parse_market_body(week_id: &str, country: &str, body: &str) -> serde_json::Result<Vec<ChartRecord>> {
    let response: ChartResponse = serde_json::from_str(body)?;

    let mut records = Vec::with_capacity(response.entries.len());
    for (idx, value) in response.entries.into_iter().enumerate() {
        let entry = match serde_json::from_value::<Entry>(value) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(target: "fetch", "[{country}] entry #{idx} malformed: {e}");
                continue;
            }
        };
        records.push(ChartRecord {
            week_id: week_id.to_owned(),
            country: country.to_owned(),
            rank: entry.chart_entry_data.current_rank,
            streams: entry.chart_entry_data.ranking_metric.value,
            track_id: track_uri_tail(&entry.track_metadata.track_uri).to_owned(),
            track_name: entry.track_metadata.track_name,
            artist_names: entry.track_metadata.artists.into_iter().map(|a| a.name).collect(),
        });
    }
    Ok(records)
}

pub struct ChartsClient {
    client: Client,
    base: String,
}

impl ChartsClient {
    pub fn new(base: impl Into<String>) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            base: base.into(),
        })
    }

    /// Walk every market in enumeration order, one GET per market.
    /// Transient per-market failures are logged and skipped; a 401 stops
    /// the walk and hands back whatever accumulated so far.
    pub async fn fetch_week(
        &self,
        week_id: &str,
        token: &str,
    ) -> Result<(Vec<ChartRecord>, FetchStatus)> {
        if token.is_empty() {
            return Err(Error::CredentialMissing("BEARER_TOKEN"));
        }

        let mut records = Vec::new();

        for country in MARKETS {
            tracing::info!(target: "fetch", "fetching chart for {country} ...");

            let url = format!(
                "{}/regional-{}-weekly/{week_id}",
                self.base,
                country.to_ascii_lowercase(),
            );
            let request = self
                .client
                .get(&url)
                .header("Accept", "application/json")
                .header("Authorization", format!("Bearer {token}"))
                .header("Origin", CHARTS_SITE)
                .header("Referer", CHARTS_SITE)
                .header("User-Agent", USER_AGENT);

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(target: "fetch", "[{country}] request failed: {e:?}");
                    continue;
                }
            };

            match response.status() {
                StatusCode::OK => {
                    let body = match response.text().await {
                        Ok(b) => b,
                        Err(e) => {
                            tracing::warn!(target: "fetch", "[{country}] body failed: {e:?}");
                            continue;
                        }
                    };
                    match parse_market_body(week_id, country, &body) {
                        Ok(market_records) => {
                            tracing::info!(target: "fetch", "fetched {} tracks for {country}", market_records.len());
                            records.extend(market_records);
                        }
                        Err(e) => {
                            tracing::warn!(target: "fetch", "[{country}] malformed response: {e}");
                        }
                    }
                }
                StatusCode::UNAUTHORIZED => {
                    tracing::error!(target: "fetch", "\x1b[31m[{country}] token rejected (401), aborting remaining markets\x1b[0m");
                    return Ok((records, FetchStatus::Unauthorized));
                }
                status => {
                    tracing::warn!(target: "fetch", "[{country}] failed with status {status}");
                }
            }
        }

        Ok((records, FetchStatus::Complete))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub const GOOD_BODY: &str = r#"{
        "entries": [
            {
                "chartEntryData": {"currentRank": 1, "rankingMetric": {"value": 1000000}},
                "trackMetadata": {
                    "trackUri": "spotify:track:abc",
                    "trackName": "Song A",
                    "artists": [{"name": "Artist A"}, {"name": "Artist B"}]
                }
            },
            {
                "chartEntryData": {"currentRank": 2, "rankingMetric": {"value": 999}},
                "trackMetadata": {
                    "trackUri": "spotify:track:def",
                    "trackName": "Song B",
                    "artists": [{"name": "Artist C"}]
                }
            }
        ]
    }"#;

    #[test]
    fn parses_entries_in_order() {
        let records = parse_market_body("2024-05-02", "US", GOOD_BODY).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].track_id, "abc");
        assert_eq!(records[0].rank, 1);
        assert_eq!(records[0].streams, 1_000_000);
        assert_eq!(records[0].artist_names, ["Artist A", "Artist B"]);
        assert_eq!(records[1].track_id, "def");
        assert_eq!(records[1].week_id, "2024-05-02");
        assert_eq!(records[1].country, "US");
    }

    #[test]
    fn missing_entries_list_is_an_empty_market() {
        assert!(parse_market_body("2024-05-02", "US", "{}").unwrap().is_empty());
        assert!(parse_market_body("2024-05-02", "US", r#"{"entries": []}"#).unwrap().is_empty());
    }

    #[test]
    fn bad_entry_is_skipped_not_fatal() {
        let body = r#"{
            "entries": [
                {"chartEntryData": {"currentRank": 1}},
                {
                    "chartEntryData": {"currentRank": 2, "rankingMetric": {"value": 5}},
                    "trackMetadata": {
                        "trackUri": "spotify:track:ok",
                        "trackName": "Kept",
                        "artists": [{"name": "A"}]
                    }
                }
            ]
        }"#;
        let records = parse_market_body("2024-05-02", "US", body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].track_id, "ok");
    }

    #[test]
    fn garbage_body_is_an_error() {
        assert!(parse_market_body("2024-05-02", "US", "<html>nope</html>").is_err());
    }

    #[test]
    fn empty_token_fails_before_any_request() {
        let client = ChartsClient::new("http://127.0.0.1:1").unwrap();
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let err = rt.block_on(client.fetch_week("2024-05-02", "")).unwrap_err();
        assert!(matches!(err, Error::CredentialMissing("BEARER_TOKEN")));
    }
}
