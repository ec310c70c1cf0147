use super::api::BotApi;
use crate::{
    error::FetchError,
    model::{
        candle::PairCandlesResponse,
        profit::{PairPerformance, ProfitSummary, TimescaleResponse},
        system::{BotConfig, LogsResponse, SysInfo, TradeCount, VersionResponse, WhitelistResponse},
        trade::{Trade, TradesPage},
    },
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, de::DeserializeOwned};
use smol_str::SmolStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

const API_PREFIX: &str = "api/v1/";

/// HTTP basic auth credentials for one bot.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: SmolStr,
    pub password: SmolStr,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// [`BotApi`] over HTTP using `reqwest`.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    timeout: Duration,
}

/// Error body freqtrade returns for rejected requests, eg/ `{"detail": "Unauthorized"}`.
#[derive(Debug, Deserialize)]
struct DetailResponse {
    detail: String,
}

impl RestClient {
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| FetchError::Connectivity(error.to_string()))?;

        Ok(Self {
            http,
            base_url,
            credentials,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(API_PREFIX)
            .and_then(|api| api.join(path))
            .map_err(|error| FetchError::Connectivity(format!("invalid endpoint {path}: {error}")))
    }

    async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "requesting");

        let response = self
            .http
            .get(url.clone())
            .basic_auth(
                self.credentials.username.as_str(),
                Some(self.credentials.password.as_str()),
            )
            .query(query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::from(error)
                }
            })?;

        check_status(response.status(), &url)?;

        let body = response.bytes().await.map_err(FetchError::from)?;
        parse_body(url.path(), &body)
    }
}

/// Map an HTTP status to the fetch error taxonomy.
pub(crate) fn check_status(status: StatusCode, url: &Url) -> Result<(), FetchError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(FetchError::Unauthorized);
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(())
}

/// Deserialise a response body, recognising freqtrade's `detail` rejection envelope.
pub(crate) fn parse_body<T>(endpoint: &str, body: &[u8]) -> Result<T, FetchError>
where
    T: DeserializeOwned,
{
    serde_json::from_slice::<T>(body).map_err(|error| {
        match serde_json::from_slice::<DetailResponse>(body) {
            Ok(detail) if detail.detail.eq_ignore_ascii_case("unauthorized") => {
                FetchError::Unauthorized
            }
            Ok(detail) => FetchError::malformed(endpoint, detail.detail),
            Err(_) => FetchError::malformed(endpoint, error),
        }
    })
}

#[async_trait]
impl BotApi for RestClient {
    async fn version(&self) -> Result<VersionResponse, FetchError> {
        self.get("version", &[]).await
    }

    async fn show_config(&self) -> Result<BotConfig, FetchError> {
        self.get("show_config", &[]).await
    }

    async fn status(&self) -> Result<Vec<Trade>, FetchError> {
        self.get("status", &[]).await
    }

    async fn trades(&self, offset: u64, limit: u32) -> Result<TradesPage, FetchError> {
        self.get(
            "trades",
            &[("offset", offset.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn trade(&self, trade_id: u64) -> Result<Trade, FetchError> {
        self.get(&format!("trade/{trade_id}"), &[]).await
    }

    async fn profit(&self) -> Result<ProfitSummary, FetchError> {
        self.get("profit", &[]).await
    }

    async fn daily(&self, days: u32) -> Result<TimescaleResponse, FetchError> {
        self.get("daily", &[("timescale", days.to_string())]).await
    }

    async fn weekly(&self, weeks: u32) -> Result<TimescaleResponse, FetchError> {
        self.get("weekly", &[("timescale", weeks.to_string())]).await
    }

    async fn monthly(&self, months: u32) -> Result<TimescaleResponse, FetchError> {
        self.get("monthly", &[("timescale", months.to_string())]).await
    }

    async fn performance(&self) -> Result<Vec<PairPerformance>, FetchError> {
        self.get("performance", &[]).await
    }

    async fn pair_candles(
        &self,
        pair: &str,
        timeframe: &str,
        limit: u32,
    ) -> Result<PairCandlesResponse, FetchError> {
        self.get(
            "pair_candles",
            &[
                ("pair", pair.to_string()),
                ("timeframe", timeframe.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn logs(&self, limit: u32) -> Result<LogsResponse, FetchError> {
        self.get("logs", &[("limit", limit.to_string())]).await
    }

    async fn sysinfo(&self) -> Result<SysInfo, FetchError> {
        self.get("sysinfo", &[]).await
    }

    async fn whitelist(&self) -> Result<WhitelistResponse, FetchError> {
        self.get("whitelist", &[]).await
    }

    async fn count(&self) -> Result<TradeCount, FetchError> {
        self.get("count", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RestClient {
        RestClient::new(
            Url::parse("http://127.0.0.1:8080/").unwrap(),
            Credentials {
                username: "freqtrader".into(),
                password: "secret".into(),
            },
            Duration::from_secs(3),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint() {
        struct TestCase {
            input: &'static str,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: plain endpoint
                input: "status",
                expected: "http://127.0.0.1:8080/api/v1/status",
            },
            TestCase {
                // TC1: path parameter
                input: "trade/42",
                expected: "http://127.0.0.1:8080/api/v1/trade/42",
            },
        ];

        let client = client();
        for (index, test) in tests.into_iter().enumerate() {
            let actual = client.endpoint(test.input).unwrap();
            assert_eq!(actual.as_str(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_check_status() {
        struct TestCase {
            input: StatusCode,
            expected: Result<(), FetchError>,
        }

        let url = Url::parse("http://127.0.0.1:8080/api/v1/profit").unwrap();
        let tests = vec![
            TestCase {
                // TC0: success
                input: StatusCode::OK,
                expected: Ok(()),
            },
            TestCase {
                // TC1: 401 is unauthorized, not connectivity
                input: StatusCode::UNAUTHORIZED,
                expected: Err(FetchError::Unauthorized),
            },
            TestCase {
                // TC2: 503 is a status failure
                input: StatusCode::SERVICE_UNAVAILABLE,
                expected: Err(FetchError::Status {
                    status: 503,
                    url: url.to_string(),
                }),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = check_status(test.input, &url);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_parse_body() {
        let ok = parse_body::<VersionResponse>("/api/v1/version", br#"{"version":"2024.2"}"#);
        assert_eq!(ok.unwrap().version, "2024.2");

        let unauthorized =
            parse_body::<VersionResponse>("/api/v1/version", br#"{"detail":"Unauthorized"}"#);
        assert_eq!(unauthorized, Err(FetchError::Unauthorized));

        let detail = parse_body::<VersionResponse>("/api/v1/version", br#"{"detail":"Not Found"}"#);
        assert!(matches!(detail, Err(FetchError::MalformedResponse { .. })));

        let garbage = parse_body::<VersionResponse>("/api/v1/version", b"<html>");
        assert!(matches!(garbage, Err(FetchError::MalformedResponse { .. })));
    }
}
