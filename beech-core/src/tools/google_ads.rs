// beech-core/src/tools/google_ads.rs

//! Google Ads collaborator: GAQL queries over the REST `googleAds:search`
//! endpoint and Keyword Planner ideas.

use super::google_auth::{required_env, GoogleAuth, GoogleCredentials};
use crate::config::GoogleAdsConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEVELOPER_TOKEN_ENV: &str = "GOOGLE_ADS_DEVELOPER_TOKEN";
pub const LOGIN_CUSTOMER_ID_ENV: &str = "GOOGLE_ADS_LOGIN_CUSTOMER_ID";

const MICROS: f64 = 1_000_000.0;

/// The `segments.date` filter of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSpan {
    /// A GAQL preset such as `YESTERDAY` or `LAST_7_DAYS`.
    During(String),
    /// Inclusive calendar dates.
    Between(NaiveDate, NaiveDate),
}

impl DateSpan {
    pub fn during(preset: &str) -> Self {
        DateSpan::During(preset.to_string())
    }

    /// Uses `from`..`to` when both are given, otherwise the preset.
    /// Dates must be `YYYY-MM-DD`.
    pub fn from_args(preset: &str, from: Option<&str>, to: Option<&str>) -> Result<Self> {
        match (from, to) {
            (Some(from), Some(to)) => Ok(DateSpan::Between(parse_date(from)?, parse_date(to)?)),
            _ => Ok(Self::during(preset)),
        }
    }

    pub fn condition(&self) -> String {
        match self {
            DateSpan::During(preset) => format!("segments.date DURING {}", preset),
            DateSpan::Between(from, to) => format!(
                "segments.date BETWEEN '{}' AND '{}'",
                from.format("%Y-%m-%d"),
                to.format("%Y-%m-%d")
            ),
        }
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))
}

/// Strips dashes and spaces; the result must be all digits.
pub fn normalize_customer_id(raw: &str) -> Result<String> {
    let id: String = raw.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow!("Invalid customer ID '{}'", raw));
    }
    Ok(id)
}

// --- Result types ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub status: String,
    pub currency: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountMetrics {
    pub cost: f64,
    pub conversions: f64,
    pub clicks: f64,
    pub impressions: f64,
    pub avg_cpc: f64,
    pub cost_per_conv: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversionActionStatus {
    pub id: String,
    pub name: String,
    pub status: String,
    pub last_conversion_date: Option<String>,
    pub days_since_last_conversion: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisapprovedAd {
    pub ad_id: String,
    pub ad_type: String,
    pub final_urls: Vec<String>,
    pub campaign: String,
    pub ad_group: String,
    pub policy_topics: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPerformance {
    pub id: String,
    pub name: String,
    pub status: String,
    pub daily_budget: f64,
    pub cost: f64,
    pub conversions: f64,
    pub clicks: f64,
    pub impressions: f64,
    /// Percent.
    pub ctr: f64,
    pub avg_cpc: f64,
    pub cost_per_conv: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeywordPerformance {
    pub keyword: String,
    pub match_type: String,
    pub campaign: String,
    pub ad_group: String,
    pub quality_score: Option<i64>,
    pub impressions: f64,
    pub clicks: f64,
    pub cost: f64,
    pub conversions: f64,
    /// Percent.
    pub ctr: f64,
    pub avg_cpc: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeywordIdea {
    pub keyword: String,
    pub avg_monthly_searches: u64,
    pub competition: String,
    pub competition_index: u64,
    pub low_top_of_page_bid: f64,
    pub high_top_of_page_bid: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordIdeaRequest {
    pub seed_keywords: Vec<String>,
    pub landing_page_url: Option<String>,
    /// Geo target constant ID.
    pub location: String,
    /// Language constant ID.
    pub language: String,
}

/// Read access to the Google Ads accounts under the manager account.
#[async_trait]
pub trait AdsApi: Send + Sync {
    async fn customer_accounts(&self) -> Result<Vec<Account>>;
    /// `None` when the account has no rows for the span.
    async fn account_metrics(&self, customer_id: &str, span: &DateSpan) -> Result<Option<AccountMetrics>>;
    async fn conversion_actions(&self, customer_id: &str) -> Result<Vec<ConversionActionStatus>>;
    async fn disapproved_ads(&self, customer_id: &str) -> Result<Vec<DisapprovedAd>>;
    async fn campaign_performance(&self, customer_id: &str, span: &DateSpan) -> Result<Vec<CampaignPerformance>>;
    async fn keyword_performance(
        &self,
        customer_id: &str,
        span: &DateSpan,
        limit: u32,
    ) -> Result<Vec<KeywordPerformance>>;
    /// Ideas with search volume, highest volume first.
    async fn keyword_ideas(&self, request: &KeywordIdeaRequest) -> Result<Vec<KeywordIdea>>;
}

/// REST implementation of [`AdsApi`].
pub struct GoogleAdsClient {
    http_client: Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
    developer_token: String,
    login_customer_id: String,
}

impl GoogleAdsClient {
    pub fn new(
        http_client: Client,
        config: &GoogleAdsConfig,
        auth: Arc<GoogleAuth>,
        developer_token: String,
        login_customer_id: &str,
    ) -> Result<Self> {
        Ok(Self {
            http_client,
            auth,
            base_url: format!("{}/{}", config.endpoint.trim_end_matches('/'), config.api_version),
            developer_token,
            login_customer_id: normalize_customer_id(login_customer_id)
                .context("Invalid login customer ID")?,
        })
    }

    /// Reads the developer token, manager account ID and OAuth credentials
    /// from the environment.
    pub fn from_env(http_client: Client, config: &GoogleAdsConfig) -> Result<Self> {
        let auth = Arc::new(GoogleAuth::new(
            http_client.clone(),
            config.token_endpoint.clone(),
            GoogleCredentials::from_env()?,
        ));
        Self::with_auth_from_env(http_client, config, auth)
    }

    /// Like [`from_env`](Self::from_env) but sharing an existing token cache.
    pub fn with_auth_from_env(
        http_client: Client,
        config: &GoogleAdsConfig,
        auth: Arc<GoogleAuth>,
    ) -> Result<Self> {
        Self::new(
            http_client,
            config,
            auth,
            required_env(DEVELOPER_TOKEN_ENV)?,
            &required_env(LOGIN_CUSTOMER_ID_ENV)?,
        )
    }

    pub fn auth(&self) -> Arc<GoogleAuth> {
        Arc::clone(&self.auth)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.auth.access_token().await?;
        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .header("developer-token", &self.developer_token)
            .header("login-customer-id", &self.login_customer_id)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send Google Ads request to {}", url))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read Google Ads response body")?;
        if !status.is_success() {
            return Err(anyhow!("Google Ads request failed with status {}: {}", status, text));
        }
        serde_json::from_str(&text).context("Failed to parse Google Ads response")
    }

    /// Runs a GAQL query against one account, following page tokens.
    async fn search(&self, customer_id: &str, query: &str) -> Result<Vec<Value>> {
        let customer_id = normalize_customer_id(customer_id)?;
        let url = format!("{}/customers/{}/googleAds:search", self.base_url, customer_id);
        debug!(customer_id = %customer_id, query = %query.trim(), "Running GAQL query.");

        let mut rows = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut body = json!({ "query": query });
            if let Some(token) = &page_token {
                body["pageToken"] = json!(token);
            }
            let mut page = self.post(&url, &body).await?;
            if let Some(Value::Array(results)) = page.get_mut("results").map(Value::take) {
                rows.extend(results);
            }
            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }
        Ok(rows)
    }

    async fn last_conversion_date(&self, customer_id: &str, resource_name: &str) -> Result<Option<String>> {
        let query = format!(
            "SELECT segments.conversion_action, segments.date, metrics.conversions \
             FROM campaign \
             WHERE segments.conversion_action = '{}' \
             AND segments.date DURING LAST_90_DAYS \
             AND metrics.conversions > 0 \
             ORDER BY segments.date DESC LIMIT 1",
            resource_name
        );
        let rows = self.search(customer_id, &query).await?;
        Ok(rows.first().and_then(|row| text(row, "segments.date")))
    }
}

#[async_trait]
impl AdsApi for GoogleAdsClient {
    async fn customer_accounts(&self) -> Result<Vec<Account>> {
        let query = "SELECT customer_client.id, customer_client.descriptive_name, \
                     customer_client.status, customer_client.currency_code \
                     FROM customer_client \
                     WHERE customer_client.level = 1 AND customer_client.status = 'ENABLED'";
        let rows = self.search(&self.login_customer_id, query).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let id = text(row, "customerClient.id")?;
                Some(Account {
                    id,
                    name: text(row, "customerClient.descriptiveName")
                        .unwrap_or_else(|| "Unnamed Account".to_string()),
                    status: text(row, "customerClient.status").unwrap_or_else(|| "UNKNOWN".to_string()),
                    currency: text(row, "customerClient.currencyCode").unwrap_or_else(|| "AUD".to_string()),
                })
            })
            .collect())
    }

    async fn account_metrics(&self, customer_id: &str, span: &DateSpan) -> Result<Option<AccountMetrics>> {
        let query = format!(
            "SELECT customer.id, metrics.cost_micros, metrics.conversions, metrics.clicks, metrics.impressions \
             FROM campaign WHERE {}",
            span.condition()
        );
        let rows = self.search(customer_id, &query).await?;
        Ok(aggregate_metrics(&rows))
    }

    async fn conversion_actions(&self, customer_id: &str) -> Result<Vec<ConversionActionStatus>> {
        let query = "SELECT conversion_action.id, conversion_action.name, conversion_action.status, \
                     conversion_action.resource_name \
                     FROM conversion_action WHERE conversion_action.status = 'ENABLED'";
        let rows = self.search(customer_id, query).await?;
        let today = Utc::now().date_naive();

        let mut actions = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = text(row, "conversionAction.id").unwrap_or_default();
            let name = text(row, "conversionAction.name").unwrap_or_else(|| "Unnamed".to_string());
            let status = text(row, "conversionAction.status").unwrap_or_else(|| "UNKNOWN".to_string());
            let resource_name = text(row, "conversionAction.resourceName").unwrap_or_else(|| {
                format!("customers/{}/conversionActions/{}", customer_id.replace('-', ""), id)
            });

            // A failed lookup still lists the action, without a date.
            let last_conversion_date = match self.last_conversion_date(customer_id, &resource_name).await {
                Ok(date) => date,
                Err(e) => {
                    warn!(error = %e, action = %name, "Failed to fetch last conversion date.");
                    None
                }
            };
            let days_since_last_conversion = last_conversion_date
                .as_deref()
                .and_then(|d| parse_date(d).ok())
                .map(|d| (today - d).num_days());

            actions.push(ConversionActionStatus {
                id,
                name,
                status,
                last_conversion_date,
                days_since_last_conversion,
            });
        }
        Ok(actions)
    }

    async fn disapproved_ads(&self, customer_id: &str) -> Result<Vec<DisapprovedAd>> {
        let query = "SELECT ad_group_ad.ad.id, ad_group_ad.ad.type, ad_group_ad.ad.final_urls, \
                     ad_group_ad.policy_summary.approval_status, \
                     ad_group_ad.policy_summary.policy_topic_entries, \
                     campaign.name, ad_group.name \
                     FROM ad_group_ad \
                     WHERE ad_group_ad.policy_summary.approval_status = 'DISAPPROVED' \
                     AND ad_group_ad.status != 'REMOVED'";
        let rows = self.search(customer_id, query).await?;
        Ok(rows
            .iter()
            .map(|row| DisapprovedAd {
                ad_id: text(row, "adGroupAd.ad.id").unwrap_or_default(),
                ad_type: text(row, "adGroupAd.ad.type").unwrap_or_else(|| "UNKNOWN".to_string()),
                final_urls: strings(row, "adGroupAd.ad.finalUrls"),
                campaign: text(row, "campaign.name").unwrap_or_default(),
                ad_group: text(row, "adGroup.name").unwrap_or_default(),
                policy_topics: field(row, "adGroupAd.policySummary.policyTopicEntries")
                    .and_then(Value::as_array)
                    .map(|entries| {
                        entries
                            .iter()
                            .filter_map(|e| e.get("topic").and_then(Value::as_str))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn campaign_performance(&self, customer_id: &str, span: &DateSpan) -> Result<Vec<CampaignPerformance>> {
        let query = format!(
            "SELECT campaign.id, campaign.name, campaign.status, campaign_budget.amount_micros, \
             metrics.cost_micros, metrics.conversions, metrics.clicks, metrics.impressions, \
             metrics.ctr, metrics.average_cpc \
             FROM campaign WHERE {} AND campaign.status != 'REMOVED' \
             ORDER BY metrics.cost_micros DESC",
            span.condition()
        );
        let rows = self.search(customer_id, &query).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let cost = number(row, "metrics.costMicros") / MICROS;
                let conversions = number(row, "metrics.conversions");
                CampaignPerformance {
                    id: text(row, "campaign.id").unwrap_or_default(),
                    name: text(row, "campaign.name").unwrap_or_default(),
                    status: text(row, "campaign.status").unwrap_or_else(|| "UNKNOWN".to_string()),
                    daily_budget: number(row, "campaignBudget.amountMicros") / MICROS,
                    cost,
                    conversions,
                    clicks: number(row, "metrics.clicks"),
                    impressions: number(row, "metrics.impressions"),
                    ctr: number(row, "metrics.ctr") * 100.0,
                    avg_cpc: number(row, "metrics.averageCpc") / MICROS,
                    cost_per_conv: ratio(cost, conversions),
                }
            })
            .collect())
    }

    async fn keyword_performance(
        &self,
        customer_id: &str,
        span: &DateSpan,
        limit: u32,
    ) -> Result<Vec<KeywordPerformance>> {
        let query = format!(
            "SELECT ad_group_criterion.keyword.text, ad_group_criterion.keyword.match_type, \
             ad_group_criterion.quality_info.quality_score, campaign.name, ad_group.name, \
             metrics.impressions, metrics.clicks, metrics.cost_micros, metrics.conversions, \
             metrics.ctr, metrics.average_cpc \
             FROM keyword_view WHERE {} \
             ORDER BY metrics.cost_micros DESC LIMIT {}",
            span.condition(),
            limit.max(1)
        );
        let rows = self.search(customer_id, &query).await?;
        Ok(rows
            .iter()
            .map(|row| KeywordPerformance {
                keyword: text(row, "adGroupCriterion.keyword.text").unwrap_or_default(),
                match_type: text(row, "adGroupCriterion.keyword.matchType").unwrap_or_default(),
                campaign: text(row, "campaign.name").unwrap_or_default(),
                ad_group: text(row, "adGroup.name").unwrap_or_default(),
                quality_score: field(row, "adGroupCriterion.qualityInfo.qualityScore")
                    .and_then(as_f64)
                    .map(|q| q as i64),
                impressions: number(row, "metrics.impressions"),
                clicks: number(row, "metrics.clicks"),
                cost: number(row, "metrics.costMicros") / MICROS,
                conversions: number(row, "metrics.conversions"),
                ctr: number(row, "metrics.ctr") * 100.0,
                avg_cpc: number(row, "metrics.averageCpc") / MICROS,
            })
            .collect())
    }

    async fn keyword_ideas(&self, request: &KeywordIdeaRequest) -> Result<Vec<KeywordIdea>> {
        let url = format!(
            "{}/customers/{}:generateKeywordIdeas",
            self.base_url, self.login_customer_id
        );
        let body = keyword_ideas_body(request)?;
        debug!(seeds = request.seed_keywords.len(), "Requesting keyword ideas.");
        let response = self.post(&url, &body).await?;
        Ok(parse_keyword_ideas(&response))
    }
}

fn keyword_ideas_body(request: &KeywordIdeaRequest) -> Result<Value> {
    let url = request
        .landing_page_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let (seed_key, seed) = match (request.seed_keywords.is_empty(), url) {
        (false, Some(url)) => (
            "keywordAndUrlSeed",
            json!({ "keywords": request.seed_keywords, "url": url }),
        ),
        (false, None) => ("keywordSeed", json!({ "keywords": request.seed_keywords })),
        (true, Some(url)) => ("urlSeed", json!({ "url": url })),
        (true, None) => return Err(anyhow!("Please provide seed keywords or a landing page URL")),
    };

    let mut body = json!({
        "language": format!("languageConstants/{}", request.language),
        "geoTargetConstants": [format!("geoTargetConstants/{}", request.location)],
        "includeAdultKeywords": false,
    });
    body[seed_key] = seed;
    Ok(body)
}

fn parse_keyword_ideas(response: &Value) -> Vec<KeywordIdea> {
    let mut ideas: Vec<KeywordIdea> = response
        .get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(|result| {
                    let keyword = result.get("text").and_then(Value::as_str)?.to_string();
                    let metrics = result.get("keywordIdeaMetrics");
                    let metric = |name: &str| metrics.and_then(|m| m.get(name)).and_then(as_f64).unwrap_or(0.0);
                    Some(KeywordIdea {
                        keyword,
                        avg_monthly_searches: metric("avgMonthlySearches") as u64,
                        competition: metrics
                            .and_then(|m| m.get("competition"))
                            .and_then(Value::as_str)
                            .unwrap_or("UNSPECIFIED")
                            .to_uppercase(),
                        competition_index: metric("competitionIndex") as u64,
                        low_top_of_page_bid: metric("lowTopOfPageBidMicros") / MICROS,
                        high_top_of_page_bid: metric("highTopOfPageBidMicros") / MICROS,
                    })
                })
                .filter(|idea| !idea.keyword.is_empty() && idea.avg_monthly_searches > 0)
                .collect()
        })
        .unwrap_or_default();
    ideas.sort_by(|a, b| b.avg_monthly_searches.cmp(&a.avg_monthly_searches));
    ideas
}

/// Sums campaign rows into account totals. `None` for no rows.
fn aggregate_metrics(rows: &[Value]) -> Option<AccountMetrics> {
    if rows.is_empty() {
        return None;
    }
    let (mut cost_micros, mut conversions, mut clicks, mut impressions) = (0.0, 0.0, 0.0, 0.0);
    for row in rows {
        cost_micros += number(row, "metrics.costMicros");
        conversions += number(row, "metrics.conversions");
        clicks += number(row, "metrics.clicks");
        impressions += number(row, "metrics.impressions");
    }
    Some(AccountMetrics {
        cost: cost_micros / MICROS,
        conversions,
        clicks,
        impressions,
        avg_cpc: ratio(cost_micros, clicks) / MICROS,
        cost_per_conv: ratio(cost_micros, conversions) / MICROS,
    })
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

// --- Row access. REST rows use camelCase and encode int64 as strings. ---

fn field<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(row, |value, key| value.get(key))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn number(row: &Value, path: &str) -> f64 {
    field(row, path).and_then(as_f64).unwrap_or(0.0)
}

fn text(row: &Value, path: &str) -> Option<String> {
    match field(row, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn strings(row: &Value, path: &str) -> Vec<String> {
    field(row, path)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}
