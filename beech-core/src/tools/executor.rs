// beech-core/src/tools/executor.rs

//! Dispatches validated tool calls to the Google Ads, Calendar, SMTP and web
//! collaborators.

use super::calendar::{CalendarApi, GoogleCalendarClient, Meeting};
use super::google_ads::{
    normalize_customer_id, parse_date, Account, AccountMetrics, AdsApi, CampaignPerformance,
    ConversionActionStatus, DateSpan, DisapprovedAd, GoogleAdsClient, KeywordIdea,
    KeywordIdeaRequest, KeywordPerformance,
};
use super::google_auth::{GoogleAuth, GoogleCredentials};
use super::keywords::KeywordAnalyzer;
use super::mailer::{is_valid_recipient, Mailer, OutgoingEmail, SmtpMailer};
use super::registry::{self, *};
use super::report::{mcc_report_data, render_report_html, ReportTemplate};
use super::web::WebFetcher;
use super::{plural, ToolOutcome, ToolProvider};
use crate::config::{AgentConfig, KeywordResearchConfig};
use crate::errors::ToolError;
use crate::models::tools::{ToolDefinition, ToolInput};
use crate::providers::Provider;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_METRICS_RANGE: &str = "YESTERDAY";
const DEFAULT_PERFORMANCE_RANGE: &str = "LAST_7_DAYS";
const REPORT_COMPARISON_RANGE: &str = "LAST_7_DAYS";
const DEFAULT_KEYWORD_LIMIT: u32 = 50;
const DEFAULT_MEETING_DAYS: i64 = 7;
const MAX_MEETING_DAYS: i64 = 366;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerArgs {
    customer_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsArgs {
    customer_id: String,
    date_from: Option<String>,
    date_to: Option<String>,
    comparison_date_from: Option<String>,
    comparison_date_to: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportArgs {
    #[serde(default)]
    account_ids: Vec<String>,
    #[serde(default)]
    template_type: ReportTemplate,
    recipients: Vec<String>,
    date_from: Option<String>,
    date_to: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeywordSearchArgs {
    seed_keywords: Vec<String>,
    landing_page_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerformanceArgs {
    customer_id: String,
    date_range: Option<String>,
    limit: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeetingArgs {
    days: Option<i64>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Deserialize)]
struct UrlArgs {
    url: String,
}

/// The [`ToolProvider`] behind the chat endpoint.
pub struct AdsToolProvider {
    ads: Arc<dyn AdsApi>,
    calendar: Arc<dyn CalendarApi>,
    mailer: Arc<dyn Mailer>,
    web: WebFetcher,
    keyword_analyzer: Option<KeywordAnalyzer>,
    research: KeywordResearchConfig,
}

impl AdsToolProvider {
    pub fn new(
        ads: Arc<dyn AdsApi>,
        calendar: Arc<dyn CalendarApi>,
        mailer: Arc<dyn Mailer>,
        web: WebFetcher,
        research: KeywordResearchConfig,
    ) -> Self {
        Self {
            ads,
            calendar,
            mailer,
            web,
            keyword_analyzer: None,
            research,
        }
    }

    /// Wires the live collaborators from `config` and the environment.
    /// A collaborator whose credentials are missing is replaced by
    /// [`Unconfigured`], so the chat keeps working without it.
    pub fn from_env(
        config: &AgentConfig,
        http_client: Client,
        analysis_provider: Option<Arc<dyn Provider>>,
    ) -> Result<Self> {
        let auth = GoogleCredentials::from_env().map(|credentials| {
            Arc::new(GoogleAuth::new(
                http_client.clone(),
                config.google_ads.token_endpoint.clone(),
                credentials,
            ))
        });

        let ads: Arc<dyn AdsApi> = match &auth {
            Ok(auth) => match GoogleAdsClient::with_auth_from_env(
                http_client.clone(),
                &config.google_ads,
                Arc::clone(auth),
            ) {
                Ok(client) => Arc::new(client),
                Err(e) => unconfigured("Google Ads", &e),
            },
            Err(e) => unconfigured("Google Ads", e),
        };
        let calendar: Arc<dyn CalendarApi> = match &auth {
            Ok(auth) => Arc::new(GoogleCalendarClient::new(
                http_client.clone(),
                config.calendar.clone(),
                Arc::clone(auth),
            )),
            Err(e) => unconfigured("Google Calendar", e),
        };
        let mailer: Arc<dyn Mailer> = match SmtpMailer::from_env(&config.email) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => unconfigured("Email", &e),
        };

        let provider = Self::new(
            ads,
            calendar,
            mailer,
            WebFetcher::new(&config.web)?,
            config.keyword_research.clone(),
        );
        Ok(match analysis_provider {
            Some(model) => provider.with_keyword_analyzer(KeywordAnalyzer::new(
                model,
                config.keyword_research.analysis_limit,
            )),
            None => provider,
        })
    }

    /// Enables theme grouping of keyword research results.
    pub fn with_keyword_analyzer(mut self, analyzer: KeywordAnalyzer) -> Self {
        self.keyword_analyzer = Some(analyzer);
        self
    }

    async fn get_accounts(&self) -> Result<ToolOutcome> {
        let accounts = self.ads.customer_accounts().await?;
        let message = format!("Found {} active accounts", accounts.len());
        Ok(ToolOutcome::ok(accounts, message))
    }

    async fn get_account_metrics(&self, args: MetricsArgs) -> Result<ToolOutcome> {
        let current = DateSpan::from_args(
            DEFAULT_METRICS_RANGE,
            args.date_from.as_deref(),
            args.date_to.as_deref(),
        )?;
        let comparison_span = match (&args.comparison_date_from, &args.comparison_date_to) {
            (Some(from), Some(to)) => Some(DateSpan::Between(parse_date(from)?, parse_date(to)?)),
            _ => None,
        };

        let Some(metrics) = self.ads.account_metrics(&args.customer_id, &current).await? else {
            return Ok(ToolOutcome::failure(format!(
                "No data found for account {}",
                args.customer_id
            )));
        };
        let comparison = match comparison_span {
            Some(span) => self.ads.account_metrics(&args.customer_id, &span).await?,
            None => None,
        };
        Ok(ToolOutcome::ok(
            json!({ "current": metrics, "comparison": comparison }),
            "Metrics retrieved successfully",
        ))
    }

    async fn get_conversion_actions(&self, args: CustomerArgs) -> Result<ToolOutcome> {
        let actions = self.ads.conversion_actions(&args.customer_id).await?;
        let message = format!("Found {} conversion actions", actions.len());
        Ok(ToolOutcome::ok(actions, message))
    }

    async fn get_disapproved_ads(&self, args: CustomerArgs) -> Result<ToolOutcome> {
        let ads = self.ads.disapproved_ads(&args.customer_id).await?;
        let message = format!("Found {} disapproved ads", ads.len());
        Ok(ToolOutcome::ok(ads, message))
    }

    async fn generate_report(&self, args: ReportArgs) -> Result<ToolOutcome> {
        let recipients: Vec<String> = args
            .recipients
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if recipients.is_empty() {
            return Ok(ToolOutcome::failure("No email recipients specified"));
        }
        let invalid: Vec<&str> = recipients
            .iter()
            .map(String::as_str)
            .filter(|r| !is_valid_recipient(r))
            .collect();
        if !invalid.is_empty() {
            return Ok(ToolOutcome::failure(format!(
                "Invalid recipient address{}: {}",
                if invalid.len() == 1 { "" } else { "es" },
                invalid.join(", ")
            )));
        }

        let current = DateSpan::from_args(
            DEFAULT_METRICS_RANGE,
            args.date_from.as_deref(),
            args.date_to.as_deref(),
        )?;
        let comparison = DateSpan::during(REPORT_COMPARISON_RANGE);
        let mut report = mcc_report_data(self.ads.as_ref(), &current, &comparison).await?;

        if !args.account_ids.is_empty() {
            let wanted: Vec<String> = args
                .account_ids
                .iter()
                .filter_map(|id| normalize_customer_id(id).ok())
                .collect();
            report.retain(|account| wanted.contains(&account.id));
        }
        if report.is_empty() {
            return Ok(ToolOutcome::failure("No data found for the specified accounts"));
        }

        let today = Utc::now().date_naive();
        let subject = args.template_type.subject(today);
        let html = render_report_html(&report, today);
        for recipient in &recipients {
            self.mailer
                .send(&OutgoingEmail {
                    to: recipient.clone(),
                    subject: subject.clone(),
                    html: html.clone(),
                })
                .await?;
        }
        info!(accounts = report.len(), recipients = recipients.len(), "Report sent.");

        let message = format!(
            "Report sent successfully to {} recipient{}",
            recipients.len(),
            plural(recipients.len())
        );
        Ok(ToolOutcome::ok(
            json!({ "accountCount": report.len(), "recipients": recipients }),
            message,
        ))
    }

    async fn search_keywords(&self, args: KeywordSearchArgs) -> Result<ToolOutcome> {
        let request = KeywordIdeaRequest {
            seed_keywords: args
                .seed_keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            landing_page_url: args.landing_page_url,
            location: self.research.location.clone(),
            language: self.research.language.clone(),
        };
        let ideas: Vec<KeywordIdea> = match self.ads.keyword_ideas(&request).await {
            Ok(ideas) => ideas,
            Err(e) => {
                return Ok(ToolOutcome::failure(format!("Keyword research failed: {:#}", e)));
            }
        };

        let analysis = match &self.keyword_analyzer {
            Some(analyzer) => analyzer.analyze(&ideas).await,
            None => Default::default(),
        };
        let message = format!(
            "Found {} keyword ideas organized into {} themed groups",
            ideas.len(),
            analysis.groups.len()
        );
        let top: Vec<&KeywordIdea> = ideas.iter().take(self.research.chat_limit).collect();
        Ok(ToolOutcome::ok(
            json!({ "keywords": top, "groups": analysis.groups, "insights": analysis.insights }),
            message,
        ))
    }

    async fn get_campaign_performance(&self, args: PerformanceArgs) -> Result<ToolOutcome> {
        let span = DateSpan::during(args.date_range.as_deref().unwrap_or(DEFAULT_PERFORMANCE_RANGE));
        let campaigns: Vec<CampaignPerformance> =
            self.ads.campaign_performance(&args.customer_id, &span).await?;
        let message = format!("Retrieved performance data for {} campaigns", campaigns.len());
        Ok(ToolOutcome::ok(campaigns, message))
    }

    async fn get_keyword_performance(&self, args: PerformanceArgs) -> Result<ToolOutcome> {
        let span = DateSpan::during(args.date_range.as_deref().unwrap_or(DEFAULT_PERFORMANCE_RANGE));
        let limit = args.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_KEYWORD_LIMIT);
        let keywords: Vec<KeywordPerformance> = self
            .ads
            .keyword_performance(&args.customer_id, &span, limit)
            .await?;
        let message = format!("Retrieved performance data for {} keywords", keywords.len());
        Ok(ToolOutcome::ok(keywords, message))
    }

    async fn get_upcoming_meetings(&self, args: MeetingArgs) -> Result<ToolOutcome> {
        let (time_min, time_max, range_description) = match (&args.start_date, &args.end_date) {
            (Some(start), Some(end)) => {
                let start = start_of_day(parse_date(start)?);
                let Some(end) = start_of_day(parse_date(end)?).checked_add_signed(Duration::days(1)) else {
                    return Ok(ToolOutcome::failure("endDate is out of range"));
                };
                (start, end, "in the specified date range".to_string())
            }
            _ => {
                let days = args.days.filter(|d| *d > 0).unwrap_or(DEFAULT_MEETING_DAYS);
                if days > MAX_MEETING_DAYS {
                    return Ok(ToolOutcome::failure(format!(
                        "days must be between 1 and {}",
                        MAX_MEETING_DAYS
                    )));
                }
                let now = Utc::now();
                (
                    now,
                    now + Duration::days(days),
                    format!("in the next {} day{}", days, plural(days as usize)),
                )
            }
        };
        if time_max <= time_min {
            return Ok(ToolOutcome::failure("endDate must not be before startDate"));
        }

        let meetings: Vec<Meeting> = match self.calendar.meetings(time_min, time_max).await {
            Ok(meetings) => meetings,
            Err(e) => return Ok(ToolOutcome::failure(format!("Error fetching meetings: {:#}", e))),
        };
        let upcoming = if args.start_date.is_some() && args.end_date.is_some() {
            ""
        } else {
            "upcoming "
        };
        let message = format!(
            "Found {} {}meeting{} {}",
            meetings.len(),
            upcoming,
            plural(meetings.len()),
            range_description
        );
        Ok(ToolOutcome::ok(meetings, message))
    }

    async fn fetch_website_content(&self, args: UrlArgs) -> Result<ToolOutcome> {
        match self.web.fetch(&args.url).await {
            Ok(content) => {
                let message = format!("Fetched content from {}", content.url);
                Ok(ToolOutcome::ok(content, message))
            }
            Err(e) => Ok(ToolOutcome::failure(format!("{:#}", e))),
        }
    }
}

#[async_trait]
impl ToolProvider for AdsToolProvider {
    fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        registry::chat_functions()
    }

    async fn execute_tool(&self, tool_name: &str, input: ToolInput) -> Result<ToolOutcome> {
        let definition =
            registry::find(tool_name).ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;
        registry::validate_input(definition, &input.arguments)?;

        let mut arguments = input.arguments;
        arguments.retain(|_, value| !value.is_null());
        let args = Value::Object(arguments);
        debug!(tool_name = %tool_name, args = %args, "Executing tool.");

        match tool_name {
            GET_ACCOUNTS => self.get_accounts().await,
            GET_ACCOUNT_METRICS => self.get_account_metrics(parse_args(tool_name, args)?).await,
            GET_CONVERSION_ACTIONS => self.get_conversion_actions(parse_args(tool_name, args)?).await,
            GET_DISAPPROVED_ADS => self.get_disapproved_ads(parse_args(tool_name, args)?).await,
            GENERATE_REPORT => self.generate_report(parse_args(tool_name, args)?).await,
            SEARCH_KEYWORDS => self.search_keywords(parse_args(tool_name, args)?).await,
            GET_CAMPAIGN_PERFORMANCE => self.get_campaign_performance(parse_args(tool_name, args)?).await,
            GET_KEYWORD_PERFORMANCE => self.get_keyword_performance(parse_args(tool_name, args)?).await,
            GET_UPCOMING_MEETINGS => self.get_upcoming_meetings(parse_args(tool_name, args)?).await,
            FETCH_WEBSITE_CONTENT => self.fetch_website_content(parse_args(tool_name, args)?).await,
            _ => {
                warn!(tool_name = %tool_name, "Registered tool has no handler.");
                Err(ToolError::UnknownTool(tool_name.to_string()).into())
            }
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool_name: &str, args: Value) -> Result<T> {
    serde_json::from_value(args).with_context(|| format!("Invalid arguments for tool '{}'", tool_name))
}

fn unconfigured(service: &str, error: &anyhow::Error) -> Arc<Unconfigured> {
    warn!(service, error = %format!("{:#}", error), "Collaborator not configured, its tools will report errors.");
    Arc::new(Unconfigured::new(service, error))
}

fn start_of_day(date: chrono::NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Stand-in for a collaborator whose credentials are not configured.
/// Every call fails with the configuration error, so the rest of the
/// assistant keeps working.
pub struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    pub fn new(service: &str, error: &anyhow::Error) -> Self {
        Self {
            reason: format!("{} is not configured: {:#}", service, error),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(anyhow!("{}", self.reason))
    }
}

#[async_trait]
impl AdsApi for Unconfigured {
    async fn customer_accounts(&self) -> Result<Vec<Account>> {
        self.fail()
    }
    async fn account_metrics(&self, _: &str, _: &DateSpan) -> Result<Option<AccountMetrics>> {
        self.fail()
    }
    async fn conversion_actions(&self, _: &str) -> Result<Vec<ConversionActionStatus>> {
        self.fail()
    }
    async fn disapproved_ads(&self, _: &str) -> Result<Vec<DisapprovedAd>> {
        self.fail()
    }
    async fn campaign_performance(&self, _: &str, _: &DateSpan) -> Result<Vec<CampaignPerformance>> {
        self.fail()
    }
    async fn keyword_performance(&self, _: &str, _: &DateSpan, _: u32) -> Result<Vec<KeywordPerformance>> {
        self.fail()
    }
    async fn keyword_ideas(&self, _: &KeywordIdeaRequest) -> Result<Vec<KeywordIdea>> {
        self.fail()
    }
}

#[async_trait]
impl CalendarApi for Unconfigured {
    async fn meetings(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<Vec<Meeting>> {
        self.fail()
    }
}

#[async_trait]
impl Mailer for Unconfigured {
    async fn send(&self, _: &OutgoingEmail) -> Result<()> {
        self.fail()
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
