use super::*;
use crate::config::WebConfig;
use crate::tools::keywords::KeywordAnalysis;
use std::sync::Mutex;

// --- Mock collaborators ---

#[derive(Default)]
struct MockAds {
    calls: Mutex<Vec<String>>,
    accounts: Vec<Account>,
    metrics: Option<AccountMetrics>,
    ideas: Vec<KeywordIdea>,
}

impl MockAds {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdsApi for MockAds {
    async fn customer_accounts(&self) -> Result<Vec<Account>> {
        self.record("customer_accounts".to_string());
        Ok(self.accounts.clone())
    }
    async fn account_metrics(&self, customer_id: &str, span: &DateSpan) -> Result<Option<AccountMetrics>> {
        self.record(format!("account_metrics:{}:{}", customer_id, span.condition()));
        Ok(self.metrics.clone())
    }
    async fn conversion_actions(&self, customer_id: &str) -> Result<Vec<ConversionActionStatus>> {
        self.record(format!("conversion_actions:{}", customer_id));
        Ok(vec![])
    }
    async fn disapproved_ads(&self, customer_id: &str) -> Result<Vec<DisapprovedAd>> {
        self.record(format!("disapproved_ads:{}", customer_id));
        Err(anyhow!("PERMISSION_DENIED"))
    }
    async fn campaign_performance(&self, customer_id: &str, span: &DateSpan) -> Result<Vec<CampaignPerformance>> {
        self.record(format!("campaign_performance:{}:{}", customer_id, span.condition()));
        Ok(vec![])
    }
    async fn keyword_performance(
        &self,
        customer_id: &str,
        span: &DateSpan,
        limit: u32,
    ) -> Result<Vec<KeywordPerformance>> {
        self.record(format!("keyword_performance:{}:{}:{}", customer_id, span.condition(), limit));
        Ok(vec![])
    }
    async fn keyword_ideas(&self, request: &KeywordIdeaRequest) -> Result<Vec<KeywordIdea>> {
        self.record(format!(
            "keyword_ideas:{}:{}:{}",
            request.seed_keywords.join(","),
            request.location,
            request.language
        ));
        Ok(self.ideas.clone())
    }
}

#[derive(Default)]
struct MockCalendar {
    windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn meetings(&self, time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Result<Vec<Meeting>> {
        self.windows.lock().unwrap().push((time_min, time_max));
        Ok(vec![Meeting {
            id: "m1".to_string(),
            title: "Weekly sync".to_string(),
            start_time: time_min,
            end_time: time_min + Duration::hours(1),
            location: None,
            organizer: "a@example.com".to_string(),
            attendees: vec![],
            description: None,
        }])
    }
}

#[derive(Default)]
struct MockMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

struct Harness {
    ads: Arc<MockAds>,
    calendar: Arc<MockCalendar>,
    mailer: Arc<MockMailer>,
    provider: AdsToolProvider,
}

fn harness(ads: MockAds) -> Harness {
    let ads = Arc::new(ads);
    let calendar = Arc::new(MockCalendar::default());
    let mailer = Arc::new(MockMailer::default());
    let provider = AdsToolProvider::new(
        ads.clone(),
        calendar.clone(),
        mailer.clone(),
        WebFetcher::new(&WebConfig::default()).unwrap(),
        KeywordResearchConfig::default(),
    );
    Harness {
        ads,
        calendar,
        mailer,
        provider,
    }
}

fn input(value: Value) -> ToolInput {
    ToolInput {
        arguments: value.as_object().cloned().unwrap(),
    }
}

fn account(id: &str, name: &str) -> Account {
    Account {
        id: id.to_string(),
        name: name.to_string(),
        status: "ENABLED".to_string(),
        currency: "AUD".to_string(),
    }
}

fn metrics() -> AccountMetrics {
    AccountMetrics {
        cost: 12.5,
        conversions: 2.0,
        clicks: 10.0,
        impressions: 400.0,
        avg_cpc: 1.25,
        cost_per_conv: 6.25,
    }
}

fn idea(keyword: &str, volume: u64) -> KeywordIdea {
    KeywordIdea {
        keyword: keyword.to_string(),
        avg_monthly_searches: volume,
        competition: "LOW".to_string(),
        competition_index: 10,
        low_top_of_page_bid: 0.5,
        high_top_of_page_bid: 2.0,
    }
}

// --- Tests ---

#[tokio::test]
async fn test_unknown_tool_is_an_error_not_a_panic() {
    let h = harness(MockAds::default());
    let err = h
        .provider
        .execute_tool("delete_all_campaigns", input(json!({})))
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ToolError>(),
        Some(&ToolError::UnknownTool("delete_all_campaigns".to_string()))
    );
    assert_eq!(err.to_string(), "Unknown function: delete_all_campaigns");
    assert!(h.ads.calls().is_empty());
}

#[tokio::test]
async fn test_missing_required_arguments_make_no_external_calls() {
    let h = harness(MockAds::default());
    for def in h.provider.get_tool_definitions() {
        if def.parameters.required.is_empty() {
            continue;
        }
        let err = h.provider.execute_tool(&def.name, input(json!({}))).await.unwrap_err();
        assert!(
            matches!(err.downcast_ref::<ToolError>(), Some(ToolError::MissingArgument { .. })),
            "{}: {}",
            def.name,
            err
        );
    }
    assert!(h.ads.calls().is_empty());
    assert!(h.calendar.windows.lock().unwrap().is_empty());
    assert!(h.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_enum_is_rejected_before_dispatch() {
    let h = harness(MockAds::default());
    let err = h
        .provider
        .execute_tool(
            GET_CAMPAIGN_PERFORMANCE,
            input(json!({"customerId": "123", "dateRange": "LAST_YEAR"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<ToolError>(), Some(ToolError::InvalidEnum { .. })));
    assert!(h.ads.calls().is_empty());
}

#[tokio::test]
async fn test_get_accounts() {
    let h = harness(MockAds {
        accounts: vec![account("1", "Acme"), account("2", "Beta")],
        ..Default::default()
    });
    let outcome = h.provider.execute_tool(GET_ACCOUNTS, input(json!({}))).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.message, "Found 2 active accounts");
    assert_eq!(outcome.data.unwrap()[1]["name"], "Beta");
}

#[tokio::test]
async fn test_account_metrics_without_data_is_a_failed_outcome() {
    let h = harness(MockAds::default());
    let outcome = h
        .provider
        .execute_tool(GET_ACCOUNT_METRICS, input(json!({"customerId": "123"})))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.message, "No data found for account 123");
    assert_eq!(
        h.ads.calls(),
        vec!["account_metrics:123:segments.date DURING YESTERDAY".to_string()]
    );
}

#[tokio::test]
async fn test_account_metrics_with_comparison() {
    let h = harness(MockAds {
        metrics: Some(metrics()),
        ..Default::default()
    });
    let outcome = h
        .provider
        .execute_tool(
            GET_ACCOUNT_METRICS,
            input(json!({
                "customerId": "123",
                "dateFrom": "2025-02-01",
                "dateTo": "2025-02-28",
                "comparisonDateFrom": "2025-01-01",
                "comparisonDateTo": "2025-01-31",
                "note": null
            })),
        )
        .await
        .unwrap();
    assert!(outcome.success);
    let data = outcome.data.unwrap();
    assert_eq!(data["current"]["avgCpc"], 1.25);
    assert_eq!(data["comparison"]["costPerConv"], 6.25);
    assert_eq!(
        h.ads.calls(),
        vec![
            "account_metrics:123:segments.date BETWEEN '2025-02-01' AND '2025-02-28'".to_string(),
            "account_metrics:123:segments.date BETWEEN '2025-01-01' AND '2025-01-31'".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_malformed_date_is_an_error() {
    let h = harness(MockAds::default());
    let err = h
        .provider
        .execute_tool(
            GET_ACCOUNT_METRICS,
            input(json!({"customerId": "123", "dateFrom": "yesterday", "dateTo": "today"})),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("YYYY-MM-DD"), "{}", err);
    assert!(h.ads.calls().is_empty());
}

#[tokio::test]
async fn test_collaborator_error_propagates() {
    let h = harness(MockAds::default());
    let err = h
        .provider
        .execute_tool(GET_DISAPPROVED_ADS, input(json!({"customerId": "123"})))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("PERMISSION_DENIED"));
}

#[tokio::test]
async fn test_generate_report_without_recipients() {
    let h = harness(MockAds::default());
    let outcome = h
        .provider
        .execute_tool(GENERATE_REPORT, input(json!({"recipients": []})))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.message, "No email recipients specified");
    assert!(h.ads.calls().is_empty());
    assert!(h.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_generate_report_filters_accounts_and_emails_each_recipient() {
    let h = harness(MockAds {
        accounts: vec![account("1112223333", "Acme"), account("4445556666", "Beta")],
        metrics: Some(metrics()),
        ..Default::default()
    });
    let outcome = h
        .provider
        .execute_tool(
            GENERATE_REPORT,
            input(json!({
                "accountIds": ["111-222-3333"],
                "templateType": "best_ads",
                "recipients": ["a@example.com", "b@example.com"]
            })),
        )
        .await
        .unwrap();

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, "Report sent successfully to 2 recipients");
    assert_eq!(outcome.data.unwrap()["accountCount"], 1);

    let sent = h.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].to, "b@example.com");
    assert!(sent[0].subject.starts_with("Google Ads Performance Report - "));
    assert!(sent[0].html.contains("Acme"));
    assert!(!sent[0].html.contains("Beta"));
    assert!(h
        .ads
        .calls()
        .contains(&"account_metrics:4445556666:segments.date DURING LAST_7_DAYS".to_string()));
}

#[tokio::test]
async fn test_generate_report_rejects_invalid_recipients_before_sending() {
    let h = harness(MockAds {
        accounts: vec![account("1112223333", "Acme")],
        metrics: Some(metrics()),
        ..Default::default()
    });
    let outcome = h
        .provider
        .execute_tool(
            GENERATE_REPORT,
            input(json!({"recipients": ["a@example.com", "not an address"]})),
        )
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.message, "Invalid recipient address: not an address");
    assert!(h.mailer.sent.lock().unwrap().is_empty());
    assert!(h.ads.calls().is_empty());
}

#[tokio::test]
async fn test_search_keywords_limits_chat_results() {
    let ideas: Vec<KeywordIdea> = (0..30).map(|i| idea(&format!("kw {}", i), 1000 - i)).collect();
    let h = harness(MockAds {
        ideas,
        ..Default::default()
    });
    let outcome = h
        .provider
        .execute_tool(SEARCH_KEYWORDS, input(json!({"seedKeywords": ["plumber", " "]})))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.message, "Found 30 keyword ideas organized into 0 themed groups");
    let data = outcome.data.unwrap();
    assert_eq!(data["keywords"].as_array().unwrap().len(), 20);
    assert_eq!(data["groups"], json!(KeywordAnalysis::default().groups));
    assert_eq!(h.ads.calls(), vec!["keyword_ideas:plumber:2036:1000".to_string()]);
}

#[tokio::test]
async fn test_performance_defaults() {
    let h = harness(MockAds::default());
    h.provider
        .execute_tool(GET_KEYWORD_PERFORMANCE, input(json!({"customerId": "9"})))
        .await
        .unwrap();
    h.provider
        .execute_tool(
            GET_CAMPAIGN_PERFORMANCE,
            input(json!({"customerId": "9", "dateRange": "THIS_MONTH"})),
        )
        .await
        .unwrap();
    assert_eq!(
        h.ads.calls(),
        vec![
            "keyword_performance:9:segments.date DURING LAST_7_DAYS:50".to_string(),
            "campaign_performance:9:segments.date DURING THIS_MONTH".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_upcoming_meetings_date_range() {
    let h = harness(MockAds::default());
    let outcome = h
        .provider
        .execute_tool(
            GET_UPCOMING_MEETINGS,
            input(json!({"startDate": "2025-03-03", "endDate": "2025-03-04"})),
        )
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.message, "Found 1 meeting in the specified date range");
    let windows = h.calendar.windows.lock().unwrap();
    assert_eq!(windows[0].1 - windows[0].0, Duration::days(2));
}

#[tokio::test]
async fn test_upcoming_meetings_default_days() {
    let h = harness(MockAds::default());
    let outcome = h
        .provider
        .execute_tool(GET_UPCOMING_MEETINGS, input(json!({})))
        .await
        .unwrap();
    assert_eq!(outcome.message, "Found 1 upcoming meeting in the next 7 days");
    let windows = h.calendar.windows.lock().unwrap();
    assert_eq!(windows[0].1 - windows[0].0, Duration::days(7));
}

#[tokio::test]
async fn test_upcoming_meetings_rejects_oversized_window() {
    let h = harness(MockAds::default());
    let outcome = h
        .provider
        .execute_tool(GET_UPCOMING_MEETINGS, input(json!({"days": 100_000_000})))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.message, "days must be between 1 and 366");
    assert!(h.calendar.windows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unconfigured_collaborator_reports_reason() {
    let unconfigured = Arc::new(Unconfigured::new(
        "Google Ads",
        &anyhow!("Environment variable GOOGLE_ADS_DEVELOPER_TOKEN is not set"),
    ));
    let provider = AdsToolProvider::new(
        unconfigured.clone(),
        unconfigured.clone(),
        unconfigured,
        WebFetcher::new(&WebConfig::default()).unwrap(),
        KeywordResearchConfig::default(),
    );
    let err = provider
        .execute_tool(GET_ACCOUNTS, input(json!({})))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Google Ads is not configured"), "{}", err);
}
