// beech-core/src/tools/registry.rs

//! The static catalog of functions advertised to the model.

use crate::errors::ToolError;
use crate::models::tools::{
    ToolDefinition, ToolParameter, ToolParameterType, ToolParametersDefinition,
};
use lazy_static::lazy_static;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const GET_ACCOUNTS: &str = "get_accounts";
pub const GET_ACCOUNT_METRICS: &str = "get_account_metrics";
pub const GET_CONVERSION_ACTIONS: &str = "get_conversion_actions";
pub const GET_DISAPPROVED_ADS: &str = "get_disapproved_ads";
pub const GENERATE_REPORT: &str = "generate_report";
pub const SEARCH_KEYWORDS: &str = "search_keywords";
pub const GET_CAMPAIGN_PERFORMANCE: &str = "get_campaign_performance";
pub const GET_KEYWORD_PERFORMANCE: &str = "get_keyword_performance";
pub const GET_UPCOMING_MEETINGS: &str = "get_upcoming_meetings";
pub const FETCH_WEBSITE_CONTENT: &str = "fetch_website_content";

pub const DATE_RANGES: &[&str] = &[
    "TODAY",
    "YESTERDAY",
    "LAST_7_DAYS",
    "LAST_14_DAYS",
    "LAST_30_DAYS",
    "THIS_MONTH",
    "LAST_MONTH",
];

pub const REPORT_TEMPLATES: &[&str] = &["daily", "zero_conversion", "best_ads", "best_keywords"];

lazy_static! {
    static ref CHAT_FUNCTIONS: Vec<ToolDefinition> = build_chat_functions();
}

/// All callable functions, in catalog order.
pub fn chat_functions() -> Vec<ToolDefinition> {
    CHAT_FUNCTIONS.clone()
}

pub fn find(name: &str) -> Option<&'static ToolDefinition> {
    CHAT_FUNCTIONS.iter().find(|def| def.name == name)
}

/// Checks `arguments` against the definition's input schema.
///
/// Required keys must be present and non-null. Present values must match the
/// declared JSON type and enum; array items are checked against `items`.
/// Keys the schema does not declare are ignored.
pub fn validate_input(
    definition: &ToolDefinition,
    arguments: &Map<String, Value>,
) -> Result<(), ToolError> {
    let schema = &definition.parameters;
    for required in &schema.required {
        match arguments.get(required) {
            None | Some(Value::Null) => {
                return Err(ToolError::MissingArgument {
                    tool: definition.name.clone(),
                    argument: required.clone(),
                });
            }
            Some(_) => {}
        }
    }

    for (name, value) in arguments {
        if value.is_null() {
            continue;
        }
        let Some(parameter) = schema.parameter(name) else {
            continue;
        };
        check_value(&definition.name, name, parameter, value)?;
    }
    Ok(())
}

fn check_value(
    tool: &str,
    argument: &str,
    parameter: &ToolParameter,
    value: &Value,
) -> Result<(), ToolError> {
    if !parameter.param_type.accepts(value) {
        return Err(ToolError::InvalidType {
            tool: tool.to_string(),
            argument: argument.to_string(),
            expected: parameter.param_type.as_str(),
        });
    }
    if let (Some(allowed), Some(actual)) = (&parameter.enum_values, value.as_str()) {
        if !allowed.iter().any(|a| a == actual) {
            return Err(ToolError::InvalidEnum {
                tool: tool.to_string(),
                argument: argument.to_string(),
                value: actual.to_string(),
                allowed: allowed.join(", "),
            });
        }
    }
    if let (Some(items), Some(elements)) = (&parameter.items, value.as_array()) {
        for element in elements {
            check_value(tool, argument, items, element)?;
        }
    }
    Ok(())
}

// --- Schema builders ---

fn param(param_type: ToolParameterType, description: &str) -> ToolParameter {
    ToolParameter {
        param_type,
        description: description.to_string(),
        enum_values: None,
        items: None,
    }
}

fn string(description: &str) -> ToolParameter {
    param(ToolParameterType::String, description)
}

fn integer(description: &str) -> ToolParameter {
    param(ToolParameterType::Integer, description)
}

fn string_enum(values: &[&str], description: &str) -> ToolParameter {
    ToolParameter {
        enum_values: Some(values.iter().map(|v| v.to_string()).collect()),
        ..string(description)
    }
}

fn string_array(description: &str) -> ToolParameter {
    ToolParameter {
        items: Some(Box::new(param(ToolParameterType::String, ""))),
        ..param(ToolParameterType::Array, description)
    }
}

fn customer_id() -> ToolParameter {
    string("The Google Ads customer account ID (without dashes)")
}

fn tool(
    name: &str,
    description: &str,
    properties: Vec<(&str, ToolParameter)>,
    required: &[&str],
) -> ToolDefinition {
    let properties: BTreeMap<String, ToolParameter> = properties
        .into_iter()
        .map(|(key, parameter)| (key.to_string(), parameter))
        .collect();
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters: ToolParametersDefinition {
            required: required.iter().map(|r| r.to_string()).collect(),
            properties,
            ..ToolParametersDefinition::empty()
        },
    }
}

fn build_chat_functions() -> Vec<ToolDefinition> {
    vec![
        tool(
            GET_ACCOUNTS,
            "List the Google Ads client accounts under the MCC with their ID, name, status and currency.",
            vec![],
            &[],
        ),
        tool(
            GET_ACCOUNT_METRICS,
            "Get cost, conversions, clicks, impressions, average CPC and cost per conversion for one account. \
             Optionally compares against a second period.",
            vec![
                ("customerId", customer_id()),
                ("dateFrom", string("Start date, YYYY-MM-DD. Defaults to yesterday.")),
                ("dateTo", string("End date, YYYY-MM-DD. Defaults to yesterday.")),
                ("comparisonDateFrom", string("Comparison period start date, YYYY-MM-DD.")),
                ("comparisonDateTo", string("Comparison period end date, YYYY-MM-DD.")),
            ],
            &["customerId"],
        ),
        tool(
            GET_CONVERSION_ACTIONS,
            "List enabled conversion actions with their last conversion date and days since. \
             Use it to check whether conversion tracking works.",
            vec![("customerId", customer_id())],
            &["customerId"],
        ),
        tool(
            GET_DISAPPROVED_ADS,
            "List disapproved ads with their campaign, ad group and policy topics.",
            vec![("customerId", customer_id())],
            &["customerId"],
        ),
        tool(
            GENERATE_REPORT,
            "Build a performance report and email it to the given recipients.",
            vec![
                (
                    "accountIds",
                    string_array("Account IDs to include. An empty array means all accounts."),
                ),
                (
                    "templateType",
                    string_enum(
                        REPORT_TEMPLATES,
                        "daily (standard performance), zero_conversion (search terms without conversions), \
                         best_ads (top ads by CTR) or best_keywords (top keywords by conversions).",
                    ),
                ),
                ("recipients", string_array("Email addresses to send the report to.")),
                ("dateFrom", string("Report start date, YYYY-MM-DD. Defaults to yesterday.")),
                ("dateTo", string("Report end date, YYYY-MM-DD. Defaults to yesterday.")),
            ],
            &["recipients"],
        ),
        tool(
            SEARCH_KEYWORDS,
            "Find keyword ideas with Keyword Planner, with search volume, competition and thematic groups.",
            vec![
                ("seedKeywords", string_array("Seed keywords or phrases.")),
                ("landingPageUrl", string("Landing page URL to seed ideas from.")),
            ],
            &["seedKeywords"],
        ),
        tool(
            GET_CAMPAIGN_PERFORMANCE,
            "Per-campaign budget, spend, conversions and CTR for an account.",
            vec![
                ("customerId", customer_id()),
                ("dateRange", string_enum(DATE_RANGES, "Date range. Defaults to LAST_7_DAYS.")),
            ],
            &["customerId"],
        ),
        tool(
            GET_KEYWORD_PERFORMANCE,
            "Per-keyword quality score, CTR, cost and conversions for an account.",
            vec![
                ("customerId", customer_id()),
                ("dateRange", string_enum(DATE_RANGES, "Date range. Defaults to LAST_7_DAYS.")),
                ("limit", integer("Maximum number of keywords. Defaults to 50.")),
            ],
            &["customerId"],
        ),
        tool(
            GET_UPCOMING_MEETINGS,
            "List calendar meetings with time, location and attendees. \
             Give startDate and endDate for a specific range, otherwise the next `days` days are used.",
            vec![
                ("days", integer("Days ahead to look, at most 366. Defaults to 7.")),
                ("startDate", string("Range start, YYYY-MM-DD.")),
                ("endDate", string("Range end, YYYY-MM-DD.")),
            ],
            &[],
        ),
        tool(
            FETCH_WEBSITE_CONTENT,
            "Fetch a web page and return its title, meta description, headings, paragraphs, links and text.",
            vec![("url", string("The page URL. https:// is assumed when no scheme is given."))],
            &["url"],
        ),
    ]
}
