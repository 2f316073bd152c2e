// beech-core/src/tools/keywords.rs

//! Groups keyword ideas into themes with a single model call.

use super::google_ads::KeywordIdea;
use crate::models::chat::ChatMessage;
use crate::providers::Provider;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeywordGroup {
    pub theme: String,
    pub keywords: Vec<KeywordIdea>,
    pub total_search_volume: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct KeywordAnalysis {
    pub groups: Vec<KeywordGroup>,
    /// Keyword to search intent (Informational, Navigational, Commercial, Transactional).
    pub intents: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,
}

/// The JSON object the model is asked to answer with.
#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    groups: Vec<RawGroup>,
    #[serde(default)]
    intents: HashMap<String, String>,
    insights: Option<String>,
}

#[derive(Deserialize)]
struct RawGroup {
    theme: String,
    #[serde(default)]
    keywords: Vec<String>,
}

pub struct KeywordAnalyzer {
    provider: Arc<dyn Provider>,
    analysis_limit: usize,
}

impl KeywordAnalyzer {
    pub fn new(provider: Arc<dyn Provider>, analysis_limit: usize) -> Self {
        Self {
            provider,
            analysis_limit,
        }
    }

    /// Never fails: a model or parse error yields an empty analysis.
    pub async fn analyze(&self, ideas: &[KeywordIdea]) -> KeywordAnalysis {
        if ideas.is_empty() {
            return KeywordAnalysis::default();
        }
        match self.try_analyze(ideas).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Keyword analysis failed, returning ideas without groups.");
                KeywordAnalysis::default()
            }
        }
    }

    async fn try_analyze(&self, ideas: &[KeywordIdea]) -> Result<KeywordAnalysis> {
        let top = &ideas[..ideas.len().min(self.analysis_limit)];
        let prompt = analysis_prompt(top);
        debug!(keywords = top.len(), "Requesting keyword grouping.");

        let response = self
            .provider
            .get_completion(vec![ChatMessage::user(prompt)], None)
            .await?;
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No text content in keyword analysis response"))?;
        parse_analysis(&text, ideas)
    }
}

fn analysis_prompt(ideas: &[KeywordIdea]) -> String {
    let keyword_list: Vec<&str> = ideas.iter().map(|k| k.keyword.as_str()).collect();
    format!(
        "Analyze these keywords for a Google Ads campaign.\n\n\
         Keywords:\n{}\n\n\
         1. Group them into 5-10 thematic categories.\n\
         2. Classify the search intent of each keyword as Informational, Navigational, Commercial or Transactional.\n\
         3. Give strategic advice on organizing them into ad groups.\n\n\
         Respond ONLY with a JSON object of this shape:\n\
         {{\"groups\": [{{\"theme\": \"Theme name\", \"keywords\": [\"keyword1\"]}}], \
         \"intents\": {{\"keyword1\": \"Transactional\"}}, \
         \"insights\": \"Overall recommendations\"}}",
        keyword_list.join("\n")
    )
}

fn parse_analysis(text: &str, ideas: &[KeywordIdea]) -> Result<KeywordAnalysis> {
    let raw: RawAnalysis =
        serde_json::from_str(strip_code_fence(text)).context("Keyword analysis was not valid JSON")?;

    let by_keyword: HashMap<&str, &KeywordIdea> = ideas.iter().map(|k| (k.keyword.as_str(), k)).collect();
    let groups = raw
        .groups
        .into_iter()
        .filter_map(|group| {
            let keywords: Vec<KeywordIdea> = group
                .keywords
                .iter()
                .filter_map(|k| by_keyword.get(k.as_str()).map(|idea| (*idea).clone()))
                .collect();
            if keywords.is_empty() {
                return None;
            }
            let total_search_volume = keywords.iter().map(|k| k.avg_monthly_searches).sum();
            Some(KeywordGroup {
                theme: group.theme,
                keywords,
                total_search_volume,
            })
        })
        .collect();

    Ok(KeywordAnalysis {
        groups,
        intents: raw.intents,
        insights: raw.insights.filter(|i| !i.trim().is_empty()),
    })
}

/// Models sometimes wrap JSON in a markdown fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ApiResponse, Choice};
    use crate::models::tools::ToolDefinition;
    use async_trait::async_trait;

    struct CannedProvider(Result<String, String>);

    #[async_trait]
    impl Provider for CannedProvider {
        async fn get_completion(
            &self,
            messages: Vec<ChatMessage>,
            tools: Option<&[ToolDefinition]>,
        ) -> Result<ApiResponse> {
            assert!(tools.is_none());
            assert!(messages[0].content.as_deref().unwrap_or("").contains("plumber near me"));
            match &self.0 {
                Ok(text) => Ok(ApiResponse {
                    id: "r".to_string(),
                    choices: vec![Choice {
                        index: 0,
                        message: ChatMessage::assistant(text.clone()),
                        finish_reason: "end_turn".to_string(),
                    }],
                }),
                Err(e) => Err(anyhow!(e.clone())),
            }
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn idea(keyword: &str, volume: u64) -> KeywordIdea {
        KeywordIdea {
            keyword: keyword.to_string(),
            avg_monthly_searches: volume,
            competition: "HIGH".to_string(),
            competition_index: 80,
            low_top_of_page_bid: 1.0,
            high_top_of_page_bid: 5.0,
        }
    }

    fn ideas() -> Vec<KeywordIdea> {
        vec![idea("plumber near me", 4400), idea("emergency plumber", 1900), idea("drain cleaning", 700)]
    }

    #[tokio::test]
    async fn test_analyze_groups_known_keywords() {
        let reply = r#"```json
{"groups": [
   {"theme": "Local", "keywords": ["plumber near me", "emergency plumber", "invented keyword"]},
   {"theme": "Empty", "keywords": ["nothing real"]}
 ],
 "intents": {"plumber near me": "Transactional"},
 "insights": "Split local and emergency intent."}
```"#;
        let analyzer = KeywordAnalyzer::new(Arc::new(CannedProvider(Ok(reply.to_string()))), 100);
        let analysis = analyzer.analyze(&ideas()).await;

        assert_eq!(analysis.groups.len(), 1);
        assert_eq!(analysis.groups[0].theme, "Local");
        assert_eq!(analysis.groups[0].keywords.len(), 2);
        assert_eq!(analysis.groups[0].total_search_volume, 6300);
        assert_eq!(analysis.intents["plumber near me"], "Transactional");
        assert_eq!(analysis.insights.as_deref(), Some("Split local and emergency intent."));
    }

    #[tokio::test]
    async fn test_analyze_falls_back_on_bad_json() {
        let analyzer =
            KeywordAnalyzer::new(Arc::new(CannedProvider(Ok("Here are your groups!".to_string()))), 100);
        assert_eq!(analyzer.analyze(&ideas()).await, KeywordAnalysis::default());
    }

    #[tokio::test]
    async fn test_analyze_falls_back_on_provider_error() {
        let analyzer = KeywordAnalyzer::new(Arc::new(CannedProvider(Err("overloaded".to_string()))), 100);
        assert!(analyzer.analyze(&ideas()).await.groups.is_empty());
    }
}
