// Client for the Gemini generateContent REST API
//
// Facet suggestions go through the SuggestionProvider trait; the posting
// helpers (category, price, description) are called directly by handlers.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde_json::{json, Value};

use super::{provider::SuggestionProvider, sanitize};
use crate::catalog::CatalogIndex;
use crate::config::Settings;
use crate::error::SuggestionError;

#[derive(Clone)]
pub struct GeminiClient {
    http_client: Arc<Client>,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http_client: Arc<Client>, settings: &Settings) -> Self {
        let api_key = settings.gemini_api_key.clone().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!("No Gemini API key configured. AI features will not work.");
        }
        Self {
            http_client,
            api_key,
            model: settings.gemini_model.clone(),
            base_url: settings.gemini_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    // Sends one prompt and returns the text of the first candidate
    async fn generate(&self, prompt: &str, json_reply: bool) -> Result<String, SuggestionError> {
        let api_key = self.api_key.as_deref().ok_or(SuggestionError::Disabled)?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);

        let mut payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        if json_reply {
            payload["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }

        tracing::debug!(model = %self.model, json_reply, "Sending generateContent request");
        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        let text = body
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| SuggestionError::Malformed("reply has no candidate text".to_string()))?;
        Ok(text.trim().to_string())
    }

    /// Picks the best subcategory id for an ad title. Replies that are not
    /// an existing subcategory id yield `None`.
    pub async fn suggest_category(
        &self,
        title: &str,
        catalog: &CatalogIndex,
    ) -> Result<Option<String>, SuggestionError> {
        if title.trim().is_empty() {
            return Ok(None);
        }
        let category_list = catalog
            .categories()
            .iter()
            .flat_map(|c| c.subcategories.iter())
            .map(|s| format!("{} ({})", s.id, s.name))
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = format!(
            "Based on the ad title \"{title}\", which of the following categories is the best fit? \
             Please return ONLY the category ID from this list: [{category_list}]. For example, if the \
             best category is 'for-sale-electronics (Electronics)', you should return just 'for-sale-electronics'."
        );

        let suggested = self.generate(&prompt, false).await?;
        if catalog.subcategory(&suggested).is_some() {
            Ok(Some(suggested))
        } else {
            tracing::warn!(reply = %suggested, "Gemini returned an invalid category id");
            Ok(None)
        }
    }

    pub async fn suggest_price(&self, title: &str, description: &str) -> Result<String, SuggestionError> {
        let prompt = format!(
            "Based on the ad title \"{title}\" and description \"{description}\", suggest a realistic price \
             for this item or service. The ad is for an African market, so use appropriate currency symbols \
             if possible (e.g., ₦ for Nigeria, Ksh for Kenya, R for South Africa, GH₵ for Ghana).\n\
             - For items, provide a clear price or a narrow price range (e.g., '₦150,000' or 'R 7,000 - R 7,500').\n\
             - For jobs, suggest a term like 'Competitive Salary'.\n\
             - For services where price varies, suggest 'Request a Quote'.\n\
             Return only the suggested price string, with no extra explanation."
        );
        self.generate(&prompt, false).await
    }

    pub async fn generate_description(&self, title: &str, keywords: &str) -> Result<String, SuggestionError> {
        let prompt = format!(
            "Generate a compelling and professional classified ad description for a \"{title}\" with the \
             following key features or keywords: \"{keywords}\". The description should be friendly, \
             persuasive, and highlight the key features to attract potential buyers. Keep it under 100 words \
             and format it as a single paragraph. Do not use markdown or special formatting."
        );
        self.generate(&prompt, false).await
    }

    async fn fetch_facets(&self, search_term: &str, category_name: &str) -> Result<Vec<String>, SuggestionError> {
        let subject = match (search_term.is_empty(), category_name.is_empty()) {
            (false, false) => format!("\"{search_term}\" in the \"{category_name}\" category"),
            (false, true) => format!("\"{search_term}\""),
            _ => format!("the \"{category_name}\" category"),
        };
        let prompt = format!(
            "A shopper on an African classifieds marketplace is searching for {subject}. Suggest up to 5 short \
             filter phrases (1 to 3 words each) that sellers commonly put in ad titles or descriptions and that \
             would help narrow the results, such as condition, brand or price band. Return ONLY a JSON array of strings."
        );
        let text = self.generate(&prompt, true).await?;
        parse_facets(&text)
    }
}

// The model sometimes wraps JSON in a markdown fence despite the mime type
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

fn parse_facets(text: &str) -> Result<Vec<String>, SuggestionError> {
    let raw: Vec<String> = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| SuggestionError::Malformed(format!("expected a JSON array of strings: {e}")))?;
    Ok(sanitize(raw))
}

impl SuggestionProvider for GeminiClient {
    fn suggest_facets<'a>(
        &'a self,
        search_term: &'a str,
        category_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, SuggestionError>> {
        self.fetch_facets(search_term, category_name).boxed()
    }
}
