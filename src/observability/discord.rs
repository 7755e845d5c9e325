use anyhow::{Result, anyhow};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

const CONTENT_LIMIT: usize = 2000;
const TRUNCATED_SUFFIX: &str = "\n… (truncated)";

pub(crate) async fn send_discord_webhook(webhook_url: Url, content: String) -> Result<()> {
    let client = Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|_| anyhow!("discord webhook client could not be built"))?;

    let response = client
        .post(webhook_url)
        .json(&json!({ "content": truncate_for_discord(content) }))
        .send()
        .await
        .map_err(sanitize_reqwest_error)?;

    if response.status().is_success() {
        return Ok(());
    }

    Err(anyhow!(
        "discord webhook returned non-success status: {}",
        response.status()
    ))
}

// Webhook URLs carry their secret in the path; never let reqwest print them.
fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("discord webhook request timed out");
    }
    if error.is_connect() {
        return anyhow!("discord webhook connection failed");
    }
    anyhow!("discord webhook request failed")
}

fn truncate_for_discord(content: String) -> String {
    if content.chars().count() <= CONTENT_LIMIT {
        return content;
    }

    let allowed = CONTENT_LIMIT.saturating_sub(TRUNCATED_SUFFIX.chars().count());
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(TRUNCATED_SUFFIX);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_untouched() {
        assert_eq!(truncate_for_discord("hello".to_string()), "hello");
    }

    #[test]
    fn long_content_is_cut_to_the_discord_limit() {
        let content = "x".repeat(CONTENT_LIMIT + 50);

        let truncated = truncate_for_discord(content);

        assert_eq!(truncated.chars().count(), CONTENT_LIMIT);
        assert!(truncated.ends_with(TRUNCATED_SUFFIX));
    }
}
