//! Typed client for the hosted backend's REST interface (PostgREST-style).
//! The core only needs generic fetch-by-filter and upsert over the resource
//! table; everything else about the backend stays opaque.

use anyhow::Result;
use reqwest::Client;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::resources::ResourceRecord;

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    resources_table: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            resources_table: config.resources_table.clone(),
        })
    }

    fn table_url(&self, filters: &str) -> String {
        format!(
            "{}/rest/v1/{}?select=*&{}",
            self.base_url, self.resources_table, filters
        )
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder
                .header("apikey", key.as_str())
                .header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }

    async fn fetch(&self, url: String) -> Result<Vec<ResourceRecord>> {
        let resp = self.with_auth(self.http.get(url)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("backend error ({}): {}", status, text);
        }
        Ok(resp.json().await?)
    }

    /// All of a user's resource records, unfiltered by step.
    pub async fn fetch_resources(&self, user_id: &str) -> Result<Vec<ResourceRecord>> {
        let url = self.table_url(&format!("user_id=eq.{}", urlencoding::encode(user_id)));
        self.fetch(url).await
    }

    /// A user's records for one step.
    pub async fn fetch_step_resources(
        &self,
        user_id: &str,
        step_id: u32,
    ) -> Result<Vec<ResourceRecord>> {
        let url = self.table_url(&format!(
            "user_id=eq.{}&step_id=eq.{}",
            urlencoding::encode(user_id),
            step_id
        ));
        self.fetch(url).await
    }

    /// A user's records for one step whose stored substep title is any of
    /// `titles` — the tolerant-lookup query built from `possible_titles`.
    pub async fn fetch_substep_resources(
        &self,
        user_id: &str,
        step_id: u32,
        titles: &[String],
    ) -> Result<Vec<ResourceRecord>> {
        let quoted: Vec<String> = titles
            .iter()
            .map(|t| format!("\"{}\"", t.replace('"', "\\\"")))
            .collect();
        let filter = format!("in.({})", quoted.join(","));
        let url = self.table_url(&format!(
            "user_id=eq.{}&step_id=eq.{}&substep_title={}",
            urlencoding::encode(user_id),
            step_id,
            urlencoding::encode(&filter)
        ));
        self.fetch(url).await
    }

    /// Upsert one record; duplicates on the scoping key merge into the
    /// existing row. Returns the stored representation.
    pub async fn upsert_resource(&self, record: &ResourceRecord) -> Result<ResourceRecord> {
        let url = format!(
            "{}/rest/v1/{}?on_conflict=user_id,step_id,substep_title,resource_type",
            self.base_url, self.resources_table
        );
        let resp = self
            .with_auth(self.http.post(url))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&[record])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("backend upsert error ({}): {}", status, text);
        }
        let mut rows: Vec<ResourceRecord> = resp.json().await?;
        rows.pop()
            .ok_or_else(|| anyhow::anyhow!("backend upsert returned no representation"))
    }

    /// Reachability probe used by `fundroad check`.
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/rest/v1/", self.base_url);
        let resp = self.with_auth(self.http.get(url)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("backend health probe failed ({})", status);
        }
        Ok(())
    }
}
