//! TEI (Text Embeddings Inference) client for posting vectorization.

use std::time::Duration;

use serde::Serialize;

use crate::error::EmbedError;

/// Maximum number of texts per /embed call. Job postings run long, so this
/// stays well below TEI's own batch ceiling.
const BATCH_SIZE: usize = 16;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// TEI HTTP client with a fixed expected vector dimension.
pub struct EmbedClient {
    client: reqwest::Client,
    url: String,
    expected_dim: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [&'a str],
}

impl EmbedClient {
    /// Create a new `EmbedClient` against a TEI base URL.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Http`] if the underlying HTTP client cannot be
    /// built.
    pub fn new(tei_url: &str, expected_dim: usize, timeout_secs: u64) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/embed", tei_url.trim_end_matches('/')),
            expected_dim,
        })
    }

    /// Generate embeddings for a batch of texts.
    ///
    /// Texts are batched into groups of [`BATCH_SIZE`] (16) per request.
    /// Returns one embedding vector per input text, in the same order. Every
    /// vector is checked against the expected dimension so a misconfigured
    /// model never reaches the database.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Http`] if a request fails, or
    /// [`EmbedError::Service`] if the service reports an error, returns the
    /// wrong number of vectors, or returns vectors of the wrong dimension.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let request = EmbedRequest { inputs: chunk };
            let response = self.client.post(&self.url).json(&request).send().await?;

            if !response.status().is_success() {
                return Err(EmbedError::Service(format!(
                    "TEI returned status {}",
                    response.status()
                )));
            }

            let embeddings: Vec<Vec<f32>> = response
                .json()
                .await
                .map_err(|e| EmbedError::Service(format!("TEI response parse error: {e}")))?;

            if embeddings.len() != chunk.len() {
                return Err(EmbedError::Service(format!(
                    "TEI returned {} embeddings for {} inputs",
                    embeddings.len(),
                    chunk.len()
                )));
            }

            for embedding in &embeddings {
                if embedding.len() != self.expected_dim {
                    return Err(EmbedError::Service(format!(
                        "TEI returned a {}-dim vector, expected {}",
                        embedding.len(),
                        self.expected_dim
                    )));
                }
            }

            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }
}

/// Render the retrieval input for one posting.
///
/// The full text is whitespace-collapsed so markup artifacts from extraction
/// do not leak into the embedding.
#[must_use]
pub fn embedding_input(title: &str, company: &str, full_text: &str) -> String {
    let collapsed = full_text.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(
        "Represent this job posting for retrieval. Title: {}. Company: {}. Description: {collapsed}",
        title.trim(),
        company.trim()
    )
}
