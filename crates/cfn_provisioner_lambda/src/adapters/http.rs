use reqwest::header::CONTENT_TYPE;

use super::block_on;

pub trait DocumentFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}

pub trait ResponseSender {
    fn send_response(&self, response_url: &str, body: &[u8]) -> Result<(), String>;
}

/// Plain HTTP(S) client used for document downloads and response delivery.
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentFetcher for HttpClient {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let request = self.client.get(url);

        block_on(async move {
            let response = request
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|error| format!("failed to fetch {url}: {error}"))?;
            response
                .bytes()
                .await
                .map(|bytes| bytes.to_vec())
                .map_err(|error| format!("failed to read response body from {url}: {error}"))
        })
    }
}

impl ResponseSender for HttpClient {
    fn send_response(&self, response_url: &str, body: &[u8]) -> Result<(), String> {
        // The pre-signed URL is signed for an empty content type.
        let request = self
            .client
            .put(response_url)
            .header(CONTENT_TYPE, "")
            .body(body.to_vec());

        block_on(async move {
            request
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .map(|_| ())
                .map_err(|error| {
                    format!(
                        "failed to deliver custom resource response: {}",
                        error.without_url()
                    )
                })
        })
    }
}
