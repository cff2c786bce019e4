use eyre::{Result, bail};
use log::debug;

use crate::backend::{ProcessRequest, ProcessResponse};

/// Path of the process endpoint on the backend
pub const PROCESS_PATH: &str = "/api/process";

pub fn process_url(backend: &str) -> String {
    format!("{}{PROCESS_PATH}", backend.trim_end_matches('/'))
}

/// Forward a process request to the backend
pub async fn submit(client: &reqwest::Client, backend: &str, request: &ProcessRequest) -> Result<ProcessResponse> {
    let url = process_url(backend);
    debug!("Submitting {} manifest URLs to {url}", request.m3u8_urls.len());

    let resp = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(request)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("backend returned {status}: {body}");
    }

    let response: ProcessResponse = resp.json().await?;
    if !response.success {
        bail!("backend rejected request: {}", response.message);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_url() {
        assert_eq!(process_url("http://localhost:3000"), "http://localhost:3000/api/process");
        assert_eq!(process_url("http://localhost:3000/"), "http://localhost:3000/api/process");
    }
}
