//! Module detail query client

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use lattice_core::{DetailError, ModuleDetail, ModuleDetailSource};

/// Fetches runtime module detail from the backend's REST surface, one
/// `GET {base}/modules/{name}` per module. A 404 simply means the module has
/// no deployment yet and yields no entry.
pub struct HttpDetailSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDetailSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        HttpDetailSource {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ModuleDetailSource for HttpDetailSource {
    async fn fetch_details(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, ModuleDetail>, DetailError> {
        let mut details = HashMap::new();
        for name in names {
            let url = format!("{}/modules/{}", self.base_url, name);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| DetailError::Transport(e.to_string()))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                debug!(module = %name, "no detail for module");
                continue;
            }

            let response = response
                .error_for_status()
                .map_err(|e| DetailError::Transport(e.to_string()))?;
            let detail: ModuleDetail = response
                .json()
                .await
                .map_err(|e| DetailError::Decode(e.to_string()))?;
            details.insert(name.clone(), detail);
        }
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_normalized() {
        let source = HttpDetailSource::new("http://localhost:8892/");
        assert_eq!(source.base_url, "http://localhost:8892");
    }
}
