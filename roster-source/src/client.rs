//! Blocking HTTP client for the access-control developer API.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use roster_core::{Secret, SourceConfig, SourceUserProfile, UserId};

use crate::api::{Endpoint, Envelope, PageRequest, RawPage, SourceApi};
use crate::error::SourceError;

/// `ureq`-backed [`SourceApi`] implementation.
pub struct HttpSourceClient {
    agent: ureq::Agent,
    base_url: String,
    token: Secret,
}

impl HttpSourceClient {
    pub fn new(config: &SourceConfig) -> Self {
        Self::with_timeout(&config.base_url, config.token.clone(), config.timeout)
    }

    pub fn with_timeout(base_url: &str, token: Secret, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("roster/", env!("CARGO_PKG_VERSION")))
            .build();
        tracing::info!("initialized access-control client: {base_url}");
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, SourceError> {
        let url = join_url(&self.base_url, path);
        let mut request = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.token.expose()))
            .set("Accept", "application/json");
        for (key, value) in query {
            request = request.query(key, value);
        }

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(429, _)) => return Err(SourceError::RateLimited { url }),
            Err(ureq::Error::Status(404, _)) => return Err(SourceError::NotFound { what: url }),
            Err(ureq::Error::Status(status, response)) => {
                // Error bodies usually still carry the envelope.
                let message = response
                    .into_json::<Envelope<Value>>()
                    .map(|env| format!("{}: {}", env.code, env.msg))
                    .unwrap_or_else(|_| format!("HTTP {status}"));
                return Err(SourceError::Application {
                    code: status.to_string(),
                    message,
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(SourceError::Transport {
                    url,
                    message: transport.to_string(),
                })
            }
        };

        response.into_json::<T>().map_err(|err| SourceError::Decode {
            url,
            message: err.to_string(),
        })
    }
}

impl SourceApi for HttpSourceClient {
    fn get_page(&self, endpoint: &Endpoint, request: PageRequest) -> Result<RawPage, SourceError> {
        let mut query = endpoint.params.clone();
        query.push(("page_num".to_owned(), request.page_num.to_string()));
        query.push(("page_size".to_owned(), request.page_size.to_string()));
        self.get_json(endpoint.resource.path(), &query)
    }

    fn get_user(&self, id: &UserId) -> Result<SourceUserProfile, SourceError> {
        let path = format!("users/{}", id.as_str());
        let envelope: Envelope<SourceUserProfile> = self.get_json(&path, &[])?;
        envelope
            .into_data()?
            .ok_or_else(|| SourceError::NotFound {
                what: format!("user {id}"),
            })
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("https://h:12445/api/v1/developer/", "/users/1"),
            "https://h:12445/api/v1/developer/users/1"
        );
    }

    #[test]
    fn client_trims_trailing_slash_from_base() {
        let client = HttpSourceClient::with_timeout(
            "https://h/api/",
            Secret::new("t"),
            Duration::from_secs(1),
        );
        assert_eq!(client.base_url(), "https://h/api");
    }

    #[test]
    fn unreachable_host_is_a_transport_error() {
        let client = HttpSourceClient::with_timeout(
            "http://127.0.0.1:9",
            Secret::new("t"),
            Duration::from_millis(500),
        );
        let err = client.get_user(&UserId::from("u1")).unwrap_err();
        assert!(matches!(err, SourceError::Transport { .. }), "got: {err}");
    }
}
