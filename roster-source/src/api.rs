//! The access-control API as the rest of the workspace sees it.
//!
//! Every response is wrapped in an [`Envelope`] whose `code` is distinct from
//! the HTTP status: a `200 OK` can still carry an application failure.

use serde::Deserialize;
use serde_json::Value;

use roster_core::{SourceUserProfile, UserId};

use crate::error::SourceError;

/// `code` value of a successful envelope.
pub const SUCCESS_CODE: &str = "SUCCESS";

/// First page index; the API counts from one.
pub const FIRST_PAGE: u32 = 1;

/// Listable collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Policies,
    Sites,
}

impl Resource {
    /// Path segment under the API root.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Policies => "access_policies",
            Resource::Sites => "sites",
        }
    }
}

/// A listable collection plus fixed query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub resource: Resource,
    pub params: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            params: Vec::new(),
        }
    }

    pub fn policies() -> Self {
        Self::new(Resource::Policies)
    }

    /// Policies scoped to one site.
    pub fn policies_for_site(site_id: &str) -> Self {
        Self::new(Resource::Policies).with_param("site_id", site_id)
    }

    pub fn sites() -> Self {
        Self::new(Resource::Sites)
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_owned(), value.to_owned()));
        self
    }
}

/// Page coordinates sent with every list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_num: u32,
    pub page_size: u32,
}

/// Paging metadata returned alongside list data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page_num: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Standard response wrapper.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Successful envelope, mostly for fakes.
    pub fn success(data: T, pagination: Option<Pagination>) -> Self {
        Self {
            code: SUCCESS_CODE.to_owned(),
            msg: String::new(),
            data: Some(data),
            pagination,
        }
    }

    /// Application-level failure envelope.
    pub fn failure(code: &str, msg: &str) -> Self {
        Self {
            code: code.to_owned(),
            msg: msg.to_owned(),
            data: None,
            pagination: None,
        }
    }

    /// Convert into the payload, mapping a non-success code to
    /// [`SourceError::Application`].
    pub fn into_data(self) -> Result<Option<T>, SourceError> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(SourceError::Application {
                code: self.code,
                message: self.msg,
            })
        }
    }
}

/// One page of undecoded records.
pub type RawPage = Envelope<Vec<Value>>;

/// Operations the reconciliation engine needs from the source system.
pub trait SourceApi {
    /// Fetch one page of `endpoint`.
    ///
    /// A `2xx` response carrying a non-success `code` comes back as that
    /// envelope. A non-`2xx` status is an `Err`: `RateLimited` for 429,
    /// `NotFound` for 404, `Application` for anything else.
    fn get_page(&self, endpoint: &Endpoint, request: PageRequest) -> Result<RawPage, SourceError>;

    /// Fetch a single user's full profile.
    fn get_user(&self, id: &UserId) -> Result<SourceUserProfile, SourceError>;
}

impl<A: SourceApi + ?Sized> SourceApi for &A {
    fn get_page(&self, endpoint: &Endpoint, request: PageRequest) -> Result<RawPage, SourceError> {
        (**self).get_page(endpoint, request)
    }

    fn get_user(&self, id: &UserId) -> Result<SourceUserProfile, SourceError> {
        (**self).get_user(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_decodes_pagination_total() {
        let raw = r#"{"code":"SUCCESS","msg":"success","data":[{"id":"1"}],
                      "pagination":{"page_num":1,"page_size":25,"total":40}}"#;
        let page: RawPage = serde_json::from_str(raw).expect("decode");
        assert!(page.is_success());
        assert_eq!(page.pagination.and_then(|p| p.total), Some(40));
        assert_eq!(page.data.map(|d| d.len()), Some(1));
    }

    #[test]
    fn failure_envelope_maps_to_application_error() {
        let env: Envelope<Value> = Envelope::failure("CODE_AUTH_FAILED", "bad token");
        let err = env.into_data().unwrap_err();
        assert!(matches!(err, SourceError::Application { ref code, .. } if code == "CODE_AUTH_FAILED"));
    }

    #[test]
    fn site_scoped_policies_carry_site_param() {
        let ep = Endpoint::policies_for_site("s-1");
        assert_eq!(ep.resource.path(), "access_policies");
        assert_eq!(ep.params, vec![("site_id".to_string(), "s-1".to_string())]);
    }
}
