//! Members listing
//!
//! The list is a compile-time constant, so the JSON body is rendered once
//! when the route table is built and every response shares those bytes.

use crate::app::StaticRoute;
use crate::{Method, Response, Result};
use bytes::Bytes;
use serde::Serialize;

/// Path the members listing is served on
pub const MEMBERS_PATH: &str = "/members";

/// The fixed member list, in response order
pub const MEMBERS: [&str; 3] = ["members1", "members2", "members3"];

/// Body of `GET /members`
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MembersResponse {
    pub members: &'static [&'static str],
}

impl MembersResponse {
    pub const fn new() -> Self {
        Self { members: &MEMBERS }
    }
}

impl Default for MembersResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize the members payload
pub fn render() -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(&MembersResponse::new())?))
}

/// Pre-rendered route for the members listing
pub fn route() -> Result<StaticRoute> {
    Ok(StaticRoute {
        method: Method::Get,
        path: MEMBERS_PATH.to_string(),
        response: Response::json(render()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;

    #[test]
    fn test_render_exact_bytes() {
        let body = render().unwrap();
        assert_eq!(
            &body[..],
            br#"{"members":["members1","members2","members3"]}"#
        );
    }

    #[test]
    fn test_render_is_stable() {
        assert_eq!(render().unwrap(), render().unwrap());
    }

    #[test]
    fn test_route() {
        let route = route().unwrap();
        assert_eq!(route.method, Method::Get);
        assert_eq!(route.path, "/members");
        assert_eq!(route.response.status, StatusCode::OK);
        assert_eq!(route.response.content_type(), Some("application/json"));

        let value: serde_json::Value = serde_json::from_slice(&route.response.body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"members": ["members1", "members2", "members3"]})
        );
    }
}
