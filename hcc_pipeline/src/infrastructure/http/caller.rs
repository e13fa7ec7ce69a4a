//! Minimal owner/superuser identity extraction (§6.1, §9).
//!
//! There is no production auth provider behind this gateway (§1 non-goals).
//! The caller's identity is read straight off two headers; a real
//! deployment fronts this with a proper auth layer and forwards the
//! resolved identity the same way.

use axum::http::HeaderMap;

use crate::application::gateway_service::CallerContext;

const CALLER_ID_HEADER: &str = "x-caller-id";
const SUPERUSER_HEADER: &str = "x-superuser";

pub fn caller_context_from_headers(headers: &HeaderMap) -> CallerContext {
    let caller_id = headers.get(CALLER_ID_HEADER).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
    let is_superuser = headers.get(SUPERUSER_HEADER).and_then(|v| v.to_str().ok()).map(|s| s.eq_ignore_ascii_case("true")).unwrap_or(false);
    CallerContext { caller_id, is_superuser }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_caller_has_no_id_and_is_not_superuser() {
        let ctx = caller_context_from_headers(&HeaderMap::new());
        assert!(ctx.caller_id.is_none());
        assert!(!ctx.is_superuser);
    }

    #[test]
    fn reads_caller_id_and_superuser_flag() {
        let mut headers = HeaderMap::new();
        headers.insert(CALLER_ID_HEADER, "alice".parse().unwrap());
        headers.insert(SUPERUSER_HEADER, "true".parse().unwrap());
        let ctx = caller_context_from_headers(&headers);
        assert_eq!(ctx.caller_id.as_deref(), Some("alice"));
        assert!(ctx.is_superuser);
    }
}
