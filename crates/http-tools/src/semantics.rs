//! Tool annotations derived from HTTP method semantics (RFC 9110).

use crate::config::HttpMethod;
use rmcp::model::ToolAnnotations;

/// Annotations advertised for a tool backed by `method`.
///
/// `openWorldHint` is always `true`: every tool talks to an external API.
#[must_use]
pub fn annotations_for_method(method: HttpMethod) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match method {
        HttpMethod::Get | HttpMethod::Head | HttpMethod::Options => (true, false, Some(true)),
        HttpMethod::Post => (false, false, Some(false)),
        HttpMethod::Put | HttpMethod::Delete => (false, true, Some(true)),
        // PATCH may or may not be idempotent; do not guess.
        HttpMethod::Patch => (false, true, None),
    };

    ToolAnnotations {
        title: None,
        read_only_hint: Some(read_only),
        destructive_hint: Some(destructive),
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::annotations_for_method;
    use crate::config::HttpMethod;

    #[test]
    fn every_method_is_open_world() {
        for m in [
            HttpMethod::Get,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Patch,
            HttpMethod::Delete,
            HttpMethod::Head,
            HttpMethod::Options,
        ] {
            assert_eq!(annotations_for_method(m).open_world_hint, Some(true));
        }
    }

    #[test]
    fn safe_methods_are_read_only() {
        for m in [HttpMethod::Get, HttpMethod::Head, HttpMethod::Options] {
            let a = annotations_for_method(m);
            assert_eq!(a.read_only_hint, Some(true));
            assert_eq!(a.destructive_hint, Some(false));
            assert_eq!(a.idempotent_hint, Some(true));
        }
    }

    #[test]
    fn unsafe_methods() {
        let post = annotations_for_method(HttpMethod::Post);
        assert_eq!(post.read_only_hint, Some(false));
        assert_eq!(post.idempotent_hint, Some(false));

        let delete = annotations_for_method(HttpMethod::Delete);
        assert_eq!(delete.destructive_hint, Some(true));
        assert_eq!(delete.idempotent_hint, Some(true));

        let patch = annotations_for_method(HttpMethod::Patch);
        assert_eq!(patch.destructive_hint, Some(true));
        assert_eq!(patch.idempotent_hint, None);
    }
}
