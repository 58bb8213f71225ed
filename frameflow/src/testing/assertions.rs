//! Test assertions for frame contexts.

use crate::context::FrameContext;
use serde_json::Value;

/// Asserts that `field` is present with the expected value.
pub fn assert_field(ctx: &FrameContext, field: &str, expected: impl Into<Value>) {
    let expected = expected.into();
    assert_eq!(
        ctx.get(field),
        Some(&expected),
        "Expected field '{}' to be {}. Fields: {:?}",
        field,
        expected,
        ctx.field_names().collect::<Vec<_>>()
    );
}

/// Asserts that `field` is absent.
pub fn assert_missing_field(ctx: &FrameContext, field: &str) {
    assert!(
        !ctx.contains(field),
        "Expected field '{}' to be absent, found {:?}",
        field,
        ctx.get(field)
    );
}

/// Asserts that the context holds exactly `expected`, a JSON object.
pub fn assert_fields(ctx: &FrameContext, expected: &Value) {
    assert_eq!(
        &ctx.to_value(),
        expected,
        "Context fields differ from expected"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_assertions() {
        let ctx = FrameContext::new().with("count", 2);

        assert_field(&ctx, "count", 2);
        assert_missing_field(&ctx, "pathname");
        assert_fields(&ctx, &json!({"count": 2}));
    }

    #[test]
    #[should_panic(expected = "Expected field 'count'")]
    fn test_assert_field_mismatch_panics() {
        assert_field(&FrameContext::new().with("count", 1), "count", 2);
    }
}
