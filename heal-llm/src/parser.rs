use heal_common::{HealError, Result, SelectorKind, ValidationFailure};

/// Turn raw backend text into a `(selector, kind)` pair.
///
/// ```
/// use heal_common::SelectorKind;
/// use heal_llm::parser::parse_selector_response;
///
/// let (selector, kind) = parse_selector_response("  #login-button \n").unwrap();
/// assert_eq!(selector, "#login-button");
/// assert_eq!(kind, SelectorKind::Css);
/// ```
pub fn parse_selector_response(raw: &str) -> Result<(String, SelectorKind)> {
    let selector = raw.trim();
    if selector.is_empty() {
        return Err(HealError::SelectorValidation(ValidationFailure::Empty));
    }
    if selector.contains('\n') || selector.contains('\r') {
        return Err(HealError::SelectorValidation(ValidationFailure::Multiline));
    }
    if selector.contains("```") {
        return Err(HealError::SelectorValidation(ValidationFailure::Fenced));
    }
    Ok((selector.to_string(), SelectorKind::infer(selector)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(raw: &str) -> ValidationFailure {
        match parse_selector_response(raw) {
            Err(HealError::SelectorValidation(f)) => f,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unusable_text() {
        assert_eq!(failure(""), ValidationFailure::Empty);
        assert_eq!(failure("   \t"), ValidationFailure::Empty);
        assert_eq!(failure("a\nb"), ValidationFailure::Multiline);
        assert_eq!(failure("#a\r#b"), ValidationFailure::Multiline);
        assert_eq!(failure("```#login```"), ValidationFailure::Fenced);
    }

    #[test]
    fn classifies_selector_kind() {
        assert_eq!(
            parse_selector_response("#login-button").unwrap(),
            ("#login-button".to_string(), SelectorKind::Css)
        );
        assert_eq!(
            parse_selector_response("(//button)[1]").unwrap().1,
            SelectorKind::Xpath
        );
        assert_eq!(parse_selector_response("//div").unwrap().1, SelectorKind::Xpath);
    }
}
