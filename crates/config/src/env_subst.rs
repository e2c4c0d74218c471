/// Replace `${ENV_VAR}` and `${ENV_VAR:-fallback}` placeholders in raw config text.
///
/// Unresolvable variables without a fallback are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Placeholder expansion with an injectable lookup, so tests never touch the
/// process environment.
fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated placeholder: keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name.trim(), Some(fallback)),
            None => (body.trim(), None),
        };

        match (name.is_empty(), lookup(name).filter(|v| !v.is_empty()), fallback) {
            (false, Some(value), _) => out.push_str(&value),
            (false, None, Some(fallback)) => out.push_str(fallback),
            _ => {
                out.push_str("${");
                out.push_str(body);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "COURIER_TEST_TOKEN" => Some("s3cret".to_string()),
            "COURIER_EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        let out = substitute_env_with("api_token = \"${COURIER_TEST_TOKEN}\"", lookup);
        assert_eq!(out, "api_token = \"s3cret\"");
    }

    #[test]
    fn unknown_var_is_left_untouched() {
        let out = substitute_env_with("url = \"${NOPE}\"", lookup);
        assert_eq!(out, "url = \"${NOPE}\"");
    }

    #[test]
    fn fallback_used_when_missing_or_empty() {
        assert_eq!(
            substitute_env_with("${NOPE:-http://localhost:9000}", lookup),
            "http://localhost:9000"
        );
        assert_eq!(substitute_env_with("${COURIER_EMPTY:-x}", lookup), "x");
        assert_eq!(substitute_env_with("${COURIER_TEST_TOKEN:-x}", lookup), "s3cret");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_env_with("a ${OPEN", lookup), "a ${OPEN");
    }

    #[test]
    fn multiple_placeholders_on_one_line() {
        let out = substitute_env_with("${COURIER_TEST_TOKEN}-${NOPE:-y}-end", lookup);
        assert_eq!(out, "s3cret-y-end");
    }
}
