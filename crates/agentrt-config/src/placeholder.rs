//! `${VAR_NAME}` substitution over raw config text, resolved before the
//! TOML parse so secrets never need a dedicated TOML type.

use agentrt_domain::error::{Error, Result};

pub fn substitute(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(Error::Config(format!("unterminated placeholder: {}", &rest[start..])));
        };
        let var_name = &after[..end];
        let value = std::env::var(var_name)
            .map_err(|_| Error::Config(format!("environment variable not set: {var_name}")))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_leaves_text_without_placeholders_untouched() {
        let input = "base_url = \"https://api.openai.com/v1\"";
        assert_eq!(substitute(input).unwrap(), input);
    }

    #[test]
    fn substitute_replaces_known_variable() {
        std::env::set_var("AGENTRT_PLACEHOLDER_TEST", "resolved");
        let input = "api_key = \"${AGENTRT_PLACEHOLDER_TEST}\"";
        assert_eq!(substitute(input).unwrap(), "api_key = \"resolved\"");
        std::env::remove_var("AGENTRT_PLACEHOLDER_TEST");
    }

    #[test]
    fn substitute_errors_on_unset_variable() {
        let err = substitute("${AGENTRT_DEFINITELY_UNSET}").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn substitute_errors_on_unterminated_placeholder() {
        let err = substitute("${OPENAI_API_KEY").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn substitute_handles_multiple_placeholders() {
        std::env::set_var("AGENTRT_A", "1");
        std::env::set_var("AGENTRT_B", "2");
        let input = "${AGENTRT_A}-${AGENTRT_B}";
        assert_eq!(substitute(input).unwrap(), "1-2");
        std::env::remove_var("AGENTRT_A");
        std::env::remove_var("AGENTRT_B");
    }
}
