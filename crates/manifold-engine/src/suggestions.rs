//! Fuzzy "did you mean" hints for template errors

use serde_json::Value as JsonValue;

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Filters registered by the engine plus the MiniJinja built-ins templates commonly use
pub const AVAILABLE_FILTERS: &[&str] = &[
    "toyaml",
    "tojson",
    "b64encode",
    "b64decode",
    "quote",
    "squote",
    "nindent",
    "indent",
    "required",
    "sha256",
    "trunc",
    // MiniJinja built-ins
    "default",
    "upper",
    "lower",
    "replace",
    "trim",
    "join",
    "length",
    "dictsort",
    "items",
    "int",
    "string",
];

/// Top-level names available in every template
pub const CONTEXT_VARIABLES: &[&str] = &["params", "component", "app"];

/// Candidates within `MAX_SUGGESTION_DISTANCE`, closest first
pub fn find_closest_matches<'a>(input: &str, candidates: &[&'a str], max_results: usize) -> Vec<&'a str> {
    let mut scored: Vec<(usize, &str)> = candidates
        .iter()
        .map(|c| (strsim::levenshtein(input, c), *c))
        .filter(|(distance, _)| *distance > 0 && *distance <= MAX_SUGGESTION_DISTANCE)
        .collect();
    scored.sort();
    scored.into_iter().take(max_results).map(|(_, c)| c).collect()
}

/// Hint for an undefined expression such as `params.spec.replicsa`
///
/// Walks `params` as far as the expression resolves and suggests keys near
/// the first segment that does not.
pub fn suggest_undefined_variable(expr: &str, params: &JsonValue) -> Option<String> {
    let mut parts = expr.split('.');
    let root = parts.next()?;

    if root != "params" {
        return find_closest_matches(root, CONTEXT_VARIABLES, 1)
            .first()
            .map(|m| format!("Did you mean `{}`?", expr.replacen(root, m, 1)));
    }

    let mut current = params;
    let mut resolved = vec!["params"];
    for part in parts {
        match current.get(part) {
            Some(next) => {
                current = next;
                resolved.push(part);
            }
            None => {
                let prefix = resolved.join(".");
                let available: Vec<&str> = current
                    .as_object()
                    .map(|m| m.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                let matches = find_closest_matches(part, &available, 3);
                return Some(if matches.is_empty() {
                    format!(
                        "`{}` has no key `{}`. Set it with `manifold param set` or use `| default(...)`",
                        prefix, part
                    )
                } else {
                    let options: Vec<String> = matches.iter().map(|m| format!("`{}.{}`", prefix, m)).collect();
                    format!("Did you mean {}?", options.join(" or "))
                });
            }
        }
    }
    None
}

pub fn suggest_unknown_filter(filter_name: &str) -> Option<String> {
    let matches = find_closest_matches(filter_name, AVAILABLE_FILTERS, 3);
    if matches.is_empty() {
        Some(format!(
            "Unknown filter `{}`. Available: {}",
            filter_name,
            AVAILABLE_FILTERS.join(", ")
        ))
    } else {
        let options: Vec<String> = matches.iter().map(|m| format!("`{}`", m)).collect();
        Some(format!("Did you mean {}?", options.join(" or ")))
    }
}

/// First name quoted with backticks, single or double quotes in `msg`
pub fn extract_quoted_name(msg: &str) -> Option<String> {
    for quote in ['`', '\'', '"'] {
        if let Some(start) = msg.find(quote) {
            let rest = &msg[start + 1..];
            if let Some(end) = rest.find(quote) {
                return Some(rest[..end].to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_closest_matches() {
        assert_eq!(find_closest_matches("toyml", AVAILABLE_FILTERS, 3)[0], "toyaml");
        assert!(find_closest_matches("toyaml", AVAILABLE_FILTERS, 3).iter().all(|m| *m != "toyaml"));
        assert!(find_closest_matches("completely-different", AVAILABLE_FILTERS, 3).is_empty());
    }

    #[test]
    fn test_suggest_context_variable() {
        let hint = suggest_undefined_variable("param.spec.replicas", &json!({})).unwrap();
        assert_eq!(hint, "Did you mean `params.spec.replicas`?");
    }

    #[test]
    fn test_suggest_param_key() {
        let params = json!({"spec": {"replicas": 3}});
        let hint = suggest_undefined_variable("params.spec.replicsa", &params).unwrap();
        assert_eq!(hint, "Did you mean `params.spec.replicas`?");

        let hint = suggest_undefined_variable("params.metadata.name", &params).unwrap();
        assert!(hint.contains("`params` has no key `metadata`"), "{hint}");

        assert!(suggest_undefined_variable("params.spec.replicas", &params).is_none());
    }

    #[test]
    fn test_suggest_unknown_filter() {
        assert!(suggest_unknown_filter("toyml").unwrap().contains("`toyaml`"));
        assert!(suggest_unknown_filter("zzzzzzzz").unwrap().starts_with("Unknown filter"));
    }

    #[test]
    fn test_extract_quoted_name() {
        assert_eq!(extract_quoted_name("unknown filter `toyml`"), Some("toyml".to_string()));
        assert_eq!(extract_quoted_name("filter 'x' is unknown"), Some("x".to_string()));
        assert_eq!(extract_quoted_name("nothing quoted"), None);
    }
}
