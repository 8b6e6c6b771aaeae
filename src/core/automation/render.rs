use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Fill `{{key}}` slots. Keys missing from `vars` render as empty text.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Placeholder names used by a template, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_known_and_blanks_unknown_slots() {
        let vars = HashMap::from([
            ("name", "M. Martin".to_string()),
            ("sender", "Agence du Port".to_string()),
        ]);
        let out = render(
            "Bonjour {{ name }}, {{sender}} vous rappelle.{{missing}}",
            &vars,
        );
        assert_eq!(out, "Bonjour M. Martin, Agence du Port vous rappelle.");
    }

    #[test]
    fn leaves_single_braces_alone() {
        let vars = HashMap::new();
        assert_eq!(render("{name} {{ }}", &vars), "{name} {{ }}");
    }

    #[test]
    fn lists_distinct_placeholders() {
        assert_eq!(
            placeholders("{{name}} {{ date }} {{name}}"),
            vec!["name".to_string(), "date".to_string()]
        );
    }
}
