//! Message template rendering — `{variable}` substitution for per-recipient
//! personalization.
//!
//! Unresolved placeholders are left verbatim in the output rather than
//! raising, so templates that intentionally show literal braces keep working.

use std::collections::HashMap;

/// Render a template against a set of string variables.
///
/// A placeholder is `{name}` where `name` is a key in `variables`. Anything
/// between braces that does not match a key passes through untouched, as do
/// stray braces. Pure function: no I/O, identical inputs yield identical
/// output.
pub fn render(template: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        match after_open.find('}') {
            Some(close) => {
                let name = &after_open[..close];
                match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        // Unknown placeholder: emit it verbatim.
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after_open[close + 1..];
            }
            None => {
                // Unbalanced brace, nothing left to substitute.
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_known_variables() {
        let rendered = render(
            "Oi {nome}, sua oferta expira em {dias} dias",
            &vars(&[("nome", "Ana"), ("dias", "2")]),
        );
        assert_eq!(rendered, "Oi Ana, sua oferta expira em 2 dias");
    }

    #[test]
    fn test_render_leaves_unresolved_placeholders_verbatim() {
        let rendered = render(
            "Oi {nome}, sua oferta expira em {dias} dias",
            &vars(&[("nome", "Bruno")]),
        );
        assert_eq!(rendered, "Oi Bruno, sua oferta expira em {dias} dias");
    }

    #[test]
    fn test_render_is_idempotent_for_same_inputs() {
        let variables = vars(&[("nome", "Ana")]);
        let first = render("Oi {nome}", &variables);
        let second = render("Oi {nome}", &variables);
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_no_placeholders_passthrough() {
        let rendered = render("mensagem fixa", &vars(&[("nome", "Ana")]));
        assert_eq!(rendered, "mensagem fixa");
    }

    #[test]
    fn test_render_unbalanced_brace_passthrough() {
        let rendered = render("abre { e nunca fecha", &vars(&[]));
        assert_eq!(rendered, "abre { e nunca fecha");
    }

    #[test]
    fn test_render_value_containing_braces_not_reexpanded() {
        let rendered = render("{a} e {b}", &vars(&[("a", "{b}"), ("b", "x")]));
        // The substituted value is emitted as-is, never re-scanned.
        assert_eq!(rendered, "{b} e x");
    }

    #[test]
    fn test_render_empty_template() {
        assert_eq!(render("", &vars(&[("nome", "Ana")])), "");
    }
}
