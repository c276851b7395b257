use crate::model::{
    COMPONENT_TYPE_CANVAS_APP, COMPONENT_TYPE_CONNECTION_REFERENCE, COMPONENT_TYPE_CONNECTOR,
    COMPONENT_TYPE_CUSTOM_CONNECTOR, COMPONENT_TYPE_WORKFLOW,
};

pub const DEFAULT_COMPONENT_COLOR: &str = "#eceff1";
pub const PICKED_SOLUTION_COLOR: &str = "#bbdefb";
pub const UNPICKED_SOLUTION_COLOR: &str = "#f5f5f5";

const COMPONENT_COLORS: &[(u32, &str)] = &[
    (COMPONENT_TYPE_WORKFLOW, "#ffe0b2"),
    (COMPONENT_TYPE_CANVAS_APP, "#c8e6c9"),
    (COMPONENT_TYPE_CONNECTOR, "#d1c4e9"),
    (COMPONENT_TYPE_CUSTOM_CONNECTOR, "#d1c4e9"),
    (COMPONENT_TYPE_CONNECTION_REFERENCE, "#f8bbd0"),
];

pub fn component_color(component_type: u32) -> &'static str {
    COMPONENT_COLORS
        .iter()
        .find(|(code, _)| *code == component_type)
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_COMPONENT_COLOR)
}

/// Naive plural used for type cluster labels: `Process` -> `Processes`.
pub fn pluralize(type_name: &str) -> String {
    if type_name.ends_with('s') {
        format!("{type_name}es")
    } else {
        format!("{type_name}s")
    }
}

pub fn quote(value: &str) -> String {
    format!("\"{}\"", escape(value))
}

pub fn label(lines: &[&str]) -> String {
    let escaped = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(escape)
        .collect::<Vec<_>>()
        .join("\\n");
    format!("\"{escaped}\"")
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' | '\r' => escaped.push(' '),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn attributes(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn edge(from: &str, to: &str) -> String {
    format!("{} -> {};", quote(from), quote(to))
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_COMPONENT_COLOR, attributes, component_color, edge, label, pluralize, quote,
    };
    use crate::model::{COMPONENT_TYPE_CANVAS_APP, COMPONENT_TYPE_ENTITY, COMPONENT_TYPE_WORKFLOW};

    #[test]
    fn pluralize_appends_es_after_trailing_s() {
        assert_eq!(pluralize("Process"), "Processes");
        assert_eq!(pluralize("Workflow"), "Workflows");
        assert_eq!(pluralize("Entity"), "Entitys");
    }

    #[test]
    fn quote_escapes_dot_metacharacters() {
        assert_eq!(quote(r#"say "hi" \o/"#), r#""say \"hi\" \\o/""#);
        assert_eq!(quote("two\nlines"), "\"two lines\"");
    }

    #[test]
    fn label_joins_non_blank_lines_with_dot_breaks() {
        assert_eq!(label(&["Acme", "", "1.0"]), "\"Acme\\n1.0\"");
    }

    #[test]
    fn attributes_and_edges_render_in_order() {
        let rendered = attributes(&[("label", quote("A")), ("fillcolor", quote("#fff"))]);
        assert_eq!(rendered, "label=\"A\", fillcolor=\"#fff\"");
        assert_eq!(edge("A", "B"), "\"A\" -> \"B\";");
    }

    #[test]
    fn component_colors_distinguish_known_types() {
        assert_ne!(component_color(COMPONENT_TYPE_WORKFLOW), DEFAULT_COMPONENT_COLOR);
        assert_ne!(
            component_color(COMPONENT_TYPE_WORKFLOW),
            component_color(COMPONENT_TYPE_CANVAS_APP)
        );
        assert_eq!(component_color(COMPONENT_TYPE_ENTITY), DEFAULT_COMPONENT_COLOR);
    }
}
