//! YAML frontmatter handling: a file that begins with `---` on its first
//! line may carry a metadata mapping closed by the next `---` line.

use std::collections::BTreeMap;

pub type Properties = BTreeMap<String, serde_yaml::Value>;

/// Split a file into its frontmatter mapping and the remaining body.
///
/// Unclosed frontmatter and YAML parse errors both degrade to "no
/// properties, the whole file is the body" rather than failing the load.
pub fn parse_frontmatter(content: &str) -> (Option<Properties>, String) {
    if !content.starts_with("---") {
        return (None, content.to_string());
    }

    // Find the closing delimiter: the next line starting with ---.
    let Some(end_idx) = content[3..].find("\n---") else {
        return (None, content.to_string());
    };

    let yaml_block = strip_one_newline(&content[3..end_idx + 3]);
    let after = strip_one_newline(&content[end_idx + 3 + 4..]);

    if yaml_block.trim().is_empty() {
        return (None, after.to_string());
    }

    match serde_yaml::from_str::<serde_yaml::Value>(yaml_block) {
        Ok(serde_yaml::Value::Null) => (None, after.to_string()),
        Ok(serde_yaml::Value::Mapping(map)) => {
            let props = map
                .into_iter()
                .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v)))
                .collect();
            (Some(props), after.to_string())
        }
        // Scalar or malformed header: treat the file as having no properties.
        _ => (None, content.to_string()),
    }
}

/// Serialize a property mapping back to a `---`-delimited header. Empty
/// mappings render to nothing at all.
pub fn render_frontmatter(properties: &Properties) -> String {
    if properties.is_empty() {
        return String::new();
    }
    match serde_yaml::to_string(properties) {
        Ok(yaml) => format!("---\n{}\n---\n", yaml.trim_end_matches('\n')),
        Err(e) => {
            log::warn!("[vault] failed to render frontmatter: {e}");
            String::new()
        }
    }
}

fn strip_one_newline(s: &str) -> &str {
    s.strip_prefix("\r\n")
        .or_else(|| s.strip_prefix('\n'))
        .unwrap_or(s)
}
