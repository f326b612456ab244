use std::collections::HashMap;

/// Scalar values plus list-valued sections, gathered once per generation.
#[derive(Debug, Default)]
pub struct RenderContext {
    pub vars: HashMap<String, String>,
    pub lists: HashMap<String, Vec<HashMap<String, String>>>,
}

impl RenderContext {
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(name.to_string(), value.into());
    }

    pub fn set_list(&mut self, name: &str, rows: Vec<HashMap<String, String>>) {
        self.lists.insert(name.to_string(), rows);
    }
}

/// Replaces every `{{NAME}}` occurrence with its value. Unknown placeholders
/// stay as literal text; the accountants proofread the output anyway.
pub fn substitute(text: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = &after[..end];
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(name);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Expands list-valued placeholders into one fragment line per row, before
/// scalar substitution runs. `fragments` maps placeholder name to the
/// per-row fragment template.
pub fn expand_lists(
    template: &str,
    fragments: &[(&str, &str)],
    lists: &HashMap<String, Vec<HashMap<String, String>>>,
) -> String {
    let mut body = template.to_string();
    for (name, fragment) in fragments {
        let placeholder = format!("{{{{{name}}}}}");
        if !body.contains(&placeholder) {
            continue;
        }
        let rendered = lists
            .get(*name)
            .map(|rows| {
                rows.iter()
                    .map(|row| substitute(fragment, row))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        body = body.replace(&placeholder, &rendered);
    }
    body
}

/// French amount formatting: space-grouped thousands, comma decimals, two
/// fractional digits. 75000 -> "75 000,00".
pub fn format_amount(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;
    let grouped = group_thousands(whole);
    if negative {
        format!("-{grouped},{frac:02}")
    } else {
        format!("{grouped},{frac:02}")
    }
}

/// Percentage with two comma decimals, no unit: 50.0 -> "50,00".
pub fn format_percent(value: f64) -> String {
    let hundredths = (value * 100.0).round() as i64;
    format!("{},{:02}", hundredths / 100, (hundredths % 100).abs())
}

/// Whole-number grouping for share counts: 1000 -> "1 000".
pub fn format_count(value: i64) -> String {
    if value < 0 {
        format!("-{}", group_thousands(value.unsigned_abs()))
    } else {
        group_thousands(value as u64)
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (index, ch) in digits.chars().enumerate() {
        if index != 0 && index % 3 == offset {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}
