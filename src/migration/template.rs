//! `${VAR}` placeholder substitution for SQL scripts
//!
//! Every migration, seed and callback script is rendered exactly once,
//! immediately before execution. Placeholders whose name has no value in the
//! mapping are left verbatim, so SQL that happens to contain `${...}` text
//! (inside string literals, say) runs unchanged. Values are substituted as-is,
//! with no quoting or escaping.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Name → value mapping used to render scripts
pub type TemplateVars = BTreeMap<String, String>;

/// Number of characters of rendered SQL kept in a dry-run preview
pub const PREVIEW_CHARS: usize = 500;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is a valid regex")
});

/// Substitute every `${IDENT}` whose `IDENT` is a key of `vars`
///
/// # Example
///
/// ```
/// use tidemark::migration::template::{render, TemplateVars};
///
/// let mut vars = TemplateVars::new();
/// vars.insert("X".to_string(), "5".to_string());
/// assert_eq!(render("SELECT '${X}'", &vars), "SELECT '5'");
/// assert_eq!(render("SELECT '${Y}'", &vars), "SELECT '${Y}'");
/// ```
pub fn render<'a>(sql: &'a str, vars: &TemplateVars) -> Cow<'a, str> {
    if vars.is_empty() {
        return Cow::Borrowed(sql);
    }

    PLACEHOLDER.replace_all(sql, |caps: &Captures<'_>| match vars.get(&caps[1]) {
        Some(value) => value.clone(),
        None => caps[0].to_string(),
    })
}

/// Leading slice of rendered SQL shown by dry runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub text: String,
    /// Whether `text` was cut short
    pub truncated: bool,
}

/// First `limit` characters of `sql`
pub fn preview(sql: &str, limit: usize) -> Preview {
    match sql.char_indices().nth(limit) {
        Some((cut, _)) => Preview {
            text: sql[..cut].to_string(),
            truncated: true,
        },
        None => Preview {
            text: sql.to_string(),
            truncated: false,
        },
    }
}
