//! Naming rules for generated models and fields.
//!
//! Model names are title-cased and alphanumeric. Field names follow the
//! host framework's inspectdb conventions, recording a note for every
//! rewrite so the generated line explains why it differs from the column.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Python reserved words, which cannot be attribute names.
static PYTHON_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
        "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
        "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
        "try", "while", "with", "yield",
    ]
    .into_iter()
    .collect()
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("valid regex"));

pub fn is_python_keyword(name: &str) -> bool {
    PYTHON_KEYWORDS.contains(name)
}

/// Convert a table name into a model type name.
///
/// Words split on any non-alphanumeric character, on a lowercase or digit
/// followed by an uppercase letter, and on a digit followed by a letter.
/// Each word is title-cased. The result is alphanumeric, starts with a
/// letter and is stable under re-application.
///
/// ```
/// use ezadmin::codegen::naming::table_to_model_name;
///
/// assert_eq!(table_to_model_name("customer_order"), "CustomerOrder");
/// assert_eq!(table_to_model_name("CustomerOrder"), "CustomerOrder");
/// assert_eq!(table_to_model_name("auth_user_groups"), "AuthUserGroups");
/// ```
pub fn table_to_model_name(table_name: &str) -> String {
    // Single-letter words ("a_b" -> "AB") re-split differently, so settle on
    // the fixed point. Each extra pass only lowercases letters.
    let mut name = title_words(table_name);
    loop {
        let next = title_words(&name);
        if next == name {
            return name;
        }
        name = next;
    }
}

fn title_words(table_name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for ch in table_name.chars() {
        if !ch.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev = None;
            continue;
        }

        let boundary = match prev {
            Some(p) => {
                ((p.is_ascii_lowercase() || p.is_ascii_digit()) && ch.is_ascii_uppercase())
                    || (p.is_ascii_digit() && ch.is_ascii_alphabetic())
            }
            None => false,
        };
        if boundary && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }

        current.push(ch);
        prev = Some(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }

    let mut name: String = words.iter().map(|word| title_case(word)).collect();

    match name.chars().next() {
        None => "Table".to_string(),
        Some(first) if first.is_ascii_digit() => {
            name.insert_str(0, "Table");
            name
        }
        Some(_) => name,
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
        }
        None => String::new(),
    }
}

/// A column name turned into a field identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    pub name: String,
    pub notes: Vec<String>,
    /// Original column name, kept when the identifier no longer derives it
    pub db_column: Option<String>,
}

/// Turn a column name into a unique Python field identifier.
///
/// `used` holds the identifiers already taken in the same model; the
/// returned name is not inserted into it.
pub fn normalize_column_name(column: &str, is_relation: bool, used: &HashSet<String>) -> NormalizedName {
    let mut notes = Vec::new();
    let mut db_column = None;

    let mut name = column.to_lowercase();
    if name != column {
        notes.push("Field name made lowercase.".to_string());
    }

    if is_relation {
        if name.ends_with("_id") {
            name.truncate(name.len() - 3);
        } else {
            db_column = Some(column.to_string());
        }
    }

    if NON_WORD.is_match(&name) {
        name = NON_WORD.replace_all(&name, "_").into_owned();
        notes.push("Field renamed to remove unsuitable characters.".to_string());
    }

    if name.contains("__") {
        while name.contains("__") {
            name = name.replace("__", "_");
        }
        notes.push("Field renamed because it contained more than one '_' in a row.".to_string());
    }

    if name.is_empty() {
        name = "field".to_string();
        notes.push("Field renamed because the column name was empty after cleanup.".to_string());
    }

    if name.starts_with('_') {
        name = format!("field{}", name);
        notes.push("Field renamed because it started with '_'.".to_string());
    }

    if name.ends_with('_') {
        name = format!("{}field", name);
        notes.push("Field renamed because it ended with '_'.".to_string());
    }

    if is_python_keyword(&name) {
        name.push_str("_field");
        notes.push("Field renamed because it was a Python reserved word.".to_string());
    }

    if name.chars().next().map_or(false, |c| c.is_ascii_digit()) {
        name = format!("number_{}", name);
        notes.push("Field renamed because it wasn't a valid Python identifier.".to_string());
    }

    if used.contains(&name) {
        let mut index = 0;
        while used.contains(&format!("{}_{}", name, index)) {
            index += 1;
        }
        name = format!("{}_{}", name, index);
        notes.push("Field renamed because of name conflict.".to_string());
    }

    if name != column && !notes.is_empty() {
        db_column = Some(column.to_string());
    }

    NormalizedName {
        name,
        notes,
        db_column,
    }
}
