//! Naming forms shared by every artifact.
//!
//! All plural/singular/case conversions live here so no emitter re-derives a
//! name on its own.

use heck::{ToShoutySnakeCase, ToUpperCamelCase};

use crate::types::DerivedForms;

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
];

/// Compute the derived forms of a (validated) snake_case entity name.
pub fn derive_forms(entity_name: &str) -> DerivedForms {
    let plural = pluralize(entity_name);

    DerivedForms {
        singular: entity_name.to_string(),
        pascal_case: entity_name.to_upper_camel_case(),
        upper_snake: entity_name.to_shouty_snake_case(),
        table_name: plural.clone(),
        plural,
    }
}

/// Pluralize the last `_` segment of a snake_case name.
pub fn pluralize(name: &str) -> String {
    let (head, last) = split_last_segment(name);
    format!("{}{}", head, pluralize_word(last))
}

/// Pluralize for foreign key inference, refusing stems whose plural is a guess.
pub fn pluralize_strict(name: &str) -> Result<String, String> {
    let (_, last) = split_last_segment(name);

    if IRREGULAR.iter().any(|(singular, _)| *singular == last) {
        return Ok(pluralize(name));
    }

    let ambiguous = if last.ends_with('s') && !last.ends_with("ss") {
        Some("it may already be plural")
    } else if last.ends_with('f') || last.ends_with("fe") {
        Some("words ending in 'f' pluralize irregularly")
    } else if last.ends_with('o') {
        Some("words ending in 'o' pluralize irregularly")
    } else {
        None
    };

    match ambiguous {
        Some(reason) => Err(format!("the plural of '{}' is ambiguous ({})", last, reason)),
        None => Ok(pluralize(name)),
    }
}

/// Best-effort inverse of [`pluralize`] for table names.
pub fn singularize(table: &str) -> String {
    let (head, last) = split_last_segment(table);
    format!("{}{}", head, singularize_word(last))
}

/// Class name of the model backing `table`, e.g. `work_logs` -> `WorkLog`.
pub fn class_name_for_table(table: &str) -> String {
    singularize(table).to_upper_camel_case()
}

/// Attribute name for the relationship declared by a foreign key field.
pub fn relationship_attribute(field_name: &str) -> String {
    match field_name.strip_suffix("_id") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => format!("{}_ref", field_name),
    }
}

/// `[a-z][a-z0-9_]*`
pub fn is_field_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('a'..='z'))
        && chars.all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
}

/// Lowercase snake_case with no leading, trailing or doubled underscores.
pub fn is_snake_case(name: &str) -> bool {
    is_field_identifier(name) && !name.ends_with('_') && !name.contains("__")
}

fn split_last_segment(name: &str) -> (&str, &str) {
    match name.rfind('_') {
        Some(idx) => name.split_at(idx + 1),
        None => ("", name),
    }
}

fn pluralize_word(word: &str) -> String {
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return plural.to_string();
    }

    // quiz -> quizzes, fez -> fezzes; waltz, buzz and topaz only take -es
    if word.ends_with("iz") || word.ends_with("ez") {
        return format!("{}zes", word);
    }

    if ["s", "x", "z", "ch", "sh"].iter().any(|end| word.ends_with(end)) {
        return format!("{}es", word);
    }

    if let Some(stem) = word.strip_suffix('y') {
        if stem.chars().last().is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{}ies", stem);
        }
    }

    format!("{}s", word)
}

fn singularize_word(word: &str) -> String {
    if let Some((singular, _)) = IRREGULAR.iter().find(|(_, plural)| *plural == word) {
        return singular.to_string();
    }

    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }

    if let Some(stem) = word.strip_suffix("es") {
        if stem.ends_with("izz") || stem.ends_with("ezz") {
            return stem[..stem.len() - 1].to_string();
        }
        let sibilant = ["ss", "x", "z", "ch", "sh"].iter().any(|end| stem.ends_with(end));
        // statuses -> status, but houses -> house
        let latin_us = stem.ends_with("us") && !stem.ends_with("ous") && !stem.ends_with("aus");
        if sibilant || latin_us {
            return stem.to_string();
        }
    }

    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() && !stem.ends_with('s') => stem.to_string(),
        _ => word.to_string(),
    }
}
