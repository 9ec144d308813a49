//! Parser for the `--fields` mini-language.
//!
//! ```text
//! spec   := clause (',' clause)*
//! clause := name ':' type (':' target)? (':' constraint)*
//! type   := str | text | ... | fk | fk(<table>)
//! ```
//!
//! Commas split clauses unless escaped with `\` or nested inside parentheses.
//! Columns reported in errors are 1-based character offsets into the input.

use std::collections::{BTreeSet, HashSet};
use std::mem;

use tracing::debug;

use crate::error::{ParseError, ParseErrorKind};
use crate::naming;
use crate::types::{Constraint, FieldSpec, FkTarget, TypeTag};

#[derive(Clone, Copy, Debug)]
struct Located {
    ch: char,
    column: usize,
    escaped: bool,
}

#[derive(Debug)]
struct Token {
    text: String,
    column: usize,
}

#[derive(Debug)]
struct RawClause {
    chars: Vec<Located>,
    start_column: usize,
}

impl RawClause {
    fn trimmed(&self) -> &[Located] {
        let start = self
            .chars
            .iter()
            .position(|loc| !loc.ch.is_whitespace())
            .unwrap_or(self.chars.len());
        let end = self
            .chars
            .iter()
            .rposition(|loc| !loc.ch.is_whitespace())
            .map_or(start, |idx| idx + 1);
        &self.chars[start..end]
    }
}

/// Parse a full field specification into an ordered list of fields.
///
/// Blank input yields no fields.
pub fn parse_fields(input: &str) -> Result<Vec<FieldSpec>, ParseError> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut fields: Vec<FieldSpec> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut primary: Option<String> = None;

    for raw in split_clauses(input) {
        let chars = raw.trimmed();
        let clause: String = chars.iter().map(|loc| loc.ch).collect();
        let column = chars.first().map_or(raw.start_column, |loc| loc.column);

        if clause.is_empty() {
            return Err(ParseError {
                clause,
                column,
                kind: ParseErrorKind::EmptyClause,
            });
        }

        let tokens = split_tokens(chars, column);
        let field = parse_clause(&clause, column, &tokens)?;

        if !seen.insert(field.name.clone()) {
            return Err(ParseError {
                clause,
                column: tokens[0].column,
                kind: ParseErrorKind::DuplicateField { name: field.name },
            });
        }

        if field.has(Constraint::Primary) {
            if let Some(first) = &primary {
                return Err(ParseError {
                    clause,
                    column,
                    kind: ParseErrorKind::MultiplePrimary {
                        first: first.clone(),
                        second: field.name,
                    },
                });
            }
            primary = Some(field.name.clone());
        }

        fields.push(field);
    }

    debug!(count = fields.len(), "parsed field specification");
    Ok(fields)
}

fn split_clauses(input: &str) -> Vec<RawClause> {
    let mut clauses = Vec::new();
    let mut current: Vec<Located> = Vec::new();
    let mut start_column = 1;
    let mut depth = 0usize;
    let mut chars = input.chars().enumerate().map(|(idx, ch)| (idx + 1, ch));

    while let Some((column, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((column, escaped)) => current.push(Located {
                    ch: escaped,
                    column,
                    escaped: true,
                }),
                None => current.push(Located {
                    ch,
                    column,
                    escaped: false,
                }),
            },
            ',' if depth == 0 => {
                clauses.push(RawClause {
                    chars: mem::take(&mut current),
                    start_column,
                });
                start_column = column + 1;
            }
            _ => {
                if ch == '(' {
                    depth += 1;
                } else if ch == ')' {
                    depth = depth.saturating_sub(1);
                }
                current.push(Located {
                    ch,
                    column,
                    escaped: false,
                });
            }
        }
    }

    clauses.push(RawClause {
        chars: current,
        start_column,
    });
    clauses
}

fn split_tokens(chars: &[Located], clause_column: usize) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Vec<Located> = Vec::new();
    let mut token_column = clause_column;

    for loc in chars {
        if loc.ch == ':' && !loc.escaped {
            tokens.push(make_token(&current, token_column));
            current.clear();
            token_column = loc.column + 1;
        } else {
            current.push(*loc);
        }
    }
    tokens.push(make_token(&current, token_column));

    tokens
}

fn make_token(chars: &[Located], fallback_column: usize) -> Token {
    let trimmed: Vec<&Located> = chars
        .iter()
        .skip_while(|loc| loc.ch.is_whitespace())
        .collect();
    let end = trimmed
        .iter()
        .rposition(|loc| !loc.ch.is_whitespace())
        .map_or(0, |idx| idx + 1);

    Token {
        text: trimmed[..end].iter().map(|loc| loc.ch).collect(),
        column: trimmed.first().map_or(fallback_column, |loc| loc.column),
    }
}

fn parse_clause(clause: &str, column: usize, tokens: &[Token]) -> Result<FieldSpec, ParseError> {
    let error = |column: usize, kind: ParseErrorKind| ParseError {
        clause: clause.to_string(),
        column,
        kind,
    };

    let (name_token, type_token, rest) = match tokens {
        [name, type_token, rest @ ..] if !name.text.is_empty() && !type_token.text.is_empty() => {
            (name, type_token, rest)
        }
        _ => {
            return Err(error(
                column,
                ParseErrorKind::MalformedClause {
                    clause: clause.to_string(),
                },
            ))
        }
    };

    if !naming::is_field_identifier(&name_token.text) {
        return Err(error(
            name_token.column,
            ParseErrorKind::InvalidFieldName {
                name: name_token.text.clone(),
            },
        ));
    }

    let (type_tag, mut fk_target) = parse_type(type_token).map_err(|(col, kind)| error(col, kind))?;
    let mut constraints: BTreeSet<Constraint> = BTreeSet::new();

    for (idx, token) in rest.iter().enumerate() {
        if token.text.is_empty() {
            return Err(error(
                token.column,
                ParseErrorKind::MalformedClause {
                    clause: clause.to_string(),
                },
            ));
        }

        if let Ok(constraint) = token.text.parse::<Constraint>() {
            constraints.insert(constraint);
            continue;
        }

        // A target is only accepted directly after the type.
        let target_position = idx == 0;

        if type_tag == TypeTag::Fk && target_position && fk_target.is_none() {
            if !naming::is_snake_case(&token.text) {
                return Err(error(
                    token.column,
                    ParseErrorKind::InvalidFkTarget {
                        table: token.text.clone(),
                    },
                ));
            }
            fk_target = Some(FkTarget::explicit(token.text.clone()));
            continue;
        }

        let looks_like_table = naming::is_snake_case(&token.text)
            && naming::singularize(&token.text) != token.text;
        let kind = if type_tag != TypeTag::Fk && target_position && looks_like_table {
            ParseErrorKind::FkTargetOnNonFk {
                token: token.text.clone(),
            }
        } else {
            ParseErrorKind::UnknownConstraint {
                token: token.text.clone(),
                clause: clause.to_string(),
            }
        };
        return Err(error(token.column, kind));
    }

    if constraints.contains(&Constraint::Primary) && constraints.contains(&Constraint::Nullable) {
        return Err(error(
            column,
            ParseErrorKind::ConflictingConstraints {
                name: name_token.text.clone(),
            },
        ));
    }

    if type_tag == TypeTag::Fk && fk_target.is_none() {
        let table = infer_fk_table(&name_token.text)
            .map_err(|kind| error(name_token.column, kind))?;
        fk_target = Some(FkTarget::inferred(table));
    }

    let mut field = FieldSpec::new(name_token.text.clone(), type_tag);
    field.constraints = constraints;
    field.fk_target = fk_target;
    Ok(field)
}

fn parse_type(token: &Token) -> Result<(TypeTag, Option<FkTarget>), (usize, ParseErrorKind)> {
    if let Some(inner) = token
        .text
        .strip_prefix("fk(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let table = inner.trim();
        if !naming::is_snake_case(table) {
            return Err((
                token.column + 3,
                ParseErrorKind::InvalidFkTarget {
                    table: table.to_string(),
                },
            ));
        }
        return Ok((TypeTag::Fk, Some(FkTarget::explicit(table))));
    }

    match token.text.parse::<TypeTag>() {
        Ok(tag) => Ok((tag, None)),
        Err(()) => Err((
            token.column,
            ParseErrorKind::UnknownType {
                tag: token.text.clone(),
                valid: TypeTag::valid_tags(),
            },
        )),
    }
}

/// `owner_id` -> `owners`. Anything that is not a plain `<stem>_id` is refused.
fn infer_fk_table(name: &str) -> Result<String, ParseErrorKind> {
    let stem = match name.strip_suffix("_id") {
        Some(stem) if naming::is_snake_case(stem) => stem,
        _ => {
            return Err(ParseErrorKind::FkInference {
                name: name.to_string(),
                reason: "the name does not end in '_id'".to_string(),
            })
        }
    };

    naming::pluralize_strict(stem).map_err(|reason| ParseErrorKind::FkInference {
        name: name.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::types::{to_field_spec_string, FkOrigin};

    fn kind_of(input: &str) -> ParseErrorKind {
        parse_fields(input).unwrap_err().kind
    }

    #[test]
    fn parses_product_fields() {
        let fields = parse_fields("name:str,price:decimal,sku:str:unique").unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].name, "name");
        assert_eq!(fields[1].type_tag, TypeTag::Decimal);
        assert!(fields[2].has(Constraint::Unique));
    }

    #[test]
    fn blank_input_has_no_fields() {
        assert!(parse_fields("").unwrap().is_empty());
        assert!(parse_fields("   ").unwrap().is_empty());
    }

    #[test]
    fn whitespace_around_tokens_is_ignored() {
        let fields = parse_fields(" name : str : index , note:text:nullable ").unwrap();

        assert_eq!(fields[0].name, "name");
        assert!(fields[0].has(Constraint::Index));
        assert!(fields[1].is_nullable());
    }

    #[test]
    fn unknown_type_reports_tag_and_column() {
        let error = parse_fields("name:str,price:dollars").unwrap_err();

        assert_eq!(error.column, 16);
        assert_eq!(error.clause, "price:dollars");
        match error.kind {
            ParseErrorKind::UnknownType { tag, valid } => {
                assert_eq!(tag, "dollars");
                assert!(valid.contains("decimal"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn unknown_constraint_is_rejected() {
        let error = parse_fields("sku:str:uniq").unwrap_err();

        assert_eq!(error.column, 9);
        assert_eq!(
            error.kind,
            ParseErrorKind::UnknownConstraint {
                token: "uniq".into(),
                clause: "sku:str:uniq".into(),
            }
        );
    }

    #[test]
    fn table_on_non_fk_field_is_rejected() {
        assert_eq!(
            kind_of("owner:uuid:users"),
            ParseErrorKind::FkTargetOnNonFk {
                token: "users".into()
            }
        );
    }

    #[test]
    fn duplicate_field_is_rejected() {
        let error = parse_fields("name:str,name:text").unwrap_err();

        assert_eq!(error.column, 10);
        assert_eq!(
            error.kind,
            ParseErrorKind::DuplicateField {
                name: "name".into()
            }
        );
    }

    #[test]
    fn empty_and_malformed_clauses() {
        assert_eq!(kind_of("name:str,"), ParseErrorKind::EmptyClause);
        assert_eq!(
            kind_of("name"),
            ParseErrorKind::MalformedClause {
                clause: "name".into()
            }
        );
        assert_eq!(
            kind_of("name:str:"),
            ParseErrorKind::MalformedClause {
                clause: "name:str:".into()
            }
        );
        assert_eq!(
            kind_of("Name:str"),
            ParseErrorKind::InvalidFieldName {
                name: "Name".into()
            }
        );
    }

    #[test]
    fn duplicate_constraints_collapse() {
        let fields = parse_fields("sku:str:unique:unique").unwrap();

        assert_eq!(fields[0].constraints.len(), 1);
    }

    #[test]
    fn primary_rules() {
        assert_eq!(
            kind_of("code:str:primary:nullable"),
            ParseErrorKind::ConflictingConstraints {
                name: "code".into()
            }
        );
        assert_eq!(
            kind_of("code:str:primary,slug:str:primary"),
            ParseErrorKind::MultiplePrimary {
                first: "code".into(),
                second: "slug".into()
            }
        );
        assert!(parse_fields("code:str:primary").is_ok());
    }

    #[test]
    fn explicit_fk_target_forms() {
        let fields = parse_fields("owner_id:fk:users:nullable,team:fk(squads)").unwrap();
        let owner = fields[0].fk_target.as_ref().unwrap();
        let team = fields[1].fk_target.as_ref().unwrap();

        assert_eq!(owner.table, "users");
        assert_eq!(owner.origin, FkOrigin::Explicit);
        assert!(fields[0].is_nullable());
        assert_eq!(team.table, "squads");
    }

    #[test]
    fn explicit_target_is_never_overridden() {
        let fields = parse_fields("category_id:fk:product_categories").unwrap();

        assert_eq!(
            fields[0].fk_target.as_ref().unwrap().table,
            "product_categories"
        );
    }

    #[test]
    fn fk_target_inferred_from_name() {
        let fields = parse_fields("owner_id:fk,category_id:fk:index").unwrap();

        assert_eq!(fields[0].fk_target, Some(FkTarget::inferred("owners")));
        assert_eq!(fields[1].fk_target, Some(FkTarget::inferred("categories")));
        assert!(fields[1].has(Constraint::Index));
    }

    #[test]
    fn ambiguous_fk_inference_is_fatal() {
        assert!(matches!(
            kind_of("status_id:fk"),
            ParseErrorKind::FkInference { .. }
        ));
        assert!(matches!(kind_of("owner:fk"), ParseErrorKind::FkInference { .. }));
        assert!(matches!(kind_of("hero_id:fk"), ParseErrorKind::FkInference { .. }));
    }

    #[test]
    fn target_must_follow_the_type() {
        assert_eq!(
            kind_of("owner_id:fk:nullable:users"),
            ParseErrorKind::UnknownConstraint {
                token: "users".into(),
                clause: "owner_id:fk:nullable:users".into(),
            }
        );
    }

    #[test]
    fn table_named_like_a_constraint_reads_back() {
        let mut field = FieldSpec::new("owner_id", TypeTag::Fk).with(Constraint::Nullable);
        field.fk_target = Some(FkTarget::explicit("index"));

        let parsed = parse_fields(&to_field_spec_string(&[field.clone()])).unwrap();

        assert_eq!(parsed, vec![field]);
    }

    #[test]
    fn escaped_comma_stays_in_the_clause() {
        let error = parse_fields("na\\,me:str").unwrap_err();

        assert_eq!(
            error.kind,
            ParseErrorKind::InvalidFieldName {
                name: "na,me".into()
            }
        );
        assert_eq!(error.column, 1);
    }

    const TABLES: &[&str] = &["users", "teams", "product_categories", "warehouses", "index", "unique"];

    fn arb_field() -> impl Strategy<Value = (String, TypeTag, Vec<Constraint>, u8, usize)> {
        (
            "[a-z][a-z0-9]{0,6}",
            prop::sample::select(TypeTag::ALL.to_vec()),
            prop::collection::vec(prop::sample::select(Constraint::ALL.to_vec()), 0..4),
            0u8..3,
            0..TABLES.len(),
        )
    }

    fn build_fields(raw: Vec<(String, TypeTag, Vec<Constraint>, u8, usize)>) -> Vec<FieldSpec> {
        let mut primary_taken = false;

        raw.into_iter()
            .enumerate()
            .map(|(idx, (base, tag, constraints, fk_mode, table))| {
                let inferred = tag == TypeTag::Fk && fk_mode == 0;
                let name = if inferred {
                    format!("f{}_owner_id", idx)
                } else {
                    format!("{}_{}", base, idx)
                };

                let mut field = FieldSpec::new(name, tag);
                for constraint in constraints {
                    field.constraints.insert(constraint);
                }
                if field.has(Constraint::Primary) {
                    if primary_taken {
                        field.constraints.remove(&Constraint::Primary);
                    } else {
                        primary_taken = true;
                        field.constraints.remove(&Constraint::Nullable);
                    }
                }

                if tag == TypeTag::Fk {
                    field.fk_target = Some(if inferred {
                        FkTarget::inferred(format!("f{}_owners", idx))
                    } else {
                        FkTarget::explicit(TABLES[table])
                    });
                }
                field
            })
            .collect()
    }

    proptest! {
        #[test]
        fn serialized_fields_parse_back_identically(
            raw in prop::collection::vec(arb_field(), 1..8),
        ) {
            let fields = build_fields(raw);
            let spec = to_field_spec_string(&fields);
            let parsed = parse_fields(&spec).unwrap();

            prop_assert_eq!(&parsed, &fields);
            prop_assert_eq!(to_field_spec_string(&parsed), spec);
        }

        #[test]
        fn parser_never_panics(input in ".*") {
            let _ = parse_fields(&input);
        }
    }
}
