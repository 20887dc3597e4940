//! Reference-expression resolution.
//!
//! Parameter values may embed tokens of the form `{X expr X}` where the
//! delimiter pair selects the addressing mode:
//!
//! | token | root |
//! |---|---|
//! | `{: expr :}` | an earlier step's result |
//! | `{# expr #}` | job variables |
//! | `{< expr >}` | job parameters |
//! | `{% expr %}` | the whole context snapshot |
//!
//! A string that is exactly one token resolves to the typed value at that
//! path; a token embedded in surrounding text is replaced by its string form.
//! The expression inside a token is itself resolved first, so references can
//! nest.

use std::sync::OnceLock;

use cascade_registry::Argument;
use regex::Regex;
use serde_json::{Map, Value};

use crate::context::ContextSnapshot;
use crate::error::TemplateError;
use crate::path::lookup_path;

fn token_regex() -> &'static Regex {
  static TOKEN: OnceLock<Regex> = OnceLock::new();
  TOKEN.get_or_init(|| Regex::new(r"\{[<%#:] \S+ [%#:>]\}").expect("token regex"))
}

/// The addressing mode of a token, decided by its delimiter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  StepResult,
  JobVariable,
  JobParameter,
  RawContext,
}

/// Split a candidate token into its mode and inner expression; tokens with
/// mismatched delimiters are not references and stay literal.
fn parse_token(token: &str) -> Option<(Mode, &str)> {
  if token.len() <= 6 {
    return None;
  }
  let mode = match (&token[..3], &token[token.len() - 3..]) {
    ("{: ", " :}") => Mode::StepResult,
    ("{# ", " #}") => Mode::JobVariable,
    ("{< ", " >}") => Mode::JobParameter,
    ("{% ", " %}") => Mode::RawContext,
    _ => return None,
  };
  Some((mode, &token[3..token.len() - 3]))
}

/// The string form used when a token is embedded in surrounding text.
pub fn stringify(value: &Value) -> String {
  match value {
    Value::String(text) => text.clone(),
    Value::Null => "null".to_string(),
    other => other.to_string(),
  }
}

/// Truthiness used by condition evaluation: null, false, zero, and empty
/// strings/lists/maps are false; everything else is true.
pub fn truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
    Value::String(text) => !text.is_empty(),
    Value::Array(items) => !items.is_empty(),
    Value::Object(map) => !map.is_empty(),
  }
}

/// Resolve any parameter value: strings are scanned for tokens, lists and
/// maps recurse, everything else passes through unchanged.
pub fn resolve(ctx: &ContextSnapshot, value: &Value) -> Result<Argument, TemplateError> {
  match value {
    Value::String(text) => resolve_string(ctx, text),
    Value::Array(items) => {
      let resolved = items
        .iter()
        .map(|item| resolve(ctx, item).map(|arg| arg.to_value()))
        .collect::<Result<Vec<_>, _>>()?;
      Ok(Argument::Value(Value::Array(resolved)))
    }
    Value::Object(map) => {
      let mut resolved = Map::new();
      for (key, item) in map {
        let key = stringify(&resolve_string(ctx, key)?.to_value());
        resolved.insert(key, resolve(ctx, item)?.to_value());
      }
      Ok(Argument::Value(Value::Object(resolved)))
    }
    other => Ok(Argument::Value(other.clone())),
  }
}

/// Resolve a string that may contain reference tokens.
pub fn resolve_string(ctx: &ContextSnapshot, text: &str) -> Result<Argument, TemplateError> {
  let tokens: Vec<&str> = token_regex()
    .find_iter(text)
    .map(|found| found.as_str())
    .filter(|token| parse_token(token).is_some())
    .collect();
  if tokens.is_empty() {
    return Ok(Argument::Value(Value::String(text.to_string())));
  }
  // A sole token keeps its typed value instead of being stringified.
  if tokens.len() == 1 && text.trim() == tokens[0] {
    return resolve_token(ctx, tokens[0]);
  }
  let replacement = stringify(&resolve_token(ctx, tokens[0])?.to_value());
  let rewritten = text.replace(tokens[0], &replacement);
  // Re-scan after substitution; inner tokens may have formed an outer one.
  if rewritten == text {
    return Ok(Argument::Value(Value::String(rewritten)));
  }
  resolve_string(ctx, &rewritten)
}

fn resolve_token(ctx: &ContextSnapshot, token: &str) -> Result<Argument, TemplateError> {
  let (mode, inner) = match parse_token(token) {
    Some(parsed) => parsed,
    None => return Ok(Argument::Value(Value::String(token.to_string()))),
  };
  // The inner expression may itself contain references.
  let expr = stringify(&resolve_string(ctx, inner)?.to_value());
  match mode {
    Mode::StepResult => {
      let (step, rest) = match expr.split_once('.') {
        Some((step, rest)) => (step.to_string(), Some(rest.to_string())),
        None => (expr, None),
      };
      let path = match rest {
        Some(rest) => format!("{}.result.{}", step, rest),
        None => format!("{}.result", step),
      };
      lookup_path(ctx.steps(), &path).map(Argument::Value)
    }
    Mode::JobVariable => {
      let (name, rest) = match expr.split_once('.') {
        Some((name, rest)) => (name.to_string(), Some(rest.to_string())),
        None => (expr, None),
      };
      if name.starts_with('_') || name.ends_with('_') {
        return Err(TemplateError::ForbiddenKey { key: name });
      }
      let cell = ctx
        .variable(&name)
        .ok_or(TemplateError::UnknownVariable { name })?;
      match rest {
        // A bare variable reference yields the cell itself; the caller
        // decides whether to unwrap it.
        None => Ok(Argument::Variable(cell.clone())),
        Some(rest) => lookup_path(&cell.get(), &rest).map(Argument::Value),
      }
    }
    Mode::JobParameter => lookup_path(ctx.job_parameters(), &expr).map(Argument::Value),
    Mode::RawContext => lookup_path(ctx.data(), &expr).map(Argument::Value),
  }
}

/// Evaluate an if-condition: a string is resolved and coerced to truthiness,
/// a list is the logical AND of its elements, and an absent condition is
/// vacuously true.
pub fn resolve_condition(
  ctx: &ContextSnapshot,
  condition: Option<&Value>,
) -> Result<bool, TemplateError> {
  match condition {
    None | Some(Value::Null) => Ok(true),
    Some(Value::String(text)) => Ok(truthy(&resolve_string(ctx, text)?.to_value())),
    Some(Value::Array(items)) => {
      for item in items {
        if !truthy(&resolve(ctx, item)?.to_value()) {
          return Ok(false);
        }
      }
      Ok(true)
    }
    Some(other) => Ok(truthy(other)),
  }
}
