//! Dotted key-path lookup with index and slice segments.

use serde_json::Value;

use crate::error::TemplateError;

/// A `start:stop:step` slice segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceSpec {
  pub start: Option<i64>,
  pub stop: Option<i64>,
  pub step: Option<i64>,
}

/// Parse a slice segment. Returns `None` unless the segment contains a colon
/// and every non-empty part is an integer.
pub fn parse_slice(segment: &str) -> Option<SliceSpec> {
  if !segment.contains(':') {
    return None;
  }
  let mut parts = segment.split(':');
  let mut next = || -> Option<Option<i64>> {
    match parts.next() {
      None => Some(None),
      Some("") => Some(None),
      Some(text) => text.parse::<i64>().ok().map(Some),
    }
  };
  let start = next()?;
  let stop = next()?;
  let step = next()?;
  if parts.next().is_some() {
    return None;
  }
  Some(SliceSpec { start, stop, step })
}

impl SliceSpec {
  /// The element indices this slice selects out of a sequence of `len`
  /// items, with negative-index wrapping and clamping.
  pub fn indices(&self, len: usize) -> Vec<usize> {
    let len = len as i64;
    let step = self.step.unwrap_or(1);
    if step == 0 {
      return Vec::new();
    }
    let clamp = |idx: i64, upper: i64| -> i64 {
      let idx = if idx < 0 { idx + len } else { idx };
      idx.clamp(if step < 0 { -1 } else { 0 }, upper)
    };
    let (start, stop) = if step > 0 {
      (
        clamp(self.start.unwrap_or(0), len),
        clamp(self.stop.unwrap_or(len), len),
      )
    } else {
      (
        clamp(self.start.unwrap_or(len - 1), len - 1),
        clamp(self.stop.unwrap_or(-len - 1), len - 1),
      )
    };
    let mut indices = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
      if (0..len).contains(&current) {
        indices.push(current as usize);
      }
      current += step;
    }
    indices
  }
}

fn guard_segment(segment: &str) -> Result<(), TemplateError> {
  if segment.starts_with('_') || segment.ends_with('_') {
    return Err(TemplateError::ForbiddenKey {
      key: segment.to_string(),
    });
  }
  Ok(())
}

fn index_value(value: &Value, index: usize, segment: &str) -> Result<Value, TemplateError> {
  match value {
    Value::Array(items) => items
      .get(index)
      .cloned()
      .ok_or(TemplateError::IndexOutOfRange {
        index,
        len: items.len(),
      }),
    Value::String(text) => {
      let chars: Vec<char> = text.chars().collect();
      chars
        .get(index)
        .map(|c| Value::String(c.to_string()))
        .ok_or(TemplateError::IndexOutOfRange {
          index,
          len: chars.len(),
        })
    }
    _ => Err(TemplateError::NotIndexable {
      segment: segment.to_string(),
    }),
  }
}

fn slice_value(value: &Value, spec: SliceSpec) -> Option<Value> {
  match value {
    Value::Array(items) => Some(Value::Array(
      spec
        .indices(items.len())
        .into_iter()
        .map(|i| items[i].clone())
        .collect(),
    )),
    Value::String(text) => {
      let chars: Vec<char> = text.chars().collect();
      Some(Value::String(
        spec.indices(chars.len()).into_iter().map(|i| chars[i]).collect(),
      ))
    }
    _ => None,
  }
}

/// Walk a dotted key path into a value.
///
/// Numeric segments index lists and strings, `start:stop:step` segments
/// slice them, and anything else is a map-key lookup. Segments starting or
/// ending with an underscore are rejected outright.
pub fn lookup_path(root: &Value, path: &str) -> Result<Value, TemplateError> {
  let mut current = root.clone();
  for segment in path.split('.') {
    guard_segment(segment)?;
    let is_sequence = matches!(current, Value::Array(_) | Value::String(_));
    if is_sequence && !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
      current = index_value(&current, segment.parse::<usize>().unwrap_or(usize::MAX), segment)?;
    } else if let (true, Some(spec)) = (is_sequence, parse_slice(segment)) {
      current = slice_value(&current, spec).ok_or_else(|| TemplateError::NotIndexable {
        segment: segment.to_string(),
      })?;
    } else if let Value::Object(map) = &current {
      current = map
        .get(segment)
        .cloned()
        .ok_or_else(|| TemplateError::KeyNotFound {
          key: segment.to_string(),
        })?;
    } else {
      return Err(TemplateError::NotIndexable {
        segment: segment.to_string(),
      });
    }
  }
  Ok(current)
}
