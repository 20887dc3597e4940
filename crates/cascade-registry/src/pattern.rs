//! Display-name parsing and wildcard matching.

use regex::Regex;

/// Split a display name into `(category, name)`.
///
/// The category is everything before the first dot; names without a dot have
/// no category.
pub fn parse_display_name(display_name: &str) -> (Option<String>, String) {
  match display_name.split_once('.') {
    Some((category, name)) => (Some(category.to_string()), name.to_string()),
    None => (None, display_name.to_string()),
  }
}

/// Join a category and name back into a display name.
pub fn make_display_name(category: Option<&str>, name: &str) -> String {
  match category {
    Some(category) => format!("{}.{}", category, name),
    None => name.to_string(),
  }
}

/// Check if `item` matches a wildcard pattern.
///
/// `*` matches one or more characters, `?` matches a single character. In
/// strict mode the pattern must cover the whole string, so `"FOO?"` does not
/// match `"FOOBAR"`; non-strict mode only requires a match at the start.
pub fn pattern_match(item: &str, pattern: &str, strict: bool) -> bool {
  let mut translated = String::with_capacity(pattern.len() + 8);
  translated.push('^');
  for ch in pattern.chars() {
    match ch {
      '*' => translated.push_str(".+"),
      '?' => translated.push('.'),
      _ => translated.push_str(&regex::escape(&ch.to_string())),
    }
  }
  let Ok(re) = Regex::new(&translated) else {
    return false;
  };
  match re.find(item) {
    Some(found) if strict => found.as_str() == item,
    Some(_) => true,
    None => false,
  }
}
