//! Tokenizes raw search parameter occurrences into search terms.
//!
//! Each occurrence is one term. `field:value` scopes the term to a dotted field path
//! (`course.name:science`); anything else is an unscoped free-text value. A colon inside
//! double quotes is not a separator, and one pair of surrounding quotes is stripped from
//! the value.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchTerm {
    pub raw: String,
    /// Dotted path split into segments; `None` for unscoped terms.
    pub field_path: Option<Vec<String>>,
    pub value: String,
}

impl SearchTerm {
    pub fn is_scoped(&self) -> bool {
        self.field_path.is_some()
    }
}

/// Parse one occurrence. Blank occurrences and scoped terms with an empty value yield `None`.
pub fn parse_term(raw: &str) -> Option<SearchTerm> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return None;
    }
    if let Some(idx) = top_level_separator(candidate) {
        let field = candidate[..idx].trim();
        if !field.is_empty() {
            let value = unquote(candidate[idx + 1..].trim());
            if value.is_empty() {
                return None;
            }
            return Some(SearchTerm {
                raw: raw.to_string(),
                field_path: Some(field.split('.').map(|s| s.trim().to_string()).collect()),
                value: value.to_string(),
            });
        }
    }
    let value = unquote(candidate);
    if value.is_empty() {
        return None;
    }
    Some(SearchTerm {
        raw: raw.to_string(),
        field_path: None,
        value: value.to_string(),
    })
}

/// Parse every occurrence; terms combine with AND.
pub fn parse_terms<I, S>(occurrences: I) -> Vec<SearchTerm>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    occurrences.into_iter().filter_map(|s| parse_term(s.as_ref())).collect()
}

/// Values of every occurrence of `param` in an ordered query-pair list.
pub fn occurrences<'a>(query: &'a [(String, String)], param: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    query.iter().filter(move |(k, _)| k == param).map(|(_, v)| v.as_str())
}

fn top_level_separator(s: &str) -> Option<usize> {
    let mut quoted = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ':' if !quoted => return Some(i),
            _ => {}
        }
    }
    None
}

fn unquote(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscoped_term() {
        let t = parse_term("gmail.com").unwrap();
        assert_eq!(t.field_path, None);
        assert_eq!(t.value, "gmail.com");
    }

    #[test]
    fn single_segment_scope() {
        let t = parse_term("email:james").unwrap();
        assert_eq!(t.field_path, Some(vec!["email".to_string()]));
        assert_eq!(t.value, "james");
    }

    #[test]
    fn nested_scope_keeps_segment_order() {
        let t = parse_term("course.requiredTextbook.name:algebra").unwrap();
        assert_eq!(
            t.field_path,
            Some(vec!["course".to_string(), "requiredTextbook".to_string(), "name".to_string()])
        );
        assert_eq!(t.value, "algebra");
    }

    #[test]
    fn value_keeps_later_colons() {
        let t = parse_term("url:http://example.com").unwrap();
        assert_eq!(t.value, "http://example.com");
    }

    #[test]
    fn empty_field_is_unscoped() {
        let t = parse_term(":james").unwrap();
        assert!(!t.is_scoped());
        assert_eq!(t.value, ":james");
    }

    #[test]
    fn quoted_colon_is_not_a_separator() {
        let t = parse_term("\"12:30\"").unwrap();
        assert!(!t.is_scoped());
        assert_eq!(t.value, "12:30");
        let t = parse_term("name:\"Jane Smith\"").unwrap();
        assert_eq!(t.value, "Jane Smith");
    }

    #[test]
    fn blank_and_valueless_terms_are_dropped() {
        assert!(parse_term("").is_none());
        assert!(parse_term("   ").is_none());
        assert!(parse_term("email:").is_none());
    }

    #[test]
    fn occurrences_preserve_order() {
        let query = vec![
            ("q".to_string(), "course.name:science".to_string()),
            ("limit".to_string(), "10".to_string()),
            ("q".to_string(), "Jane".to_string()),
        ];
        let terms = parse_terms(occurrences(&query, "q"));
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[1].value, "Jane");
    }
}
