//! Name normalisation for relation and attribute lookup: `requiredTextbook`, `required_textbooks`
//! and `RequiredTextbooks` all name the same relation.

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "requiredTextbook" -> "required_textbook", "courseId" -> "course_id"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c == '-' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

/// Best-effort English singular of a lower-case word.
pub fn singularize(word: &str) -> String {
    if word.len() > 3 && word.ends_with("ies") {
        return format!("{}y", &word[..word.len() - 3]);
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.len() > 1 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Comparison key: snake_case, separators removed, singular.
pub fn name_key(s: &str) -> String {
    let snake = to_snake_case(s.trim());
    let compact: String = snake.chars().filter(|c| *c != '_').collect();
    singularize(&compact)
}

/// True when two names refer to the same relation regardless of case, separator style or number.
pub fn same_relation_name(a: &str, b: &str) -> bool {
    name_key(a) == name_key(b)
}

/// Attribute names match case-insensitively and snake/camel agnostic, but never across number.
pub fn same_attribute_name(a: &str, b: &str) -> bool {
    let norm = |s: &str| -> String { to_snake_case(s).chars().filter(|c| *c != '_').collect() };
    norm(a) == norm(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_from_camel() {
        assert_eq!(to_snake_case("requiredTextbook"), "required_textbook");
        assert_eq!(to_snake_case("course_id"), "course_id");
        assert_eq!(to_snake_case("Course"), "course");
    }

    #[test]
    fn singular_forms() {
        assert_eq!(singularize("courses"), "course");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("address"), "address");
        assert_eq!(singularize("status"), "status");
    }

    #[test]
    fn relation_names_match_across_styles() {
        assert!(same_relation_name("course", "courses"));
        assert!(same_relation_name("requiredTextbook", "required_textbooks"));
        assert!(same_relation_name("COURSES", "course"));
        assert!(!same_relation_name("course", "student"));
    }

    #[test]
    fn attribute_names_do_not_match_across_number() {
        assert!(same_attribute_name("createdAt", "created_at"));
        assert!(same_attribute_name("EMAIL", "email"));
        assert!(!same_attribute_name("names", "name"));
    }
}
