/// Separator between the components of a person name (family^given^...).
pub const COMPONENT_SEPARATOR: char = '^';

/// Separator between the alphabetic, ideographic and phonetic groups.
pub const GROUP_SEPARATOR: char = '=';

/// Strip empty trailing components and groups from a DICOM person name.
///
/// `SMITH^JOHN^^^` becomes `SMITH^JOHN` and `SMITH^^=^` becomes `SMITH`, so
/// an exact match is not defeated by padding the sender left in place.
pub fn clean_person_name(name: &str) -> String {
    let mut groups: Vec<&str> = name
        .split(GROUP_SEPARATOR)
        .map(|group| group.trim_end_matches(COMPONENT_SEPARATOR))
        .collect();

    while groups.len() > 1 && groups.last().is_some_and(|g| g.is_empty()) {
        groups.pop();
    }

    groups.join(&GROUP_SEPARATOR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_components() {
        assert_eq!(clean_person_name("SMITH^JOHN^^^"), "SMITH^JOHN");
        assert_eq!(clean_person_name("SMITH^JOHN"), "SMITH^JOHN");
    }

    #[test]
    fn test_trailing_groups() {
        assert_eq!(clean_person_name("SMITH^^=^"), "SMITH");
        assert_eq!(clean_person_name("SMITH^J=YAMADA^^"), "SMITH^J=YAMADA");
    }

    #[test]
    fn test_inner_empty_components_kept() {
        assert_eq!(clean_person_name("SMITH^^MR"), "SMITH^^MR");
        assert_eq!(clean_person_name(""), "");
        assert_eq!(clean_person_name("^^"), "");
    }
}
