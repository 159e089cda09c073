//! Fixed classification vocabularies served by the dictionary routes
//! and enforced when offers are created or updated.

pub const TECHNOLOGIES: &[&str] = &[
    "JavaScript",
    "TypeScript",
    "React",
    "Angular",
    "Vue",
    "Node.js",
    "Python",
    "Java",
    "Kotlin",
    "C#",
    "C++",
    "PHP",
    "Ruby",
    "Go",
    "Rust",
    "SQL",
    "AWS",
    "Azure",
    "Docker",
    "Kubernetes",
];

pub const LOCALIZATIONS: &[&str] = &[
    "Remote",
    "Hybrid",
    "Warsaw",
    "Krakow",
    "Wroclaw",
    "Gdansk",
    "Poznan",
    "Berlin",
    "London",
    "Amsterdam",
];

pub const EXPERIENCES: &[&str] = &["Intern", "Junior", "Mid", "Senior", "Lead", "Manager"];

pub const EMPLOYMENT_TYPES: &[&str] = &["Full-time", "Part-time", "Internship", "Freelance"];

pub const CONTRACT_TYPES: &[&str] = &["B2B", "Permanent", "Mandate", "Internship"];

pub const CURRENCIES: &[&str] = &["USD", "EUR", "PLN", "GBP", "CHF"];

/// Case-insensitive membership check against one of the vocabularies.
pub fn is_allowed(list: &[&str], value: &str) -> bool {
    list.iter().any(|entry| entry.eq_ignore_ascii_case(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_ignores_case() {
        assert!(is_allowed(EXPERIENCES, "senior"));
        assert!(is_allowed(CURRENCIES, "eur"));
        assert!(!is_allowed(EXPERIENCES, "Principal"));
    }
}
