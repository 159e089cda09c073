use rust_decimal::Decimal;

/// One variant per supported listing filter. Values are already split
/// and trimmed; empty filters produce no SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum OfferFilter {
    EmploymentTypes(Vec<String>),
    Localizations(Vec<String>),
    Experiences(Vec<String>),
    Technologies(Vec<String>),
    ContractTypes(Vec<String>),
    Keyword(String),
    MinSalary(Decimal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfferSort {
    #[default]
    Latest,
    SalaryAsc,
    SalaryDesc,
}

impl OfferSort {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "latest" => Some(OfferSort::Latest),
            "salary_asc" => Some(OfferSort::SalaryAsc),
            "salary_desc" => Some(OfferSort::SalaryDesc),
            _ => None,
        }
    }

    pub fn order_clause(&self) -> &'static str {
        match self {
            OfferSort::Latest => "created_at DESC",
            OfferSort::SalaryAsc => "min_salary ASC",
            OfferSort::SalaryDesc => "max_salary DESC",
        }
    }
}

/// A value waiting to be bound to a positional placeholder. Keeps the
/// SQL text and its arguments in one place so clause generation and
/// binding cannot drift apart.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    TextArray(Vec<String>),
    Salary(Decimal),
}

#[derive(Debug, Clone, Default)]
pub struct OfferPredicate {
    pub clauses: Vec<String>,
    pub binds: Vec<BindValue>,
}

impl OfferPredicate {
    /// Always non-empty: the visibility clauses are unconditional.
    pub fn where_clause(&self) -> String {
        format!("WHERE {}", self.clauses.join(" AND "))
    }

    pub fn next_placeholder(&self) -> usize {
        self.binds.len() + 1
    }
}

/// Builds the WHERE clause for the public listing. Visibility comes
/// first: soft-deleted and unpaid offers never appear regardless of
/// what the client asked for.
pub fn build_predicate(filters: &[OfferFilter]) -> OfferPredicate {
    let mut predicate = OfferPredicate::default();
    predicate.clauses.push("is_deleted = FALSE".to_string());
    predicate.clauses.push("is_paid = TRUE".to_string());

    for filter in filters {
        match filter {
            OfferFilter::EmploymentTypes(values) => {
                any_of(&mut predicate, "employment_type", values);
            }
            OfferFilter::Localizations(values) => {
                any_of(&mut predicate, "localization", values);
            }
            OfferFilter::Experiences(values) => {
                any_of(&mut predicate, "experience", values);
            }
            OfferFilter::ContractTypes(values) => {
                any_of(&mut predicate, "contract_type", values);
            }
            OfferFilter::Technologies(values) => {
                if !values.is_empty() {
                    let placeholder = predicate.next_placeholder();
                    predicate
                        .clauses
                        .push(format!("technologies && ${}", placeholder));
                    predicate.binds.push(BindValue::TextArray(values.clone()));
                }
            }
            OfferFilter::Keyword(keyword) => {
                let keyword = keyword.trim();
                if !keyword.is_empty() {
                    let first = predicate.next_placeholder();
                    let second = first + 1;
                    predicate
                        .clauses
                        .push(format!("(title ILIKE ${} OR content ILIKE ${})", first, second));
                    let pattern = format!("%{}%", escape_like(keyword));
                    predicate.binds.push(BindValue::Text(pattern.clone()));
                    predicate.binds.push(BindValue::Text(pattern));
                }
            }
            OfferFilter::MinSalary(min) => {
                let placeholder = predicate.next_placeholder();
                predicate
                    .clauses
                    .push(format!("min_salary >= ${}", placeholder));
                predicate.binds.push(BindValue::Salary(*min));
            }
        }
    }

    predicate
}

fn any_of(predicate: &mut OfferPredicate, column: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    let placeholder = predicate.next_placeholder();
    predicate
        .clauses
        .push(format!("{} = ANY(${})", column, placeholder));
    predicate.binds.push(BindValue::TextArray(values.to_vec()));
}

/// `%` and `_` are LIKE wildcards and backslash is its escape
/// character; a keyword must match all three literally.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Splits a comma-separated query value into trimmed, non-empty parts.
pub fn parse_multi(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_filters_yields_visibility_clauses_only() {
        let predicate = build_predicate(&[]);

        assert_eq!(
            predicate.where_clause(),
            "WHERE is_deleted = FALSE AND is_paid = TRUE"
        );
        assert!(predicate.binds.is_empty());
    }

    #[test]
    fn category_filter_uses_any_with_first_placeholder() {
        let filters = vec![OfferFilter::EmploymentTypes(vec!["Full-time".to_string()])];
        let predicate = build_predicate(&filters);

        assert_eq!(
            predicate.clauses.last().unwrap(),
            "employment_type = ANY($1)"
        );
        assert_eq!(
            predicate.binds,
            vec![BindValue::TextArray(vec!["Full-time".to_string()])]
        );
    }

    #[test]
    fn empty_values_produce_no_clause() {
        let filters = vec![
            OfferFilter::EmploymentTypes(vec![]),
            OfferFilter::Technologies(vec![]),
            OfferFilter::Keyword("   ".to_string()),
        ];
        let predicate = build_predicate(&filters);

        assert_eq!(predicate.clauses.len(), 2);
        assert!(predicate.binds.is_empty());
    }

    #[test]
    fn technologies_use_array_overlap() {
        let filters = vec![OfferFilter::Technologies(vec![
            "Rust".to_string(),
            "Go".to_string(),
        ])];
        let predicate = build_predicate(&filters);

        assert_eq!(predicate.clauses.last().unwrap(), "technologies && $1");
    }

    #[test]
    fn keyword_matches_title_and_content_with_two_binds() {
        let filters = vec![OfferFilter::Keyword("backend".to_string())];
        let predicate = build_predicate(&filters);

        assert_eq!(
            predicate.clauses.last().unwrap(),
            "(title ILIKE $1 OR content ILIKE $2)"
        );
        assert_eq!(
            predicate.binds,
            vec![
                BindValue::Text("%backend%".to_string()),
                BindValue::Text("%backend%".to_string()),
            ]
        );
    }

    #[test]
    fn keyword_wildcards_are_escaped_to_literals() {
        let predicate = build_predicate(&[OfferFilter::Keyword("100%_done".to_string())]);

        assert_eq!(
            predicate.binds,
            vec![
                BindValue::Text("%100\\%\\_done%".to_string()),
                BindValue::Text("%100\\%\\_done%".to_string()),
            ]
        );

        let predicate = build_predicate(&[OfferFilter::Keyword("C:\\nginx".to_string())]);
        assert_eq!(
            predicate.binds,
            vec![
                BindValue::Text("%C:\\\\nginx%".to_string()),
                BindValue::Text("%C:\\\\nginx%".to_string()),
            ]
        );
    }

    #[test]
    fn placeholders_stay_sequential_across_filters() {
        let filters = vec![
            OfferFilter::Localizations(vec!["Remote".to_string()]),
            OfferFilter::Keyword("rust".to_string()),
            OfferFilter::MinSalary(Decimal::new(12_000, 0)),
        ];
        let predicate = build_predicate(&filters);

        assert_eq!(
            predicate.clauses,
            vec![
                "is_deleted = FALSE".to_string(),
                "is_paid = TRUE".to_string(),
                "localization = ANY($1)".to_string(),
                "(title ILIKE $2 OR content ILIKE $3)".to_string(),
                "min_salary >= $4".to_string(),
            ]
        );
        assert_eq!(predicate.binds.len(), 4);
        assert_eq!(predicate.next_placeholder(), 5);
    }

    #[test]
    fn sort_keys_parse_and_map_to_order_clauses() {
        assert_eq!(OfferSort::parse("latest"), Some(OfferSort::Latest));
        assert_eq!(OfferSort::parse("salary_asc"), Some(OfferSort::SalaryAsc));
        assert_eq!(OfferSort::parse("salary_desc"), Some(OfferSort::SalaryDesc));
        assert_eq!(OfferSort::parse("oldest"), None);

        assert_eq!(OfferSort::Latest.order_clause(), "created_at DESC");
        assert_eq!(OfferSort::SalaryAsc.order_clause(), "min_salary ASC");
        assert_eq!(OfferSort::SalaryDesc.order_clause(), "max_salary DESC");
    }

    #[test]
    fn multi_values_split_on_commas() {
        assert_eq!(
            parse_multi("Remote, Warsaw ,,Berlin "),
            vec!["Remote".to_string(), "Warsaw".to_string(), "Berlin".to_string()]
        );
        assert!(parse_multi("  ,").is_empty());
    }
}
