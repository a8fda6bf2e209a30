use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::store::query::{Column, citation};
use crate::store::{Order, Query, Record, Store, StoreExt};
use crate::types::{Citation, Data};

/// Short author list: `A`, `A & B` or `A, et al.`.
fn short_authors(authors: &str) -> String {
    let names: Vec<&str> = authors.split(';').map(str::trim).collect();
    match names.as_slice() {
        [first, second] => format!("{first} & {second}"),
        [first, _, _, ..] => format!("{first}, et al."),
        [first] => (*first).to_string(),
        [] => String::new(),
    }
}

/// `"{year} - {authors} - {journal} (doi:{doi})"`
#[must_use]
pub fn citation_label(citation: &Citation) -> String {
    format!(
        "{} - {} - {} (doi:{})",
        citation.year,
        short_authors(&citation.authors),
        citation.journal,
        citation.doi
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub id: i64,
    pub label: String,
}

/// Labelled citations sorted by year, authors and journal. With `id` the
/// list holds at most that citation.
pub fn citation_choices(store: &dyn Store, id: Option<i64>) -> Result<Vec<Choice>> {
    let query = Citation::query().matching(citation::ID, id);
    let mut citations: Vec<Citation> = store.get_all(&query)?;
    citations.sort_by(|a, b| {
        (a.year, &a.authors, &a.journal).cmp(&(b.year, &b.authors, &b.journal))
    });

    Ok(citations
        .iter()
        .map(|c| Choice {
            id: c.id,
            label: citation_label(c),
        })
        .collect())
}

/// Distinct values of a text column, sorted.
pub fn distinct_values(store: &dyn Store, column: Column) -> Result<Vec<String>> {
    let query = Query::new(column.table)
        .select(column)
        .distinct()
        .order_by(column, Order::Asc);
    store.get_strings(&query)
}

pub const LISTING_HEADINGS: [&str; 5] = ["Citation Id", "Citation", "Data Id", "Sample Type", "Element"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRow {
    pub citation_id: i64,
    pub citation: String,
    pub data_id: i64,
    pub sample_type: String,
    pub element: String,
}

/// Every Data row next to the label of its citation.
pub fn edit_listing(store: &dyn Store) -> Result<Vec<ListingRow>> {
    let labels: HashMap<i64, String> = store
        .get_all::<Citation>(&Citation::query())?
        .iter()
        .map(|c| (c.id, citation_label(c)))
        .collect();

    let rows: Vec<Data> = store.get_all(&Data::query())?;
    Ok(rows
        .into_iter()
        .map(|row| ListingRow {
            citation_id: row.citation_id,
            citation: labels.get(&row.citation_id).cloned().unwrap_or_default(),
            data_id: row.id,
            sample_type: row.sample_type,
            element: row.element,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::store::query::data;
    use crate::types::{NewCitation, NewData, NewUser, Role};
    use tempfile::TempDir;

    fn citation(authors: &str, year: i64) -> Citation {
        Citation {
            id: 1,
            creator_id: 1,
            authors: authors.to_string(),
            year,
            journal: "ApJ".to_string(),
            doi: "10.1/x".to_string(),
            ads: String::new(),
        }
    }

    #[test]
    fn test_citation_labels() {
        assert_eq!(
            citation_label(&citation("Smith, J", 2020)),
            "2020 - Smith, J - ApJ (doi:10.1/x)"
        );
        assert_eq!(
            citation_label(&citation("Smith, J; Jones, K", 2020)),
            "2020 - Smith, J & Jones, K - ApJ (doi:10.1/x)"
        );
        assert_eq!(
            citation_label(&citation("Smith, J; Jones, K; Lee, M", 2020)),
            "2020 - Smith, J, et al. - ApJ (doi:10.1/x)"
        );
    }

    #[test]
    fn test_choices_sorted_and_distinct_values() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        let user = store
            .create_user(
                &NewUser {
                    name: "a".to_string(),
                    email: "a@test.com".to_string(),
                    password_hash: "hash".to_string(),
                },
                Role::Verified,
            )
            .unwrap();

        let mut ids = Vec::new();
        for (year, doi) in [(2021, "10.1/b"), (2019, "10.1/a")] {
            let c = store
                .create_citation(
                    &user,
                    &NewCitation {
                        creator_id: user.id,
                        authors: "Smith, J".to_string(),
                        year,
                        journal: "GCA".to_string(),
                        doi: doi.to_string(),
                        ads: String::new(),
                    },
                )
                .unwrap();
            ids.push(c.id);
        }
        store
            .create_data(
                &user,
                &[
                    NewData {
                        citation_id: ids[0],
                        creator_id: user.id,
                        sample_type: "Wholerock".to_string(),
                        element: "Ru".to_string(),
                    },
                    NewData {
                        citation_id: ids[0],
                        creator_id: user.id,
                        sample_type: "Meteorite".to_string(),
                        element: "Ru".to_string(),
                    },
                ],
            )
            .unwrap();

        let choices = citation_choices(&store, None).unwrap();
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0].id, ids[1]);

        let one = citation_choices(&store, Some(ids[0])).unwrap();
        assert_eq!(one.len(), 1);

        assert_eq!(
            distinct_values(&store, data::SAMPLE_TYPE).unwrap(),
            vec!["Meteorite", "Wholerock"]
        );
        assert_eq!(distinct_values(&store, data::ELEMENT).unwrap(), vec!["Ru"]);
        assert_eq!(
            distinct_values(&store, citation::JOURNAL).unwrap(),
            vec!["GCA"]
        );

        let listing = edit_listing(&store).unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].citation, "2021 - Smith, J - GCA (doi:10.1/b)");
    }
}
