use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::query::{Query, Table, data};
use crate::store::{Order, Record, Store, StoreExt};
use crate::types::{Citation, Data};

pub const HEADINGS: [&str; 6] = ["Authors", "Year", "Journal", "Sample Type", "Element", "Link"];

/// Sparse search criteria; an empty list matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilter {
    #[serde(default)]
    pub sample_type: Vec<String>,
    #[serde(default)]
    pub element: Vec<String>,
}

/// DOI and ADS hyperlinks of a citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub doi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ads: Option<String>,
}

impl Link {
    #[must_use]
    pub fn for_citation(citation: &Citation) -> Self {
        let doi = if citation.doi.starts_with("https://") {
            citation.doi.clone()
        } else {
            format!("https://doi.org/{}", citation.doi)
        };
        let ads = (!citation.ads.is_empty()).then(|| citation.ads.clone());
        Self { doi, ads }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRow {
    pub authors: String,
    pub year: i64,
    pub journal: String,
    pub sample_type: String,
    pub element: String,
    pub link: Link,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchTable {
    pub headings: Vec<&'static str>,
    pub rows: Vec<SearchRow>,
}

impl SearchTable {
    /// Headings with no rows, for an empty search form.
    #[must_use]
    pub fn headings_only() -> Self {
        Self {
            headings: HEADINGS.to_vec(),
            rows: Vec::new(),
        }
    }
}

/// Appends `value` unless already present, keeping first-seen order.
fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

/// Runs a search over Data rows.
///
/// With `compress` each matching citation yields one row whose sample types
/// and elements aggregate every Data row of that citation. Without it there
/// is one row per matching Data row.
pub fn get_search(store: &dyn Store, filter: &SearchFilter, compress: bool) -> Result<SearchTable> {
    let matching = |query: Query| -> Result<Query> {
        query
            .filter("sample_type", filter.sample_type.as_slice())?
            .filter("element", filter.element.as_slice())
    };

    let matches: Vec<Data> = store.get_all(&matching(Data::query())?.order_by(data::ID, Order::Asc))?;

    // Citations are joined through their Data rows rather than listed by id.
    let citations: HashMap<i64, Citation> = store
        .get_all::<Citation>(&matching(Data::query().select(Table::Citation).distinct())?)?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut rows = Vec::new();
    if compress {
        let mut seen = HashSet::new();
        let order: Vec<i64> = matches
            .iter()
            .map(|row| row.citation_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let all: Vec<Data> = if filter.sample_type.is_empty() && filter.element.is_empty() {
            matches
        } else {
            store.get_all(&Data::query().order_by(data::ID, Order::Asc))?
        };
        let mut grouped: HashMap<i64, (Vec<String>, Vec<String>)> = HashMap::new();
        for row in all.iter().filter(|r| citations.contains_key(&r.citation_id)) {
            let (sample_types, elements) = grouped.entry(row.citation_id).or_default();
            push_unique(sample_types, &row.sample_type);
            push_unique(elements, &row.element);
        }

        for id in &order {
            let (Some(citation), Some((sample_types, elements))) = (citations.get(id), grouped.get(id))
            else {
                continue;
            };
            rows.push(search_row(citation, sample_types.join(", "), elements.join(", ")));
        }
    } else {
        for row in &matches {
            if let Some(citation) = citations.get(&row.citation_id) {
                rows.push(search_row(citation, row.sample_type.clone(), row.element.clone()));
            }
        }
    }

    Ok(SearchTable {
        headings: HEADINGS.to_vec(),
        rows,
    })
}

fn search_row(citation: &Citation, sample_type: String, element: String) -> SearchRow {
    SearchRow {
        authors: citation.authors.clone(),
        year: citation.year,
        journal: citation.journal.clone(),
        sample_type,
        element,
        link: Link::for_citation(citation),
    }
}
