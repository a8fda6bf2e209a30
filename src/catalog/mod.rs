//! Read models built on the store: search results, citation labels,
//! form choices and edit history.

mod history;
mod listing;
mod search;

pub use history::{HISTORY_HEADINGS, HistoryRow, all_edits, item_history};
pub use listing::{
    Choice, LISTING_HEADINGS, ListingRow, citation_choices, citation_label, distinct_values,
    edit_listing,
};
pub use search::{HEADINGS, Link, SearchFilter, SearchRow, SearchTable, get_search};
