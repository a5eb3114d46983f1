//! Filtered, sorted and counted listings shared by every list endpoint.
//!
//! A [`PageRequest`] is resolved once from the raw query string and then
//! rendered twice against the same predicate set: a paged `SELECT` and an
//! unpaged `COUNT(*)`. The in-memory store evaluates the very same request
//! through [`PageRequest::apply`].

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Raw list parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub order_by: Option<String>,
    pub order_direction: Option<SortDirection>,
}

impl PaginationQuery {
    pub fn page(&self) -> u32 {
        self.page
            .map(|p| p.clamp(1, u32::MAX as i64) as u32)
            .unwrap_or(DEFAULT_PAGE)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .map(|l| l.clamp(1, MAX_LIMIT as i64) as u32)
            .unwrap_or(DEFAULT_LIMIT)
    }
}

/// Static description of a listable table.
#[derive(Debug)]
pub struct Listing {
    pub table: &'static str,
    pub search_columns: &'static [&'static str],
    pub sort_columns: &'static [&'static str],
    pub default_sort: &'static str,
}

impl Listing {
    /// Unknown or missing columns fall back to the default sort column.
    pub fn resolve_sort(&self, requested: Option<&str>) -> &'static str {
        requested
            .map(str::trim)
            .and_then(|wanted| self.sort_columns.iter().find(|c| **c == wanted))
            .copied()
            .unwrap_or(self.default_sort)
    }
}

pub static USER_LISTING: Listing = Listing {
    table: "app_user",
    search_columns: &["full_name", "email", "phone_number"],
    sort_columns: &["created_at", "full_name", "email"],
    default_sort: "created_at",
};

pub static FILE_LISTING: Listing = Listing {
    table: "file",
    search_columns: &["file_path"],
    sort_columns: &["created_at", "file_path", "size"],
    default_sort: "created_at",
};

pub static EVENT_LISTING: Listing = Listing {
    table: "event",
    search_columns: &["name", "description"],
    sort_columns: &["created_at", "name", "date"],
    default_sort: "created_at",
};

/// Many-to-many join table used to filter owners by linked ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTable {
    pub table: &'static str,
    pub owner_column: &'static str,
    pub target_column: &'static str,
}

pub const EVENT_CATEGORY_LINK: LinkTable = LinkTable {
    table: "event_category",
    owner_column: "event_id",
    target_column: "category_id",
};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive substring match on any searchable column.
    Search(String),
    /// Column value is one of `values`.
    AnyOf {
        column: &'static str,
        values: Vec<String>,
    },
    /// Row is linked through `link` to at least one of `ids`.
    LinkedTo { link: LinkTable, ids: Vec<Uuid> },
}

/// Comparable value of a row in its sort column. `Null` sorts after every
/// value, matching Postgres' default `NULLS LAST` for ascending order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
    Null,
}

/// A row that can be listed by the in-memory evaluator.
pub trait Record {
    fn id(&self) -> Uuid;
    fn text(&self, column: &str) -> Option<&str>;
    fn sort_key(&self, column: &str) -> SortKey;
}

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub listing: &'static Listing,
    pub page: u32,
    pub limit: u32,
    pub sort_column: &'static str,
    pub direction: SortDirection,
    pub predicates: Vec<Predicate>,
}

impl PageRequest {
    pub fn new(listing: &'static Listing, query: &PaginationQuery) -> Self {
        let mut predicates = Vec::new();
        if let Some(term) = query.search.as_deref().map(str::trim) {
            if !term.is_empty() {
                predicates.push(Predicate::Search(term.to_string()));
            }
        }

        Self {
            listing,
            page: query.page(),
            limit: query.limit(),
            sort_column: listing.resolve_sort(query.order_by.as_deref()),
            direction: query.order_direction.unwrap_or_default(),
            predicates,
        }
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    pub fn build_select(&self) -> QueryBuilder<'static, Postgres> {
        let table = self.listing.table;
        let mut qb = QueryBuilder::new(format!("SELECT {table}.* FROM {table}"));
        self.push_filters(&mut qb);
        qb.push(format!(
            " ORDER BY {table}.{} {}, {table}.id ASC",
            self.sort_column,
            self.direction.as_sql()
        ));
        qb.push(" LIMIT ").push_bind(self.limit as i64);
        qb.push(" OFFSET ").push_bind(self.offset());
        qb
    }

    pub fn build_count(&self) -> QueryBuilder<'static, Postgres> {
        let table = self.listing.table;
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {table}"));
        self.push_filters(&mut qb);
        qb
    }

    fn push_filters(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        let table = self.listing.table;
        for (i, predicate) in self.predicates.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            match predicate {
                Predicate::Search(term) => {
                    let pattern = like_pattern(term);
                    qb.push("(");
                    for (j, column) in self.listing.search_columns.iter().enumerate() {
                        if j > 0 {
                            qb.push(" OR ");
                        }
                        qb.push(format!("{table}.{column} ILIKE "));
                        qb.push_bind(pattern.clone());
                    }
                    qb.push(")");
                }
                Predicate::AnyOf { column, values } => {
                    qb.push(format!("{table}.{column} = ANY("));
                    qb.push_bind(values.clone());
                    qb.push(")");
                }
                Predicate::LinkedTo { link, ids } => {
                    qb.push(format!(
                        "{table}.id IN (SELECT {} FROM {} WHERE {} = ANY(",
                        link.owner_column, link.table, link.target_column
                    ));
                    qb.push_bind(ids.clone());
                    qb.push("))");
                }
            }
        }
    }

    /// Evaluates the request over in-memory rows. `linked(link, row_id, ids)`
    /// answers [`Predicate::LinkedTo`].
    pub fn apply<'a, T, I, F>(&self, rows: I, linked: F) -> (Vec<T>, i64)
    where
        T: Record + Clone + 'a,
        I: IntoIterator<Item = &'a T>,
        F: Fn(&LinkTable, Uuid, &[Uuid]) -> bool,
    {
        let mut matching: Vec<&T> = rows
            .into_iter()
            .filter(|row| self.matches(*row, &linked))
            .collect();
        let total = matching.len() as i64;

        matching.sort_by(|a, b| self.compare(*a, *b));

        let list = matching
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .cloned()
            .collect();
        (list, total)
    }

    fn matches<T, F>(&self, row: &T, linked: &F) -> bool
    where
        T: Record,
        F: Fn(&LinkTable, Uuid, &[Uuid]) -> bool,
    {
        self.predicates.iter().all(|predicate| match predicate {
            Predicate::Search(term) => {
                let needle = term.to_lowercase();
                self.listing.search_columns.iter().any(|column| {
                    row.text(column)
                        .map(|value| value.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
            }
            Predicate::AnyOf { column, values } => row
                .text(column)
                .map(|value| values.iter().any(|v| v == value))
                .unwrap_or(false),
            Predicate::LinkedTo { link, ids } => linked(link, row.id(), ids),
        })
    }

    fn compare<T: Record>(&self, a: &T, b: &T) -> Ordering {
        let primary = a
            .sort_key(self.sort_column)
            .cmp(&b.sort_key(self.sort_column));
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id().cmp(&b.id()))
    }
}

/// Escapes LIKE wildcards so the term is matched literally.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub fn total_pages(total: i64, limit: u32) -> i64 {
    if limit == 0 {
        return 0;
    }
    let limit = limit as i64;
    (total + limit - 1) / limit
}

/// One page of a listing: `{list, total, total_page}`.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub list: Vec<T>,
    pub total: i64,
    pub total_page: i64,
}

impl<T> Paginated<T> {
    pub fn new(list: Vec<T>, total: i64, limit: u32) -> Self {
        Self {
            list,
            total,
            total_page: total_pages(total, limit),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            list: self.list.into_iter().map(f).collect(),
            total: self.total,
            total_page: self.total_page,
        }
    }
}
