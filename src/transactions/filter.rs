//! Query-string parsing, the shared WHERE-clause compiler and page metadata.
//!
//! List, count and all three summary queries are built from the same
//! [`CompiledFilter`], so they always describe the same set of rows.

use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date, Duration, OffsetDateTime, Time};
use uuid::Uuid;

use crate::error::{AppError, Result};

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PER_PAGE: i64 = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub creator: Option<Uuid>,
    pub search: Option<String>,
    /// Inclusive.
    pub date_from: Option<OffsetDateTime>,
    /// Exclusive.
    pub date_to: Option<OffsetDateTime>,
    pub currency: Option<String>,
    pub min_amount: Option<f64>,
    /// 1..=12, evaluated in UTC.
    pub month: Option<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    Receiver,
    Payer,
    Amount,
    Currency,
    #[default]
    Date,
}

impl SortKey {
    /// Unknown keys sort by date.
    pub fn parse(value: &str) -> Self {
        match value {
            "receiver" => SortKey::Receiver,
            "payer" => SortKey::Payer,
            "amount" => SortKey::Amount,
            "currency" => SortKey::Currency,
            _ => SortKey::Date,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SortKey::Receiver => "receiver_name",
            SortKey::Payer => "payer_name",
            SortKey::Amount => "amount",
            SortKey::Currency => "currency",
            SortKey::Date => "datetime_utc",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("desc") {
            SortDir::Desc
        } else {
            SortDir::Asc
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
    pub sort: SortKey,
    pub dir: SortDir,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            sort: SortKey::default(),
            dir: SortDir::default(),
        }
    }
}

impl PageRequest {
    pub fn new(page: i64, per_page: i64, sort: SortKey, dir: SortDir) -> Self {
        Self {
            page: page.max(1),
            per_page: if per_page <= 0 { DEFAULT_PER_PAGE } else { per_page },
            sort,
            dir,
        }
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page).max(0)
    }
}

/// Positional argument of a compiled predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    Uuid(Uuid),
    Text(String),
    Timestamp(OffsetDateTime),
    Float(f64),
    Int(i32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    /// Empty, or `WHERE ...` with placeholders `$1..$n`.
    pub where_sql: String,
    pub args: Vec<FilterArg>,
}

impl CompiledFilter {
    /// Next free placeholder index, for callers appending LIMIT/OFFSET.
    pub fn next_placeholder(&self) -> usize {
        self.args.len() + 1
    }
}

impl Filter {
    pub fn compile(&self) -> CompiledFilter {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<FilterArg> = Vec::new();
        let mut push = |arg: FilterArg| {
            args.push(arg);
            args.len()
        };

        if let Some(creator) = self.creator {
            let k = push(FilterArg::Uuid(creator));
            clauses.push(format!("created_by_user_id = ${k}"));
        }
        if let Some(search) = &self.search {
            let k = push(FilterArg::Text(format!("%{search}%")));
            clauses.push(format!("(receiver_name ILIKE ${k} OR payer_name ILIKE ${k})"));
        }
        if let Some(from) = self.date_from {
            let k = push(FilterArg::Timestamp(from));
            clauses.push(format!("datetime_utc >= ${k}"));
        }
        if let Some(to) = self.date_to {
            let k = push(FilterArg::Timestamp(to));
            clauses.push(format!("datetime_utc < ${k}"));
        }
        if let Some(currency) = &self.currency {
            let k = push(FilterArg::Text(currency.clone()));
            clauses.push(format!("currency = ${k}"));
        }
        if let Some(min) = self.min_amount {
            let k = push(FilterArg::Float(min));
            clauses.push(format!("amount >= ${k}"));
        }
        if let Some(month) = self.month {
            let k = push(FilterArg::Int(i32::from(month)));
            clauses.push(format!(
                "EXTRACT(MONTH FROM datetime_utc AT TIME ZONE 'UTC') = ${k}"
            ));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        CompiledFilter { where_sql, args }
    }
}

/// Raw list/summary query string. Blank values count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub search: Option<String>,
    pub currency: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub min_amount: Option<String>,
    pub month: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_int_or(value: Option<&str>, fallback: i64) -> i64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(fallback)
}

fn parse_day(value: &str, field: &str) -> Result<OffsetDateTime> {
    let format = format_description!("[year]-[month]-[day]");
    let day = Date::parse(value, format)
        .map_err(|_| AppError::invalid_request(format!("{field} must be YYYY-MM-DD")))?;
    Ok(day.with_time(Time::MIDNIGHT).assume_utc())
}

impl TransactionQuery {
    /// Builds the filter scoped to `creator` plus the page request.
    pub fn into_parts(self, creator: Uuid) -> Result<(Filter, PageRequest)> {
        let page = PageRequest::new(
            parse_int_or(present(&self.page), DEFAULT_PAGE),
            parse_int_or(present(&self.per_page), DEFAULT_PER_PAGE),
            present(&self.sort_by).map(SortKey::parse).unwrap_or_default(),
            present(&self.sort_dir).map(SortDir::parse).unwrap_or_default(),
        );

        let min_amount = present(&self.min_amount)
            .map(|v| {
                v.parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .ok_or_else(|| AppError::invalid_request("invalid min_amount"))
            })
            .transpose()?;

        let month = present(&self.month)
            .map(|v| {
                v.parse::<u8>()
                    .ok()
                    .filter(|m| (1..=12).contains(m))
                    .ok_or_else(|| AppError::invalid_request("invalid month"))
            })
            .transpose()?;

        let date_from = present(&self.date_from)
            .map(|v| parse_day(v, "date_from"))
            .transpose()?;
        let date_to = present(&self.date_to)
            .map(|v| parse_day(v, "date_to").map(|day| day + Duration::days(1)))
            .transpose()?;

        let filter = Filter {
            creator: Some(creator),
            search: present(&self.search).map(str::to_owned),
            date_from,
            date_to,
            currency: present(&self.currency).map(str::to_owned),
            min_amount,
            month,
        };
        Ok((filter, page))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        let page = page.max(1);
        let per_page = if per_page <= 0 { DEFAULT_PER_PAGE } else { per_page };
        let total_pages = if total <= 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            page,
            per_page,
            total,
            total_pages,
        }
    }
}
