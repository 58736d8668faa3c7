//! Filtered, sorted, searched and paginated result sets with totals.
//!
//! # Responsibility
//! - Compose exact-match filters, substring search and sorting into one
//!   LIMIT/OFFSET page query plus a total count.
//!
//! # Invariants
//! - Parameter validation is fail-fast: no SQL is issued for invalid
//!   page/page_size/sort parameters.
//! - The total count reflects filters and search only, independent of the
//!   requested page.
//! - An empty filtered set short-circuits without a page query.

use crate::store::descriptor::EntityDescriptor;
use crate::store::mapper::RecordMapper;
use crate::store::record::Record;
use crate::store::value::FieldValue;
use crate::store::{StoreError, StoreResult};
use rusqlite::types::Value as SqlValue;
use rusqlite::params_from_iter;

/// Page size used when callers do not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Hard upper bound on `page_size`.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Parameters for one paginated query.
///
/// `sort_by`/`sort_order` arrive as raw collaborator input and are validated
/// before any SQL is issued.
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: u32,
    /// Rows per page, 1..=1000.
    pub page_size: u32,
    /// Exact-match AND-conjunction over declared columns.
    pub filters: Vec<(String, FieldValue)>,
    /// Declared column or the identifier column.
    pub sort_by: Option<String>,
    /// `asc` or `desc`, case-insensitive; defaults to ascending.
    pub sort_order: Option<String>,
    /// Substring searched in the entity's designated text columns.
    pub search: Option<String>,
}

impl PageQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            ..Self::default()
        }
    }
}

impl RecordMapper<'_> {
    /// Runs one paginated query and returns the page plus the total count
    /// of rows matching filters and search.
    ///
    /// A page past the end returns an empty list with the true total. With
    /// no `sort_by` the row order is left to the store; ties under a sort
    /// column are store-defined. The count and the page are two statements,
    /// so concurrent writers may move rows between them.
    pub fn paginate(&self, query: &PageQuery) -> StoreResult<(Vec<Record>, u64)> {
        let order_clause = validate_parameters(self.descriptor(), query)?;

        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        for (column, value) in &query.filters {
            if !self.descriptor().is_sortable(column) {
                return Err(StoreError::Usage(format!(
                    "unknown filter column `{column}` for table {}",
                    self.descriptor().table
                )));
            }
            clauses.push(format!("{column} = ?{}", params.len() + 1));
            params.push(SqlValue::from(value));
        }

        if let Some(term) = query.search.as_deref().filter(|term| !term.is_empty()) {
            let search_columns = self.descriptor().search_columns;
            if search_columns.is_empty() {
                return Err(StoreError::Usage(format!(
                    "search is not supported for table {}",
                    self.descriptor().table
                )));
            }
            let mut branches = Vec::with_capacity(search_columns.len());
            for column in search_columns {
                branches.push(format!("{column} LIKE ?{}", params.len() + 1));
                params.push(SqlValue::Text(format!("%{term}%")));
            }
            clauses.push(format!("({})", branches.join(" OR ")));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let count_sql = format!(
            "SELECT COUNT(*) FROM {}{where_sql};",
            self.descriptor().table
        );
        let total: i64 = self
            .conn()
            .query_row(&count_sql, params_from_iter(params.clone()), |row| {
                row.get(0)
            })?;
        if total <= 0 {
            return Ok((Vec::new(), 0));
        }

        let offset = (i64::from(query.page) - 1) * i64::from(query.page_size);
        let mut sql = format!("{}{where_sql}{order_clause}", self.select_sql());
        sql.push_str(&format!(
            " LIMIT ?{} OFFSET ?{};",
            params.len() + 1,
            params.len() + 2
        ));
        params.push(SqlValue::Integer(i64::from(query.page_size)));
        params.push(SqlValue::Integer(offset));

        let records = self.query_records(&sql, params)?;
        Ok((records, total as u64))
    }
}

fn validate_parameters(
    descriptor: &'static EntityDescriptor,
    query: &PageQuery,
) -> StoreResult<String> {
    if query.page < 1 {
        return Err(StoreError::Usage(format!(
            "page must be >= 1, got {}",
            query.page
        )));
    }
    if query.page_size < 1 || query.page_size > MAX_PAGE_SIZE {
        return Err(StoreError::Usage(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
            query.page_size
        )));
    }

    let direction = match query.sort_order.as_deref() {
        None => "ASC",
        Some(order) => match order.to_ascii_lowercase().as_str() {
            "asc" => "ASC",
            "desc" => "DESC",
            other => {
                return Err(StoreError::Usage(format!(
                    "sort_order must be `asc` or `desc`, got `{other}`"
                )))
            }
        },
    };

    match query.sort_by.as_deref() {
        None => Ok(String::new()),
        Some(column) => {
            if !descriptor.is_sortable(column) {
                return Err(StoreError::Usage(format!(
                    "cannot sort by unknown column `{column}` for table {}",
                    descriptor.table
                )));
            }
            Ok(format!(" ORDER BY {column} {direction}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_parameters, PageQuery};
    use crate::store::descriptor::EntityDescriptor;
    use crate::store::StoreError;

    static THINGS: EntityDescriptor = EntityDescriptor {
        table: "things",
        id_column: "id",
        columns: &["name", "kind"],
        validator: None,
        search_columns: &["name"],
    };

    #[test]
    fn rejects_out_of_range_page_parameters() {
        let err = validate_parameters(&THINGS, &PageQuery::new(0, 10)).unwrap_err();
        assert!(matches!(err, StoreError::Usage(_)));

        let err = validate_parameters(&THINGS, &PageQuery::new(1, 0)).unwrap_err();
        assert!(matches!(err, StoreError::Usage(_)));

        let err = validate_parameters(&THINGS, &PageQuery::new(1, 1001)).unwrap_err();
        assert!(matches!(err, StoreError::Usage(_)));
    }

    #[test]
    fn sort_order_is_case_insensitive_and_validated() {
        let mut query = PageQuery::new(1, 10);
        query.sort_by = Some("name".to_string());
        query.sort_order = Some("DESC".to_string());
        assert_eq!(
            validate_parameters(&THINGS, &query).unwrap(),
            " ORDER BY name DESC"
        );

        query.sort_order = Some("sideways".to_string());
        assert!(matches!(
            validate_parameters(&THINGS, &query),
            Err(StoreError::Usage(_))
        ));

        query.sort_order = None;
        query.sort_by = Some("created_at".to_string());
        assert!(matches!(
            validate_parameters(&THINGS, &query),
            Err(StoreError::Usage(_))
        ));

        query.sort_by = Some("id".to_string());
        assert_eq!(
            validate_parameters(&THINGS, &query).unwrap(),
            " ORDER BY id ASC"
        );
    }
}
