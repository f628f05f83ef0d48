//! `limit`/`offset` paging, `q` search, `sort=field:dir` and typed filters for list
//! endpoints.

use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveEnum, Condition, ConnectionTrait, EntityTrait, FromQueryResult, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};
use serde::Serialize;

use crate::error::{AppError, AppResult};

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

#[derive(Debug, Clone)]
pub struct ListParams {
    pub limit: u64,
    pub offset: u64,
    q: Option<String>,
    sort: Option<String>,
    raw: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

fn non_empty(raw: &HashMap<String, String>, name: &str) -> Option<String> {
    raw.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ListParams {
    pub fn parse(raw: HashMap<String, String>) -> AppResult<Self> {
        let limit = match non_empty(&raw, "limit") {
            None => DEFAULT_LIMIT,
            Some(v) => v
                .parse::<u64>()
                .ok()
                .filter(|n| (1..=MAX_LIMIT).contains(n))
                .ok_or_else(|| {
                    AppError::field("limit", format!("must be an integer between 1 and {MAX_LIMIT}"))
                })?,
        };
        let offset = match non_empty(&raw, "offset") {
            None => 0,
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| AppError::field("offset", "must be an integer of 0 or greater"))?,
        };

        Ok(Self {
            limit,
            offset,
            q: non_empty(&raw, "q"),
            sort: non_empty(&raw, "sort"),
            raw,
        })
    }

    pub fn q(&self) -> Option<&str> {
        self.q.as_deref()
    }

    /// Exact-match filter value; absent or empty means "no filter".
    pub fn filter<T: FromStr>(&self, name: &str) -> AppResult<Option<T>> {
        non_empty(&self.raw, name)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|_| AppError::field(name, format!("invalid value {v:?}")))
            })
            .transpose()
    }

    pub fn filter_enum<E>(&self, name: &str) -> AppResult<Option<E>>
    where
        E: ActiveEnum<Value = String>,
    {
        non_empty(&self.raw, name)
            .map(|v| {
                E::try_from_value(&v)
                    .map_err(|_| AppError::field(name, format!("invalid value {v:?}")))
            })
            .transpose()
    }

    /// Resolves `sort=field:asc|desc` against an allow-list. Unknown fields fall back to
    /// `default`; the direction defaults to descending.
    pub fn sort_by<C: Copy>(&self, allowed: &[(&str, C)], default: C) -> (C, Order) {
        let Some(raw) = self.sort.as_deref() else {
            return (default, Order::Desc);
        };
        let (field, dir) = raw.split_once(':').unwrap_or((raw, "desc"));
        let column = allowed
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, c)| *c)
            .unwrap_or(default);
        let order = if dir.eq_ignore_ascii_case("asc") {
            Order::Asc
        } else {
            Order::Desc
        };
        (column, order)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ListParams {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<HashMap<String, String>>::from_request_parts(parts, state).await?;
        ListParams::parse(raw)
    }
}

/// Case-insensitive substring match of `q` over any of `columns`.
pub fn search<E: EntityTrait>(select: Select<E>, q: Option<&str>, columns: &[E::Column]) -> Select<E> {
    let Some(q) = q else {
        return select;
    };
    let pattern = format!("%{}%", q.to_lowercase());
    let any = columns.iter().fold(Condition::any(), |cond, col| {
        cond.add(Expr::expr(Func::lower(Expr::col((E::default(), *col)))).like(pattern.clone()))
    });
    select.filter(any)
}

/// Counts with the current filters, then fetches one page.
pub async fn fetch_page<E, C>(
    select: Select<E>,
    params: &ListParams,
    db: &C,
) -> AppResult<Page<E::Model>>
where
    E: EntityTrait,
    E::Model: FromQueryResult + Send + Sync,
    C: ConnectionTrait,
{
    let total = select.clone().count(db).await?;
    let items = select
        .limit(params.limit)
        .offset(params.offset)
        .all(db)
        .await?;
    let has_more = params.offset + (items.len() as u64) < total;
    Ok(Page {
        items,
        meta: PageMeta {
            total,
            limit: params.limit,
            offset: params.offset,
            has_more,
        },
    })
}

/// Orders by the requested column, with the primary key as a stable tiebreaker.
pub fn ordered<E: EntityTrait>(
    select: Select<E>,
    (column, order): (E::Column, Order),
    tiebreak: E::Column,
) -> Select<E> {
    select.order_by(column, order.clone()).order_by(tiebreak, order)
}
