//! Resource-agnostic limit/offset envelope and the `next`/`previous` link builders.

use serde::Serialize;
use url::Url;

pub const LIMIT_PARAM: &str = "limit";
pub const OFFSET_PARAM: &str = "offset";

/// `{count, next, previous, results}` wrapper around one page of any resource.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    /// Wraps `results` and derives both links from the absolute request URL.
    pub fn new(request_url: &Url, count: u64, limit: u64, offset: u64, results: Vec<T>) -> Self {
        Self {
            count,
            next: next_link(request_url, count, limit, offset),
            previous: previous_link(request_url, limit, offset),
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

pub fn next_link(request_url: &Url, count: u64, limit: u64, offset: u64) -> Option<String> {
    if offset.saturating_add(limit) >= count {
        return None;
    }
    let mut url = request_url.clone();
    set_query_param(&mut url, LIMIT_PARAM, &limit.to_string());
    set_query_param(&mut url, OFFSET_PARAM, &(offset + limit).to_string());
    Some(url.to_string())
}

pub fn previous_link(request_url: &Url, limit: u64, offset: u64) -> Option<String> {
    if offset == 0 {
        return None;
    }
    let mut url = request_url.clone();
    set_query_param(&mut url, LIMIT_PARAM, &limit.to_string());
    if offset <= limit {
        remove_query_param(&mut url, OFFSET_PARAM);
    } else {
        set_query_param(&mut url, OFFSET_PARAM, &(offset - limit).to_string());
    }
    Some(url.to_string())
}

/// Replaces `key` in place when present, otherwise appends it; every other pair is kept.
fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (k, v) in url.query_pairs() {
        if k == key {
            if !replaced {
                pairs.push((key.to_string(), value.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((k.into_owned(), v.into_owned()));
        }
    }
    if !replaced {
        pairs.push((key.to_string(), value.to_string()));
    }
    write_pairs(url, &pairs);
}

fn remove_query_param(url: &mut Url, key: &str) {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    write_pairs(url, &pairs);
}

fn write_pairs(url: &mut Url, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        url.set_query(None);
        return;
    }
    url.query_pairs_mut().clear().extend_pairs(pairs);
}
