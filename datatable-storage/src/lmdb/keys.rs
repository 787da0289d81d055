//! Binary key layout of the LMDB databases.
//!
//! A page encodes as `[namespace: 4 bytes BE, sign bit flipped][title]`,
//! so byte order equals `(namespace, title)` order. Titles and table names
//! never contain NUL, which makes `0x00` a safe terminator:
//!
//! - records:       `table 0x00 page 0x00 sequence(u32 BE)`
//! - data_index:    `table 0x00 value(data_1) page 0x00 sequence(u32 BE)`
//! - page_counts:   `table 0x00 title 0x00 namespace`
//! - page_tables:   `page 0x00 table`
//! - deps:          `consumer 0x00 table`
//! - deps_by_table: `table 0x00 consumer`
//!
//! Field values may contain NUL, so a value escapes `0x00` as `0x00 0xFF`
//! and ends with `0x00 0x00`; byte order still equals string order.

use datatable_core::{PageId, TableName};

const SEPARATOR: u8 = 0x00;
const NS_BYTES: usize = 4;

fn push_page(out: &mut Vec<u8>, page: &PageId) {
    push_namespace(out, page.namespace);
    out.extend_from_slice(page.title.as_bytes());
}

/// Split a page off the front; returns the bytes after its terminator, or
/// an empty slice if the page runs to the end.
fn take_page(bytes: &[u8]) -> Option<(PageId, &[u8])> {
    if bytes.len() < NS_BYTES {
        return None;
    }
    let namespace = take_namespace(&bytes[..NS_BYTES])?;
    let rest = &bytes[NS_BYTES..];
    let (title, rest) = match rest.iter().position(|b| *b == SEPARATOR) {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, &rest[rest.len()..]),
    };
    let title = std::str::from_utf8(title).ok()?;
    Some((PageId::new(namespace, title), rest))
}

fn take_table(bytes: &[u8]) -> Option<(TableName, &[u8])> {
    let (name, rest) = match bytes.iter().position(|b| *b == SEPARATOR) {
        Some(i) => (&bytes[..i], &bytes[i + 1..]),
        None => (bytes, &bytes[bytes.len()..]),
    };
    let name = std::str::from_utf8(name).ok()?;
    if name.is_empty() {
        return None;
    }
    Some((TableName::from_key(name), rest))
}

fn push_namespace(out: &mut Vec<u8>, namespace: i32) {
    out.extend_from_slice(&((namespace as u32) ^ 0x8000_0000).to_be_bytes());
}

fn take_namespace(bytes: &[u8]) -> Option<i32> {
    let ns_bytes: [u8; NS_BYTES] = bytes.try_into().ok()?;
    Some((u32::from_be_bytes(ns_bytes) ^ 0x8000_0000) as i32)
}

fn push_value(out: &mut Vec<u8>, value: &str) {
    for b in value.bytes() {
        out.push(b);
        if b == SEPARATOR {
            out.push(0xFF);
        }
    }
    out.extend_from_slice(&[SEPARATOR, SEPARATOR]);
}

fn take_value(bytes: &[u8]) -> Option<(String, &[u8])> {
    let mut value = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == SEPARATOR {
            match bytes.get(i + 1).copied()? {
                0x00 => {
                    let value = String::from_utf8(value).ok()?;
                    return Some((value, &bytes[i + 2..]));
                }
                0xFF => value.push(SEPARATOR),
                _ => return None,
            }
            i += 2;
        } else {
            value.push(bytes[i]);
            i += 1;
        }
    }
    None
}

/// Smallest key greater than every key starting with `prefix`. The
/// prefix must not end in `0xFF`, which none of ours do.
pub(crate) fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    if let Some(last) = end.last_mut() {
        *last = last.saturating_add(1);
    }
    end
}

/// `key 0x00` for a bare table key or title used as a range bound.
pub(crate) fn text_prefix(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 1);
    out.extend_from_slice(text.as_bytes());
    out.push(SEPARATOR);
    out
}

/// `table 0x00`: prefix of a table's records and of its dependents.
pub(crate) fn table_prefix(table: &TableName) -> Vec<u8> {
    let mut out = Vec::with_capacity(table.key().len() + 1);
    out.extend_from_slice(table.key().as_bytes());
    out.push(SEPARATOR);
    out
}

/// `page 0x00`: prefix of a page's owned tables and of its dependencies.
pub(crate) fn page_prefix(page: &PageId) -> Vec<u8> {
    let mut out = Vec::with_capacity(NS_BYTES + page.title.len() + 1);
    push_page(&mut out, page);
    out.push(SEPARATOR);
    out
}

/// Prefix of the rows `page` owns in `table`.
pub(crate) fn record_page_prefix(table: &TableName, page: &PageId) -> Vec<u8> {
    let mut out = table_prefix(table);
    push_page(&mut out, page);
    out.push(SEPARATOR);
    out
}

pub(crate) fn record_key(table: &TableName, page: &PageId, sequence: u32) -> Vec<u8> {
    let mut out = record_page_prefix(table, page);
    out.extend_from_slice(&sequence.to_be_bytes());
    out
}

pub(crate) fn decode_record_key(bytes: &[u8]) -> Option<(TableName, PageId, u32)> {
    let (table, rest) = take_table(bytes)?;
    let (page, rest) = take_page(rest)?;
    let sequence = u32::from_be_bytes(rest.try_into().ok()?);
    Some((table, page, sequence))
}

/// Prefix of every index entry of `table` whose first field is `value`.
pub(crate) fn data_value_prefix(table: &TableName, value: &str) -> Vec<u8> {
    let mut out = table_prefix(table);
    push_value(&mut out, value);
    out
}

pub(crate) fn data_index_key(table: &TableName, value: &str, page: &PageId, sequence: u32) -> Vec<u8> {
    let mut out = data_value_prefix(table, value);
    push_page(&mut out, page);
    out.push(SEPARATOR);
    out.extend_from_slice(&sequence.to_be_bytes());
    out
}

pub(crate) fn decode_data_index_key(bytes: &[u8]) -> Option<(TableName, String, PageId, u32)> {
    let (table, rest) = take_table(bytes)?;
    let (value, rest) = take_value(rest)?;
    let (page, rest) = take_page(rest)?;
    let sequence = u32::from_be_bytes(rest.try_into().ok()?);
    Some((table, value, page, sequence))
}

/// Prefix of the page counts of `table` whose title is `title`.
pub(crate) fn title_prefix(table: &TableName, title: &str) -> Vec<u8> {
    let mut out = table_prefix(table);
    out.extend_from_slice(&text_prefix(title));
    out
}

/// `table 0x00 title 0x00 namespace`
pub(crate) fn page_count_key(table: &TableName, page: &PageId) -> Vec<u8> {
    let mut out = title_prefix(table, &page.title);
    push_namespace(&mut out, page.namespace);
    out
}

pub(crate) fn decode_page_count_key(bytes: &[u8]) -> Option<(TableName, PageId)> {
    let (table, rest) = take_table(bytes)?;
    let split = rest.iter().position(|b| *b == SEPARATOR)?;
    let title = std::str::from_utf8(&rest[..split]).ok()?;
    let namespace = take_namespace(&rest[split + 1..])?;
    Some((table, PageId::new(namespace, title)))
}

/// `page 0x00 table`
pub(crate) fn page_table_key(page: &PageId, table: &TableName) -> Vec<u8> {
    let mut out = page_prefix(page);
    out.extend_from_slice(table.key().as_bytes());
    out
}

pub(crate) fn decode_page_table_key(bytes: &[u8]) -> Option<(PageId, TableName)> {
    let (page, rest) = take_page(bytes)?;
    let (table, rest) = take_table(rest)?;
    rest.is_empty().then_some((page, table))
}

/// `table 0x00 page`
pub(crate) fn table_page_key(table: &TableName, page: &PageId) -> Vec<u8> {
    let mut out = table_prefix(table);
    push_page(&mut out, page);
    out
}

pub(crate) fn decode_table_page_key(bytes: &[u8]) -> Option<(TableName, PageId)> {
    let (table, rest) = take_table(bytes)?;
    let (page, rest) = take_page(rest)?;
    rest.is_empty().then_some((table, page))
}
