//! Result normalization: reshape a model reply into one uniform table.
//!
//! Extraction replies arrive in whichever of the prompt's accepted shapes the
//! model chose — a `headers`/`rows` table, a flat mapping, a list of records,
//! a bare grid, or (when the model misbehaves) something else entirely. The
//! UI and the CSV export only ever see a [`TabularResult`].
//!
//! The shape is classified exactly once, at the decode boundary, into a
//! [`ReplyShape`] tag; [`normalize`] then matches the tag exhaustively.
//! Because classification is total and every arm produces a table, `normalize`
//! cannot fail: replies that fit no structured shape degrade to a single
//! `Result` row holding the stringified value.
//!
//! ## Normalization rules
//!
//! | Shape     | Condition                                     | Result |
//! |-----------|-----------------------------------------------|--------|
//! | `Table`   | mapping with list `headers` and list-of-list `rows` | used directly, rows padded to header arity |
//! | `Mapping` | any other mapping                             | one `Field`/`Value` row per key, in key order |
//! | `Records` | non-empty list of mappings                    | headers = union of keys in first-seen order |
//! | `Grid`    | non-empty list of lists                       | rows verbatim, no header inference |
//! | `Scalar`  | everything else                               | single `Result` row |

use serde_json::{Map, Value};

/// Normalized headers/rows representation used for display and export.
///
/// Invariant: every row has the same arity as `headers` — absent cells are
/// empty strings, never omitted. The one exception is the headerless
/// [`ReplyShape::Grid`] case, where `headers` is empty and rows keep a
/// uniform arity of their own.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TabularResult {
    /// Ordered column names. Empty for headerless grids.
    pub headers: Vec<String>,
    /// Ordered rows of cell values.
    pub rows: Vec<Vec<String>>,
}

impl TabularResult {
    /// A single-row fallback table: `headers=["Result"]`, one stringified cell.
    fn fallback(value: &Value) -> Self {
        Self {
            headers: vec!["Result".to_string()],
            rows: vec![vec![stringify(value)]],
        }
    }

    /// True when the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Tagged classification of a decoded model reply.
///
/// Resolved once per reply; [`normalize`] dispatches on the tag instead of
/// re-inspecting the value's type in every rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// Mapping carrying a well-formed `headers` list and `rows` list of lists.
    Table,
    /// Any other mapping: flat key-value pairs.
    Mapping,
    /// Non-empty list where every element is a mapping.
    Records,
    /// Non-empty list where every element is a list.
    Grid,
    /// Everything else: scalars, empty or mixed lists, malformed tables.
    Scalar,
}

impl ReplyShape {
    /// Classify a reply value. Total — every value gets exactly one tag.
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                if map.contains_key("headers") && map.contains_key("rows") {
                    if is_well_formed_table(map) {
                        ReplyShape::Table
                    } else {
                        // Both vocabulary keys present but not list-shaped:
                        // the reply pretended to be a table and failed.
                        ReplyShape::Scalar
                    }
                } else {
                    ReplyShape::Mapping
                }
            }
            Value::Array(items) if !items.is_empty() => {
                if items.iter().all(Value::is_object) {
                    ReplyShape::Records
                } else if items.iter().all(Value::is_array) {
                    ReplyShape::Grid
                } else {
                    ReplyShape::Scalar
                }
            }
            _ => ReplyShape::Scalar,
        }
    }
}

/// `headers` must be a list and `rows` a list of lists for the direct path.
fn is_well_formed_table(map: &Map<String, Value>) -> bool {
    let headers_ok = map.get("headers").is_some_and(Value::is_array);
    let rows_ok = map
        .get("rows")
        .and_then(Value::as_array)
        .is_some_and(|rows| rows.iter().all(Value::is_array));
    headers_ok && rows_ok
}

/// Convert any decoded model reply into a [`TabularResult`]. Never fails.
pub fn normalize(value: &Value) -> TabularResult {
    match ReplyShape::classify(value) {
        ReplyShape::Table => normalize_table(value),
        ReplyShape::Mapping => normalize_mapping(value),
        ReplyShape::Records => normalize_records(value),
        ReplyShape::Grid => normalize_grid(value),
        ReplyShape::Scalar => TabularResult::fallback(value),
    }
}

// ── Rule 1: direct headers/rows table ────────────────────────────────────

fn normalize_table(value: &Value) -> TabularResult {
    // classify() guarantees both keys exist with the right shapes.
    let headers: Vec<String> = value["headers"]
        .as_array()
        .map(|hs| hs.iter().map(stringify).collect())
        .unwrap_or_default();

    let rows: Vec<Vec<String>> = value["rows"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(Value::as_array)
                .map(|row| {
                    let mut cells: Vec<String> = row.iter().map(stringify).collect();
                    cells.resize(headers.len(), String::new());
                    cells
                })
                .collect()
        })
        .unwrap_or_default();

    TabularResult { headers, rows }
}

// ── Rule 2: flat key-value mapping ───────────────────────────────────────

fn normalize_mapping(value: &Value) -> TabularResult {
    let map = value.as_object().expect("classified as Mapping");

    let rows: Vec<Vec<String>> = map
        .iter()
        // The table vocabulary is reserved; a stray `headers` or `rows` key
        // must not collide with rule 1.
        .filter(|(k, _)| k.as_str() != "headers" && k.as_str() != "rows")
        .map(|(k, v)| vec![k.clone(), stringify(v)])
        .collect();

    TabularResult {
        headers: vec!["Field".to_string(), "Value".to_string()],
        rows,
    }
}

// ── Rule 3a: list of record mappings ─────────────────────────────────────

fn normalize_records(value: &Value) -> TabularResult {
    let items = value.as_array().expect("classified as Records");

    // Union of keys in first-appearance order across all records.
    let mut headers: Vec<String> = Vec::new();
    for item in items {
        if let Some(map) = item.as_object() {
            for key in map.keys() {
                if !headers.iter().any(|h| h == key) {
                    headers.push(key.clone());
                }
            }
        }
    }

    let rows: Vec<Vec<String>> = items
        .iter()
        .filter_map(Value::as_object)
        .map(|map| {
            headers
                .iter()
                .map(|h| map.get(h).map(stringify).unwrap_or_default())
                .collect()
        })
        .collect();

    TabularResult { headers, rows }
}

// ── Rule 3b: list of lists (headerless grid) ─────────────────────────────

fn normalize_grid(value: &Value) -> TabularResult {
    let items = value.as_array().expect("classified as Grid");

    let mut rows: Vec<Vec<String>> = items
        .iter()
        .filter_map(Value::as_array)
        .map(|row| row.iter().map(stringify).collect())
        .collect();

    // No header inference; pad ragged rows so every row shares one arity.
    let arity = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(arity, String::new());
    }

    TabularResult {
        headers: Vec::new(),
        rows,
    }
}

// ── Stringification ──────────────────────────────────────────────────────

/// Render a JSON value as a single cell.
///
/// Strings are taken verbatim (no surrounding quotes); everything else —
/// including nested mappings and lists, which are deliberately not flattened —
/// is compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── CSV / terminal rendering ─────────────────────────────────────────────

impl TabularResult {
    /// Derive a UTF-8 CSV document: headers as the header row (omitted when
    /// empty), rows verbatim, RFC 4180 quoting.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        if !self.headers.is_empty() {
            push_csv_row(&mut out, &self.headers);
        }
        for row in &self.rows {
            push_csv_row(&mut out, row);
        }
        out
    }

    /// Render an aligned plain-text table for terminal display.
    pub fn render_text(&self) -> String {
        let columns = self
            .headers
            .len()
            .max(self.rows.iter().map(Vec::len).max().unwrap_or(0));
        if columns == 0 {
            return String::new();
        }

        let mut widths = vec![0usize; columns];
        for (i, h) in self.headers.iter().enumerate() {
            widths[i] = widths[i].max(h.chars().count());
        }
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let mut out = String::new();
        if !self.headers.is_empty() {
            out.push_str(&format_text_row(&self.headers, &widths));
            let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            out.push_str(&format_text_row(&rule, &widths));
        }
        for row in &self.rows {
            out.push_str(&format_text_row(row, &widths));
        }
        out
    }
}

fn push_csv_row(out: &mut String, cells: &[String]) {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if cell.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

fn format_text_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        line.push_str(cell);
        let pad = width.saturating_sub(cell.chars().count());
        line.push_str(&" ".repeat(pad));
    }
    line.truncate(line.trim_end().len());
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── Shape classification ────────────────────────────────────────────

    #[test]
    fn classify_covers_every_shape() {
        assert_eq!(
            ReplyShape::classify(&json!({"headers": ["A"], "rows": [["1"]]})),
            ReplyShape::Table
        );
        assert_eq!(
            ReplyShape::classify(&json!({"Total": "100"})),
            ReplyShape::Mapping
        );
        assert_eq!(
            ReplyShape::classify(&json!([{"a": 1}, {"b": 2}])),
            ReplyShape::Records
        );
        assert_eq!(ReplyShape::classify(&json!([[1, 2], [3]])), ReplyShape::Grid);
        assert_eq!(ReplyShape::classify(&json!(42)), ReplyShape::Scalar);
        assert_eq!(ReplyShape::classify(&json!([])), ReplyShape::Scalar);
        assert_eq!(
            ReplyShape::classify(&json!([{"a": 1}, "loose"])),
            ReplyShape::Scalar
        );
    }

    #[test]
    fn table_with_non_list_vocabulary_is_scalar() {
        // Both reserved keys present, wrong types: the reply pretended to be
        // a table and failed, so it degrades rather than losing cells.
        assert_eq!(
            ReplyShape::classify(&json!({"headers": "Field", "rows": 3})),
            ReplyShape::Scalar
        );
        assert_eq!(
            ReplyShape::classify(&json!({"headers": ["A"], "rows": ["not-a-list"]})),
            ReplyShape::Scalar
        );
    }

    // ── Rule 1 ──────────────────────────────────────────────────────────

    #[test]
    fn well_formed_table_passes_through_unchanged() {
        let t = normalize(&json!({
            "headers": ["Field", "Value"],
            "rows": [["Total", "100"], ["Date", "2025-12-25"]]
        }));
        assert_eq!(t.headers, vec!["Field", "Value"]);
        assert_eq!(
            t.rows,
            vec![vec!["Total", "100"], vec!["Date", "2025-12-25"]]
        );
    }

    #[test]
    fn short_rows_are_padded_to_header_arity() {
        let t = normalize(&json!({
            "headers": ["Item", "Qty", "Price"],
            "rows": [["Widget", "2"]]
        }));
        assert_eq!(t.rows, vec![vec!["Widget", "2", ""]]);
    }

    #[test]
    fn numeric_cells_are_stringified() {
        let t = normalize(&json!({
            "headers": ["Item", "Qty"],
            "rows": [["Widget", 2]]
        }));
        assert_eq!(t.rows, vec![vec!["Widget", "2"]]);
    }

    // ── Rule 2 ──────────────────────────────────────────────────────────

    #[test]
    fn mapping_becomes_field_value_rows_in_key_order() {
        let t = normalize(&json!({
            "Invoice Number": "INV-1",
            "Total": 99.5,
            "Paid": true
        }));
        assert_eq!(t.headers, vec!["Field", "Value"]);
        assert_eq!(
            t.rows,
            vec![
                vec!["Invoice Number", "INV-1"],
                vec!["Total", "99.5"],
                vec!["Paid", "true"],
            ]
        );
    }

    #[test]
    fn mapping_nested_values_stringified_whole() {
        let t = normalize(&json!({
            "Customer": {"name": "Ada", "city": "Paris"},
            "Items": [1, 2, 3]
        }));
        assert_eq!(
            t.rows,
            vec![
                vec!["Customer", r#"{"name":"Ada","city":"Paris"}"#],
                vec!["Items", "[1,2,3]"],
            ]
        );
    }

    #[test]
    fn mapping_skips_reserved_keys() {
        let t = normalize(&json!({
            "headers": "stray",
            "Total": "100"
        }));
        assert_eq!(t.rows, vec![vec!["Total", "100"]]);
    }

    #[test]
    fn mapping_of_only_reserved_keys_yields_empty_table() {
        let t = normalize(&json!({ "rows": "stray" }));
        assert_eq!(t.headers, vec!["Field", "Value"]);
        assert!(t.is_empty());
    }

    // ── Rule 3 ──────────────────────────────────────────────────────────

    #[test]
    fn records_union_headers_in_first_seen_order() {
        let t = normalize(&json!([
            {"Item": "A", "Qty": 2},
            {"Item": "B", "Price": "$5"}
        ]));
        assert_eq!(t.headers, vec!["Item", "Qty", "Price"]);
        assert_eq!(
            t.rows,
            vec![vec!["A", "2", ""], vec!["B", "", "$5"]]
        );
    }

    #[test]
    fn grid_keeps_rows_verbatim_without_headers() {
        let t = normalize(&json!([["a", "b"], ["c", "d"]]));
        assert!(t.headers.is_empty());
        assert_eq!(t.rows, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn ragged_grid_rows_are_padded() {
        let t = normalize(&json!([["a"], ["c", "d"]]));
        assert_eq!(t.rows, vec![vec!["a", ""], vec!["c", "d"]]);
    }

    // ── Rule 4 ──────────────────────────────────────────────────────────

    #[test]
    fn scalar_number_falls_back_to_result_row() {
        let t = normalize(&json!(42));
        assert_eq!(t.headers, vec!["Result"]);
        assert_eq!(t.rows, vec![vec!["42"]]);
    }

    #[test]
    fn scalar_string_is_unquoted() {
        let t = normalize(&json!("ok"));
        assert_eq!(t.rows, vec![vec!["ok"]]);
    }

    #[test]
    fn empty_list_falls_back() {
        let t = normalize(&json!([]));
        assert_eq!(t.headers, vec!["Result"]);
        assert_eq!(t.rows, vec![vec!["[]"]]);
    }

    #[test]
    fn mixed_list_falls_back_not_panics() {
        let t = normalize(&json!([{"a": 1}, 7, "x"]));
        assert_eq!(t.headers, vec!["Result"]);
        assert_eq!(t.rows.len(), 1);
        assert!(t.rows[0][0].contains("\"a\""));
    }

    #[test]
    fn deeply_nested_junk_never_panics() {
        let v = json!([[[{"a": [null, {"b": []}]}]], {"headers": null, "rows": {}}]);
        let t = normalize(&v);
        assert_eq!(t.headers, vec!["Result"]);
    }

    // ── CSV ─────────────────────────────────────────────────────────────

    #[test]
    fn csv_has_header_row_first() {
        let t = TabularResult {
            headers: vec!["Field".into(), "Value".into()],
            rows: vec![vec!["Total".into(), "100".into()]],
        };
        assert_eq!(t.to_csv(), "Field,Value\nTotal,100\n");
    }

    #[test]
    fn csv_quotes_commas_quotes_and_newlines() {
        let t = TabularResult {
            headers: vec!["Field".into(), "Value".into()],
            rows: vec![
                vec!["Address".into(), "1 Main St, Springfield".into()],
                vec!["Note".into(), "say \"hi\"\nthen leave".into()],
            ],
        };
        let csv = t.to_csv();
        assert!(csv.contains("\"1 Main St, Springfield\""));
        assert!(csv.contains("\"say \"\"hi\"\"\nthen leave\""));
    }

    #[test]
    fn headerless_csv_omits_header_row() {
        let t = TabularResult {
            headers: vec![],
            rows: vec![vec!["a".into(), "b".into()]],
        };
        assert_eq!(t.to_csv(), "a,b\n");
    }

    // ── Text rendering ──────────────────────────────────────────────────

    #[test]
    fn render_text_aligns_columns() {
        let t = TabularResult {
            headers: vec!["Field".into(), "Value".into()],
            rows: vec![vec!["Invoice Number".into(), "INV-1".into()]],
        };
        let text = t.render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Field"));
        assert!(lines[2].starts_with("Invoice Number"));
    }

    #[test]
    fn render_text_empty_table() {
        let t = TabularResult {
            headers: vec![],
            rows: vec![],
        };
        assert_eq!(t.render_text(), "");
    }
}
