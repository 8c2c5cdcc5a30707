//! Prompts for document classification and field extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the category set or the requested
//!    reply shape requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can import and inspect prompts directly
//!    without a live model, making prompt regressions easy to catch.
//!
//! Both prompts pin the reply shape with an embedded example payload. Models
//! follow a concrete example far more reliably than a prose description of
//! the expected JSON.

/// The closed set of categories the classifier may answer with.
pub const CATEGORIES: [&str; 4] = ["Invoice", "Medical", "Education", "Insurance"];

/// Prompt asking the model to classify the uploaded document.
///
/// The reply contract is a single-element list of a mapping with key
/// `category`, e.g. `[{"category": "Invoice"}]`.
pub const CLASSIFICATION_PROMPT: &str = r#"You are the expert on document categorization. Analyze the pdf and tell me the document class (Invoice/Medical/Education/Insurance). Return the result in below JSON Format.
JSON Format:

[{"category": "Invoice"}]"#;

/// Build the extraction prompt for a detected document category.
///
/// The reply contract is the table/mapping dual format: either a flat
/// `headers`/`rows` table or a mapping of field names to scalar values.
/// Both accepted shapes are anchored with example payloads.
pub fn extraction_prompt(category: &str) -> String {
    format!(
        r#"Analyze the {category} document data and extract all important fields.

IMPORTANT INSTRUCTIONS:
1. Return the data in a FLAT table structure suitable for display.
2. If the document contains a table, extract it with proper column headers.
3. For key-value pairs, create a two-column table with 'Field' and 'Value' headers.
4. Do NOT use nested JSON objects or arrays as values.
5. If there are multiple items (like line items in an invoice), return them as separate rows.
6. All values should be simple strings or numbers, not objects or arrays.

Return the result in the following JSON format:

{{"headers": ["Field", "Value"], "rows": [["Invoice Number", "INV-12345"], ["Date", "2025-12-25"], ["Total Amount", "$1,234.56"], ["Customer Name", "John Doe"]]}}

OR for documents with line items:

{{"headers": ["Item", "Quantity", "Unit Price", "Amount"], "rows": [["Product A", "2", "$10.00", "$20.00"], ["Product B", "1", "$15.00", "$15.00"]]}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_prompt_names_every_category() {
        for cat in CATEGORIES {
            assert!(
                CLASSIFICATION_PROMPT.contains(cat),
                "classification prompt missing category {cat}"
            );
        }
    }

    #[test]
    fn classification_prompt_anchors_reply_shape() {
        // The single-element-list-of-mapping contract must appear verbatim.
        assert!(CLASSIFICATION_PROMPT.contains(r#"[{"category": "Invoice"}]"#));
    }

    #[test]
    fn extraction_prompt_embeds_category() {
        let p = extraction_prompt("Medical");
        assert!(p.starts_with("Analyze the Medical document"));
    }

    #[test]
    fn extraction_prompt_anchors_both_example_payloads() {
        let p = extraction_prompt("Invoice");
        assert!(p.contains(r#""headers": ["Field", "Value"]"#));
        assert!(p.contains(r#""headers": ["Item", "Quantity", "Unit Price", "Amount"]"#));
        // Both examples must be parseable JSON so the model sees valid anchors.
        for example in p.lines().filter(|l| l.starts_with('{')) {
            serde_json::from_str::<serde_json::Value>(example)
                .unwrap_or_else(|e| panic!("embedded example is not valid JSON: {e}\n{example}"));
        }
    }

    #[test]
    fn extraction_prompt_forbids_nesting() {
        let p = extraction_prompt("Insurance");
        assert!(p.contains("Do NOT use nested JSON"));
    }
}
