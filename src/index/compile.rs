//! Search-argument compilation
//!
//! Turns a [`SearchQuery`](crate::types::SearchQuery) tree plus lookup flags
//! into one engine query. The schema is identical for every mailbox, so a
//! compiled query is reusable across any number of mailbox indexes.

use tantivy::query::{AllQuery, BooleanQuery, FuzzyTermQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::tokenizer::{TokenStream, TokenizerManager};
use tantivy::Term;

use crate::error::{Error, Result};
use crate::index::engine::MailFields;
use crate::types::{LookupFlags, SearchQuery};

/// A search-argument tree compiled for execution against mailbox indexes.
///
/// Immutable once built; owned by the caller until every target mailbox has
/// been queried, then released by drop.
pub struct CompiledQuery {
    pub(crate) query: Box<dyn Query>,
}

/// Compile `args` and `flags` into a reusable query.
///
/// Pure compilation: no index is touched. A failure here aborts a
/// multi-mailbox lookup before any mailbox is bound.
pub fn compile_query(args: &SearchQuery, flags: LookupFlags) -> Result<CompiledQuery> {
    let fields = MailFields::build();
    let query = compile_node(&fields, args, flags)?;
    Ok(CompiledQuery { query })
}

fn compile_node(
    fields: &MailFields,
    node: &SearchQuery,
    flags: LookupFlags,
) -> Result<Box<dyn Query>> {
    match node {
        SearchQuery::All => Ok(Box::new(AllQuery)),
        SearchQuery::Text(text) => text_query(fields, fields.all_text_fields(), text, flags),
        SearchQuery::From(text) => text_query(fields, vec![fields.from], text, flags),
        SearchQuery::To(text) => text_query(fields, vec![fields.to], text, flags),
        SearchQuery::Cc(text) => text_query(fields, vec![fields.cc], text, flags),
        SearchQuery::Bcc(text) => text_query(fields, vec![fields.bcc], text, flags),
        SearchQuery::Subject(text) => text_query(fields, vec![fields.subject], text, flags),
        SearchQuery::Header(name, text) => {
            text_query(fields, vec![fields.header_field(name)], text, flags)
        }
        SearchQuery::Body(text) => text_query(fields, vec![fields.body], text, flags),
        SearchQuery::Uid(uids) => {
            let clauses: Vec<(Occur, Box<dyn Query>)> = uids
                .iter()
                .map(|uid| {
                    let term = Term::from_field_u64(fields.uid, u64::from(*uid));
                    let query: Box<dyn Query> =
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                    (Occur::Should, query)
                })
                .collect();
            Ok(Box::new(BooleanQuery::new(clauses)))
        }
        SearchQuery::And(a, b) => Ok(Box::new(BooleanQuery::new(vec![
            (Occur::Must, compile_node(fields, a, flags)?),
            (Occur::Must, compile_node(fields, b, flags)?),
        ]))),
        SearchQuery::Or(a, b) => Ok(Box::new(BooleanQuery::new(vec![
            (Occur::Should, compile_node(fields, a, flags)?),
            (Occur::Should, compile_node(fields, b, flags)?),
        ]))),
        SearchQuery::Not(inner) => Ok(Box::new(BooleanQuery::new(vec![
            (Occur::Must, Box::new(AllQuery) as Box<dyn Query>),
            (Occur::MustNot, compile_node(fields, inner, flags)?),
        ]))),
    }
}

fn text_query(
    fields: &MailFields,
    targets: Vec<Field>,
    text: &str,
    flags: LookupFlags,
) -> Result<Box<dyn Query>> {
    if flags.fuzzy {
        let terms = tokenize(text)?;
        // Fuzzy matching only applies to single-term queries; anything longer
        // falls back to the parsed form.
        if let [term] = terms.as_slice() {
            let clauses: Vec<(Occur, Box<dyn Query>)> = targets
                .iter()
                .map(|field| {
                    let query: Box<dyn Query> = Box::new(FuzzyTermQuery::new(
                        Term::from_field_text(*field, term),
                        1,
                        true,
                    ));
                    (Occur::Should, query)
                })
                .collect();
            return Ok(Box::new(BooleanQuery::new(clauses)));
        }
    }
    let parser = QueryParser::new(fields.schema.clone(), targets, TokenizerManager::default());
    parser
        .parse_query(text)
        .map_err(|e| Error::Query(e.to_string()))
}

fn tokenize(text: &str) -> Result<Vec<String>> {
    let mut analyzer = TokenizerManager::default()
        .get("default")
        .ok_or_else(|| Error::Query("default tokenizer unavailable".to_string()))?;
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_simple_queries() {
        for args in [
            SearchQuery::All,
            SearchQuery::Text("hello world".to_string()),
            SearchQuery::Subject("meeting".to_string()),
            SearchQuery::Header("X-Mailer".to_string(), "mutt".to_string()),
            SearchQuery::Uid(vec![1, 2, 3]),
        ] {
            assert!(compile_query(&args, LookupFlags::default()).is_ok());
        }
    }

    #[test]
    fn test_compile_boolean_tree() {
        let args = SearchQuery::And(
            Box::new(SearchQuery::Subject("report".to_string())),
            Box::new(SearchQuery::Not(Box::new(SearchQuery::Body(
                "draft".to_string(),
            )))),
        );
        assert!(compile_query(&args, LookupFlags::default()).is_ok());
    }

    #[test]
    fn test_compile_fuzzy_single_term() {
        let args = SearchQuery::Text("banana".to_string());
        assert!(compile_query(&args, LookupFlags { fuzzy: true }).is_ok());
    }

    #[test]
    fn test_tokenize_lowercases() {
        let tokens = tokenize("Hello World").unwrap();
        assert_eq!(tokens, vec!["hello", "world"]);
    }
}
