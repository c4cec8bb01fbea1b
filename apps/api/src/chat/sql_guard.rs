//! Static checks on agent-written SQL before it reaches the database.
//!
//! The database side already runs agent queries in a read-only transaction with
//! a statement timeout; this keeps the agent on its one table and gives the LLM
//! a readable reason when it strays.

use std::collections::HashSet;
use std::fmt;

const WRITE_KEYWORDS: [&str; 16] = [
    "insert", "update", "delete", "merge", "drop", "alter", "create", "truncate", "grant",
    "revoke", "copy", "into", "call", "lock", "vacuum", "reindex",
];

/// Functions that run SQL given as text, dump whole tables or schemas, or touch
/// server state. Matched by prefix so the `*_and_xmlschema` forms are covered.
const FORBIDDEN_FUNCTION_PREFIXES: [&str; 9] = [
    "query_to_xml", "table_to_xml", "cursor_to_xml", "schema_to_xml", "database_to_xml",
    "dblink", "lo_", "current_setting", "set_config",
];

/// Functions whose arguments may contain a bare `FROM` keyword.
const FROM_TAKING_FUNCTIONS: [&str; 5] = ["extract", "substring", "trim", "overlay", "position"];

/// Words that end a relation reference in a FROM list.
const CLAUSE_WORDS: [&str; 27] = [
    "where", "join", "left", "right", "inner", "outer", "full", "cross", "natural", "on",
    "using", "group", "order", "limit", "offset", "fetch", "having", "window", "union",
    "except", "intersect", "lateral", "tablesample", "for", "select", "from", "returning",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Punct(char),
}

impl Token {
    fn word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            _ => None,
        }
    }

    /// Identifier text, quoted or not.
    fn ident(&self) -> Option<&str> {
        match self {
            Token::Word(w) | Token::Quoted(w) => Some(w),
            Token::Punct(_) => None,
        }
    }

    fn is_punct(&self, c: char) -> bool {
        matches!(self, Token::Punct(p) if *p == c)
    }
}

/// A relation named in a FROM list, with its schema when qualified.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RelationRef<'t> {
    schema: Option<&'t str>,
    name: &'t str,
}

impl fmt::Display for RelationRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(self.name),
        }
    }
}

/// Splits SQL into lowercase words, quoted identifiers and structural
/// punctuation, each with the char offset it starts at. String literals and
/// comments are dropped.
fn tokenize(sql: &str) -> Result<Vec<(Token, usize)>, String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let offset = i;
        match c {
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err("unterminated comment".to_string());
                }
                i += 2;
            }
            '\'' => {
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => i += 2,
                        Some('\'') => break,
                        Some(_) => i += 1,
                    }
                }
                i += 1;
            }
            '"' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && chars[i] != '"' {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err("unterminated quoted identifier".to_string());
                }
                let ident = chars[start..i].iter().collect::<String>().to_lowercase();
                tokens.push((Token::Quoted(ident), offset));
                i += 1;
            }
            '$' if chars.get(i + 1) == Some(&'$') => {
                return Err("dollar-quoted strings are not allowed".to_string());
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                let word = chars[start..i].iter().collect::<String>().to_lowercase();
                tokens.push((Token::Word(word), offset));
            }
            '(' | ')' | ',' | '.' | ';' => {
                tokens.push((Token::Punct(c), offset));
                i += 1;
            }
            _ => i += 1,
        }
    }

    Ok(tokens)
}

/// The statement without its trailing `;` and whatever follows it (only
/// comments or whitespace can). Input the tokenizer rejects is returned as is.
pub fn strip_trailing_semicolon(sql: &str) -> String {
    let end = tokenize(sql).ok().and_then(|tokens| match tokens.last() {
        Some((token, offset)) if token.is_punct(';') => Some(*offset),
        _ => None,
    });
    match end {
        Some(end) => sql.chars().take(end).collect(),
        None => sql.to_string(),
    }
}

fn is_forbidden_function(name: &str) -> bool {
    FORBIDDEN_FUNCTION_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Accepts a single read-only statement over `table` (plus its own CTEs).
/// The error string is written for the LLM to act on.
pub fn validate_sql(sql: &str, table: &str) -> Result<(), String> {
    let mut tokens: Vec<Token> = tokenize(sql)?.into_iter().map(|(t, _)| t).collect();
    if tokens.last().is_some_and(|t| t.is_punct(';')) {
        tokens.pop();
    }
    if tokens.iter().any(|t| t.is_punct(';')) {
        return Err("only a single statement is allowed".to_string());
    }

    match tokens.first().and_then(Token::word) {
        Some("select") | Some("with") => {}
        _ => return Err("the query must start with SELECT or WITH".to_string()),
    }

    if let Some(word) = tokens
        .iter()
        .filter_map(Token::word)
        .find(|w| WRITE_KEYWORDS.contains(w))
    {
        return Err(format!("'{}' is not allowed; queries are read-only", word.to_uppercase()));
    }

    if let Some(word) = tokens
        .iter()
        .filter_map(Token::ident)
        .find(|w| w.starts_with("pg_") || *w == "information_schema")
    {
        return Err(format!("system objects such as '{word}' are not accessible"));
    }

    if let Some(name) = tokens
        .windows(2)
        .filter(|w| w[1].is_punct('('))
        .filter_map(|w| w[0].ident())
        .find(|name| is_forbidden_function(name))
    {
        return Err(format!("the function '{name}' is not allowed"));
    }

    // `name AS (` introduces a CTE
    let ctes: HashSet<&str> = tokens
        .windows(3)
        .filter(|w| w[1].word() == Some("as") && w[2].is_punct('('))
        .filter_map(|w| w[0].ident())
        .collect();

    let relations = relation_refs(&tokens);
    for relation in &relations {
        // a qualified name always means a real table, never a CTE
        let allowed = match relation.schema {
            None => relation.name == table || ctes.contains(relation.name),
            Some(schema) => schema == "public" && relation.name == table,
        };
        if !allowed {
            return Err(format!(
                "only the table '{table}' may be queried, found '{relation}'"
            ));
        }
    }
    if !relations.iter().any(|r| r.name == table) {
        return Err(format!("the query must read from the table '{table}'"));
    }

    Ok(())
}

/// Every relation named after FROM / JOIN (including comma-separated FROM
/// lists), ignoring subqueries and `FROM` inside EXTRACT(...)-style calls.
fn relation_refs(tokens: &[Token]) -> Vec<RelationRef<'_>> {
    let mut refs = Vec::new();
    // one entry per open paren: does it belong to a FROM-taking function?
    let mut paren_stack: Vec<bool> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        if token.is_punct('(') {
            let in_function = i > 0
                && tokens[i - 1]
                    .word()
                    .is_some_and(|w| FROM_TAKING_FUNCTIONS.contains(&w));
            paren_stack.push(in_function);
        } else if token.is_punct(')') {
            paren_stack.pop();
        } else if matches!(token.word(), Some("from") | Some("join"))
            && !paren_stack.last().copied().unwrap_or(false)
        {
            i = read_relation_list(tokens, i + 1, &mut refs);
            continue;
        }
        i += 1;
    }

    refs
}

/// Reads `rel [AS alias] [, rel [AS alias]]...` starting at `i`; returns the
/// index of the first token after the list.
fn read_relation_list<'t>(
    tokens: &'t [Token],
    mut i: usize,
    refs: &mut Vec<RelationRef<'t>>,
) -> usize {
    loop {
        let Some(first) = tokens.get(i) else {
            return i;
        };
        if first.is_punct('(') || first.word().is_some_and(|w| CLAUSE_WORDS.contains(&w)) {
            // subquery or LATERAL; the outer loop walks into it
            return i;
        }
        let Some(first_name) = first.ident() else {
            return i;
        };
        i += 1;

        let relation = if tokens.get(i).is_some_and(|t| t.is_punct('.')) {
            let Some(name) = tokens.get(i + 1).and_then(Token::ident) else {
                return i + 1;
            };
            i += 2;
            RelationRef { schema: Some(first_name), name }
        } else {
            RelationRef { schema: None, name: first_name }
        };
        refs.push(relation);

        if tokens.get(i).and_then(Token::word) == Some("as") {
            i += 1;
        }
        if let Some(alias) = tokens.get(i) {
            let is_alias = match alias {
                Token::Quoted(_) => true,
                Token::Word(w) => !CLAUSE_WORDS.contains(&w.as_str()),
                Token::Punct(_) => false,
            };
            if is_alias {
                i += 1;
            }
        }

        if tokens.get(i).is_some_and(|t| t.is_punct(',')) {
            i += 1;
            continue;
        }
        return i;
    }
}
