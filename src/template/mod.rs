//! URL templates.
//!
//! Two small languages share the `$...$` delimiter. Before a request,
//! [`substitute_input`] replaces `$input$` and the date keywords. After a
//! response, [`evaluate`] resolves regex, JSON-path and XPath expressions
//! against the response body. The phases are disjoint: post-request
//! evaluation does not know about `$input$`.

mod input;
mod json;
mod regex_list;
mod xml;

pub use input::{substitute_input, substitute_site};
pub use regex_list::{RegexListError, RegexMatchSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    Regex,
    Json,
    Xml,
}

impl ExpressionKind {
    const PREFIXES: [(&'static str, ExpressionKind); 3] = [
        ("regex:", ExpressionKind::Regex),
        ("json:", ExpressionKind::Json),
        ("xml:", ExpressionKind::Xml),
    ];

    /// Detect a kind prefix at the start of `rest`, case-insensitively.
    ///
    /// Returns the kind and the number of chars the prefix occupies.
    fn detect(rest: &[char]) -> (ExpressionKind, usize) {
        for (prefix, kind) in Self::PREFIXES {
            let len = prefix.chars().count();
            if rest.len() >= len
                && rest[..len]
                    .iter()
                    .flat_map(|c| c.to_lowercase())
                    .eq(prefix.chars())
            {
                return (kind, len);
            }
        }
        (ExpressionKind::Regex, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Expression { kind: ExpressionKind, body: String },
}

/// Split a template into literal text and `$...$` expressions.
///
/// Expressions with an empty body and an unterminated trailing expression
/// produce no segment.
pub fn tokenize(template: &str) -> Vec<Segment> {
    let chars: Vec<char> = template.chars().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    // (kind, body start) while inside an expression
    let mut open: Option<(ExpressionKind, usize)> = None;

    for (i, &c) in chars.iter().enumerate() {
        match (c, open) {
            ('$', None) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let (kind, prefix_len) = ExpressionKind::detect(&chars[i + 1..]);
                open = Some((kind, i + 1 + prefix_len));
            }
            ('$', Some((kind, start))) => {
                let body: String = chars[start.min(i)..i].iter().collect();
                let body = body.trim();
                if !body.is_empty() {
                    segments.push(Segment::Expression {
                        kind,
                        body: body.to_string(),
                    });
                }
                open = None;
            }
            (c, None) => literal.push(c),
            (_, Some(_)) => {}
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    if open.is_some() {
        debug!("Dropping unterminated expression in template {:?}", template);
    }
    segments
}

/// Everything post-request expressions can read.
#[derive(Debug, Clone, Copy)]
pub struct ResponseContext<'a> {
    pub body: &'a [u8],
    pub matches: &'a RegexMatchSet,
}

/// Evaluate a single expression body.
pub fn evaluate_expression(kind: ExpressionKind, body: &str, ctx: &ResponseContext) -> String {
    match kind {
        ExpressionKind::Regex => ctx.matches.resolve(body).unwrap_or_default().to_string(),
        ExpressionKind::Json => json::evaluate(body, ctx.body),
        ExpressionKind::Xml => xml::evaluate(body, ctx.body),
    }
}

/// Evaluate an output template (`URL`, `ThumbnailURL`, `DeletionURL`)
/// against a response.
pub fn evaluate(template: &str, ctx: &ResponseContext) -> String {
    if template.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(template.len());
    for segment in tokenize(template) {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Expression { kind, body } => {
                let value = evaluate_expression(kind, &body, ctx);
                debug!("Expression {:?} `{}` evaluated to {:?}", kind, body, value);
                out.push_str(&value);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(body: &str, patterns: &[&str]) -> RegexMatchSet {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        RegexMatchSet::build(body, &patterns).unwrap()
    }

    fn eval(template: &str, body: &str, patterns: &[&str]) -> String {
        let set = matches(body, patterns);
        let ctx = ResponseContext {
            body: body.as_bytes(),
            matches: &set,
        };
        evaluate(template, &ctx)
    }

    #[test]
    fn test_tokenize_literal_and_expressions() {
        assert_eq!(
            tokenize("http://x/$1,1$/$JSON: data.id $"),
            vec![
                Segment::Literal("http://x/".to_string()),
                Segment::Expression {
                    kind: ExpressionKind::Regex,
                    body: "1,1".to_string()
                },
                Segment::Literal("/".to_string()),
                Segment::Expression {
                    kind: ExpressionKind::Json,
                    body: "data.id".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_tokenize_prefixes() {
        assert_eq!(
            tokenize("$regex:2$$xml:/a/b$"),
            vec![
                Segment::Expression {
                    kind: ExpressionKind::Regex,
                    body: "2".to_string()
                },
                Segment::Expression {
                    kind: ExpressionKind::Xml,
                    body: "/a/b".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_tokenize_unterminated_and_empty() {
        assert_eq!(
            tokenize("abc$$def$1"),
            vec![
                Segment::Literal("abc".to_string()),
                Segment::Literal("def".to_string()),
            ]
        );
        assert!(tokenize("").is_empty());
        assert!(tokenize("$json:$").is_empty());
    }

    #[test]
    fn test_no_expressions_is_unchanged() {
        assert_eq!(eval("http://example.com/path", "", &[]), "http://example.com/path");
    }

    #[test]
    fn test_empty_template() {
        assert_eq!(eval("", "anything", &["a"]), "");
    }

    #[test]
    fn test_whole_match_and_group() {
        assert_eq!(eval("$1$", "abc123", &[r"abc(\d+)"]), "abc123");
        assert_eq!(eval("$1,1$", "abc123", &[r"abc(\d+)"]), "123");
        assert_eq!(eval("$regex:1,0$", "abc123", &[r"abc(\d+)"]), "abc123");
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(eval("$1,5$", "abc123", &[r"abc(\d+)"]), "");
        assert_eq!(eval("$2$", "abc123", &[r"abc(\d+)"]), "");
        assert_eq!(eval("$0$", "abc123", &[r"abc(\d+)"]), "");
        assert_eq!(eval("$x$", "abc123", &[r"abc(\d+)"]), "");
    }

    #[test]
    fn test_round_trip_text_site() {
        assert_eq!(eval("http://x/$1,1$", "id=42", &[r"id=(\d+)"]), "http://x/42");
    }

    #[test]
    fn test_json_expression() {
        let body = r#"{"data": {"link": "https://i.example/abc.png", "id": 7}}"#;
        assert_eq!(eval("$json:data.link$", body, &[]), "https://i.example/abc.png");
        assert_eq!(eval("https://x/$json:data.id$", body, &[]), "https://x/7");
    }

    #[test]
    fn test_xml_expression() {
        let body = "<rsp><image_link>https://x/1.png</image_link></rsp>";
        assert_eq!(eval("$xml:/rsp/image_link$", body, &[]), "https://x/1.png");
    }

    #[test]
    fn test_mixed_kinds() {
        let body = r#"{"name": "file.txt"} token=abc"#;
        assert_eq!(
            eval("https://x/$1,1$/$json:name$", body, &[r"token=(\w+)"]),
            "https://x/abc/(invalid json)"
        );
    }
}
