//! `SearchCriteria` translation: a small recursive-descent parser over the
//! UPnP search grammar subset, producing a parameterized SQL predicate.
//! Literal values always travel as bind parameters, never interpolated —
//! the parser only ever emits fixed column names and operators it
//! recognizes itself.

#[derive(Debug, thiserror::Error)]
#[error("bad search expression: {0}")]
pub struct SearchError(pub String);

pub struct Translated {
    pub predicate_sql: String,
    pub params: Vec<String>,
}

/// `Search(ContainerID=C, ...)` container scoping: matches are `C` itself
/// unioned with everything under it. `"0"` means "anywhere".
pub fn container_glob(container_id: &str) -> String {
    if container_id == "0" {
        "*".to_string()
    } else {
        dms_core::ids::descendants_glob(container_id)
    }
}

pub fn translate(criteria: &str) -> Result<Translated, SearchError> {
    let criteria = criteria.trim();
    if criteria.is_empty() || criteria == "*" {
        return Ok(Translated {
            predicate_sql: "1".to_string(),
            params: Vec::new(),
        });
    }
    let tokens = tokenize(criteria)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(SearchError(criteria.to_string()));
    }
    let mut params = Vec::new();
    let sql = render(&expr, &mut params);
    Ok(Translated { predicate_sql: sql, params })
}

#[derive(Debug, Clone)]
enum Token {
    Ident(String),
    Op(String),
    LParen,
    RParen,
    And,
    Or,
    String(String),
    True,
    False,
}

fn tokenize(input: &str) -> Result<Vec<Token>, SearchError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' => {
                let mut s = String::new();
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == '"' {
                        closed = true;
                        i += 1;
                        break;
                    }
                    // Decode the handful of XML entities the grammar
                    // expects inside quoted literals.
                    if chars[i] == '&' {
                        let rest: String = chars[i..].iter().collect();
                        if let Some(stripped) = rest.strip_prefix("&quot;") {
                            s.push('"');
                            i += rest.len() - stripped.len();
                            continue;
                        } else if let Some(stripped) = rest.strip_prefix("&apos;") {
                            s.push('\'');
                            i += rest.len() - stripped.len();
                            continue;
                        } else if let Some(stripped) = rest.strip_prefix("&lt;") {
                            s.push('<');
                            i += rest.len() - stripped.len();
                            continue;
                        } else if let Some(stripped) = rest.strip_prefix("&gt;") {
                            s.push('>');
                            i += rest.len() - stripped.len();
                            continue;
                        } else if let Some(stripped) = rest.strip_prefix("&amp;") {
                            s.push('&');
                            i += rest.len() - stripped.len();
                            continue;
                        }
                    }
                    s.push(chars[i]);
                    i += 1;
                }
                if !closed {
                    return Err(SearchError(input.to_string()));
                }
                tokens.push(Token::String(s));
            }
            '=' | '!' | '<' | '>' => {
                let mut op = String::new();
                op.push(c);
                i += 1;
                if i < chars.len() && chars[i] == '=' {
                    op.push('=');
                    i += 1;
                }
                tokens.push(Token::Op(op));
            }
            _ => {
                let start = i;
                while i < chars.len() && !chars[i].is_whitespace() && !"()\"".contains(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "true" => tokens.push(Token::True),
                    "false" => tokens.push(Token::False),
                    _ => tokens.push(Token::Ident(word)),
                }
            }
        }
    }
    Ok(tokens)
}

enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare { column: String, op: CmpOp, value: String },
    Exists { column: String, present: bool },
}

enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    DerivedFrom,
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn parse_or(&mut self) -> Result<Expr, SearchError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, SearchError> {
        let mut lhs = self.parse_atom()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.bump();
            let rhs = self.parse_atom()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<Expr, SearchError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.bump();
            let inner = self.parse_or()?;
            match self.bump() {
                Some(Token::RParen) => return Ok(inner),
                _ => return Err(SearchError("unbalanced parens".to_string())),
            }
        }

        let property = match self.bump() {
            Some(Token::Ident(name)) => name.clone(),
            _ => return Err(SearchError("expected property".to_string())),
        };
        let column = column_for(&property).ok_or_else(|| SearchError(format!("unknown property {property}")))?;

        match self.bump() {
            Some(Token::Ident(word)) if word == "exists" => {
                let present = match self.bump() {
                    Some(Token::True) => true,
                    Some(Token::False) => false,
                    _ => return Err(SearchError("expected true/false after exists".to_string())),
                };
                Ok(Expr::Exists { column: column.to_string(), present })
            }
            Some(Token::Ident(word)) if word == "contains" => {
                let value = self.expect_string()?;
                Ok(Expr::Compare { column: column.to_string(), op: CmpOp::Contains, value })
            }
            Some(Token::Ident(word)) if word == "derivedfrom" => {
                let value = self.expect_string()?;
                Ok(Expr::Compare { column: column.to_string(), op: CmpOp::DerivedFrom, value: strip_object_prefix(&value) })
            }
            Some(Token::Op(op)) => {
                let cmp = match op.as_str() {
                    "=" => CmpOp::Eq,
                    "!=" => CmpOp::Ne,
                    "<" => CmpOp::Lt,
                    "<=" => CmpOp::Le,
                    ">" => CmpOp::Gt,
                    ">=" => CmpOp::Ge,
                    _ => return Err(SearchError(format!("unknown operator {op}"))),
                };
                let value = self.expect_string()?;
                Ok(Expr::Compare { column: column.to_string(), op: cmp, value: strip_object_prefix(&value) })
            }
            _ => Err(SearchError(format!("expected operator after {property}"))),
        }
    }

    fn expect_string(&mut self) -> Result<String, SearchError> {
        match self.bump() {
            Some(Token::String(s)) => Ok(s.clone()),
            _ => Err(SearchError("expected quoted literal".to_string())),
        }
    }
}

fn strip_object_prefix(value: &str) -> String {
    value.strip_prefix("object.").unwrap_or(value).to_string()
}

fn column_for(property: &str) -> Option<&'static str> {
    match property {
        "@id" => Some("object.object_id"),
        "@parentID" => Some("object.parent_id"),
        "@refID" => Some("object.ref_id"),
        "upnp:class" => Some("object.class"),
        "dc:title" => Some("detail.title"),
        "dc:date" => Some("detail.date"),
        "dc:creator" => Some("detail.creator"),
        "upnp:album" => Some("detail.album"),
        "upnp:artist" => Some("detail.artist"),
        "upnp:actor" => Some("detail.artist"),
        "upnp:genre" => Some("detail.genre"),
        _ => None,
    }
}

fn render(expr: &Expr, params: &mut Vec<String>) -> String {
    match expr {
        Expr::And(a, b) => format!("({}) AND ({})", render(a, params), render(b, params)),
        Expr::Or(a, b) => format!("({}) OR ({})", render(a, params), render(b, params)),
        Expr::Exists { column, present } => {
            if *present {
                format!("{column} IS NOT NULL")
            } else {
                format!("{column} IS NULL")
            }
        }
        Expr::Compare { column, op, value } => match op {
            CmpOp::Eq => {
                params.push(value.clone());
                format!("{column} = ?")
            }
            CmpOp::Ne => {
                params.push(value.clone());
                format!("{column} != ?")
            }
            CmpOp::Lt => {
                params.push(value.clone());
                format!("{column} < ?")
            }
            CmpOp::Le => {
                params.push(value.clone());
                format!("{column} <= ?")
            }
            CmpOp::Gt => {
                params.push(value.clone());
                format!("{column} > ?")
            }
            CmpOp::Ge => {
                params.push(value.clone());
                format!("{column} >= ?")
            }
            CmpOp::Contains => {
                params.push(format!("%{value}%"));
                format!("{column} LIKE ?")
            }
            CmpOp::DerivedFrom => {
                params.push(format!("{value}%"));
                format!("{column} LIKE ?")
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_everything() {
        let t = translate("*").unwrap();
        assert_eq!(t.predicate_sql, "1");
        assert!(t.params.is_empty());
    }

    #[test]
    fn simple_equality_binds_a_parameter() {
        let t = translate("upnp:class = \"object.item.videoItem\"").unwrap();
        assert_eq!(t.predicate_sql, "object.class = ?");
        assert_eq!(t.params, vec!["item.videoItem".to_string()]);
    }

    #[test]
    fn contains_becomes_like_with_wildcards() {
        let t = translate("dc:title contains \"vacation\"").unwrap();
        assert_eq!(t.predicate_sql, "detail.title LIKE ?");
        assert_eq!(t.params, vec!["%vacation%".to_string()]);
    }

    #[test]
    fn and_or_and_parens_compose() {
        let t = translate(
            "(upnp:class derivedfrom \"object.item.videoItem\") and (dc:title contains \"a\" or dc:title contains \"b\")",
        )
        .unwrap();
        assert!(t.predicate_sql.contains("AND"));
        assert!(t.predicate_sql.contains("OR"));
        assert_eq!(t.params.len(), 3);
    }

    #[test]
    fn exists_has_no_parameters() {
        let t = translate("dc:date exists true").unwrap();
        assert_eq!(t.predicate_sql, "detail.date IS NOT NULL");
        assert!(t.params.is_empty());
    }

    #[test]
    fn unknown_property_is_an_error() {
        assert!(translate("upnp:nope = \"x\"").is_err());
    }

    #[test]
    fn entities_are_decoded_inside_literals() {
        let t = translate("dc:title = \"Tom &amp; Jerry\"").unwrap();
        assert_eq!(t.params, vec!["Tom & Jerry".to_string()]);
    }
}
