//! Tokenizer for filter expressions.

use super::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Number(f64),
    True,
    False,
    And,
    Or,
    Not,
    In,
    Dot,
    LParen,
    RParen,
    Op(CompareOp),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offsets into the source.
    pub start: usize,
    pub end: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, FilterError> {
    let mut lexer = Lexer {
        source,
        chars: source.char_indices().peekable(),
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn run(&mut self) -> Result<(), FilterError> {
        while let Some(&(start, c)) = self.chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '(' => self.single(start, TokenKind::LParen),
                ')' => self.single(start, TokenKind::RParen),
                '.' => self.single(start, TokenKind::Dot),
                '\'' | '"' => self.string(start, c)?,
                '=' | '!' | '<' | '>' => self.operator(start, c)?,
                '-' | '0'..='9' => self.number(start)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.word(start),
                other => {
                    return Err(FilterError::at(
                        self.source,
                        start,
                        format!("unexpected character '{other}'"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(i, _)| i)
            .unwrap_or(self.source.len())
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let end = self.offset();
        self.tokens.push(Token { kind, start, end });
    }

    fn single(&mut self, start: usize, kind: TokenKind) {
        self.chars.next();
        self.push(kind, start);
    }

    fn string(&mut self, start: usize, quote: char) -> Result<(), FilterError> {
        self.chars.next();
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, escaped)) => value.push(escaped),
                    None => {
                        return Err(FilterError::at(
                            self.source,
                            start,
                            "unterminated string literal",
                        ));
                    }
                },
                Some((_, c)) => value.push(c),
                None => {
                    return Err(FilterError::at(
                        self.source,
                        start,
                        "unterminated string literal",
                    ));
                }
            }
        }
        self.push(TokenKind::Str(value), start);
        Ok(())
    }

    fn operator(&mut self, start: usize, first: char) -> Result<(), FilterError> {
        self.chars.next();
        let followed_by_eq = matches!(self.chars.peek(), Some(&(_, '=')));
        if followed_by_eq {
            self.chars.next();
        }
        let op = match (first, followed_by_eq) {
            ('=', true) => CompareOp::Eq,
            ('!', true) => CompareOp::Ne,
            ('<', true) => CompareOp::Le,
            ('>', true) => CompareOp::Ge,
            ('<', false) => CompareOp::Lt,
            ('>', false) => CompareOp::Gt,
            ('=', false) => {
                return Err(FilterError::at(self.source, start, "expected '==', found '='"));
            }
            _ => {
                return Err(FilterError::at(
                    self.source,
                    start,
                    "expected '!=', use 'not' for negation",
                ));
            }
        };
        self.push(TokenKind::Op(op), start);
        Ok(())
    }

    fn number(&mut self, start: usize) -> Result<(), FilterError> {
        let mut text = String::new();
        if let Some(&(_, '-')) = self.chars.peek() {
            text.push('-');
            self.chars.next();
        }
        let mut seen_dot = false;
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                text.push(c);
            } else {
                break;
            }
            self.chars.next();
        }
        match text.parse::<f64>() {
            Ok(n) if !text.ends_with('.') => {
                self.push(TokenKind::Number(n), start);
                Ok(())
            }
            _ => Err(FilterError::at(
                self.source,
                start,
                format!("invalid number '{text}'"),
            )),
        }
    }

    fn word(&mut self, start: usize) {
        let mut text = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        let kind = match text.to_ascii_lowercase().as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Ident(text),
        };
        self.push(kind, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn comparison_tokens() {
        assert_eq!(
            kinds("published == true"),
            vec![
                TokenKind::Ident("published".into()),
                TokenKind::Op(CompareOp::Eq),
                TokenKind::True
            ]
        );
    }

    #[test]
    fn all_operators() {
        assert_eq!(
            kinds("a!=1 a>1 a<1 a>=1 a<=1")
                .into_iter()
                .filter_map(|k| match k {
                    TokenKind::Op(op) => Some(op),
                    _ => None,
                })
                .collect::<Vec<_>>(),
            vec![
                CompareOp::Ne,
                CompareOp::Gt,
                CompareOp::Lt,
                CompareOp::Ge,
                CompareOp::Le
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("a AND b Or NOT c IN"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::And,
                TokenKind::Ident("b".into()),
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Ident("c".into()),
                TokenKind::In
            ]
        );
    }

    #[test]
    fn strings_with_either_quote_and_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "say \"hi\"""#),
            vec![
                TokenKind::Str("it's".into()),
                TokenKind::Str("say \"hi\"".into())
            ]
        );
    }

    #[test]
    fn numbers_and_negative_numbers() {
        assert_eq!(
            kinds("3 -2.5"),
            vec![TokenKind::Number(3.0), TokenKind::Number(-2.5)]
        );
    }

    #[test]
    fn dotted_field_is_split() {
        assert_eq!(
            kinds("author.name"),
            vec![
                TokenKind::Ident("author".into()),
                TokenKind::Dot,
                TokenKind::Ident("name".into())
            ]
        );
    }

    #[test]
    fn identifiers_may_contain_dashes() {
        assert_eq!(kinds("cover-image"), vec![TokenKind::Ident("cover-image".into())]);
    }

    #[test]
    fn token_offsets_are_byte_positions() {
        let tokens = tokenize("  title").unwrap();
        assert_eq!((tokens[0].start, tokens[0].end), (2, 7));
    }

    #[test]
    fn single_equals_is_an_error() {
        let err = tokenize("a = 1").unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("title == 'abc").unwrap_err();
        assert_eq!(err.position, 9);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn escape_at_end_of_input_is_an_error() {
        assert!(tokenize(r"'abc\").is_err());
    }

    #[test]
    fn stray_character_is_an_error() {
        assert!(tokenize("a == 1 & b").is_err());
    }

    #[test]
    fn trailing_dot_number_is_an_error() {
        assert!(tokenize("a == 1.").is_err());
    }
}
