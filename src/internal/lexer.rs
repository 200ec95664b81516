//! Lexer for the Java subset understood by the syntax front end.
//!
//! Keywords are lexed as identifiers and recognized by the parser. `>` is never combined with a
//! following `>` here, because `>>` would break nested type arguments; the parser joins adjacent
//! `>` tokens into shift operators.

use logos::Logos;

use crate::{errors::StructscanErrorKind, Result, Span};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub(crate) enum TokenKind {
    #[regex(r"[\p{XID_Start}_$][\p{XID_Continue}$]*")]
    Ident,

    #[regex(r"[0-9][0-9_]*[lL]?")]
    #[regex(r"0[xX][0-9a-fA-F_]+[lL]?")]
    IntLiteral,

    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?[fFdD]?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?[fFdD]?")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+[fFdD]?")]
    #[regex(r"[0-9][0-9_]*[fFdD]")]
    FloatLiteral,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringLiteral,

    #[regex(r"'([^'\\\n]|\\.)*'")]
    CharLiteral,

    #[token("(")]
    #[token(")")]
    #[token("{")]
    #[token("}")]
    #[token("[")]
    #[token("]")]
    #[token(";")]
    #[token(",")]
    #[token(".")]
    #[token("...")]
    #[token("@")]
    #[token("?")]
    #[token(":")]
    #[token("::")]
    #[token("->")]
    #[token("=")]
    #[token("==")]
    #[token("!")]
    #[token("!=")]
    #[token("<")]
    #[token("<=")]
    #[token("<<")]
    #[token("<<=")]
    #[token(">")]
    #[token(">=")]
    #[token("&&")]
    #[token("||")]
    #[token("&")]
    #[token("|")]
    #[token("^")]
    #[token("~")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("%")]
    #[token("++")]
    #[token("--")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    Punct,
}

/// A token: kind and span, the text is sliced from the source when needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

/// Tokenizes the whole source. The first unknown character is reported as parse error.
pub(crate) fn lex(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);
    while let Some(kind) = lexer.next() {
        let span = lexer.span();
        match kind {
            Ok(kind) => tokens.push(Token {
                kind,
                span: Span::new(span.start, span.end),
            }),
            Err(()) => {
                return Err(StructscanErrorKind::parse_error(
                    span.start,
                    format!("unexpected character(s) '{}'", &source[span]),
                ))
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<(TokenKind, &str)> {
        lex(source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, &source[t.span.range()]))
            .collect()
    }

    #[test]
    fn test_lex_statement() {
        assert_eq!(
            texts("x += foo(1, \"a\\\"b\"); // done"),
            vec![
                (TokenKind::Ident, "x"),
                (TokenKind::Punct, "+="),
                (TokenKind::Ident, "foo"),
                (TokenKind::Punct, "("),
                (TokenKind::IntLiteral, "1"),
                (TokenKind::Punct, ","),
                (TokenKind::StringLiteral, "\"a\\\"b\""),
                (TokenKind::Punct, ")"),
                (TokenKind::Punct, ";"),
            ]
        );
    }

    #[test]
    fn test_lex_variables_and_generics() {
        assert_eq!(
            texts("List<List<$T>> $v$ = 1.5f;"),
            vec![
                (TokenKind::Ident, "List"),
                (TokenKind::Punct, "<"),
                (TokenKind::Ident, "List"),
                (TokenKind::Punct, "<"),
                (TokenKind::Ident, "$T"),
                (TokenKind::Punct, ">"),
                (TokenKind::Punct, ">"),
                (TokenKind::Ident, "$v$"),
                (TokenKind::Punct, "="),
                (TokenKind::FloatLiteral, "1.5f"),
                (TokenKind::Punct, ";"),
            ]
        );
    }

    #[test]
    fn test_lex_unicode_identifiers() {
        assert_eq!(
            texts("int é = größe$1;"),
            vec![
                (TokenKind::Ident, "int"),
                (TokenKind::Ident, "é"),
                (TokenKind::Punct, "="),
                (TokenKind::Ident, "größe$1"),
                (TokenKind::Punct, ";"),
            ]
        );
    }

    #[test]
    fn test_lex_error() {
        let err = lex("a # b").unwrap_err();
        assert!(err.to_string().contains("offset 2"), "{}", err);
    }
}
