//! Recursive descent parser for a Java subset.
//!
//! The parser builds the node arena of a [SyntaxTree] bottom-up, children are always created
//! before their parents. Speculative parses (local variable declarations, casts, enhanced for
//! headers) rewind both the token position and the arena on failure.
//!
//! Not supported: lambdas, method references, switch, anonymous classes, array initializers,
//! try-with-resources, interfaces and enums.

use std::collections::BTreeMap;

use log::trace;

use crate::{
    errors::StructscanErrorKind,
    tree::{is_multi_variable, is_variable, Node, NodeId, ParsedPattern, PatternForm},
    Kind, Result, Span, SyntaxTree,
};

use super::lexer::{lex, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParseMode {
    Source,
    Pattern,
}

/// Maximum nesting of statements, expressions and type arguments.
const MAX_NESTING: usize = 200;

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

const MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "native",
    "transient",
    "volatile",
    "strictfp",
    "synchronized",
    "default",
];

const KEYWORDS: &[&str] = &[
    "abstract",
    "assert",
    "boolean",
    "break",
    "byte",
    "case",
    "catch",
    "char",
    "class",
    "const",
    "continue",
    "default",
    "do",
    "double",
    "else",
    "enum",
    "extends",
    "final",
    "finally",
    "float",
    "for",
    "goto",
    "if",
    "implements",
    "import",
    "instanceof",
    "int",
    "interface",
    "long",
    "native",
    "new",
    "package",
    "private",
    "protected",
    "public",
    "return",
    "short",
    "static",
    "strictfp",
    "super",
    "switch",
    "synchronized",
    "this",
    "throw",
    "throws",
    "transient",
    "try",
    "void",
    "volatile",
    "while",
    "true",
    "false",
    "null",
];

/// Parses a source text into a tree.
pub(crate) fn parse_source(source: &str) -> Result<SyntaxTree> {
    let mut parser = Parser::new(source, lex(source)?, ParseMode::Source);
    let root = if parser.looks_like_compilation_unit() {
        parser.compilation_unit()?
    } else {
        parser.statements_root()?
    };
    trace!("Parsed source with {} nodes", parser.nodes.len());
    Ok(parser.finish(root))
}

/// Parses a pattern: a whole-input expression if possible, statements otherwise.
pub(crate) fn parse_pattern(text: &str) -> Result<ParsedPattern> {
    let tokens = lex(text)?;
    if tokens.is_empty() {
        return Err(StructscanErrorKind::parse_error(0, "empty pattern"));
    }

    let mut parser = Parser::new(text, tokens.clone(), ParseMode::Pattern);
    if let Ok(expression) = parser.expression() {
        if parser.at_eof() {
            let constraints = std::mem::take(&mut parser.constraints);
            return Ok(ParsedPattern {
                tree: parser.finish(expression),
                form: PatternForm::Expression,
                roots: vec![expression],
                constraints,
            });
        }
    }

    let mut parser = Parser::new(text, tokens, ParseMode::Pattern);
    let mut statements = Vec::new();
    while !parser.at_eof() {
        parser.block_statement(&mut statements)?;
    }
    let constraints = std::mem::take(&mut parser.constraints);
    if statements.len() == 1 && !parser.is_multi_statement_variable(statements[0]) {
        let statement = statements[0];
        return Ok(ParsedPattern {
            tree: parser.finish(statement),
            form: PatternForm::Statement,
            roots: statements,
            constraints,
        });
    }
    let block = parser.node(
        Kind::Block,
        None,
        statements.clone(),
        Span::new(0, text.len()),
    );
    Ok(ParsedPattern {
        tree: parser.finish(block),
        form: PatternForm::Statements,
        roots: statements,
        constraints,
    })
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    mode: ParseMode,
    depth: usize,
    nodes: Vec<Node>,
    constraints: BTreeMap<String, String>,
}

struct Checkpoint {
    pos: usize,
    nodes: usize,
    constraints: BTreeMap<String, String>,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str, tokens: Vec<Token>, mode: ParseMode) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            mode,
            depth: 0,
            nodes: Vec::new(),
            constraints: BTreeMap::new(),
        }
    }

    fn finish(self, root: NodeId) -> SyntaxTree {
        SyntaxTree::from_nodes(self.source, self.nodes, root)
    }

    // ---------------------------------------------------------------------------------------------
    // Token helpers
    // ---------------------------------------------------------------------------------------------

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn text_at(&self, n: usize) -> Option<&'s str> {
        let source = self.source;
        self.peek_at(n).map(|t| &source[t.span.range()])
    }

    fn at(&self, text: &str) -> bool {
        self.text_at(0) == Some(text)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn offset(&self) -> usize {
        self.peek_at(0).map_or(self.source.len(), |t| t.span.start)
    }

    fn bump(&mut self) -> Span {
        let span = self.tokens[self.pos].span;
        self.pos += 1;
        span
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(StructscanErrorKind::parse_error(self.offset(), message))
    }

    fn found(&self) -> String {
        self.text_at(0)
            .map_or("end of input".to_string(), |t| format!("'{}'", t))
    }

    /// Runs `f` one nesting level deeper. Fails instead of exhausting the stack on deeply nested
    /// input.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return self.error(format!("nesting too deep, more than {} levels", MAX_NESTING));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expect(&mut self, text: &str) -> Result<Span> {
        if self.at(text) {
            Ok(self.bump())
        } else {
            self.error(format!("expected '{}' but found {}", text, self.found()))
        }
    }

    fn at_name(&self) -> bool {
        matches!(self.peek_at(0), Some(t) if t.kind == TokenKind::Ident)
            && !KEYWORDS.contains(&self.text_at(0).unwrap_or_default())
    }

    fn name(&mut self) -> Result<(String, Span)> {
        if self.at_name() {
            let span = self.bump();
            Ok((self.source[span.range()].to_string(), span))
        } else {
            self.error(format!("expected a name but found {}", self.found()))
        }
    }

    fn at_primitive(&self) -> bool {
        self.text_at(0).is_some_and(|t| PRIMITIVES.contains(&t))
    }

    /// Tokens `a` and `b` touch each other without whitespace.
    fn adjacent(&self, a: usize, b: usize) -> bool {
        match (self.peek_at(a), self.peek_at(b)) {
            (Some(x), Some(y)) => x.span.end == y.span.start,
            _ => false,
        }
    }

    /// The operator at the current position together with the number of tokens it spans.
    fn operator(&self) -> Option<(String, usize)> {
        let token = self.peek_at(0)?;
        if token.kind != TokenKind::Punct {
            return None;
        }
        let op = |i: usize| self.text_at(i).filter(|_| self.adjacent(i - 1, i));
        match self.text_at(0)? {
            ">" => match op(1) {
                Some(">") => match op(2) {
                    Some(">") => Some((">>>".to_string(), 3)),
                    Some(">=") => Some((">>>=".to_string(), 3)),
                    _ => Some((">>".to_string(), 2)),
                },
                Some(">=") => Some((">>=".to_string(), 2)),
                _ => Some((">".to_string(), 1)),
            },
            text => Some((text.to_string(), 1)),
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            nodes: self.nodes.len(),
            constraints: self.constraints.clone(),
        }
    }

    fn rewind(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.nodes.truncate(checkpoint.nodes);
        self.constraints = checkpoint.constraints;
    }

    /// Runs a speculative parse, rewinding on failure.
    fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Option<T> {
        let checkpoint = self.checkpoint();
        match f(self) {
            Ok(value) => Some(value),
            Err(_) => {
                self.rewind(checkpoint);
                None
            }
        }
    }

    fn skip_balanced(&mut self, open: &str, close: &str) -> Result<()> {
        self.expect(open)?;
        let mut depth = 1;
        while depth > 0 {
            if self.at_eof() {
                return self.error(format!("expected '{}' but found end of input", close));
            }
            if self.at(open) {
                depth += 1;
            } else if self.at(close) {
                depth -= 1;
            }
            self.pos += 1;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // Node helpers
    // ---------------------------------------------------------------------------------------------

    fn node(&mut self, kind: Kind, text: Option<String>, children: Vec<NodeId>, span: Span) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node {
            kind,
            text,
            children,
            parent: None,
            span,
        });
        id
    }

    fn span(&self, id: NodeId) -> Span {
        self.nodes[id.as_usize()].span
    }

    fn from_to(&self, start: usize, id: NodeId) -> Span {
        Span::new(start, self.span(id).end)
    }

    /// The span covering a list of nodes, or an empty span at `offset`.
    fn list_span(&self, children: &[NodeId], offset: usize) -> Span {
        match (children.first(), children.last()) {
            (Some(first), Some(last)) => self.span(*first).cover(self.span(*last)),
            _ => Span::new(offset, offset),
        }
    }

    fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let node = self.nodes[id.as_usize()].clone();
        let children = node.children.iter().map(|c| self.clone_subtree(*c)).collect();
        self.node(node.kind, node.text, children, node.span)
    }

    /// Parses a type and discards its nodes.
    fn skip_type(&mut self) -> Result<()> {
        let nodes = self.nodes.len();
        self.parse_type(true)?;
        self.nodes.truncate(nodes);
        Ok(())
    }

    fn is_multi_statement_variable(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.as_usize()];
        if node.kind != Kind::ExpressionStatement || node.children.len() != 1 {
            return false;
        }
        let child = &self.nodes[node.children[0].as_usize()];
        child.kind == Kind::Identifier && child.text.as_deref().is_some_and(is_multi_variable)
    }

    // ---------------------------------------------------------------------------------------------
    // Declarations
    // ---------------------------------------------------------------------------------------------

    fn looks_like_compilation_unit(&self) -> bool {
        let mut i = 0;
        loop {
            match self.text_at(i) {
                Some("package") | Some("import") | Some("class") => return true,
                Some("@") => i += 2,
                Some("synchronized") if self.text_at(i + 1) == Some("(") => return false,
                Some(t) if MODIFIERS.contains(&t) => i += 1,
                _ => return false,
            }
        }
    }

    fn modifiers(&mut self) -> Result<()> {
        loop {
            if self.at("@") && self.text_at(1) != Some("interface") {
                self.bump();
                self.name()?;
                while self.at(".") {
                    self.bump();
                    self.name()?;
                }
                if self.at("(") {
                    self.skip_balanced("(", ")")?;
                }
            } else if self
                .text_at(0)
                .is_some_and(|t| MODIFIERS.contains(&t))
                && !(self.at("synchronized") && self.text_at(1) == Some("("))
            {
                self.bump();
            } else {
                return Ok(());
            }
        }
    }

    fn compilation_unit(&mut self) -> Result<NodeId> {
        if self.eat("package") {
            self.name()?;
            while self.eat(".") {
                self.name()?;
            }
            self.expect(";")?;
        }
        while self.eat("import") {
            while !self.at(";") && !self.at_eof() {
                self.bump();
            }
            self.expect(";")?;
        }
        let mut classes = Vec::new();
        while !self.at_eof() {
            let start = self.offset();
            self.modifiers()?;
            classes.push(self.nested(|p| p.class_decl(start))?);
        }
        Ok(self.node(
            Kind::CompilationUnit,
            None,
            classes,
            Span::new(0, self.source.len()),
        ))
    }

    /// Parses a class declaration, the modifiers are already consumed.
    fn class_decl(&mut self, start: usize) -> Result<NodeId> {
        self.expect("class")?;
        let (name, _) = self.name()?;
        if self.at("<") {
            self.skip_balanced("<", ">")?;
        }
        if self.eat("extends") {
            self.skip_type()?;
        }
        if self.eat("implements") {
            self.skip_type()?;
            while self.eat(",") {
                self.skip_type()?;
            }
        }
        self.expect("{")?;
        let mut members = Vec::new();
        while !self.at("}") {
            if self.at_eof() {
                return self.error("expected '}' but found end of input");
            }
            self.member(&mut members)?;
        }
        let end = self.expect("}")?.end;
        Ok(self.node(Kind::ClassDecl, Some(name), members, Span::new(start, end)))
    }

    fn member(&mut self, out: &mut Vec<NodeId>) -> Result<()> {
        let start = self.offset();
        if self.eat(";") {
            return Ok(());
        }
        self.modifiers()?;
        if self.at("class") {
            out.push(self.nested(|p| p.class_decl(start))?);
            return Ok(());
        }
        if self.at("{") {
            out.push(self.block()?);
            return Ok(());
        }
        if self.at("<") {
            self.skip_balanced("<", ">")?;
        }
        if self.at_name() && self.text_at(1) == Some("(") {
            // Constructor
            let (name, _) = self.name()?;
            let return_type = self.node(Kind::Empty, None, Vec::new(), Span::new(start, start));
            out.push(self.method_rest(start, name, return_type)?);
            return Ok(());
        }
        let ty = self.parse_type(true)?;
        let (name, _) = self.name()?;
        if self.at("(") {
            out.push(self.method_rest(start, name, ty)?);
        } else {
            self.declarators(start, ty, name, out)?;
            self.expect(";")?;
        }
        Ok(())
    }

    fn method_rest(&mut self, start: usize, name: String, return_type: NodeId) -> Result<NodeId> {
        let params_start = self.expect("(")?.start;
        let mut params = Vec::new();
        while !self.at(")") {
            if !params.is_empty() {
                self.expect(",")?;
            }
            let param_start = self.offset();
            self.modifiers()?;
            let mut ty = self.parse_type(true)?;
            if self.eat("...") {
                let span = self.from_to(param_start, ty);
                ty = self.node(Kind::ArrayType, None, vec![ty], span);
            }
            let (param_name, name_span) = self.name()?;
            params.push(self.node(
                Kind::VariableDecl,
                Some(param_name),
                vec![ty],
                Span::new(param_start, name_span.end),
            ));
        }
        let params_end = self.expect(")")?.end;
        let params = self.node(
            Kind::Parameters,
            None,
            params,
            Span::new(params_start, params_end),
        );
        if self.eat("throws") {
            self.skip_type()?;
            while self.eat(",") {
                self.skip_type()?;
            }
        }
        let body = if self.at("{") {
            self.block()?
        } else {
            let span = self.expect(";")?;
            self.node(Kind::Empty, None, Vec::new(), span)
        };
        let span = self.from_to(start, body);
        Ok(self.node(
            Kind::MethodDecl,
            Some(name),
            vec![return_type, params, body],
            span,
        ))
    }

    /// Parses the declarators after `type name`, one variable declaration per declarator.
    fn declarators(
        &mut self,
        start: usize,
        ty: NodeId,
        name: String,
        out: &mut Vec<NodeId>,
    ) -> Result<()> {
        let mut start = start;
        let mut name = name;
        let mut ty = ty;
        loop {
            let mut children = vec![ty];
            let mut end = self.tokens[self.pos - 1].span.end;
            if self.eat("=") {
                if self.at("{") {
                    return self.error("array initializers are not supported");
                }
                let init = self.expression()?;
                end = self.span(init).end;
                children.push(init);
            }
            out.push(self.node(Kind::VariableDecl, Some(name), children, Span::new(start, end)));
            if !self.eat(",") {
                return Ok(());
            }
            let (next, span) = self.name()?;
            start = span.start;
            name = next;
            ty = self.clone_subtree(ty);
        }
    }

    /// `[final] Type name [= init] {, name [= init]}`, without the terminating semicolon.
    fn local_variable_decl(&mut self, out: &mut Vec<NodeId>) -> Result<()> {
        let start = self.offset();
        self.modifiers()?;
        let ty = self.parse_type(true)?;
        let (name, _) = self.name()?;
        if !(self.at("=") || self.at(";") || self.at(",")) {
            return self.error(format!(
                "expected '=', ',' or ';' but found {}",
                self.found()
            ));
        }
        self.declarators(start, ty, name, out)
    }

    // ---------------------------------------------------------------------------------------------
    // Types
    // ---------------------------------------------------------------------------------------------

    fn parse_type(&mut self, allow_array: bool) -> Result<NodeId> {
        let start = self.offset();
        let mut ty = if self.at_primitive() {
            let span = self.bump();
            self.node(
                Kind::PrimitiveType,
                Some(self.source[span.range()].to_string()),
                Vec::new(),
                span,
            )
        } else {
            let (name, span) = self.name()?;
            let mut ty = self.node(Kind::Identifier, Some(name), Vec::new(), span);
            loop {
                if self.at("<") {
                    ty = self.nested(|p| p.type_arguments(start, ty))?;
                }
                if self.at(".") && matches!(self.peek_at(1), Some(t) if t.kind == TokenKind::Ident)
                {
                    self.bump();
                    let (member, span) = self.name()?;
                    ty = self.node(
                        Kind::MemberSelect,
                        Some(member),
                        vec![ty],
                        Span::new(start, span.end),
                    );
                } else {
                    break;
                }
            }
            ty
        };
        if allow_array {
            while self.at("[") && self.text_at(1) == Some("]") {
                self.bump();
                let end = self.bump().end;
                ty = self.node(Kind::ArrayType, None, vec![ty], Span::new(start, end));
            }
        }
        Ok(ty)
    }

    fn type_arguments(&mut self, start: usize, base: NodeId) -> Result<NodeId> {
        self.expect("<")?;
        let mut children = vec![base];
        while !self.at(">") {
            if children.len() > 1 {
                self.expect(",")?;
            }
            if self.at("?") {
                let span = self.bump();
                children.push(self.node(Kind::Identifier, Some("?".to_string()), Vec::new(), span));
                if self.eat("extends") || self.eat("super") {
                    self.skip_type()?;
                }
            } else {
                children.push(self.parse_type(true)?);
            }
        }
        let end = self.expect(">")?.end;
        Ok(self.node(Kind::ParameterizedType, None, children, Span::new(start, end)))
    }

    // ---------------------------------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------------------------------

    fn statements_root(&mut self) -> Result<NodeId> {
        let mut statements = Vec::new();
        while !self.at_eof() {
            self.block_statement(&mut statements)?;
        }
        Ok(self.node(
            Kind::Block,
            None,
            statements,
            Span::new(0, self.source.len()),
        ))
    }

    fn block(&mut self) -> Result<NodeId> {
        let start = self.expect("{")?.start;
        let mut statements = Vec::new();
        while !self.at("}") {
            if self.at_eof() {
                return self.error("expected '}' but found end of input");
            }
            self.block_statement(&mut statements)?;
        }
        let end = self.expect("}")?.end;
        Ok(self.node(Kind::Block, None, statements, Span::new(start, end)))
    }

    fn block_statement(&mut self, out: &mut Vec<NodeId>) -> Result<()> {
        if self.at("class") {
            let start = self.offset();
            out.push(self.nested(|p| p.class_decl(start))?);
            return Ok(());
        }
        let declarations = self.attempt(|p| {
            let mut declarations = Vec::new();
            p.local_variable_decl(&mut declarations)?;
            p.expect(";")?;
            Ok(declarations)
        });
        match declarations {
            Some(declarations) => out.extend(declarations),
            None => out.push(self.statement()?),
        }
        Ok(())
    }

    fn statement(&mut self) -> Result<NodeId> {
        self.nested(Self::statement_body)
    }

    fn statement_body(&mut self) -> Result<NodeId> {
        let start = self.offset();
        match self.text_at(0) {
            None => self.error("expected a statement but found end of input"),
            Some("{") => self.block(),
            Some(";") => {
                let span = self.bump();
                Ok(self.node(Kind::EmptyStatement, None, Vec::new(), span))
            }
            Some("if") => {
                self.bump();
                let condition = self.parenthesized_condition()?;
                let then = self.statement()?;
                let mut children = vec![condition, then];
                if self.eat("else") {
                    children.push(self.statement()?);
                }
                let end = self.span(children[children.len() - 1]).end;
                Ok(self.node(Kind::If, None, children, Span::new(start, end)))
            }
            Some("while") => {
                self.bump();
                let condition = self.parenthesized_condition()?;
                let body = self.statement()?;
                let span = self.from_to(start, body);
                Ok(self.node(Kind::While, None, vec![condition, body], span))
            }
            Some("do") => {
                self.bump();
                let body = self.statement()?;
                self.expect("while")?;
                let condition = self.parenthesized_condition()?;
                let end = self.expect(";")?.end;
                Ok(self.node(
                    Kind::DoWhile,
                    None,
                    vec![body, condition],
                    Span::new(start, end),
                ))
            }
            Some("for") => self.for_statement(),
            Some("return") => {
                self.bump();
                let mut children = Vec::new();
                if !self.at(";") {
                    children.push(self.expression()?);
                }
                let end = self.expect(";")?.end;
                Ok(self.node(Kind::Return, None, children, Span::new(start, end)))
            }
            Some(keyword @ ("break" | "continue")) => {
                self.bump();
                let kind = if keyword == "break" {
                    Kind::Break
                } else {
                    Kind::Continue
                };
                let label = if self.at(";") {
                    None
                } else {
                    Some(self.name()?.0)
                };
                let end = self.expect(";")?.end;
                Ok(self.node(kind, label, Vec::new(), Span::new(start, end)))
            }
            Some("throw") => {
                self.bump();
                let expression = self.expression()?;
                let end = self.expect(";")?.end;
                Ok(self.node(Kind::Throw, None, vec![expression], Span::new(start, end)))
            }
            Some("synchronized") => {
                self.bump();
                let lock = self.parenthesized_condition()?;
                let body = self.block()?;
                let span = self.from_to(start, body);
                Ok(self.node(Kind::Synchronized, None, vec![lock, body], span))
            }
            Some("try") => self.try_statement(),
            Some("assert") => {
                self.bump();
                let mut children = vec![self.expression()?];
                if self.eat(":") {
                    children.push(self.expression()?);
                }
                let end = self.expect(";")?.end;
                Ok(self.node(Kind::Assert, None, children, Span::new(start, end)))
            }
            Some("switch") => self.error("switch statements are not supported"),
            Some(_) if self.at_name() && self.text_at(1) == Some(":") => {
                let (label, _) = self.name()?;
                self.bump();
                let statement = self.statement()?;
                let span = self.from_to(start, statement);
                Ok(self.node(Kind::Labeled, Some(label), vec![statement], span))
            }
            Some(_) => {
                let expression = self.expression()?;
                let end = self.expect(";")?.end;
                Ok(self.node(
                    Kind::ExpressionStatement,
                    None,
                    vec![expression],
                    Span::new(start, end),
                ))
            }
        }
    }

    fn parenthesized_condition(&mut self) -> Result<NodeId> {
        self.expect("(")?;
        let condition = self.expression()?;
        self.expect(")")?;
        Ok(condition)
    }

    fn for_statement(&mut self) -> Result<NodeId> {
        let start = self.expect("for")?.start;
        self.expect("(")?;
        let header = self.attempt(|p| {
            let var_start = p.offset();
            p.modifiers()?;
            let ty = p.parse_type(true)?;
            let (name, name_span) = p.name()?;
            p.expect(":")?;
            Ok(p.node(
                Kind::VariableDecl,
                Some(name),
                vec![ty],
                Span::new(var_start, name_span.end),
            ))
        });
        if let Some(variable) = header {
            let iterable = self.expression()?;
            self.expect(")")?;
            let body = self.statement()?;
            let span = self.from_to(start, body);
            return Ok(self.node(Kind::EnhancedFor, None, vec![variable, iterable, body], span));
        }

        let mut init = Vec::new();
        if !self.at(";") {
            let declarations = self.attempt(|p| {
                let mut declarations = Vec::new();
                p.local_variable_decl(&mut declarations)?;
                Ok(declarations)
            });
            match declarations {
                Some(declarations) => init = declarations,
                None => init = self.expression_statements(";")?,
            }
        }
        let init_span = self.list_span(&init, self.offset());
        let init = self.node(Kind::ForInit, None, init, init_span);
        self.expect(";")?;
        let condition = if self.at(";") {
            let offset = self.offset();
            self.node(Kind::Empty, None, Vec::new(), Span::new(offset, offset))
        } else {
            self.expression()?
        };
        self.expect(";")?;
        let update = self.expression_statements(")")?;
        let update_span = self.list_span(&update, self.offset());
        let update = self.node(Kind::ForUpdate, None, update, update_span);
        self.expect(")")?;
        let body = self.statement()?;
        let span = self.from_to(start, body);
        Ok(self.node(Kind::For, None, vec![init, condition, update, body], span))
    }

    /// Comma separated expressions up to `end`, each wrapped in an expression statement.
    fn expression_statements(&mut self, end: &str) -> Result<Vec<NodeId>> {
        let mut statements = Vec::new();
        while !self.at(end) {
            if !statements.is_empty() {
                self.expect(",")?;
            }
            let expression = self.expression()?;
            let span = self.span(expression);
            statements.push(self.node(Kind::ExpressionStatement, None, vec![expression], span));
        }
        Ok(statements)
    }

    fn try_statement(&mut self) -> Result<NodeId> {
        let start = self.expect("try")?.start;
        if self.at("(") {
            return self.error("try-with-resources is not supported");
        }
        let mut children = vec![self.block()?];
        while self.at("catch") {
            let catch_start = self.bump().start;
            self.expect("(")?;
            let var_start = self.offset();
            self.modifiers()?;
            let ty = self.parse_type(true)?;
            while self.eat("|") {
                self.skip_type()?;
            }
            let (name, name_span) = self.name()?;
            self.expect(")")?;
            let variable = self.node(
                Kind::VariableDecl,
                Some(name),
                vec![ty],
                Span::new(var_start, name_span.end),
            );
            let body = self.block()?;
            let span = self.from_to(catch_start, body);
            children.push(self.node(Kind::Catch, None, vec![variable, body], span));
        }
        if self.at("finally") {
            let finally_start = self.bump().start;
            let body = self.block()?;
            let span = self.from_to(finally_start, body);
            children.push(self.node(Kind::Finally, None, vec![body], span));
        }
        if children.len() == 1 {
            return self.error(format!(
                "expected 'catch' or 'finally' but found {}",
                self.found()
            ));
        }
        let span = self.from_to(start, *children.last().unwrap_or(&children[0]));
        Ok(self.node(Kind::Try, None, children, span))
    }

    // ---------------------------------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------------------------------

    fn expression(&mut self) -> Result<NodeId> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> Result<NodeId> {
        let lhs = self.conditional()?;
        match self.operator() {
            Some((op, count)) if is_assignment_operator(&op) => {
                self.pos += count;
                let rhs = self.expression()?;
                let span = self.span(lhs).cover(self.span(rhs));
                if op == "=" {
                    Ok(self.node(Kind::Assignment, None, vec![lhs, rhs], span))
                } else {
                    Ok(self.node(Kind::CompoundAssignment, Some(op), vec![lhs, rhs], span))
                }
            }
            _ => Ok(lhs),
        }
    }

    fn conditional(&mut self) -> Result<NodeId> {
        let condition = self.binary(1)?;
        if !self.eat("?") {
            return Ok(condition);
        }
        let then = self.expression()?;
        self.expect(":")?;
        let otherwise = self.conditional()?;
        let span = self.span(condition).cover(self.span(otherwise));
        Ok(self.node(
            Kind::Conditional,
            None,
            vec![condition, then, otherwise],
            span,
        ))
    }

    fn binary(&mut self, min_precedence: u8) -> Result<NodeId> {
        let mut lhs = self.unary()?;
        loop {
            if self.at("instanceof") && INSTANCEOF_PRECEDENCE >= min_precedence {
                self.bump();
                let ty = self.parse_type(true)?;
                let span = self.span(lhs).cover(self.span(ty));
                lhs = self.node(Kind::InstanceOf, None, vec![lhs, ty], span);
                continue;
            }
            let Some((op, count)) = self.operator() else {
                break;
            };
            let Some(precedence) = binary_precedence(&op) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.pos += count;
            let rhs = self.binary(precedence + 1)?;
            let span = self.span(lhs).cover(self.span(rhs));
            lhs = self.node(Kind::Binary, Some(op), vec![lhs, rhs], span);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<NodeId> {
        let start = self.offset();
        if let Some(op) = self
            .text_at(0)
            .filter(|t| ["+", "-", "!", "~", "++", "--"].contains(t))
        {
            self.bump();
            let operand = self.nested(Self::unary)?;
            let span = self.from_to(start, operand);
            return Ok(self.node(Kind::Unary, Some(op.to_string()), vec![operand], span));
        }
        if self.at("(") {
            if let Some(cast) = self.attempt(|p| p.cast()) {
                return Ok(cast);
            }
        }
        self.postfix()
    }

    fn cast(&mut self) -> Result<NodeId> {
        let start = self.expect("(")?.start;
        let primitive = self.at_primitive();
        let ty = self.parse_type(true)?;
        self.expect(")")?;
        let operand_follows = match self.peek_at(0) {
            None => false,
            Some(_) if primitive => true,
            Some(t) => match t.kind {
                TokenKind::Ident => !self.at("instanceof"),
                TokenKind::Punct => self.at("(") || self.at("!") || self.at("~"),
                _ => true,
            },
        };
        if !operand_follows {
            return self.error("not a cast");
        }
        let operand = self.nested(Self::unary)?;
        let span = self.from_to(start, operand);
        Ok(self.node(Kind::TypeCast, None, vec![ty, operand], span))
    }

    fn postfix(&mut self) -> Result<NodeId> {
        let start = self.offset();
        let mut expression = self.primary()?;
        loop {
            if self.eat(".") {
                if !matches!(self.peek_at(0), Some(t) if t.kind == TokenKind::Ident) {
                    return self.error(format!("expected a member name but found {}", self.found()));
                }
                let span = self.bump();
                let member = self.source[span.range()].to_string();
                let select = self.node(
                    Kind::MemberSelect,
                    Some(member),
                    vec![expression],
                    Span::new(start, span.end),
                );
                expression = if self.at("(") {
                    let arguments = self.arguments()?;
                    let span = self.from_to(start, arguments);
                    self.node(Kind::MethodInvocation, None, vec![select, arguments], span)
                } else {
                    select
                };
            } else if self.eat("[") {
                let index = self.expression()?;
                let end = self.expect("]")?.end;
                expression = self.node(
                    Kind::ArrayAccess,
                    None,
                    vec![expression, index],
                    Span::new(start, end),
                );
            } else if self.at("++") || self.at("--") {
                let span = self.bump();
                let op = format!("post{}", &self.source[span.range()]);
                expression = self.node(Kind::Unary, Some(op), vec![expression], Span::new(start, span.end));
            } else if self.at("::") || self.at("->") {
                return self.error("lambdas and method references are not supported");
            } else {
                return Ok(expression);
            }
        }
    }

    fn primary(&mut self) -> Result<NodeId> {
        let Some(token) = self.peek_at(0).copied() else {
            return self.error("expected an expression but found end of input");
        };
        let source = self.source;
        let text = &source[token.span.range()];
        let literal = match token.kind {
            TokenKind::IntLiteral => Some(Kind::IntLiteral),
            TokenKind::FloatLiteral => Some(Kind::FloatLiteral),
            TokenKind::StringLiteral => Some(Kind::StringLiteral),
            TokenKind::CharLiteral => Some(Kind::CharLiteral),
            TokenKind::Ident if text == "true" || text == "false" => Some(Kind::BooleanLiteral),
            TokenKind::Ident if text == "null" => Some(Kind::NullLiteral),
            _ => None,
        };
        if let Some(kind) = literal {
            self.bump();
            return Ok(self.node(kind, Some(text.to_string()), Vec::new(), token.span));
        }
        match token.kind {
            TokenKind::Punct if text == "(" => {
                self.bump();
                let expression = self.expression()?;
                let end = self.expect(")")?.end;
                Ok(self.node(
                    Kind::Parenthesized,
                    None,
                    vec![expression],
                    Span::new(token.span.start, end),
                ))
            }
            TokenKind::Ident if text == "new" => self.creator(),
            TokenKind::Ident if PRIMITIVES.contains(&text) => {
                let ty = self.parse_type(true)?;
                self.expect(".")?;
                let end = self.expect("class")?.end;
                Ok(self.node(
                    Kind::MemberSelect,
                    Some("class".to_string()),
                    vec![ty],
                    Span::new(token.span.start, end),
                ))
            }
            TokenKind::Ident if text == "this" || text == "super" || !KEYWORDS.contains(&text) => {
                self.bump();
                let mut span = token.span;
                if self.mode == ParseMode::Pattern
                    && is_variable(text)
                    && self.at("{")
                    && token.span.end == self.offset()
                {
                    span = span.cover(self.type_constraint(text)?);
                }
                let identifier = self.node(Kind::Identifier, Some(text.to_string()), Vec::new(), span);
                if self.at("(") {
                    let arguments = self.arguments()?;
                    let span = self.from_to(token.span.start, arguments);
                    return Ok(self.node(
                        Kind::MethodInvocation,
                        None,
                        vec![identifier, arguments],
                        span,
                    ));
                }
                Ok(identifier)
            }
            _ => self.error(format!("expected an expression but found {}", self.found())),
        }
    }

    /// Parses `{Type}` after a pattern variable and records the constraint.
    fn type_constraint(&mut self, variable: &str) -> Result<Span> {
        let open = self.expect("{")?;
        let mut depth = 1;
        let mut close = open;
        while depth > 0 {
            if self.at_eof() {
                return self.error("unterminated type constraint");
            }
            if self.at("{") {
                depth += 1;
            } else if self.at("}") {
                depth -= 1;
            }
            close = self.bump();
        }
        let ty = self.source[open.end..close.start].trim();
        if ty.is_empty() {
            return Err(StructscanErrorKind::parse_error(open.end, "empty type constraint"));
        }
        self.constraints.insert(variable.to_string(), ty.to_string());
        Ok(open.cover(close))
    }

    fn arguments(&mut self) -> Result<NodeId> {
        let start = self.expect("(")?.start;
        let mut arguments = Vec::new();
        while !self.at(")") {
            if !arguments.is_empty() {
                self.expect(",")?;
            }
            arguments.push(self.expression()?);
        }
        let end = self.expect(")")?.end;
        Ok(self.node(Kind::Arguments, None, arguments, Span::new(start, end)))
    }

    fn creator(&mut self) -> Result<NodeId> {
        let start = self.expect("new")?.start;
        let ty = self.parse_type(false)?;
        if self.at("(") {
            let arguments = self.arguments()?;
            if self.at("{") {
                return self.error("anonymous classes are not supported");
            }
            let span = self.from_to(start, arguments);
            return Ok(self.node(Kind::NewClass, None, vec![ty, arguments], span));
        }
        if !self.at("[") {
            return self.error(format!("expected '(' or '[' but found {}", self.found()));
        }
        let mut children = vec![ty];
        let mut end = start;
        while self.eat("[") {
            if !self.at("]") {
                children.push(self.expression()?);
            }
            end = self.expect("]")?.end;
        }
        if self.at("{") {
            return self.error("array initializers are not supported");
        }
        Ok(self.node(Kind::NewArray, None, children, Span::new(start, end)))
    }
}

const INSTANCEOF_PRECEDENCE: u8 = 7;

fn binary_precedence(op: &str) -> Option<u8> {
    match op {
        "||" => Some(1),
        "&&" => Some(2),
        "|" => Some(3),
        "^" => Some(4),
        "&" => Some(5),
        "==" | "!=" => Some(6),
        "<" | ">" | "<=" | ">=" => Some(INSTANCEOF_PRECEDENCE),
        "<<" | ">>" | ">>>" => Some(8),
        "+" | "-" => Some(9),
        "*" | "/" | "%" => Some(10),
        _ => None,
    }
}

fn is_assignment_operator(op: &str) -> bool {
    matches!(
        op,
        "=" | "+="
            | "-="
            | "*="
            | "/="
            | "%="
            | "&="
            | "|="
            | "^="
            | "<<="
            | ">>="
            | ">>>="
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tree: &SyntaxTree) -> Vec<Kind> {
        tree.preorder(tree.root()).map(|id| tree.kind(id)).collect()
    }

    fn find(tree: &SyntaxTree, kind: Kind) -> NodeId {
        tree.preorder(tree.root())
            .find(|id| tree.kind(*id) == kind)
            .unwrap()
    }

    #[test]
    fn test_compilation_unit() {
        let source = r#"
            package a.b;
            import java.util.List;
            public class Foo<T> extends Bar implements Baz {
                private int x = 1, y;
                public Foo() { super(); }
                @Override
                public List<String> names(final int count, String... rest) throws Exception {
                    return null;
                }
            }
        "#;
        let tree = SyntaxTree::parse_source(source).unwrap();
        assert_eq!(tree.kind(tree.root()), Kind::CompilationUnit);
        let class = tree.children(tree.root())[0];
        assert_eq!(tree.text(class), Some("Foo"));
        let members: Vec<(Kind, Option<&str>)> = tree
            .children(class)
            .iter()
            .map(|id| (tree.kind(*id), tree.text(*id)))
            .collect();
        assert_eq!(
            members,
            vec![
                (Kind::VariableDecl, Some("x")),
                (Kind::VariableDecl, Some("y")),
                (Kind::MethodDecl, Some("Foo")),
                (Kind::MethodDecl, Some("names")),
            ]
        );
        let names = tree.children(class)[3];
        let parameters = tree.children(names)[1];
        assert_eq!(tree.kind(parameters), Kind::Parameters);
        assert_eq!(tree.children(parameters).len(), 2);
        let rest_type = tree.children(tree.children(parameters)[1])[0];
        assert_eq!(tree.kind(rest_type), Kind::ArrayType);
    }

    #[test]
    fn test_statements() {
        let tree = SyntaxTree::parse_source(
            "for (int i = 0; i < n; i++) { if (a) break; else continue outer; }",
        )
        .unwrap();
        assert_eq!(
            kinds(&tree),
            vec![
                Kind::Block,
                Kind::For,
                Kind::ForInit,
                Kind::VariableDecl,
                Kind::PrimitiveType,
                Kind::IntLiteral,
                Kind::Binary,
                Kind::Identifier,
                Kind::Identifier,
                Kind::ForUpdate,
                Kind::ExpressionStatement,
                Kind::Unary,
                Kind::Identifier,
                Kind::Block,
                Kind::If,
                Kind::Identifier,
                Kind::Break,
                Kind::Continue,
            ]
        );
        let continue_statement = find(&tree, Kind::Continue);
        assert_eq!(tree.text(continue_statement), Some("outer"));
        assert_eq!(tree.text(find(&tree, Kind::Unary)), Some("post++"));
    }

    #[test]
    fn test_try_and_enhanced_for() {
        let tree = SyntaxTree::parse_source(
            "try { for (String s : list) use(s); } catch (IOException | RuntimeException e) { } finally { close(); }",
        )
        .unwrap();
        let try_statement = find(&tree, Kind::Try);
        let children: Vec<Kind> = tree
            .children(try_statement)
            .iter()
            .map(|id| tree.kind(*id))
            .collect();
        assert_eq!(children, vec![Kind::Block, Kind::Catch, Kind::Finally]);
        let enhanced_for = find(&tree, Kind::EnhancedFor);
        let variable = tree.children(enhanced_for)[0];
        assert_eq!(tree.text(variable), Some("s"));
    }

    #[test]
    fn test_precedence_and_shifts() {
        let tree = SyntaxTree::parse_source("x = a + b * c >> 2 == d;").unwrap();
        let assignment = find(&tree, Kind::Assignment);
        let rhs = tree.children(assignment)[1];
        assert_eq!(tree.text(rhs), Some("=="));
        let shift = tree.children(rhs)[0];
        assert_eq!(tree.text(shift), Some(">>"));
        let sum = tree.children(shift)[0];
        assert_eq!(tree.text(sum), Some("+"));
        assert_eq!(tree.source_text(tree.children(sum)[1]), "b * c");

        let tree = SyntaxTree::parse_source("Map<String, List<Integer>> m = new HashMap<>();")
            .unwrap();
        let declaration = find(&tree, Kind::VariableDecl);
        assert_eq!(tree.text(declaration), Some("m"));
        assert_eq!(
            tree.kind(tree.children(declaration)[0]),
            Kind::ParameterizedType
        );
    }

    #[test]
    fn test_casts_and_parentheses() {
        let tree = SyntaxTree::parse_source("y = (int) x; z = (a) + b; w = (String) o;").unwrap();
        let casts = tree
            .preorder(tree.root())
            .filter(|id| tree.kind(*id) == Kind::TypeCast)
            .count();
        assert_eq!(casts, 2);
        assert!(tree
            .preorder(tree.root())
            .any(|id| tree.kind(id) == Kind::Parenthesized));
    }

    #[test]
    fn test_pattern_forms() {
        let pattern = SyntaxTree::parse_pattern("$a.equals($b)").unwrap();
        assert_eq!(pattern.form(), PatternForm::Expression);
        assert_eq!(pattern.tree().kind(pattern.roots()[0]), Kind::MethodInvocation);

        let pattern = SyntaxTree::parse_pattern("return $val$;").unwrap();
        assert_eq!(pattern.form(), PatternForm::Statement);
        assert_eq!(pattern.tree().kind(pattern.tree().root()), Kind::Return);

        let pattern = SyntaxTree::parse_pattern("$s$; foo();").unwrap();
        assert_eq!(pattern.form(), PatternForm::Statements);
        assert_eq!(pattern.roots().len(), 2);
        assert_eq!(pattern.tree().kind(pattern.tree().root()), Kind::Block);

        let pattern = SyntaxTree::parse_pattern("$s$;").unwrap();
        assert_eq!(pattern.form(), PatternForm::Statements);
    }

    #[test]
    fn test_type_constraints() {
        let pattern = SyntaxTree::parse_pattern("$l{java.util.List}.size() == 0").unwrap();
        assert_eq!(
            pattern.constraints().get("$l").map(String::as_str),
            Some("java.util.List")
        );
        let select = find(pattern.tree(), Kind::MemberSelect);
        assert_eq!(pattern.tree().text(select), Some("size"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(SyntaxTree::parse_pattern("").is_err());
        assert!(SyntaxTree::parse_pattern("return ;;(").is_err());
        assert!(SyntaxTree::parse_source("x = ;").is_err());
        let err = SyntaxTree::parse_source("switch (x) { }").unwrap_err();
        assert!(err.to_string().contains("switch"), "{}", err);
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("x = {}1{};", "(".repeat(depth), ")".repeat(depth));
        assert!(SyntaxTree::parse_source(&nested(150)).is_ok());
        let err = SyntaxTree::parse_source(&nested(500)).unwrap_err();
        assert!(err.to_string().contains("nesting too deep"), "{}", err);
        let err = SyntaxTree::parse_source(&format!("{}{}", "{".repeat(500), "}".repeat(500)))
            .unwrap_err();
        assert!(err.to_string().contains("nesting too deep"), "{}", err);
        let err = SyntaxTree::parse_source(&format!("x = {}y;", "!".repeat(500))).unwrap_err();
        assert!(err.to_string().contains("nesting too deep"), "{}", err);
        // Long operator chains are parsed in a loop and are not limited.
        let chain = format!("x = {}a;", "a + ".repeat(5000));
        assert!(SyntaxTree::parse_source(&chain).is_ok());
    }
}
