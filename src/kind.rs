//! Module with the node kinds of syntax trees.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! kinds {
    ($($(#[$doc:meta])* $name:ident,)*) => {
        /// The kind of a syntax tree node.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[repr(u8)]
        pub enum Kind {
            $($(#[$doc])* $name,)*
        }

        impl Kind {
            /// All kinds in ordinal order.
            pub const ALL: &'static [Kind] = &[$(Kind::$name,)*];
        }
    };
}

kinds! {
    /// Root of a parsed source file.
    CompilationUnit,
    /// A class declaration, named.
    ClassDecl,
    /// A method declaration, named. Children: return type, parameters, body.
    MethodDecl,
    /// The parameter list of a method.
    Parameters,
    /// A field, local variable, parameter or catch variable, named. Children: type, initializer.
    VariableDecl,
    /// A block of statements.
    Block,
    /// `;`
    EmptyStatement,
    /// An expression used as statement.
    ExpressionStatement,
    /// Children: condition, then, optional else.
    If,
    /// Children: condition, body.
    While,
    /// Children: body, condition.
    DoWhile,
    /// Children: init, condition (or [Kind::Empty]), update, body.
    For,
    /// Init statements of a for loop.
    ForInit,
    /// Update expressions of a for loop.
    ForUpdate,
    /// Children: variable, iterable expression, body.
    EnhancedFor,
    /// Children: optional expression.
    Return,
    /// Named with the optional label.
    Break,
    /// Named with the optional label.
    Continue,
    /// Children: expression.
    Throw,
    /// Children: lock expression, block.
    Synchronized,
    /// Children: block, catches, optional finally.
    Try,
    /// Children: variable, block.
    Catch,
    /// Children: block.
    Finally,
    /// A labeled statement, named with the label.
    Labeled,
    /// Children: condition, optional detail.
    Assert,
    /// A simple name.
    Identifier,
    /// `expr.name`, named with the member name.
    MemberSelect,
    /// Children: method select, arguments.
    MethodInvocation,
    /// Argument list of an invocation or instance creation.
    Arguments,
    /// Children: class type, arguments.
    NewClass,
    /// Children: element type, dimension expressions.
    NewArray,
    /// Children: variable, expression.
    Assignment,
    /// Named with the operator, e.g. `+=`.
    CompoundAssignment,
    /// Named with the operator.
    Binary,
    /// Named with the operator, postfix operators carry a `post` prefix.
    Unary,
    /// Children: condition, true expression, false expression.
    Conditional,
    /// Children: expression, type.
    InstanceOf,
    /// Children: type, expression.
    TypeCast,
    /// Children: expression.
    Parenthesized,
    /// Children: array, index.
    ArrayAccess,
    /// Named with the primitive type keyword.
    PrimitiveType,
    /// Children: element type.
    ArrayType,
    /// Children: base type, type arguments.
    ParameterizedType,
    /// Integral literal, the value is the node text.
    IntLiteral,
    /// Floating point literal.
    FloatLiteral,
    /// String literal including the quotes.
    StringLiteral,
    /// Character literal including the quotes.
    CharLiteral,
    /// `true` or `false`.
    BooleanLiteral,
    /// `null`
    NullLiteral,
    /// Placeholder for an absent optional child in a fixed child position.
    Empty,
}

impl Kind {
    /// Kinds whose node text is part of the node identity: names, labels and operators.
    pub fn has_name(&self) -> bool {
        matches!(
            self,
            Kind::ClassDecl
                | Kind::MethodDecl
                | Kind::VariableDecl
                | Kind::Break
                | Kind::Continue
                | Kind::Labeled
                | Kind::Identifier
                | Kind::MemberSelect
                | Kind::CompoundAssignment
                | Kind::Binary
                | Kind::Unary
                | Kind::PrimitiveType
        )
    }

    /// Kinds whose node text is a declared name or label rather than a reference.
    pub fn is_declaration_name(&self) -> bool {
        matches!(
            self,
            Kind::ClassDecl
                | Kind::MethodDecl
                | Kind::VariableDecl
                | Kind::Break
                | Kind::Continue
                | Kind::Labeled
        )
    }

    /// Kinds whose text is an identifier: referenced, selected or declared names and labels.
    pub fn carries_identifier(&self) -> bool {
        self.has_name()
            && !matches!(
                self,
                Kind::CompoundAssignment | Kind::Binary | Kind::Unary | Kind::PrimitiveType
            )
    }

    /// Literal kinds. Their value is the node text.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Kind::IntLiteral
                | Kind::FloatLiteral
                | Kind::StringLiteral
                | Kind::CharLiteral
                | Kind::BooleanLiteral
                | Kind::NullLiteral
        )
    }

    /// Statement kinds.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Kind::VariableDecl
                | Kind::Block
                | Kind::EmptyStatement
                | Kind::ExpressionStatement
                | Kind::If
                | Kind::While
                | Kind::DoWhile
                | Kind::For
                | Kind::EnhancedFor
                | Kind::Return
                | Kind::Break
                | Kind::Continue
                | Kind::Throw
                | Kind::Synchronized
                | Kind::Try
                | Kind::Labeled
                | Kind::Assert
                | Kind::ClassDecl
        )
    }

    /// Kinds whose children form a list of variable length. A multi-variable matches zero or
    /// more children of such a node.
    pub fn has_list_children(&self) -> bool {
        matches!(
            self,
            Kind::Block | Kind::Arguments | Kind::Parameters | Kind::ForInit | Kind::ForUpdate
        )
    }

    /// The ordinal of the kind, used by the encoded stream format.
    #[inline]
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// The kind with the given ordinal.
    pub fn from_ordinal(ordinal: u8) -> Option<Kind> {
        Kind::ALL.get(ordinal as usize).copied()
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
