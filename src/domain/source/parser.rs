//! Declaration parser: namespaces, imports, class-like declarations and
//! their constructor and method signatures.

use std::collections::HashMap;

use tracing::trace;

use crate::domain::entities::{
    ClassDescriptor, ClassKind, DeclaredParameter, DeclaredType, Literal, MethodSignature,
    Visibility,
};
use crate::domain::source::lexer::{tokenize, Token};

const BUILTIN_TYPES: &[&str] = &[
    "string", "int", "float", "bool", "array", "iterable", "callable", "mixed", "object", "null",
    "false", "true", "void", "never", "integer", "double", "boolean",
];

const MEMBER_MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "abstract",
    "final",
    "readonly",
    "var",
];

/// Parse PHP source and return every class-like declaration it contains.
///
/// Never fails: unparsable regions are skipped.
pub fn parse_source(source: &str) -> Vec<ClassDescriptor> {
    let tokens = tokenize(source);
    let mut parser = Parser::new(&tokens);
    parser.parse_file();
    parser.classes
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    namespace: String,
    /// Lower-cased alias to fully-qualified name
    imports: HashMap<String, String>,
    classes: Vec<ClassDescriptor>,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            namespace: String::new(),
            imports: HashMap::new(),
            classes: Vec::new(),
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset)
    }

    fn previous(&self) -> Option<&'t Token> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_file(&mut self) {
        let mut modifiers: Vec<String> = Vec::new();
        while let Some(token) = self.peek() {
            match token {
                Token::Name(word) => {
                    let lower = word.to_ascii_lowercase();
                    match lower.as_str() {
                        "namespace" if !matches!(self.peek_at(1), Some(Token::Punct('('))) => {
                            self.pos += 1;
                            self.parse_namespace();
                            modifiers.clear();
                        }
                        "use" => {
                            self.pos += 1;
                            self.parse_import();
                            modifiers.clear();
                        }
                        "abstract" | "final" | "readonly" => {
                            modifiers.push(lower);
                            self.pos += 1;
                        }
                        "class" | "interface" | "trait" | "enum" if self.starts_declaration() => {
                            let kind = match lower.as_str() {
                                "class" => ClassKind::Class,
                                "interface" => ClassKind::Interface,
                                "trait" => ClassKind::Trait,
                                _ => ClassKind::Enum,
                            };
                            self.pos += 1;
                            let is_abstract = modifiers.iter().any(|m| m == "abstract");
                            self.parse_class_like(kind, is_abstract);
                            modifiers.clear();
                        }
                        "function" => {
                            self.pos += 1;
                            self.skip_function();
                            modifiers.clear();
                        }
                        _ => {
                            self.pos += 1;
                            modifiers.clear();
                        }
                    }
                }
                Token::AttributeOpen => {
                    self.pos += 1;
                    self.skip_balanced('[', ']', 1);
                }
                _ => {
                    self.pos += 1;
                    modifiers.clear();
                }
            }
        }
    }

    /// `class Foo` rather than `Foo::class` or `new class(...)`.
    fn starts_declaration(&self) -> bool {
        let prev_ok = !matches!(
            self.previous(),
            Some(Token::DoubleColon) | Some(Token::Punct('>'))
        ) && !self.previous().is_some_and(|t| t.is_keyword("new"));
        let next_is_name = matches!(self.peek_at(1), Some(Token::Name(_)));
        prev_ok && next_is_name
    }

    fn parse_namespace(&mut self) {
        let mut name = String::new();
        while let Some(token) = self.peek() {
            match token {
                Token::Name(n) => {
                    name.push_str(n);
                    self.pos += 1;
                }
                Token::Punct(';') | Token::Punct('{') => {
                    self.pos += 1;
                    break;
                }
                _ => break,
            }
        }
        self.namespace = name.trim_matches('\\').to_string();
        self.imports.clear();
        trace!("parse_namespace: {}", self.namespace);
    }

    fn parse_import(&mut self) {
        // `use function foo;` and `use const BAR;` import no class names
        if self
            .peek()
            .is_some_and(|t| t.is_keyword("function") || t.is_keyword("const"))
        {
            self.skip_past(';');
            return;
        }
        // closure `use (...)` at top level
        if self.peek().is_some_and(|t| t.is_punct('(')) {
            return;
        }

        loop {
            let Some(Token::Name(name)) = self.next() else {
                self.skip_past(';');
                return;
            };
            if self.peek().is_some_and(|t| t.is_punct('{')) {
                self.pos += 1;
                let prefix = name.trim_matches('\\').to_string();
                self.parse_group_import(&prefix);
            } else {
                let alias = self.parse_alias();
                self.add_import(name, alias);
            }
            match self.next() {
                Some(Token::Punct(',')) => continue,
                _ => return,
            }
        }
    }

    fn parse_group_import(&mut self, prefix: &str) {
        while let Some(token) = self.next() {
            match token {
                Token::Name(n) if n.eq_ignore_ascii_case("function") || n.eq_ignore_ascii_case("const") => {
                    // skip the imported symbol
                    self.next();
                    self.parse_alias();
                }
                Token::Name(n) => {
                    let full = format!("{}\\{}", prefix, n.trim_matches('\\'));
                    let alias = self.parse_alias();
                    self.add_import(&full, alias);
                }
                Token::Punct('}') => return,
                _ => {}
            }
        }
    }

    fn parse_alias(&mut self) -> Option<String> {
        if self.peek().is_some_and(|t| t.is_keyword("as")) {
            self.pos += 1;
            if let Some(Token::Name(alias)) = self.next() {
                return Some(alias.clone());
            }
        }
        None
    }

    fn add_import(&mut self, name: &str, alias: Option<String>) {
        let full = name.trim_matches('\\').to_string();
        let alias = alias.unwrap_or_else(|| short_name(&full).to_string());
        self.imports.insert(alias.to_ascii_lowercase(), full);
    }

    /// Resolve a class reference to its fully-qualified name.
    fn resolve_name(&self, name: &str) -> String {
        if let Some(absolute) = name.strip_prefix('\\') {
            return absolute.to_string();
        }
        let (first, rest) = match name.split_once('\\') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };
        if let Some(imported) = self.imports.get(&first.to_ascii_lowercase()) {
            return match rest {
                Some(rest) => format!("{imported}\\{rest}"),
                None => imported.clone(),
            };
        }
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}\\{}", self.namespace, name)
        }
    }

    fn parse_name_list(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        while let Some(token) = self.peek() {
            match token {
                Token::Name(n) if !is_clause_keyword(n) => {
                    names.push(self.resolve_name(n));
                    self.pos += 1;
                }
                Token::Punct(',') => self.pos += 1,
                _ => break,
            }
        }
        names
    }

    fn parse_class_like(&mut self, kind: ClassKind, is_abstract: bool) {
        let Some(Token::Name(short)) = self.next() else {
            return;
        };
        let mut class = ClassDescriptor::new(&self.namespace, short, kind);
        class.is_abstract = is_abstract;

        while let Some(token) = self.peek() {
            if token.is_keyword("extends") {
                self.pos += 1;
                let names = self.parse_name_list();
                if kind == ClassKind::Interface {
                    class.interfaces.extend(names);
                } else {
                    class.parent = names.into_iter().next();
                }
            } else if token.is_keyword("implements") {
                self.pos += 1;
                let names = self.parse_name_list();
                class.interfaces.extend(names);
            } else if token.is_punct('{') {
                self.pos += 1;
                break;
            } else {
                // enum backing type (`enum Suit: string`)
                self.pos += 1;
            }
        }

        self.parse_class_body(&mut class);
        trace!(
            "parse_class_like: {} {} ({} methods)",
            kind,
            class.name,
            class.methods.len()
        );
        self.classes.push(class);
    }

    fn parse_class_body(&mut self, class: &mut ClassDescriptor) {
        let mut modifiers: Vec<String> = Vec::new();
        while let Some(token) = self.next() {
            match token {
                Token::Punct('}') => return,
                Token::Punct('{') => {
                    self.skip_balanced('{', '}', 1);
                    modifiers.clear();
                }
                Token::AttributeOpen => self.skip_balanced('[', ']', 1),
                Token::Name(word) if word.eq_ignore_ascii_case("use") => {
                    let names = self.parse_name_list();
                    class.traits.extend(names);
                    if let Some(Token::Punct('{')) = self.next() {
                        self.skip_balanced('{', '}', 1);
                    }
                    modifiers.clear();
                }
                Token::Name(word) if word.eq_ignore_ascii_case("function") => {
                    let method_modifiers = std::mem::take(&mut modifiers);
                    self.parse_method(class, &method_modifiers);
                }
                Token::Name(word)
                    if MEMBER_MODIFIERS
                        .iter()
                        .any(|m| word.eq_ignore_ascii_case(m)) =>
                {
                    modifiers.push(word.to_ascii_lowercase());
                }
                _ => modifiers.clear(),
            }
        }
    }

    fn parse_method(&mut self, class: &mut ClassDescriptor, modifiers: &[String]) {
        if self.peek().is_some_and(|t| t.is_punct('&')) {
            self.pos += 1;
        }
        let Some(Token::Name(name)) = self.next() else {
            return;
        };
        if !self.peek().is_some_and(|t| t.is_punct('(')) {
            return;
        }
        self.pos += 1;
        let params = self.parse_parameter_list(class);

        // return type, then body or `;`
        while let Some(token) = self.next() {
            match token {
                Token::Punct(';') => break,
                Token::Punct('{') => {
                    self.skip_balanced('{', '}', 1);
                    break;
                }
                _ => {}
            }
        }

        let visibility = if modifiers.iter().any(|m| m == "private") {
            Visibility::Private
        } else if modifiers.iter().any(|m| m == "protected") {
            Visibility::Protected
        } else {
            Visibility::Public
        };
        let required_params = params
            .iter()
            .rposition(|p| p.default.is_none() && !p.variadic)
            .map_or(0, |i| i + 1);
        let is_abstract = modifiers.iter().any(|m| m == "abstract") || class.is_interface();

        class.methods.push(MethodSignature {
            name: name.clone(),
            visibility,
            is_static: modifiers.iter().any(|m| m == "static"),
            is_abstract,
            required_params,
        });
        if name.eq_ignore_ascii_case("__construct") {
            class.constructor = Some(params);
        }
    }

    /// Parse parameters up to and including the closing `)`.
    fn parse_parameter_list(&mut self, class: &ClassDescriptor) -> Vec<DeclaredParameter> {
        let start = self.pos;
        self.skip_balanced('(', ')', 1);
        let end = self.pos.saturating_sub(1).max(start);
        let inner = &self.tokens[start..end];

        split_top_level(inner, |t| t.is_punct(','))
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .filter_map(|segment| self.parse_parameter(segment, class))
            .collect()
    }

    fn parse_parameter(&self, tokens: &[Token], class: &ClassDescriptor) -> Option<DeclaredParameter> {
        let mut type_tokens: Vec<&Token> = Vec::new();
        let mut variadic = false;
        let mut i = 0;
        let mut name = None;

        while i < tokens.len() {
            let token = &tokens[i];
            match token {
                Token::AttributeOpen => {
                    i = skip_balanced_in(tokens, i + 1, '[', ']');
                    continue;
                }
                Token::Name(word)
                    if MEMBER_MODIFIERS
                        .iter()
                        .any(|m| word.eq_ignore_ascii_case(m)) =>
                {
                    // promoted property modifiers, including `private(set)`
                    if tokens.get(i + 1).is_some_and(|t| t.is_punct('(')) {
                        i = skip_balanced_in(tokens, i + 2, '(', ')');
                    } else {
                        i += 1;
                    }
                    continue;
                }
                Token::Ellipsis => variadic = true,
                Token::Punct('&')
                    if matches!(tokens.get(i + 1), Some(Token::Variable(_)) | Some(Token::Ellipsis)) => {}
                Token::Variable(var) => {
                    name = Some(var.clone());
                    i += 1;
                    break;
                }
                _ => type_tokens.push(token),
            }
            i += 1;
        }

        let name = name?;
        let default = if tokens.get(i).is_some_and(|t| t.is_punct('=')) {
            Some(parse_literal(&tokens[i + 1..]))
        } else {
            None
        };

        Some(DeclaredParameter {
            name,
            declared_type: self.declared_type(&type_tokens, class),
            default,
            variadic,
        })
    }

    fn declared_type(&self, tokens: &[&Token], class: &ClassDescriptor) -> DeclaredType {
        if tokens.is_empty() {
            return DeclaredType::None;
        }
        let composite = tokens
            .iter()
            .any(|t| t.is_punct('&') || t.is_punct('(') || t.is_punct(')'));
        let names: Vec<&str> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Name(n) => Some(n.as_str()),
                _ => None,
            })
            .filter(|n| !n.eq_ignore_ascii_case("null"))
            .collect();

        if composite || names.len() != 1 {
            if names.is_empty() && !composite {
                // `?null` / `null`
                return DeclaredType::Builtin("null".to_string());
            }
            let text: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
            return DeclaredType::Composite(text.concat());
        }

        let name = names[0];
        let lower = name.to_ascii_lowercase();
        if BUILTIN_TYPES.contains(&lower.as_str()) {
            return DeclaredType::Builtin(lower);
        }
        match lower.as_str() {
            "self" | "static" => DeclaredType::Named(class.name.clone()),
            "parent" => match &class.parent {
                Some(parent) => DeclaredType::Named(parent.clone()),
                None => DeclaredType::Composite(name.to_string()),
            },
            _ => DeclaredType::Named(self.resolve_name(name)),
        }
    }

    fn skip_function(&mut self) {
        // top-level function or closure: skip signature and body
        while let Some(token) = self.next() {
            match token {
                Token::Punct(';') => return,
                Token::Punct('{') => {
                    self.skip_balanced('{', '}', 1);
                    return;
                }
                _ => {}
            }
        }
    }

    /// Advance past the matching close token, `depth` opens already consumed.
    fn skip_balanced(&mut self, open: char, close: char, depth: usize) {
        let mut depth = depth;
        while let Some(token) = self.next() {
            if token.is_punct(open) || (open == '[' && *token == Token::AttributeOpen) {
                depth += 1;
            } else if token.is_punct(close) {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
        }
    }

    fn skip_past(&mut self, c: char) {
        while let Some(token) = self.next() {
            if token.is_punct(c) {
                return;
            }
        }
    }
}

fn is_clause_keyword(word: &str) -> bool {
    word.eq_ignore_ascii_case("extends") || word.eq_ignore_ascii_case("implements")
}

fn short_name(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

fn opens(token: &Token) -> bool {
    matches!(token, Token::Punct('(') | Token::Punct('[') | Token::Punct('{') | Token::AttributeOpen)
}

fn closes(token: &Token) -> bool {
    matches!(token, Token::Punct(')') | Token::Punct(']') | Token::Punct('}'))
}

/// Index after the matching close token; `start` is just past the opener.
fn skip_balanced_in(tokens: &[Token], start: usize, open: char, close: char) -> usize {
    let mut depth = 1usize;
    let mut i = start;
    while i < tokens.len() {
        let token = &tokens[i];
        if token.is_punct(open) || (open == '[' && *token == Token::AttributeOpen) {
            depth += 1;
        } else if token.is_punct(close) {
            depth -= 1;
            if depth == 0 {
                return i + 1;
            }
        }
        i += 1;
    }
    tokens.len()
}

/// Split on separators that are not nested in brackets.
fn split_top_level(tokens: &[Token], is_separator: impl Fn(&Token) -> bool) -> Vec<&[Token]> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if opens(token) {
            depth += 1;
        } else if closes(token) {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && is_separator(token) {
            segments.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    segments.push(&tokens[start..]);
    segments
}

/// Interpret a default-value expression.
pub(crate) fn parse_literal(tokens: &[Token]) -> Literal {
    match tokens {
        [Token::Str(s)] => Literal::Str(s.clone()),
        [Token::Number(n)] => parse_number(n, false).unwrap_or_else(|| render_expr(tokens)),
        [Token::Punct('-'), Token::Number(n)] => {
            parse_number(n, true).unwrap_or_else(|| render_expr(tokens))
        }
        [Token::Punct('+'), Token::Number(n)] => {
            parse_number(n, false).unwrap_or_else(|| render_expr(tokens))
        }
        [Token::Name(n)] if n.eq_ignore_ascii_case("null") => Literal::Null,
        [Token::Name(n)] if n.eq_ignore_ascii_case("true") => Literal::Bool(true),
        [Token::Name(n)] if n.eq_ignore_ascii_case("false") => Literal::Bool(false),
        [Token::Punct('['), inner @ .., Token::Punct(']')] => parse_list(inner, tokens),
        [Token::Name(n), Token::Punct('('), inner @ .., Token::Punct(')')]
            if n.eq_ignore_ascii_case("array") =>
        {
            parse_list(inner, tokens)
        }
        _ => render_expr(tokens),
    }
}

fn parse_list(inner: &[Token], whole: &[Token]) -> Literal {
    let segments = split_top_level(inner, |t| t.is_punct(','));
    let mut items = Vec::new();
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        // keyed arrays are not plain lists
        if split_top_level(segment, |t| *t == Token::Arrow).len() > 1 {
            return render_expr(whole);
        }
        items.push(parse_literal(segment));
    }
    Literal::List(items)
}

fn parse_number(text: &str, negative: bool) -> Option<Literal> {
    let clean = text.replace('_', "");
    let lower = clean.to_ascii_lowercase();
    let int = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else if lower.contains(|c: char| c == '.' || c == 'e') {
        None
    } else {
        lower.parse::<i64>().ok()
    };
    if let Some(value) = int {
        return Some(Literal::Int(if negative { -value } else { value }));
    }
    let float = lower.parse::<f64>().ok()?;
    if !float.is_finite() {
        // overflowing literals (`1e999`) have no JSON form; keep the source text
        let sign = if negative { "-" } else { "" };
        return Some(Literal::Expr {
            expr: format!("{sign}{text}"),
        });
    }
    Some(Literal::Float(if negative { -float } else { float }))
}

fn render_expr(tokens: &[Token]) -> Literal {
    let mut expr = String::new();
    for (i, token) in tokens.iter().enumerate() {
        let glue = i > 0
            && !matches!(token, Token::DoubleColon | Token::Punct(')') | Token::Punct(']') | Token::Punct(',') | Token::Punct('('))
            && !matches!(tokens[i - 1], Token::DoubleColon | Token::Punct('(') | Token::Punct('[') | Token::Punct('-'));
        if glue {
            expr.push(' ');
        }
        expr.push_str(&token.to_string());
    }
    Literal::Expr { expr }
}
