//! Stylesheet and inline-style scanning.
//!
//! The scanner walks the `cssparser` token stream rule by rule and reports what it finds
//! to a [`StyleHandler`], which asks the [`CssValidator`] about every selector and
//! declaration and accumulates the clean CSS. Invalid parts never abort the scan; only
//! input the tokenizer cannot make sense of (bad strings, bad URLs, unbalanced closing
//! brackets) yields a [`CssError`].

use crate::css::lexical::{LexicalUnit, parse_value};
use crate::css::selector::parse_selector_list;
use crate::css::validator::{CssValidator, serialize_value};
use crate::css::{CleanStyle, CssError, remaining_text};
use crate::diagnostic::Diagnostic;
use crate::policy::Policy;
use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};

const STYLE_SHEET_OWNER: &str = "style";

#[derive(Debug, Clone, Copy)]
pub struct CssScanner<'p> {
    policy: &'p Policy,
    validator: CssValidator<'p>,
}

impl<'p> CssScanner<'p> {
    pub fn new(policy: &'p Policy) -> Self {
        Self {
            policy,
            validator: CssValidator::new(policy),
        }
    }

    pub fn validator(&self) -> &CssValidator<'p> {
        &self.validator
    }

    /// Scans the body of a `<style>` element.
    pub fn scan_style_sheet(&self, css: &str, size_limit: usize) -> Result<CleanStyle, CssError> {
        tracing::trace!(len = css.len(), size_limit, "scanning style sheet");
        check_syntax(css)?;

        let mut handler = StyleHandler::new(
            STYLE_SHEET_OWNER,
            false,
            self.policy.max_style_sheet_imports(),
        );
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        self.parse_rules(&mut parser, &mut handler);
        Ok(handler.finish())
    }

    /// Scans the value of a `style` attribute found on `owner_tag`.
    pub fn scan_inline_style(
        &self,
        css: &str,
        owner_tag: &str,
        size_limit: usize,
    ) -> Result<CleanStyle, CssError> {
        tracing::trace!(
            len = css.len(),
            owner = owner_tag,
            size_limit,
            "scanning inline style"
        );
        check_syntax(css)?;

        let mut handler = StyleHandler::new(owner_tag, true, 0);
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        // Declarations are consumed until the end of input; the result is always `Ok`.
        let _ = self.parse_declarations(&mut parser, &mut handler);
        Ok(handler.finish())
    }

    fn parse_rules(&self, p: &mut Parser<'_, '_>, handler: &mut StyleHandler<'_>) {
        loop {
            let start = p.state();
            let token = match p.next() {
                Ok(token) => token.clone(),
                Err(_) => return,
            };
            match token {
                Token::CDO | Token::CDC | Token::Semicolon => {}
                Token::AtKeyword(ref name) if name.eq_ignore_ascii_case("import") => {
                    let target = p
                        .parse_until_after(Delimiter::Semicolon, import_target)
                        .ok();
                    handler.import_style(target);
                }
                Token::AtKeyword(ref name) => {
                    handler.ignorable_at_rule(&name.to_ascii_lowercase());
                    let _ = p.parse_until_before(
                        Delimiter::Semicolon | Delimiter::CurlyBracketBlock,
                        remaining_text,
                    );
                    // The terminating `;` or the whole `{...}` block.
                    let _ = p.next();
                }
                _ => {
                    p.reset(&start);
                    let prelude = p
                        .parse_until_before(Delimiter::CurlyBracketBlock, remaining_text)
                        .unwrap_or_default();
                    let has_block = matches!(p.next(), Ok(&Token::CurlyBracketBlock));
                    if !has_block {
                        handler.malformed_selector(&prelude);
                        continue;
                    }
                    if handler.start_selector(&self.validator, &prelude) {
                        let _ = p.parse_nested_block(|p| self.parse_declarations(p, handler));
                    }
                    handler.end_selector();
                }
            }
        }
    }

    fn parse_declarations<'i>(
        &self,
        p: &mut Parser<'i, '_>,
        handler: &mut StyleHandler<'_>,
    ) -> Result<(), ParseError<'i, ()>> {
        loop {
            let start = p.position();
            let token = match p.next() {
                Ok(token) => token.clone(),
                Err(_) => return Ok(()),
            };
            match token {
                Token::Semicolon => {}
                Token::Ident(ref name) => {
                    match p.parse_until_after(Delimiter::Semicolon, declaration) {
                        Ok(declaration) => {
                            handler.property(&self.validator, name, declaration)
                        }
                        Err(_) => handler.malformed_declaration(p.slice_from(start)),
                    }
                }
                _ => {
                    let _ = p.parse_until_after(Delimiter::Semicolon, remaining_text);
                    handler.malformed_declaration(p.slice_from(start));
                }
            }
        }
    }
}

/// Rejects token streams the rule parser could only guess at.
fn check_syntax(css: &str) -> Result<(), CssError> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    check_block(&mut parser).map_err(|err| {
        let reason = match err.kind {
            cssparser::ParseErrorKind::Custom(reason) => reason.to_string(),
            cssparser::ParseErrorKind::Basic(kind) => format!("{kind:?}"),
        };
        CssError::Malformed {
            line: err.location.line + 1,
            column: err.location.column,
            reason,
        }
    })
}

fn check_block<'i>(p: &mut Parser<'i, '_>) -> Result<(), ParseError<'i, &'static str>> {
    loop {
        let token = match p.next() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };
        match token {
            Token::BadString(_) => return Err(p.new_custom_error("unterminated string")),
            Token::BadUrl(_) => return Err(p.new_custom_error("malformed url")),
            Token::CloseParenthesis | Token::CloseSquareBracket | Token::CloseCurlyBracket => {
                return Err(p.new_custom_error("unbalanced closing bracket"));
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => p.parse_nested_block(check_block)?,
            _ => {}
        }
    }
}

fn import_target<'i>(p: &mut Parser<'i, '_>) -> Result<String, ParseError<'i, ()>> {
    let url = p.expect_url_or_string()?.to_string();
    // Trailing media queries are dropped along with the import.
    remaining_text(p)?;
    Ok(url)
}

struct Declaration {
    value: Vec<LexicalUnit>,
    source: String,
    important: bool,
}

fn declaration<'i>(p: &mut Parser<'i, '_>) -> Result<Declaration, ParseError<'i, ()>> {
    p.expect_colon()?;
    let start = p.position();
    let value = p.parse_until_before(Delimiter::Bang, value_units)?;
    let source = p.slice_from(start).trim().to_string();
    let important = !p.is_exhausted();
    if important {
        p.expect_delim('!')?;
        p.expect_ident_matching("important")?;
    }
    p.expect_exhausted()?;
    Ok(Declaration {
        value,
        source,
        important,
    })
}

fn value_units<'i>(p: &mut Parser<'i, '_>) -> Result<Vec<LexicalUnit>, ParseError<'i, ()>> {
    Ok(parse_value(p))
}

/// Receives parse events and builds the clean output.
struct StyleHandler<'a> {
    owner: &'a str,
    inline: bool,
    max_imports: usize,
    css: String,
    selectors: Vec<String>,
    declarations: Vec<String>,
    selector_open: bool,
    messages: Vec<Diagnostic>,
    imports: Vec<String>,
}

impl<'a> StyleHandler<'a> {
    fn new(owner: &'a str, inline: bool, max_imports: usize) -> Self {
        Self {
            owner,
            inline,
            max_imports,
            css: String::new(),
            selectors: Vec::new(),
            declarations: Vec::new(),
            selector_open: false,
            messages: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Validates the selectors of a rule; returns whether any of them survived.
    fn start_selector(&mut self, validator: &CssValidator<'_>, prelude: &str) -> bool {
        self.selectors.clear();
        for parsed in parse_selector_list(prelude) {
            match parsed.selector {
                Some(selector) => {
                    if validator.is_valid_selector(&parsed.source, &selector, &mut self.messages)
                    {
                        self.selectors.push(selector.to_string());
                    } else {
                        self.messages
                            .push(Diagnostic::css_selector_rejected(self.owner, &parsed.source));
                    }
                }
                None => self
                    .messages
                    .push(Diagnostic::css_selector_malformed(self.owner, &parsed.source)),
            }
        }
        self.selector_open = !self.selectors.is_empty();
        self.selector_open
    }

    fn end_selector(&mut self) {
        if self.selector_open {
            self.css.push_str(&self.selectors.join(", "));
            self.css.push_str(" {\n");
            for declaration in self.declarations.drain(..) {
                self.css.push('\t');
                self.css.push_str(&declaration);
                self.css.push_str(";\n");
            }
            self.css.push_str("}\n");
        }
        self.selectors.clear();
        self.declarations.clear();
        self.selector_open = false;
    }

    fn malformed_selector(&mut self, prelude: &str) {
        if !prelude.is_empty() {
            self.messages
                .push(Diagnostic::css_selector_malformed(self.owner, prelude));
        }
    }

    fn property(&mut self, validator: &CssValidator<'_>, name: &str, declaration: Declaration) {
        if !self.inline && !self.selector_open {
            return;
        }
        let name = name.to_ascii_lowercase();
        let clean = if validator.is_valid_property(&name, &declaration.value) {
            serialize_value(&declaration.value)
        } else {
            None
        };
        match clean {
            Some(value) if declaration.important => {
                self.declarations
                    .push(format!("{name}: {value} !important"));
            }
            Some(value) => self.declarations.push(format!("{name}: {value}")),
            None => self.messages.push(Diagnostic::css_property_rejected(
                self.owner,
                &name,
                &declaration.source,
            )),
        }
    }

    fn malformed_declaration(&mut self, source: &str) {
        let source = source.trim().trim_end_matches(';').trim_end();
        if !source.is_empty() {
            self.messages
                .push(Diagnostic::css_declaration_malformed(self.owner, source));
        }
    }

    fn import_style(&mut self, target: Option<String>) {
        match target {
            Some(url) if self.imports.len() < self.max_imports => {
                self.messages.push(Diagnostic::css_import_ignored(&url));
                self.imports.push(url);
            }
            Some(url) => self
                .messages
                .push(Diagnostic::css_import_over_limit(&url, self.max_imports)),
            None => self
                .messages
                .push(Diagnostic::css_at_rule_removed(self.owner, "import")),
        }
    }

    fn ignorable_at_rule(&mut self, name: &str) {
        self.messages
            .push(Diagnostic::css_at_rule_removed(self.owner, name));
    }

    fn finish(self) -> CleanStyle {
        let css = if self.inline {
            self.declarations
                .iter()
                .map(|declaration| format!("{declaration};"))
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            self.css
        };
        CleanStyle {
            css,
            messages: self.messages,
            imports: self.imports,
        }
    }
}
