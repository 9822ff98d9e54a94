//! Selector model and parser.
//!
//! Only the shapes the validator needs to reason about are modelled. `Display` renders the
//! canonical CSS text, which is both what the clean stylesheet contains and what the
//! condition regexes of the policy are matched against.

use crate::css::{remaining_text, write_identifier, write_string};
use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `*`, or the implicit universal selector in front of a lone condition (`.note`).
    Universal { explicit: bool },
    /// Lowercased element name.
    Element(String),
    Conditional {
        simple: Box<Selector>,
        condition: Condition,
    },
    Descendant {
        ancestor: Box<Selector>,
        simple: Box<Selector>,
    },
    Child {
        parent: Box<Selector>,
        simple: Box<Selector>,
    },
    Adjacent {
        sibling: Box<Selector>,
        simple: Box<Selector>,
    },
    GeneralSibling {
        sibling: Box<Selector>,
        simple: Box<Selector>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOperator {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

impl AttributeOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::Includes => "~=",
            Self::DashMatch => "|=",
            Self::Prefix => "^=",
            Self::Suffix => "$=",
            Self::Substring => "*=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    And(Box<Condition>, Box<Condition>),
    Class(String),
    Id(String),
    PseudoClass(String),
    PseudoElement(String),
    Attribute {
        name: String,
        matcher: Option<(AttributeOperator, String)>,
        case_insensitive: bool,
    },
    Negation(Box<Selector>),
    OnlyChild,
    OnlyOfType,
    /// `:first-child`, `:nth-of-type(2n)`, ...; holds the text after the colon.
    Positional(String),
    Lang(String),
    Content(String),
    /// Any other functional pseudo-class; holds the text after the colon.
    Unsupported(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Universal { explicit: true } => f.write_str("*"),
            Self::Universal { explicit: false } => Ok(()),
            Self::Element(name) => write_identifier(name, f),
            Self::Conditional { simple, condition } => write!(f, "{simple}{condition}"),
            Self::Descendant { ancestor, simple } => write!(f, "{ancestor} {simple}"),
            Self::Child { parent, simple } => write!(f, "{parent} > {simple}"),
            Self::Adjacent { sibling, simple } => write!(f, "{sibling} + {simple}"),
            Self::GeneralSibling { sibling, simple } => write!(f, "{sibling} ~ {simple}"),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(first, second) => write!(f, "{first}{second}"),
            Self::Class(name) => {
                f.write_str(".")?;
                write_identifier(name, f)
            }
            Self::Id(name) => {
                f.write_str("#")?;
                write_identifier(name, f)
            }
            Self::PseudoClass(name) => {
                f.write_str(":")?;
                write_identifier(name, f)
            }
            Self::PseudoElement(name) => {
                f.write_str("::")?;
                write_identifier(name, f)
            }
            Self::Attribute {
                name,
                matcher,
                case_insensitive,
            } => {
                f.write_str("[")?;
                write_identifier(name, f)?;
                if let Some((operator, value)) = matcher {
                    f.write_str(operator.as_str())?;
                    write_string(value, f)?;
                    if *case_insensitive {
                        f.write_str(" i")?;
                    }
                }
                f.write_str("]")
            }
            Self::Negation(selector) => write!(f, ":not({selector})"),
            Self::OnlyChild => f.write_str(":only-child"),
            Self::OnlyOfType => f.write_str(":only-of-type"),
            Self::Positional(text) | Self::Unsupported(text) => write!(f, ":{text}"),
            Self::Lang(lang) => write!(f, ":lang({lang})"),
            Self::Content(text) => write!(f, ":contains({text})"),
        }
    }
}

/// One entry of a comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelector {
    /// Trimmed source text, used in diagnostics.
    pub source: String,
    /// `None` when the entry could not be parsed.
    pub selector: Option<Selector>,
}

/// Splits a rule prelude on top-level commas and parses each selector independently.
pub fn parse_selector_list(text: &str) -> Vec<ParsedSelector> {
    let mut input = ParserInput::new(text);
    let mut p = Parser::new(&mut input);
    let mut selectors = Vec::new();
    loop {
        let start = p.position();
        let selector = p.parse_until_before(Delimiter::Comma, whole_selector).ok();
        selectors.push(ParsedSelector {
            source: p.slice_from(start).trim().to_string(),
            selector,
        });
        if p.next().is_err() {
            break;
        }
    }
    selectors
}

fn whole_selector<'i>(p: &mut Parser<'i, '_>) -> Result<Selector, ParseError<'i, ()>> {
    let selector = parse_complex(p)?;
    p.expect_exhausted()?;
    Ok(selector)
}

#[derive(Clone, Copy)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    GeneralSibling,
}

fn parse_complex<'i>(p: &mut Parser<'i, '_>) -> Result<Selector, ParseError<'i, ()>> {
    p.skip_whitespace();
    let mut selector = parse_compound(p)?;
    loop {
        let mut saw_whitespace = false;
        let combinator = loop {
            let state = p.state();
            let token = match p.next_including_whitespace() {
                Ok(token) => token.clone(),
                Err(_) => return Ok(selector),
            };
            match token {
                Token::WhiteSpace(_) => saw_whitespace = true,
                Token::Delim('>') => break Combinator::Child,
                Token::Delim('+') => break Combinator::Adjacent,
                Token::Delim('~') => break Combinator::GeneralSibling,
                other => {
                    if !saw_whitespace {
                        return Err(p.new_unexpected_token_error(other));
                    }
                    p.reset(&state);
                    break Combinator::Descendant;
                }
            }
        };
        p.skip_whitespace();
        let simple = Box::new(parse_compound(p)?);
        let left = Box::new(selector);
        selector = match combinator {
            Combinator::Descendant => Selector::Descendant {
                ancestor: left,
                simple,
            },
            Combinator::Child => Selector::Child {
                parent: left,
                simple,
            },
            Combinator::Adjacent => Selector::Adjacent {
                sibling: left,
                simple,
            },
            Combinator::GeneralSibling => Selector::GeneralSibling {
                sibling: left,
                simple,
            },
        };
    }
}

fn parse_compound<'i>(p: &mut Parser<'i, '_>) -> Result<Selector, ParseError<'i, ()>> {
    let state = p.state();
    let first = p.next_including_whitespace()?.clone();
    let simple = match first {
        Token::Ident(name) => Selector::Element(name.to_ascii_lowercase()),
        Token::Delim('*') => Selector::Universal { explicit: true },
        _ => {
            p.reset(&state);
            Selector::Universal { explicit: false }
        }
    };

    let mut condition: Option<Condition> = None;
    loop {
        let state = p.state();
        let token = match p.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        let next = match token {
            Token::IDHash(id) => Condition::Id(id.to_string()),
            Token::Delim('.') => {
                let class = p.next_including_whitespace()?.clone();
                match class {
                    Token::Ident(class) => Condition::Class(class.to_string()),
                    other => return Err(p.new_unexpected_token_error(other)),
                }
            }
            Token::SquareBracketBlock => p.parse_nested_block(parse_attribute)?,
            Token::Colon => parse_pseudo(p)?,
            _ => {
                p.reset(&state);
                break;
            }
        };
        condition = Some(match condition {
            Some(previous) => Condition::And(Box::new(previous), Box::new(next)),
            None => next,
        });
    }

    match (simple, condition) {
        (simple, Some(condition)) => Ok(Selector::Conditional {
            simple: Box::new(simple),
            condition,
        }),
        (Selector::Universal { explicit: false }, None) => Err(p.new_custom_error(())),
        (simple, None) => Ok(simple),
    }
}

fn parse_attribute<'i>(p: &mut Parser<'i, '_>) -> Result<Condition, ParseError<'i, ()>> {
    let name = p.expect_ident()?.to_ascii_lowercase();
    let token = match p.next() {
        Ok(token) => token.clone(),
        Err(_) => {
            return Ok(Condition::Attribute {
                name,
                matcher: None,
                case_insensitive: false,
            });
        }
    };
    let operator = match token {
        Token::Delim('=') => AttributeOperator::Equals,
        Token::IncludeMatch => AttributeOperator::Includes,
        Token::DashMatch => AttributeOperator::DashMatch,
        Token::PrefixMatch => AttributeOperator::Prefix,
        Token::SuffixMatch => AttributeOperator::Suffix,
        Token::SubstringMatch => AttributeOperator::Substring,
        other => return Err(p.new_unexpected_token_error(other)),
    };
    let value = p.expect_ident_or_string()?.to_string();
    let case_insensitive = match p.next() {
        Ok(token) => {
            let token = token.clone();
            match token {
                Token::Ident(ref flag) if flag.eq_ignore_ascii_case("i") => true,
                other => return Err(p.new_unexpected_token_error(other)),
            }
        }
        Err(_) => false,
    };
    p.expect_exhausted()?;
    Ok(Condition::Attribute {
        name,
        matcher: Some((operator, value)),
        case_insensitive,
    })
}

fn parse_pseudo<'i>(p: &mut Parser<'i, '_>) -> Result<Condition, ParseError<'i, ()>> {
    let token = p.next_including_whitespace()?.clone();
    match token {
        Token::Colon => {
            let name = p.next_including_whitespace()?.clone();
            match name {
                Token::Ident(name) => Ok(Condition::PseudoElement(name.to_ascii_lowercase())),
                other => Err(p.new_unexpected_token_error(other)),
            }
        }
        Token::Ident(name) => {
            let name = name.to_ascii_lowercase();
            Ok(match name.as_str() {
                "before" | "after" | "first-line" | "first-letter" => {
                    Condition::PseudoElement(name)
                }
                "only-child" => Condition::OnlyChild,
                "only-of-type" => Condition::OnlyOfType,
                "first-child" | "last-child" | "first-of-type" | "last-of-type" => {
                    Condition::Positional(name)
                }
                _ => Condition::PseudoClass(name),
            })
        }
        Token::Function(name) => {
            let name = name.to_ascii_lowercase();
            if name == "not" {
                let inner = p.parse_nested_block(negated_selector)?;
                return Ok(Condition::Negation(Box::new(inner)));
            }
            let arguments = p.parse_nested_block(remaining_text)?;
            Ok(match name.as_str() {
                "lang" => Condition::Lang(arguments),
                "contains" => Condition::Content(arguments),
                n if n.starts_with("nth-") => Condition::Positional(format!("{n}({arguments})")),
                n => Condition::Unsupported(format!("{n}({arguments})")),
            })
        }
        other => Err(p.new_unexpected_token_error(other)),
    }
}

fn negated_selector<'i>(p: &mut Parser<'i, '_>) -> Result<Selector, ParseError<'i, ()>> {
    p.skip_whitespace();
    let selector = parse_compound(p)?;
    p.skip_whitespace();
    p.expect_exhausted()?;
    Ok(selector)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(text: &str) -> Selector {
        let mut list = parse_selector_list(text);
        assert_eq!(list.len(), 1, "{text}");
        list.remove(0).selector.expect("selector parses")
    }

    #[test]
    fn list_keeps_per_entry_source_and_failures() {
        let list = parse_selector_list("p.note , >bad,  h1");
        let sources: Vec<&str> = list.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(sources, ["p.note", ">bad", "h1"]);
        assert!(list[0].selector.is_some());
        assert!(list[1].selector.is_none());
        assert_eq!(list[2].selector, Some(Selector::Element("h1".to_string())));
    }

    #[test]
    fn implicit_universal_with_conditions() {
        let selector = parse_one(".a#b:hover");
        assert_eq!(
            selector,
            Selector::Conditional {
                simple: Box::new(Selector::Universal { explicit: false }),
                condition: Condition::And(
                    Box::new(Condition::And(
                        Box::new(Condition::Class("a".to_string())),
                        Box::new(Condition::Id("b".to_string())),
                    )),
                    Box::new(Condition::PseudoClass("hover".to_string())),
                ),
            }
        );
        assert_eq!(selector.to_string(), ".a#b:hover");
    }

    #[test]
    fn combinators_render_canonically() {
        assert_eq!(parse_one("DIV  p>a+b~i").to_string(), "div p > a + b ~ i");
        assert_eq!(parse_one("ul li").to_string(), "ul li");
    }

    #[test]
    fn attribute_conditions() {
        assert_eq!(
            parse_one("a[Title='x y']").to_string(),
            r#"a[title="x y"]"#
        );
        assert_eq!(parse_one("[lang|=en i]").to_string(), r#"[lang|="en" i]"#);
        assert_eq!(parse_one("input[disabled]").to_string(), "input[disabled]");
    }

    #[test]
    fn pseudo_classification() {
        assert_eq!(
            parse_one("p::first-line"),
            Selector::Conditional {
                simple: Box::new(Selector::Element("p".to_string())),
                condition: Condition::PseudoElement("first-line".to_string()),
            }
        );
        assert_eq!(parse_one("p:after").to_string(), "p::after");
        assert_eq!(parse_one("li:nth-child(2n+1)").to_string(), "li:nth-child(2n+1)");
        assert_eq!(parse_one("p:not(.x)").to_string(), "p:not(.x)");
        assert!(matches!(
            parse_one("li:first-child"),
            Selector::Conditional {
                condition: Condition::Positional(_),
                ..
            }
        ));
        assert!(matches!(
            parse_one("p:only-child"),
            Selector::Conditional {
                condition: Condition::OnlyChild,
                ..
            }
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        for text in ["", "p >", "p..x", "a[", "#1x", "p:"] {
            let list = parse_selector_list(text);
            assert!(list.iter().all(|s| s.selector.is_none()), "{text}");
        }
    }
}
