//! Property values as a flat list of lexical units.

use crate::css::remaining_text;
use cssparser::{ParseError, Parser, ParserInput, ToCss, Token, UnicodeRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Comma,
    Slash,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LexicalUnit {
    Integer(i32),
    Real(f32),
    /// A number with a unit; the unit is lowercased.
    Dimension { value: f32, unit: String },
    /// Percentage in the `0..=100` scale.
    Percentage(f32),
    Ident(String),
    Inherit,
    String(String),
    Uri(String),
    /// `rgb(r, g, b)` or a 3/6 digit hex color; channels are `Integer` or `Percentage`.
    RgbColor(Vec<LexicalUnit>),
    Operator(Operator),
    /// Any other function call (`attr()`, `counter()`, `rect()`, ...).
    Function { name: String, arguments: String },
    /// A parenthesized group.
    SubExpression(String),
    UnicodeRange { start: u32, end: u32 },
    /// Stray delimiters and anything else the value grammar does not know.
    Unknown(String),
}

/// Parses the rest of `p` as a property value. Never fails: anything unrecognized becomes
/// [`LexicalUnit::Unknown`] and is rejected later by the validator.
pub fn parse_value(p: &mut Parser<'_, '_>) -> Vec<LexicalUnit> {
    let mut units = Vec::new();
    loop {
        let state = p.state();
        let token = match p.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        let unit = match token {
            Token::Number {
                value, int_value, ..
            } => match int_value {
                Some(int) => LexicalUnit::Integer(int),
                None => LexicalUnit::Real(value),
            },
            Token::Percentage {
                unit_value,
                int_value,
                ..
            } => LexicalUnit::Percentage(match int_value {
                Some(int) => int as f32,
                None => percentage_value(unit_value),
            }),
            Token::Dimension {
                value, ref unit, ..
            } => LexicalUnit::Dimension {
                value,
                unit: unit.to_ascii_lowercase(),
            },
            Token::Ident(ref name) if name.eq_ignore_ascii_case("inherit") => LexicalUnit::Inherit,
            Token::Ident(ref name) if name.eq_ignore_ascii_case("u") => {
                p.reset(&state);
                match UnicodeRange::parse(p) {
                    Ok(range) => LexicalUnit::UnicodeRange {
                        start: range.start,
                        end: range.end,
                    },
                    Err(_) => {
                        p.reset(&state);
                        let _ = p.next();
                        LexicalUnit::Ident(name.to_string())
                    }
                }
            }
            Token::Ident(ref name) => LexicalUnit::Ident(name.to_string()),
            Token::QuotedString(ref s) => LexicalUnit::String(s.to_string()),
            Token::UnquotedUrl(ref url) => LexicalUnit::Uri(url.to_string()),
            Token::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                match p.parse_nested_block(url_argument) {
                    Ok(url) => LexicalUnit::Uri(url),
                    Err(_) => LexicalUnit::Unknown("url()".to_string()),
                }
            }
            Token::Function(ref name) if name.eq_ignore_ascii_case("rgb") => p
                .parse_nested_block(rgb_arguments)
                .unwrap_or_else(|_| LexicalUnit::Unknown("rgb()".to_string())),
            Token::Function(ref name) => LexicalUnit::Function {
                name: name.to_ascii_lowercase(),
                arguments: p.parse_nested_block(remaining_text).unwrap_or_default(),
            },
            Token::ParenthesisBlock => {
                LexicalUnit::SubExpression(p.parse_nested_block(remaining_text).unwrap_or_default())
            }
            Token::Hash(ref hex) | Token::IDHash(ref hex) => {
                hex_color(hex).unwrap_or_else(|| LexicalUnit::Unknown(format!("#{hex}")))
            }
            Token::Comma => LexicalUnit::Operator(Operator::Comma),
            Token::Delim('/') => LexicalUnit::Operator(Operator::Slash),
            other => LexicalUnit::Unknown(other.to_css_string()),
        };
        units.push(unit);
    }
    units
}

/// Convenience wrapper around [`parse_value`] for a standalone value string.
pub fn parse_value_str(css: &str) -> Vec<LexicalUnit> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    parse_value(&mut parser)
}

fn url_argument<'i>(p: &mut Parser<'i, '_>) -> Result<String, ParseError<'i, ()>> {
    let url = p.expect_string()?.to_string();
    p.expect_exhausted()?;
    Ok(url)
}

fn rgb_arguments<'i>(p: &mut Parser<'i, '_>) -> Result<LexicalUnit, ParseError<'i, ()>> {
    let state = p.state();
    match rgb_channels(p) {
        Ok(channels) => Ok(LexicalUnit::RgbColor(channels)),
        Err(_) => {
            p.reset(&state);
            Ok(LexicalUnit::Function {
                name: "rgb".to_string(),
                arguments: remaining_text(p)?,
            })
        }
    }
}

fn rgb_channels<'i>(p: &mut Parser<'i, '_>) -> Result<Vec<LexicalUnit>, ParseError<'i, ()>> {
    let mut channels = Vec::with_capacity(3);
    for index in 0..3 {
        if index > 0 {
            p.expect_comma()?;
        }
        let token = p.next()?.clone();
        channels.push(match token {
            Token::Number {
                int_value: Some(v), ..
            } => LexicalUnit::Integer(v),
            Token::Percentage {
                int_value: Some(v), ..
            } => LexicalUnit::Percentage(v as f32),
            other => return Err(p.new_unexpected_token_error(other)),
        });
    }
    p.expect_exhausted()?;
    Ok(channels)
}

/// `unit_value` is the written number divided by 100. Multiplying in floating point drifts
/// (`12.7%` would come back as `12.700001`), so the decimal exponent of its shortest
/// representation is shifted instead.
fn percentage_value(unit_value: f32) -> f32 {
    let scientific = format!("{unit_value:e}");
    scientific
        .split_once('e')
        .and_then(|(mantissa, exponent)| {
            let exponent = exponent.parse::<i32>().ok()? + 2;
            format!("{mantissa}e{exponent}").parse().ok()
        })
        .unwrap_or(unit_value * 100.0)
}

fn hex_color(hex: &str) -> Option<LexicalUnit> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| i32::from_str_radix(s, 16).ok();
    let (r, g, b) = match hex.len() {
        3 => {
            let digits: Vec<String> = hex.chars().map(|c| format!("{c}{c}")).collect();
            (
                channel(&digits[0])?,
                channel(&digits[1])?,
                channel(&digits[2])?,
            )
        }
        6 => (
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ),
        _ => return None,
    };
    Some(LexicalUnit::RgbColor(vec![
        LexicalUnit::Integer(r),
        LexicalUnit::Integer(g),
        LexicalUnit::Integer(b),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(r: i32, g: i32, b: i32) -> LexicalUnit {
        LexicalUnit::RgbColor(vec![
            LexicalUnit::Integer(r),
            LexicalUnit::Integer(g),
            LexicalUnit::Integer(b),
        ])
    }

    #[test]
    fn border_shorthand_tokens() {
        assert_eq!(
            parse_value_str("1PX Solid #f00"),
            vec![
                LexicalUnit::Dimension {
                    value: 1.0,
                    unit: "px".to_string()
                },
                LexicalUnit::Ident("Solid".to_string()),
                rgb(255, 0, 0),
            ]
        );
    }

    #[test]
    fn hex_and_functional_colors() {
        assert_eq!(parse_value_str("#0a0B0c"), vec![rgb(10, 11, 12)]);
        assert_eq!(parse_value_str("rgb(1, 2, 3)"), vec![rgb(1, 2, 3)]);
        assert_eq!(
            parse_value_str("rgb(10%,20%,30%)"),
            vec![LexicalUnit::RgbColor(vec![
                LexicalUnit::Percentage(10.0),
                LexicalUnit::Percentage(20.0),
                LexicalUnit::Percentage(30.0),
            ])]
        );
        assert_eq!(
            parse_value_str("#abcd"),
            vec![LexicalUnit::Unknown("#abcd".to_string())]
        );
    }

    #[test]
    fn rgb_with_extra_arguments_is_a_plain_function() {
        assert_eq!(
            parse_value_str("rgb(1, 2, 3, 4)"),
            vec![LexicalUnit::Function {
                name: "rgb".to_string(),
                arguments: "1, 2, 3, 4".to_string()
            }]
        );
    }

    #[test]
    fn urls_quoted_and_unquoted() {
        assert_eq!(
            parse_value_str("url(a.png) url('b c.png')"),
            vec![
                LexicalUnit::Uri("a.png".to_string()),
                LexicalUnit::Uri("b c.png".to_string()),
            ]
        );
    }

    #[test]
    fn operators_and_other_units() {
        assert_eq!(
            parse_value_str("12px/1.5 \"Times New Roman\", serif"),
            vec![
                LexicalUnit::Dimension {
                    value: 12.0,
                    unit: "px".to_string()
                },
                LexicalUnit::Operator(Operator::Slash),
                LexicalUnit::Real(1.5),
                LexicalUnit::String("Times New Roman".to_string()),
                LexicalUnit::Operator(Operator::Comma),
                LexicalUnit::Ident("serif".to_string()),
            ]
        );
        assert_eq!(
            parse_value_str("inherit 50% -3"),
            vec![
                LexicalUnit::Inherit,
                LexicalUnit::Percentage(50.0),
                LexicalUnit::Integer(-3),
            ]
        );
    }

    #[test]
    fn percentages_keep_the_written_number() {
        assert_eq!(
            parse_value_str("12.7% 33.3% 0.5% -2.25% 100%"),
            vec![
                LexicalUnit::Percentage(12.7),
                LexicalUnit::Percentage(33.3),
                LexicalUnit::Percentage(0.5),
                LexicalUnit::Percentage(-2.25),
                LexicalUnit::Percentage(100.0),
            ]
        );
    }

    #[test]
    fn functions_keep_their_arguments() {
        assert_eq!(
            parse_value_str("expression(alert(1))"),
            vec![LexicalUnit::Function {
                name: "expression".to_string(),
                arguments: "alert(1)".to_string()
            }]
        );
    }
}
