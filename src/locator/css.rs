//! CSS selector to XPath compiler.
//!
//! Output follows the shape `cssselect` produces (`descendant-or-self::tag[...]`), so locators
//! built from CSS join cleanly with the other normalized kinds.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CssError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected end of selector")]
    UnexpectedEnd,

    #[error("unexpected character {0:?} at position {1}")]
    Unexpected(char, usize),

    #[error("unsupported pseudo-class :{0}")]
    UnsupportedPseudo(String),
}

/// Compile a selector group into one XPath per alternative
pub fn compile(selector: &str) -> Result<Vec<String>, CssError> {
    Parser::new(selector).parse_group()
}

/// Compile a selector group into a single XPath union
pub fn css_to_xpath(selector: &str) -> Result<String, CssError> {
    Ok(compile(selector)?.join(" | "))
}

#[derive(Debug, Clone)]
struct XPathExpr {
    path: String,
    element: String,
    conditions: Vec<String>,
}

impl XPathExpr {
    fn new(path: impl Into<String>, compound: Compound) -> Self {
        Self {
            path: path.into(),
            element: compound.element,
            conditions: compound.conditions,
        }
    }

    fn add_name_test(&mut self) {
        if self.element != "*" {
            let test = format!("name() = {}", literal(&self.element));
            self.conditions.insert(0, test);
            self.element = "*".to_string();
        }
    }

    fn render(&self) -> String {
        let condition = match self.conditions.len() {
            0 => String::new(),
            1 => format!("[{}]", self.conditions[0]),
            _ => format!(
                "[{}]",
                self.conditions
                    .iter()
                    .map(|c| format!("({})", c))
                    .collect::<Vec<_>>()
                    .join(" and ")
            ),
        };
        format!("{}{}{}", self.path, self.element, condition)
    }
}

#[derive(Debug, Clone)]
struct Compound {
    element: String,
    conditions: Vec<String>,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(selector: &str) -> Self {
        Self {
            chars: selector.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, wanted: char) -> Result<(), CssError> {
        match self.bump() {
            Some(c) if c == wanted => Ok(()),
            Some(c) => Err(CssError::Unexpected(c, self.pos - 1)),
            None => Err(CssError::UnexpectedEnd),
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self) -> CssError {
        match self.peek() {
            Some(c) => CssError::Unexpected(c, self.pos),
            None => CssError::UnexpectedEnd,
        }
    }

    fn parse_group(&mut self) -> Result<Vec<String>, CssError> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return Err(CssError::Empty);
        }

        let mut alternatives = Vec::new();
        loop {
            self.skip_whitespace();
            alternatives.push(self.parse_selector()?);
            self.skip_whitespace();

            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                None => break,
                Some(_) => return Err(self.unexpected()),
            }
        }

        Ok(alternatives)
    }

    fn parse_selector(&mut self) -> Result<String, CssError> {
        let mut expr = XPathExpr::new("descendant-or-self::", self.parse_compound()?);

        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some(c @ ('>' | '+' | '~')) => {
                    self.pos += 1;
                    self.skip_whitespace();
                    c
                }
                Some(_) if had_space => ' ',
                Some(_) => return Err(self.unexpected()),
            };

            let right = self.parse_compound()?;
            let left = expr.render();

            expr = match combinator {
                ' ' => XPathExpr::new(format!("{}/descendant-or-self::*/", left), right),
                '>' => XPathExpr::new(format!("{}/", left), right),
                '+' => {
                    let mut next = XPathExpr::new(format!("{}/following-sibling::", left), right);
                    next.add_name_test();
                    next.conditions.push("position() = 1".to_string());
                    next
                }
                _ => XPathExpr::new(format!("{}/following-sibling::", left), right),
            };
        }

        Ok(expr.render())
    }

    fn parse_compound(&mut self) -> Result<Compound, CssError> {
        let start = self.pos;

        let element = match self.peek() {
            Some('*') => {
                self.pos += 1;
                "*".to_string()
            }
            Some(c) if is_ident_start(c) => self.parse_ident()?.to_ascii_lowercase(),
            _ => "*".to_string(),
        };

        let mut compound = Compound {
            element,
            conditions: Vec::new(),
        };

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.parse_ident()?;
                    compound.conditions.push(format!("@id = {}", literal(&id)));
                }
                Some('.') => {
                    self.pos += 1;
                    let class = self.parse_ident()?;
                    compound.conditions.push(format!(
                        "@class and contains(concat(' ', normalize-space(@class), ' '), {})",
                        literal(&format!(" {} ", class))
                    ));
                }
                Some('[') => {
                    self.pos += 1;
                    let condition = self.parse_attribute()?;
                    compound.conditions.push(condition);
                }
                Some(':') => {
                    self.pos += 1;
                    let condition = self.parse_pseudo(&compound.element)?;
                    compound.conditions.push(condition);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.unexpected());
        }

        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, CssError> {
        let mut ident = String::new();

        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    ident.push(self.bump().ok_or(CssError::UnexpectedEnd)?);
                }
                Some(c) if is_ident_char(c) => {
                    self.pos += 1;
                    ident.push(c);
                }
                _ => break,
            }
        }

        if ident.is_empty() {
            return Err(self.unexpected());
        }
        Ok(ident)
    }

    fn parse_string(&mut self, quote: char) -> Result<String, CssError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(CssError::UnexpectedEnd),
                Some('\\') => value.push(self.bump().ok_or(CssError::UnexpectedEnd)?),
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
            }
        }
    }

    fn parse_attribute(&mut self) -> Result<String, CssError> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        let attr = format!("@{}", name);
        self.skip_whitespace();

        let operator = match self.bump() {
            Some(']') => return Ok(attr),
            Some('=') => "=".to_string(),
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.expect('=')?;
                format!("{}=", c)
            }
            Some(c) => return Err(CssError::Unexpected(c, self.pos - 1)),
            None => return Err(CssError::UnexpectedEnd),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                self.parse_string(q)?
            }
            _ => self.parse_ident()?,
        };
        self.skip_whitespace();
        self.expect(']')?;

        let condition = match operator.as_str() {
            "=" => format!("{} = {}", attr, literal(&value)),
            "~=" if value.is_empty() || value.chars().any(char::is_whitespace) => "0".to_string(),
            "~=" => format!(
                "{attr} and contains(concat(' ', normalize-space({attr}), ' '), {})",
                literal(&format!(" {} ", value))
            ),
            "|=" => format!(
                "{attr} and ({attr} = {} or starts-with({attr}, {}))",
                literal(&value),
                literal(&format!("{}-", value))
            ),
            "^=" if value.is_empty() => "0".to_string(),
            "^=" => format!("{attr} and starts-with({attr}, {})", literal(&value)),
            "$=" if value.is_empty() => "0".to_string(),
            "$=" => format!(
                "{attr} and substring({attr}, string-length({attr})-{}) = {}",
                value.chars().count() - 1,
                literal(&value)
            ),
            "*=" if value.is_empty() => "0".to_string(),
            _ => format!("{attr} and contains({attr}, {})", literal(&value)),
        };

        Ok(condition)
    }

    fn parse_pseudo(&mut self, element: &str) -> Result<String, CssError> {
        if self.peek() == Some(':') {
            return Err(CssError::UnsupportedPseudo(":".to_string()));
        }

        let name = self.parse_ident()?.to_ascii_lowercase();

        if self.peek() == Some('(') {
            self.pos += 1;
            let mut argument = String::new();
            loop {
                match self.bump() {
                    None => return Err(CssError::UnexpectedEnd),
                    Some(')') => break,
                    Some(c) => argument.push(c),
                }
            }

            return match (name.as_str(), argument.trim().parse::<i64>()) {
                ("nth-child", Ok(n)) if n >= 1 => {
                    Ok(format!("count(preceding-sibling::*) = {}", n - 1))
                }
                ("nth-child", Ok(_)) => Ok("0".to_string()),
                _ => Err(CssError::UnsupportedPseudo(format!("{}({})", name, argument))),
            };
        }

        let condition = match name.as_str() {
            "first-child" => "count(preceding-sibling::*) = 0".to_string(),
            "last-child" => "count(following-sibling::*) = 0".to_string(),
            "only-child" => "count(parent::*/child::*) = 1".to_string(),
            "first-of-type" if element != "*" => {
                format!("count(preceding-sibling::{}) = 0", element)
            }
            "last-of-type" if element != "*" => {
                format!("count(following-sibling::{}) = 0", element)
            }
            "empty" => "not(*) and not(string-length())".to_string(),
            "checked" => "(@selected and name(.) = 'option') or (@checked and (name(.) = 'input' or name(.) = 'command') and (@type = 'checkbox' or @type = 'radio'))".to_string(),
            _ => return Err(CssError::UnsupportedPseudo(name)),
        };

        Ok(condition)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

/// Quote a string as an XPath literal
pub(crate) fn literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{}'", s)
    } else if !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        let parts: Vec<String> = s.split('\'').map(|part| format!("'{}'", part)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
