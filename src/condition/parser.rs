//! This module parses condition strings into evaluable expression trees.
//!
//! The grammar is a small boolean expression language over a fixed set of
//! predicates. Keywords are lowercase, string arguments are double-quoted
//! without escape sequences, and whitespace between tokens is ignored.
//! Parsing validates every path and regex argument, so a condition that
//! parses is also safe to evaluate.

use std::path::PathBuf;

use regex::{Regex, RegexBuilder};

use crate::prelude::*;
use crate::util::text;

/// A comparison operator for the `version()` predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparator {
	Equal,
	NotEqual,
	LessThan,
	GreaterThan,
	LessThanEqual,
	GreaterThanEqual,
}

impl Comparator {
	/// Applies this comparator to the result of comparing the actual value
	/// against the expected value.
	pub fn accepts(&self, ordering: std::cmp::Ordering) -> bool {
		match self {
			Comparator::Equal => ordering.is_eq(),
			Comparator::NotEqual => !ordering.is_eq(),
			Comparator::LessThan => ordering.is_lt(),
			Comparator::GreaterThan => ordering.is_gt(),
			Comparator::LessThanEqual => ordering.is_le(),
			Comparator::GreaterThanEqual => ordering.is_ge(),
		}
	}
}

/// A validated "parent path plus filename regex" argument.
///
/// Only the final path component may be a regex; the parent must be a
/// literal path so that evaluation never scans outside one directory.
#[derive(Clone, Debug)]
pub struct PathRegex {
	/// The literal path of the directory to scan, relative to the game's
	/// data directory.
	pub parent: PathBuf,

	/// The filename pattern, compiled anchored and case-insensitive.
	pub regex: Regex,
}

/// A single predicate over game state.
#[derive(Clone, Debug)]
pub enum Predicate {
	/// `file("path")`
	FileExists(String),

	/// `regex("parent/re")`
	RegexMatchExists(PathRegex),

	/// `many("parent/re")`
	ManyMatchesExist(PathRegex),

	/// `active("plugin")`
	PluginActive(String),

	/// `active("re")`
	RegexPluginActive(PathRegex),

	/// `many_active("re")`
	ManyPluginsActive(PathRegex),

	/// `checksum("path", CRC)`
	ChecksumMatches {
		path: String,
		crc: u32,
	},

	/// `version("path", "version", op)`
	VersionCompare {
		path: String,
		version: String,
		comparator: Comparator,
	},
}

/// A parsed condition expression.
#[derive(Clone, Debug)]
pub enum Expr {
	Or(Vec<Expr>),
	And(Vec<Expr>),
	Not(Box<Expr>),
	Predicate(Predicate),
}

/// Parses a complete condition string.
/// Trailing input after a valid expression is a syntax error.
pub fn parse_condition(text: &str) -> AppResult<Expr> {
	let tokens = tokenize(text)?;

	let mut parser = Parser {
		source: text,
		tokens,
		position: 0,
	};

	let expr = parser.parse_or_expr()?;

	match parser.peek() {
		None => Ok(expr),
		Some(_) => Err(parser.error("only partially matched expected syntax")),
	}
}

/// Rejects paths that could escape the game's data directory.
/// A '..' component directly following another '..' is the tell.
pub fn validate_path(source: &str, path: &str) -> AppResult<()> {
	let mut kept: Vec<&str> = Vec::new();

	for component in path.split('/') {
		if component == "." {
			continue;
		}

		if component == ".." && kept.last() == Some(&"..") {
			return Err(ConditionError::Syntax {
				text: source.to_owned(),
				diagnostic: format!("invalid file path: {path}"),
			}
			.into());
		}

		kept.push(component);
	}

	Ok(())
}

/// Splits a "parent/re" argument at its last slash and compiles the
/// filename component. The parent must be a literal path.
fn split_regex(source: &str, argument: &str) -> AppResult<PathRegex> {
	let (parent, filename) = match argument.rfind('/') {
		Some(position) => (&argument[..position], &argument[position + 1..]),
		None => ("", argument),
	};

	if text::is_regex_like(parent) {
		return Err(ConditionError::Syntax {
			text: source.to_owned(),
			diagnostic: format!("only the filename component of \"{argument}\" may be a regex"),
		}
		.into());
	}

	validate_path(source, parent)?;

	let regex = RegexBuilder::new(&format!("^(?:{filename})$"))
		.case_insensitive(true)
		.build()
		.map_err(|error| ConditionError::Syntax {
			text: source.to_owned(),
			diagnostic: format!("invalid regex string \"{filename}\": {error}"),
		})?;

	Ok(PathRegex {
		parent: PathBuf::from(parent),
		regex,
	})
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
	Word(String),
	Str(String),
	Comparator(Comparator),
	LParen,
	RParen,
	Comma,
}

/// Splits a condition string into tokens.
fn tokenize(text: &str) -> AppResult<Vec<Token>> {
	let syntax_error = |diagnostic: String| -> AppError {
		ConditionError::Syntax {
			text: text.to_owned(),
			diagnostic,
		}
		.into()
	};

	let mut tokens = Vec::new();
	let mut chars = text.chars().peekable();

	while let Some(&c) = chars.peek() {
		match c {
			c if c.is_whitespace() => {
				chars.next();
			}

			'(' => {
				chars.next();
				tokens.push(Token::LParen);
			}

			')' => {
				chars.next();
				tokens.push(Token::RParen);
			}

			',' => {
				chars.next();
				tokens.push(Token::Comma);
			}

			'"' => {
				chars.next();
				let mut value = String::new();
				loop {
					match chars.next() {
						Some('"') => break,
						Some(c) => value.push(c),
						None => return Err(syntax_error("unterminated string".to_owned())),
					}
				}
				tokens.push(Token::Str(value));
			}

			'=' | '!' | '<' | '>' => {
				chars.next();
				let followed_by_equals = chars.peek() == Some(&'=');
				if followed_by_equals {
					chars.next();
				}

				let comparator = match (c, followed_by_equals) {
					('=', true) => Comparator::Equal,
					('!', true) => Comparator::NotEqual,
					('<', true) => Comparator::LessThanEqual,
					('>', true) => Comparator::GreaterThanEqual,
					('<', false) => Comparator::LessThan,
					('>', false) => Comparator::GreaterThan,
					_ => return Err(syntax_error(format!("stray '{c}'"))),
				};

				tokens.push(Token::Comparator(comparator));
			}

			c if c.is_alphanumeric() || c == '_' => {
				let mut word = String::new();
				while let Some(&c) = chars.peek() {
					if !(c.is_alphanumeric() || c == '_') {
						break;
					}

					word.push(c);
					chars.next();
				}
				tokens.push(Token::Word(word));
			}

			other => return Err(syntax_error(format!("unexpected character '{other}'"))),
		}
	}

	Ok(tokens)
}

struct Parser<'a> {
	source: &'a str,
	tokens: Vec<Token>,
	position: usize,
}

impl Parser<'_> {
	fn error(&self, diagnostic: impl Into<String>) -> AppError {
		ConditionError::Syntax {
			text: self.source.to_owned(),
			diagnostic: diagnostic.into(),
		}
		.into()
	}

	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.position)
	}

	fn next(&mut self) -> Option<Token> {
		let token = self.tokens.get(self.position).cloned();
		if token.is_some() {
			self.position += 1;
		}

		token
	}

	/// Consumes a keyword if it is next, without consuming anything else.
	fn eat_keyword(&mut self, keyword: &str) -> bool {
		match self.peek() {
			Some(Token::Word(word)) if word == keyword => {
				self.position += 1;
				true
			}
			_ => false,
		}
	}

	fn expect(&mut self, token: Token, what: &str) -> AppResult<()> {
		match self.next() {
			Some(found) if found == token => Ok(()),
			_ => Err(self.error(format!("expected {what}"))),
		}
	}

	fn expect_string(&mut self, what: &str) -> AppResult<String> {
		match self.next() {
			Some(Token::Str(value)) => Ok(value),
			_ => Err(self.error(format!("expected {what}"))),
		}
	}

	fn parse_or_expr(&mut self) -> AppResult<Expr> {
		let mut terms = vec![self.parse_and_expr()?];

		while self.eat_keyword("or") {
			terms.push(self.parse_and_expr()?);
		}

		match terms.len() {
			1 => Ok(terms.remove(0)),
			_ => Ok(Expr::Or(terms)),
		}
	}

	fn parse_and_expr(&mut self) -> AppResult<Expr> {
		let mut terms = vec![self.parse_term()?];

		while self.eat_keyword("and") {
			terms.push(self.parse_term()?);
		}

		match terms.len() {
			1 => Ok(terms.remove(0)),
			_ => Ok(Expr::And(terms)),
		}
	}

	fn parse_term(&mut self) -> AppResult<Expr> {
		if self.eat_keyword("not") {
			return Ok(Expr::Not(Box::new(self.parse_term()?)));
		}

		if self.peek() == Some(&Token::LParen) {
			self.position += 1;
			let expr = self.parse_or_expr()?;
			self.expect(Token::RParen, "')'")?;
			return Ok(expr);
		}

		self.parse_predicate().map(Expr::Predicate)
	}

	fn parse_predicate(&mut self) -> AppResult<Predicate> {
		let name = match self.next() {
			Some(Token::Word(word)) => word,
			_ => return Err(self.error("expected a predicate")),
		};

		self.expect(Token::LParen, "'(' after predicate name")?;

		let predicate = match name.as_str() {
			"file" => Predicate::FileExists(self.path_argument()?),

			"regex" => {
				let argument = self.expect_string("a quoted regex")?;
				Predicate::RegexMatchExists(split_regex(self.source, &argument)?)
			}

			"many" => {
				let argument = self.expect_string("a quoted regex")?;
				Predicate::ManyMatchesExist(split_regex(self.source, &argument)?)
			}

			"active" => {
				let argument = self.expect_string("a quoted plugin name or regex")?;
				match text::is_regex_like(&argument) {
					true => Predicate::RegexPluginActive(split_regex(self.source, &argument)?),
					false => {
						validate_path(self.source, &argument)?;
						Predicate::PluginActive(argument)
					}
				}
			}

			"many_active" => {
				let argument = self.expect_string("a quoted regex")?;
				Predicate::ManyPluginsActive(split_regex(self.source, &argument)?)
			}

			"checksum" => {
				let path = self.path_argument()?;
				self.expect(Token::Comma, "',' after checksum path")?;
				let crc = self.crc_argument()?;
				Predicate::ChecksumMatches { path, crc }
			}

			"version" => {
				let path = self.path_argument()?;
				self.expect(Token::Comma, "',' after version path")?;
				let version = self.expect_string("a quoted version")?;
				self.expect(Token::Comma, "',' after version string")?;
				let comparator = match self.next() {
					Some(Token::Comparator(comparator)) => comparator,
					_ => return Err(self.error("expected a comparison operator")),
				};
				Predicate::VersionCompare {
					path,
					version,
					comparator,
				}
			}

			other => return Err(self.error(format!("unknown predicate '{other}'"))),
		};

		self.expect(Token::RParen, "')' after predicate arguments")?;

		Ok(predicate)
	}

	/// Consumes a quoted literal path argument. Regex-like strings are
	/// rejected here; predicates that accept regexes say so explicitly.
	fn path_argument(&mut self) -> AppResult<String> {
		let path = self.expect_string("a quoted file path")?;

		if text::is_regex_like(&path) {
			return Err(self.error(format!("\"{path}\" is not a literal path")));
		}

		validate_path(self.source, &path)?;

		Ok(path)
	}

	/// Consumes a CRC32 literal, written in hex with or without an "0x"
	/// prefix.
	fn crc_argument(&mut self) -> AppResult<u32> {
		let word = match self.next() {
			Some(Token::Word(word)) => word,
			_ => return Err(self.error("expected a CRC literal")),
		};

		let digits = word.strip_prefix("0x").unwrap_or(&word);

		u32::from_str_radix(digits, 16)
			.map_err(|_| self.error(format!("\"{word}\" is not a CRC32 value")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn boolean_operators_nest_and_group() {
		let expr =
			parse_condition("not file(\"a.esp\") and ( active(\"b.esp\") or active(\"c.esp\") )")
				.unwrap();

		let Expr::And(terms) = expr else {
			panic!("expected an and-expression");
		};
		assert_eq!(terms.len(), 2);
		assert!(matches!(terms[0], Expr::Not(_)));
		assert!(matches!(&terms[1], Expr::Or(inner) if inner.len() == 2));
	}

	#[test]
	fn the_whole_input_must_parse() {
		let result = parse_condition("file(\"a.esp\") garbage");

		assert!(matches!(
			result,
			Err(AppError::Condition(ConditionError::Syntax { .. }))
		));
	}

	#[test]
	fn repeated_parent_traversal_is_rejected() {
		assert!(parse_condition("file(\"../../sensitive.txt\")").is_err());
		assert!(parse_condition("file(\"../sibling/file.esp\")").is_ok());
		assert!(parse_condition("file(\"./a/../b.esp\")").is_ok());
	}

	#[test]
	fn active_distinguishes_plugin_names_from_regexes() {
		let plain = parse_condition("active(\"Unofficial Patch.esp\")").unwrap();
		assert!(matches!(
			plain,
			Expr::Predicate(Predicate::PluginActive(_))
		));

		let regex = parse_condition(r#"active("Unofficial.*\.esp")"#).unwrap();
		assert!(matches!(
			regex,
			Expr::Predicate(Predicate::RegexPluginActive(_))
		));
	}

	#[test]
	fn regex_arguments_split_at_the_last_slash() {
		let expr = parse_condition(r#"regex("textures/landscape/.*\.dds")"#).unwrap();

		let Expr::Predicate(Predicate::RegexMatchExists(path_regex)) = expr else {
			panic!("expected a regex predicate");
		};
		assert_eq!(path_regex.parent, PathBuf::from("textures/landscape"));
		assert!(path_regex.regex.is_match("mountains.dds"));
		assert!(!path_regex.regex.is_match("mountains.dds.bak"));
	}

	#[test]
	fn regex_parents_must_be_literal_paths() {
		assert!(parse_condition(r#"regex("tex.*/.*\.dds")"#).is_err());
	}

	#[test]
	fn invalid_patterns_are_syntax_errors() {
		assert!(parse_condition(r#"many("foo(\.esp")"#).is_err());
	}

	#[test]
	fn checksum_accepts_hex_with_and_without_prefix() {
		let with_prefix = parse_condition("checksum(\"a.esp\", 0xDEADBEEF)").unwrap();
		let bare = parse_condition("checksum(\"a.esp\", DEADBEEF)").unwrap();

		for expr in [with_prefix, bare] {
			let Expr::Predicate(Predicate::ChecksumMatches { crc, .. }) = expr else {
				panic!("expected a checksum predicate");
			};
			assert_eq!(crc, 0xDEADBEEF);
		}
	}

	#[test]
	fn version_requires_a_comparator() {
		let expr = parse_condition("version(\"a.esp\", \"1.0\", >=)").unwrap();

		let Expr::Predicate(Predicate::VersionCompare { comparator, .. }) = expr else {
			panic!("expected a version predicate");
		};
		assert_eq!(comparator, Comparator::GreaterThanEqual);

		assert!(parse_condition("version(\"a.esp\", \"1.0\")").is_err());
	}

	#[test]
	fn unknown_predicates_are_rejected() {
		assert!(parse_condition("exists(\"a.esp\")").is_err());
	}
}
