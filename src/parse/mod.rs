mod error;
mod grammar;
mod parser;

pub use error::ParseError;
pub use parser::Directive;

/// Parse a single geoscope directive string into a [`Directive`].
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not an optional `!` followed by a
/// token of ASCII letters, digits or underscores.
pub fn parse_directive(input: &str) -> Result<Directive, ParseError> {
    use winnow::Parser;
    grammar::directive
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}
