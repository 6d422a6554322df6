use winnow::combinator::{cut_err, opt};
use winnow::error::{ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_while;

use super::parser::Directive;

// -- Tokens -----------------------------------------------------------------

fn negation(input: &mut &str) -> ModalResult<bool> {
    opt('!').map(|bang| bang.is_some()).parse_next(input)
}

fn token<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_')
        .context(StrContext::Label("geoscope"))
        .context(StrContext::Expected(StrContextValue::Description(
            "country code, country group or GLOBAL",
        )))
        .parse_next(input)
}

// -- Directive --------------------------------------------------------------

pub(super) fn directive(input: &mut &str) -> ModalResult<Directive> {
    let negated = negation.parse_next(input)?;
    let name = cut_err(token).parse_next(input)?;
    Ok(Directive {
        negated,
        name: name.to_owned(),
    })
}
