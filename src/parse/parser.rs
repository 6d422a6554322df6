use std::fmt;

/// A single parsed geoscope directive such as `USA`, `!EEA` or `GLOBAL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub negated: bool,
    pub name: String,
}

impl Directive {
    /// True for the un-negated `GLOBAL` directive.
    #[must_use]
    pub fn is_global(&self) -> bool {
        !self.negated && self.name == "GLOBAL"
    }

    /// True when the name looks like an ISO 3166 alpha-2 or alpha-3 code.
    #[must_use]
    pub fn is_country_code(&self) -> bool {
        (2..=3).contains(&self.name.len()) && self.name.bytes().all(|b| b.is_ascii_uppercase())
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        f.write_str(&self.name)
    }
}
