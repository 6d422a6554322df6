//! Derives a device-country tree from bidder geoscope directives.
//!
//! Every bidder declares where it may bid with a list of directives:
//! `GLOBAL`, country codes, named country groups, and `!`-prefixed
//! exclusions of either. The builder works out, for each country mentioned
//! plus the wildcard, which bidders must be excluded, and emits a depth-1
//! tree keyed by device country whose leaves exclude exactly those bidders.

use std::collections::BTreeMap;

use crate::functions::result::{BiddersArgs, ExcludeBidders};
use crate::functions::schema::DeviceCountry;
use crate::parse::parse_directive;
use crate::types::{BuildError, HookResult, Node, RequestWrapper, Tree, WILDCARD};

use super::TreeBuild;

/// Group name to member country codes.
pub type CountryGroups = BTreeMap<String, Vec<String>>;

/// Country code (or the wildcard) to the bidders excluded there.
pub type CountryExclusions = BTreeMap<String, Vec<String>>;

/// Members of the European Economic Area.
pub const EEA_COUNTRIES: [&str; 30] = [
    "AUT", "BEL", "BGR", "CYP", "CZE", "DEU", "DNK", "EST", "ESP", "FIN", "FRA", "GRC", "HRV",
    "HUN", "IRL", "ISL", "ITA", "LIE", "LTU", "LUX", "LVA", "MLT", "NLD", "NOR", "POL", "PRT",
    "ROU", "SWE", "SVN", "SVK",
];

/// The built-in country groups.
#[must_use]
pub fn default_country_groups() -> CountryGroups {
    let mut groups = CountryGroups::new();
    groups.insert(
        "EEA".to_owned(),
        EEA_COUNTRIES.iter().map(|c| (*c).to_owned()).collect(),
    );
    groups
}

/// Copy `defaults` and overlay account `set_definitions` on top.
///
/// Group names are upper-cased; an account group replaces a default group of
/// the same name.
#[must_use]
pub fn merge_country_groups(defaults: &CountryGroups, set_definitions: &CountryGroups) -> CountryGroups {
    defaults
        .iter()
        .chain(set_definitions)
        .map(|(name, members)| (name.to_uppercase(), members.clone()))
        .collect()
}

/// Which exclusion rule applies to a bidder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Allowed everywhere; never excluded.
    Global,
    /// Allowed in the included groups, minus specific exclusions, plus
    /// specific inclusions.
    AllowListWithGroups,
    /// Blocked in the excluded groups, minus specific inclusions, plus
    /// specific exclusions.
    BlockListWithGroups,
    /// Allowed only in the named countries.
    AllowList,
    /// Blocked only in the named countries.
    BlockList,
    /// No directives at all.
    Unrestricted,
}

/// A bidder's directives sorted by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedGeoscopes {
    pub bidder: String,
    pub global_included: bool,
    pub country_groups_included: Vec<String>,
    pub country_groups_excluded: Vec<String>,
    pub single_countries_included: Vec<String>,
    pub single_countries_excluded: Vec<String>,
}

impl ParsedGeoscopes {
    /// First match wins: global, included groups, excluded groups, included
    /// countries, excluded countries.
    #[must_use]
    pub fn policy(&self) -> Policy {
        if self.global_included {
            Policy::Global
        } else if !self.country_groups_included.is_empty() {
            Policy::AllowListWithGroups
        } else if !self.country_groups_excluded.is_empty() {
            Policy::BlockListWithGroups
        } else if !self.single_countries_included.is_empty() {
            Policy::AllowList
        } else if !self.single_countries_excluded.is_empty() {
            Policy::BlockList
        } else {
            Policy::Unrestricted
        }
    }

    fn includes(&self, country: &str) -> bool {
        self.single_countries_included.iter().any(|c| c == country)
    }

    fn excludes(&self, country: &str) -> bool {
        self.single_countries_excluded.iter().any(|c| c == country)
    }

    /// Whether the bidder must be excluded for requests from `country`.
    fn excluded_in(&self, country: &str, groups: &CountryGroups) -> bool {
        let in_any = |names: &[String]| {
            names
                .iter()
                .filter_map(|name| groups.get(name))
                .any(|members| members.iter().any(|m| m == country))
        };
        match self.policy() {
            Policy::Global | Policy::Unrestricted => false,
            Policy::AllowListWithGroups => {
                let in_group = in_any(&self.country_groups_included);
                (in_group && self.excludes(country)) || (!in_group && !self.includes(country))
            }
            Policy::BlockListWithGroups => {
                let in_group = in_any(&self.country_groups_excluded);
                (in_group && !self.includes(country)) || (!in_group && self.excludes(country))
            }
            Policy::AllowList => !self.includes(country),
            Policy::BlockList => self.excludes(country),
        }
    }
}

/// Builds the dynamic geoscope rule set for an account.
#[derive(Debug, Clone, Default)]
pub struct GeoscopeTreeBuilder {
    country_groups: CountryGroups,
    geoscopes: BTreeMap<String, Vec<String>>,
}

impl GeoscopeTreeBuilder {
    /// A builder over the built-in groups extended by the account's
    /// `set_definitions`.
    #[must_use]
    pub fn new(geoscopes: BTreeMap<String, Vec<String>>, set_definitions: &CountryGroups) -> Self {
        Self::with_country_groups(
            geoscopes,
            merge_country_groups(&default_country_groups(), set_definitions),
        )
    }

    /// A builder over exactly `country_groups`.
    #[must_use]
    pub fn with_country_groups(
        geoscopes: BTreeMap<String, Vec<String>>,
        country_groups: CountryGroups,
    ) -> Self {
        Self {
            country_groups,
            geoscopes,
        }
    }

    #[must_use]
    pub fn country_groups(&self) -> &CountryGroups {
        &self.country_groups
    }

    /// Sort one bidder's directives by kind.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownGeoscope`] for a directive that is not
    /// `GLOBAL`, a known group or a country code, negated or not.
    pub fn parse_bidder_geoscopes(
        &self,
        bidder: &str,
        geoscopes: &[String],
    ) -> Result<ParsedGeoscopes, BuildError> {
        let mut parsed = ParsedGeoscopes {
            bidder: bidder.to_owned(),
            ..ParsedGeoscopes::default()
        };

        for raw in geoscopes {
            let unknown = || BuildError::UnknownGeoscope {
                directive: raw.clone(),
            };
            let directive = parse_directive(raw).map_err(|_| unknown())?;

            let bucket = if directive.is_global() {
                parsed.global_included = true;
                continue;
            } else if self.country_groups.contains_key(&directive.name) {
                if directive.negated {
                    &mut parsed.country_groups_excluded
                } else {
                    &mut parsed.country_groups_included
                }
            } else if directive.is_country_code() {
                if directive.negated {
                    &mut parsed.single_countries_excluded
                } else {
                    &mut parsed.single_countries_included
                }
            } else {
                return Err(unknown());
            };
            bucket.push(directive.name);
        }

        Ok(parsed)
    }

    /// Parse every bidder, in name order.
    ///
    /// # Errors
    ///
    /// Returns the first [`BuildError::UnknownGeoscope`] encountered.
    pub fn parse_all(&self) -> Result<Vec<ParsedGeoscopes>, BuildError> {
        self.geoscopes
            .iter()
            .map(|(bidder, geoscopes)| self.parse_bidder_geoscopes(bidder, geoscopes))
            .collect()
    }

    /// One empty bucket per country named by any bidder, directly or through
    /// a group, plus the wildcard.
    #[must_use]
    pub fn initialize_country_exclusions(&self, parsed: &[ParsedGeoscopes]) -> CountryExclusions {
        let mut exclusions = CountryExclusions::new();
        for bidder in parsed {
            let groups = bidder
                .country_groups_included
                .iter()
                .chain(&bidder.country_groups_excluded)
                .filter_map(|name| self.country_groups.get(name))
                .flatten();
            let singles = bidder
                .single_countries_included
                .iter()
                .chain(&bidder.single_countries_excluded);
            for country in groups.chain(singles) {
                exclusions.entry(country.clone()).or_default();
            }
        }
        exclusions.insert(WILDCARD.to_owned(), Vec::new());
        exclusions
    }

    /// The full exclusion table: every bucket with the bidders excluded there,
    /// listed in bidder name order.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownGeoscope`] if any directive is invalid.
    pub fn country_exclusions(&self) -> Result<CountryExclusions, BuildError> {
        let parsed = self.parse_all()?;
        let mut exclusions = self.initialize_country_exclusions(&parsed);
        for bidder in &parsed {
            for (country, excluded) in &mut exclusions {
                if bidder.excluded_in(country, &self.country_groups) {
                    excluded.push(bidder.bidder.clone());
                }
            }
        }
        Ok(exclusions)
    }
}

impl TreeBuild<RequestWrapper, HookResult> for GeoscopeTreeBuilder {
    fn build(&self, tree: &mut Tree<RequestWrapper, HookResult>) -> Result<(), BuildError> {
        if self.geoscopes.is_empty() {
            return Ok(());
        }
        let Some(root) = tree.root.as_mut() else {
            return Ok(());
        };

        let exclusions = self.country_exclusions()?;
        root.schema_function = Some(Box::new(DeviceCountry));
        add_tree_nodes(root, exclusions);
        Ok(())
    }
}

/// Replace the root's children with one leaf per exclusion bucket.
fn add_tree_nodes(root: &mut Node<RequestWrapper, HookResult>, exclusions: CountryExclusions) {
    root.children = exclusions
        .into_iter()
        .map(|(country, bidders)| {
            let mut leaf = Node::new();
            leaf.result_functions
                .push(Box::new(ExcludeBidders::new(BiddersArgs::new(bidders))));
            (country, leaf)
        })
        .collect();
}
