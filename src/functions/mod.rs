//! The closed registry of functions a configuration may name.
//!
//! Schema functions classify a [`RequestWrapper`] into a discriminator;
//! result functions record mutations into a [`HookResult`]. Both are built
//! from a wire name plus the raw JSON `args` of a declaration.

pub mod result;
pub mod schema;

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{BuildError, HookResult, RequestWrapper, ResultFunction, SchemaFunction};

/// Builds a schema function from its declared name and raw arguments.
pub type SchemaFuncFactory<C> =
    fn(&str, Option<&Value>) -> Result<Box<dyn SchemaFunction<C>>, BuildError>;

/// Builds a result function from its declared name and raw arguments.
pub type ResultFuncFactory<C, A> =
    fn(&str, Option<&Value>) -> Result<Box<dyn ResultFunction<C, A>>, BuildError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaFunctionName {
    DeviceCountry,
    DeviceCountryIn,
    DataCenter,
    DataCenterIn,
    Channel,
    EidAvailable,
    EidIn,
    UserFpdAvailable,
    FpdAvailable,
    GppSidAvailable,
    GppSidIn,
    TcfInScope,
    Percent,
    PrebidKey,
    Domain,
    DomainIn,
    Bundle,
    BundleIn,
    DeviceType,
    DeviceTypeIn,
}

impl SchemaFunctionName {
    pub const ALL: [Self; 20] = [
        Self::DeviceCountry,
        Self::DeviceCountryIn,
        Self::DataCenter,
        Self::DataCenterIn,
        Self::Channel,
        Self::EidAvailable,
        Self::EidIn,
        Self::UserFpdAvailable,
        Self::FpdAvailable,
        Self::GppSidAvailable,
        Self::GppSidIn,
        Self::TcfInScope,
        Self::Percent,
        Self::PrebidKey,
        Self::Domain,
        Self::DomainIn,
        Self::Bundle,
        Self::BundleIn,
        Self::DeviceType,
        Self::DeviceTypeIn,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeviceCountry => "deviceCountry",
            Self::DeviceCountryIn => "deviceCountryIn",
            Self::DataCenter => "dataCenter",
            Self::DataCenterIn => "dataCenterIn",
            Self::Channel => "channel",
            Self::EidAvailable => "eidAvailable",
            Self::EidIn => "eidIn",
            Self::UserFpdAvailable => "userFpdAvailable",
            Self::FpdAvailable => "fpdAvailable",
            Self::GppSidAvailable => "gppSidAvailable",
            Self::GppSidIn => "gppSidIn",
            Self::TcfInScope => "tcfInScope",
            Self::Percent => "percent",
            Self::PrebidKey => "prebidKey",
            Self::Domain => "domain",
            Self::DomainIn => "domainIn",
            Self::Bundle => "bundle",
            Self::BundleIn => "bundleIn",
            Self::DeviceType => "deviceType",
            Self::DeviceTypeIn => "deviceTypeIn",
        }
    }

    /// Whether the function is configured through `args`.
    #[must_use]
    pub fn takes_args(self) -> bool {
        matches!(
            self,
            Self::DeviceCountryIn
                | Self::DataCenterIn
                | Self::EidIn
                | Self::GppSidIn
                | Self::Percent
                | Self::PrebidKey
                | Self::DomainIn
                | Self::BundleIn
                | Self::DeviceTypeIn
        )
    }
}

impl FromStr for SchemaFunctionName {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| BuildError::UnknownSchemaFunction { name: s.to_owned() })
    }
}

impl fmt::Display for SchemaFunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultFunctionName {
    ExcludeBidders,
    IncludeBidders,
    LogATag,
}

impl ResultFunctionName {
    pub const ALL: [Self; 3] = [Self::ExcludeBidders, Self::IncludeBidders, Self::LogATag];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExcludeBidders => "excludeBidders",
            Self::IncludeBidders => "includeBidders",
            Self::LogATag => "logATag",
        }
    }
}

impl FromStr for ResultFunctionName {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| BuildError::UnknownResultFunction { name: s.to_owned() })
    }
}

impl fmt::Display for ResultFunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construct the named schema function over bid requests.
///
/// # Errors
///
/// Returns [`BuildError::UnknownSchemaFunction`] for a name outside the
/// registry and [`BuildError::InvalidArgs`] when `args` do not fit it.
pub fn new_request_schema_function(
    name: &str,
    args: Option<&Value>,
) -> Result<Box<dyn SchemaFunction<RequestWrapper>>, BuildError> {
    use schema::*;

    let name: SchemaFunctionName = name.parse()?;
    if !name.takes_args() {
        no_args(name, args)?;
    }
    let function: Box<dyn SchemaFunction<RequestWrapper>> = match name {
        SchemaFunctionName::DeviceCountry => Box::new(DeviceCountry),
        SchemaFunctionName::DeviceCountryIn => Box::new(DeviceCountryIn::new(parse_args(name, args)?)),
        SchemaFunctionName::DataCenter => Box::new(DataCenter),
        SchemaFunctionName::DataCenterIn => Box::new(DataCenterIn::new(parse_args(name, args)?)),
        SchemaFunctionName::Channel => Box::new(Channel),
        SchemaFunctionName::EidAvailable => Box::new(EidAvailable),
        SchemaFunctionName::EidIn => Box::new(EidIn::new(parse_args(name, args)?)),
        SchemaFunctionName::UserFpdAvailable => Box::new(UserFpdAvailable),
        SchemaFunctionName::FpdAvailable => Box::new(FpdAvailable),
        SchemaFunctionName::GppSidAvailable => Box::new(GppSidAvailable),
        SchemaFunctionName::GppSidIn => Box::new(GppSidIn::new(parse_args(name, args)?)),
        SchemaFunctionName::TcfInScope => Box::new(TcfInScope),
        SchemaFunctionName::Percent => Box::new(Percent::new(parse_args(name, args)?)),
        SchemaFunctionName::PrebidKey => Box::new(PrebidKey::new(parse_args(name, args)?)),
        SchemaFunctionName::Domain => Box::new(Domain),
        SchemaFunctionName::DomainIn => Box::new(DomainIn::new(parse_args(name, args)?)),
        SchemaFunctionName::Bundle => Box::new(Bundle),
        SchemaFunctionName::BundleIn => Box::new(BundleIn::new(parse_args(name, args)?)),
        SchemaFunctionName::DeviceType => Box::new(DeviceType),
        SchemaFunctionName::DeviceTypeIn => Box::new(DeviceTypeIn::new(parse_args(name, args)?)),
    };
    Ok(function)
}

/// Construct the named result function for the processed auction request
/// stage.
///
/// # Errors
///
/// Returns [`BuildError::UnknownResultFunction`] for a name outside the
/// registry and [`BuildError::InvalidArgs`] when `args` do not fit it.
pub fn new_result_function(
    name: &str,
    args: Option<&Value>,
) -> Result<Box<dyn ResultFunction<RequestWrapper, HookResult>>, BuildError> {
    use result::*;

    let name: ResultFunctionName = name.parse()?;
    let function: Box<dyn ResultFunction<RequestWrapper, HookResult>> = match name {
        ResultFunctionName::ExcludeBidders => Box::new(ExcludeBidders::new(parse_args(name, args)?)),
        ResultFunctionName::IncludeBidders => Box::new(IncludeBidders::new(parse_args(name, args)?)),
        ResultFunctionName::LogATag => Box::new(LogATag::new(parse_args(name, args)?)),
    };
    Ok(function)
}

/// Deserialize `args` into `T`; absent args deserialize from `{}`.
fn parse_args<T: DeserializeOwned>(
    name: impl fmt::Display,
    args: Option<&Value>,
) -> Result<T, BuildError> {
    let result = match args {
        Some(value) => T::deserialize(value),
        None => T::deserialize(&Value::Object(serde_json::Map::new())),
    };
    result.map_err(|e| BuildError::InvalidArgs {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Functions without parameters accept absent args, `null` or `{}`.
fn no_args(name: impl fmt::Display, args: Option<&Value>) -> Result<(), BuildError> {
    match args {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Object(map)) if map.is_empty() => Ok(()),
        Some(_) => Err(BuildError::InvalidArgs {
            name: name.to_string(),
            reason: "function takes no arguments".to_owned(),
        }),
    }
}
