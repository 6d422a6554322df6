//! Schema functions over [`RequestWrapper`].
//!
//! Plain functions return the attribute itself as the discriminator. The
//! `*In` variants test membership in a configured list and answer `"true"`
//! or `"false"`.

use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{FunctionError, RequestWrapper, SchemaFunction};

const TRUE: &str = "true";
const FALSE: &str = "false";

fn flag(value: bool) -> String {
    let answer = if value { TRUE } else { FALSE };
    answer.to_owned()
}

fn ext_data_present(ext: Option<&Map<String, Value>>) -> bool {
    ext.and_then(|e| e.get("data")).is_some_and(|d| !d.is_null())
}

fn user_fpd_present(wrapper: &RequestWrapper) -> bool {
    wrapper
        .request
        .user
        .as_ref()
        .is_some_and(|u| !u.data.is_empty() || ext_data_present(u.ext.as_ref()))
}

// -- Device country ---------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCountry;

impl SchemaFunction<RequestWrapper> for DeviceCountry {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        wrapper
            .device_country()
            .map(str::to_owned)
            .ok_or(FunctionError::MissingField("device.geo.country"))
    }

    fn name(&self) -> &'static str {
        "deviceCountry"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountriesArgs {
    pub countries: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DeviceCountryIn {
    countries: Vec<String>,
}

impl DeviceCountryIn {
    #[must_use]
    pub fn new(args: CountriesArgs) -> Self {
        Self {
            countries: args.countries,
        }
    }
}

impl SchemaFunction<RequestWrapper> for DeviceCountryIn {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        Ok(flag(
            wrapper
                .device_country()
                .is_some_and(|c| self.countries.iter().any(|x| x == c)),
        ))
    }

    fn name(&self) -> &'static str {
        "deviceCountryIn"
    }
}

// -- Data center ------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct DataCenter;

impl SchemaFunction<RequestWrapper> for DataCenter {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        wrapper
            .data_center
            .clone()
            .ok_or(FunctionError::MissingField("data center"))
    }

    fn name(&self) -> &'static str {
        "dataCenter"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataCentersArgs {
    pub datacenters: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DataCenterIn {
    datacenters: Vec<String>,
}

impl DataCenterIn {
    #[must_use]
    pub fn new(args: DataCentersArgs) -> Self {
        Self {
            datacenters: args.datacenters,
        }
    }
}

impl SchemaFunction<RequestWrapper> for DataCenterIn {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        Ok(flag(
            wrapper
                .data_center
                .as_ref()
                .is_some_and(|dc| self.datacenters.contains(dc)),
        ))
    }

    fn name(&self) -> &'static str {
        "dataCenterIn"
    }
}

// -- Channel ----------------------------------------------------------------

/// `ext.prebid.channel.name`, with Prebid.js reported as `web`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Channel;

impl SchemaFunction<RequestWrapper> for Channel {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        let channel = wrapper
            .ext_prebid()
            .and_then(|p| p.channel.as_ref())
            .ok_or(FunctionError::MissingField("ext.prebid.channel"))?;
        Ok(if channel.name == "pbjs" {
            "web".to_owned()
        } else {
            channel.name.clone()
        })
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

// -- Extended ids -----------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct EidAvailable;

impl SchemaFunction<RequestWrapper> for EidAvailable {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        Ok(flag(
            wrapper
                .request
                .user
                .as_ref()
                .is_some_and(|u| !u.eids.is_empty()),
        ))
    }

    fn name(&self) -> &'static str {
        "eidAvailable"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesArgs {
    pub sources: Vec<String>,
}

/// True when any user eid comes from one of the configured sources.
#[derive(Debug, Clone)]
pub struct EidIn {
    sources: Vec<String>,
}

impl EidIn {
    #[must_use]
    pub fn new(args: SourcesArgs) -> Self {
        Self {
            sources: args.sources,
        }
    }
}

impl SchemaFunction<RequestWrapper> for EidIn {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        let Some(user) = &wrapper.request.user else {
            return Ok(flag(false));
        };
        Ok(flag(
            user.eids
                .iter()
                .any(|eid| self.sources.iter().any(|s| *s == eid.source)),
        ))
    }

    fn name(&self) -> &'static str {
        "eidIn"
    }
}

// -- First party data -------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct UserFpdAvailable;

impl SchemaFunction<RequestWrapper> for UserFpdAvailable {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        Ok(flag(user_fpd_present(wrapper)))
    }

    fn name(&self) -> &'static str {
        "userFpdAvailable"
    }
}

/// First party data on site, app or user.
#[derive(Debug, Clone, Copy, Default)]
pub struct FpdAvailable;

impl SchemaFunction<RequestWrapper> for FpdAvailable {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        let req = &wrapper.request;
        let site = req.site.as_ref().is_some_and(|s| {
            s.content.as_ref().is_some_and(|c| !c.data.is_empty()) || ext_data_present(s.ext.as_ref())
        });
        let app = req.app.as_ref().is_some_and(|a| {
            a.content.as_ref().is_some_and(|c| !c.data.is_empty()) || ext_data_present(a.ext.as_ref())
        });
        Ok(flag(site || app || user_fpd_present(wrapper)))
    }

    fn name(&self) -> &'static str {
        "fpdAvailable"
    }
}

// -- Privacy ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct GppSidAvailable;

impl SchemaFunction<RequestWrapper> for GppSidAvailable {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        Ok(flag(
            wrapper
                .request
                .regs
                .as_ref()
                .is_some_and(|r| r.gpp_sid.iter().any(|sid| *sid > 0)),
        ))
    }

    fn name(&self) -> &'static str {
        "gppSidAvailable"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SidsArgs {
    pub sids: Vec<i8>,
}

#[derive(Debug, Clone)]
pub struct GppSidIn {
    sids: Vec<i8>,
}

impl GppSidIn {
    #[must_use]
    pub fn new(args: SidsArgs) -> Self {
        Self { sids: args.sids }
    }
}

impl SchemaFunction<RequestWrapper> for GppSidIn {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        Ok(flag(
            wrapper
                .request
                .regs
                .as_ref()
                .is_some_and(|r| r.gpp_sid.iter().any(|sid| self.sids.contains(sid))),
        ))
    }

    fn name(&self) -> &'static str {
        "gppSidIn"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcfInScope;

impl SchemaFunction<RequestWrapper> for TcfInScope {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        Ok(flag(
            wrapper
                .request
                .regs
                .as_ref()
                .is_some_and(|r| r.gdpr == Some(1)),
        ))
    }

    fn name(&self) -> &'static str {
        "tcfInScope"
    }
}

// -- Sampling ---------------------------------------------------------------

const DEFAULT_PERCENT: i64 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PercentArgs {
    #[serde(default)]
    pub pct: Option<i64>,
}

/// Answers `"true"` for roughly `pct` percent of requests.
#[derive(Debug, Clone, Copy)]
pub struct Percent {
    pct: u32,
}

impl Percent {
    #[must_use]
    pub fn new(args: PercentArgs) -> Self {
        let pct = args.pct.unwrap_or(DEFAULT_PERCENT).clamp(0, 100);
        Self {
            pct: u32::try_from(pct).unwrap_or(0),
        }
    }

    #[must_use]
    pub fn pct(&self) -> u32 {
        self.pct
    }
}

impl SchemaFunction<RequestWrapper> for Percent {
    fn call(&self, _: &RequestWrapper) -> Result<String, FunctionError> {
        let roll: u32 = rand::thread_rng().gen_range(0..100);
        Ok(flag(roll < self.pct))
    }

    fn name(&self) -> &'static str {
        "percent"
    }
}

// -- Request keys -----------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct KeyArgs {
    pub key: String,
}

/// Value of `ext.prebid.kvps[key]`, or `""` when absent.
#[derive(Debug, Clone)]
pub struct PrebidKey {
    key: String,
}

impl PrebidKey {
    #[must_use]
    pub fn new(args: KeyArgs) -> Self {
        Self { key: args.key }
    }
}

impl SchemaFunction<RequestWrapper> for PrebidKey {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        let value = wrapper
            .ext_prebid()
            .and_then(|p| p.kvps.as_ref())
            .and_then(|kvps| kvps.get(&self.key));
        Ok(match value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "prebidKey"
    }
}

// -- Inventory --------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct Domain;

impl SchemaFunction<RequestWrapper> for Domain {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        Ok(wrapper.domain().to_owned())
    }

    fn name(&self) -> &'static str {
        "domain"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainsArgs {
    pub domains: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DomainIn {
    domains: Vec<String>,
}

impl DomainIn {
    #[must_use]
    pub fn new(args: DomainsArgs) -> Self {
        Self {
            domains: args.domains,
        }
    }
}

impl SchemaFunction<RequestWrapper> for DomainIn {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        let domain = wrapper.domain();
        Ok(flag(self.domains.iter().any(|d| d == domain)))
    }

    fn name(&self) -> &'static str {
        "domainIn"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bundle;

impl SchemaFunction<RequestWrapper> for Bundle {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        Ok(wrapper.bundle().to_owned())
    }

    fn name(&self) -> &'static str {
        "bundle"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundlesArgs {
    pub bundles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BundleIn {
    bundles: Vec<String>,
}

impl BundleIn {
    #[must_use]
    pub fn new(args: BundlesArgs) -> Self {
        Self {
            bundles: args.bundles,
        }
    }
}

impl SchemaFunction<RequestWrapper> for BundleIn {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        let bundle = wrapper.bundle();
        Ok(flag(self.bundles.iter().any(|b| b == bundle)))
    }

    fn name(&self) -> &'static str {
        "bundleIn"
    }
}

// -- Device type ------------------------------------------------------------

/// Name of an AdCOM device type code.
///
/// # Errors
///
/// Returns [`FunctionError::UnknownDeviceType`] for codes outside 1 to 8.
pub fn device_type_name(code: i32) -> Result<&'static str, FunctionError> {
    Ok(match code {
        1 => "mobile",
        2 => "pc",
        3 => "tv",
        4 => "phone",
        5 => "tablet",
        6 => "connected device",
        7 => "set top box",
        8 => "dooh",
        other => return Err(FunctionError::UnknownDeviceType(other)),
    })
}

/// `""` when the request carries no device type.
fn request_device_type(wrapper: &RequestWrapper) -> Result<&'static str, FunctionError> {
    match wrapper.request.device.as_ref().and_then(|d| d.devicetype) {
        Some(code) => device_type_name(code),
        None => Ok(""),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceType;

impl SchemaFunction<RequestWrapper> for DeviceType {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        request_device_type(wrapper).map(str::to_owned)
    }

    fn name(&self) -> &'static str {
        "deviceType"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypesArgs {
    pub types: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DeviceTypeIn {
    types: Vec<String>,
}

impl DeviceTypeIn {
    #[must_use]
    pub fn new(args: TypesArgs) -> Self {
        Self { types: args.types }
    }
}

impl SchemaFunction<RequestWrapper> for DeviceTypeIn {
    fn call(&self, wrapper: &RequestWrapper) -> Result<String, FunctionError> {
        let device_type = request_device_type(wrapper)?;
        Ok(flag(self.types.iter().any(|t| t == device_type)))
    }

    fn name(&self) -> &'static str {
        "deviceTypeIn"
    }
}
