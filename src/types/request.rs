use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The subset of an OpenRTB 2.x bid request the rules engine reads.
///
/// Every object keeps the fields the engine does not look at in `other`, so a
/// request can be deserialized, mutated and serialized again without loss.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BidRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imp: Vec<Imp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dooh: Option<Dooh>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regs: Option<Regs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<RequestExt>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Imp {
    #[serde(default)]
    pub id: String,
    /// Raw impression extension; bidders live under `prebid.bidder`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct App {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dooh {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devicetype: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub eids: Vec<Eid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Eid {
    #[serde(default)]
    pub source: String,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Regs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<i8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpp_sid: Vec<i8>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestExt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prebid: Option<ExtPrebid>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtPrebid {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kvps: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// The evaluation context handed to schema and result functions.
///
/// Pairs the bid request with host-provided facts that are not part of the
/// request itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestWrapper {
    pub request: BidRequest,
    pub data_center: Option<String>,
}

impl RequestWrapper {
    #[must_use]
    pub fn new(request: BidRequest) -> Self {
        Self {
            request,
            data_center: None,
        }
    }

    #[must_use]
    pub fn with_data_center(mut self, data_center: impl Into<String>) -> Self {
        self.data_center = Some(data_center.into());
        self
    }

    /// Deserialize a request from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if `raw` is not a valid bid request.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    /// `device.geo.country`, when present and non-empty.
    #[must_use]
    pub fn device_country(&self) -> Option<&str> {
        self.request
            .device
            .as_ref()
            .and_then(|d| d.geo.as_ref())
            .and_then(|g| g.country.as_deref())
            .filter(|c| !c.is_empty())
    }

    #[must_use]
    pub fn ext_prebid(&self) -> Option<&ExtPrebid> {
        self.request.ext.as_ref().and_then(|e| e.prebid.as_ref())
    }

    /// The publisher domain taken from site, then app, then dooh.
    #[must_use]
    pub fn domain(&self) -> &str {
        let req = &self.request;
        let domain = if let Some(site) = &req.site {
            site.domain.as_deref()
        } else if let Some(app) = &req.app {
            app.domain.as_deref()
        } else {
            req.dooh.as_ref().and_then(|d| d.domain.as_deref())
        };
        domain.unwrap_or_default()
    }

    #[must_use]
    pub fn bundle(&self) -> &str {
        self.request
            .app
            .as_ref()
            .and_then(|a| a.bundle.as_deref())
            .unwrap_or_default()
    }
}

impl From<BidRequest> for RequestWrapper {
    fn from(request: BidRequest) -> Self {
        Self::new(request)
    }
}
