//! Result functions for the processed auction request stage.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{
    AnalyticsTag, FunctionError, HookResult, ImpBidders, Imp, Mutation, RequestWrapper,
    ResultFunction, ResultFunctionMeta, SeatNonBid,
};

/// Arguments shared by `excludeBidders` and `includeBidders`.
///
/// `bidders` is required and may not be `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiddersArgs {
    pub bidders: Vec<String>,
    #[serde(default)]
    pub seat_non_bid: Option<i32>,
    #[serde(default)]
    pub analytics_value: Option<String>,
}

impl BiddersArgs {
    #[must_use]
    pub fn new(bidders: Vec<String>) -> Self {
        Self {
            bidders,
            ..Self::default()
        }
    }
}

/// The bidder map of one impression, `ext.prebid.bidder`.
///
/// A missing `bidder` object reads as no bidders.
fn imp_bidders(imp: &Imp) -> Result<Map<String, Value>, FunctionError> {
    let invalid = |path: &'static str, reason: &str| FunctionError::InvalidImpExt {
        imp: imp.id.clone(),
        path,
        reason: reason.to_owned(),
    };

    let ext = match &imp.ext {
        None | Some(Value::Null) => return Err(invalid("ext", "is not present")),
        Some(Value::Object(ext)) => ext,
        Some(_) => return Err(invalid("ext", "is not an object")),
    };
    let prebid = match ext.get("prebid") {
        None | Some(Value::Null) => return Err(invalid("ext.prebid", "is not present")),
        Some(Value::Object(prebid)) => prebid,
        Some(_) => return Err(invalid("ext.prebid", "is not an object")),
    };
    match prebid.get("bidder") {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(bidders)) => Ok(bidders.clone()),
        Some(_) => Err(invalid("ext.prebid.bidder", "is not an object")),
    }
}

/// Per impression, the bidders `keep` rejects. Rejected bidders are reported
/// as seat non-bids when `code` is set.
fn rejected_bidders(
    wrapper: &RequestWrapper,
    code: Option<i32>,
    result: &mut HookResult,
    keep: impl Fn(&str) -> bool,
) -> Result<ImpBidders, FunctionError> {
    let mut per_imp = ImpBidders::new();
    let mut non_bids = Vec::new();
    for imp in &wrapper.request.imp {
        let mut bidders = imp_bidders(imp)?;
        bidders.retain(|name, _| {
            let rejected = !keep(name);
            if let (true, Some(code)) = (rejected, code) {
                non_bids.push(SeatNonBid {
                    imp_id: imp.id.clone(),
                    seat: name.clone(),
                    code,
                });
            }
            rejected
        });
        per_imp.insert(imp.id.clone(), bidders);
    }
    result.seat_non_bids.extend(non_bids);
    Ok(per_imp)
}

fn tag(result: &mut HookResult, function: &str, value: &str, meta: &ResultFunctionMeta) {
    result.analytics_tags.push(AnalyticsTag {
        analytics_key: meta.analytics_key.clone(),
        analytics_value: value.to_owned(),
        model_version: meta.model_version.clone(),
        rule_fired: meta.rule_fired.clone(),
        result_function: function.to_owned(),
    });
}

/// Removes the listed bidders from every impression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeBidders {
    args: BiddersArgs,
}

impl ExcludeBidders {
    #[must_use]
    pub fn new(args: BiddersArgs) -> Self {
        Self { args }
    }

    #[must_use]
    pub fn bidders(&self) -> &[String] {
        &self.args.bidders
    }

    /// The excluded bidders present on each impression.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionError::InvalidImpExt`] for an impression without a
    /// usable `ext.prebid`.
    pub fn removals(
        &self,
        wrapper: &RequestWrapper,
        result: &mut HookResult,
    ) -> Result<ImpBidders, FunctionError> {
        rejected_bidders(wrapper, self.args.seat_non_bid, result, |name| {
            !self.args.bidders.iter().any(|b| b == name)
        })
    }
}

impl ResultFunction<RequestWrapper, HookResult> for ExcludeBidders {
    fn call(
        &self,
        wrapper: &RequestWrapper,
        result: &mut HookResult,
        meta: &ResultFunctionMeta,
    ) -> Result<(), FunctionError> {
        let removed = self.removals(wrapper, result)?;
        result.change_set.push(Mutation::delete_imp_bidders(removed));
        if let Some(value) = &self.args.analytics_value {
            tag(result, self.name(), value, meta);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "excludeBidders"
    }
}

/// Keeps only the listed bidders on every impression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeBidders {
    args: BiddersArgs,
}

impl IncludeBidders {
    #[must_use]
    pub fn new(args: BiddersArgs) -> Self {
        Self { args }
    }

    /// The bidders on each impression that are not included.
    ///
    /// # Errors
    ///
    /// Returns [`FunctionError::InvalidImpExt`] for an impression without a
    /// usable `ext.prebid`.
    pub fn removals(
        &self,
        wrapper: &RequestWrapper,
        result: &mut HookResult,
    ) -> Result<ImpBidders, FunctionError> {
        rejected_bidders(wrapper, self.args.seat_non_bid, result, |name| {
            self.args.bidders.iter().any(|b| b == name)
        })
    }
}

impl ResultFunction<RequestWrapper, HookResult> for IncludeBidders {
    fn call(
        &self,
        wrapper: &RequestWrapper,
        result: &mut HookResult,
        meta: &ResultFunctionMeta,
    ) -> Result<(), FunctionError> {
        let removed = self.removals(wrapper, result)?;
        result.change_set.push(Mutation::delete_imp_bidders(removed));
        if let Some(value) = &self.args.analytics_value {
            tag(result, self.name(), value, meta);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "includeBidders"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogATagArgs {
    pub analytics_value: String,
}

/// Emits an analytics tag without touching the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogATag {
    value: String,
}

impl LogATag {
    #[must_use]
    pub fn new(args: LogATagArgs) -> Self {
        Self {
            value: args.analytics_value,
        }
    }
}

impl ResultFunction<RequestWrapper, HookResult> for LogATag {
    fn call(
        &self,
        _: &RequestWrapper,
        result: &mut HookResult,
        meta: &ResultFunctionMeta,
    ) -> Result<(), FunctionError> {
        tag(result, self.name(), &self.value, meta);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "logATag"
    }
}
