//! Fingerprints and stable lookup keys derived from request attributes.

use std::collections::BTreeMap;

use beacon_ids::hash_to_alphabet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::OwnerKey;

/// Length of fingerprints and stable keys.
pub const FINGERPRINT_LEN: usize = 16;

/// Request attributes a fingerprint is computed from. All are opaque strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestAttributes {
	#[serde(alias = "ip")]
	pub remote_addr: Option<String>,
	pub user_agent: Option<String>,
	pub accept_language: Option<String>,
	pub accept_encoding: Option<String>,
	pub tls_cipher: Option<String>,
	pub tls_version: Option<String>,
	/// Edge location that served the request. Volatile across requests from one visitor.
	pub colo: Option<String>,
}

/// Whether the routing hint takes part in the hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintPolicy {
	Include,
	Exclude,
}

/// Attribute map that gets hashed. Missing attributes read as `""`.
pub fn raw_attributes(request: &RequestAttributes, hint: HintPolicy) -> BTreeMap<&'static str, String> {
	let text = |value: &Option<String>| value.clone().unwrap_or_default();
	let mut attrs = BTreeMap::from([
		("ip", text(&request.remote_addr)),
		("userAgent", text(&request.user_agent)),
		("acceptLanguage", text(&request.accept_language)),
		("acceptEncoding", text(&request.accept_encoding)),
		("tlsCipher", text(&request.tls_cipher)),
		("tlsVersion", text(&request.tls_version)),
	]);
	if hint == HintPolicy::Include {
		attrs.insert("colo", text(&request.colo));
	}
	attrs
}

fn hash_attributes(request: &RequestAttributes, hint: HintPolicy) -> String {
	let object = raw_attributes(request, hint)
		.into_iter()
		.map(|(name, value)| (name.to_owned(), Value::String(value)))
		.collect();
	hash_to_alphabet(&Value::Object(object), FINGERPRINT_LEN)
}

/// Fingerprint including the routing hint, for drift detection.
pub fn fingerprint(request: &RequestAttributes) -> String {
	hash_attributes(request, HintPolicy::Include)
}

/// Hint-free fingerprint used to locate a state owner before a client id exists.
pub fn stable_key(request: &RequestAttributes) -> OwnerKey {
	OwnerKey::new(hash_attributes(request, HintPolicy::Exclude))
}
