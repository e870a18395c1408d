//! Known source APIs, the persona packs that combine them, and URL building.

use std::collections::HashMap;

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKind {
    /// JSON endpoint taking query parameters.
    Rest,
    /// OData root; queried like a REST endpoint.
    OData,
    /// Human search page; the query is appended to the base URL.
    Site,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiSpec {
    pub key: &'static str,
    pub kind: ApiKind,
    pub base: &'static str,
    /// Values of the form `${NAME}` are filled from configured keys.
    pub params: &'static [(&'static str, &'static str)],
}

pub const APIS: &[ApiSpec] = &[
    ApiSpec {
        key: "guardian",
        kind: ApiKind::Rest,
        base: "https://content.guardianapis.com/search",
        params: &[("api-key", "${GUARDIAN_API_KEY}"), ("page-size", "10"), ("order-by", "newest")],
    },
    ApiSpec {
        key: "nyt",
        kind: ApiKind::Rest,
        base: "https://api.nytimes.com/svc/search/v2/articlesearch.json",
        params: &[("api-key", "${NYT_API_KEY}")],
    },
    ApiSpec {
        key: "congress",
        kind: ApiKind::Rest,
        base: "https://api.congress.gov/v3/bill",
        params: &[("api_key", "${CONGRESS_API_KEY}"), ("format", "json")],
    },
    ApiSpec {
        key: "govinfo",
        kind: ApiKind::Rest,
        base: "https://api.govinfo.gov/collections/USCODE",
        params: &[("api_key", "${GOVINFO_API_KEY}")],
    },
    ApiSpec {
        key: "fred",
        kind: ApiKind::Rest,
        base: "https://api.stlouisfed.org/fred/series/search",
        params: &[("api_key", "${FRED_API_KEY}"), ("limit", "10")],
    },
    ApiSpec {
        key: "nasa",
        kind: ApiKind::Rest,
        base: "https://images-api.nasa.gov/search",
        params: &[("api_key", "${NASA_API_KEY}"), ("media_type", "image")],
    },
    ApiSpec {
        key: "nps",
        kind: ApiKind::Rest,
        base: "https://developer.nps.gov/api/v1/parks",
        params: &[("api_key", "${NPS_API_KEY}"), ("limit", "10")],
    },
    ApiSpec {
        key: "openweather",
        kind: ApiKind::Rest,
        base: "https://api.openweathermap.org/data/2.5/weather",
        params: &[("appid", "${OPENWEATHER_API_KEY}")],
    },
    ApiSpec {
        key: "pubmed",
        kind: ApiKind::Rest,
        base: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi",
        params: &[("db", "pubmed"), ("retmode", "json"), ("retmax", "10")],
    },
    ApiSpec { key: "who", kind: ApiKind::OData, base: "https://ghoapi.azureedge.net/ghoapi/api/", params: &[] },
    ApiSpec { key: "medlineplus", kind: ApiKind::Site, base: "https://medlineplus.gov/search/?query=", params: &[] },
    ApiSpec {
        key: "courtlistener",
        kind: ApiKind::Rest,
        base: "https://www.courtlistener.com/api/rest/v3/search/",
        params: &[("type", "o"), ("order_by", "score desc")],
    },
    ApiSpec { key: "lii", kind: ApiKind::Site, base: "https://www.law.cornell.edu/search/site/", params: &[] },
];

const NEWS: &[&str] = &["theguardian.com", "nytimes.com"];
const LEGAL: &[&str] = &["courtlistener.com", "law.cornell.edu", "congress.gov", "govinfo.gov"];
const MEDICAL: &[&str] = &["pubmed.ncbi.nlm.nih.gov", "who.int", "medlineplus.gov"];
const ECON: &[&str] = &["stlouisfed.org"];
const SCIENCE: &[&str] = &["nasa.gov"];

/// Persona name, APIs it consults in order, and the domains it trusts (empty = any).
const PERSONAS: &[(&str, &[&str], &[&str])] = &[
    ("Medical Expert", &["pubmed", "who", "medlineplus"], MEDICAL),
    ("Legal Advisor", &["courtlistener", "lii", "congress", "govinfo"], LEGAL),
    ("Economist", &["fred"], ECON),
    ("Science Explainer", &["nasa"], SCIENCE),
    ("Fact Checker", &["guardian", "nyt"], NEWS),
    ("General", &["guardian", "nyt", "fred", "nasa", "pubmed", "courtlistener"], &[]),
];

/// The APIs and whitelist one persona uses.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePack {
    pub persona: &'static str,
    pub apis: Vec<&'static ApiSpec>,
    pub whitelist: &'static [&'static str],
}

impl SourcePack {
    /// Unknown personas fall back to General.
    pub fn for_persona(name: &str) -> Self {
        let (persona, use_apis, whitelist) = PERSONAS
            .iter()
            .find(|(p, _, _)| *p == name)
            .or_else(|| PERSONAS.iter().find(|(p, _, _)| *p == "General"))
            .copied()
            .unwrap_or(("General", &[], &[]));
        let apis = use_apis
            .iter()
            .filter_map(|key| APIS.iter().find(|api| api.key == *key))
            .collect();
        Self { persona, apis, whitelist }
    }

    /// Whether a record from `domain` may be shown.
    pub fn allows(&self, domain: &str) -> bool {
        if self.whitelist.is_empty() {
            return true;
        }
        let domain = domain.to_ascii_lowercase();
        self.whitelist.iter().any(|d| domain.ends_with(d))
    }
}

fn placeholder(value: &str) -> Option<&str> {
    value.strip_prefix("${")?.strip_suffix('}')
}

/// Request URL for `api`, or `None` when a key it needs is not configured.
pub fn build_url(api: &ApiSpec, query: &str, keys: &HashMap<String, String>) -> Option<String> {
    let mut resolved: Vec<(&str, &str)> = Vec::with_capacity(api.params.len());
    for &(name, value) in api.params {
        match placeholder(value) {
            Some(var) => {
                let key = keys.get(var).map(|k| k.trim()).filter(|k| !k.is_empty())?;
                resolved.push((name, key));
            }
            None => resolved.push((name, value)),
        }
    }

    if api.kind == ApiKind::Site {
        return Some(format!("{}{}", api.base, urlencoding::encode(query)));
    }

    let mut url = Url::parse(api.base).ok()?;
    {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in &resolved {
            pairs.append_pair(name, value);
        }
        let has_query = resolved.iter().any(|(name, _)| matches!(*name, "q" | "query" | "search_text"));
        if !has_query && !query.is_empty() {
            pairs.append_pair("q", query);
        }
    }
    Some(url.into())
}
