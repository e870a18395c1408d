//! Per-API mapping of response bodies onto [`SourceRecord`]s.

use serde_json::Value;
use url::Url;

use super::SourceRecord;

/// Host of `url`, or empty when it does not parse.
pub fn domain_from(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_default()
}

fn record(title: impl Into<String>, url: impl Into<String>) -> SourceRecord {
    let url = url.into();
    SourceRecord { title: title.into(), domain: domain_from(&url), url }
}

fn items<'a>(data: &'a Value, pointer: &str) -> &'a [Value] {
    data.pointer(pointer).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

fn text<'a>(v: &'a Value, pointer: &str) -> Option<&'a str> {
    v.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Map one API's JSON body. `request_url` is the final URL that was fetched,
/// used for APIs whose result is the search page itself.
pub fn normalize(api_key: &str, data: &Value, request_url: &str) -> Vec<SourceRecord> {
    match api_key {
        "guardian" => items(data, "/response/results")
            .iter()
            .filter_map(|r| Some(record(text(r, "/webTitle")?, text(r, "/webUrl")?)))
            .collect(),
        "nyt" => items(data, "/response/docs")
            .iter()
            .filter_map(|d| Some(record(text(d, "/headline/main")?, text(d, "/web_url")?)))
            .collect(),
        "fred" => items(data, "/seriess")
            .iter()
            .filter_map(|s| {
                let id = text(s, "/id")?;
                let title = text(s, "/title").unwrap_or(id);
                Some(SourceRecord {
                    title: format!("{title} ({id})"),
                    url: format!("https://fred.stlouisfed.org/series/{}", urlencoding::encode(id)),
                    domain: "fred.stlouisfed.org".to_owned(),
                })
            })
            .collect(),
        "nasa" => items(data, "/collection/items")
            .iter()
            .take(6)
            .map(|item| {
                let link = text(item, "/links/0/href").unwrap_or(request_url);
                let title = text(item, "/data/0/title").unwrap_or("NASA media");
                record(title, link)
            })
            .collect(),
        "nps" => items(data, "/data")
            .iter()
            .filter_map(|park| {
                let name = text(park, "/fullName")?;
                let url = match text(park, "/url") {
                    Some(url) => url.to_owned(),
                    None => format!("https://www.nps.gov/{}", text(park, "/parkCode")?),
                };
                let title = match text(park, "/states") {
                    Some(states) => format!("{name} - {states}"),
                    None => name.to_owned(),
                };
                Some(record(title, url))
            })
            .collect(),
        "pubmed" => items(data, "/esearchresult/idlist")
            .iter()
            .filter_map(Value::as_str)
            .take(8)
            .map(|id| SourceRecord {
                title: format!("PubMed ID {id}"),
                url: format!("https://pubmed.ncbi.nlm.nih.gov/{id}/"),
                domain: "pubmed.ncbi.nlm.nih.gov".to_owned(),
            })
            .collect(),
        _ => vec![record(page_title(api_key), request_url)],
    }
}

/// Title for APIs represented by a single link to the query itself.
fn page_title(api_key: &str) -> String {
    match api_key {
        "congress" => "Congress.gov: bills".to_owned(),
        "govinfo" => "GovInfo: US Code".to_owned(),
        "openweather" => "OpenWeather result".to_owned(),
        "who" => "WHO GHO API result".to_owned(),
        "medlineplus" => "MedlinePlus search".to_owned(),
        "courtlistener" => "CourtListener search".to_owned(),
        "lii" => "Cornell LII search".to_owned(),
        other => format!("Result from {other}"),
    }
}

/// Drop repeats keyed on url and title, keeping first occurrences.
pub fn dedupe(records: Vec<SourceRecord>) -> Vec<SourceRecord> {
    let mut seen = std::collections::HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(format!("{}|{}", r.url, r.title)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn guardian_results() {
        let data = json!({"response": {"results": [
            {"webTitle": "Tides rising", "webUrl": "https://www.theguardian.com/a"},
            {"webTitle": "No url"}
        ]}});
        let out = normalize("guardian", &data, "https://content.guardianapis.com/search");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].domain, "www.theguardian.com");
    }

    #[test]
    fn fred_builds_series_links() {
        let data = json!({"seriess": [{"id": "GDP", "title": "Gross Domestic Product"}]});
        let out = normalize("fred", &data, "");
        assert_eq!(out[0].title, "Gross Domestic Product (GDP)");
        assert_eq!(out[0].url, "https://fred.stlouisfed.org/series/GDP");
    }

    #[test]
    fn nasa_falls_back_to_request_url() {
        let data = json!({"collection": {"items": [{"data": [{"title": "Moon"}]}]}});
        let out = normalize("nasa", &data, "https://images-api.nasa.gov/search?q=moon");
        assert_eq!(out[0].title, "Moon");
        assert_eq!(out[0].domain, "images-api.nasa.gov");
    }

    #[test]
    fn nps_uses_park_code_when_url_missing() {
        let data = json!({"data": [{"fullName": "Acadia National Park", "states": "ME", "parkCode": "acad"}]});
        let out = normalize("nps", &data, "");
        assert_eq!(out[0].title, "Acadia National Park - ME");
        assert_eq!(out[0].url, "https://www.nps.gov/acad");
    }

    #[test]
    fn pubmed_ids_capped() {
        let ids: Vec<String> = (0..12).map(|i| i.to_string()).collect();
        let data = json!({"esearchresult": {"idlist": ids}});
        let out = normalize("pubmed", &data, "");
        assert_eq!(out.len(), 8);
        assert_eq!(out[0].url, "https://pubmed.ncbi.nlm.nih.gov/0/");
    }

    #[test]
    fn page_style_apis_link_the_query() {
        let url = "https://www.law.cornell.edu/search/site/fair%20use";
        let out = normalize("lii", &Value::Null, url);
        assert_eq!(out, vec![record("Cornell LII search", url)]);
        assert_eq!(out[0].domain, "www.law.cornell.edu");
    }

    #[test]
    fn malformed_body_yields_nothing() {
        assert!(normalize("guardian", &json!({"response": 3}), "").is_empty());
    }

    #[test]
    fn dedupe_keeps_first() {
        let a = record("A", "https://x.org/1");
        let out = dedupe(vec![a.clone(), record("B", "https://x.org/1"), a.clone()]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], a);
    }
}
