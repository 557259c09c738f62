//! `DES`: company description window.
//!
//! The page script only collects raw strings; cleaning and assembly happen
//! here so they can be tested without a browser.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Extracted, TerminalCommand, WindowContext, now_timestamp, ticker_command};
use crate::error::Result;

const SEE_MORE: &str = ".//a[contains(@class,'cursor-pointer') and contains(text(),'See more')]";
const SHOW_ALL: &str = ".//div[@class='cursor-pointer p-2' and text()='Show all']";
const MIN_DESCRIPTION_CHARS: usize = 100;

const COLLECT_JS: &str = r#"
const x1 = (xp) => __first(root, 'xpath=' + xp);
const h1 = __first(root, 'h1.text-2xl.font-semibold');
const badge = __first(root, 'span.blue-box');
const logo = __first(root, 'div.w-16.h-16');
const site = __first(root, "a[href][target='_blank']");
const info = x1(".//div[contains(@class,'text-right') and contains(@class,'uppercase')]");
const eps = x1(".//span[text()='EPS ESTIMATES']/ancestor::div[1]/following-sibling::table");
const ratings = x1(".//span[text()='ANALYST RATINGS']/ancestor::div[1]/following-sibling::div//table");
const snap = x1(".//div[text()='SNAPSHOT']/following-sibling::div[@class='flex-1']");
const cells = (tr) => Array.from(tr.querySelectorAll('td')).map(__text);
return {
  ticker: (__first(root, "input.uppercase[class*='bg-[#121212]']") || {}).value || null,
  name: __text(h1),
  badge: __text(badge),
  logoStyle: logo ? logo.getAttribute('style') : null,
  website: site ? site.getAttribute('href') : null,
  info: __text(info),
  descriptions: __xpath(root, ".//div[contains(@style,'color: rgb(234, 234, 234)')]").map(__text),
  epsHeaders: eps ? Array.from(eps.querySelectorAll('thead td')).map(__text) : [],
  epsRows: eps ? Array.from(eps.querySelectorAll('tbody tr')).map(cells) : [],
  ratings: ratings ? Array.from(ratings.querySelectorAll('tbody tr')).map((tr) => ({
    cells: cells(tr),
    targetSpans: tr.children[3] ? Array.from(tr.children[3].querySelectorAll('span')).map(__text) : [],
  })) : [],
  snapshot: snap ? Array.from(snap.querySelectorAll('div.mt-2 div.flex.justify-between.text-sm')).map(
    (pair) => Array.from(pair.querySelectorAll('span')).slice(0, 2).map(__text)
  ) : [],
};
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawDescription {
	ticker: Option<String>,
	name: Option<String>,
	badge: Option<String>,
	logo_style: Option<String>,
	website: Option<String>,
	info: Option<String>,
	descriptions: Vec<String>,
	eps_headers: Vec<String>,
	eps_rows: Vec<Vec<String>>,
	ratings: Vec<RawRating>,
	snapshot: Vec<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRating {
	cells: Vec<String>,
	target_spans: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompanyInfo {
	pub company_name: Option<String>,
	pub asset_class: Option<String>,
	pub logo_url: Option<String>,
	pub website: Option<String>,
	pub address: Option<String>,
	pub ceo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnalystRating {
	pub firm: String,
	pub analyst: String,
	pub rating: String,
	pub target: String,
	pub date: String,
}

#[derive(Debug, Serialize)]
struct DescriptionData {
	timestamp: String,
	window_id: String,
	ticker: Option<String>,
	company_info: CompanyInfo,
	description: Option<String>,
	eps_estimates: BTreeMap<String, String>,
	analyst_ratings: Vec<AnalystRating>,
	snapshot: BTreeMap<String, String>,
}

pub struct DescriptionCommand {
	ticker: String,
	asset_class: String,
}

impl DescriptionCommand {
	pub fn new(ticker: impl Into<String>, asset_class: impl Into<String>) -> Self {
		Self {
			ticker: ticker.into(),
			asset_class: asset_class.into(),
		}
	}
}

#[async_trait]
impl TerminalCommand for DescriptionCommand {
	fn name(&self) -> &str {
		"DES"
	}

	fn command_string(&self) -> String {
		ticker_command(&self.ticker, &self.asset_class, "DES")
	}

	/// Expands the description and the full analyst ratings list.
	async fn prepare(&self, ctx: &WindowContext<'_>) -> Result<()> {
		let scope = ctx.scope();
		for (label, selector) in [("description", SEE_MORE), ("analyst ratings", SHOW_ALL)] {
			if scope.exists(selector).await? {
				scope.click(selector).await?;
				debug!(target = "godel", section = label, "expanded");
			} else {
				debug!(target = "godel", section = label, "already expanded");
			}
		}
		Ok(())
	}

	async fn extract(&self, ctx: &WindowContext<'_>) -> Result<Extracted> {
		let raw: RawDescription = ctx.scope().eval_typed("des.collect", COLLECT_JS).await?;
		let data = DescriptionData {
			timestamp: now_timestamp(),
			window_id: ctx.window_id.to_string(),
			ticker: raw.ticker.clone().filter(|t| !t.is_empty()),
			company_info: company_info(&raw),
			description: pick_description(&raw.descriptions),
			eps_estimates: eps_estimates(&raw.eps_headers, &raw.eps_rows),
			analyst_ratings: raw.ratings.iter().filter_map(analyst_rating).collect(),
			snapshot: snapshot(&raw.snapshot),
		};
		Ok(serde_json::to_value(data)?.into())
	}
}

fn non_empty(s: Option<&str>) -> Option<String> {
	s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn company_info(raw: &RawDescription) -> CompanyInfo {
	let badge = non_empty(raw.badge.as_deref());
	let company_name = raw.name.as_deref().map(|name| match &badge {
		Some(b) => name.replace(b.as_str(), "").trim().to_string(),
		None => name.trim().to_string(),
	});
	let mut lines = raw
		.info
		.as_deref()
		.unwrap_or_default()
		.lines()
		.map(str::trim)
		.filter(|l| !l.is_empty());
	CompanyInfo {
		company_name,
		asset_class: badge,
		logo_url: raw.logo_style.as_deref().and_then(parse_logo_url),
		website: non_empty(raw.website.as_deref()),
		address: lines.next().map(str::to_string),
		ceo: lines.next().map(str::to_string),
	}
}

/// Pulls the URL out of a `background-image: url(...)` style, in any of
/// the quoting forms browsers serialize.
pub(crate) fn parse_logo_url(style: &str) -> Option<String> {
	let start = style.find("url(")? + 4;
	let rest = &style[start..];
	let url = if let Some(inner) = rest.strip_prefix("&quot;") {
		inner.split("&quot;").next()?
	} else if let Some(inner) = rest.strip_prefix('"') {
		inner.split('"').next()?
	} else if let Some(inner) = rest.strip_prefix('\'') {
		inner.split('\'').next()?
	} else {
		rest.split(')').next()?.trim()
	};
	non_empty(Some(url))
}

fn pick_description(candidates: &[String]) -> Option<String> {
	candidates
		.iter()
		.find(|t| t.trim().chars().count() > MIN_DESCRIPTION_CHARS)
		.map(|t| t.replace("See more", "").replace("See less", "").trim().to_string())
}

/// `{"Q4, Dec 25": "-0.85", ...}` from the header row and the `date`/`eps`
/// rows (first cell is the row label).
fn eps_estimates(headers: &[String], rows: &[Vec<String>]) -> BTreeMap<String, String> {
	let headers: Vec<&str> = headers
		.iter()
		.map(|h| h.trim())
		.filter(|h| !h.is_empty())
		.collect();
	let row = |label: &str| {
		rows.iter()
			.find(|r| r.first().is_some_and(|c| c.trim().eq_ignore_ascii_case(label)))
			.map(|r| &r[1..])
	};
	let (Some(dates), Some(eps)) = (row("date"), row("eps")) else {
		return BTreeMap::new();
	};
	headers
		.iter()
		.zip(dates.iter().zip(eps))
		.map(|(h, (d, e))| (format!("{h}, {}", d.trim()), e.trim().to_string()))
		.collect()
}

/// Target cell reads `from → to`; a single price is both ends.
fn target_text(spans: &[String]) -> String {
	let from = spans.first().map(|s| s.trim()).unwrap_or_default();
	let to = if spans.len() > 2 {
		spans.last().map(|s| s.trim()).unwrap_or_default()
	} else {
		from
	};
	if from.is_empty() || to.is_empty() {
		String::new()
	} else {
		format!("{from}→{to}")
	}
}

fn analyst_rating(raw: &RawRating) -> Option<AnalystRating> {
	if raw.cells.len() < 5 {
		return None;
	}
	let cell = |i: usize| raw.cells[i].trim().to_string();
	let rating = AnalystRating {
		firm: cell(0),
		analyst: cell(1),
		rating: cell(2),
		target: target_text(&raw.target_spans),
		date: cell(4),
	};
	(!rating.firm.is_empty() && !rating.analyst.is_empty() && !rating.rating.is_empty()).then_some(rating)
}

fn snapshot(pairs: &[Vec<String>]) -> BTreeMap<String, String> {
	pairs
		.iter()
		.filter_map(|pair| match pair.as_slice() {
			[key, value, ..] if !key.trim().is_empty() && !value.trim().is_empty() => {
				Some((key.trim().to_string(), value.trim().to_string()))
			}
			_ => None,
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn strings(items: &[&str]) -> Vec<String> {
		items.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn logo_url_quoting_forms() {
		assert_eq!(
			parse_logo_url(r#"background-image: url("https://cdn/x.png");"#).as_deref(),
			Some("https://cdn/x.png")
		);
		assert_eq!(
			parse_logo_url("background-image: url(&quot;https://cdn/y.png&quot;)").as_deref(),
			Some("https://cdn/y.png")
		);
		assert_eq!(
			parse_logo_url("background-image: url(https://cdn/z.png)").as_deref(),
			Some("https://cdn/z.png")
		);
		assert_eq!(parse_logo_url("width: 64px"), None);
	}

	#[test]
	fn company_name_drops_badge() {
		let raw = RawDescription {
			name: Some("Apple Inc. EQ".into()),
			badge: Some("EQ".into()),
			info: Some("\nOne Apple Park Way, Cupertino\n\nTim Cook\n".into()),
			..Default::default()
		};
		let info = company_info(&raw);
		assert_eq!(info.company_name.as_deref(), Some("Apple Inc."));
		assert_eq!(info.asset_class.as_deref(), Some("EQ"));
		assert_eq!(info.address.as_deref(), Some("One Apple Park Way, Cupertino"));
		assert_eq!(info.ceo.as_deref(), Some("Tim Cook"));
	}

	#[test]
	fn description_skips_short_blocks() {
		let long = format!("{} See less", "Designs phones. ".repeat(10));
		let picked = pick_description(&strings(&["Market cap", &long])).unwrap();
		assert!(picked.starts_with("Designs phones."));
		assert!(!picked.contains("See less"));
		assert_eq!(pick_description(&strings(&["short"])), None);
	}

	#[test]
	fn eps_pairs_headers_with_dates() {
		let headers = strings(&["", "Q4", "FY25", "FY26"]);
		let rows = vec![
			strings(&["Date", "Dec 25", "Sep 25", "Sep 26"]),
			strings(&["EPS", "2.35", "7.38", "8.05"]),
		];
		let eps = eps_estimates(&headers, &rows);
		assert_eq!(eps.len(), 3);
		assert_eq!(eps["Q4, Dec 25"], "2.35");
		assert_eq!(eps["FY26, Sep 26"], "8.05");
		assert!(eps_estimates(&headers, &rows[..1]).is_empty());
	}

	#[test]
	fn ratings_require_core_fields() {
		let full = RawRating {
			cells: strings(&["Wedbush", "Dan Ives", "Outperform", "", "2025-01-02"]),
			target_spans: strings(&["$300", "→", "$325"]),
		};
		let single = RawRating {
			cells: strings(&["Barclays", "Tim Long", "Underweight", "", "2025-01-03"]),
			target_spans: strings(&["$184"]),
		};
		let missing_analyst = RawRating {
			cells: strings(&["Citi", "", "Buy", "", "2025-01-04"]),
			target_spans: vec![],
		};
		assert_eq!(analyst_rating(&full).unwrap().target, "$300→$325");
		assert_eq!(analyst_rating(&single).unwrap().target, "$184→$184");
		assert_eq!(analyst_rating(&missing_analyst), None);
		assert_eq!(
			analyst_rating(&RawRating {
				cells: strings(&["a", "b"]),
				target_spans: vec![]
			}),
			None
		);
	}

	#[test]
	fn rating_serializes_with_column_names() {
		let rating = AnalystRating {
			firm: "Wedbush".into(),
			analyst: "Dan Ives".into(),
			rating: "Outperform".into(),
			target: "$300→$325".into(),
			date: "2025-01-02".into(),
		};
		assert_eq!(
			serde_json::to_value(rating).unwrap(),
			json!({
				"Firm": "Wedbush",
				"Analyst": "Dan Ives",
				"Rating": "Outperform",
				"Target": "$300→$325",
				"Date": "2025-01-02"
			})
		);
	}

	#[test]
	fn snapshot_skips_incomplete_pairs() {
		let pairs = vec![
			strings(&["P/E", "31.2"]),
			strings(&["Beta", ""]),
			strings(&["Lonely"]),
		];
		let snap = snapshot(&pairs);
		assert_eq!(snap.len(), 1);
		assert_eq!(snap["P/E"], "31.2");
	}
}
