//! Script assembly for scoped DOM queries.
//!
//! Every script is an IIFE tagged with a `/*godel:<marker>*/` comment so
//! test doubles can recognise which operation produced it.

/// Helpers available to every scoped script as `__all`, `__first`,
/// `__visible` and `__text`.
const PRELUDE: &str = r#"
const __xpath = (root, xp) => {
  if (root !== document && xp.startsWith('//')) xp = '.' + xp;
  const snap = document.evaluate(xp, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
  const out = [];
  for (let i = 0; i < snap.snapshotLength; i++) {
    const n = snap.snapshotItem(i);
    if (n.nodeType === 1) out.push(n);
  }
  return out;
};
const __norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
const __bytext = (root, needle) => {
  needle = __norm(needle).toLowerCase();
  const hits = Array.from(root.querySelectorAll('*')).filter(
    (el) => __norm(el.textContent).toLowerCase().includes(needle)
  );
  return hits.filter((el) => !hits.some((o) => o !== el && el.contains(o)));
};
const __all = (root, sel) => {
  if (sel.startsWith('xpath=')) return __xpath(root, sel.slice(6));
  if (sel.startsWith('text=')) return __bytext(root, sel.slice(5));
  return Array.from(root.querySelectorAll(sel));
};
const __first = (root, sel) => __all(root, sel)[0] || null;
const __visible = (el) => {
  if (!el || !el.isConnected) return false;
  const s = getComputedStyle(el);
  if (s.display === 'none' || s.visibility === 'hidden' || s.opacity === '0') return false;
  const r = el.getBoundingClientRect();
  return r.width > 0 && r.height > 0;
};
const __text = (el) => (el ? (el.innerText ?? el.textContent ?? '').trim() : null);
"#;

/// Builds a script that runs `body` with `root` bound to the window element
/// `root_id` (or `document` when `None`).
///
/// A missing root element throws, which surfaces as a JavaScript error.
pub(crate) fn scoped(marker: &str, root_id: Option<&str>, body: &str) -> String {
	let root = match root_id {
		Some(id) => format!(
			"document.getElementById({})",
			serde_json::Value::String(id.to_string())
		),
		None => "document".to_string(),
	};
	format!(
		"/*godel:{marker}*/(() => {{{PRELUDE}const root = {root};\nif (!root) throw new Error('scope root not found: ' + {id});\n{body}\n}})()",
		id = serde_json::Value::String(root_id.unwrap_or("document").to_string()),
	)
}

/// The part of a scoped script after the shared helpers.
pub(crate) fn script_body(script: &str) -> &str {
	script.split_once(PRELUDE).map_or(script, |(_, body)| body)
}

/// The marker tag a scoped script carries.
pub fn marker_tag(marker: &str) -> String {
	format!("/*godel:{marker}*/")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn scoped_script_is_tagged_and_rooted() {
		let js = scoped("count", Some("abc-window"), "return 1;");
		assert!(js.starts_with("/*godel:count*/(() => {"));
		assert!(js.contains(r#"document.getElementById("abc-window")"#));
		assert!(js.trim_end().ends_with("})()"));
	}

	#[test]
	fn body_excludes_helpers() {
		let js = scoped("count", None, "return __all(root, 'tr').length;");
		let body = script_body(&js);
		assert!(body.contains("'tr'"));
		assert!(!body.contains("__bytext"));
		assert_eq!(script_body("return 1;"), "return 1;");
	}

	#[test]
	fn unscoped_script_uses_document() {
		let js = scoped("text", None, "return null;");
		assert!(js.contains("const root = document;"));
		assert!(js.contains(&marker_tag("text")));
	}
}
