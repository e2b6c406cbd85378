//! Bare-specifier resolution rooted at `/snapshot/node_modules/<request>`
//! (`spec.md` §4.E). Never errors: an unresolvable specifier is simply
//! `None`, leaving the host's own resolution machinery to report the miss.

use serde_json::Value;

use crate::overlay::{RealFs, SnapshotFs};
use crate::path::VIRTUAL_ROOT;

/// Condition set recognized when reading a package's `exports` map, matching
/// the `require` consumer this crate's hooks always run under. Precedence
/// between these is decided by the manifest's own key order (see
/// `resolve_condition`), not by this array's order — `serde_json`'s
/// `preserve_order` feature is required so that order survives parsing.
const CONDITIONS: [&str; 3] = ["require", "node", "default"];
const EXTENSIONS: [&str; 3] = [".js", ".json", ".node"];

/// Resolves `request` (already known to be a bare specifier) against the
/// archive, or returns `None` if nothing in `/snapshot/node_modules` answers
/// for it.
pub fn resolve_bare_specifier<R: RealFs>(snapshot: &SnapshotFs<R>, request: &str) -> Option<String> {
    let base = format!("{VIRTUAL_ROOT}/node_modules/{request}");
    let manifest = read_manifest(snapshot, &base)?;

    if let Some(exports) = manifest.get("exports") {
        if let Some(resolved) = resolve_via_exports(snapshot, &base, exports) {
            return Some(resolved);
        }
    } else if let Some(resolved) = resolve_via_main(snapshot, &base, &manifest) {
        return Some(resolved);
    }

    if exists_as_file(snapshot, &format!("{base}/index.js")) {
        return Some(format!("{base}/index.js"));
    }

    if exists_as_file(snapshot, &format!("{base}/dist/index.js")) {
        return Some(format!("{base}/dist/index.js"));
    }
    let dist_request = format!("{base}/dist/{request}.js");
    if exists_as_file(snapshot, &dist_request) {
        return Some(dist_request);
    }

    None
}

fn read_manifest<R: RealFs>(snapshot: &SnapshotFs<R>, base: &str) -> Option<Value> {
    let bytes = snapshot.read(&format!("{base}/package.json")).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn resolve_via_exports<R: RealFs>(snapshot: &SnapshotFs<R>, base: &str, exports: &Value) -> Option<String> {
    let entry = unwrap_dot_subpath(exports);
    let target = resolve_condition(entry, &CONDITIONS)?;
    let joined = join(base, &target);
    try_with_extensions(snapshot, &joined)
}

/// `exports` may itself be the entry map, or an object keyed by subpath with
/// `"."` naming the package's main entry; only the latter is modeled here.
fn unwrap_dot_subpath(exports: &Value) -> &Value {
    if let Value::Object(map) = exports {
        if let Some(dot) = map.get(".") {
            return dot;
        }
    }
    exports
}

/// Walks a conditional-exports value down to a concrete subpath string.
///
/// Per `spec.md` §4.E: "iterate keys in insertion order; the first key
/// present in the condition set selects its value" — precedence is decided
/// by the manifest's own declared key order, not by a fixed priority list.
/// `{"default": "./a.js", "require": "./b.js"}` resolves to `./a.js` because
/// `default` is declared first, even though `require` would outrank it in
/// `conditions`.
fn resolve_condition(value: &Value, conditions: &[&str]) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.iter().find_map(|(key, v)| {
            conditions
                .contains(&key.as_str())
                .then(|| resolve_condition(v, conditions))
                .flatten()
        }),
        _ => None,
    }
}

fn resolve_via_main<R: RealFs>(snapshot: &SnapshotFs<R>, base: &str, manifest: &Value) -> Option<String> {
    let main = manifest.get("main").and_then(Value::as_str).unwrap_or("index.js");
    let main = main.strip_prefix("./").unwrap_or(main);
    let main = if main.is_empty() || main == "." {
        "index.js".to_string()
    } else if main.ends_with('/') {
        format!("{main}index.js")
    } else {
        main.to_string()
    };

    let joined = join(base, &main);
    if exists_as_file(snapshot, &joined) {
        return Some(joined);
    }
    if exists_as_dir(snapshot, &joined) {
        let candidate = format!("{joined}/index.js");
        if exists_as_file(snapshot, &candidate) {
            return Some(candidate);
        }
        return None;
    }
    try_with_extensions(snapshot, &joined)
}

fn try_with_extensions<R: RealFs>(snapshot: &SnapshotFs<R>, path: &str) -> Option<String> {
    if exists_as_file(snapshot, path) {
        return Some(path.to_string());
    }
    for ext in EXTENSIONS {
        let candidate = format!("{path}{ext}");
        if exists_as_file(snapshot, &candidate) {
            return Some(candidate);
        }
    }
    None
}

fn join(base: &str, rel: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rel.trim_start_matches('/'))
}

fn exists_as_file<R: RealFs>(snapshot: &SnapshotFs<R>, path: &str) -> bool {
    use crate::types::EntryKind;
    matches!(snapshot.stat(path), Ok(s) if s.kind == EntryKind::File)
}

fn exists_as_dir<R: RealFs>(snapshot: &SnapshotFs<R>, path: &str) -> bool {
    use crate::types::EntryKind;
    matches!(snapshot.stat(path), Ok(s) if s.kind == EntryKind::Directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveFs;
    use crate::error::{Error, Result};
    use crate::types::Stat;
    use std::io::{Cursor, Write};
    use std::sync::Arc;

    struct NoRealFs;
    impl RealFs for NoRealFs {
        fn stat(&self, path: &str) -> Result<Stat> {
            Err(Error::NotFound(path.to_string()))
        }
        fn fstat(&self, _fd: i32) -> Result<Stat> {
            Err(Error::NotFound("fd".into()))
        }
        fn read(&self, path: &str) -> Result<Vec<u8>> {
            Err(Error::NotFound(path.to_string()))
        }
        fn readdir(&self, path: &str) -> Result<Vec<String>> {
            Err(Error::NotFound(path.to_string()))
        }
    }

    fn build(files: &[(&str, &[u8])]) -> SnapshotFs<NoRealFs> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options =
                zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
            for (name, contents) in files {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents).unwrap();
            }
            writer.finish().unwrap();
        }
        let archive = Arc::new(ArchiveFs::new(Arc::from(buf.into_boxed_slice())).unwrap());
        SnapshotFs::new(archive, NoRealFs)
    }

    #[test]
    fn resolves_via_conditional_exports() {
        let snap = build(&[
            (
                "node_modules/left-pad/package.json",
                br#"{"exports": {".": {"require": "./cjs/index.js", "default": "./esm/index.js"}}}"#,
            ),
            ("node_modules/left-pad/cjs/index.js", b"module.exports = {}"),
            ("node_modules/left-pad/esm/index.js", b"export default {}"),
        ]);
        assert_eq!(
            resolve_bare_specifier(&snap, "left-pad"),
            Some("/snapshot/node_modules/left-pad/cjs/index.js".to_string())
        );
    }

    #[test]
    fn declaration_order_decides_precedence_not_the_condition_list_order() {
        // "default" is declared before "require" here, so it must win even
        // though `CONDITIONS` lists `require` first.
        let snap = build(&[
            (
                "node_modules/pkg/package.json",
                br#"{"exports": {".": {"default": "./a.js", "require": "./b.js"}}}"#,
            ),
            ("node_modules/pkg/a.js", b"a"),
            ("node_modules/pkg/b.js", b"b"),
        ]);
        assert_eq!(
            resolve_bare_specifier(&snap, "pkg"),
            Some("/snapshot/node_modules/pkg/a.js".to_string())
        );
    }

    #[test]
    fn falls_back_to_default_condition() {
        let snap = build(&[
            (
                "node_modules/pkg/package.json",
                br#"{"exports": {".": {"browser": "./browser.js", "default": "./index.js"}}}"#,
            ),
            ("node_modules/pkg/index.js", b"x"),
        ]);
        assert_eq!(
            resolve_bare_specifier(&snap, "pkg"),
            Some("/snapshot/node_modules/pkg/index.js".to_string())
        );
    }

    #[test]
    fn resolves_via_main_field_with_extension_probing() {
        let snap = build(&[
            ("node_modules/pkg/package.json", br#"{"main": "./lib/entry"}"#),
            ("node_modules/pkg/lib/entry.js", b"x"),
        ]);
        assert_eq!(
            resolve_bare_specifier(&snap, "pkg"),
            Some("/snapshot/node_modules/pkg/lib/entry.js".to_string())
        );
    }

    #[test]
    fn falls_back_to_index_js_when_manifest_has_no_main() {
        let snap = build(&[
            ("node_modules/pkg/package.json", b"{}"),
            ("node_modules/pkg/index.js", b"x"),
        ]);
        assert_eq!(
            resolve_bare_specifier(&snap, "pkg"),
            Some("/snapshot/node_modules/pkg/index.js".to_string())
        );
    }

    #[test]
    fn falls_back_to_dist_request_js() {
        let snap = build(&[
            ("node_modules/pkg/package.json", br#"{"main": "./missing.js"}"#),
            ("node_modules/pkg/dist/pkg.js", b"x"),
        ]);
        assert_eq!(
            resolve_bare_specifier(&snap, "pkg"),
            Some("/snapshot/node_modules/pkg/dist/pkg.js".to_string())
        );
    }

    #[test]
    fn missing_package_json_gives_up() {
        let snap = build(&[("node_modules/pkg/index.js", b"x")]);
        assert_eq!(resolve_bare_specifier(&snap, "pkg"), None);
    }
}
