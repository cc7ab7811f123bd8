//! Schema ingestion.
//!
//! A schema document is a JSON object:
//!
//! ```json
//! {
//!   "name": "Demo",
//!   "options": [
//!     { "name": "DEBUG", "type": "bool", "default": false },
//!     { "name": "LEVEL", "type": "multiple_choice", "choices": ["INFO", "TRACE"],
//!       "dependencies": "DEBUG" }
//!   ],
//!   "include": ["net.json"]
//! }
//! ```
//!
//! A document's own options are merged first, then every include target
//! depth-first in list order.

use std::collections::HashSet;

use serde_json::{Map, Value as Json};

use super::{
    forest::Forest,
    loader::{DocumentLoader, MemoryLoader},
    option::{NodeId, OptionNode, OptionType},
};
use crate::{error::IngestError, expr::compile_all};

const DEFAULT_TITLE: &str = "Configuration";

/// Build one merged forest from the root documents and everything they include.
///
/// Dependencies are compiled but never evaluated here.
pub fn ingest<L>(loader: &mut L, roots: &[&str]) -> Result<Forest, IngestError>
where
    L: DocumentLoader + ?Sized,
{
    let mut ingestor = Ingestor {
        loader,
        forest: Forest::new(DEFAULT_TITLE),
        stack: Vec::new(),
        merged: HashSet::new(),
    };
    for root in roots {
        ingestor.document(root, None)?;
    }
    debug!(
        "ingested {} nodes from {} documents",
        ingestor.forest.len(),
        ingestor.merged.len()
    );
    Ok(ingestor.forest)
}

/// Ingest already parsed documents. Includes refer to other documents by `name`.
pub fn ingest_documents(documents: &[Json]) -> Result<Forest, IngestError> {
    let mut loader = MemoryLoader::from_documents(documents.iter().cloned());
    let roots: Vec<String> = loader.names().map(str::to_string).collect();
    let roots: Vec<&str> = roots.iter().map(String::as_str).collect();
    ingest(&mut loader, &roots)
}

struct Ingestor<'a, L: ?Sized> {
    loader: &'a mut L,
    forest: Forest,
    /// Keys of the documents on the current include path.
    stack: Vec<String>,
    merged: HashSet<String>,
}

fn invalid(path: impl Into<String>, message: impl Into<String>) -> IngestError {
    IngestError::InvalidSchema {
        path: path.into(),
        message: message.into(),
    }
}

fn check_identifier(path: &str, what: &str, ident: &str) -> Result<(), IngestError> {
    if ident.is_empty() {
        return Err(invalid(path, format!("{what} must not be empty")));
    }
    if ident.chars().any(char::is_whitespace) {
        return Err(invalid(
            path,
            format!("{what} `{ident}` must not contain whitespace"),
        ));
    }
    Ok(())
}

/// `options` of a document or group; absent means none.
fn option_list<'j>(
    path: &str,
    obj: &'j Map<String, Json>,
    required: bool,
) -> Result<&'j [Json], IngestError> {
    match obj.get("options") {
        Some(Json::Array(items)) => Ok(items.as_slice()),
        None | Some(Json::Null) if !required => Ok(&[][..]),
        None | Some(Json::Null) => Err(invalid(path, "group requires an `options` list")),
        Some(other) => Err(invalid(
            path,
            format!("`options` must be a list, got {other}"),
        )),
    }
}

fn parse_choices(path: &str, raw: Option<&Json>) -> Result<Vec<String>, IngestError> {
    let items = match raw {
        Some(Json::Array(items)) if !items.is_empty() => items,
        _ => return Err(invalid(path, "multiple_choice requires a non-empty `choices` list")),
    };
    let mut labels: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let label = item
            .as_str()
            .ok_or_else(|| invalid(path, format!("choice {item} is not a string")))?;
        check_identifier(path, "choice", label)?;
        if labels.iter().any(|l| l == label) {
            return Err(invalid(path, format!("choice `{label}` is listed twice")));
        }
        labels.push(label.to_string());
    }
    Ok(labels)
}

fn parse_type(path: &str, obj: &Map<String, Json>) -> Result<OptionType, IngestError> {
    let type_name = obj
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| invalid(path, "missing `type`"))?;
    Ok(match type_name {
        "bool" => OptionType::Bool,
        "int" => OptionType::Int,
        "string" => OptionType::String,
        "multiple_choice" | "choice" => OptionType::Choice(parse_choices(path, obj.get("choices"))?),
        "group" => OptionType::Group,
        other => return Err(invalid(path, format!("unknown option type `{other}`"))),
    })
}

/// Dependency texts: absent, one string or a list of strings.
fn dependency_texts<'j>(path: &str, raw: Option<&'j Json>) -> Result<Vec<&'j str>, IngestError> {
    match raw {
        None | Some(Json::Null) => Ok(Vec::new()),
        Some(Json::String(text)) => Ok(vec![text.as_str()]),
        Some(Json::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| invalid(path, format!("dependency {item} is not a string")))
            })
            .collect(),
        Some(other) => Err(invalid(
            path,
            format!("`dependencies` must be a string or a list, got {other}"),
        )),
    }
}

impl<L: DocumentLoader + ?Sized> Ingestor<'_, L> {
    fn document(&mut self, reference: &str, from: Option<&str>) -> Result<(), IngestError> {
        let (key, doc) = self
            .loader
            .load(reference, from)
            .map_err(|e| IngestError::Load {
                reference: reference.to_string(),
                message: format!("{e:#}"),
            })?;

        if self.stack.contains(&key) {
            let mut chain = self.stack.clone();
            chain.push(key);
            return Err(IngestError::CircularInclude { chain });
        }
        if self.merged.contains(&key) {
            debug!("`{key}` already merged, skipping");
            return Ok(());
        }

        let obj = doc
            .as_object()
            .ok_or_else(|| invalid(&key, "schema document must be a JSON object"))?;

        if self.merged.is_empty()
            && self.stack.is_empty()
            && let Some(title) = obj.get("name").and_then(Json::as_str)
        {
            self.forest.set_name(title);
        }

        debug!("merging schema document `{key}`");
        self.stack.push(key.clone());

        for raw in option_list(&key, obj, false)? {
            self.option(&key, raw, None)?;
        }

        let includes = match obj.get("include") {
            None | Some(Json::Null) => &[][..],
            Some(Json::Array(items)) => items.as_slice(),
            Some(other) => {
                return Err(invalid(&key, format!("`include` must be a list, got {other}")));
            }
        };
        for include in includes {
            let target = include
                .as_str()
                .ok_or_else(|| invalid(&key, format!("include {include} is not a string")))?;
            self.document(target, Some(&key))?;
        }

        self.stack.pop();
        self.merged.insert(key);
        Ok(())
    }

    fn option(
        &mut self,
        document: &str,
        raw: &Json,
        parent: Option<NodeId>,
    ) -> Result<(), IngestError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| invalid(document, format!("option {raw} is not an object")))?;
        let name = obj
            .get("name")
            .and_then(Json::as_str)
            .ok_or_else(|| invalid(document, "option is missing `name`"))?;
        check_identifier(document, "option name", name)?;

        let path = format!("{document}:{name}");
        let option_type = parse_type(&path, obj)?;
        let default = option_type
            .default_from_json(obj.get("default"))
            .map_err(|m| m.into_ingest(&path))?;

        let texts = dependency_texts(&path, obj.get("dependencies"))?;
        let dependency = compile_all(texts.as_slice()).map_err(|source| IngestError::Parse {
            option: name.to_string(),
            source,
        })?;

        let external = match obj.get("external") {
            None | Some(Json::Null) => false,
            Some(Json::Bool(b)) => *b,
            Some(other) => {
                return Err(invalid(&path, format!("`external` must be a boolean, got {other}")));
            }
        };

        let children = if option_type.is_group() {
            option_list(&path, obj, true)?
        } else if obj.contains_key("options") {
            return Err(invalid(&path, "only groups may declare nested `options`"));
        } else {
            &[][..]
        };

        let id = self.forest.push(OptionNode {
            name: name.to_string(),
            option_type,
            default,
            description: obj
                .get("description")
                .and_then(Json::as_str)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            data: obj.get("data").filter(|d| !d.is_null()).cloned(),
            external,
            dependency,
            parent,
            position: 0,
            children: Vec::new(),
            document: document.to_string(),
        })?;

        for child in children {
            self.option(document, child, Some(id))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;
    use crate::{data::loader::FsLoader, value::Value};

    fn names(forest: &Forest) -> Vec<&str> {
        forest.iter().map(|(_, n)| n.name.as_str()).collect()
    }

    #[test]
    fn test_nested_groups_and_fields() {
        let forest = ingest_documents(&[json!({
            "name": "Demo",
            "options": [
                {"name": "NET", "type": "group", "dependencies": "ENABLE", "options": [
                    {"name": "PORT", "type": "int", "default": 8080, "description": "listen port"},
                    {"name": "MODE", "type": "choice", "choices": ["fast", "slow"], "default": "slow"}
                ]},
                {"name": "ENABLE", "type": "bool", "default": "yes", "data": ["-DENABLE"]},
                {"name": "HOST", "type": "string", "external": true}
            ]
        })])
        .unwrap();

        assert_eq!(forest.name(), "Demo");
        assert_eq!(names(&forest), vec!["NET", "PORT", "MODE", "ENABLE", "HOST"]);

        let net = forest.find("NET").unwrap();
        assert!(net.is_group());
        assert!(net.default.is_none());
        assert!(net.dependency.is_some());
        assert_eq!(net.children.len(), 2);

        let port = forest.find("PORT").unwrap();
        assert_eq!(port.default, Some(Value::Int(8080)));
        assert_eq!(port.description.as_deref(), Some("listen port"));
        assert_eq!(port.parent, forest.get("NET"));

        let mode = forest.find("MODE").unwrap();
        assert_eq!(mode.position, 1);
        assert_eq!(
            mode.default,
            Some(Value::Choice {
                index: 1,
                label: "slow".into()
            })
        );

        let enable = forest.find("ENABLE").unwrap();
        assert_eq!(enable.default, Some(Value::Bool(true)));
        assert_eq!(enable.data, Some(json!(["-DENABLE"])));

        let host = forest.find("HOST").unwrap();
        assert!(host.external);
        assert_eq!(host.default, Some(Value::Str(String::new())));
    }

    #[test]
    fn test_include_order_is_depth_first() {
        let forest = ingest_documents(&[
            json!({"name": "root", "options": [{"name": "R", "type": "bool"}], "include": ["a", "b"]}),
            json!({"name": "a", "options": [{"name": "A", "type": "bool"}], "include": ["a1"]}),
            json!({"name": "a1", "options": [{"name": "A1", "type": "bool"}]}),
            json!({"name": "b", "options": [{"name": "B", "type": "bool"}]}),
        ])
        .unwrap();
        assert_eq!(names(&forest), vec!["R", "A", "A1", "B"]);
        assert_eq!(forest.name(), "root");
        assert_eq!(forest.find("A1").unwrap().document, "a1");
    }

    #[test]
    fn test_diamond_include_merges_once() {
        let forest = ingest_documents(&[
            json!({"name": "root", "include": ["left", "right"]}),
            json!({"name": "left", "include": ["shared"]}),
            json!({"name": "right", "include": ["shared"]}),
            json!({"name": "shared", "options": [{"name": "S", "type": "int"}]}),
        ])
        .unwrap();
        assert_eq!(names(&forest), vec!["S"]);
    }

    #[test]
    fn test_circular_include() {
        let err = ingest_documents(&[
            json!({"name": "a", "include": ["b"]}),
            json!({"name": "b", "include": ["c"]}),
            json!({"name": "c", "include": ["a"]}),
        ])
        .unwrap_err();
        match err {
            IngestError::CircularInclude { chain } => assert_eq!(chain, vec!["a", "b", "c", "a"]),
            other => panic!("unexpected error: {other}"),
        }

        let err = ingest_documents(&[json!({"name": "self", "include": ["self"]})]).unwrap_err();
        assert!(matches!(err, IngestError::CircularInclude { .. }));
    }

    #[test]
    fn test_duplicate_across_documents() {
        let err = ingest_documents(&[
            json!({"name": "a", "options": [{"name": "X", "type": "bool"}], "include": ["b"]}),
            json!({"name": "b", "options": [{"name": "G", "type": "group", "options": [
                {"name": "X", "type": "int"}
            ]}]}),
        ])
        .unwrap_err();
        match err {
            IngestError::DuplicateIdentifier {
                name,
                first,
                second,
            } => {
                assert_eq!(name, "X");
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_default_is_type_mismatch() {
        let err = ingest_documents(&[json!({"name": "d", "options": [
            {"name": "N", "type": "int", "default": "ten"}
        ]})])
        .unwrap_err();
        match err {
            IngestError::TypeMismatch { path, expected, .. } => {
                assert_eq!(path, "d:N");
                assert_eq!(expected, "integer");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = ingest_documents(&[json!({"options": [
            {"name": "M", "type": "multiple_choice", "choices": ["a", "b"], "default": "c"}
        ]})])
        .unwrap_err();
        assert!(matches!(err, IngestError::TypeMismatch { .. }));
    }

    #[test]
    fn test_parse_error_names_option() {
        let err = ingest_documents(&[json!({"options": [
            {"name": "A", "type": "bool"},
            {"name": "B", "type": "bool", "dependencies": ["A", "(A && "]}
        ]})])
        .unwrap_err();
        match err {
            IngestError::Parse { option, .. } => assert_eq!(option, "B"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_dependencies_are_absent() {
        let forest = ingest_documents(&[json!({"options": [
            {"name": "A", "type": "bool", "dependencies": ""},
            {"name": "B", "type": "bool", "dependencies": ["  ", null]}
        ]})]);
        // null inside the list is not a string
        assert!(matches!(forest, Err(IngestError::InvalidSchema { .. })));

        let forest = ingest_documents(&[json!({"options": [
            {"name": "A", "type": "bool", "dependencies": ""},
            {"name": "B", "type": "bool", "dependencies": ["  "]},
            {"name": "C", "type": "bool", "dependencies": null}
        ]})])
        .unwrap();
        assert!(forest.iter().all(|(_, n)| n.dependency.is_none()));
    }

    #[test]
    fn test_structural_errors() {
        let cases = [
            json!({"options": {"name": "A"}}),
            json!({"options": [{"type": "bool"}]}),
            json!({"options": [{"name": "A"}]}),
            json!({"options": [{"name": "A B", "type": "bool"}]}),
            json!({"options": [{"name": "A", "type": "float"}]}),
            json!({"options": [{"name": "A", "type": "choice"}]}),
            json!({"options": [{"name": "A", "type": "choice", "choices": []}]}),
            json!({"options": [{"name": "A", "type": "choice", "choices": ["x y"]}]}),
            json!({"options": [{"name": "A", "type": "choice", "choices": ["x", "x"]}]}),
            json!({"options": [{"name": "G", "type": "group"}]}),
            json!({"options": [{"name": "A", "type": "bool", "options": []}]}),
            json!({"options": [{"name": "A", "type": "bool", "external": "yes"}]}),
            json!({"options": [{"name": "A", "type": "bool", "dependencies": 3}]}),
            json!({"include": "other"}),
            json!(["not", "an", "object"]),
        ];
        for doc in cases {
            let err = ingest_documents(&[doc.clone()]).unwrap_err();
            assert!(
                matches!(err, IngestError::InvalidSchema { .. }),
                "{doc}: {err}"
            );
        }
    }

    #[test]
    fn test_missing_include_is_load_error() {
        let err = ingest_documents(&[json!({"name": "a", "include": ["nope"]})]).unwrap_err();
        match err {
            IngestError::Load { reference, .. } => assert_eq!(reference, "nope"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fs_includes_relative_to_includer() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("drivers")).unwrap();
        fs::write(
            dir.path().join("root.json"),
            r#"{"name": "Board", "options": [{"name": "SERIAL", "type": "bool"}],
                "include": ["drivers/uart.json"]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("drivers/uart.json"),
            r#"{"name": "uart", "options": [{"name": "BAUD", "type": "int", "default": 115200,
                "dependencies": "SERIAL"}], "include": ["../common.json"]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("common.json"),
            r#"{"options": [{"name": "ARCH", "type": "string", "default": "riscv"}]}"#,
        )
        .unwrap();

        let mut loader = FsLoader::new(dir.path());
        let forest = ingest(&mut loader, &["root.json"]).unwrap();
        assert_eq!(forest.name(), "Board");
        assert_eq!(names(&forest), vec!["SERIAL", "BAUD", "ARCH"]);
        assert!(forest.find("BAUD").unwrap().document.ends_with("uart.json"));
    }
}
